use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use dispatcher::Dispatcher;
use events::TrackerEvent;
use session::ActiveSessionTracker;
use ticker::Ticker;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    host::{native_messaging::NativeMessageWriter, reader::NativeHostReader, TabDirectory},
    notify::{Interest, SurfaceRegistry},
    storage::{
        accounting_store::{AccountingStore, JsonAccountingStore},
        entities::Settings,
    },
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod dispatcher;
pub mod events;
pub mod session;
pub mod shutdown;
pub mod ticker;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
const STATE_FILE: &str = "state.json";
const EVENT_QUEUE_SIZE: usize = 64;

/// Represents the starting point for the host. Talks to the browser over stdin/stdout until the
/// browser disconnects or the process is interrupted.
pub async fn start_tracker(dir: PathBuf, tick_interval: Duration) -> Result<()> {
    let store = JsonAccountingStore::new(dir.join(STATE_FILE), Box::new(DefaultClock))?;

    // Pins the system timezone of the first start, later changes of the system zone don't
    // silently move the day boundary.
    if let Err(e) = store.initialize_settings(Settings::default()).await {
        warn!("Couldn't initialize settings {e:?}");
    }

    let shutdown_token = CancellationToken::new();

    let (_, result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        serve(
            tokio::io::stdin(),
            tokio::io::stdout(),
            store,
            DefaultClock,
            tick_interval,
            shutdown_token.clone(),
        ),
    );
    result
}

/// Wires reader, ticker and dispatcher around one event queue and runs them to completion.
pub async fn serve<S: AccountingStore>(
    input: impl AsyncRead + Unpin,
    output: impl AsyncWrite + Unpin + Send + 'static,
    store: S,
    clock: impl Clock + Clone,
    tick_interval: Duration,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<TrackerEvent>(EVENT_QUEUE_SIZE);
    let directory = Arc::new(Mutex::new(TabDirectory::default()));
    let writer = Arc::new(NativeMessageWriter::new(output));

    let reader = NativeHostReader::new(
        input,
        sender.clone(),
        directory.clone(),
        writer.clone(),
        shutdown_token.clone(),
    );
    let ticker = create_ticker(sender, &shutdown_token, tick_interval, clock.clone());
    let dispatcher = create_dispatcher(receiver, store, writer, directory, clock);

    let (reader_result, ticker_result, dispatcher_result) =
        tokio::join!(reader.run(), ticker.run(), dispatcher.run());

    if let Err(reader_result) = &reader_result {
        error!("Reader got an error {:?}", reader_result);
    }

    if let Err(ticker_result) = &ticker_result {
        error!("Ticker got an error {:?}", ticker_result);
    }

    if let Err(dispatcher_result) = &dispatcher_result {
        error!("Dispatcher got an error {:?}", dispatcher_result);
    }

    reader_result.and(ticker_result).and(dispatcher_result)
}

fn create_ticker(
    sender: mpsc::Sender<TrackerEvent>,
    shutdown_token: &CancellationToken,
    tick_interval: Duration,
    clock: impl Clock,
) -> Ticker {
    Ticker::new(
        sender,
        shutdown_token.clone(),
        tick_interval,
        Box::new(clock),
    )
}

fn create_dispatcher<S: AccountingStore, W: AsyncWrite + Unpin + Send + 'static>(
    receiver: mpsc::Receiver<TrackerEvent>,
    store: S,
    writer: Arc<NativeMessageWriter<W>>,
    directory: Arc<Mutex<TabDirectory>>,
    clock: impl Clock,
) -> Dispatcher<S, SurfaceRegistry, Arc<Mutex<TabDirectory>>> {
    let mut surfaces = SurfaceRegistry::new();
    surfaces.register(Interest::Everything, writer);
    let tracker = ActiveSessionTracker::new(store, surfaces, directory, Box::new(clock));
    Dispatcher::new(receiver, tracker)
}
