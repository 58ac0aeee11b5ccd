use std::{
    ffi::OsString,
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::utils::{clock::Clock, time::today};

use super::entities::{DailyAccounting, Settings, StateDocument};

/// Everything a reader of the store gets: today's accounting (already rolled over) and the
/// settings it was computed with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub accounting: DailyAccounting,
    pub settings: Settings,
}

/// Interface for abstracting persistence of the daily accounting and the settings.
pub trait AccountingStore {
    /// Reads the persisted state. If the stored day is not today in the configured timezone the
    /// returned accounting is empty and dated today. The rollover itself isn't written back, it's
    /// up to the callers that change the accounting.
    fn load(&self) -> impl Future<Output = Result<StoreSnapshot>>;

    /// Persists the per domain totals and their date. Settings are left untouched.
    fn save(&self, accounting: &DailyAccounting) -> impl Future<Output = Result<()>>;

    /// Persists settings. The accounting is left untouched.
    fn save_settings(&self, settings: &Settings) -> impl Future<Output = Result<()>>;

    /// Persists `defaults` unless some settings were already saved. Returns the effective
    /// settings.
    fn initialize_settings(&self, defaults: Settings) -> impl Future<Output = Result<Settings>>;
}

impl<T: Deref> AccountingStore for T
where
    T::Target: AccountingStore,
{
    fn load(&self) -> impl Future<Output = Result<StoreSnapshot>> {
        self.deref().load()
    }

    fn save(&self, accounting: &DailyAccounting) -> impl Future<Output = Result<()>> {
        self.deref().save(accounting)
    }

    fn save_settings(&self, settings: &Settings) -> impl Future<Output = Result<()>> {
        self.deref().save_settings(settings)
    }

    fn initialize_settings(&self, defaults: Settings) -> impl Future<Output = Result<Settings>> {
        self.deref().initialize_settings(defaults)
    }
}

/// The main realization of [AccountingStore]. The whole state lives in a single json file.
/// Every access holds a lock on a sibling `.lock` file, and writes go to a sibling `.tmp` file
/// that replaces the document once it is complete, so an interrupted write leaves the previous
/// document in place.
pub struct JsonAccountingStore {
    path: PathBuf,
    lock_path: PathBuf,
    temp_path: PathBuf,
    clock: Box<dyn Clock>,
}

impl JsonAccountingStore {
    pub fn new(path: PathBuf, clock: Box<dyn Clock>) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            lock_path: sibling(&path, "lock"),
            temp_path: sibling(&path, "tmp"),
            path,
            clock,
        })
    }

    fn parse(bytes: &[u8]) -> StateDocument {
        StateDocument::from_slice(bytes).unwrap_or_else(|e| {
            // Starting over beats never accounting anything again.
            warn!("State document is corrupted, starting with an empty one: {e}");
            StateDocument::default()
        })
    }

    async fn open_lock(&self) -> Result<File> {
        Ok(File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .await?)
    }

    async fn read_unlocked(&self) -> Result<StateDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Self::parse(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StateDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_document(&self) -> Result<StateDocument> {
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let result = self.read_unlocked().await;
        lock.unlock_async().await?;
        result
    }

    /// Read-modify-write of the document under an exclusive lock.
    async fn update_document<T>(
        &self,
        update: impl FnOnce(&mut StateDocument) -> Result<T>,
    ) -> Result<T> {
        let lock = self.open_lock().await?;
        lock.lock_exclusive()?;
        let result = self.update_unlocked(update).await;
        lock.unlock_async().await?;
        result
    }

    async fn update_unlocked<T>(
        &self,
        update: impl FnOnce(&mut StateDocument) -> Result<T>,
    ) -> Result<T> {
        let mut document = self.read_unlocked().await?;
        let value = update(&mut document)?;

        let mut temp = File::create(&self.temp_path).await?;
        temp.write_all(&document.to_vec()?).await?;
        temp.flush().await?;
        temp.sync_all().await?;
        drop(temp);

        tokio::fs::rename(&self.temp_path, &self.path).await?;
        Ok(value)
    }
}

/// `state.json` -> `state.json.<suffix>`, next to it.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl AccountingStore for JsonAccountingStore {
    async fn load(&self) -> Result<StoreSnapshot> {
        let document = self.read_document().await?;
        let settings = document.settings().unwrap_or_default();
        let today = today(&settings.timezone, self.clock.time());

        let accounting = match document.last_reset_date() {
            Some(date) if date == today => DailyAccounting {
                per_domain_millis: document.time_data(),
                reset_date: today,
            },
            previous => {
                debug!("Accounting from {previous:?} rolled over to {today}");
                DailyAccounting::empty(today)
            }
        };

        Ok(StoreSnapshot {
            accounting,
            settings,
        })
    }

    async fn save(&self, accounting: &DailyAccounting) -> Result<()> {
        self.update_document(|document| {
            document.set_accounting(accounting);
            Ok(())
        })
        .await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.update_document(|document| document.set_settings(settings))
            .await
    }

    async fn initialize_settings(&self, defaults: Settings) -> Result<Settings> {
        self.update_document(|document| match document.settings() {
            Some(existing) => Ok(existing),
            None => {
                document.set_settings(&defaults)?;
                Ok(defaults)
            }
        })
        .await
    }
}
