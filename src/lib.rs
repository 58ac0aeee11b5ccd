//! Native messaging host that tracks how long each website domain is actively viewed per day.
//! The browser extension forwards tab and window events, the host decides which domain is active,
//! keeps per domain totals for the current day and pushes live updates back to the page overlay.
//!

pub mod host;
pub mod notify;
pub mod storage;
pub mod tracker;
pub mod utils;
