//! Persistence of the daily accounting and the user settings, see
//! [accounting_store::JsonAccountingStore].
//!  - The state is a single json document with `timeData`, `lastResetDate` and `settings` keys.
//!  - Accounting is only valid for `lastResetDate`. Every read compares it against today in the
//!    configured timezone and hands out empty totals once the day is over.

pub mod accounting_store;
pub mod entities;
