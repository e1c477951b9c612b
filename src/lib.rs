//! seedwatch — watches torrent downloads and tells their owners when they
//! finish.
//!
//! A periodic scheduler polls the Deluge daemon, reconciles its answers
//! against the torrents tracked in a local SQLite database, and notifies the
//! owning Telegram user on completion. A keyed repeat-worker manager serves
//! features that need short-lived repeating actions.

pub mod config;
pub mod error;
pub mod jobs;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod tracker;
