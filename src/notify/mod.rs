//! User notification abstraction.

pub mod telegram;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use telegram::TelegramNotifier;

/// Delivers a short text to one user. Callers filter the shared owner
/// sentinel before invoking; the notifier itself assumes every owner id it
/// sees maps to a real chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner_id: i64, text: &str) -> Result<(), NotifyError>;
}
