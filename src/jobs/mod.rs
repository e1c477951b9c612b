//! The periodic jobs registered on the scheduler.

pub mod cache_expiry;
pub mod discover;
pub mod reconcile;

pub use cache_expiry::CacheExpiryJob;
pub use discover::DiscoverJob;
pub use reconcile::ReconcileJob;
