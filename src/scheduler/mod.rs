//! Background scheduling — the periodic tick loop and keyed repeat workers.

pub mod cron;
pub mod repeat;

pub use cron::{CronJob, CronScheduler, SchedulerHandle};
pub use repeat::{RepeatManager, RepeatTask};
