pub mod cron;
pub mod stats;
pub mod status;
