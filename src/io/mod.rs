pub mod metrics_log;
pub mod snapshot;
