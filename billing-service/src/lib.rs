pub mod alerts;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod forecast;
pub mod invoice;
pub mod metrics_server;
pub mod observability;
pub mod samples_csv;
pub mod scheduler;
pub mod series;
pub mod store;
pub mod sweep;
pub mod tariff;

pub use error::{BillingError, Result};
pub use scheduler::Scheduler;
