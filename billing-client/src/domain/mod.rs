pub mod bill;
pub mod consumer;
pub mod consumption;
pub mod scope;

pub use bill::{Bill, BillFilter, BillStatus, DomainError};
pub use consumer::ConsumerAccount;
pub use consumption::{AggregateRow, ConsumptionSample, ConsumptionTotal};
pub use scope::{AccessScope, ScopeValue};
