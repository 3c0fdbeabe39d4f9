/// A billable (meter, consumer, category) triple from the consumer registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsumerAccount {
    pub meter_serial: String,
    pub consumer_uid: String,
    pub consumer_category: String,
}
