/// One reported consumption reading for a meter, bucketed by day or month.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsumptionSample {
    pub meter_id: String,
    pub period_key: String,
    pub quantity: f64,
}

/// A grouped row as returned by the consumption aggregate query.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AggregateRow {
    pub period_bucket: String,
    pub count: i64,
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct ConsumptionTotal {
    pub count: i64,
    pub sum: f64,
}
