/// A bound value carried by an [`AccessScope`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    Text(String),
    Int(i64),
    Float(f64),
    TextList(Vec<String>),
}

/// Caller-supplied row filter appended to aggregate queries.
///
/// `condition` is a SQL boolean fragment using `?` as the placeholder for each
/// entry of `values`, in order. The fragment is passed through untouched apart
/// from placeholder binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessScope {
    pub condition: String,
    pub values: Vec<ScopeValue>,
}

impl AccessScope {
    pub fn new(condition: impl Into<String>, values: Vec<ScopeValue>) -> Self {
        Self {
            condition: condition.into(),
            values,
        }
    }

    /// A scope that filters nothing.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.condition.trim().is_empty()
    }
}
