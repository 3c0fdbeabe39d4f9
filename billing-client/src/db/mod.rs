pub mod bill_queries;
pub mod consumption_queries;

use anyhow::{anyhow, bail, Result};
use sqlx::{Postgres, QueryBuilder};

use crate::domain::{AccessScope, ScopeValue};

/// Append `AND (<scope condition>)` to a query, binding scope values in order
/// of their `?` placeholders.
pub(crate) fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: &AccessScope) -> Result<()> {
    if scope.is_unrestricted() {
        return Ok(());
    }

    builder.push(" AND (");
    let mut values = scope.values.iter();
    let mut parts = scope.condition.split('?');
    if let Some(head) = parts.next() {
        builder.push(head);
    }
    for part in parts {
        let value = values
            .next()
            .ok_or_else(|| anyhow!("access scope has more placeholders than values"))?;
        match value {
            ScopeValue::Text(v) => builder.push_bind(v.clone()),
            ScopeValue::Int(v) => builder.push_bind(*v),
            ScopeValue::Float(v) => builder.push_bind(*v),
            ScopeValue::TextList(v) => builder.push_bind(v.clone()),
        };
        builder.push(part);
    }
    if values.next().is_some() {
        bail!("access scope has more values than placeholders");
    }
    builder.push(")");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_fragment_is_wrapped_and_numbered() {
        let scope = AccessScope::new(
            "m.region_id = ? AND m.zone = ANY(?)",
            vec![
                ScopeValue::Int(7),
                ScopeValue::TextList(vec!["z1".to_string()]),
            ],
        );
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM meters m WHERE TRUE");
        push_scope(&mut builder, &scope).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM meters m WHERE TRUE AND (m.region_id = $1 AND m.zone = ANY($2))"
        );
    }

    #[test]
    fn unrestricted_scope_leaves_query_alone() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 WHERE TRUE");
        push_scope(&mut builder, &AccessScope::unrestricted()).unwrap();
        assert_eq!(builder.sql(), "SELECT 1 WHERE TRUE");
    }

    #[test]
    fn placeholder_count_mismatch_is_rejected() {
        let scope = AccessScope::new("a = ? AND b = ?", vec![ScopeValue::Int(1)]);
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 WHERE TRUE");
        assert!(push_scope(&mut builder, &scope).is_err());
    }
}
