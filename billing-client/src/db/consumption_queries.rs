use anyhow::{bail, Result};
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::db::push_scope;
use crate::domain::{AccessScope, AggregateRow, ConsumerAccount, ConsumptionTotal};

/// `to_char` pattern producing the canonical bucket key for a granularity.
fn bucket_pattern(bucket: &str) -> Result<&'static str> {
    match bucket {
        "day" => Ok("YYYY-MM-DD"),
        "month" => Ok("YYYY-MM"),
        other => bail!("unsupported bucket '{other}'"),
    }
}

/// Aggregate kWh per day or month bucket across a set of meters.
///
/// `bucket` is `"day"` or `"month"`. The access scope is appended to the
/// WHERE clause as-is; it may reference `mu` (meter_usage), `m` (meters) and
/// `c` (customers).
pub async fn aggregate_consumption(
    pool: &PgPool,
    meter_ids: &[String],
    start: OffsetDateTime,
    end: OffsetDateTime,
    bucket: &str,
    scope: &AccessScope,
) -> Result<Vec<AggregateRow>> {
    let pattern = bucket_pattern(bucket)?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        r#"
        SELECT
            to_char(date_trunc('{bucket}', mu.ts), '{pattern}') AS period_bucket,
            COUNT(*) AS count,
            COALESCE(SUM(mu.kwh), 0) AS sum
        FROM meter_usage mu
        JOIN meters m ON mu.meter_id = m.meter_id
        JOIN customers c ON m.customer_id = c.customer_id
        WHERE mu.ts >= "#
    ));
    builder.push_bind(start);
    builder.push(" AND mu.ts < ");
    builder.push_bind(end);
    if !meter_ids.is_empty() {
        builder.push(" AND mu.meter_id = ANY(");
        builder.push_bind(meter_ids.to_vec());
        builder.push(")");
    }
    push_scope(&mut builder, scope)?;
    builder.push(" GROUP BY 1 ORDER BY 1");

    let rows = builder
        .build_query_as::<AggregateRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Total kWh for a single meter over `[start, end)`.
pub async fn total_consumption(
    pool: &PgPool,
    meter_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
    scope: &AccessScope,
) -> Result<ConsumptionTotal> {
    let mut builder = QueryBuilder::<Postgres>::new(
        r#"
        SELECT
            COUNT(*) AS count,
            COALESCE(SUM(mu.kwh), 0) AS sum
        FROM meter_usage mu
        JOIN meters m ON mu.meter_id = m.meter_id
        JOIN customers c ON m.customer_id = c.customer_id
        WHERE mu.meter_id = "#,
    );
    builder.push_bind(meter_id.to_string());
    builder.push(" AND mu.ts >= ");
    builder.push_bind(start);
    builder.push(" AND mu.ts < ");
    builder.push_bind(end);
    push_scope(&mut builder, scope)?;

    let total = builder
        .build_query_as::<ConsumptionTotal>()
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Every distinct billable (meter, customer, segment) triple.
pub async fn list_consumers(pool: &PgPool) -> Result<Vec<ConsumerAccount>> {
    let rows = sqlx::query_as::<_, ConsumerAccount>(
        r#"
        SELECT DISTINCT
            m.meter_id AS meter_serial,
            c.customer_id AS consumer_uid,
            c.segment AS consumer_category
        FROM meters m
        JOIN customers c ON m.customer_id = c.customer_id
        ORDER BY c.customer_id, m.meter_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
