use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

use crate::domain::{Bill, BillFilter, BillStatus};

pub async fn insert_bill(pool: &PgPool, bill: &Bill) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bills (
            invoice_id, consumer_id, meter_serial, period_start, period_end,
            bill_date, due_date, consumption, amount, paid_amount, due_amount,
            tariff_name, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(&bill.invoice_id)
    .bind(&bill.consumer_id)
    .bind(&bill.meter_serial)
    .bind(bill.period_start)
    .bind(bill.period_end)
    .bind(bill.bill_date)
    .bind(bill.due_date)
    .bind(bill.consumption)
    .bind(bill.amount)
    .bind(bill.paid_amount)
    .bind(bill.due_amount)
    .bind(&bill.tariff_name)
    .bind(bill.status.as_str())
    .bind(bill.created_at)
    .bind(bill.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Whether a consumer's meter already has a bill for the cycle starting at `period_start`.
pub async fn bill_exists(
    pool: &PgPool,
    consumer_id: &str,
    meter_serial: &str,
    period_start: Date,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM bills
            WHERE consumer_id = $1
              AND meter_serial = $2
              AND period_start = $3
        )
        "#,
    )
    .bind(consumer_id)
    .bind(meter_serial)
    .bind(period_start)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Invoice id with the highest sequence under `prefix`, if any.
///
/// Sequences widen past four digits, so longer ids rank first.
pub async fn latest_invoice_id(pool: &PgPool, prefix: &str) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT invoice_id FROM bills
        WHERE invoice_id LIKE $1 || '%'
        ORDER BY length(invoice_id) DESC, invoice_id DESC
        LIMIT 1
        "#,
    )
    .bind(prefix)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Age every pending bill in a single statement. Returns the number of rows touched.
pub async fn sweep_pending(pool: &PgPool, now: OffsetDateTime) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE bills
        SET status = CASE WHEN amount = 0 THEN 'paid' ELSE 'overdue' END,
            due_amount = CASE WHEN paid_amount = 0 THEN amount ELSE amount - paid_amount END,
            updated_at = $1
        WHERE status = 'pending'
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BillFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(from) = filter.bill_date_from {
        builder.push(" AND bill_date >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.bill_date_to {
        builder.push(" AND bill_date <= ");
        builder.push_bind(to);
    }
    if let Some(min) = filter.amount_min {
        builder.push(" AND amount >= ");
        builder.push_bind(min);
    }
    if let Some(max) = filter.amount_max {
        builder.push(" AND amount <= ");
        builder.push_bind(max);
    }
    if let Some(category) = &filter.consumer_category {
        builder.push(" AND consumer_id IN (SELECT customer_id FROM customers WHERE segment = ");
        builder.push_bind(category.clone());
        builder.push(")");
    }
}

/// Admin bulk transition. Moving bills to overdue recomputes their due amount.
pub async fn bulk_update_status(
    pool: &PgPool,
    filter: &BillFilter,
    status: BillStatus,
    now: OffsetDateTime,
) -> Result<u64> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE bills SET status = ");
    builder.push_bind(status.as_str());
    if status == BillStatus::Overdue {
        builder.push(", due_amount = amount - paid_amount");
    }
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE TRUE");
    push_filter(&mut builder, filter);

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}
