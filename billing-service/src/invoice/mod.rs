//! Monthly bill generation.

use std::sync::{Arc, Mutex};

use billing_client::domain::{AccessScope, Bill, BillStatus, ConsumerAccount};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use time::{Date, OffsetDateTime};

use crate::error::Result;
use crate::series::date_key::{first_of_month, months_before};
use crate::store::BillingStore;
use crate::tariff::{round_money, TariffEngine};

/// Day of the month on which a cycle's bills fall due.
pub const DUE_DAY: u8 = 9;

const INVOICE_PREFIX: &str = "INV";

/// The dates that define one billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingCycle {
    /// First day of the billed month.
    pub period_start: Date,
    /// First day of the following month (exclusive bound).
    pub period_end: Date,
    pub bill_date: Date,
    pub due_date: Date,
}

impl BillingCycle {
    /// The cycle billed during the month containing `today`: the previous full
    /// calendar month, billed on the 1st and due on the 9th.
    pub fn billed_in(today: Date) -> Self {
        let bill_date = first_of_month(today);
        Self {
            period_start: months_before(today, 1),
            period_end: bill_date,
            bill_date,
            due_date: bill_date.replace_day(DUE_DAY).unwrap_or(bill_date),
        }
    }
}

/// `YYMMDD` component of an invoice id.
fn date_part(date: Date) -> String {
    format!(
        "{:02}{:02}{:02}",
        date.year().rem_euclid(100),
        date.month() as u8,
        date.day()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CounterState {
    date_part: String,
    seq: u32,
}

/// Sequential invoice numbering: `INV` + `YYMMDD` + counter zero-padded to 4
/// digits. Past 9999 the counter widens (`INV24020110000`), so ids of one date
/// order by length first, then lexically.
///
/// The counter restarts at 1 whenever the date component differs from the
/// previous call.
#[derive(Debug, Default)]
pub struct InvoiceNumberer {
    state: Mutex<Option<CounterState>>,
}

impl InvoiceNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, date: Date) -> String {
        let part = date_part(date);
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let seq = match guard.as_mut() {
            Some(state) if state.date_part == part => {
                state.seq += 1;
                state.seq
            }
            _ => {
                *guard = Some(CounterState {
                    date_part: part.clone(),
                    seq: 1,
                });
                1
            }
        };
        format!("{INVOICE_PREFIX}{part}{seq:04}")
    }

    /// Continue numbering after an already-issued invoice id.
    ///
    /// Ids that do not parse, or that are behind the current counter, are ignored.
    pub fn resume_after(&self, invoice_id: &str) {
        let Some(rest) = invoice_id.strip_prefix(INVOICE_PREFIX) else {
            return;
        };
        if rest.len() <= 6 || !rest.is_char_boundary(6) {
            return;
        }
        let (part, seq) = rest.split_at(6);
        let Ok(seq) = seq.parse::<u32>() else {
            return;
        };

        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(state) if state.date_part == part && state.seq >= seq => {}
            _ => {
                *guard = Some(CounterState {
                    date_part: part.to_string(),
                    seq,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceRunSummary {
    pub generated: usize,
    pub skipped_existing: usize,
    pub settled_at_zero: usize,
}

/// Produces one bill per (meter, consumer) for the previous calendar month.
///
/// Consumers are processed one at a time; the first failure aborts the run.
/// Consumers that already hold a bill for the cycle are skipped, so an aborted
/// run can simply be retried.
pub struct InvoiceGenerator<S> {
    store: Arc<S>,
    tariff: TariffEngine,
    numberer: InvoiceNumberer,
    scope: AccessScope,
}

impl<S: BillingStore> InvoiceGenerator<S> {
    pub fn new(store: Arc<S>, tariff: TariffEngine) -> Self {
        Self {
            store,
            tariff,
            numberer: InvoiceNumberer::new(),
            scope: AccessScope::unrestricted(),
        }
    }

    pub fn with_scope(mut self, scope: AccessScope) -> Self {
        self.scope = scope;
        self
    }

    pub async fn run(&self, now: OffsetDateTime) -> Result<InvoiceRunSummary> {
        let cycle = BillingCycle::billed_in(now.date());
        let prefix = format!("{INVOICE_PREFIX}{}", date_part(cycle.period_start));
        if let Some(latest) = self.store.latest_invoice_id(&prefix).await? {
            self.numberer.resume_after(&latest);
        }

        let consumers = self.store.list_consumers().await?;
        tracing::info!(
            consumers = consumers.len(),
            period_start = %cycle.period_start,
            period_end = %cycle.period_end,
            "starting invoice generation"
        );

        let mut summary = InvoiceRunSummary::default();
        for account in &consumers {
            if self
                .store
                .bill_exists(&account.consumer_uid, &account.meter_serial, cycle.period_start)
                .await?
            {
                summary.skipped_existing += 1;
                metrics::counter!("invoices_skipped_existing_total").increment(1);
                continue;
            }

            let bill = match self.bill_for(account, &cycle, now).await {
                Ok(bill) => bill,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        consumer = %account.consumer_uid,
                        meter = %account.meter_serial,
                        "invoice generation aborted"
                    );
                    return Err(e);
                }
            };
            if bill.status == BillStatus::Paid {
                summary.settled_at_zero += 1;
            }
            self.store.insert_bill(&bill).await?;
            summary.generated += 1;
            metrics::counter!("invoices_generated_total").increment(1);
        }

        tracing::info!(
            generated = summary.generated,
            skipped_existing = summary.skipped_existing,
            settled_at_zero = summary.settled_at_zero,
            "invoice generation finished"
        );
        Ok(summary)
    }

    async fn bill_for(
        &self,
        account: &ConsumerAccount,
        cycle: &BillingCycle,
        now: OffsetDateTime,
    ) -> Result<Bill> {
        let total = self
            .store
            .total_consumption(
                &account.meter_serial,
                cycle.period_start,
                cycle.period_end,
                &self.scope,
            )
            .await?;

        Ok(self.build_bill(account, cycle, total.sum, now))
    }

    fn build_bill(
        &self,
        account: &ConsumerAccount,
        cycle: &BillingCycle,
        consumption_kwh: f64,
        now: OffsetDateTime,
    ) -> Bill {
        let consumption = round_money(Decimal::from_f64(consumption_kwh).unwrap_or_default());
        let priced = self
            .tariff
            .compute_bill(consumption, &account.consumer_category);

        // Consumption that rounds to 0.00 is billed as nothing, whatever the tariff.
        let amount = if consumption.is_zero() {
            round_money(Decimal::ZERO)
        } else {
            priced.amount
        };
        let status = if amount.is_zero() {
            BillStatus::Paid
        } else {
            BillStatus::Pending
        };

        Bill {
            invoice_id: self.numberer.next_id(cycle.period_start),
            consumer_id: account.consumer_uid.clone(),
            meter_serial: account.meter_serial.clone(),
            period_start: cycle.period_start,
            period_end: cycle.period_end,
            bill_date: cycle.bill_date,
            due_date: cycle.due_date,
            consumption,
            amount,
            paid_amount: round_money(Decimal::ZERO),
            due_amount: round_money(Decimal::ZERO),
            tariff_name: priced.tariff_name,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}
