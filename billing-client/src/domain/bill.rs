use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown bill status '{0}'")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BillStatus {
    Pending,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for BillStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bill {
    pub invoice_id: String,
    pub consumer_id: String,
    pub meter_serial: String,
    pub period_start: Date,
    pub period_end: Date,
    pub bill_date: Date,
    pub due_date: Date,
    pub consumption: Decimal,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub tariff_name: String,
    #[sqlx(try_from = "String")]
    pub status: BillStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Bill {
    /// Outstanding balance once a bill goes overdue.
    pub fn outstanding(&self) -> Decimal {
        if self.paid_amount.is_zero() {
            self.amount
        } else {
            self.amount - self.paid_amount
        }
    }

    /// Ages a pending bill: zero-amount bills settle as paid, everything else
    /// becomes overdue with its due amount recomputed.
    ///
    /// Returns `false` (and leaves the bill untouched) when it is not pending.
    pub fn age(&mut self, now: OffsetDateTime) -> bool {
        if self.status != BillStatus::Pending {
            return false;
        }

        self.status = if self.amount.is_zero() {
            BillStatus::Paid
        } else {
            BillStatus::Overdue
        };
        self.due_amount = self.outstanding();
        self.updated_at = now;
        true
    }

    /// Admin-driven status change. Moving to overdue recomputes the due amount.
    pub fn set_status(&mut self, status: BillStatus, now: OffsetDateTime) {
        self.status = status;
        if status == BillStatus::Overdue {
            self.due_amount = self.amount - self.paid_amount;
        }
        self.updated_at = now;
    }
}

/// Predicate for admin bulk status updates. Unset fields match every bill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillFilter {
    pub status: Option<BillStatus>,
    pub bill_date_from: Option<Date>,
    pub bill_date_to: Option<Date>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub consumer_category: Option<String>,
}

impl BillFilter {
    /// In-memory evaluation, mirroring the SQL predicate. `category` is the
    /// bill's consumer category, when known.
    pub fn matches(&self, bill: &Bill, category: Option<&str>) -> bool {
        if let Some(status) = self.status {
            if bill.status != status {
                return false;
            }
        }
        if let Some(from) = self.bill_date_from {
            if bill.bill_date < from {
                return false;
            }
        }
        if let Some(to) = self.bill_date_to {
            if bill.bill_date > to {
                return false;
            }
        }
        if let Some(min) = self.amount_min {
            if bill.amount < min {
                return false;
            }
        }
        if let Some(max) = self.amount_max {
            if bill.amount > max {
                return false;
            }
        }
        match (&self.consumer_category, category) {
            (Some(want), Some(have)) => want == have,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}
