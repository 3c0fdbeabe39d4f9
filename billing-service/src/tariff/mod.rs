use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

/// Which pricing rule the engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffPolicy {
    /// units × category rate
    #[default]
    Flat,
    /// cumulative slab table per category
    Slab,
}

/// A consumption band `[lower_bound, upper_bound]` charged at `rate`.
///
/// Units are counted from 1, so a band starting at 0 holds `upper_bound` units.
/// `upper_bound = None` marks an open-ended top band.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TariffSlab {
    pub lower_bound: Decimal,
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

impl TariffSlab {
    fn width(&self) -> Option<Decimal> {
        self.upper_bound.map(|upper| {
            let lower = self.lower_bound.max(Decimal::ONE);
            (upper - lower + Decimal::ONE).max(Decimal::ZERO)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryTariff {
    pub category: String,
    pub name: String,
    pub rate: Decimal,
    #[serde(default)]
    pub slabs: Vec<TariffSlab>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillAmount {
    pub amount: Decimal,
    pub tariff_name: String,
}

impl BillAmount {
    fn zero() -> Self {
        Self {
            amount: round_money(Decimal::ZERO),
            tariff_name: String::new(),
        }
    }
}

/// Round half away from zero to two places, always carrying a scale of 2.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

#[derive(Debug, Clone)]
pub struct TariffEngine {
    policy: TariffPolicy,
    categories: HashMap<String, CategoryTariff>,
}

impl TariffEngine {
    pub fn new(policy: TariffPolicy, categories: Vec<CategoryTariff>) -> Self {
        let categories = categories
            .into_iter()
            .map(|mut c| {
                c.slabs.sort_by(|a, b| a.lower_bound.cmp(&b.lower_bound));
                (c.category.clone(), c)
            })
            .collect();

        Self { policy, categories }
    }

    /// Price `consumption_units` for a consumer category.
    ///
    /// Never fails: an unknown category prices to `0.00` with an empty tariff name.
    pub fn compute_bill(&self, consumption_units: Decimal, consumer_category: &str) -> BillAmount {
        let Some(tariff) = self.categories.get(consumer_category) else {
            tracing::debug!(category = consumer_category, "no tariff for category, billing zero");
            return BillAmount::zero();
        };

        let units = consumption_units.max(Decimal::ZERO);
        let amount = match self.policy {
            TariffPolicy::Slab if !tariff.slabs.is_empty() => slab_charge(&tariff.slabs, units),
            _ => units * tariff.rate,
        };

        BillAmount {
            amount: round_money(amount),
            tariff_name: tariff.name.clone(),
        }
    }
}

/// Walk slabs in ascending order, charging each its share of the remaining units.
/// Whatever exceeds the last slab is charged at the last slab's rate.
fn slab_charge(slabs: &[TariffSlab], units: Decimal) -> Decimal {
    let mut remaining = units;
    let mut total = Decimal::ZERO;

    for (idx, slab) in slabs.iter().enumerate() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let is_last = idx + 1 == slabs.len();
        let take = match slab.width() {
            Some(width) if !is_last => remaining.min(width),
            _ => remaining,
        };
        total += take * slab.rate;
        remaining -= take;
    }

    total
}
