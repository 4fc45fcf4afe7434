// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paid plans, their durations and price tiers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A purchasable plan. Serialized as its upper-case plan identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Plan {
    #[serde(rename = "SAGE_MODE_MONTHLY")]
    SageModeMonthly,
    #[serde(rename = "SAGE_MODE_QUARTERLY")]
    SageModeQuarterly,
    #[serde(rename = "SAGE_MODE_YEARLY")]
    SageModeYearly,
}

/// Static plan table: (plan, days, USD cents, INR paise).
const PLAN_TABLE: [(Plan, i64, u64, u64); 3] = [
    (Plan::SageModeMonthly, 30, 999, 49_900),
    (Plan::SageModeQuarterly, 90, 2_499, 129_900),
    (Plan::SageModeYearly, 365, 7_999, 399_900),
];

impl Plan {
    pub const ALL: [Plan; 3] = [
        Plan::SageModeMonthly,
        Plan::SageModeQuarterly,
        Plan::SageModeYearly,
    ];

    /// Rows are stored in declaration order.
    fn row(self) -> (Plan, i64, u64, u64) {
        PLAN_TABLE[self as usize]
    }

    /// Plan identifier as stored and sent to providers.
    pub fn id(self) -> &'static str {
        match self {
            Plan::SageModeMonthly => "SAGE_MODE_MONTHLY",
            Plan::SageModeQuarterly => "SAGE_MODE_QUARTERLY",
            Plan::SageModeYearly => "SAGE_MODE_YEARLY",
        }
    }

    /// Human-readable name for checkout pages.
    pub fn display_name(self) -> &'static str {
        match self {
            Plan::SageModeMonthly => "Sage Mode (1 month)",
            Plan::SageModeQuarterly => "Sage Mode (3 months)",
            Plan::SageModeYearly => "Sage Mode (12 months)",
        }
    }

    /// Entitlement length in days.
    pub fn duration_days(self) -> i64 {
        self.row().1
    }

    /// When an entitlement bought at `now` ends.
    pub fn expires_at(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.duration_days())
    }

    /// Price in the currency's minor unit.
    pub fn price_minor(self, currency: Currency) -> u64 {
        let (_, _, usd, inr) = self.row();
        match currency {
            Currency::Usd => usd,
            Currency::Inr => inr,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown plan: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::ALL
            .into_iter()
            .find(|plan| plan.id() == s)
            .ok_or_else(|| UnknownPlan(s.to_string()))
    }
}

/// Charge currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Inr,
}

impl Currency {
    /// Price tier for a billing country (ISO 3166 alpha-2).
    pub fn for_country(country: &str) -> Self {
        if country.eq_ignore_ascii_case("IN") {
            Currency::Inr
        } else {
            Currency::Usd
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Inr => "INR",
        }
    }

    /// Format a minor-unit amount as a decimal string ("79.99").
    pub fn format_major(self, minor: u64) -> String {
        format!("{}.{:02}", minor / 100, minor % 100)
    }
}
