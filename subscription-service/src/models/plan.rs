//! Plan catalog.
//!
//! Plan definitions are static configuration, not database rows. A status
//! read always resolves to exactly one of these definitions so callers never
//! see a partially-upgraded limits object.

use serde::{Deserialize, Serialize};

/// Sentinel for "no limit" in [`PlanLimits`].
pub const UNLIMITED: i32 = -1;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }

    /// Lenient parse for values read back from our own database.
    pub fn from_string(s: &str) -> Self {
        match s {
            "pro" => Plan::Pro,
            "enterprise" => Plan::Enterprise,
            _ => Plan::Free,
        }
    }

    /// Strict parse for caller-supplied plan names (checkout requests).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }

    pub fn can_upgrade(&self) -> bool {
        !matches!(self, Plan::Enterprise)
    }

    pub fn can_downgrade(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    pub fn definition(&self) -> &'static PlanDefinition {
        match self {
            Plan::Free => &FREE,
            Plan::Pro => &PRO,
            Plan::Enterprise => &ENTERPRISE,
        }
    }
}

/// Usage limits attached to a plan. `UNLIMITED` (-1) means no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub workspaces: i32,
    pub summaries_per_month: i32,
}

/// Static definition of a plan tier.
#[derive(Debug, Clone, Serialize)]
pub struct PlanDefinition {
    pub plan: Plan,
    pub display_name: &'static str,
    pub monthly_price_cents: i64,
    pub currency: &'static str,
    pub features: &'static [&'static str],
    pub limits: PlanLimits,
}

static FREE: PlanDefinition = PlanDefinition {
    plan: Plan::Free,
    display_name: "Free",
    monthly_price_cents: 0,
    currency: "USD",
    features: &["Basic summaries", "1 workspace", "Community support"],
    limits: PlanLimits {
        workspaces: 1,
        summaries_per_month: 10,
    },
};

static PRO: PlanDefinition = PlanDefinition {
    plan: Plan::Pro,
    display_name: "Pro",
    monthly_price_cents: 2900,
    currency: "USD",
    features: &[
        "Advanced summaries",
        "Up to 3 workspaces",
        "Priority support",
        "Export to PDF and Excel",
    ],
    limits: PlanLimits {
        workspaces: 3,
        summaries_per_month: 100,
    },
};

static ENTERPRISE: PlanDefinition = PlanDefinition {
    plan: Plan::Enterprise,
    display_name: "Enterprise",
    monthly_price_cents: 9900,
    currency: "USD",
    features: &[
        "Unlimited summaries",
        "Unlimited workspaces",
        "Dedicated support",
        "Custom integrations",
        "Audit exports",
    ],
    limits: PlanLimits {
        workspaces: UNLIMITED,
        summaries_per_month: UNLIMITED,
    },
};
