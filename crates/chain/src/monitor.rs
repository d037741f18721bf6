//! Keeper alert rules.

use alloy::primitives::U256;

use lst_leverage_core::KeeperConfig;

use crate::snapshot::{MarketSnapshot, PositionReport};

/// Condition the keeper should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// LTV moved further from target than the drift threshold
    LtvDrift { ltv: U256, target: U256 },
    /// LTV within the configured margin of max LTV
    NearMaxLtv { ltv: U256, max_ltv: U256 },
    /// Debt at or above collateral value
    Underwater { collateral: U256, debt: U256 },
    /// Price feed answer older than the staleness threshold
    StalePrice { updated_at: u64, age_secs: u64 },
}

impl Alert {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LtvDrift { .. } => "ltv_drift",
            Self::NearMaxLtv { .. } => "near_max_ltv",
            Self::Underwater { .. } => "underwater",
            Self::StalePrice { .. } => "stale_price",
        }
    }
}

/// Evaluate the alert rules at `now` (unix seconds).
pub fn assess(
    snapshot: &MarketSnapshot,
    report: &PositionReport,
    config: &KeeperConfig,
    now: u64,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    // Nothing is at risk without collateral
    if !report.position.collateral.is_zero() {
        if report.drift_exceeds(config.ltv_drift_alert) {
            alerts.push(Alert::LtvDrift {
                ltv: report.ltv,
                target: report.target_ltv,
            });
        }
        if report.near_max_ltv(config.max_ltv_margin) {
            alerts.push(Alert::NearMaxLtv {
                ltv: report.ltv,
                max_ltv: report.max_ltv,
            });
        }
    }
    if report.is_underwater() {
        alerts.push(Alert::Underwater {
            collateral: report.position.collateral,
            debt: report.position.debt,
        });
    }

    if snapshot.price.is_stale(config.price_staleness_secs, now) {
        alerts.push(Alert::StalePrice {
            updated_at: snapshot.price.updated_at,
            age_secs: now.saturating_sub(snapshot.price.updated_at),
        });
    }

    alerts
}
