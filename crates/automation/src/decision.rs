//! Decision engine — maps (spend, remaining capacity, external status) to
//! the single action the monitor should take. Pure and deterministic.

use adpilot_core::config::AutomationConfig;
use serde::{Deserialize, Serialize};

/// What the monitor should do for a campaign on this evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Set end-of-day end time, then activate on the platform.
    Activate,
    /// Pause on the platform, then set the end time to now.
    Pause,
    /// Keep the active monitor running; no platform call.
    MaintainActive,
    /// Keep the paused monitor running; no platform call.
    MaintainPaused,
    /// Record observations only; preserve the current monitoring mode.
    NoOp,
}

/// Decide the next action for a campaign.
///
/// Once daily spend reaches the threshold the controller stands down and
/// lets the platform's own budget cap govern the campaign, whatever the
/// capacity or status. Below it, capacity at or above the high mark means
/// the campaign should run, at or below the low mark it should not, and the
/// band in between changes nothing. All comparisons are inclusive, so a
/// value sitting exactly on a threshold resolves the same way every time.
pub fn decide(
    spend: f64,
    remaining_capacity: u64,
    external_active: bool,
    config: &AutomationConfig,
) -> Action {
    if spend >= config.spend_threshold {
        return Action::NoOp;
    }

    if remaining_capacity >= config.high_capacity {
        if external_active {
            Action::MaintainActive
        } else {
            Action::Activate
        }
    } else if remaining_capacity <= config.low_capacity {
        if external_active {
            Action::Pause
        } else {
            Action::MaintainPaused
        }
    } else {
        Action::NoOp
    }
}
