use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ad campaign under automation, mirrored against one campaign on the
/// external ad-buying platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    /// Id of the counterpart campaign on the external platform. The
    /// controller is inert for a campaign without one.
    pub external_id: Option<String>,
    /// Toggled by operator action only; the sole cancellation mechanism.
    pub automation_enabled: bool,
    /// Mandatory observation window after an automated pause before the
    /// controller acts on freshly observed spend/capacity.
    pub post_pause_wait_minutes: u32,
    /// Last persisted controller phase.
    pub phase: Phase,
    pub phase_entered_at: DateTime<Utc>,
    /// Last observed daily spend, refreshed opportunistically on ticks.
    pub daily_spent: f64,
    pub daily_spent_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tracked redirect link belonging to a campaign. Clicks accrue through
/// the redirect-serving path; only active links contribute click capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub url: String,
    /// Total clicks this link may deliver. Zero means no capacity, not
    /// unlimited (the billing layer uses the opposite convention; do not
    /// conflate the two).
    pub click_limit: u64,
    pub clicks: u64,
    pub status: LinkStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Paused,
    Completed,
    Deleted,
    Rejected,
}

/// State-machine phase of the Campaign Monitor for one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Automation off or never started; no live timers.
    Disabled,
    /// Baseline pause issued, observation window running.
    Waiting,
    /// Campaign active on the platform, 60 s monitor running.
    ActiveMonitor,
    /// Campaign paused on the platform, 60 s monitor running.
    PauseMonitor,
    /// Paused because the campaign has zero active links; exits as soon as
    /// a link becomes active again.
    EmptyCapacity,
}

impl Phase {
    /// Whether the external platform is expected to show the campaign
    /// active in this phase.
    pub fn expects_external_active(self) -> bool {
        matches!(self, Phase::ActiveMonitor)
    }

    /// Phases driven by the repeating 60 s monitor.
    pub fn is_monitoring(self) -> bool {
        matches!(
            self,
            Phase::ActiveMonitor | Phase::PauseMonitor | Phase::EmptyCapacity
        )
    }
}

pub const DEFAULT_POST_PAUSE_WAIT_MINUTES: u32 = 10;

impl Campaign {
    pub fn new(name: impl Into<String>, external_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            external_id,
            automation_enabled: false,
            post_pause_wait_minutes: DEFAULT_POST_PAUSE_WAIT_MINUTES,
            phase: Phase::Disabled,
            phase_entered_at: now,
            daily_spent: 0.0,
            daily_spent_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_expectations() {
        assert!(Phase::ActiveMonitor.expects_external_active());
        assert!(!Phase::PauseMonitor.expects_external_active());
        assert!(!Phase::EmptyCapacity.expects_external_active());
        assert!(!Phase::Waiting.expects_external_active());
        assert!(Phase::EmptyCapacity.is_monitoring());
        assert!(!Phase::Waiting.is_monitoring());
    }

    #[test]
    fn test_phase_serde_snake_case() {
        let json = serde_json::to_string(&Phase::PauseMonitor).unwrap();
        assert_eq!(json, "\"pause_monitor\"");
        let back: Phase = serde_json::from_str("\"empty_capacity\"").unwrap();
        assert_eq!(back, Phase::EmptyCapacity);
    }
}
