//! Campaign store seam — the read/update surface the automation controller
//! depends on, plus an in-memory implementation for development and tests.

pub mod memory;

pub use memory::InMemoryCampaignStore;

use adpilot_core::types::{Campaign, Link, Phase};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Read/update operations the controller needs from campaign persistence.
///
/// Production backs this with the relational store; [`InMemoryCampaignStore`]
/// provides the same surface for development and testing.
pub trait CampaignStore: Send + Sync {
    fn get_campaign(&self, id: Uuid) -> Option<Campaign>;

    /// Campaigns with `automation_enabled = true`, in creation order.
    fn list_enabled_campaigns(&self) -> Vec<Campaign>;

    /// A campaign's links with `status = active` only.
    fn list_active_links(&self, campaign_id: Uuid) -> Vec<Link>;

    /// Persist a controller phase transition. Implementations must keep
    /// `phase_entered_at` monotonically non-decreasing.
    fn update_phase(&self, id: Uuid, phase: Phase, entered_at: DateTime<Utc>);

    /// Refresh the cached last-observed daily spend.
    fn update_spend_cache(&self, id: Uuid, amount: f64, date: NaiveDate);
}
