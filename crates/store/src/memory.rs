//! In-memory campaign store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.
//! This provides the same API surface for development and testing.

use crate::CampaignStore;
use adpilot_core::types::{Campaign, Link, LinkStatus, Phase};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Thread-safe in-memory store for campaigns and their tracked links.
#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: DashMap<Uuid, Campaign>,
    links: DashMap<Uuid, Link>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with a few campaigns and links for local runs.
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        store.seed_demo_data();
        info!("Campaign store initialized (in-memory, development mode)");
        store
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn insert_campaign(&self, campaign: Campaign) -> Uuid {
        let id = campaign.id;
        self.campaigns.insert(id, campaign);
        id
    }

    pub fn list_campaigns(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        campaigns
    }

    pub fn set_automation_enabled(&self, id: Uuid, enabled: bool) -> bool {
        self.campaigns
            .get_mut(&id)
            .map(|mut entry| {
                let c = entry.value_mut();
                c.automation_enabled = enabled;
                c.updated_at = Utc::now();
            })
            .is_some()
    }

    pub fn delete_campaign(&self, id: Uuid) -> bool {
        let removed = self.campaigns.remove(&id).is_some();
        if removed {
            let link_ids: Vec<Uuid> = self
                .links
                .iter()
                .filter(|r| r.value().campaign_id == id)
                .map(|r| *r.key())
                .collect();
            for link_id in link_ids {
                self.links.remove(&link_id);
            }
        }
        removed
    }

    // ─── Links ─────────────────────────────────────────────────────────────

    pub fn add_link(&self, campaign_id: Uuid, url: &str, click_limit: u64) -> Uuid {
        let link = Link {
            id: Uuid::new_v4(),
            campaign_id,
            url: url.to_string(),
            click_limit,
            clicks: 0,
            status: LinkStatus::Active,
        };
        let id = link.id;
        self.links.insert(id, link);
        id
    }

    pub fn set_link_status(&self, id: Uuid, status: LinkStatus) -> bool {
        self.links
            .get_mut(&id)
            .map(|mut entry| entry.value_mut().status = status)
            .is_some()
    }

    /// Accrue clicks on a link, flipping it to completed at its limit.
    /// Called from the redirect-serving path.
    pub fn record_clicks(&self, id: Uuid, count: u64) -> Option<Link> {
        self.links.get_mut(&id).map(|mut entry| {
            let link = entry.value_mut();
            link.clicks += count;
            if link.click_limit > 0 && link.clicks >= link.click_limit {
                link.status = LinkStatus::Completed;
            }
            link.clone()
        })
    }

    fn seed_demo_data(&self) {
        let mut summer = Campaign::new("Summer push", Some("ext-1001".to_string()));
        summer.automation_enabled = true;
        let summer_id = self.insert_campaign(summer);
        self.add_link(summer_id, "https://go.example/summer-a", 25_000);
        self.add_link(summer_id, "https://go.example/summer-b", 10_000);

        let retarget = Campaign::new("Retargeting Q3", Some("ext-1002".to_string()));
        let retarget_id = self.insert_campaign(retarget);
        self.add_link(retarget_id, "https://go.example/rt-main", 4_000);

        // No external id yet: automation stays inert for this one.
        let draft = Campaign::new("October draft", None);
        self.insert_campaign(draft);
    }
}

impl CampaignStore for InMemoryCampaignStore {
    fn get_campaign(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|r| r.value().clone())
    }

    fn list_enabled_campaigns(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|r| r.value().automation_enabled)
            .map(|r| r.value().clone())
            .collect();
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        campaigns
    }

    fn list_active_links(&self, campaign_id: Uuid) -> Vec<Link> {
        self.links
            .iter()
            .filter(|r| {
                r.value().campaign_id == campaign_id && r.value().status == LinkStatus::Active
            })
            .map(|r| r.value().clone())
            .collect()
    }

    fn update_phase(&self, id: Uuid, phase: Phase, entered_at: DateTime<Utc>) {
        if let Some(mut entry) = self.campaigns.get_mut(&id) {
            let c = entry.value_mut();
            c.phase = phase;
            // entered_at never moves backwards, even with skewed callers.
            c.phase_entered_at = entered_at.max(c.phase_entered_at);
            c.updated_at = Utc::now();
        }
    }

    fn update_spend_cache(&self, id: Uuid, amount: f64, date: NaiveDate) {
        if let Some(mut entry) = self.campaigns.get_mut(&id) {
            let c = entry.value_mut();
            c.daily_spent = amount;
            c.daily_spent_date = Some(date);
            c.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_with_campaign() -> (InMemoryCampaignStore, Uuid) {
        let store = InMemoryCampaignStore::new();
        let id = store.insert_campaign(Campaign::new("test", Some("ext-1".to_string())));
        (store, id)
    }

    #[test]
    fn test_active_links_filter_by_status() {
        let (store, cid) = store_with_campaign();
        let a = store.add_link(cid, "https://go.example/a", 100);
        store.add_link(cid, "https://go.example/b", 100);
        store.set_link_status(a, LinkStatus::Paused);

        let active = store.list_active_links(cid);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].url, "https://go.example/b");
    }

    #[test]
    fn test_record_clicks_completes_at_limit() {
        let (store, cid) = store_with_campaign();
        let link_id = store.add_link(cid, "https://go.example/a", 10);

        let link = store.record_clicks(link_id, 9).unwrap();
        assert_eq!(link.status, LinkStatus::Active);

        let link = store.record_clicks(link_id, 1).unwrap();
        assert_eq!(link.status, LinkStatus::Completed);
        assert!(store.list_active_links(cid).is_empty());
    }

    #[test]
    fn test_phase_entered_at_is_monotonic() {
        let (store, cid) = store_with_campaign();
        let now = Utc::now();
        store.update_phase(cid, Phase::Waiting, now);
        // A caller with a stale clock cannot move the timestamp backwards.
        store.update_phase(cid, Phase::PauseMonitor, now - Duration::minutes(5));

        let c = store.get_campaign(cid).unwrap();
        assert_eq!(c.phase, Phase::PauseMonitor);
        assert_eq!(c.phase_entered_at, now);
    }

    #[test]
    fn test_enabled_listing_and_delete() {
        let (store, cid) = store_with_campaign();
        assert!(store.list_enabled_campaigns().is_empty());

        store.set_automation_enabled(cid, true);
        assert_eq!(store.list_enabled_campaigns().len(), 1);

        assert!(store.delete_campaign(cid));
        assert!(store.get_campaign(cid).is_none());
        assert!(store.list_enabled_campaigns().is_empty());
    }
}
