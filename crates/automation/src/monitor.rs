//! Campaign monitor — the per-campaign state machine behind automation.
//!
//! `Disabled → Waiting → {ActiveMonitor, PauseMonitor}` with an
//! `EmptyCapacity` overlay on the paused side. Every timer callback and
//! sweep entry re-checks `automation_enabled` and campaign existence first;
//! that flag is the system's only cancellation mechanism. Platform failures
//! never advance a phase and are retried by whichever tick fires next, so
//! the controller converges on the platform instead of erroring out.

use crate::capacity::remaining_capacity;
use crate::decision::{decide, Action};
use crate::timers::{tick_fn, MonitorKind, TimerRegistry};
use adpilot_core::config::AutomationConfig;
use adpilot_core::types::{Campaign, Phase};
use adpilot_core::{AdPilotError, AdPilotResult};
use adpilot_platform::AdPlatformClient;
use adpilot_store::CampaignStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The last decision the controller evaluated for a campaign, kept for the
/// admin layer.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub action: Action,
    pub spend: f64,
    pub remaining_capacity: u64,
    pub external_active: bool,
    /// True when the decision came from a manual override.
    pub forced: bool,
    pub decided_at: DateTime<Utc>,
}

/// Informational snapshot surfaced to the admin layer.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub phase: Phase,
    pub phase_entered_at: DateTime<Utc>,
    pub last_decision: Option<DecisionRecord>,
}

/// Manual override actions, applied through the same path as automated
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedAction {
    Activate,
    Pause,
}

/// Drives the automation state machine for every enabled campaign.
///
/// All callbacks touching one campaign's phase or timers serialize on that
/// campaign's mutex; different campaigns proceed concurrently.
pub struct CampaignMonitor {
    store: Arc<dyn CampaignStore>,
    platform: Arc<dyn AdPlatformClient>,
    timers: Arc<TimerRegistry>,
    config: AutomationConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    last_decisions: DashMap<Uuid, DecisionRecord>,
    /// Handle to ourselves for the timer callbacks we install.
    self_ref: Weak<CampaignMonitor>,
}

impl CampaignMonitor {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        platform: Arc<dyn AdPlatformClient>,
        timers: Arc<TimerRegistry>,
        config: AutomationConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            store,
            platform,
            timers,
            config,
            locks: DashMap::new(),
            last_decisions: DashMap::new(),
            self_ref: weak.clone(),
        })
    }

    // ─── Sweep drivers ─────────────────────────────────────────────────────

    /// Global sweep over every enabled campaign: baseline fresh enables,
    /// guard campaigns mid-wait, re-arm missing monitors, then reap timers
    /// whose campaigns were disabled or deleted since the last pass.
    pub async fn sweep(&self) {
        let campaigns = self.store.list_enabled_campaigns();
        debug!(count = campaigns.len(), "Automation sweep");
        for campaign in campaigns {
            self.check_campaign(campaign.id).await;
        }

        for id in self.timers.tracked_ids() {
            let enabled = self
                .store
                .get_campaign(id)
                .map(|c| c.automation_enabled)
                .unwrap_or(false);
            if !enabled {
                let lock = self.lock_for(id);
                let _guard = lock.lock().await;
                self.disable_locked(id);
            }
        }
    }

    /// Pause campaigns whose links no longer have any active capacity,
    /// independently of spend, and hand control back the moment a link
    /// becomes active again.
    pub async fn empty_capacity_sweep(&self) {
        for listed in self.store.list_enabled_campaigns() {
            let lock = self.lock_for(listed.id);
            let _guard = lock.lock().await;

            let Some(campaign) = self.store.get_campaign(listed.id) else {
                self.disable_locked(listed.id);
                continue;
            };
            if !campaign.automation_enabled {
                self.disable_locked(campaign.id);
                continue;
            }
            let Some(external_id) = campaign.external_id.clone() else {
                continue;
            };
            // The baseline flow owns campaigns that are disabled or still
            // inside their observation window.
            if matches!(campaign.phase, Phase::Disabled | Phase::Waiting) {
                continue;
            }

            let links = self.store.list_active_links(campaign.id);
            if links.is_empty() {
                let paused = match self.platform.get_status(&external_id) {
                    Ok(status) if status.active => {
                        info!(campaign_id = %campaign.id, "No active links; pausing on platform");
                        match self
                            .platform
                            .pause(&external_id)
                            .and_then(|_| self.platform.set_end_time(&external_id, Utc::now()))
                        {
                            Ok(()) => true,
                            Err(e) => {
                                warn!(
                                    campaign_id = %campaign.id,
                                    error = %e,
                                    "Empty-capacity pause failed; retrying next sweep"
                                );
                                false
                            }
                        }
                    }
                    Ok(_) => true,
                    Err(e) => {
                        warn!(
                            campaign_id = %campaign.id,
                            error = %e,
                            "Status fetch failed in empty-capacity sweep"
                        );
                        false
                    }
                };
                if paused {
                    if campaign.phase != Phase::EmptyCapacity {
                        self.enter_phase(campaign.id, Phase::EmptyCapacity);
                    }
                    self.ensure_monitoring(campaign.id, MonitorKind::Paused);
                }
            } else if campaign.phase == Phase::EmptyCapacity {
                // A link came back; normal phase logic resumes on the next
                // regular tick.
                self.enter_phase(campaign.id, Phase::PauseMonitor);
            }
        }
    }

    /// Evaluate one campaign the way the global sweep would. Also the entry
    /// point for the admin layer to pick up an enable promptly.
    pub async fn check_campaign(&self, id: Uuid) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(campaign) = self.store.get_campaign(id) else {
            self.disable_locked(id);
            return;
        };
        if !campaign.automation_enabled {
            self.disable_locked(id);
            return;
        }
        let Some(external_id) = campaign.external_id.clone() else {
            debug!(campaign_id = %id, "No external platform id; automation inert");
            return;
        };

        match campaign.phase {
            Phase::Disabled => self.begin_baseline(&campaign, &external_id),
            Phase::Waiting => {
                // Lightweight guard: the platform's own scheduling may race
                // the baseline pause; re-assert it if a spot-check finds the
                // campaign active.
                match self.platform.get_status(&external_id) {
                    Ok(status) if status.active => {
                        info!(campaign_id = %id, "Platform drifted active during wait; re-pausing");
                        if let Err(e) = self
                            .platform
                            .pause(&external_id)
                            .and_then(|_| self.platform.set_end_time(&external_id, Utc::now()))
                        {
                            warn!(
                                campaign_id = %id,
                                error = %e,
                                "Re-pause during wait failed; retrying next sweep"
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(campaign_id = %id, error = %e, "Status spot-check failed during wait")
                    }
                }
                // The wait can be lost across a restart; re-arm the full
                // window rather than guess the remainder.
                if !self.timers.has_wait(id) {
                    self.arm_wait(&campaign);
                }
            }
            Phase::ActiveMonitor => self.ensure_monitoring(id, MonitorKind::Active),
            Phase::PauseMonitor | Phase::EmptyCapacity => {
                self.ensure_monitoring(id, MonitorKind::Paused)
            }
        }
    }

    // ─── Admin surface ─────────────────────────────────────────────────────

    /// Snapshot for display; never reports failures as fatal.
    pub fn monitor_status(&self, id: Uuid) -> Option<MonitorStatus> {
        self.store.get_campaign(id).map(|c| MonitorStatus {
            phase: c.phase,
            phase_entered_at: c.phase_entered_at,
            last_decision: self.last_decisions.get(&id).map(|r| r.clone()),
        })
    }

    /// Manual override. Bypasses the decision engine but goes through the
    /// same application logic, so timers and the persisted phase follow.
    /// For a campaign with automation off the platform calls are issued
    /// directly and no timers are left behind.
    pub async fn force_action(&self, id: Uuid, forced: ForcedAction) -> AdPilotResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let campaign = self
            .store
            .get_campaign(id)
            .ok_or(AdPilotError::CampaignNotFound(id))?;
        let external_id = campaign
            .external_id
            .clone()
            .ok_or(AdPilotError::NoExternalId(id))?;

        let action = match forced {
            ForcedAction::Activate => Action::Activate,
            ForcedAction::Pause => Action::Pause,
        };
        let capacity = remaining_capacity(&self.store.list_active_links(id));
        self.record_decision(
            id,
            action,
            campaign.daily_spent,
            capacity,
            campaign.phase.expects_external_active(),
            true,
        );
        info!(campaign_id = %id, ?action, "Manual override");

        if campaign.automation_enabled {
            self.apply_decision(id, &external_id, campaign.phase, action);
            Ok(())
        } else {
            let result = match action {
                Action::Activate => self
                    .platform
                    .set_end_time(&external_id, end_of_utc_day(Utc::now()))
                    .and_then(|_| self.platform.activate(&external_id)),
                _ => self
                    .platform
                    .pause(&external_id)
                    .and_then(|_| self.platform.set_end_time(&external_id, Utc::now())),
            };
            result.map_err(|e| AdPilotError::Platform(e.to_string()))
        }
    }

    // ─── State machine internals ───────────────────────────────────────────

    /// Baseline for a freshly enabled campaign: pause unconditionally, end
    /// delivery now, then hold still for the observation window before
    /// trusting any spend or capacity reading.
    fn begin_baseline(&self, campaign: &Campaign, external_id: &str) {
        let result = self
            .platform
            .pause(external_id)
            .and_then(|_| self.platform.set_end_time(external_id, Utc::now()));
        match result {
            Ok(()) => {
                self.enter_phase(campaign.id, Phase::Waiting);
                self.arm_wait(campaign);
                info!(
                    campaign_id = %campaign.id,
                    wait_minutes = campaign.post_pause_wait_minutes,
                    "Automation enabled; baseline pause issued"
                );
            }
            Err(e) => warn!(
                campaign_id = %campaign.id,
                error = %e,
                "Baseline pause failed; retrying next sweep"
            ),
        }
    }

    fn arm_wait(&self, campaign: &Campaign) {
        // The upgrade only fails during shutdown, when arming is moot.
        let Some(monitor) = self.self_ref.upgrade() else {
            return;
        };
        let id = campaign.id;
        let delay = Duration::from_secs(u64::from(campaign.post_pause_wait_minutes) * 60);
        self.timers.start_wait(
            id,
            delay,
            tick_fn(move || {
                let monitor = Arc::clone(&monitor);
                async move { monitor.handle_wait_elapsed(id).await }
            }),
        );
    }

    async fn handle_wait_elapsed(&self, id: Uuid) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(campaign) = self.store.get_campaign(id) else {
            self.disable_locked(id);
            return;
        };
        if !campaign.automation_enabled {
            self.disable_locked(id);
            return;
        }
        let Some(external_id) = campaign.external_id.clone() else {
            return;
        };
        if campaign.phase != Phase::Waiting {
            // Superseded while the timer was in flight.
            return;
        }

        let today = Utc::now().date_naive();
        let spend = match self.platform.get_spend(&external_id, today) {
            Ok(amount) => {
                self.store.update_spend_cache(id, amount, today);
                amount
            }
            Err(e) => {
                // No repeating timer exists yet to carry the retry, so fall
                // back to paused monitoring; the campaign is known paused.
                warn!(
                    campaign_id = %id,
                    error = %e,
                    "Spend fetch failed after wait; monitoring paused until next tick"
                );
                self.enter_phase(id, Phase::PauseMonitor);
                self.ensure_monitoring(id, MonitorKind::Paused);
                return;
            }
        };

        let capacity = remaining_capacity(&self.store.list_active_links(id));
        // The baseline pause makes the external status known without a fetch.
        let action = decide(spend, capacity, false, &self.config);
        self.record_decision(id, action, spend, capacity, false, false);
        info!(campaign_id = %id, ?action, spend, capacity, "Wait elapsed; applying decision");
        self.apply_decision(id, &external_id, Phase::Waiting, action);
    }

    async fn handle_monitor_tick(&self, id: Uuid) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(campaign) = self.store.get_campaign(id) else {
            self.disable_locked(id);
            return;
        };
        if !campaign.automation_enabled {
            self.disable_locked(id);
            return;
        }
        let Some(external_id) = campaign.external_id.clone() else {
            return;
        };
        let mut phase = campaign.phase;
        if !phase.is_monitoring() {
            return;
        }

        let expected_active = phase.expects_external_active();
        let status = match self.platform.get_status(&external_id) {
            Ok(status) => status,
            Err(e) => {
                warn!(campaign_id = %id, error = %e, "Status fetch failed; retrying next tick");
                return;
            }
        };

        // One corrective call when the platform disagrees with the phase;
        // on failure we stay put and the next tick tries again.
        let mut external_active = status.active;
        let mut corrective_failed = false;
        if status.active != expected_active {
            info!(
                campaign_id = %id,
                raw_status = %status.raw_status,
                ?phase,
                "Platform status disagrees with phase; correcting"
            );
            let corrected = if expected_active {
                self.platform
                    .set_end_time(&external_id, end_of_utc_day(Utc::now()))
                    .and_then(|_| self.platform.activate(&external_id))
            } else {
                self.platform
                    .pause(&external_id)
                    .and_then(|_| self.platform.set_end_time(&external_id, Utc::now()))
            };
            match corrected {
                Ok(()) => external_active = expected_active,
                Err(e) => {
                    warn!(campaign_id = %id, error = %e, "Corrective call failed; retrying next tick");
                    corrective_failed = true;
                }
            }
        }

        let links = self.store.list_active_links(id);
        if phase == Phase::EmptyCapacity {
            if links.is_empty() {
                // Still empty: the 3-minute sweep owns this overlay.
                return;
            }
            self.enter_phase(id, Phase::PauseMonitor);
            phase = Phase::PauseMonitor;
        }

        let capacity = remaining_capacity(&links);
        let today = Utc::now().date_naive();
        let spend = match self.platform.get_spend(&external_id, today) {
            Ok(amount) => {
                self.store.update_spend_cache(id, amount, today);
                amount
            }
            Err(e) => {
                warn!(campaign_id = %id, error = %e, "Spend fetch failed; using cached value");
                if campaign.daily_spent_date == Some(today) {
                    campaign.daily_spent
                } else {
                    return;
                }
            }
        };

        let action = decide(spend, capacity, external_active, &self.config);
        self.record_decision(id, action, spend, capacity, external_active, false);
        debug!(campaign_id = %id, ?action, spend, capacity, external_active, "Monitor tick");
        if corrective_failed {
            // Record only; the next tick re-attempts the correction before
            // any further platform calls are made for this campaign.
            return;
        }
        self.apply_decision(id, &external_id, phase, action);
    }

    /// Apply a decision with success-gated transitions: a phase only moves
    /// once the platform calls for it succeeded.
    fn apply_decision(&self, id: Uuid, external_id: &str, current_phase: Phase, action: Action) {
        match action {
            Action::Activate => {
                let result = self
                    .platform
                    .set_end_time(external_id, end_of_utc_day(Utc::now()))
                    .and_then(|_| self.platform.activate(external_id));
                match result {
                    Ok(()) => {
                        self.enter_phase(id, Phase::ActiveMonitor);
                        self.ensure_monitoring(id, MonitorKind::Active);
                        info!(campaign_id = %id, "Activated campaign on platform");
                    }
                    Err(e) => {
                        warn!(campaign_id = %id, error = %e, "Activate failed; retrying next tick");
                        self.keep_current_monitoring(id, current_phase);
                    }
                }
            }
            Action::Pause => {
                let result = self
                    .platform
                    .pause(external_id)
                    .and_then(|_| self.platform.set_end_time(external_id, Utc::now()));
                match result {
                    Ok(()) => {
                        self.enter_phase(id, Phase::PauseMonitor);
                        self.ensure_monitoring(id, MonitorKind::Paused);
                        info!(campaign_id = %id, "Paused campaign on platform");
                    }
                    Err(e) => {
                        warn!(campaign_id = %id, error = %e, "Pause failed; retrying next tick");
                        self.keep_current_monitoring(id, current_phase);
                    }
                }
            }
            Action::MaintainActive => {
                if current_phase != Phase::ActiveMonitor {
                    self.enter_phase(id, Phase::ActiveMonitor);
                }
                self.ensure_monitoring(id, MonitorKind::Active);
            }
            Action::MaintainPaused => {
                if current_phase != Phase::PauseMonitor {
                    self.enter_phase(id, Phase::PauseMonitor);
                }
                self.ensure_monitoring(id, MonitorKind::Paused);
            }
            Action::NoOp => {
                // Observations recorded; preserve the current monitoring
                // mode. Coming out of the wait the campaign is known paused
                // and monitoring starts there.
                match current_phase {
                    Phase::Waiting => {
                        self.enter_phase(id, Phase::PauseMonitor);
                        self.ensure_monitoring(id, MonitorKind::Paused);
                    }
                    Phase::ActiveMonitor => self.ensure_monitoring(id, MonitorKind::Active),
                    Phase::PauseMonitor | Phase::EmptyCapacity => {
                        self.ensure_monitoring(id, MonitorKind::Paused)
                    }
                    Phase::Disabled => {}
                }
            }
        }
    }

    /// A failed transition leaves the campaign where it was, with its
    /// monitor still running so the next tick retries. From the wait there
    /// is no monitoring mode yet, so paused monitoring carries the retry.
    fn keep_current_monitoring(&self, id: Uuid, current_phase: Phase) {
        match current_phase {
            Phase::ActiveMonitor => self.ensure_monitoring(id, MonitorKind::Active),
            Phase::PauseMonitor | Phase::EmptyCapacity => {
                self.ensure_monitoring(id, MonitorKind::Paused)
            }
            Phase::Waiting => {
                self.enter_phase(id, Phase::PauseMonitor);
                self.ensure_monitoring(id, MonitorKind::Paused);
            }
            Phase::Disabled => {}
        }
    }

    fn ensure_monitoring(&self, id: Uuid, kind: MonitorKind) {
        let Some(monitor) = self.self_ref.upgrade() else {
            return;
        };
        let tick = tick_fn(move || {
            let monitor = Arc::clone(&monitor);
            async move { monitor.handle_monitor_tick(id).await }
        });
        match kind {
            MonitorKind::Active => self.timers.start_active_monitor(id, tick),
            MonitorKind::Paused => self.timers.start_paused_monitor(id, tick),
        }
    }

    /// Unconditional teardown: cancel every timer, persist `Disabled`.
    /// Tolerates being hit mid-wait, mid-monitor, or mid-sweep, repeatedly.
    fn disable_locked(&self, id: Uuid) {
        let had_timers = self.timers.cancel_all(id);
        self.last_decisions.remove(&id);
        self.store.update_phase(id, Phase::Disabled, Utc::now());
        if had_timers {
            info!(campaign_id = %id, "Automation disabled; monitoring stopped");
        }
    }

    fn enter_phase(&self, id: Uuid, phase: Phase) {
        self.store.update_phase(id, phase, Utc::now());
        debug!(campaign_id = %id, ?phase, "Phase transition");
    }

    fn record_decision(
        &self,
        id: Uuid,
        action: Action,
        spend: f64,
        capacity: u64,
        external_active: bool,
        forced: bool,
    ) {
        self.last_decisions.insert(
            id,
            DecisionRecord {
                action,
                spend,
                remaining_capacity: capacity,
                external_active,
                forced,
                decided_at: Utc::now(),
            },
        );
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }
}

/// Last second of the current UTC day, used as the end time when
/// activating so the platform stops delivery at the day boundary on its
/// own.
pub(crate) fn end_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_platform::SimulatedPlatformClient;
    use adpilot_store::InMemoryCampaignStore;
    use chrono::TimeZone;

    fn harness() -> (
        Arc<InMemoryCampaignStore>,
        Arc<SimulatedPlatformClient>,
        Arc<TimerRegistry>,
        Arc<CampaignMonitor>,
    ) {
        let store = Arc::new(InMemoryCampaignStore::new());
        let platform = Arc::new(SimulatedPlatformClient::new());
        let timers = Arc::new(TimerRegistry::new(Duration::from_secs(60)));
        let monitor = CampaignMonitor::new(
            store.clone(),
            platform.clone(),
            timers.clone(),
            AutomationConfig::default(),
        );
        (store, platform, timers, monitor)
    }

    #[test]
    fn test_end_of_utc_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 14, 5, 9).unwrap();
        let end = end_of_utc_day(now);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 8, 30, 23, 59, 59).unwrap());
    }

    #[tokio::test]
    async fn test_monitor_status_unknown_campaign() {
        let (_, _, _, monitor) = harness();
        assert!(monitor.monitor_status(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_force_action_requires_campaign_and_external_id() {
        let (store, _, _, monitor) = harness();
        let missing = monitor.force_action(Uuid::new_v4(), ForcedAction::Pause).await;
        assert!(matches!(missing, Err(AdPilotError::CampaignNotFound(_))));

        let id = store.insert_campaign(Campaign::new("draft", None));
        let inert = monitor.force_action(id, ForcedAction::Activate).await;
        assert!(matches!(inert, Err(AdPilotError::NoExternalId(_))));
    }

    #[tokio::test]
    async fn test_force_action_on_disabled_campaign_leaves_no_timers() {
        let (store, platform, timers, monitor) = harness();
        let id = store.insert_campaign(Campaign::new("manual", Some("ext-9".to_string())));
        platform.seed_campaign("ext-9", false, 0.0);

        monitor.force_action(id, ForcedAction::Activate).await.unwrap();
        assert_eq!(platform.is_active("ext-9"), Some(true));
        assert_eq!(timers.live_timer_count(id), 0);

        let status = monitor.monitor_status(id).unwrap();
        let last = status.last_decision.unwrap();
        assert_eq!(last.action, Action::Activate);
        assert!(last.forced);
    }
}
