//! Global periodic drivers — thin interval loops over the campaign
//! monitor. One sweeps every enabled campaign, one handles the
//! empty-capacity check on its own faster cadence.

use crate::monitor::CampaignMonitor;
use adpilot_core::config::AutomationConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

pub struct Scheduler {
    monitor: Arc<CampaignMonitor>,
    sweep_period: Duration,
    empty_capacity_period: Duration,
}

impl Scheduler {
    pub fn new(monitor: Arc<CampaignMonitor>, config: &AutomationConfig) -> Self {
        Self {
            monitor,
            sweep_period: Duration::from_secs(config.sweep_interval_secs),
            empty_capacity_period: Duration::from_secs(config.empty_capacity_interval_secs),
        }
    }

    /// Spawn both drivers. The first sweep runs immediately so campaigns
    /// that were enabled while the process was down get picked up at
    /// startup. A failure for one campaign is contained inside the monitor
    /// and never stops a loop.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        info!(
            sweep_secs = self.sweep_period.as_secs(),
            empty_capacity_secs = self.empty_capacity_period.as_secs(),
            "Starting automation schedulers"
        );

        let sweep_monitor = Arc::clone(&self.monitor);
        let sweep_period = self.sweep_period;
        let sweep = tokio::spawn(async move {
            let mut ticker = interval(sweep_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweep_monitor.sweep().await;
            }
        });

        let empty_monitor = Arc::clone(&self.monitor);
        let empty_period = self.empty_capacity_period;
        let empty_capacity = tokio::spawn(async move {
            let mut ticker = interval(empty_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                empty_monitor.empty_capacity_sweep().await;
            }
        });

        vec![sweep, empty_capacity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timers::TimerRegistry;
    use adpilot_core::types::Campaign;
    use adpilot_platform::SimulatedPlatformClient;
    use adpilot_store::{CampaignStore, InMemoryCampaignStore};

    #[tokio::test(start_paused = true)]
    async fn test_startup_sweep_picks_up_enabled_campaign() {
        let store = Arc::new(InMemoryCampaignStore::new());
        let platform = Arc::new(SimulatedPlatformClient::new());
        let timers = Arc::new(TimerRegistry::new(Duration::from_secs(60)));
        let config = AutomationConfig::default();
        let monitor =
            CampaignMonitor::new(store.clone(), platform.clone(), timers.clone(), config.clone());

        let mut campaign = Campaign::new("startup", Some("ext-s1".to_string()));
        campaign.automation_enabled = true;
        let id = store.insert_campaign(campaign);
        platform.seed_campaign("ext-s1", true, 0.0);

        let handles = Scheduler::new(monitor, &config).spawn();
        // First sweep fires immediately; give the spawned loops a chance
        // to run under the paused clock.
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        // Baseline pause was issued and the wait timer is pending.
        assert_eq!(platform.is_active("ext-s1"), Some(false));
        assert!(timers.has_wait(id));
        let phase = store.get_campaign(id).unwrap().phase;
        assert_eq!(phase, adpilot_core::types::Phase::Waiting);

        for handle in handles {
            handle.abort();
        }
    }
}
