//! Timer registry — owns every live timer the controller holds.
//!
//! Per campaign: at most one repeating monitor task (tagged active or
//! paused) and at most one pending post-pause wait task. Every `start_*`
//! replaces any conflicting timer under the slot's map lock before the new
//! one exists, so the one-timer-per-kind invariant cannot be observed
//! violated. `cancel_all` tears down everything for a campaign and is
//! idempotent.

use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

pub type TickFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type TickFn = Arc<dyn Fn() -> TickFuture + Send + Sync>;

/// Wrap an async closure as a [`TickFn`].
pub fn tick_fn<F, Fut>(f: F) -> TickFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as TickFuture)
}

/// Which monitoring mode a campaign's repeating timer is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    Active,
    Paused,
}

struct RepeatingTimer {
    kind: MonitorKind,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerSlot {
    repeating: Option<RepeatingTimer>,
    wait: Option<JoinHandle<()>>,
}

pub struct TimerRegistry {
    slots: DashMap<Uuid, TimerSlot>,
    monitor_period: Duration,
}

impl TimerRegistry {
    pub fn new(monitor_period: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            monitor_period,
        }
    }

    /// Ensure a repeating monitor in active mode is running for the
    /// campaign, replacing or retagging any existing repeating timer.
    pub fn start_active_monitor(&self, campaign_id: Uuid, tick: TickFn) {
        self.start_repeating(campaign_id, MonitorKind::Active, tick);
    }

    /// Ensure a repeating monitor in paused mode is running for the
    /// campaign, replacing or retagging any existing repeating timer.
    pub fn start_paused_monitor(&self, campaign_id: Uuid, tick: TickFn) {
        self.start_repeating(campaign_id, MonitorKind::Paused, tick);
    }

    fn start_repeating(&self, campaign_id: Uuid, kind: MonitorKind, tick: TickFn) {
        let mut slot = self.slots.entry(campaign_id).or_default();
        if let Some(rep) = slot.repeating.as_mut() {
            if !rep.handle.is_finished() {
                // One self-re-arming loop per campaign: switching mode
                // retags the running task instead of respawning, so a tick
                // can transition its own phase without aborting itself.
                if rep.kind != kind {
                    debug!(campaign_id = %campaign_id, ?kind, "Retagged repeating monitor");
                    rep.kind = kind;
                }
                return;
            }
        }

        let period = self.monitor_period;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The immediate first tick is skipped: a decision was applied
            // just before this timer was armed.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick().await;
            }
        });
        slot.repeating = Some(RepeatingTimer { kind, handle });
        debug!(campaign_id = %campaign_id, ?kind, "Started repeating monitor");
    }

    /// Arm the one-shot post-pause wait, cancelling any wait already
    /// pending for the campaign.
    pub fn start_wait(&self, campaign_id: Uuid, delay: Duration, on_elapsed: TickFn) {
        let mut slot = self.slots.entry(campaign_id).or_default();
        if let Some(prev) = slot.wait.take() {
            prev.abort();
        }
        slot.wait = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_elapsed().await;
        }));
        debug!(campaign_id = %campaign_id, delay_secs = delay.as_secs(), "Armed wait timer");
    }

    /// Cancel every timer for the campaign. Safe to call any number of
    /// times, from any phase, including from inside one of the campaign's
    /// own timer callbacks. Returns true if a slot existed.
    pub fn cancel_all(&self, campaign_id: Uuid) -> bool {
        if let Some((_, slot)) = self.slots.remove(&campaign_id) {
            if let Some(rep) = slot.repeating {
                rep.handle.abort();
            }
            if let Some(wait) = slot.wait {
                wait.abort();
            }
            debug!(campaign_id = %campaign_id, "Cancelled all timers");
            true
        } else {
            false
        }
    }

    /// Mode of the campaign's live repeating monitor, if one is running.
    pub fn monitor_kind(&self, campaign_id: Uuid) -> Option<MonitorKind> {
        self.slots.get(&campaign_id).and_then(|slot| {
            slot.repeating
                .as_ref()
                .filter(|rep| !rep.handle.is_finished())
                .map(|rep| rep.kind)
        })
    }

    /// Whether a wait timer is armed and has not yet fired.
    pub fn has_wait(&self, campaign_id: Uuid) -> bool {
        self.slots
            .get(&campaign_id)
            .map(|slot| {
                slot.wait
                    .as_ref()
                    .map(|h| !h.is_finished())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Number of live timers for the campaign (0, 1, or 2).
    pub fn live_timer_count(&self, campaign_id: Uuid) -> usize {
        self.slots
            .get(&campaign_id)
            .map(|slot| {
                let repeating = slot
                    .repeating
                    .as_ref()
                    .map(|r| usize::from(!r.handle.is_finished()))
                    .unwrap_or(0);
                let wait = slot
                    .wait
                    .as_ref()
                    .map(|h| usize::from(!h.is_finished()))
                    .unwrap_or(0);
                repeating + wait
            })
            .unwrap_or(0)
    }

    /// Campaign ids with a registered slot, live or stale. The sweep uses
    /// this to reap campaigns that were disabled or deleted.
    pub fn tracked_ids(&self) -> Vec<Uuid> {
        self.slots.iter().map(|entry| *entry.key()).collect()
    }
}
