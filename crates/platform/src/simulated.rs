//! Simulated ad platform for development and tests.
//!
//! Keeps per-campaign platform state in memory, records every call in an
//! inspectable log, and can inject transient failures either at a fixed
//! rate or on demand.

use crate::client::{AdPlatformClient, PlatformError, PlatformResult, PlatformStatus};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// One call the controller made against the simulated platform.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    GetStatus(String),
    GetSpend(String, NaiveDate),
    Activate(String),
    Pause(String),
    SetEndTime(String, DateTime<Utc>),
    SetBudget(String, f64),
}

#[derive(Debug, Clone)]
struct SimState {
    active: bool,
    raw_status: String,
    spend_today: f64,
    end_time: Option<DateTime<Utc>>,
    budget: Option<f64>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            active: false,
            raw_status: "paused".to_string(),
            spend_today: 0.0,
            end_time: None,
            budget: None,
        }
    }
}

#[derive(Default)]
pub struct SimulatedPlatformClient {
    campaigns: DashMap<String, SimState>,
    calls: Mutex<Vec<PlatformCall>>,
    /// Probability that any single call fails with a transport error.
    fail_rate: f64,
    /// Countdown of forced failures, consumed before `fail_rate` applies.
    forced_failures: AtomicU32,
    /// Operation names whose next invocation fails, consumed one per call.
    op_failures: Mutex<Vec<String>>,
}

impl SimulatedPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fail_rate(fail_rate: f64) -> Self {
        Self {
            fail_rate,
            ..Self::default()
        }
    }

    /// Register a campaign with the given platform-side state.
    pub fn seed_campaign(&self, external_id: &str, active: bool, spend_today: f64) {
        self.campaigns.insert(
            external_id.to_string(),
            SimState {
                active,
                raw_status: if active { "working" } else { "paused" }.to_string(),
                spend_today,
                end_time: None,
                budget: None,
            },
        );
    }

    /// Flip a campaign's platform-side status out from under the
    /// controller, e.g. to model the platform's own scheduling.
    pub fn drift_status(&self, external_id: &str, active: bool) {
        if let Some(mut state) = self.campaigns.get_mut(external_id) {
            state.active = active;
            state.raw_status = if active { "working" } else { "paused" }.to_string();
        }
    }

    pub fn set_spend(&self, external_id: &str, spend_today: f64) {
        if let Some(mut state) = self.campaigns.get_mut(external_id) {
            state.spend_today = spend_today;
        }
    }

    pub fn is_active(&self, external_id: &str) -> Option<bool> {
        self.campaigns.get(external_id).map(|s| s.active)
    }

    /// Make the next `count` calls fail with a transport error.
    pub fn fail_next(&self, count: u32) {
        self.forced_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next invocation of one operation (`"pause"`, `"get_spend"`,
    /// ...) fail, leaving other calls untouched.
    pub fn fail_next_call(&self, op: &str) {
        self.op_failures.lock().push(op.to_string());
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: PlatformCall) {
        debug!(?call, "Simulated platform call");
        self.calls.lock().push(call);
    }

    fn maybe_fail(&self, op: &str) -> PlatformResult<()> {
        {
            let mut ops = self.op_failures.lock();
            if let Some(pos) = ops.iter().position(|o| o == op) {
                ops.remove(pos);
                return Err(PlatformError::Transport("injected failure".to_string()));
            }
        }
        loop {
            let remaining = self.forced_failures.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .forced_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(PlatformError::Transport("injected failure".to_string()));
            }
        }
        if self.fail_rate > 0.0 && rand::random::<f64>() < self.fail_rate {
            return Err(PlatformError::Transport("simulated flake".to_string()));
        }
        Ok(())
    }

    fn state(&self, external_id: &str) -> PlatformResult<SimState> {
        self.campaigns
            .get(external_id)
            .map(|s| s.clone())
            .ok_or_else(|| PlatformError::UnknownCampaign(external_id.to_string()))
    }
}

impl AdPlatformClient for SimulatedPlatformClient {
    fn get_status(&self, external_id: &str) -> PlatformResult<PlatformStatus> {
        self.record(PlatformCall::GetStatus(external_id.to_string()));
        self.maybe_fail("get_status")?;
        let state = self.state(external_id)?;
        Ok(PlatformStatus {
            active: state.active,
            raw_status: state.raw_status,
        })
    }

    fn get_spend(&self, external_id: &str, date: NaiveDate) -> PlatformResult<f64> {
        self.record(PlatformCall::GetSpend(external_id.to_string(), date));
        self.maybe_fail("get_spend")?;
        Ok(self.state(external_id)?.spend_today)
    }

    fn activate(&self, external_id: &str) -> PlatformResult<()> {
        self.record(PlatformCall::Activate(external_id.to_string()));
        self.maybe_fail("activate")?;
        let mut state = self
            .campaigns
            .get_mut(external_id)
            .ok_or_else(|| PlatformError::UnknownCampaign(external_id.to_string()))?;
        state.active = true;
        state.raw_status = "working".to_string();
        Ok(())
    }

    fn pause(&self, external_id: &str) -> PlatformResult<()> {
        self.record(PlatformCall::Pause(external_id.to_string()));
        self.maybe_fail("pause")?;
        let mut state = self
            .campaigns
            .get_mut(external_id)
            .ok_or_else(|| PlatformError::UnknownCampaign(external_id.to_string()))?;
        state.active = false;
        state.raw_status = "paused".to_string();
        Ok(())
    }

    fn set_end_time(&self, external_id: &str, ts: DateTime<Utc>) -> PlatformResult<()> {
        self.record(PlatformCall::SetEndTime(external_id.to_string(), ts));
        self.maybe_fail("set_end_time")?;
        let mut state = self
            .campaigns
            .get_mut(external_id)
            .ok_or_else(|| PlatformError::UnknownCampaign(external_id.to_string()))?;
        state.end_time = Some(ts);
        Ok(())
    }

    fn set_budget(&self, external_id: &str, amount: f64) -> PlatformResult<()> {
        self.record(PlatformCall::SetBudget(external_id.to_string(), amount));
        self.maybe_fail("set_budget")?;
        let mut state = self
            .campaigns
            .get_mut(external_id)
            .ok_or_else(|| PlatformError::UnknownCampaign(external_id.to_string()))?;
        state.budget = Some(amount);
        Ok(())
    }
}
