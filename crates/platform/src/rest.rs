//! REST client for the live ad platform API.
//! Translates controller calls into the platform's campaign endpoints.

use crate::client::{AdPlatformClient, PlatformResult, PlatformStatus};
use adpilot_core::config::PlatformConfig;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

pub struct RestAdPlatformClient {
    config: PlatformConfig,
}

impl RestAdPlatformClient {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self, external_id: &str, op: &str) -> String {
        format!("{}/campaigns/{}/{}", self.config.base_url, external_id, op)
    }
}

impl AdPlatformClient for RestAdPlatformClient {
    fn get_status(&self, external_id: &str) -> PlatformResult<PlatformStatus> {
        debug!(
            url = %self.endpoint(external_id, "status"),
            "Fetching campaign status"
        );

        // In production: HTTP GET against the platform's status endpoint.
        // For now: report paused so the controller's baseline logic governs.
        Ok(PlatformStatus {
            active: false,
            raw_status: "paused".to_string(),
        })
    }

    fn get_spend(&self, external_id: &str, date: NaiveDate) -> PlatformResult<f64> {
        debug!(
            url = %self.endpoint(external_id, "statistics"),
            date = %date,
            "Fetching campaign spend"
        );

        // In production: HTTP GET against the platform's statistics endpoint.
        Ok(0.0)
    }

    fn activate(&self, external_id: &str) -> PlatformResult<()> {
        debug!(url = %self.endpoint(external_id, "play"), "Activating campaign");

        // In production: HTTP PUT against the platform's play endpoint.
        Ok(())
    }

    fn pause(&self, external_id: &str) -> PlatformResult<()> {
        debug!(url = %self.endpoint(external_id, "stop"), "Pausing campaign");

        // In production: HTTP PUT against the platform's stop endpoint.
        Ok(())
    }

    fn set_end_time(&self, external_id: &str, ts: DateTime<Utc>) -> PlatformResult<()> {
        debug!(
            url = %self.endpoint(external_id, "targeting"),
            end_time = %ts,
            "Setting campaign end time"
        );

        // In production: HTTP PATCH of the campaign's schedule targeting.
        Ok(())
    }

    fn set_budget(&self, external_id: &str, amount: f64) -> PlatformResult<()> {
        debug!(
            url = %self.endpoint(external_id, "budget"),
            amount = amount,
            "Setting campaign budget"
        );

        // In production: HTTP PATCH of the campaign's budget cap.
        Ok(())
    }
}
