//! Client trait and shared types for the external ad platform.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Failures from the external ad platform. All of these are treated as
/// transient by the controller: logged, then retried on the next tick.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Platform API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("Unknown campaign on platform: {0}")]
    UnknownCampaign(String),
}

/// Current status of a campaign as reported by the platform.
#[derive(Debug, Clone)]
pub struct PlatformStatus {
    pub active: bool,
    /// The platform's own status string, surfaced for operators.
    pub raw_status: String,
}

/// Calls the controller issues against the external ad-buying platform.
///
/// `set_budget` belongs to the link-budget tracker, which shares this
/// client; the monitor itself never calls it.
pub trait AdPlatformClient: Send + Sync {
    fn get_status(&self, external_id: &str) -> PlatformResult<PlatformStatus>;

    /// Spend reported for the given UTC day, in account currency.
    fn get_spend(&self, external_id: &str, date: NaiveDate) -> PlatformResult<f64>;

    fn activate(&self, external_id: &str) -> PlatformResult<()>;

    fn pause(&self, external_id: &str) -> PlatformResult<()>;

    fn set_end_time(&self, external_id: &str, ts: DateTime<Utc>) -> PlatformResult<()>;

    fn set_budget(&self, external_id: &str, amount: f64) -> PlatformResult<()>;
}
