//! Ad platform client seam — the handful of calls the automation controller
//! makes against the external ad-buying platform, each of which may fail
//! transiently.

pub mod client;
pub mod rest;
pub mod simulated;

pub use client::{AdPlatformClient, PlatformError, PlatformStatus};
pub use rest::RestAdPlatformClient;
pub use simulated::SimulatedPlatformClient;
