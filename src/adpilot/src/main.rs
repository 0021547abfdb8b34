//! AdPilot — spend- and capacity-driven pause/resume automation for ad
//! campaigns on an external ad-buying platform.
//!
//! Main entry point: initializes the store and platform client, then runs
//! the automation schedulers until interrupted.

use adpilot_automation::{CampaignMonitor, Scheduler, TimerRegistry};
use adpilot_core::config::AppConfig;
use adpilot_platform::{AdPlatformClient, RestAdPlatformClient, SimulatedPlatformClient};
use adpilot_store::InMemoryCampaignStore;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "adpilot")]
#[command(about = "Campaign pause/resume automation for external ad platforms")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "ADPILOT__NODE_ID")]
    node_id: Option<String>,

    /// Daily spend threshold in account currency (overrides config)
    #[arg(long, env = "ADPILOT__AUTOMATION__SPEND_THRESHOLD")]
    spend_threshold: Option<f64>,

    /// All-campaigns sweep period in seconds (overrides config)
    #[arg(long, env = "ADPILOT__AUTOMATION__SWEEP_INTERVAL_SECS")]
    sweep_interval: Option<u64>,

    /// Use the simulated platform client regardless of config
    #[arg(long, default_value_t = false)]
    simulated: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adpilot=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("AdPilot starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(threshold) = cli.spend_threshold {
        config.automation.spend_threshold = threshold;
    }
    if let Some(secs) = cli.sweep_interval {
        config.automation.sweep_interval_secs = secs;
    }
    if cli.simulated {
        config.platform.mode = "simulated".to_string();
    }

    info!(
        node_id = %config.node_id,
        platform_mode = %config.platform.mode,
        spend_threshold = config.automation.spend_threshold,
        low_capacity = config.automation.low_capacity,
        high_capacity = config.automation.high_capacity,
        "Configuration loaded"
    );

    // Campaign store (in-memory; production wires the relational store
    // behind the same trait).
    let store = Arc::new(InMemoryCampaignStore::with_demo_data());

    // Ad platform client
    let platform: Arc<dyn AdPlatformClient> = match config.platform.mode.as_str() {
        "rest" => Arc::new(RestAdPlatformClient::new(config.platform.clone())),
        _ => {
            let sim = SimulatedPlatformClient::with_fail_rate(config.platform.simulated_fail_rate);
            for campaign in store.list_campaigns() {
                if let Some(external_id) = &campaign.external_id {
                    sim.seed_campaign(external_id, false, 0.0);
                }
            }
            Arc::new(sim)
        }
    };

    // Controller wiring
    let timers = Arc::new(TimerRegistry::new(Duration::from_secs(
        config.automation.monitor_interval_secs,
    )));
    let monitor = CampaignMonitor::new(store, platform, timers, config.automation.clone());
    let handles = Scheduler::new(monitor, &config.automation).spawn();

    info!("AdPilot running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
