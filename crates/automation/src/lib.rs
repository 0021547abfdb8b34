//! Campaign automation controller — pauses and resumes campaigns on the
//! external ad platform from two signals: money spent today and remaining
//! click capacity of the campaign's tracked links.
//!
//! One timer-driven state machine per enabled campaign, driven by two
//! global sweeps plus a per-campaign repeating monitor and a one-shot
//! post-pause wait timer.

pub mod capacity;
pub mod decision;
pub mod monitor;
pub mod scheduler;
pub mod timers;

pub use capacity::remaining_capacity;
pub use decision::{decide, Action};
pub use monitor::{CampaignMonitor, DecisionRecord, ForcedAction, MonitorStatus};
pub use scheduler::Scheduler;
pub use timers::{MonitorKind, TimerRegistry};
