//! Energy Meter Aggregator Library
//!
//! Tracks power and energy consumption for a set of named meters fed by sensor
//! updates, splits consumption into lifetime and current print job figures
//! based on job lifecycle events, and serves the totals over HTTP.

pub mod config;
pub mod energy_manager;
pub mod error;
pub mod event_coordinator;
pub mod home_assistant;
pub mod http_api;
pub mod job_state;
pub mod meter_account;
pub mod sensor_poller;
pub mod sensor_reference;

// Re-export commonly used types for easier access
pub use config::{AppConfig, MeterConfig};
pub use energy_manager::{EnergyManager, EnergyReport, SensorUpdate, SharedEnergyManager};
pub use error::EnergyError;
pub use event_coordinator::{EnergyEvent, EventCoordinator};
pub use job_state::{JobEvent, JobPhase};
pub use meter_account::MeterAccount;
pub use sensor_reference::SensorReference;
