//! Registry of all configured meters plus the job phase that drives them.

use crate::config::MeterConfig;
use crate::job_state::{JobEvent, JobPhase};
use crate::meter_account::{MeterAccount, TOTAL_KEY};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_derive::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Readings published by the sensor subsystem: sensor id -> field -> value
pub type SensorUpdate = HashMap<String, HashMap<String, f64>>;

/// Single lock guarding the registry for both event handling and queries
pub type SharedEnergyManager = Arc<Mutex<EnergyManager>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionFigures {
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterFigures {
    pub power: f64,
    pub consumption: ConsumptionFigures,
}

/// Answer to an energy query. Serialises as one JSON object holding
/// `total` followed by one entry per meter in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyReport {
    pub total: MeterFigures,
    pub meters: Vec<(String, MeterFigures)>,
}

impl EnergyReport {
    pub fn meter(&self, name: &str) -> Option<&MeterFigures> {
        self.meters
            .iter()
            .find(|(meter_name, _)| meter_name == name)
            .map(|(_, figures)| figures)
    }
}

impl Serialize for EnergyReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.meters.len() + 1))?;
        map.serialize_entry(TOTAL_KEY, &self.total)?;
        for (name, figures) in &self.meters {
            map.serialize_entry(name, figures)?;
        }
        map.end()
    }
}

pub struct EnergyManager {
    meters: Vec<MeterAccount>,
    job_phase: JobPhase,
}

impl EnergyManager {
    /// Registers every meter that can be built. Meters that fail are left
    /// out and described in the returned warnings.
    pub fn new(configs: &[MeterConfig]) -> (Self, Vec<String>) {
        let mut manager = Self {
            meters: Vec::with_capacity(configs.len()),
            job_phase: JobPhase::default(),
        };
        let mut warnings = Vec::new();

        for config in configs {
            match MeterAccount::new(config) {
                Ok(meter) => manager.register(meter),
                Err(e) => {
                    let msg = format!("Failed to load meter [{}]: {e}", config.name);
                    warn!("{msg}");
                    warnings.push(msg);
                }
            }
        }

        info!(meters = manager.meters.len(), "Energy manager initialized");
        (manager, warnings)
    }

    pub fn into_shared(self) -> SharedEnergyManager {
        Arc::new(Mutex::new(self))
    }

    /// Adds a meter, replacing any earlier meter with the same name in place
    fn register(&mut self, meter: MeterAccount) {
        match self.meters.iter_mut().find(|m| m.name() == meter.name()) {
            Some(existing) => {
                info!(meter = meter.name(), "Replacing meter with later definition");
                *existing = meter;
            }
            None => {
                info!(meter = meter.name(), "Registered meter");
                self.meters.push(meter);
            }
        }
    }

    pub fn job_phase(&self) -> JobPhase {
        self.job_phase
    }

    pub fn meter(&self, name: &str) -> Option<&MeterAccount> {
        self.meters.iter().find(|m| m.name() == name)
    }

    pub fn meter_names(&self) -> impl Iterator<Item = &str> {
        self.meters.iter().map(|m| m.name())
    }

    pub fn handle_job_event(&mut self, event: JobEvent) {
        let next = self.job_phase.apply(event);
        debug!(?event, from = ?self.job_phase, to = ?next, "Job phase transition");
        self.job_phase = next;
    }

    /// Hands every sensor entry of the update to every meter
    pub fn handle_sensor_update(&mut self, update: &SensorUpdate) {
        let phase = self.job_phase;
        for (sensor_id, fields) in update {
            debug!(sensor = %sensor_id, fields = fields.len(), "Sensor update");
            for meter in &mut self.meters {
                meter.on_sensor_update(sensor_id, fields, phase);
            }
        }
    }

    pub fn total_power(&self) -> f64 {
        self.meters.iter().map(MeterAccount::power).sum()
    }

    pub fn total_consumption(&self) -> f64 {
        self.meters.iter().map(MeterAccount::lifetime_consumption).sum()
    }

    pub fn total_consumption_current_job(&self) -> f64 {
        self.meters
            .iter()
            .map(MeterAccount::current_job_consumption)
            .sum()
    }

    pub fn snapshot(&self) -> EnergyReport {
        let with_job = self.job_phase.shows_current_job();

        let total = figures(
            self.total_power(),
            self.total_consumption(),
            with_job.then(|| self.total_consumption_current_job()),
        );

        let meters = self
            .meters
            .iter()
            .map(|meter| {
                let entry = figures(
                    meter.power(),
                    meter.lifetime_consumption(),
                    with_job.then(|| meter.current_job_consumption()),
                );
                (meter.name().to_string(), entry)
            })
            .collect();

        EnergyReport { total, meters }
    }
}

fn figures(power: f64, total: f64, current_job: Option<f64>) -> MeterFigures {
    MeterFigures {
        power: round2(power),
        consumption: ConsumptionFigures {
            total: round2(total),
            current_job: current_job.map(round2),
        },
    }
}

/// Rounds to two decimals, only used when building reports
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
