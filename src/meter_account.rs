use crate::config::MeterConfig;
use crate::error::EnergyError;
use crate::job_state::JobPhase;
use crate::sensor_reference::SensorReference;
use std::collections::HashMap;

/// Name reserved for the aggregate entry of the energy report
pub const TOTAL_KEY: &str = "total";

/// Power and consumption accounting for a single meter.
///
/// Consumption comes from a counter that only ever grows on the device side.
/// Each update is turned into a delta against the previous counter value, so
/// restarts of the device (counter going down) never reduce the totals.
#[derive(Debug, Clone)]
pub struct MeterAccount {
    name: String,
    power_reference: SensorReference,
    consumption_reference: SensorReference,
    power: f64,
    lifetime_consumption: f64,
    current_job_consumption: f64,
    last_counter_value: Option<f64>,
}

impl MeterAccount {
    /// Builds a meter from its configured sensor references
    pub fn new(config: &MeterConfig) -> Result<Self, EnergyError> {
        if config.name == TOTAL_KEY {
            return Err(EnergyError::Configuration(format!(
                "meter name '{TOTAL_KEY}' is reserved"
            )));
        }

        Ok(Self {
            name: config.name.clone(),
            power_reference: SensorReference::parse(&config.power_sensor)?,
            consumption_reference: SensorReference::parse(&config.consumption_sensor)?,
            power: 0.0,
            lifetime_consumption: 0.0,
            current_job_consumption: 0.0,
            last_counter_value: None,
        })
    }

    /// Applies the fields one sensor published. `phase` is the job phase at
    /// the time the update is handled. Non-finite values are ignored like
    /// missing fields.
    pub fn on_sensor_update(&mut self, sensor_id: &str, fields: &HashMap<String, f64>, phase: JobPhase) {
        if sensor_id == self.power_reference.sensor_id() {
            if let Some(power) = finite_field(fields, self.power_reference.field_name()) {
                self.power = power;
            }
        }

        if sensor_id == self.consumption_reference.sensor_id() {
            if let Some(counter) = finite_field(fields, self.consumption_reference.field_name()) {
                self.update_consumption(counter, phase);
            }
        }
    }

    fn update_consumption(&mut self, counter: f64, phase: JobPhase) {
        let delta = match self.last_counter_value {
            // First reading only establishes the baseline
            None => 0.0,
            Some(last) if counter >= last => counter - last,
            // Counter was reset or rolled over, assume it restarted at zero
            Some(_) => counter,
        };

        self.lifetime_consumption += delta;
        if phase == JobPhase::Printing {
            self.current_job_consumption += delta;
        }
        self.last_counter_value = Some(counter);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn lifetime_consumption(&self) -> f64 {
        self.lifetime_consumption
    }

    pub fn current_job_consumption(&self) -> f64 {
        self.current_job_consumption
    }
}

fn finite_field(fields: &HashMap<String, f64>, name: &str) -> Option<f64> {
    fields.get(name).copied().filter(|v| v.is_finite())
}
