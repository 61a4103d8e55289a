use crate::error::EnergyError;
use std::fmt;
use std::str::FromStr;

/// Points at one field of one sensor, written as `<sensor>.<field>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReference {
    sensor_id: String,
    field_name: String,
}

impl SensorReference {
    /// Splits on the first `.`; everything after it is the field name.
    /// Whether the sensor exists is only known once updates arrive.
    pub fn parse(path: &str) -> Result<Self, EnergyError> {
        let (sensor_id, field_name) = path.split_once('.').ok_or_else(|| {
            EnergyError::Configuration(format!(
                "sensor reference '{path}' must have the form <sensor>.<field>"
            ))
        })?;

        Ok(Self {
            sensor_id: sensor_id.to_string(),
            field_name: field_name.to_string(),
        })
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl FromStr for SensorReference {
    type Err = EnergyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SensorReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sensor_id, self.field_name)
    }
}
