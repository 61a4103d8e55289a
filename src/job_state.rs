use crate::error::EnergyError;
use std::str::FromStr;

/// Print job lifecycle as seen through job events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Unknown,
    Idle,
    Printing,
    Complete,
}

/// The five lifecycle signals published by the job manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Started,
    Complete,
    Cancelled,
    Standby,
    Error,
}

impl JobPhase {
    /// Phase after `event`. Every event is accepted from every phase.
    pub fn apply(self, event: JobEvent) -> JobPhase {
        match event {
            JobEvent::Started => JobPhase::Printing,
            JobEvent::Complete | JobEvent::Cancelled | JobEvent::Error => JobPhase::Complete,
            JobEvent::Standby => JobPhase::Idle,
        }
    }

    /// Whether reports should carry the current job figures
    pub fn shows_current_job(self) -> bool {
        self != JobPhase::Idle
    }
}

impl FromStr for JobEvent {
    type Err = EnergyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "started" => Ok(JobEvent::Started),
            "complete" => Ok(JobEvent::Complete),
            "cancelled" => Ok(JobEvent::Cancelled),
            "standby" => Ok(JobEvent::Standby),
            "error" => Ok(JobEvent::Error),
            _ => Err(EnergyError::UnknownJobEvent(s.to_string())),
        }
    }
}
