use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnergyError {
    /// A meter definition can't be turned into a working meter
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown job event '{0}'")]
    UnknownJobEvent(String),
}
