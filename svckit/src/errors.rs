use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No tokio runtime available to drive the simulation timer")]
    RuntimeUnavailable,

    #[error("Observer fault in {simulation}: {message}")]
    ObserverFault {
        simulation: String,
        message: String,
    },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<config::ConfigError> for SimError {
    fn from(err: config::ConfigError) -> Self {
        SimError::ConfigError(err.to_string())
    }
}

impl From<anyhow::Error> for SimError {
    fn from(err: anyhow::Error) -> Self {
        SimError::Unknown(err.to_string())
    }
}
