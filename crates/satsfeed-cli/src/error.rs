use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] satsfeed_core::ValidationError),

    #[error(transparent)]
    Config(#[from] satsfeed_core::ConfigError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Unavailable(#[from] satsfeed_core::ServiceError),

    #[error(transparent)]
    Exchanges(#[from] satsfeed_core::CompareError),

    #[error(transparent)]
    Chart(#[from] satsfeed_core::ChartError),

    #[error(transparent)]
    Storage(#[from] satsfeed_core::StorageError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Unavailable(_) => 3,
            Self::Exchanges(_) => 3,
            Self::Chart(_) => 2,
            Self::Serialization(_) => 4,
            Self::Storage(_) => 10,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_outages_exit_with_three() {
        let error = CliError::from(satsfeed_core::ServiceError::Unavailable {
            key: String::from("btc:snapshot"),
            failures: Vec::new(),
        });

        assert_eq!(error.exit_code(), 3);
        assert_eq!(CliError::Command(String::from("bad")).exit_code(), 2);
    }
}
