use crate::config::ConfigError;
use crate::enrollment::{RegistrarError, RepositoryError};
use crate::telemetry::TelemetryError;

/// Failures surfaced by the binaries: startup, serving, and command-line operations.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Registrar(#[from] RegistrarError),
    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AppError {
    /// True when the failure came from caller input rather than the environment.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::Registrar(RegistrarError::Validation(_) | RegistrarError::NotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::{NotFoundError, TermId, ValidationError};

    #[test]
    fn registrar_errors_keep_their_message() {
        let err = AppError::from(RegistrarError::from(NotFoundError::Term(TermId(4))));
        assert_eq!(err.to_string(), "Specified term does not exist.");
        assert!(err.is_rejection());
    }

    #[test]
    fn storage_failures_are_not_rejections() {
        let err = AppError::from(RepositoryError::Unavailable("database is locked".to_string()));
        assert!(err.to_string().starts_with("storage error:"));
        assert!(!err.is_rejection());

        let err = AppError::from(RegistrarError::from(ValidationError::InactiveLoadTerm));
        assert!(err.is_rejection());
    }
}
