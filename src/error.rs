use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Every failure in the report pipeline funnels into one of these
/// categories before it reaches the user. The raw source stays available
/// through `Display` for logs; the progress channel only ever carries
/// the canned `user_message`.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("fetched data failed validation: {0}")]
    Validation(String),

    #[error("document generation failed: {0}")]
    Generation(String),

    #[error("rendering timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ReportError {
    pub fn category(&self) -> &'static str {
        match self {
            ReportError::Database(_) => "database",
            ReportError::Validation(_) => "validation",
            ReportError::Generation(_) => "generation",
            ReportError::Timeout(_) => "timeout",
            ReportError::Unknown(_) => "unknown",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ReportError::Database(_) => {
                "Could not read from the facilities database. Please try again."
            }
            ReportError::Validation(_) => {
                "The fetched data was not in the expected shape."
            }
            ReportError::Generation(_) => {
                "The report document could not be produced."
            }
            ReportError::Timeout(_) => {
                "Report generation took too long and was aborted."
            }
            ReportError::Unknown(_) => {
                "An unexpected error occurred while generating the report."
            }
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Generation(err.to_string())
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_match_variants() {
        assert_eq!(ReportError::Validation("x".into()).category(), "validation");
        assert_eq!(ReportError::Generation("x".into()).category(), "generation");
        assert_eq!(ReportError::Timeout(90).category(), "timeout");
        assert_eq!(ReportError::Unknown("x".into()).category(), "unknown");
    }

    #[test]
    fn user_messages_never_leak_the_raw_error() {
        let err = ReportError::Generation("lopdf exploded at offset 4096".into());
        assert!(!err.user_message().contains("lopdf"));
        assert!(!err.user_message().contains("4096"));
    }

    #[test]
    fn io_errors_classify_as_generation() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ReportError::from(io);
        assert_eq!(err.category(), "generation");
    }
}
