use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::SectionStatus;
use crate::provider::ProviderError;

/// Why a pipeline step did not complete.
///
/// Everything except [`PipelineError::Database`] is a step failure: it is recorded
/// on the job (and section) and surfaces through the snapshot. Database errors are
/// infrastructure failures and propagate to the caller untouched.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Generation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Outline unusable: {0}")]
    InvalidOutline(String),

    #[error("Section {index} failed: {message}")]
    Section { index: u32, message: String },

    #[error("Integration failed: {0}")]
    Integration(#[from] IntegrationError),

    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl PipelineError {
    /// Whether the error should be recorded as a step failure rather than returned.
    pub fn is_step_failure(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

/// Integration was attempted on an incomplete section set. This means the
/// orchestrator ran out of order, not that a provider misbehaved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("Document has no sections")]
    NoSections,

    #[error("Section index {index} is missing")]
    MissingSection { index: u32 },

    #[error("Section {index} is {status}, expected reviewed")]
    NotReviewed { index: u32, status: &'static str },

    #[error("Section {index} is reviewed but has no content")]
    EmptySection { index: u32 },
}

impl IntegrationError {
    pub(crate) fn not_reviewed(index: u32, status: SectionStatus) -> Self {
        Self::NotReviewed {
            index,
            status: status.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_not_step_failures() {
        assert!(!PipelineError::Database(DatabaseError::LockPoisoned).is_step_failure());
        assert!(PipelineError::InvalidOutline("empty".into()).is_step_failure());
        assert!(PipelineError::Provider(ProviderError::Outage("503".into())).is_step_failure());
    }

    #[test]
    fn test_messages() {
        let err = PipelineError::Section {
            index: 3,
            message: "provider outage".to_string(),
        };
        assert_eq!(err.to_string(), "Section 3 failed: provider outage");

        let err = PipelineError::from(IntegrationError::not_reviewed(2, SectionStatus::Failed));
        assert_eq!(
            err.to_string(),
            "Integration failed: Section 2 is failed, expected reviewed"
        );
    }
}
