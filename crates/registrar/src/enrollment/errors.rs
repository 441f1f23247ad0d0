use super::domain::{LoadId, StudentId, SubjectId, TermId};
use super::repository::RepositoryError;

/// Business-rule violations; nothing is written when one is raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required.")]
    MissingField(&'static str),
    #[error("student_ids, target_year_level, and term_id are required.")]
    IncompletePromotion,
    #[error("target_year_level must be at least 1.")]
    InvalidYearLevel,
    #[error("Loads can only be created or updated for the active term.")]
    InactiveLoadTerm,
    #[error("Promotion is only allowed for the active term.")]
    InactivePromotionTerm,
    #[error("Selected subject is not available in student prospectus mapping for this term.")]
    SubjectNotInProspectus,
    #[error("Prerequisite not satisfied. Complete {code} before enrolling this subject.")]
    PrerequisiteNotSatisfied { code: String },
    #[error("status must not be blank.")]
    BlankStatus,
}

/// Referenced record does not exist (or, for students, is inactive).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("Specified term does not exist.")]
    Term(TermId),
    #[error("Student {0} does not exist.")]
    Student(StudentId),
    #[error("Specified subject does not exist.")]
    Subject(SubjectId),
    #[error("Student load {0} does not exist.")]
    Load(LoadId),
}

/// Error raised by the enrollment engine and registrar service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RegistrarError {
    /// Only a busy, locked, or unreachable database is worth retrying; query and rule
    /// failures repeat identically.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RegistrarError::Repository(RepositoryError::Unavailable(_))
        )
    }
}
