use super::domain::{
    AcademicTerm, AuditEntry, AuditRecord, LoadId, LoadView, NewStudentLoad, ProspectusEntry,
    Student, StudentId, StudentLoad, Subject, SubjectId, TermId,
};
use super::prospectus::{ProspectusScope, TierQualifiers};

/// Queries and writes the enrollment engine needs from the record store.
///
/// Every student lookup only returns rows with `is_active = true`.
pub trait RegistrarRepository {
    fn term(&self, id: TermId) -> Result<Option<AcademicTerm>, RepositoryError>;
    fn subject(&self, id: SubjectId) -> Result<Option<Subject>, RepositoryError>;
    fn active_student(&self, student_id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn active_students(&self, student_ids: &[StudentId]) -> Result<Vec<Student>, RepositoryError>;

    /// Entries in `scope` whose qualifiers match `tier` exactly (a `None` section means NULL).
    fn prospectus_entries(
        &self,
        scope: &ProspectusScope,
        tier: &TierQualifiers,
    ) -> Result<Vec<ProspectusEntry>, RepositoryError>;

    /// Whether any load for the student and subject carries a passed/completed status.
    fn has_completed(&self, student_id: &StudentId, subject_id: SubjectId)
        -> Result<bool, RepositoryError>;

    /// Insert unless the (student, term, subject) row exists; `true` when a row was created.
    fn insert_load_if_absent(&self, load: &NewStudentLoad) -> Result<bool, RepositoryError>;
    /// Insert a load, failing with `Conflict` when the triple already exists.
    fn insert_load(&self, load: &NewStudentLoad) -> Result<StudentLoad, RepositoryError>;
    fn load(&self, id: LoadId) -> Result<Option<StudentLoad>, RepositoryError>;
    fn update_load_status(&self, id: LoadId, status: &str) -> Result<StudentLoad, RepositoryError>;
    fn loads_for_student(&self, student_id: &StudentId) -> Result<Vec<LoadView>, RepositoryError>;

    /// Bulk year-level update over active students; returns the affected row count.
    fn set_year_level(&self, student_ids: &[StudentId], year_level: u8)
        -> Result<usize, RepositoryError>;
    /// Soft delete; `false` when no active student matched.
    fn deactivate_student(&self, student_id: &StudentId) -> Result<bool, RepositoryError>;

    fn record_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError>;
    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditRecord>, RepositoryError>;
}

/// Storage abstraction handing out repositories, optionally wrapped in a transaction.
pub trait RegistrarStore: Send + Sync {
    /// Run `work` against the store without opening a transaction.
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RegistrarRepository) -> Result<T, E>,
        E: From<RepositoryError>;

    /// Run `work` inside one transaction: committed on `Ok`, rolled back on `Err`.
    fn atomic<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RegistrarRepository) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("stored record is malformed: {0}")]
    InvalidData(String),
}
