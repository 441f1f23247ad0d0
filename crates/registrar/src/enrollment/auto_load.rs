use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{NewStudentLoad, StudentId, TermId, ENROLLED_STATUS};
use super::eligibility::EligibilityEngine;
use super::errors::{NotFoundError, RegistrarError, ValidationError};
use super::repository::RegistrarStore;

/// Result reported by an auto-load run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLoadOutcome {
    pub created_load_rows: usize,
}

/// Enroll every active student in `student_ids` into their eligible subjects for `term_id`.
///
/// The whole batch is one transaction: an unknown or inactive term aborts it before anything
/// is written, and a persistence failure rolls back rows already inserted. Unknown and inactive
/// student ids are skipped. Existing (student, term, subject) rows are left untouched, so
/// re-running the same batch creates nothing.
pub fn auto_load<S>(
    store: &S,
    student_ids: &[StudentId],
    term_id: TermId,
) -> Result<AutoLoadOutcome, RegistrarError>
where
    S: RegistrarStore,
{
    let outcome = store.atomic(|repository| -> Result<AutoLoadOutcome, RegistrarError> {
        let term = repository
            .term(term_id)?
            .ok_or(NotFoundError::Term(term_id))?;
        if !term.is_active {
            return Err(ValidationError::InactiveLoadTerm.into());
        }

        let students = repository.active_students(student_ids)?;
        let engine = EligibilityEngine::new(repository);

        let mut created = 0;
        for student in &students {
            for subject in engine.eligible_subjects(student, &term)? {
                let load = NewStudentLoad {
                    student_id: student.student_id.clone(),
                    term_id,
                    subject_id: subject.id,
                    status: ENROLLED_STATUS.to_string(),
                };
                if repository.insert_load_if_absent(&load)? {
                    created += 1;
                }
            }
        }

        Ok(AutoLoadOutcome {
            created_load_rows: created,
        })
    })?;

    info!(
        term_id = %term_id,
        requested = student_ids.len(),
        created = outcome.created_load_rows,
        "auto-load committed"
    );
    Ok(outcome)
}
