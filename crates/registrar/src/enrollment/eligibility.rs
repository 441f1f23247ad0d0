use super::domain::{AcademicTerm, Student, Subject};
use super::errors::{RegistrarError, ValidationError};
use super::prospectus::ProspectusResolver;
use super::repository::{RegistrarRepository, RepositoryError};

/// Prerequisite filter over resolved prospectus entries.
pub struct EligibilityEngine<'r> {
    repository: &'r dyn RegistrarRepository,
}

impl<'r> EligibilityEngine<'r> {
    pub fn new(repository: &'r dyn RegistrarRepository) -> Self {
        Self { repository }
    }

    /// Subjects from the student's resolved prospectus whose prerequisite is satisfied, in
    /// resolver order. Duplicate curriculum rows yield duplicate subjects.
    pub fn eligible_subjects(
        &self,
        student: &Student,
        term: &AcademicTerm,
    ) -> Result<Vec<Subject>, RepositoryError> {
        let entries = ProspectusResolver::new(self.repository).resolve(student, term, None)?;

        let mut eligible = Vec::with_capacity(entries.len());
        for entry in entries {
            let satisfied = match &entry.prerequisite {
                None => true,
                Some(prerequisite) => self
                    .repository
                    .has_completed(&student.student_id, prerequisite.id)?,
            };
            if satisfied {
                eligible.push(entry.subject);
            }
        }
        Ok(eligible)
    }

    /// Gate for creating or updating a single load by hand.
    pub fn validate_load(
        &self,
        student: &Student,
        term: &AcademicTerm,
        subject: &Subject,
    ) -> Result<(), RegistrarError> {
        if !term.is_active {
            return Err(ValidationError::InactiveLoadTerm.into());
        }

        let entries =
            ProspectusResolver::new(self.repository).resolve(student, term, Some(subject.id))?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or(ValidationError::SubjectNotInProspectus)?;

        if let Some(prerequisite) = entry.prerequisite {
            if !self
                .repository
                .has_completed(&student.student_id, prerequisite.id)?
            {
                return Err(ValidationError::PrerequisiteNotSatisfied {
                    code: prerequisite.code,
                }
                .into());
            }
        }
        Ok(())
    }
}
