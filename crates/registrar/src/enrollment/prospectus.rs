//! Prospectus resolution across the four specificity tiers.
//!
//! Curriculum overrides are expressed by attaching an academic year, a section, or both to an
//! entry. For a given student exactly one tier is used: the most specific one that yields rows.

use serde::Serialize;
use tracing::debug;

use super::domain::{AcademicTerm, ProgramId, ProspectusEntry, SectionId, Student, SubjectId};
use super::repository::{RegistrarRepository, RepositoryError};

/// Curriculum match levels, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificityTier {
    Exact,
    YearOnly,
    SectionOnly,
    Generic,
}

impl SpecificityTier {
    pub const PRECEDENCE: [SpecificityTier; 4] = [
        SpecificityTier::Exact,
        SpecificityTier::YearOnly,
        SpecificityTier::SectionOnly,
        SpecificityTier::Generic,
    ];

    /// Qualifier values this tier matches for `student`, or `None` when the student lacks the
    /// fields the tier needs. The generic tier always applies.
    pub fn qualifiers(self, student: &Student) -> Option<TierQualifiers> {
        let year = student.academic_year();
        let section = student.section_id;

        match self {
            SpecificityTier::Exact => Some(TierQualifiers {
                academic_year: year?.to_string(),
                section: Some(section?),
            }),
            SpecificityTier::YearOnly => Some(TierQualifiers {
                academic_year: year?.to_string(),
                section: None,
            }),
            SpecificityTier::SectionOnly => Some(TierQualifiers {
                academic_year: String::new(),
                section: Some(section?),
            }),
            SpecificityTier::Generic => Some(TierQualifiers::generic()),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpecificityTier::Exact => "exact",
            SpecificityTier::YearOnly => "year_only",
            SpecificityTier::SectionOnly => "section_only",
            SpecificityTier::Generic => "generic",
        }
    }
}

/// Exact qualifier values an entry must carry. An empty `academic_year` and a `None` section
/// both mean "unqualified".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierQualifiers {
    pub academic_year: String,
    pub section: Option<SectionId>,
}

impl TierQualifiers {
    pub fn generic() -> Self {
        Self {
            academic_year: String::new(),
            section: None,
        }
    }
}

/// Base candidate filter shared by every tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProspectusScope {
    pub program_id: ProgramId,
    pub year_level: u8,
    pub semester: u8,
    pub subject_id: Option<SubjectId>,
}

impl ProspectusScope {
    pub fn for_student(student: &Student, term: &AcademicTerm, subject: Option<SubjectId>) -> Self {
        Self {
            program_id: student.program_id,
            year_level: student.year_level,
            semester: term.semester,
            subject_id: subject,
        }
    }
}

/// Entries selected for a student along with the tier that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tier: SpecificityTier,
    pub entries: Vec<ProspectusEntry>,
}

/// Resolver over a repository handle.
pub struct ProspectusResolver<'r> {
    repository: &'r dyn RegistrarRepository,
}

impl<'r> ProspectusResolver<'r> {
    pub fn new(repository: &'r dyn RegistrarRepository) -> Self {
        Self { repository }
    }

    /// Applicable entries for `student` in `term`, optionally narrowed to one subject.
    pub fn resolve(
        &self,
        student: &Student,
        term: &AcademicTerm,
        subject: Option<SubjectId>,
    ) -> Result<Vec<ProspectusEntry>, RepositoryError> {
        self.resolve_tier(student, term, subject)
            .map(|resolution| resolution.entries)
    }

    /// Same as [`resolve`](Self::resolve) but also reports the winning tier. When every tier
    /// comes back empty the generic tier is reported with no entries.
    pub fn resolve_tier(
        &self,
        student: &Student,
        term: &AcademicTerm,
        subject: Option<SubjectId>,
    ) -> Result<Resolution, RepositoryError> {
        let scope = ProspectusScope::for_student(student, term, subject);

        for tier in SpecificityTier::PRECEDENCE {
            let Some(qualifiers) = tier.qualifiers(student) else {
                continue;
            };

            let entries = self.repository.prospectus_entries(&scope, &qualifiers)?;
            if !entries.is_empty() || tier == SpecificityTier::Generic {
                debug!(
                    student_id = %student.student_id,
                    term_id = %term.id,
                    tier = tier.label(),
                    entries = entries.len(),
                    "prospectus tier selected"
                );
                return Ok(Resolution { tier, entries });
            }
        }

        Ok(Resolution {
            tier: SpecificityTier::Generic,
            entries: Vec::new(),
        })
    }
}
