use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Load statuses that count as a completed prerequisite.
pub const COMPLETION_STATUSES: [&str; 2] = ["passed", "completed"];

/// Status assigned to loads created by auto-load and manual enrollment.
pub const ENROLLED_STATUS: &str = "enrolled";

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(DepartmentId);
row_id!(ProgramId);
row_id!(SectionId);
row_id!(SubjectId);
row_id!(
    /// Primary key of an academic term (the `term_id` callers pass around).
    TermId
);
row_id!(ProspectusEntryId);
row_id!(LoadId);
row_id!(AuditId);

/// Institution-issued student number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub code: String,
    pub department_id: DepartmentId,
    pub program_adviser: String,
    pub school_dean: String,
}

/// Cohort within a program for one year level and semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub program_id: ProgramId,
    pub year_level: u8,
    pub semester: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub code: String,
    pub title: String,
    pub units: f64,
}

/// Curriculum fact: `subject` is expected for the program/year/semester, narrowed by the
/// optional `academic_year` (empty means any) and `section` qualifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectusEntry {
    pub id: ProspectusEntryId,
    pub program_id: ProgramId,
    pub subject: Subject,
    pub year_level: u8,
    pub semester: u8,
    pub academic_year: String,
    pub section_id: Option<SectionId>,
    pub prerequisite: Option<Subject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub program_id: ProgramId,
    pub section_id: Option<SectionId>,
    pub year_level: u8,
    pub academic_year: String,
    pub semester: Option<u8>,
    pub is_active: bool,
}

impl Student {
    /// Academic year qualifier, `None` when the student record leaves it blank.
    pub fn academic_year(&self) -> Option<&str> {
        if self.academic_year.is_empty() {
            None
        } else {
            Some(self.academic_year.as_str())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicTerm {
    pub id: TermId,
    pub year_label: String,
    pub semester: u8,
    pub is_active: bool,
}

/// Display label for a term, e.g. `2024-2025 - Sem 1`.
pub fn term_label(year_label: &str, semester: u8) -> String {
    format!("{year_label} - Sem {semester}")
}

/// Enrollment fact for one subject in one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentLoad {
    pub id: LoadId,
    pub student_id: StudentId,
    pub term_id: TermId,
    pub subject_id: SubjectId,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudentLoad {
    pub student_id: StudentId,
    pub term_id: TermId,
    pub subject_id: SubjectId,
    pub status: String,
}

/// Flattened load row used by the student detail listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadView {
    pub id: LoadId,
    pub status: String,
    pub term_id: TermId,
    pub term_label: String,
    pub subject_id: SubjectId,
    pub subject_code: String,
    pub subject_title: String,
}

/// Authenticated caller attributed in audit rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
}

impl Actor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Audit row about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub payload: Value,
}

/// Persisted audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_labels_name_year_and_semester() {
        assert_eq!(term_label("2024-2025", 2), "2024-2025 - Sem 2");
    }

    #[test]
    fn blank_academic_year_is_unset() {
        let mut student = Student {
            student_id: StudentId::new("2024-0001"),
            first_name: "Ana".to_string(),
            last_name: "Reyes".to_string(),
            program_id: ProgramId(1),
            section_id: None,
            year_level: 1,
            academic_year: String::new(),
            semester: None,
            is_active: true,
        };
        assert_eq!(student.academic_year(), None);
        student.academic_year = "2024-2025".to_string();
        assert_eq!(student.academic_year(), Some("2024-2025"));
    }

    #[test]
    fn ids_serialize_transparently() {
        let value = serde_json::to_value(TermId(7)).expect("serializes");
        assert_eq!(value, serde_json::json!(7));
        let student: StudentId = serde_json::from_value(serde_json::json!("S-1")).expect("parses");
        assert_eq!(student.as_str(), "S-1");
    }
}
