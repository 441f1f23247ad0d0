//! Catalog maintenance: departments, programs, sections, subjects, terms, curriculum, students.
//!
//! These writes bypass the enrollment rules; they are what seeding, imports, and tests use.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::queries::{map_student, SqliteRepository, STUDENT_COLUMNS};
use super::SqliteRegistrarStore;
use crate::enrollment::domain::{
    AcademicTerm, Department, DepartmentId, LoadId, NewStudentLoad, Program, ProgramId,
    ProspectusEntryId, Section, SectionId, Student, StudentId, Subject, SubjectId, TermId,
};
use crate::enrollment::repository::{RegistrarRepository, RepositoryError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProgram {
    pub name: String,
    pub code: String,
    pub department_id: DepartmentId,
    pub program_adviser: String,
    pub school_dean: String,
}

impl NewProgram {
    pub fn new(name: impl Into<String>, code: impl Into<String>, department_id: DepartmentId) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            department_id,
            program_adviser: String::new(),
            school_dean: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub name: String,
    pub program_id: ProgramId,
    pub year_level: u8,
    pub semester: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubject {
    pub code: String,
    pub title: String,
    pub units: f64,
}

impl NewSubject {
    pub fn new(code: impl Into<String>, title: impl Into<String>, units: f64) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
    pub year_label: String,
    pub semester: u8,
    pub is_active: bool,
}

impl NewTerm {
    pub fn new(year_label: impl Into<String>, semester: u8, is_active: bool) -> Self {
        Self {
            year_label: year_label.into(),
            semester,
            is_active,
        }
    }
}

/// Curriculum row; leave `academic_year` empty and `section_id` unset for the generic tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProspectusEntry {
    pub program_id: ProgramId,
    pub subject_id: SubjectId,
    pub year_level: u8,
    pub semester: u8,
    pub academic_year: String,
    pub section_id: Option<SectionId>,
    pub prerequisite_id: Option<SubjectId>,
}

impl NewProspectusEntry {
    pub fn new(program_id: ProgramId, subject_id: SubjectId, year_level: u8, semester: u8) -> Self {
        Self {
            program_id,
            subject_id,
            year_level,
            semester,
            academic_year: String::new(),
            section_id: None,
            prerequisite_id: None,
        }
    }

    pub fn academic_year(mut self, academic_year: impl Into<String>) -> Self {
        self.academic_year = academic_year.into();
        self
    }

    pub fn section(mut self, section_id: SectionId) -> Self {
        self.section_id = Some(section_id);
        self
    }

    pub fn prerequisite(mut self, subject_id: SubjectId) -> Self {
        self.prerequisite_id = Some(subject_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub student_id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub program_id: ProgramId,
    pub section_id: Option<SectionId>,
    pub year_level: u8,
    pub academic_year: String,
    pub semester: Option<u8>,
}

impl NewStudent {
    pub fn new(
        student_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        program_id: ProgramId,
    ) -> Self {
        Self {
            student_id: StudentId::new(student_id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            program_id,
            section_id: None,
            year_level: 1,
            academic_year: String::new(),
            semester: None,
        }
    }

    pub fn year_level(mut self, year_level: u8) -> Self {
        self.year_level = year_level;
        self
    }

    pub fn section(mut self, section_id: SectionId) -> Self {
        self.section_id = Some(section_id);
        self
    }

    pub fn academic_year(mut self, academic_year: impl Into<String>) -> Self {
        self.academic_year = academic_year.into();
        self
    }
}

impl SqliteRegistrarStore {
    pub fn create_department(&self, name: &str, code: &str) -> Result<Department, RepositoryError> {
        let conn = self.connection()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO departments (name, code, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, code, now],
        )?;
        Ok(Department {
            id: DepartmentId(conn.last_insert_rowid()),
            name: name.to_string(),
            code: code.to_string(),
        })
    }

    pub fn create_program(&self, program: NewProgram) -> Result<Program, RepositoryError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO programs \
             (name, code, department_id, program_adviser, school_dean, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                program.name,
                program.code,
                program.department_id.0,
                program.program_adviser,
                program.school_dean,
                Utc::now()
            ],
        )?;
        Ok(Program {
            id: ProgramId(conn.last_insert_rowid()),
            name: program.name,
            code: program.code,
            department_id: program.department_id,
            program_adviser: program.program_adviser,
            school_dean: program.school_dean,
        })
    }

    pub fn create_section(&self, section: NewSection) -> Result<Section, RepositoryError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sections (name, program_id, year_level, semester, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                section.name,
                section.program_id.0,
                section.year_level,
                section.semester,
                Utc::now()
            ],
        )?;
        Ok(Section {
            id: SectionId(conn.last_insert_rowid()),
            name: section.name,
            program_id: section.program_id,
            year_level: section.year_level,
            semester: section.semester,
        })
    }

    pub fn create_subject(&self, subject: NewSubject) -> Result<Subject, RepositoryError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO subjects (code, title, units, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![subject.code, subject.title, subject.units, Utc::now()],
        )?;
        Ok(Subject {
            id: SubjectId(conn.last_insert_rowid()),
            code: subject.code,
            title: subject.title,
            units: subject.units,
        })
    }

    pub fn create_term(&self, term: NewTerm) -> Result<AcademicTerm, RepositoryError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO academic_terms (year_label, semester, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![term.year_label, term.semester, term.is_active, Utc::now()],
        )?;
        Ok(AcademicTerm {
            id: TermId(conn.last_insert_rowid()),
            year_label: term.year_label,
            semester: term.semester,
            is_active: term.is_active,
        })
    }

    pub fn set_term_active(&self, term_id: TermId, is_active: bool) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        let updated = conn.execute(
            "UPDATE academic_terms SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active, Utc::now(), term_id.0],
        )?;
        if updated == 0 {
            return Err(RepositoryError::Query(format!("academic term {term_id} not found")));
        }
        Ok(())
    }

    /// Duplicate identities (same program/subject/year/semester/academic year/section) conflict.
    pub fn create_prospectus_entry(
        &self,
        entry: NewProspectusEntry,
    ) -> Result<ProspectusEntryId, RepositoryError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO prospectus_entries \
             (program_id, subject_id, year_level, semester, academic_year, section_id, \
              prerequisite_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                entry.program_id.0,
                entry.subject_id.0,
                entry.year_level,
                entry.semester,
                entry.academic_year,
                entry.section_id.map(|id| id.0),
                entry.prerequisite_id.map(|id| id.0),
                Utc::now()
            ],
        )?;
        Ok(ProspectusEntryId(conn.last_insert_rowid()))
    }

    pub fn create_student(&self, student: NewStudent) -> Result<Student, RepositoryError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO students \
             (student_id, first_name, last_name, program_id, section_id, year_level, \
              academic_year, semester, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
            params![
                student.student_id.as_str(),
                student.first_name,
                student.last_name,
                student.program_id.0,
                student.section_id.map(|id| id.0),
                student.year_level,
                student.academic_year,
                student.semester,
                Utc::now()
            ],
        )?;
        Ok(Student {
            student_id: student.student_id,
            first_name: student.first_name,
            last_name: student.last_name,
            program_id: student.program_id,
            section_id: student.section_id,
            year_level: student.year_level,
            academic_year: student.academic_year,
            semester: student.semester,
            is_active: true,
        })
    }

    /// Record a historical load (e.g. a passed subject from a prior term) without eligibility
    /// checks.
    pub fn record_load(&self, load: NewStudentLoad) -> Result<LoadId, RepositoryError> {
        let conn = self.connection()?;
        let created = SqliteRepository::new(&conn).insert_load(&load)?;
        Ok(created.id)
    }

    pub fn load_count(&self) -> Result<usize, RepositoryError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM student_loads", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Student row regardless of the active flag.
    pub fn student_including_inactive(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<Student>, RepositoryError> {
        let conn = self.connection()?;
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1");
        let student = conn
            .query_row(&sql, params![student_id.as_str()], map_student)
            .optional()?;
        Ok(student)
    }
}
