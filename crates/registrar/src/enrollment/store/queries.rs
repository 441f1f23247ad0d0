use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::enrollment::domain::{
    AcademicTerm, AuditEntry, AuditId, AuditRecord, LoadId, LoadView, NewStudentLoad, ProgramId,
    ProspectusEntry, ProspectusEntryId, SectionId, Student, StudentId, StudentLoad, Subject,
    SubjectId, TermId, COMPLETION_STATUSES,
    term_label,
};
use crate::enrollment::prospectus::{ProspectusScope, TierQualifiers};
use crate::enrollment::repository::{RegistrarRepository, RepositoryError};

const TERM_COLUMNS: &str = "id, year_label, semester, is_active";
const SUBJECT_COLUMNS: &str = "id, code, title, units";
pub(super) const STUDENT_COLUMNS: &str = "student_id, first_name, last_name, program_id, section_id, \
     year_level, academic_year, semester, is_active";
const LOAD_COLUMNS: &str = "id, student_id, term_id, subject_id, status, created_at, updated_at";

/// Repository view over one borrowed connection (or transaction).
pub struct SqliteRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

/// Student ids bound as one JSON array and expanded with `json_each`, so batch size never
/// runs into SQLite's bound-parameter limit.
fn id_array(student_ids: &[StudentId]) -> Result<String, RepositoryError> {
    serde_json::to_string(student_ids).map_err(|err| RepositoryError::InvalidData(err.to_string()))
}

fn map_term(row: &Row<'_>) -> rusqlite::Result<AcademicTerm> {
    Ok(AcademicTerm {
        id: TermId(row.get(0)?),
        year_label: row.get(1)?,
        semester: row.get(2)?,
        is_active: row.get(3)?,
    })
}

fn map_subject_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: SubjectId(row.get(offset)?),
        code: row.get(offset + 1)?,
        title: row.get(offset + 2)?,
        units: row.get(offset + 3)?,
    })
}

pub(super) fn map_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        student_id: StudentId(row.get(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        program_id: ProgramId(row.get(3)?),
        section_id: row.get::<_, Option<i64>>(4)?.map(SectionId),
        year_level: row.get(5)?,
        academic_year: row.get(6)?,
        semester: row.get(7)?,
        is_active: row.get(8)?,
    })
}

fn map_load(row: &Row<'_>) -> rusqlite::Result<StudentLoad> {
    Ok(StudentLoad {
        id: LoadId(row.get(0)?),
        student_id: StudentId(row.get(1)?),
        term_id: TermId(row.get(2)?),
        subject_id: SubjectId(row.get(3)?),
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_prospectus(row: &Row<'_>) -> rusqlite::Result<ProspectusEntry> {
    let prerequisite = match row.get::<_, Option<i64>>(10)? {
        Some(_) => Some(map_subject_at(row, 10)?),
        None => None,
    };
    Ok(ProspectusEntry {
        id: ProspectusEntryId(row.get(0)?),
        program_id: ProgramId(row.get(1)?),
        year_level: row.get(2)?,
        semester: row.get(3)?,
        academic_year: row.get(4)?,
        section_id: row.get::<_, Option<i64>>(5)?.map(SectionId),
        subject: map_subject_at(row, 6)?,
        prerequisite,
    })
}

fn map_audit(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    let raw: String = row.get(5)?;
    let payload = serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?;
    Ok(AuditRecord {
        id: AuditId(row.get(0)?),
        actor: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        action: row.get(2)?,
        entity: row.get(3)?,
        entity_id: row.get(4)?,
        payload,
        created_at: row.get(6)?,
    })
}

impl<'c> RegistrarRepository for SqliteRepository<'c> {
    fn term(&self, id: TermId) -> Result<Option<AcademicTerm>, RepositoryError> {
        let sql = format!("SELECT {TERM_COLUMNS} FROM academic_terms WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id.0], map_term)
            .optional()?)
    }

    fn subject(&self, id: SubjectId) -> Result<Option<Subject>, RepositoryError> {
        let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id.0], |row| map_subject_at(row, 0))
            .optional()?)
    }

    fn active_student(&self, student_id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        let sql =
            format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1 AND is_active = 1");
        Ok(self
            .conn
            .query_row(&sql, params![student_id.as_str()], map_student)
            .optional()?)
    }

    fn active_students(&self, student_ids: &[StudentId]) -> Result<Vec<Student>, RepositoryError> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students \
             WHERE is_active = 1 AND student_id IN (SELECT value FROM json_each(?1)) \
             ORDER BY student_id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![id_array(student_ids)?], map_student)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn prospectus_entries(
        &self,
        scope: &ProspectusScope,
        tier: &TierQualifiers,
    ) -> Result<Vec<ProspectusEntry>, RepositoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT p.id, p.program_id, p.year_level, p.semester, p.academic_year, p.section_id, \
                    s.id, s.code, s.title, s.units, \
                    pr.id, pr.code, pr.title, pr.units \
             FROM prospectus_entries p \
             JOIN subjects s ON s.id = p.subject_id \
             LEFT JOIN subjects pr ON pr.id = p.prerequisite_id \
             WHERE p.program_id = ?1 AND p.year_level = ?2 AND p.semester = ?3 \
               AND (?4 IS NULL OR p.subject_id = ?4) \
               AND p.academic_year = ?5 AND p.section_id IS ?6 \
             ORDER BY p.id",
        )?;
        let rows = stmt.query_map(
            params![
                scope.program_id.0,
                scope.year_level,
                scope.semester,
                scope.subject_id.map(|id| id.0),
                tier.academic_year,
                tier.section.map(|id| id.0),
            ],
            map_prospectus,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn has_completed(
        &self,
        student_id: &StudentId,
        subject_id: SubjectId,
    ) -> Result<bool, RepositoryError> {
        let [passed, completed] = COMPLETION_STATUSES;
        let exists = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM student_loads \
             WHERE student_id = ?1 AND subject_id = ?2 AND status IN (?3, ?4))",
            params![student_id.as_str(), subject_id.0, passed, completed],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_load_if_absent(&self, load: &NewStudentLoad) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let inserted = self.conn.execute(
            "INSERT INTO student_loads (student_id, term_id, subject_id, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
             ON CONFLICT (student_id, term_id, subject_id) DO NOTHING",
            params![
                load.student_id.as_str(),
                load.term_id.0,
                load.subject_id.0,
                load.status,
                now
            ],
        )?;
        Ok(inserted > 0)
    }

    fn insert_load(&self, load: &NewStudentLoad) -> Result<StudentLoad, RepositoryError> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO student_loads (student_id, term_id, subject_id, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                load.student_id.as_str(),
                load.term_id.0,
                load.subject_id.0,
                load.status,
                now
            ],
        )?;
        Ok(StudentLoad {
            id: LoadId(self.conn.last_insert_rowid()),
            student_id: load.student_id.clone(),
            term_id: load.term_id,
            subject_id: load.subject_id,
            status: load.status.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    fn load(&self, id: LoadId) -> Result<Option<StudentLoad>, RepositoryError> {
        let sql = format!("SELECT {LOAD_COLUMNS} FROM student_loads WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id.0], map_load)
            .optional()?)
    }

    fn update_load_status(&self, id: LoadId, status: &str) -> Result<StudentLoad, RepositoryError> {
        let updated = self.conn.execute(
            "UPDATE student_loads SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, Utc::now(), id.0],
        )?;
        if updated == 0 {
            return Err(RepositoryError::Query(format!("student load {id} disappeared")));
        }
        self.load(id)?
            .ok_or_else(|| RepositoryError::Query(format!("student load {id} disappeared")))
    }

    fn loads_for_student(&self, student_id: &StudentId) -> Result<Vec<LoadView>, RepositoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT l.id, l.status, l.term_id, t.year_label, t.semester, \
                    l.subject_id, s.code, s.title \
             FROM student_loads l \
             JOIN academic_terms t ON t.id = l.term_id \
             JOIN subjects s ON s.id = l.subject_id \
             WHERE l.student_id = ?1 \
             ORDER BY t.year_label DESC, t.semester DESC, s.code ASC",
        )?;
        let rows = stmt.query_map(params![student_id.as_str()], |row| {
            let year_label: String = row.get(3)?;
            Ok(LoadView {
                id: LoadId(row.get(0)?),
                status: row.get(1)?,
                term_id: TermId(row.get(2)?),
                term_label: term_label(&year_label, row.get(4)?),
                subject_id: SubjectId(row.get(5)?),
                subject_code: row.get(6)?,
                subject_title: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_year_level(
        &self,
        student_ids: &[StudentId],
        year_level: u8,
    ) -> Result<usize, RepositoryError> {
        if student_ids.is_empty() {
            return Ok(0);
        }
        Ok(self.conn.execute(
            "UPDATE students SET year_level = ?1, updated_at = ?2 \
             WHERE is_active = 1 AND student_id IN (SELECT value FROM json_each(?3))",
            params![year_level, Utc::now(), id_array(student_ids)?],
        )?)
    }

    fn deactivate_student(&self, student_id: &StudentId) -> Result<bool, RepositoryError> {
        let updated = self.conn.execute(
            "UPDATE students SET is_active = 0, updated_at = ?1 \
             WHERE student_id = ?2 AND is_active = 1",
            params![Utc::now(), student_id.as_str()],
        )?;
        Ok(updated > 0)
    }

    fn record_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(&entry.payload)
            .map_err(|err| RepositoryError::InvalidData(err.to_string()))?;
        self.conn.execute(
            "INSERT INTO audit_log (actor, action, entity, entity_id, payload, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                entry.actor.username,
                entry.action,
                entry.entity,
                entry.entity_id,
                payload,
                Utc::now()
            ],
        )?;
        Ok(())
    }

    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditRecord>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, actor, action, entity, entity_id, payload, created_at \
             FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], map_audit)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
