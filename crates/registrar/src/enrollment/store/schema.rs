use rusqlite::Connection;
use std::time::Duration;

/// busy_timeout applied to every connection.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Per-connection pragmas: foreign keys and busy timeout are not persisted by SQLite.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

pub fn open_connection(path: &str) -> rusqlite::Result<Connection> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    configure_connection(&conn)?;
    Ok(conn)
}

/// Create every table and index if missing.
pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS departments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    code        TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS programs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL,
    code             TEXT NOT NULL DEFAULT '',
    department_id    INTEGER NOT NULL REFERENCES departments(id) ON DELETE RESTRICT,
    program_adviser  TEXT NOT NULL DEFAULT '',
    school_dean      TEXT NOT NULL DEFAULT '',
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS academic_terms (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    year_label  TEXT NOT NULL,
    semester    INTEGER NOT NULL,
    is_active   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (year_label, semester)
);
CREATE INDEX IF NOT EXISTS ix_academic_terms_semester ON academic_terms (semester);

CREATE TABLE IF NOT EXISTS sections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    program_id  INTEGER NOT NULL REFERENCES programs(id) ON DELETE RESTRICT,
    year_level  INTEGER NOT NULL,
    semester    INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    code        TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    units       REAL NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prospectus_entries (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id       INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
    subject_id       INTEGER NOT NULL REFERENCES subjects(id) ON DELETE RESTRICT,
    year_level       INTEGER NOT NULL,
    semester         INTEGER NOT NULL,
    academic_year    TEXT NOT NULL DEFAULT '',
    section_id       INTEGER REFERENCES sections(id) ON DELETE SET NULL,
    prerequisite_id  INTEGER REFERENCES subjects(id) ON DELETE RESTRICT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
-- NULL sections must collide with each other, so the identity index folds them to 0.
CREATE UNIQUE INDEX IF NOT EXISTS ux_prospectus_identity ON prospectus_entries (
    program_id, subject_id, year_level, semester, academic_year, IFNULL(section_id, 0)
);
CREATE INDEX IF NOT EXISTS ix_prospectus_year_semester ON prospectus_entries (year_level, semester);
CREATE INDEX IF NOT EXISTS ix_prospectus_lookup ON prospectus_entries (
    program_id, year_level, semester, academic_year, section_id
);

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    program_id     INTEGER NOT NULL REFERENCES programs(id) ON DELETE RESTRICT,
    section_id     INTEGER REFERENCES sections(id) ON DELETE RESTRICT,
    year_level     INTEGER NOT NULL DEFAULT 1,
    academic_year  TEXT NOT NULL DEFAULT '',
    semester       INTEGER,
    is_active      INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_students_year_level ON students (year_level);

CREATE TABLE IF NOT EXISTS student_loads (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
    term_id     INTEGER NOT NULL REFERENCES academic_terms(id) ON DELETE RESTRICT,
    subject_id  INTEGER NOT NULL REFERENCES subjects(id) ON DELETE RESTRICT,
    status      TEXT NOT NULL DEFAULT 'enrolled',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (student_id, term_id, subject_id)
);
CREATE INDEX IF NOT EXISTS ix_student_loads_completion ON student_loads (student_id, subject_id, status);

CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    actor       TEXT,
    action      TEXT NOT NULL,
    entity      TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    payload     TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_connection(":memory:").expect("opens");
        apply(&conn).expect("first apply");
        apply(&conn).expect("second apply");

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('students', 'student_loads', 'prospectus_entries', 'audit_log')",
                [],
                |row| row.get(0),
            )
            .expect("counts tables");
        assert_eq!(tables, 4);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open_connection(":memory:").expect("opens");
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("reads pragma");
        assert_eq!(enabled, 1);
    }
}
