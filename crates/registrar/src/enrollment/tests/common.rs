use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::enrollment::dispatch::{AutoLoadJob, DispatchError, InlineDispatcher, TaskDispatcher};
use crate::enrollment::domain::{
    AcademicTerm, NewStudentLoad, ProgramId, SectionId, StudentId, Subject, SubjectId,
};
use crate::enrollment::repository::RegistrarStore;
use crate::enrollment::service::RegistrarService;
use crate::enrollment::store::{
    NewProgram, NewProspectusEntry, NewSection, NewStudent, NewSubject, NewTerm,
    SqliteRegistrarStore,
};

pub(super) const ANA: &str = "2024-0001";
pub(super) const BEN: &str = "2024-0002";
pub(super) const CARA: &str = "2024-0003";
pub(super) const DINO: &str = "2024-0004";
pub(super) const EVE: &str = "2024-0009";

/// Seeded BSIT program with one active and one closed term.
///
/// Year 2 / semester 1 curriculum:
/// - exact (2024-2025 + BSIT-2A): CS201
/// - year only (2024-2025): CS202
/// - section only (BSIT-2A): GE101
/// - generic: CS201, IT210 (requires CS101)
///
/// Year 3 / semester 1 generic: CS301.
///
/// Students: Ana hits the exact tier, Ben the generic tier, Cara the year-only tier, Dino the
/// section-only tier. Eve is inactive.
pub(super) struct Scenario {
    pub(super) store: Arc<SqliteRegistrarStore>,
    pub(super) program: ProgramId,
    pub(super) section: SectionId,
    pub(super) active_term: AcademicTerm,
    pub(super) closed_term: AcademicTerm,
    pub(super) cs101: Subject,
    pub(super) cs201: Subject,
    pub(super) cs202: Subject,
    pub(super) ge101: Subject,
    pub(super) it210: Subject,
    pub(super) cs301: Subject,
}

impl Scenario {
    pub(super) fn student(&self, id: &str) -> StudentId {
        StudentId::new(id)
    }

    /// Record a historical load for `student` in the closed term.
    pub(super) fn history(&self, student: &str, subject: SubjectId, status: &str) {
        self.store
            .record_load(NewStudentLoad {
                student_id: StudentId::new(student),
                term_id: self.closed_term.id,
                subject_id: subject,
                status: status.to_string(),
            })
            .expect("history load recorded");
    }

    pub(super) fn load_count(&self) -> usize {
        self.store.load_count().expect("load count")
    }
}

pub(super) fn scenario() -> Scenario {
    let store = SqliteRegistrarStore::in_memory().expect("in-memory store");

    let department = store
        .create_department("College of Computing Studies", "CCS")
        .expect("department");
    let program = store
        .create_program(NewProgram::new(
            "BS Information Technology",
            "BSIT",
            department.id,
        ))
        .expect("program");
    let section = store
        .create_section(NewSection {
            name: "BSIT-2A".to_string(),
            program_id: program.id,
            year_level: 2,
            semester: 1,
        })
        .expect("section");

    let active_term = store
        .create_term(NewTerm::new("2024-2025", 1, true))
        .expect("active term");
    let closed_term = store
        .create_term(NewTerm::new("2023-2024", 2, false))
        .expect("closed term");

    let subject = |code: &str, title: &str| {
        store
            .create_subject(NewSubject::new(code, title, 3.0))
            .expect("subject")
    };
    let cs101 = subject("CS101", "Introduction to Computing");
    let cs201 = subject("CS201", "Data Structures");
    let cs202 = subject("CS202", "Discrete Structures");
    let ge101 = subject("GE101", "Purposive Communication");
    let it210 = subject("IT210", "Web Systems");
    let cs301 = subject("CS301", "Software Engineering");

    let entry = |entry: NewProspectusEntry| {
        store.create_prospectus_entry(entry).expect("prospectus entry");
    };
    entry(
        NewProspectusEntry::new(program.id, cs201.id, 2, 1)
            .academic_year("2024-2025")
            .section(section.id),
    );
    entry(NewProspectusEntry::new(program.id, cs202.id, 2, 1).academic_year("2024-2025"));
    entry(NewProspectusEntry::new(program.id, ge101.id, 2, 1).section(section.id));
    entry(NewProspectusEntry::new(program.id, cs201.id, 2, 1));
    entry(NewProspectusEntry::new(program.id, it210.id, 2, 1).prerequisite(cs101.id));
    entry(NewProspectusEntry::new(program.id, cs301.id, 3, 1));

    let student = |student: NewStudent| {
        store.create_student(student).expect("student");
    };
    student(
        NewStudent::new(ANA, "Ana", "Reyes", program.id)
            .year_level(2)
            .section(section.id)
            .academic_year("2024-2025"),
    );
    student(NewStudent::new(BEN, "Ben", "Santos", program.id).year_level(2));
    student(
        NewStudent::new(CARA, "Cara", "Lim", program.id)
            .year_level(2)
            .academic_year("2024-2025"),
    );
    student(
        NewStudent::new(DINO, "Dino", "Cruz", program.id)
            .year_level(2)
            .section(section.id)
            .academic_year("2023-2024"),
    );
    student(NewStudent::new(EVE, "Eve", "Garcia", program.id).year_level(2));
    let deactivated = store
        .atomic(|repository| repository.deactivate_student(&StudentId::new(EVE)))
        .expect("eve deactivated");
    assert!(deactivated);

    Scenario {
        store: Arc::new(store),
        program: program.id,
        section: section.id,
        active_term,
        closed_term,
        cs101,
        cs201,
        cs202,
        ge101,
        it210,
        cs301,
    }
}

pub(super) fn inline_service(
    scenario: &Scenario,
) -> RegistrarService<SqliteRegistrarStore, InlineDispatcher<SqliteRegistrarStore>> {
    let dispatcher = Arc::new(InlineDispatcher::new(Arc::clone(&scenario.store)));
    RegistrarService::new(Arc::clone(&scenario.store), dispatcher)
}

pub(super) fn service_with<D: TaskDispatcher + 'static>(
    scenario: &Scenario,
    dispatcher: D,
) -> RegistrarService<SqliteRegistrarStore, D> {
    RegistrarService::new(Arc::clone(&scenario.store), Arc::new(dispatcher))
}

/// Accepts and remembers jobs without running them.
#[derive(Default, Clone)]
pub(super) struct RecordingDispatcher {
    jobs: Arc<Mutex<Vec<AutoLoadJob>>>,
}

impl RecordingDispatcher {
    pub(super) fn jobs(&self) -> Vec<AutoLoadJob> {
        self.jobs.lock().expect("dispatcher mutex poisoned").clone()
    }
}

impl TaskDispatcher for RecordingDispatcher {
    fn enqueue(&self, job: AutoLoadJob) -> Result<(), DispatchError> {
        self.jobs
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(job);
        Ok(())
    }
}

/// Broker that is always down.
pub(super) struct OfflineDispatcher;

impl TaskDispatcher for OfflineDispatcher {
    fn enqueue(&self, _job: AutoLoadJob) -> Result<(), DispatchError> {
        Err(DispatchError::Unavailable("broker offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Tens of thousands of unknown ids around one real student, past SQLite's bound-parameter limit.
pub(super) fn oversized_batch(known: &str) -> Vec<StudentId> {
    let mut ids: Vec<StudentId> = (0..40_000)
        .map(|n| StudentId::new(format!("2099-{n:05}")))
        .collect();
    ids.insert(20_000, StudentId::new(known));
    ids
}
