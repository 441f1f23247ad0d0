use crate::infra::{print_json, service_without_queue, CliService};
use clap::Args;
use registrar::enrollment::domain::{NewStudentLoad, COMPLETION_STATUSES};
use registrar::enrollment::store::{
    NewProgram, NewProspectusEntry, NewSection, NewStudent, NewSubject, NewTerm,
};
use registrar::enrollment::{
    auto_load, Actor, PromotionRequest, SqliteRegistrarStore, StudentId, TermId,
};
use registrar::error::AppError;
use serde_json::json;
use std::sync::Arc;

const SECTIONED_STUDENT: &str = "2024-0101";
const IRREGULAR_STUDENT: &str = "2024-0102";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Seed this SQLite file instead of an in-memory database
    #[arg(long)]
    pub(crate) database: Option<String>,
    /// Stop after auto-load and skip the promotion walkthrough
    #[arg(long)]
    pub(crate) skip_promotion: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = match args.database.as_deref() {
        Some(path) => SqliteRegistrarStore::open(path)?,
        None => SqliteRegistrarStore::in_memory()?,
    };
    let store = Arc::new(store);
    let term = seed_catalog(&store)?;
    let service = service_without_queue(Arc::clone(&store));

    println!("== Auto-load preview (term {term}) ==");
    for student in [SECTIONED_STUDENT, IRREGULAR_STUDENT] {
        let subjects = service.preview(&StudentId::new(student), term)?;
        print_json(&json!({ "student_id": student, "subjects": subjects }));
    }

    let students = [StudentId::new(SECTIONED_STUDENT), StudentId::new(IRREGULAR_STUDENT)];
    println!("\n== Auto-load ==");
    print_json(&auto_load(store.as_ref(), &students, term)?);
    println!("\n== Auto-load again (no new rows expected) ==");
    print_json(&auto_load(store.as_ref(), &students, term)?);

    if !args.skip_promotion {
        promote_walkthrough(&service, term)?;
    }

    println!("\n== Loads for {SECTIONED_STUDENT} ==");
    print_json(&service.student_loads(&StudentId::new(SECTIONED_STUDENT))?);
    println!("\n== Audit log ==");
    print_json(&service.audit_log(10)?);
    Ok(())
}

fn promote_walkthrough(service: &CliService, term: TermId) -> Result<(), AppError> {
    println!("\n== Promote {SECTIONED_STUDENT} to year 3 (no worker, synchronous fallback) ==");
    let actor = Actor::new("registrar.demo");
    let outcome = service.promote(
        Some(&actor),
        PromotionRequest {
            student_ids: vec![StudentId::new(SECTIONED_STUDENT)],
            target_year_level: Some(3),
            term_id: Some(term),
        },
    )?;
    print_json(&outcome);
    Ok(())
}

/// Seeds one program whose year 2 curriculum has a section-specific row, a generic row gated
/// on a prerequisite, and a generic year 3 row used after promotion. Returns the active term.
fn seed_catalog(store: &SqliteRegistrarStore) -> Result<TermId, AppError> {
    let department = store.create_department("College of Computing Studies", "CCS")?;
    let program = store.create_program(NewProgram::new(
        "BS Computer Science",
        "BSCS",
        department.id,
    ))?;
    let section = store.create_section(NewSection {
        name: "BSCS-2A".to_string(),
        program_id: program.id,
        year_level: 2,
        semester: 1,
    })?;

    let previous = store.create_term(NewTerm::new("2023-2024", 2, false))?;
    let current = store.create_term(NewTerm::new("2024-2025", 1, true))?;

    let cs101 = store.create_subject(NewSubject::new("CS101", "Introduction to Computing", 3.0))?;
    let cs201 = store.create_subject(NewSubject::new("CS201", "Data Structures", 3.0))?;
    let cs210 = store.create_subject(NewSubject::new("CS210", "Discrete Structures", 3.0))?;
    let cs301 = store.create_subject(NewSubject::new("CS301", "Algorithms", 3.0))?;

    store.create_prospectus_entry(
        NewProspectusEntry::new(program.id, cs201.id, 2, 1)
            .academic_year("2024-2025")
            .section(section.id),
    )?;
    store.create_prospectus_entry(
        NewProspectusEntry::new(program.id, cs210.id, 2, 1).prerequisite(cs101.id),
    )?;
    store.create_prospectus_entry(NewProspectusEntry::new(program.id, cs301.id, 3, 1))?;

    store.create_student(
        NewStudent::new(SECTIONED_STUDENT, "Lea", "Santos", program.id)
            .year_level(2)
            .section(section.id)
            .academic_year("2024-2025"),
    )?;
    store.create_student(
        NewStudent::new(IRREGULAR_STUDENT, "Marco", "Reyes", program.id).year_level(2),
    )?;

    store.record_load(NewStudentLoad {
        student_id: StudentId::new(SECTIONED_STUDENT),
        term_id: previous.id,
        subject_id: cs101.id,
        status: COMPLETION_STATUSES[0].to_string(),
    })?;

    Ok(current.id)
}
