use crate::demo::{run_demo, DemoArgs};
use crate::infra::{open_store, print_json, service_without_queue};
use crate::server;
use clap::{Args, Parser, Subcommand};
use registrar::config::AppConfig;
use registrar::enrollment::{auto_load, Actor, PromotionRequest, StudentId, TermId};
use registrar::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Registrar",
    about = "Run the registrar enrollment service or drive auto-load from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Show the subjects auto-load would enroll a student in, without writing anything
    Preview(PreviewArgs),
    /// Enroll students into their eligible subjects for a term
    AutoLoad(AutoLoadArgs),
    /// Promote continuing students to a new year level and auto-load them
    Promote(PromoteArgs),
    /// Seed an in-memory database and walk through resolution, auto-load, and promotion
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct PreviewArgs {
    /// Student number to preview
    #[arg(long)]
    pub(crate) student_id: String,
    /// Academic term primary key
    #[arg(long)]
    pub(crate) term_id: i64,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct AutoLoadArgs {
    /// Student numbers to load (repeat the flag for several)
    #[arg(long = "student-id", required = true)]
    pub(crate) student_ids: Vec<String>,
    /// Academic term primary key
    #[arg(long)]
    pub(crate) term_id: i64,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct PromoteArgs {
    /// Student numbers to promote (repeat the flag for several)
    #[arg(long = "student-id", required = true)]
    pub(crate) student_ids: Vec<String>,
    /// Year level the students move to
    #[arg(long)]
    pub(crate) target_year_level: u8,
    /// Academic term primary key; must be the active term
    #[arg(long)]
    pub(crate) term_id: i64,
    /// Username recorded in the audit log
    #[arg(long)]
    pub(crate) actor: Option<String>,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Preview(args) => run_preview(args),
        Command::AutoLoad(args) => run_auto_load(args),
        Command::Promote(args) => run_promote(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn database_path(database: Option<String>) -> Result<String, AppError> {
    match database {
        Some(path) => Ok(path),
        None => Ok(AppConfig::load()?.database.path),
    }
}

fn run_preview(args: PreviewArgs) -> Result<(), AppError> {
    let store = open_store(&database_path(args.database)?)?;
    let service = service_without_queue(store);
    let subjects = service.preview(&StudentId::new(args.student_id), TermId(args.term_id))?;
    print_json(&serde_json::json!({ "subjects": subjects }));
    Ok(())
}

fn run_auto_load(args: AutoLoadArgs) -> Result<(), AppError> {
    let store = open_store(&database_path(args.database)?)?;
    let student_ids: Vec<StudentId> = args.student_ids.into_iter().map(StudentId::new).collect();
    let outcome = auto_load(store.as_ref(), &student_ids, TermId(args.term_id))?;
    print_json(&outcome);
    Ok(())
}

fn run_promote(args: PromoteArgs) -> Result<(), AppError> {
    let store = open_store(&database_path(args.database)?)?;
    let service = service_without_queue(store);
    let actor = args.actor.map(Actor::new);
    let request = PromotionRequest {
        student_ids: args.student_ids.into_iter().map(StudentId::new).collect(),
        target_year_level: Some(args.target_year_level),
        term_id: Some(TermId(args.term_id)),
    };
    let outcome = service.promote(actor.as_ref(), request)?;
    print_json(&outcome);
    Ok(())
}
