//! Student enrollment: prospectus resolution, eligibility, auto-load, and promotion.

pub mod auto_load;
pub mod dispatch;
pub mod domain;
pub(crate) mod eligibility;
pub mod errors;
pub mod prospectus;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use auto_load::{auto_load, AutoLoadOutcome};
pub use dispatch::{
    task_queue, AutoLoadJob, AutoLoadWorker, DispatchError, InlineDispatcher, QueueDispatcher,
    RetryPolicy, TaskDispatcher,
};
pub use domain::{
    AcademicTerm, Actor, AuditRecord, LoadId, LoadView, ProgramId, SectionId, Student, StudentId,
    StudentLoad, Subject, SubjectId, TermId,
};
pub use eligibility::EligibilityEngine;
pub use errors::{NotFoundError, RegistrarError, ValidationError};
pub use prospectus::{ProspectusResolver, Resolution, SpecificityTier};
pub use repository::{RegistrarRepository, RegistrarStore, RepositoryError};
pub use router::{registrar_router, ACTOR_HEADER};
pub use service::{DispatchMode, LoadRequest, PromotionOutcome, PromotionRequest, RegistrarService};
pub use store::SqliteRegistrarStore;
