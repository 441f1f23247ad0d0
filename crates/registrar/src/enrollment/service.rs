use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::auto_load::{auto_load, AutoLoadOutcome};
use super::dispatch::{AutoLoadJob, TaskDispatcher};
use super::domain::{
    Actor, AuditEntry, AuditRecord, LoadId, LoadView, NewStudentLoad, StudentId, StudentLoad,
    Subject, SubjectId, TermId, ENROLLED_STATUS,
};
use super::eligibility::EligibilityEngine;
use super::errors::{NotFoundError, RegistrarError, ValidationError};
use super::repository::{RegistrarRepository, RegistrarStore};

/// Promotion request as received from callers; every field is checked before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    #[serde(default)]
    pub student_ids: Vec<StudentId>,
    #[serde(default)]
    pub target_year_level: Option<u8>,
    #[serde(default)]
    pub term_id: Option<TermId>,
}

/// How the follow-up auto-load was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Queued,
    SyncFallback,
}

impl DispatchMode {
    pub fn label(self) -> &'static str {
        match self {
            DispatchMode::Queued => "queued",
            DispatchMode::SyncFallback => "sync_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub detail: String,
    pub promoted: usize,
    pub auto_load_mode: DispatchMode,
    pub auto_load_result: Option<AutoLoadOutcome>,
}

/// Manual load creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub student_id: StudentId,
    pub term_id: TermId,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub status: Option<String>,
}

/// Service composing the enrollment engine, the record store, and the task dispatcher.
pub struct RegistrarService<S, D> {
    store: Arc<S>,
    dispatcher: Arc<D>,
}

impl<S, D> RegistrarService<S, D>
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<D>) -> Self {
        Self { store, dispatcher }
    }

    /// Eligible subjects for an active student; read-only.
    pub fn preview(
        &self,
        student_id: &StudentId,
        term_id: TermId,
    ) -> Result<Vec<Subject>, RegistrarError> {
        self.store.read(|repository| -> Result<_, RegistrarError> {
            let student = repository
                .active_student(student_id)?
                .ok_or_else(|| NotFoundError::Student(student_id.clone()))?;
            let term = repository
                .term(term_id)?
                .ok_or(NotFoundError::Term(term_id))?;
            let subjects = EligibilityEngine::new(repository).eligible_subjects(&student, &term)?;
            Ok(subjects)
        })
    }

    /// Auto-load a single active student.
    pub fn auto_load_student(
        &self,
        actor: Option<&Actor>,
        student_id: &StudentId,
        term_id: TermId,
    ) -> Result<AutoLoadOutcome, RegistrarError> {
        self.store.read(|repository| -> Result<_, RegistrarError> {
            repository
                .active_student(student_id)?
                .ok_or_else(|| NotFoundError::Student(student_id.clone()))?;
            Ok(())
        })?;

        let outcome = auto_load(self.store.as_ref(), std::slice::from_ref(student_id), term_id)?;
        self.audit(
            actor,
            "auto_load",
            "Student",
            student_id.as_str(),
            json!({ "term_id": term_id, "result": outcome }),
        );
        Ok(outcome)
    }

    /// Move active students to `target_year_level`, then auto-load them for the term.
    ///
    /// The year-level update commits on its own. Auto-load goes through the dispatcher and
    /// only runs in-process when the dispatcher refuses the job.
    pub fn promote(
        &self,
        actor: Option<&Actor>,
        request: PromotionRequest,
    ) -> Result<PromotionOutcome, RegistrarError> {
        let PromotionRequest {
            student_ids,
            target_year_level,
            term_id,
        } = request;
        let (Some(target_year_level), Some(term_id)) = (target_year_level, term_id) else {
            return Err(ValidationError::IncompletePromotion.into());
        };
        if student_ids.is_empty() {
            return Err(ValidationError::IncompletePromotion.into());
        }
        if target_year_level == 0 {
            return Err(ValidationError::InvalidYearLevel.into());
        }

        let promoted = self.store.atomic(|repository| -> Result<_, RegistrarError> {
            let term = repository
                .term(term_id)?
                .ok_or(NotFoundError::Term(term_id))?;
            if !term.is_active {
                return Err(ValidationError::InactivePromotionTerm.into());
            }

            repository.set_year_level(&student_ids, target_year_level)?;
            Ok(repository.active_students(&student_ids)?)
        })?;

        info!(
            term_id = %term_id,
            target_year_level,
            promoted = promoted.len(),
            "students promoted"
        );

        let job = AutoLoadJob {
            student_ids: student_ids.clone(),
            term_id,
        };
        let (mode, result) = match self.dispatcher.enqueue(job) {
            Ok(()) => (DispatchMode::Queued, None),
            Err(err) => {
                warn!(error = %err, term_id = %term_id, "auto-load dispatch failed, running inline");
                let outcome = auto_load(self.store.as_ref(), &student_ids, term_id)?;
                (DispatchMode::SyncFallback, Some(outcome))
            }
        };

        for student in &promoted {
            let mut payload = json!({
                "target_year_level": target_year_level,
                "term_id": term_id,
                "mode": mode.label(),
            });
            if let Some(outcome) = result {
                payload["result"] = json!(outcome);
            }
            self.audit(
                actor,
                "promote",
                "Student",
                student.student_id.as_str(),
                payload,
            );
        }

        Ok(PromotionOutcome {
            detail: format!("Promoted {} students.", promoted.len()),
            promoted: promoted.len(),
            auto_load_mode: mode,
            auto_load_result: result,
        })
    }

    /// Create one load after checking the term, prospectus mapping, and prerequisite.
    pub fn create_load(
        &self,
        actor: Option<&Actor>,
        request: LoadRequest,
    ) -> Result<StudentLoad, RegistrarError> {
        let status = match request.status.as_deref().map(str::trim) {
            None => ENROLLED_STATUS.to_string(),
            Some("") => return Err(ValidationError::BlankStatus.into()),
            Some(status) => status.to_string(),
        };

        let load = self.store.atomic(|repository| -> Result<_, RegistrarError> {
            validate_load_target(
                repository,
                &request.student_id,
                request.term_id,
                request.subject_id,
            )?;
            Ok(repository.insert_load(&NewStudentLoad {
                student_id: request.student_id.clone(),
                term_id: request.term_id,
                subject_id: request.subject_id,
                status,
            })?)
        })?;

        self.audit(
            actor,
            "create",
            "StudentLoad",
            &load.id.to_string(),
            json!({
                "student_id": load.student_id,
                "term_id": load.term_id,
                "subject_id": load.subject_id,
                "status": load.status,
            }),
        );
        Ok(load)
    }

    /// Change a load's status; the load's term must still be active.
    pub fn update_load_status(
        &self,
        actor: Option<&Actor>,
        load_id: LoadId,
        status: &str,
    ) -> Result<StudentLoad, RegistrarError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ValidationError::BlankStatus.into());
        }

        let load = self.store.atomic(|repository| -> Result<_, RegistrarError> {
            let existing = repository
                .load(load_id)?
                .ok_or(NotFoundError::Load(load_id))?;
            validate_load_target(
                repository,
                &existing.student_id,
                existing.term_id,
                existing.subject_id,
            )?;
            Ok(repository.update_load_status(load_id, status)?)
        })?;

        self.audit(
            actor,
            "update",
            "StudentLoad",
            &load.id.to_string(),
            json!({ "status": load.status }),
        );
        Ok(load)
    }

    pub fn student_loads(&self, student_id: &StudentId) -> Result<Vec<LoadView>, RegistrarError> {
        self.store.read(|repository| -> Result<_, RegistrarError> {
            repository
                .active_student(student_id)?
                .ok_or_else(|| NotFoundError::Student(student_id.clone()))?;
            Ok(repository.loads_for_student(student_id)?)
        })
    }

    /// Soft delete: the student disappears from every query but the row stays.
    pub fn deactivate_student(
        &self,
        actor: Option<&Actor>,
        student_id: &StudentId,
    ) -> Result<(), RegistrarError> {
        let deactivated = self
            .store
            .atomic(|repository| repository.deactivate_student(student_id))
            .map_err(RegistrarError::from)?;
        if !deactivated {
            return Err(NotFoundError::Student(student_id.clone()).into());
        }

        self.audit(
            actor,
            "soft_delete",
            "Student",
            student_id.as_str(),
            json!({ "is_active": false }),
        );
        Ok(())
    }

    pub fn audit_log(&self, limit: usize) -> Result<Vec<AuditRecord>, RegistrarError> {
        self.store
            .read(|repository| repository.recent_audit(limit))
            .map_err(RegistrarError::from)
    }

    /// Best-effort audit write; skipped without an actor, logged when the store rejects it.
    fn audit(&self, actor: Option<&Actor>, action: &str, entity: &str, entity_id: &str, payload: Value) {
        let Some(actor) = actor else {
            return;
        };

        let entry = AuditEntry {
            actor: actor.clone(),
            action: action.to_string(),
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            payload,
        };
        if let Err(err) = self
            .store
            .atomic(|repository| repository.record_audit(&entry))
        {
            warn!(error = %err, action, entity, entity_id, "audit entry dropped");
        }
    }
}

fn validate_load_target(
    repository: &dyn RegistrarRepository,
    student_id: &StudentId,
    term_id: TermId,
    subject_id: SubjectId,
) -> Result<(), RegistrarError> {
    let student = repository
        .active_student(student_id)?
        .ok_or_else(|| NotFoundError::Student(student_id.clone()))?;
    let term = repository
        .term(term_id)?
        .ok_or(NotFoundError::Term(term_id))?;
    let subject = repository
        .subject(subject_id)?
        .ok_or(NotFoundError::Subject(subject_id))?;

    EligibilityEngine::new(repository).validate_load(&student, &term, &subject)
}
