// Merge Workflow - what happens when a create or update surfaces
// high-confidence duplicates.
//
// Four states:
//
//   Drafting -> DuplicatesChecked -> Resolved
//                                 -> AwaitingConfirmation -> Resolved
//
// A terminal Resolved always carries exactly one outcome: created, updated,
// merged, or "used existing, no-op".

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::record::{CustomerFields, Field, ScoredDuplicate};
use crate::resolver::{DuplicateResolver, ResolveError};
use crate::settings::ThresholdConfig;
use crate::store::{MergeStamp, NewRecord, RecordStore, RecordUpdate, StoreError};

/// Raw similarity score a duplicate must exceed (strictly) to force a
/// confirmation step. Policy value, independent of the percentage tiers.
pub const DEFAULT_HIGH_CONFIDENCE_CUTOFF: u32 = 70;

/// How many duplicates the pre-write check fetches.
pub const DEFAULT_DUPLICATE_CHECK_LIMIT: usize = 5;

// ============================================================================
// STATES AND OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Drafting,
    DuplicatesChecked,
    AwaitingConfirmation,
    Resolved,
}

/// The draft operation an agent submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DraftAction {
    Create { fields: CustomerFields },
    Update { id: String, fields: CustomerFields },
}

impl DraftAction {
    pub fn fields(&self) -> &CustomerFields {
        match self {
            DraftAction::Create { fields } => fields,
            DraftAction::Update { fields, .. } => fields,
        }
    }

    /// Id of the pre-existing record this draft belongs to, if any.
    pub fn existing_id(&self) -> Option<&str> {
        match self {
            DraftAction::Create { .. } => None,
            DraftAction::Update { id, .. } => Some(id),
        }
    }
}

/// Which side wins each mergeable field. Unselected fields keep the
/// existing record's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeSelection {
    pub take_from_draft: Vec<Field>,
}

impl MergeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(mut self, field: Field) -> Self {
        if !self.take_from_draft.contains(&field) {
            self.take_from_draft.push(field);
        }
        self
    }

    pub fn is_selected(&self, field: Field) -> bool {
        self.take_from_draft.contains(&field)
    }
}

/// The agent's answer to a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum ResolutionChoice {
    /// Not a duplicate after all; apply the draft unmodified.
    Proceed,

    /// Discard the draft; the chosen record is already the right one.
    UseExisting { id: String },

    /// Merge the draft into an existing record, field by field.
    Merge {
        target_id: String,
        selections: MergeSelection,
    },
}

/// Exactly one of these per resolved invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolvedOutcome {
    Created { id: String },
    Updated { id: String },
    Merged { id: String, merged_fields: Vec<Field> },
    UsedExisting { id: String },
}

/// What `submit` hands back: either done, or a confirmation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Resolved(ResolvedOutcome),
    AwaitingConfirmation { duplicates: Vec<ScoredDuplicate> },
}

/// Draft plus the duplicates that triggered the prompt, held while the
/// workflow waits for the agent.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub action: DraftAction,
    pub duplicates: Vec<ScoredDuplicate>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("invalid workflow transition: {0}")]
    InvalidTransition(&'static str),

    #[error("draft has no searchable fields")]
    EmptyDraft,

    #[error(transparent)]
    DuplicateCheck(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// WORKFLOW
// ============================================================================

pub struct MergeWorkflow<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    settings: ThresholdConfig,
    state: WorkflowState,
    pending: Option<PendingConfirmation>,

    /// Raw-score cutoff above which a duplicate forces confirmation.
    pub high_confidence_cutoff: u32,

    /// Candidate count for the pre-write duplicate check.
    pub duplicate_check_limit: usize,

    /// Stamped into created_by / updated_by / merged_by.
    pub actor: String,
}

impl<'a, S: RecordStore + ?Sized> MergeWorkflow<'a, S> {
    pub fn new(store: &'a S, settings: ThresholdConfig) -> Self {
        MergeWorkflow {
            store,
            settings,
            state: WorkflowState::Drafting,
            pending: None,
            high_confidence_cutoff: DEFAULT_HIGH_CONFIDENCE_CUTOFF,
            duplicate_check_limit: DEFAULT_DUPLICATE_CHECK_LIMIT,
            actor: "customer_support".to_string(),
        }
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.high_confidence_cutoff = cutoff;
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Submit a draft create or update.
    ///
    /// Runs the duplicate check on the draft's searchable subset (address is
    /// kept in the draft but never matched on). High-confidence duplicates
    /// park the workflow in `AwaitingConfirmation`; otherwise the action is
    /// applied immediately. A failed duplicate check leaves the workflow in
    /// `Drafting` with nothing written.
    pub fn submit(&mut self, action: DraftAction) -> Result<SubmitOutcome, MergeError> {
        if self.state != WorkflowState::Drafting {
            return Err(MergeError::InvalidTransition(
                "submit is only valid while drafting",
            ));
        }

        let searchable = action.fields().searchable();
        if searchable.is_empty() {
            return Err(MergeError::EmptyDraft);
        }

        // The draft is treated as ad-hoc input here (no subject id), exactly
        // like a manual search; the update flow then drops its own record
        // from the list by identity.
        let resolver = DuplicateResolver::new(self.store);
        let mut duplicates = resolver.resolve(
            &searchable,
            None,
            &self.settings,
            self.duplicate_check_limit,
        )?;
        self.state = WorkflowState::DuplicatesChecked;

        if let Some(own_id) = action.existing_id() {
            duplicates.retain(|d| d.record.id != own_id);
        }

        let cutoff = self.high_confidence_cutoff;
        let qualifying: Vec<ScoredDuplicate> = duplicates
            .into_iter()
            .filter(|d| d.similarity_score > cutoff)
            .collect();

        if !qualifying.is_empty() {
            info!(
                count = qualifying.len(),
                draft = %action.fields().display_name(),
                "high-confidence duplicates found, awaiting confirmation"
            );
            self.pending = Some(PendingConfirmation {
                action,
                duplicates: qualifying.clone(),
            });
            self.state = WorkflowState::AwaitingConfirmation;
            return Ok(SubmitOutcome::AwaitingConfirmation {
                duplicates: qualifying,
            });
        }

        match self.apply_action(&action, false) {
            Ok(outcome) => {
                self.state = WorkflowState::Resolved;
                Ok(SubmitOutcome::Resolved(outcome))
            }
            Err(e) => {
                // nothing was applied; the draft can be resubmitted
                self.state = WorkflowState::Drafting;
                Err(e)
            }
        }
    }

    /// Answer a pending confirmation. On store failure the workflow stays in
    /// `AwaitingConfirmation` and nothing is partially applied.
    pub fn confirm(&mut self, choice: ResolutionChoice) -> Result<ResolvedOutcome, MergeError> {
        if self.state != WorkflowState::AwaitingConfirmation {
            return Err(MergeError::InvalidTransition(
                "confirm requires a pending confirmation",
            ));
        }
        let pending = self
            .pending
            .as_ref()
            .ok_or(MergeError::InvalidTransition("no pending draft"))?;
        let action = pending.action.clone();

        let outcome = match choice {
            ResolutionChoice::Proceed => self.apply_action(&action, true)?,
            ResolutionChoice::UseExisting { id } => {
                // read-only sanity check; no mutation for this choice
                self.store
                    .find_by_id(&id)?
                    .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
                info!(id = %id, "using existing record, draft discarded");
                ResolvedOutcome::UsedExisting { id }
            }
            ResolutionChoice::Merge {
                target_id,
                selections,
            } => self.apply_merge(&action, &target_id, &selections)?,
        };

        self.pending = None;
        self.state = WorkflowState::Resolved;
        Ok(outcome)
    }

    fn apply_action(
        &self,
        action: &DraftAction,
        confirmed: bool,
    ) -> Result<ResolvedOutcome, MergeError> {
        match action {
            DraftAction::Create { fields } => {
                let mut record = NewRecord::original(fields.clone(), &self.actor);
                record.confirmed_not_duplicate = confirmed;
                let id = self.store.insert(record)?;
                info!(id = %id, confirmed, "customer created");
                Ok(ResolvedOutcome::Created { id })
            }
            DraftAction::Update { id, fields } => {
                self.store.update(
                    id,
                    RecordUpdate {
                        fields: fields.clone(),
                        updated_by: self.actor.clone(),
                        confirmed_not_duplicate: confirmed,
                        merge_stamp: None,
                    },
                )?;
                info!(id = %id, confirmed, "customer updated");
                Ok(ResolvedOutcome::Updated { id: id.clone() })
            }
        }
    }

    /// Selective field merge onto the existing record. A single atomic
    /// field-set write; the stale draft record, if any, is deleted
    /// best-effort afterwards.
    fn apply_merge(
        &self,
        action: &DraftAction,
        target_id: &str,
        selections: &MergeSelection,
    ) -> Result<ResolvedOutcome, MergeError> {
        let target = self
            .store
            .find_by_id(target_id)?
            .ok_or_else(|| StoreError::NotFound {
                id: target_id.to_string(),
            })?;

        let draft = action.fields();
        let mut merged = CustomerFields::new();
        let mut merged_fields = Vec::new();

        for field in Field::MERGEABLE {
            let draft_value = draft.get(field);
            let existing_value = target.fields.get(field);

            // Selected fields take the draft's value; everything else keeps
            // the existing value. An empty side never wins over a value.
            let winner = if selections.is_selected(field) && draft_value.is_some() {
                merged_fields.push(field);
                draft_value
            } else {
                existing_value.or(draft_value)
            };
            merged.set(field, winner.map(str::to_string));
        }

        self.store.update(
            target_id,
            RecordUpdate {
                fields: merged,
                updated_by: self.actor.clone(),
                confirmed_not_duplicate: false,
                merge_stamp: Some(MergeStamp {
                    merged_by: self.actor.clone(),
                    merge_source: "selective_field_merge".to_string(),
                }),
            },
        )?;
        info!(
            id = %target_id,
            fields = merged_fields.len(),
            "records merged"
        );

        // The draft's own record is now redundant. Deletion is best-effort:
        // the merge already succeeded.
        if let Some(stale_id) = action.existing_id() {
            if stale_id != target_id {
                match self.store.delete(stale_id) {
                    Ok(()) => info!(id = %stale_id, "deleted redundant record after merge"),
                    Err(e) => {
                        warn!(id = %stale_id, error = %e, "failed to delete redundant record")
                    }
                }
            }
        }

        Ok(ResolvedOutcome::Merged {
            id: target_id.to_string(),
            merged_fields,
        })
    }
}
