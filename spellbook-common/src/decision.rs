//! External decision-maker for import conflicts
//!
//! A privileged import pauses on each record that conflicts with the catalog
//! and asks a [`DecisionMaker`] what to do, one record at a time. Returning
//! `None` from [`DecisionMaker::resolve_conflicts`] means the decision was
//! cancelled, which the import treats as "keep existing".

use crate::reconcile::{Conflict, FieldChoice, Resolution};
use crate::record::{Identity, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Human-in-the-loop (or scripted) arbiter for conflicting records
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Choose a side for each conflicting field; `None` cancels
    async fn resolve_conflicts(
        &self,
        existing: &Record,
        incoming: &Record,
        conflicts: &[Conflict],
    ) -> Option<Resolution>;

    /// Final confirmation that `resolved` should replace `existing`
    async fn confirm_replace(&self, existing: &Record, resolved: &Record) -> bool;
}

/// Declines every conflict, leaving the catalog untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepExisting;

#[async_trait]
impl DecisionMaker for KeepExisting {
    async fn resolve_conflicts(&self, _: &Record, _: &Record, _: &[Conflict]) -> Option<Resolution> {
        None
    }

    async fn confirm_replace(&self, _: &Record, _: &Record) -> bool {
        false
    }
}

/// Takes the incoming value for every conflicting field
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferIncoming;

#[async_trait]
impl DecisionMaker for PreferIncoming {
    async fn resolve_conflicts(
        &self,
        _: &Record,
        _: &Record,
        conflicts: &[Conflict],
    ) -> Option<Resolution> {
        Some(
            conflicts
                .iter()
                .map(|conflict| (conflict.field.clone(), FieldChoice::Incoming))
                .collect(),
        )
    }

    async fn confirm_replace(&self, _: &Record, _: &Record) -> bool {
        true
    }
}

/// Decision supplied ahead of time for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecordDecision {
    /// Leave the catalog entry as it is
    Keep,
    /// Replace it, taking the listed side per field (unlisted fields keep
    /// the existing value unless `default` says otherwise)
    Replace {
        #[serde(default)]
        fields: Resolution,
        #[serde(default = "default_field_choice")]
        default: FieldChoice,
    },
}

fn default_field_choice() -> FieldChoice {
    FieldChoice::Existing
}

/// Decisions collected up front, keyed by record identity
///
/// Used where the decision-maker cannot be asked interactively, e.g. an HTTP
/// client that re-submits a batch together with its answers. Records without
/// a preset decision fall back to `fallback`, or are treated as cancelled
/// when there is none.
#[derive(Debug, Clone, Default)]
pub struct PresetDecisions {
    decisions: HashMap<Identity, RecordDecision>,
    fallback: Option<RecordDecision>,
}

impl PresetDecisions {
    pub fn new(decisions: HashMap<Identity, RecordDecision>) -> Self {
        Self {
            decisions,
            fallback: None,
        }
    }

    /// Decision applied to conflicting records not named in the preset map
    pub fn with_fallback(mut self, fallback: Option<RecordDecision>) -> Self {
        self.fallback = fallback;
        self
    }

    fn decision_for(&self, incoming: &Record) -> Option<&RecordDecision> {
        incoming
            .identity()
            .and_then(|identity| self.decisions.get(&identity))
            .or(self.fallback.as_ref())
    }
}

#[async_trait]
impl DecisionMaker for PresetDecisions {
    async fn resolve_conflicts(
        &self,
        _existing: &Record,
        incoming: &Record,
        conflicts: &[Conflict],
    ) -> Option<Resolution> {
        match self.decision_for(incoming)? {
            RecordDecision::Keep => None,
            RecordDecision::Replace { fields, default } => Some(
                conflicts
                    .iter()
                    .map(|conflict| {
                        let choice = fields.get(&conflict.field).copied().unwrap_or(*default);
                        (conflict.field.clone(), choice)
                    })
                    .collect(),
            ),
        }
    }

    async fn confirm_replace(&self, _existing: &Record, resolved: &Record) -> bool {
        matches!(
            self.decision_for(resolved),
            Some(RecordDecision::Replace { .. })
        )
    }
}
