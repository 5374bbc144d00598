//! # Spellbook Common Library
//!
//! Core of the spellbook catalog service:
//! - Records and identities (`record`)
//! - Canonical projection for equality checks (`canonical`)
//! - Per-field conflict resolution (`reconcile`, `decision`)
//! - Batch import orchestration (`import`)
//! - Moderation queue state machine (`moderation`)
//! - Player personas and their spell lists (`persona`)
//! - Catalog/queue/persona storage contracts and implementations (`store`, `db`)
//! - Configuration loading and admin token verification

pub mod auth;
pub mod canonical;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod decision;
pub mod error;
pub mod import;
pub mod models;
pub mod moderation;
pub mod persona;
pub mod reconcile;
pub mod record;
pub mod store;

pub use error::{Error, Result};
pub use import::{Caller, ImportOrchestrator, ImportSummary};
pub use models::{QueueEntry, Submitter};
pub use moderation::{ApprovalOutcome, ApprovalPolicy, ModerationService};
pub use persona::{Persona, PersonaBook, PersonaService};
pub use record::{Identity, Record, NAME_FIELD};
