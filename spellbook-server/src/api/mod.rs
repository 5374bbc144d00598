//! HTTP API handlers for spellbook-server

pub mod caller;
pub mod health;
pub mod pending;
pub mod personas;
pub mod spells;

pub use caller::{RequestCaller, SUBMITTER_HEADER, TOKEN_HEADER};
pub use health::health_routes;
pub use pending::{approve_spell, list_pending, reject_spell, submit_spell};
pub use personas::{
    add_persona_spell, delete_persona, get_persona, list_personas, put_persona,
    remove_persona_spell, save_personas,
};
pub use spells::{delete_spell, edit_spell, get_spell, import_spells, list_spells};
