//! Player personas and their personal spell lists
//!
//! A persona is keyed by the same name a player submits under, so the
//! persona a client has selected doubles as its [`Submitter`] identity.
//! Each persona carries the names of the spells on that player's list.
//! Settings the server does not interpret (PIN digests and the like) are
//! kept verbatim.
//!
//! Privileged callers may change any persona. Named callers may change only
//! their own; anonymous callers may only read.

use crate::import::Caller;
use crate::models::{Submitter, ANONYMOUS_SUBMITTER};
use crate::record::Identity;
use crate::store::SpellStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Every persona, keyed by persona name
pub type PersonaBook = BTreeMap<String, Persona>;

/// One player's persona
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Spell names on this persona's list, in the order they were added
    #[serde(default)]
    pub spells: Vec<String>,

    /// Client-side settings stored without interpretation
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Persona {
    pub fn with_spells<I, S>(spells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            spells: spells.into_iter().map(Into::into).collect(),
            extra: BTreeMap::new(),
        }
    }

    /// Whether the list holds a spell with the same identity as `name`
    pub fn has_spell(&self, name: &str) -> bool {
        let identity = Identity::of(name);
        self.spells.iter().any(|spell| Identity::of(spell) == identity)
    }

    /// Adds `name` unless a spell with its identity is already listed
    pub fn add_spell(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.has_spell(name) {
            return false;
        }
        self.spells.push(name.to_string());
        true
    }

    /// Removes every listed spell with the identity of `name`
    pub fn remove_spell(&mut self, name: &str) -> bool {
        let identity = Identity::of(name);
        let before = self.spells.len();
        self.spells.retain(|spell| Identity::of(spell) != identity);
        self.spells.len() != before
    }

    /// Trimmed, blank-free list with one entry per identity (first kept)
    pub fn normalized(mut self) -> Self {
        let mut seen = HashSet::new();
        self.spells = self
            .spells
            .into_iter()
            .map(|spell| spell.trim().to_string())
            .filter(|spell| !spell.is_empty() && seen.insert(Identity::of(spell)))
            .collect();
        self
    }
}

/// Trimmed persona name; blank names and the anonymous marker are refused
pub fn persona_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("persona name is blank".to_string()));
    }
    if name == ANONYMOUS_SUBMITTER {
        return Err(Error::InvalidInput(format!(
            "{} is reserved for anonymous submissions",
            ANONYMOUS_SUBMITTER
        )));
    }
    Ok(name.to_string())
}

/// Reads and edits personas on behalf of a [`Caller`]
pub struct PersonaService<'a> {
    store: &'a dyn SpellStore,
}

impl<'a> PersonaService<'a> {
    pub fn new(store: &'a dyn SpellStore) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<PersonaBook> {
        self.store.list_personas().await
    }

    pub async fn get(&self, name: &str) -> Result<Persona> {
        let name = persona_name(name)?;
        self.store
            .get_persona(&name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("persona {}", name)))
    }

    /// Saves every persona in `book` as one write; other personas are kept
    ///
    /// Returns how many personas were written.
    pub async fn save_all(&self, book: PersonaBook, caller: &Caller) -> Result<usize> {
        let mut normalized = PersonaBook::new();
        for (name, persona) in book {
            let name = persona_name(&name)?;
            authorize(caller, &name)?;
            normalized.insert(name, persona.normalized());
        }

        self.store.save_personas(&normalized).await?;
        info!(
            "Saved {} persona(s) for {}",
            normalized.len(),
            caller.submitter
        );

        Ok(normalized.len())
    }

    pub async fn save(&self, name: &str, persona: Persona, caller: &Caller) -> Result<Persona> {
        let name = persona_name(name)?;
        let persona = persona.normalized();
        self.save_all(PersonaBook::from([(name, persona.clone())]), caller)
            .await?;
        Ok(persona)
    }

    pub async fn delete(&self, name: &str, caller: &Caller) -> Result<()> {
        let name = persona_name(name)?;
        authorize(caller, &name)?;

        if !self.store.delete_persona(&name).await? {
            return Err(Error::NotFound(format!("persona {}", name)));
        }
        info!("Deleted persona {}", name);

        Ok(())
    }

    /// Adds a spell to a persona's list, creating the persona if needed
    pub async fn add_spell(&self, name: &str, spell: &str, caller: &Caller) -> Result<Persona> {
        let name = persona_name(name)?;
        authorize(caller, &name)?;
        if spell.trim().is_empty() {
            return Err(Error::InvalidInput("spell name is blank".to_string()));
        }

        let mut persona = self.store.get_persona(&name).await?.unwrap_or_default();
        if persona.add_spell(spell) {
            self.store
                .save_personas(&PersonaBook::from([(name, persona.clone())]))
                .await?;
        }

        Ok(persona)
    }

    pub async fn remove_spell(&self, name: &str, spell: &str, caller: &Caller) -> Result<Persona> {
        let name = persona_name(name)?;
        authorize(caller, &name)?;

        let mut persona = self
            .store
            .get_persona(&name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("persona {}", name)))?;
        if !persona.remove_spell(spell) {
            return Err(Error::NotFound(format!("spell {} on persona {}", spell, name)));
        }
        self.store
            .save_personas(&PersonaBook::from([(name, persona.clone())]))
            .await?;

        Ok(persona)
    }
}

fn authorize(caller: &Caller, name: &str) -> Result<()> {
    if caller.privileged {
        return Ok(());
    }
    match &caller.submitter {
        Submitter::Named(own) if own == name => Ok(()),
        other => Err(Error::Forbidden(format!(
            "{} may not change persona {}",
            other, name
        ))),
    }
}
