//! The reference registry: every named type resolved during a run.
//!
//! Entries move from `Pending` to `Resolved`. A type that refers back to
//! itself (directly or through other types) finds its own `Pending` entry
//! and gets a reference to it instead of recursing; the entry is
//! backfilled once the outer resolution completes.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::decl::FieldDecl;
use crate::schema::{Schema, SchemaType};
use crate::types::Context;

/// Resolution state of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Resolved,
}

/// A field of a resolved struct, with embedded fields already flattened in.
#[derive(Debug, Clone)]
pub struct Param {
    /// Property name after tag lookup.
    pub name: String,
    pub field: FieldDecl,
    /// Package path the field was declared in.
    pub package: String,
    pub file: String,
}

/// A named type and its resolved schema.
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    /// Registry key, `<package name>.<TypeName>`.
    pub key: String,
    /// Type name as declared.
    pub name: String,
    /// Package import path.
    pub package: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub context: Context,
    pub schema: Schema,
    #[serde(skip)]
    pub fields: Vec<Param>,
    /// Only reached as an embedded field; its fields are already flattened
    /// into the embedding struct.
    #[serde(rename = "embedded", skip_serializing_if = "std::ops::Not::not")]
    pub is_embed: bool,
}

impl Reference {
    /// Placeholder registered while the type is being resolved.
    pub fn placeholder(
        key: impl Into<String>,
        name: impl Into<String>,
        package: impl Into<String>,
        file: impl Into<String>,
        context: Context,
    ) -> Self {
        Reference {
            key: key.into(),
            name: name.into(),
            package: package.into(),
            file: file.into(),
            info: None,
            context,
            schema: Schema::typed(SchemaType::Object),
            fields: Vec::new(),
            is_embed: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    state: EntryState,
    reference: Reference,
}

/// Every reference produced by a run, keyed by `<package>.<TypeName>`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Reference> {
        self.entries.get(key).map(|e| &e.reference)
    }

    pub fn state(&self, key: &str) -> Option<EntryState> {
        self.entries.get(key).map(|e| e.state)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.reference))
    }

    /// True once no entry is still pending.
    pub fn is_complete(&self) -> bool {
        self.entries
            .values()
            .all(|e| e.state == EntryState::Resolved)
    }

    /// Register `placeholder` as pending. An existing entry is left alone.
    pub(crate) fn begin(&mut self, placeholder: Reference) {
        self.entries
            .entry(placeholder.key.clone())
            .or_insert(Entry {
                state: EntryState::Pending,
                reference: placeholder,
            });
    }

    /// Replace the entry for `reference.key` with the finished record.
    ///
    /// An `is_embed` flag already cleared by a direct request stays cleared.
    pub(crate) fn complete(&mut self, mut reference: Reference) {
        if let Some(existing) = self.entries.get(&reference.key) {
            reference.is_embed &= existing.reference.is_embed;
        }
        self.entries.insert(
            reference.key.clone(),
            Entry {
                state: EntryState::Resolved,
                reference,
            },
        );
    }

    /// Mark a type as directly used, not only embedded.
    pub(crate) fn clear_embed(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.reference.is_embed = false;
        }
    }

    /// Schemas for the documented definitions section.
    ///
    /// Skips types only reached as embedded fields and types used as
    /// path, query or form parameters; `{omitdoc}` properties are pruned.
    pub fn definitions(&self) -> BTreeMap<String, Schema> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.reference.is_embed && !e.reference.context.is_parameter())
            .map(|(k, e)| (k.clone(), e.reference.schema.documented()))
            .collect()
    }
}

impl Serialize for Registry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, &entry.reference)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(key: &str, context: Context) -> Reference {
        let name = key.rsplit('.').next().unwrap_or(key);
        Reference::placeholder(key, name, "example.com/models", "models/a.go", context)
    }

    #[test]
    fn begin_then_complete() {
        let mut registry = Registry::new();
        registry.begin(reference("models.User", Context::Body));
        assert_eq!(registry.state("models.User"), Some(EntryState::Pending));
        assert!(!registry.is_complete());

        let mut done = reference("models.User", Context::Body);
        done.schema.insert_property("id", Schema::typed(SchemaType::Integer));
        registry.complete(done);

        assert_eq!(registry.state("models.User"), Some(EntryState::Resolved));
        assert!(registry.is_complete());
        assert!(registry.get("models.User").unwrap().schema.properties.contains_key("id"));
    }

    #[test]
    fn begin_does_not_replace_existing_entry() {
        let mut registry = Registry::new();
        let mut done = reference("models.User", Context::Body);
        done.info = Some("resolved".into());
        registry.complete(done);

        registry.begin(reference("models.User", Context::Body));
        assert_eq!(registry.state("models.User"), Some(EntryState::Resolved));
        assert_eq!(registry.get("models.User").unwrap().info.as_deref(), Some("resolved"));
    }

    #[test]
    fn direct_use_clears_embed_flag_through_completion() {
        let mut registry = Registry::new();
        let mut embedded = reference("models.Base", Context::Body);
        embedded.is_embed = true;
        registry.begin(embedded.clone());
        registry.clear_embed("models.Base");
        registry.complete(embedded);

        assert!(!registry.get("models.Base").unwrap().is_embed);
    }

    #[test]
    fn definitions_skip_embeds_and_parameters() {
        let mut registry = Registry::new();
        registry.complete(reference("models.User", Context::Body));

        let mut base = reference("models.Base", Context::Body);
        base.is_embed = true;
        registry.complete(base);
        registry.complete(reference("models.Filter", Context::Query));

        let defs = registry.definitions();
        assert_eq!(defs.keys().collect::<Vec<_>>(), vec!["models.User"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn definitions_prune_omitted_properties() {
        let mut hidden = Schema::typed(SchemaType::String);
        hidden.omit_doc = true;
        let mut user = reference("models.User", Context::Body);
        user.schema.insert_property("secret", hidden);
        user.schema.insert_property("name", Schema::typed(SchemaType::String));
        registry_with(user, |registry| {
            let defs = registry.definitions();
            let schema = &defs["models.User"];
            assert!(!schema.properties.contains_key("secret"));
            assert!(schema.properties.contains_key("name"));
            assert!(registry.get("models.User").unwrap().schema.properties.contains_key("secret"));
        });
    }

    fn registry_with(reference: Reference, check: impl FnOnce(&Registry)) {
        let mut registry = Registry::new();
        registry.complete(reference);
        check(&registry);
    }

    #[test]
    fn serializes_as_map_of_references() {
        let mut registry = Registry::new();
        registry.complete(reference("models.User", Context::Body));
        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(json["models.User"]["name"], "User");
        assert_eq!(json["models.User"]["context"], "body");
        assert_eq!(json["models.User"]["schema"]["type"], "object");
        assert!(json["models.User"].get("embedded").is_none());
    }
}
