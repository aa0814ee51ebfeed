//! The renderer-agnostic schema node produced by resolution.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Schema type keyword.
///
/// `Enum` is not a JSON Schema type; renderers translate it for their
/// output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Null,
    Boolean,
    Number,
    String,
    Integer,
    Object,
    Array,
    Enum,
}

impl SchemaType {
    /// Leaf types need no further lookup once mapped.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            SchemaType::Null
                | SchemaType::Boolean
                | SchemaType::Number
                | SchemaType::String
                | SchemaType::Integer
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(SchemaType::Null),
            "boolean" => Some(SchemaType::Boolean),
            "number" => Some(SchemaType::Number),
            "string" => Some(SchemaType::String),
            "integer" => Some(SchemaType::Integer),
            "object" => Some(SchemaType::Object),
            "array" => Some(SchemaType::Array),
            "enum" => Some(SchemaType::Enum),
            _ => None,
        }
    }
}

/// One node of a resolved schema tree.
///
/// A node is either inline-typed (`ty`, `properties`, `items`) or a named
/// reference (`reference`), never both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "SchemaRepr")]
pub struct Schema {
    pub reference: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub ty: Option<SchemaType>,
    pub enum_values: Vec<String>,
    /// Primitive type an `Enum` node's values belong to. Not a schema
    /// keyword; the validator uses it to type the literals.
    pub enum_type: Option<SchemaType>,
    pub format: Option<String>,
    pub required: Vec<String>,
    pub default: Option<String>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub read_only: Option<bool>,
    pub items: Option<Box<Schema>>,
    pub properties: BTreeMap<String, Schema>,
    /// Declaration order of `properties`.
    pub property_order: Vec<String>,
    pub additional_properties: Option<Box<Schema>>,
    /// Excluded from rendered documentation; still resolvable.
    pub omit_doc: bool,
}

impl Schema {
    pub fn typed(ty: SchemaType) -> Self {
        Schema {
            ty: Some(ty),
            ..Default::default()
        }
    }

    pub fn reference_to(name: impl Into<String>) -> Self {
        Schema {
            reference: Some(name.into()),
            ..Default::default()
        }
    }

    /// Turn this node into a reference to `name`.
    ///
    /// Inline shape, value constraints and description are dropped. Only
    /// the markers that describe the field rather than its value
    /// (`required`, `readOnly`, `omitdoc`) are kept.
    pub fn into_reference(self, name: impl Into<String>) -> Self {
        Schema {
            reference: Some(name.into()),
            required: self.required,
            read_only: self.read_only,
            omit_doc: self.omit_doc,
            ..Default::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Insert a property, keeping declaration order.
    pub fn insert_property(&mut self, name: impl Into<String>, prop: Schema) {
        let name = name.into();
        if self.properties.insert(name.clone(), prop).is_none() {
            self.property_order.push(name);
        }
    }

    /// Properties in declaration order; names missing from the order
    /// follow in key order.
    pub fn ordered_properties(&self) -> impl Iterator<Item = (&str, &Schema)> {
        let listed = self
            .property_order
            .iter()
            .filter_map(|name| self.properties.get_key_value(name));
        let rest = self
            .properties
            .iter()
            .filter(|(name, _)| !self.property_order.contains(name));
        listed.chain(rest).map(|(k, v)| (k.as_str(), v))
    }

    /// Add a name to `required` unless already present.
    pub fn add_required(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
    }

    /// Overlay every attribute set in `other` on top of this node.
    ///
    /// Attributes absent in `other` keep their current value.
    pub fn overlay(&mut self, other: Schema) {
        if other.reference.is_some() {
            self.reference = other.reference;
        }
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.ty.is_some() {
            self.ty = other.ty;
        }
        if !other.enum_values.is_empty() {
            self.enum_values = other.enum_values;
        }
        if other.enum_type.is_some() {
            self.enum_type = other.enum_type;
        }
        if other.format.is_some() {
            self.format = other.format;
        }
        for name in other.required {
            self.add_required(name);
        }
        if other.default.is_some() {
            self.default = other.default;
        }
        if other.minimum.is_some() {
            self.minimum = other.minimum;
        }
        if other.maximum.is_some() {
            self.maximum = other.maximum;
        }
        if other.read_only.is_some() {
            self.read_only = other.read_only;
        }
        if other.items.is_some() {
            self.items = other.items;
        }
        if !other.properties.is_empty() {
            self.properties = other.properties;
            self.property_order = other.property_order;
        }
        if other.additional_properties.is_some() {
            self.additional_properties = other.additional_properties;
        }
        self.omit_doc |= other.omit_doc;
    }

    /// Copy of this node with `omit_doc` properties pruned at every depth.
    pub fn documented(&self) -> Schema {
        let mut out = self.clone();
        out.prune_omitted();
        out
    }

    fn prune_omitted(&mut self) {
        let omitted: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, p)| p.omit_doc)
            .map(|(k, _)| k.clone())
            .collect();
        for name in &omitted {
            self.properties.remove(name);
        }
        self.property_order.retain(|n| !omitted.contains(n));
        self.required.retain(|n| !omitted.contains(n));

        for prop in self.properties.values_mut() {
            prop.prune_omitted();
        }
        if let Some(items) = self.items.as_deref_mut() {
            items.prune_omitted();
        }
        if let Some(additional) = self.additional_properties.as_deref_mut() {
            additional.prune_omitted();
        }
    }

    /// Serialize to JSON with properties in declaration order.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(reference) = &self.reference {
            map.serialize_entry("$ref", reference)?;
        }
        if let Some(title) = &self.title {
            map.serialize_entry("title", title)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(ty) = &self.ty {
            map.serialize_entry("type", ty)?;
        }
        if !self.enum_values.is_empty() {
            map.serialize_entry("enum", &self.enum_values)?;
        }
        if let Some(format) = &self.format {
            map.serialize_entry("format", format)?;
        }
        if !self.required.is_empty() {
            map.serialize_entry("required", &self.required)?;
        }
        if let Some(default) = &self.default {
            map.serialize_entry("default", default)?;
        }
        if let Some(minimum) = self.minimum {
            map.serialize_entry("minimum", &minimum)?;
        }
        if let Some(maximum) = self.maximum {
            map.serialize_entry("maximum", &maximum)?;
        }
        if let Some(read_only) = self.read_only {
            map.serialize_entry("readOnly", &read_only)?;
        }
        if let Some(items) = &self.items {
            map.serialize_entry("items", items)?;
        }
        if !self.properties.is_empty() {
            map.serialize_entry("properties", &OrderedProperties(self))?;
        }
        if let Some(additional) = &self.additional_properties {
            map.serialize_entry("additionalProperties", additional)?;
        }
        map.end()
    }
}

struct OrderedProperties<'a>(&'a Schema);

impl Serialize for OrderedProperties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.properties.len()))?;
        for (name, prop) in self.0.ordered_properties() {
            map.serialize_entry(name, prop)?;
        }
        map.end()
    }
}

/// Wire shape used when deserializing hand-written schema documents.
///
/// Properties pass through an order-preserving map so their authored
/// order survives.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaRepr {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    ty: Option<SchemaType>,
    #[serde(rename = "enum", default)]
    enum_values: Vec<Value>,
    format: Option<String>,
    #[serde(default)]
    required: Vec<String>,
    default: Option<Value>,
    minimum: Option<i64>,
    maximum: Option<i64>,
    read_only: Option<bool>,
    items: Option<Box<Schema>>,
    properties: Option<Map<String, Value>>,
    additional_properties: Option<Value>,
}

impl TryFrom<SchemaRepr> for Schema {
    type Error = serde_json::Error;

    fn try_from(repr: SchemaRepr) -> Result<Self, Self::Error> {
        let mut schema = Schema {
            reference: repr.reference,
            title: repr.title,
            description: repr.description,
            ty: repr.ty,
            enum_values: repr.enum_values.into_iter().map(literal).collect(),
            format: repr.format,
            required: repr.required,
            default: repr.default.map(literal),
            minimum: repr.minimum,
            maximum: repr.maximum,
            read_only: repr.read_only,
            items: repr.items,
            ..Default::default()
        };

        for (name, value) in repr.properties.unwrap_or_default() {
            let prop: Schema = serde_json::from_value(value)?;
            schema.insert_property(name, prop);
        }

        // `additionalProperties: true/false` carries no schema.
        if let Some(value @ Value::Object(_)) = repr.additional_properties {
            schema.additional_properties = Some(Box::new(serde_json::from_value(value)?));
        }

        Ok(schema)
    }
}

/// String encoding of a literal: strings as-is, anything else as JSON text.
fn literal(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_reference_clears_description_and_shape() {
        let mut schema = Schema::typed(SchemaType::Object);
        schema.description = Some("A user".into());
        schema.insert_property("id", Schema::typed(SchemaType::Integer));
        schema.read_only = Some(true);

        let reference = schema.into_reference("models.User");
        assert_eq!(reference.reference.as_deref(), Some("models.User"));
        assert!(reference.description.is_none());
        assert!(reference.ty.is_none());
        assert!(reference.properties.is_empty());
        assert_eq!(reference.read_only, Some(true));
    }

    #[test]
    fn into_reference_drops_value_constraints() {
        let mut schema = Schema::typed(SchemaType::Enum);
        schema.enum_values = vec!["a".into()];
        schema.enum_type = Some(SchemaType::String);
        schema.format = Some("date".into());
        schema.default = Some("a".into());
        schema.minimum = Some(1);
        schema.maximum = Some(9);
        schema.add_required("owner");
        schema.omit_doc = true;

        let reference = schema.into_reference("models.User");
        assert_eq!(
            reference.to_json(),
            json!({ "$ref": "models.User", "required": ["owner"] })
        );
        assert!(reference.omit_doc);
    }

    #[test]
    fn insert_property_keeps_declaration_order() {
        let mut schema = Schema::typed(SchemaType::Object);
        schema.insert_property("zeta", Schema::typed(SchemaType::String));
        schema.insert_property("alpha", Schema::typed(SchemaType::String));
        schema.insert_property("zeta", Schema::typed(SchemaType::Integer));

        let names: Vec<&str> = schema.ordered_properties().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(schema.properties["zeta"].ty, Some(SchemaType::Integer));
    }

    #[test]
    fn add_required_is_a_set() {
        let mut schema = Schema::typed(SchemaType::Object);
        schema.add_required("id");
        schema.add_required("id");
        assert_eq!(schema.required, vec!["id"]);
    }

    #[test]
    fn serializes_json_schema_keywords() {
        let mut schema = Schema::typed(SchemaType::String);
        schema.format = Some("date-time".into());
        schema.read_only = Some(true);
        schema.omit_doc = true;

        assert_eq!(
            schema.to_json(),
            json!({ "type": "string", "format": "date-time", "readOnly": true })
        );
    }

    #[test]
    fn deserialize_preserves_authored_property_order() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "zeta": { "type": "string" },
                "alpha": { "type": "integer", "default": 5 }
            },
            "additionalProperties": false
        }))
        .unwrap();

        assert_eq!(schema.property_order, vec!["zeta", "alpha"]);
        assert_eq!(schema.properties["alpha"].default.as_deref(), Some("5"));
        assert!(schema.additional_properties.is_none());
    }

    #[test]
    fn overlay_keeps_unset_attributes() {
        let mut base = Schema {
            title: Some("Kept".into()),
            description: Some("from doc".into()),
            ..Default::default()
        };
        base.overlay(Schema {
            ty: Some(SchemaType::Object),
            description: Some("from file".into()),
            ..Default::default()
        });

        assert_eq!(base.title.as_deref(), Some("Kept"));
        assert_eq!(base.description.as_deref(), Some("from file"));
        assert_eq!(base.ty, Some(SchemaType::Object));
    }

    #[test]
    fn documented_prunes_omitted_properties() {
        let mut hidden = Schema::typed(SchemaType::String);
        hidden.omit_doc = true;

        let mut schema = Schema::typed(SchemaType::Object);
        schema.insert_property("visible", Schema::typed(SchemaType::String));
        schema.insert_property("hidden", hidden);
        schema.add_required("hidden");

        let doc = schema.documented();
        assert!(doc.properties.contains_key("visible"));
        assert!(!doc.properties.contains_key("hidden"));
        assert!(doc.required.is_empty());

        // The source tree is untouched.
        assert!(schema.properties.contains_key("hidden"));
    }
}
