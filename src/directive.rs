//! Inline `{directive[: value]}` annotations in documentation text.
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `{required}` | field name added to the parent's `required` |
//! | `{optional}` | explicit no-op |
//! | `{readonly}` | `readOnly: true` |
//! | `{omitdoc}` | hidden from rendered docs, still resolved |
//! | `{date-time}`, `{email}`, `{uri}`, ... | sets `format` |
//! | `{enum: a b c}` | `type: enum` with the listed values |
//! | `{default: v}` | sets `default` |
//! | `{range: min-max}` | sets `minimum` / `maximum` |
//! | `{schema: file.json}` | replaces the type with a hand-written schema |

use std::path::PathBuf;

use crate::error::ResolveError;
use crate::schema::{Schema, SchemaType};

/// A parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Required,
    Optional,
    ReadOnly,
    OmitDoc,
    Format(&'static str),
    Enum(Vec<String>),
    Default(String),
    Range { min: i64, max: i64 },
    Schema(PathBuf),
}

const BARE: &[&str] = &["required", "optional", "readonly", "omitdoc"];
const VALUED: &[&str] = &["enum", "default", "range", "schema"];

impl Directive {
    /// Parse one token (the text between the braces).
    ///
    /// `field` is only used for error messages.
    pub fn parse(field: &str, token: &str) -> Result<Directive, ResolveError> {
        let token = token.trim();
        let (name, value) = match token.split_once(':') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (token, None),
        };

        if name == "omitempty" {
            return Err(ResolveError::configuration(
                field,
                "omitempty is not implemented",
            ));
        }

        match (name, value) {
            ("required", None) => return Ok(Directive::Required),
            ("optional", None) => return Ok(Directive::Optional),
            ("readonly", None) => return Ok(Directive::ReadOnly),
            ("omitdoc", None) => return Ok(Directive::OmitDoc),
            ("enum", Some(v)) if !v.is_empty() => {
                return Ok(Directive::Enum(
                    v.split_whitespace().map(str::to_string).collect(),
                ))
            }
            ("default", Some(v)) => return Ok(Directive::Default(v.to_string())),
            ("range", Some(v)) => {
                let (min, max) = parse_range(field, v)?;
                return Ok(Directive::Range { min, max });
            }
            ("schema", Some(v)) if !v.is_empty() => return Ok(Directive::Schema(PathBuf::from(v))),
            _ => {}
        }

        if let Some(format) = canonical_format(name) {
            return match value {
                None => Ok(Directive::Format(format)),
                Some(_) => Err(ResolveError::configuration(
                    field,
                    format!("{name} takes no value"),
                )),
            };
        }
        if BARE.contains(&name) {
            return Err(ResolveError::configuration(
                field,
                format!("{name} takes no value"),
            ));
        }
        if VALUED.contains(&name) {
            return Err(ResolveError::configuration(
                field,
                format!("{name} requires a value"),
            ));
        }

        Err(ResolveError::UnknownDirective {
            field: field.to_string(),
            directive: token.to_string(),
        })
    }

    /// Apply this directive to `schema`.
    ///
    /// `Schema` overrides are handled by the resolver and ignored here.
    pub fn apply(&self, field: &str, schema: &mut Schema) {
        match self {
            Directive::Required => schema.add_required(field),
            Directive::Optional => {}
            Directive::ReadOnly => schema.read_only = Some(true),
            Directive::OmitDoc => schema.omit_doc = true,
            Directive::Format(format) => schema.format = Some(format.to_string()),
            Directive::Enum(values) => {
                schema.ty = Some(SchemaType::Enum);
                schema.enum_values = values.clone();
            }
            Directive::Default(value) => schema.default = Some(value.clone()),
            Directive::Range { min, max } => {
                schema.minimum = Some(*min);
                schema.maximum = Some(*max);
            }
            Directive::Schema(_) => {}
        }
    }
}

/// Canonical format name for a format directive.
fn canonical_format(name: &str) -> Option<&'static str> {
    match name {
        "datetime" | "date-time" => Some("date-time"),
        "date" => Some("date"),
        "time" => Some("time"),
        "email" | "idn-email" => Some("idn-email"),
        "hostname" | "idn-hostname" => Some("idn-hostname"),
        "url" | "uri" => Some("uri"),
        _ => None,
    }
}

/// Parse `min-max`; either side may be empty and defaults to 0.
///
/// The separator is the first `-` after the leading character, so a
/// leading `-` is a sign: `-5-10` is (-5, 10) and a lone `-5` is a maximum.
fn parse_range(field: &str, value: &str) -> Result<(i64, i64), ResolveError> {
    let body = value.trim();
    let (min, max) = if body == "-" {
        ("", "")
    } else {
        match body.char_indices().skip(1).find(|&(_, c)| c == '-') {
            Some((i, _)) => (&body[..i], &body[i + 1..]),
            None if body.starts_with('-') => ("", body),
            None => {
                return Err(ResolveError::configuration(
                    field,
                    format!("invalid range {value:?}: must be \"min-max\""),
                ))
            }
        }
    };

    let endpoint = |s: &str, which: &str| -> Result<i64, ResolveError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(0);
        }
        s.parse::<i32>().map(i64::from).map_err(|e| {
            ResolveError::configuration(
                field,
                format!("could not parse range {which} {s:?}: {e}"),
            )
        })
    };

    Ok((endpoint(min, "minimum")?, endpoint(max, "maximum")?))
}

/// Split documentation into its description and raw directive tokens.
///
/// A `{...}` span is a directive when its text starts with an ASCII
/// letter; other braces (JSON examples and the like) stay in the text.
pub fn extract(doc: &str) -> (String, Vec<String>) {
    let mut description = String::with_capacity(doc.len());
    let mut tokens = Vec::new();
    let mut rest = doc;

    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let close = open + len;
        let inner = &rest[open + 1..close];

        if !inner.trim_start().starts_with(|c: char| c.is_ascii_alphabetic()) {
            description.push_str(&rest[..=close]);
            rest = &rest[close + 1..];
            continue;
        }

        description.push_str(&rest[..open]);
        tokens.push(inner.trim().to_string());
        rest = &rest[close + 1..];
        if description.ends_with(' ') && rest.starts_with(' ') {
            description.pop();
        }
    }
    description.push_str(rest);

    (description.trim().to_string(), tokens)
}

/// Extract and parse every directive in `doc`.
///
/// Returns the remaining description (`None` when empty) and the
/// directives in order of appearance.
pub fn parse_doc(field: &str, doc: &str) -> Result<(Option<String>, Vec<Directive>), ResolveError> {
    let (description, tokens) = extract(doc);
    let directives = tokens
        .iter()
        .map(|token| Directive::parse(field, token))
        .collect::<Result<Vec<_>, _>>()?;
    let description = Some(description).filter(|d| !d.is_empty());
    Ok((description, directives))
}

/// Apply directives in order; later ones overwrite earlier effects.
pub fn apply_all(field: &str, directives: &[Directive], schema: &mut Schema) {
    for directive in directives {
        directive.apply(field, schema);
    }
}

/// The schema override path, if any directive names one. The last wins.
pub fn schema_override(directives: &[Directive]) -> Option<&PathBuf> {
    directives.iter().rev().find_map(|d| match d {
        Directive::Schema(path) => Some(path),
        _ => None,
    })
}
