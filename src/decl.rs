//! Source declarations as handed over by the comment tokenizer.
//!
//! A declaration document lists packages, their files (with imports) and
//! the type declarations found in each file. Type expressions are written
//! in source syntax (`*pkg.User`, `[]string`, `map[string]Item`), except
//! anonymous structs, which are written as `{"struct": [fields]}` so their
//! fields can carry documentation and tags.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Every package visible to a resolution run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeclarationSet {
    #[serde(default)]
    pub packages: Vec<Package>,
}

/// One package (import path) and its source files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Package {
    /// Import path, e.g. `example.com/shop/models`.
    pub path: String,
    /// Package name; defaults to the last path segment.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

impl Package {
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.path.rsplit('/').next().unwrap_or(&self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceFile {
    pub path: String,
    /// Import alias to import path.
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

/// A named type declaration (`type User struct { ... }`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

/// A struct field. Fields without a name are embedded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDecl {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    /// Raw struct tag, without backquotes.
    #[serde(default)]
    pub tag: Option<String>,
    /// Comment block above the field.
    #[serde(default)]
    pub doc: Option<String>,
    /// Trailing line comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl FieldDecl {
    pub fn is_embedded(&self) -> bool {
        self.name.is_none()
    }

    /// Doc comment, falling back to the line comment.
    pub fn documentation(&self) -> &str {
        self.doc
            .as_deref()
            .or(self.comment.as_deref())
            .unwrap_or("")
            .trim()
    }

    /// Declared name; for embedded fields, the embedded type's name.
    pub fn source_name(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }
        match self.ty.without_pointers() {
            TypeExpr::Ident(name) | TypeExpr::Qualified { name, .. } => name,
            _ => "",
        }
    }
}

/// Shape of a type expression.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "TypeExprRepr")]
pub enum TypeExpr {
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `T`, either predeclared or declared in the current package.
    Ident(String),
    /// `pkg.T`
    Qualified { package: String, name: String },
    /// Anonymous `struct { ... }`.
    Struct(Vec<FieldDecl>),
    /// `interface { ... }` or `any`.
    Interface,
    /// `map[K]V`
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    /// `[]T` or `[N]T`
    Array(Box<TypeExpr>),
    /// Shapes without a schema representation (`chan T`, `func(...)`).
    Opaque(String),
}

impl TypeExpr {
    /// Strip any number of pointer indirections.
    pub fn without_pointers(&self) -> &TypeExpr {
        let mut ty = self;
        while let TypeExpr::Pointer(inner) = ty {
            ty = inner;
        }
        ty
    }

    /// Short shape name for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            TypeExpr::Pointer(_) => "pointer",
            TypeExpr::Ident(_) | TypeExpr::Qualified { .. } => "named type",
            TypeExpr::Struct(_) => "anonymous struct",
            TypeExpr::Interface => "interface",
            TypeExpr::Map { .. } => "map",
            TypeExpr::Array(_) => "array",
            TypeExpr::Opaque(_) => "opaque type",
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Ident(name) => f.write_str(name),
            TypeExpr::Qualified { package, name } => write!(f, "{package}.{name}"),
            TypeExpr::Struct(_) => f.write_str("struct{...}"),
            TypeExpr::Interface => f.write_str("interface{}"),
            TypeExpr::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeExpr::Array(elem) => write!(f, "[]{elem}"),
            TypeExpr::Opaque(src) => f.write_str(src),
        }
    }
}

impl FromStr for TypeExpr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { src: s, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(format!(
                "unexpected {:?} in type expression {s:?}",
                &s[parser.pos..]
            ));
        }
        Ok(ty)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TypeExprRepr {
    Source(String),
    Struct {
        #[serde(rename = "struct")]
        fields: Vec<FieldDecl>,
    },
}

impl TryFrom<TypeExprRepr> for TypeExpr {
    type Error = String;

    fn try_from(repr: TypeExprRepr) -> Result<Self, Self::Error> {
        match repr {
            TypeExprRepr::Source(src) => src.parse(),
            TypeExprRepr::Struct { fields } => Ok(TypeExpr::Struct(fields)),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), String> {
        if self.eat(s) {
            Ok(())
        } else {
            Err(format!("expected {s:?} in type expression {:?}", self.src))
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_alphabetic() || (i > 0 && c.is_numeric())))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    /// Consume a balanced `{ ... }` block.
    fn skip_braces(&mut self) -> Result<(), String> {
        self.expect("{")?;
        let mut depth = 1;
        for (i, c) in self.rest().char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += i + 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(format!("unbalanced braces in type expression {:?}", self.src))
    }

    /// Everything left is kept verbatim.
    fn opaque(&mut self, start: usize) -> TypeExpr {
        let src = self.src[start..].trim().to_string();
        self.pos = self.src.len();
        TypeExpr::Opaque(src)
    }

    fn parse_type(&mut self) -> Result<TypeExpr, String> {
        self.skip_ws();
        let start = self.pos;

        if self.eat("*") {
            return Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)));
        }
        if self.rest().starts_with("<-") {
            return Ok(self.opaque(start));
        }
        if self.eat("[") {
            // Array length (or `...`) carries no schema meaning.
            let len = self.rest().find(']').ok_or_else(|| {
                format!("unterminated array in type expression {:?}", self.src)
            })?;
            self.pos += len + 1;
            return Ok(TypeExpr::Array(Box::new(self.parse_type()?)));
        }

        let Some(ident) = self.ident() else {
            return Err(format!("expected a type in {:?}", self.src));
        };

        match ident {
            "map" if self.eat("[") => {
                let key = self.parse_type()?;
                self.expect("]")?;
                let value = self.parse_type()?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            "chan" | "func" => Ok(self.opaque(start)),
            "interface" => {
                self.skip_braces()?;
                Ok(TypeExpr::Interface)
            }
            "any" => Ok(TypeExpr::Interface),
            "struct" => {
                self.skip_ws();
                if self.eat("{") && self.eat("}") {
                    Ok(TypeExpr::Struct(Vec::new()))
                } else {
                    Err(format!(
                        "struct with fields in {:?}: use the {{\"struct\": [...]}} form",
                        self.src
                    ))
                }
            }
            _ => {
                if self.rest().starts_with('.') {
                    self.pos += 1;
                    let name = self.ident().ok_or_else(|| {
                        format!("expected a name after {ident:?}. in {:?}", self.src)
                    })?;
                    self.reject_type_params()?;
                    return Ok(TypeExpr::Qualified {
                        package: ident.to_string(),
                        name: name.to_string(),
                    });
                }
                self.reject_type_params()?;
                Ok(TypeExpr::Ident(ident.to_string()))
            }
        }
    }

    fn reject_type_params(&self) -> Result<(), String> {
        if self.rest().starts_with('[') {
            Err(format!("type parameters are not supported: {:?}", self.src))
        } else {
            Ok(())
        }
    }
}
