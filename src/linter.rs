//! Declaration linting - static checks over a declaration document.
//!
//! Reports, without stopping at the first problem:
//! - documents that fail to load or parse
//! - malformed or unknown `{directive}` tokens
//! - field types that cannot be located
//! - undocumented types

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::decl::{DeclarationSet, FieldDecl, TypeExpr};
use crate::directive::{self, Directive};
use crate::error::ResolveError;
use crate::loader::load_declarations;
use crate::locator::{Located, Scope, SymbolTable};
use crate::types::ResolveOptions;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Source file the declaration came from.
    pub file: PathBuf,
    /// Declaration path to the issue (e.g., "models.User/Address/Street")
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, file: &str, path: &str, message: String) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: code.to_string(),
            file: PathBuf::from(file),
            path: path.to_string(),
            message,
        }
    }

    fn warning(code: &str, file: &str, path: &str, message: String) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(code, file, path, message)
        }
    }
}

/// Result of linting a single type declaration.
#[derive(Debug, Clone, Serialize)]
pub struct TypeResult {
    #[serde(rename = "type")]
    pub key: String,
    pub file: PathBuf,
    pub status: LintStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintStatus {
    Ok,
    Error,
    Warning,
}

impl LintStatus {
    fn of(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            LintStatus::Error
        } else if diagnostics.is_empty() {
            LintStatus::Ok
        } else {
            LintStatus::Warning
        }
    }
}

/// Result of linting a declaration document.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub types_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<TypeResult>,
}

impl LintResult {
    /// Returns true if no declaration has errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    fn from_results(path: &Path, results: Vec<TypeResult>, strict: bool) -> Self {
        let count = |severity: Severity| {
            results
                .iter()
                .flat_map(|r| &r.diagnostics)
                .filter(|d| d.severity == severity)
                .count()
        };
        let errors = count(Severity::Error);
        let warnings = count(Severity::Warning);

        let failed = results
            .iter()
            .filter(|r| {
                if strict {
                    r.status != LintStatus::Ok
                } else {
                    r.status == LintStatus::Error
                }
            })
            .count();

        LintResult {
            path: path.to_path_buf(),
            types_checked: results.len(),
            passed: results.len() - failed,
            failed,
            errors,
            warnings,
            results,
        }
    }
}

/// Lint a declaration document file.
///
/// If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, options: &ResolveOptions, strict: bool) -> LintResult {
    let results = match load_declarations(path) {
        Ok(decls) => lint_declarations(&decls, options),
        Err(e) => {
            let file = path.display().to_string();
            let diagnostics = vec![Diagnostic::error(
                "E001",
                &file,
                "/",
                format!("cannot load declarations: {e}"),
            )];
            vec![TypeResult {
                key: String::new(),
                file: path.to_path_buf(),
                status: LintStatus::Error,
                diagnostics,
            }]
        }
    };

    LintResult::from_results(path, results, strict)
}

/// Lint every type declaration in a loaded document.
pub fn lint_declarations(decls: &DeclarationSet, options: &ResolveOptions) -> Vec<TypeResult> {
    let symbols = SymbolTable::new(decls);
    symbols
        .declarations()
        .map(|located| lint_type(&symbols, options, located))
        .collect()
}

fn lint_type<'a>(
    symbols: &SymbolTable<'a>,
    options: &ResolveOptions,
    located: Located<'a>,
) -> TypeResult {
    let key = located.key();
    let file = located.scope.file.path.as_str();
    let mut diagnostics = Vec::new();

    match directive::parse_doc(&located.decl.name, located.decl.doc.as_deref().unwrap_or("")) {
        Ok((info, directives)) => {
            if directives.contains(&Directive::Required) {
                diagnostics.push(Diagnostic::error(
                    "E002",
                    file,
                    &key,
                    "{required} applies to fields, not types".to_string(),
                ));
            }
            if info.is_none() {
                diagnostics.push(Diagnostic::warning(
                    "W001",
                    file,
                    &key,
                    "type has no documentation".to_string(),
                ));
            }
        }
        Err(e) => diagnostics.push(directive_error(file, &key, e)),
    }

    let checker = Checker {
        symbols,
        options,
        scope: located.scope,
        file,
    };
    match located.decl.ty.without_pointers() {
        TypeExpr::Struct(fields) => checker.fields(fields, &key, &mut diagnostics),
        other => checker.ty(other, &key, &mut diagnostics),
    }

    TypeResult {
        key,
        file: PathBuf::from(file),
        status: LintStatus::of(&diagnostics),
        diagnostics,
    }
}

fn directive_error(file: &str, path: &str, e: ResolveError) -> Diagnostic {
    Diagnostic::error("E002", file, path, e.to_string())
}

struct Checker<'s, 'a> {
    symbols: &'s SymbolTable<'a>,
    options: &'s ResolveOptions,
    scope: Scope<'a>,
    file: &'s str,
}

impl Checker<'_, '_> {
    fn fields(&self, fields: &[FieldDecl], path: &str, diagnostics: &mut Vec<Diagnostic>) {
        for field in fields {
            let field_path = format!("{}/{}", path, field.source_name());
            if let Err(e) = directive::parse_doc(field.source_name(), field.documentation()) {
                diagnostics.push(directive_error(self.file, &field_path, e));
            }
            self.ty(&field.ty, &field_path, diagnostics);
        }
    }

    fn ty(&self, ty: &TypeExpr, path: &str, diagnostics: &mut Vec<Diagnostic>) {
        match ty {
            TypeExpr::Pointer(inner) | TypeExpr::Array(inner) => self.ty(inner, path, diagnostics),
            TypeExpr::Map { key, value } => {
                self.ty(key, path, diagnostics);
                let before = diagnostics.len();
                self.ty(value, path, diagnostics);
                // An unknown map value only degrades the schema.
                for d in &mut diagnostics[before..] {
                    if d.code == "E003" {
                        d.severity = Severity::Warning;
                        d.code = "W002".to_string();
                    }
                }
            }
            TypeExpr::Ident(name) => self.named(None, name, path, diagnostics),
            TypeExpr::Qualified { package, name } => {
                self.named(Some(package.as_str()), name, path, diagnostics)
            }
            TypeExpr::Struct(fields) => self.fields(fields, path, diagnostics),
            TypeExpr::Interface | TypeExpr::Opaque(_) => {}
        }
    }

    fn named(&self, qualifier: Option<&str>, name: &str, path: &str, diagnostics: &mut Vec<Diagnostic>) {
        if let Err(e) = self.symbols.canonical(self.options, self.scope, qualifier, name) {
            diagnostics.push(Diagnostic::error("E003", self.file, path, e.to_string()));
        }
    }
}
