//! Declaration lookup across files and packages.
//!
//! The symbol table is built once from a [`DeclarationSet`] before
//! resolution starts, so lookups never re-read sources mid-run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::decl::{DeclarationSet, Package, SourceFile, TypeDecl, TypeExpr};
use crate::error::ResolveError;
use crate::mapper::{self, Mapped};
use crate::types::ResolveOptions;

/// The file (and its package) a type expression appears in.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub package: &'a Package,
    pub file: &'a SourceFile,
}

impl<'a> Scope<'a> {
    pub fn package_name(&self) -> &'a str {
        self.package.name()
    }
}

/// A type declaration together with the scope it was declared in.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub scope: Scope<'a>,
    pub decl: &'a TypeDecl,
    /// Package part of the registry key: the package name, or the import
    /// path when several loaded packages share that name.
    qualifier: &'a str,
}

impl<'a> Located<'a> {
    /// Registry key: `<package>.<TypeName>`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.qualifier, self.decl.name)
    }
}

/// What a named type ultimately stands for once aliases are unwrapped.
#[derive(Debug, Clone)]
pub enum Canonical<'a> {
    /// A configured or predeclared primitive.
    Mapped(Mapped),
    /// A named struct; always referenced, never inlined.
    Struct(Located<'a>),
    /// A named interface, kept as a documentation placeholder.
    Interface(Located<'a>),
    /// Any other shape (array, map, anonymous struct, ...), to be resolved
    /// in the scope it was declared in.
    Other(Scope<'a>, &'a TypeExpr),
}

/// Package path -> name -> declaration.
#[derive(Debug)]
pub struct SymbolTable<'a> {
    packages: HashMap<&'a str, &'a Package>,
    by_name: HashMap<&'a str, Vec<&'a Package>>,
    types: HashMap<(&'a str, &'a str), Located<'a>>,
    order: Vec<Located<'a>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(set: &'a DeclarationSet) -> Self {
        let mut table = SymbolTable {
            packages: HashMap::new(),
            by_name: HashMap::new(),
            types: HashMap::new(),
            order: Vec::new(),
        };

        for package in &set.packages {
            if table.packages.insert(&package.path, package).is_some() {
                warn!(package = %package.path, "package listed twice; later entry wins");
            }
            let named = table.by_name.entry(package.name()).or_default();
            if !named.iter().any(|p| p.path == package.path) {
                named.push(package);
            }
        }

        for package in &set.packages {
            let shared = table
                .by_name
                .get(package.name())
                .is_some_and(|pkgs| pkgs.len() > 1);
            let qualifier = if shared {
                debug!(package = %package.path, "package name is shared; keying by import path");
                package.path.as_str()
            } else {
                package.name()
            };

            for file in &package.files {
                let scope = Scope { package, file };
                for decl in &file.types {
                    let located = Located {
                        scope,
                        decl,
                        qualifier,
                    };
                    let key = (package.path.as_str(), decl.name.as_str());
                    if table.types.contains_key(&key) {
                        warn!(
                            package = %package.path,
                            name = %decl.name,
                            file = %file.path,
                            "duplicate declaration ignored"
                        );
                        continue;
                    }
                    table.types.insert(key, located);
                    table.order.push(located);
                }
            }
        }

        debug!(
            packages = table.packages.len(),
            types = table.types.len(),
            "symbol table built"
        );
        table
    }

    /// Every declaration, in document order.
    pub fn declarations(&self) -> impl Iterator<Item = Located<'a>> + '_ {
        self.order.iter().copied()
    }

    /// Find the package a selector refers to from `scope`.
    ///
    /// The file's imports are consulted first, then any loaded package
    /// whose name matches the selector.
    fn import(&self, scope: Scope<'a>, selector: &str) -> Option<&'a Package> {
        if let Some(path) = scope.file.imports.get(selector) {
            return self.packages.get(path.as_str()).copied();
        }
        let candidates = self.by_name.get(selector)?;
        if candidates.len() > 1 {
            debug!(selector, "ambiguous package name; using the first match");
        }
        candidates.first().copied()
    }

    /// Resolve `[qualifier.]name` as seen from `scope`.
    pub fn find_type(
        &self,
        scope: Scope<'a>,
        qualifier: Option<&str>,
        name: &str,
    ) -> Result<Located<'a>, ResolveError> {
        let unresolved = || ResolveError::UnresolvedType {
            ident: match qualifier {
                Some(q) => format!("{q}.{name}"),
                None => name.to_string(),
            },
            package: scope.package.path.clone(),
        };

        let package = match qualifier {
            None => scope.package,
            Some(q) => self.import(scope, q).ok_or_else(unresolved)?,
        };

        self.types
            .get(&(package.path.as_str(), name))
            .copied()
            .ok_or_else(unresolved)
    }

    /// Find a declaration by `<package>.<Name>`, where the package part is
    /// either an import path or a package name that only one loaded
    /// package uses.
    pub fn lookup(&self, key: &str) -> Result<Located<'a>, ResolveError> {
        let unresolved = || ResolveError::UnresolvedType {
            ident: key.to_string(),
            package: String::new(),
        };
        let (package, name) = key.rsplit_once('.').ok_or_else(unresolved)?;

        let package = match self.packages.get(package) {
            Some(pkg) => *pkg,
            // A shared package name does not identify a package.
            None => match self.by_name.get(package).map(Vec::as_slice) {
                Some([pkg]) => *pkg,
                _ => return Err(unresolved()),
            },
        };

        self.types
            .get(&(package.path.as_str(), name))
            .copied()
            .ok_or_else(unresolved)
    }

    /// Unwrap named aliases until reaching a primitive, a named struct or
    /// interface, or some other type shape.
    pub fn canonical<'q>(
        &self,
        options: &ResolveOptions,
        scope: Scope<'a>,
        qualifier: Option<&'q str>,
        name: &'q str,
    ) -> Result<Canonical<'a>, ResolveError>
    where
        'a: 'q,
    {
        let mut scope = scope;
        let mut qualifier = qualifier;
        let mut name = name;
        let mut seen = HashSet::new();

        loop {
            if let Some(mapped) = mapper::map_type(options, scope.package_name(), qualifier, name)
            {
                return Ok(Canonical::Mapped(mapped));
            }

            let located = self.find_type(scope, qualifier, name)?;
            let key = located.key();
            if !seen.insert(key.clone()) {
                return Err(ResolveError::UnsupportedTypeShape {
                    ident: key,
                    shape: "invalid recursive type alias".to_string(),
                });
            }

            match located.decl.ty.without_pointers() {
                TypeExpr::Struct(_) => return Ok(Canonical::Struct(located)),
                TypeExpr::Interface => return Ok(Canonical::Interface(located)),
                TypeExpr::Ident(next) => {
                    scope = located.scope;
                    qualifier = None;
                    name = next.as_str();
                }
                TypeExpr::Qualified {
                    package,
                    name: next,
                } => {
                    scope = located.scope;
                    qualifier = Some(package.as_str());
                    name = next.as_str();
                }
                other => return Ok(Canonical::Other(located.scope, other)),
            }
            debug!(from = %key, to = name, "unwrapping alias");
        }
    }
}
