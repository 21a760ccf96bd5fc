//! Marker-annotation declarations and the export obligations they create.
//!
//! An external generator finds its inputs by looking for a marker annotation
//! (for example `@IncludeToFactory` on a static factory method). Here those
//! markers are plain data: Java sources are scraped into
//! [`MarkedDeclaration`] records, and consumers query them by tag instead of
//! reflecting over compiled classes.
//!
//! The scrape is heuristic. It tracks braces to know which type body a method
//! sits in and only records method and constructor declarations that carry
//! at least one annotation. Kotlin sources are not scanned.

use crate::boundary::ModuleBoundary;
use crate::descriptor::{ModuleName, PackageName, Visibility, is_skipped_dir};
use crate::package_tree::parse_package_statement;
use crate::validation::Violation;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TYPE_KEYWORDS: &[&str] = &["class", "interface", "enum", "record"];
const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "abstract",
    "final",
    "synchronized",
    "native",
    "default",
    "strictfp",
];

// An external generator only copies methods it can call from outside.
const FACTORY_REQUIRED: &[&str] = &["public", "static"];
const FACTORY_EXCLUDED: &[&str] = &["private", "protected", "abstract"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Method,
    Constructor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One annotated declaration found in source.
pub struct MarkedDeclaration {
    pub package: Option<PackageName>,
    /// Enclosing type, nested types joined with `.` (`Outer.Inner`).
    pub enclosing_type: String,
    pub name: String,
    pub kind: DeclarationKind,
    pub modifiers: BTreeSet<String>,
    /// Simple names of every annotation on the declaration.
    pub tags: Vec<String>,
    pub source: PathBuf,
    pub line: usize,
}

impl MarkedDeclaration {
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = simple_name(tag);
        self.tags.iter().any(|t| t == wanted)
    }

    /// `Type.member` label used in reports.
    pub fn qualified_member(&self) -> String {
        format!("{}.{}", self.enclosing_type, self.name)
    }

    fn is_factory_candidate(&self) -> bool {
        self.kind == DeclarationKind::Method
            && FACTORY_REQUIRED.iter().all(|m| self.modifiers.contains(*m))
            && !FACTORY_EXCLUDED.iter().any(|m| self.modifiers.contains(*m))
    }
}

/// Where the processor consuming a marker runs relative to the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorPlacement {
    /// Compiled into the same module; private packages are fine.
    SameModule,
    /// A separate consumer. When its module is known, restricted exports
    /// must name it.
    External { module: Option<ModuleName> },
}

#[derive(Debug, Clone, Default)]
/// Queryable set of annotated declarations.
pub struct DeclarationIndex {
    declarations: Vec<MarkedDeclaration>,
}

impl DeclarationIndex {
    pub fn new(declarations: Vec<MarkedDeclaration>) -> Self {
        Self { declarations }
    }

    /// Scrape every `.java` file under `roots`.
    pub fn scan(roots: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for root in roots {
            collect_java_files(root, &mut files)?;
        }
        files.sort();

        let mut declarations = Vec::new();
        for file in files {
            let contents = match fs::read_to_string(&file) {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(path = %file.display(), %err, "unreadable source file skipped");
                    continue;
                }
            };
            declarations.extend(scan_java_source(&contents, &file));
        }
        debug!(count = declarations.len(), "scanned annotated declarations");
        Ok(Self { declarations })
    }

    pub fn declarations(&self) -> &[MarkedDeclaration] {
        &self.declarations
    }

    /// All declarations carrying `tag` (simple or fully qualified name).
    pub fn find_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MarkedDeclaration> {
        self.declarations.iter().filter(move |decl| decl.has_tag(tag))
    }

    /// Tagged declarations an external factory generator would accept:
    /// public static methods that are not abstract.
    pub fn factory_candidates<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a MarkedDeclaration> {
        self.find_tagged(tag).filter(|decl| decl.is_factory_candidate())
    }

    /// Packages holding factory candidates for `tag`, with their members.
    pub fn packages_with(&self, tag: &str) -> BTreeMap<PackageName, Vec<String>> {
        let mut packages: BTreeMap<PackageName, Vec<String>> = BTreeMap::new();
        for decl in self.factory_candidates(tag) {
            if let Some(package) = &decl.package {
                packages
                    .entry(package.clone())
                    .or_default()
                    .push(decl.qualified_member());
            }
        }
        packages
    }
}

/// Shorthand for scanning and filtering by one marker.
pub fn scan_marked_declarations(roots: &[PathBuf], marker: &str) -> Result<Vec<MarkedDeclaration>> {
    let index = DeclarationIndex::scan(roots)?;
    Ok(index.find_tagged(marker).cloned().collect())
}

/// Packages the boundary must export so an external processor can read the
/// marked declarations.
pub fn export_obligations(
    index: &DeclarationIndex,
    marker: &str,
    boundary: &ModuleBoundary,
    placement: &ProcessorPlacement,
) -> Vec<Violation> {
    let ProcessorPlacement::External { module } = placement else {
        return Vec::new();
    };
    index
        .packages_with(marker)
        .into_iter()
        .filter(|(package, _)| match boundary.export_for(package) {
            None => true,
            Some(export) => match (&export.visibility, module) {
                (Visibility::Public, _) => false,
                (Visibility::RestrictedTo(_), None) => false,
                (Visibility::RestrictedTo(targets), Some(processor)) => {
                    !targets.contains(processor)
                }
            },
        })
        .map(|(package, declarations)| Violation::MarkerPackageNotExported {
            package,
            marker: simple_name(marker).to_string(),
            declarations,
        })
        .collect()
}

fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn collect_java_files(dir: &Path, acc: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if !is_skipped_dir(&path) {
                collect_java_files(&path, acc)?;
            }
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("java") {
            acc.push(path);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Word(String),
    Sym(char),
}

/// Split Java source into words and symbols, dropping comments and literals.
fn lex_java(source: &str) -> Vec<(Tok, usize)> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i += 2;
            }
            '"' if chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"') => {
                i += 3;
                while i < chars.len()
                    && !(chars[i] == '"'
                        && chars.get(i + 1) == Some(&'"')
                        && chars.get(i + 2) == Some(&'"'))
                {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i += 3;
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                while i < chars.len() && chars[i] != quote && chars[i] != '\n' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                tokens.push((Tok::Word(chars[start..i].iter().collect()), line));
            }
            _ => {
                tokens.push((Tok::Sym(c), line));
                i += 1;
            }
        }
    }
    tokens
}

/// A type whose body is currently open.
struct OpenType {
    name: String,
    /// Brace depth of the body.
    body: usize,
    /// Interfaces and annotation types.
    interface: bool,
}

#[derive(Default)]
struct PendingDecl {
    annotations: Vec<String>,
    modifiers: BTreeSet<String>,
    last_word: Option<(String, usize)>,
    saw_assign: bool,
}

/// Annotated method and constructor declarations in one Java file.
pub(crate) fn scan_java_source(source: &str, path: &Path) -> Vec<MarkedDeclaration> {
    let package = parse_package_statement(source);
    let tokens = lex_java(source);
    let mut found = Vec::new();

    let mut depth = 0usize;
    let mut types: Vec<OpenType> = Vec::new();
    let mut pending_type: Option<(String, bool)> = None;
    let mut pending = PendingDecl::default();

    let mut i = 0;
    while i < tokens.len() {
        let (tok, line) = &tokens[i];
        match tok {
            Tok::Sym('@') => {
                if let Some((Tok::Word(word), _)) = tokens.get(i + 1) {
                    if word == "interface" {
                        // `@interface Name` declares an annotation type.
                        if let Some((Tok::Word(name), _)) = tokens.get(i + 2) {
                            pending_type = Some((name.clone(), true));
                        }
                        pending = PendingDecl::default();
                        i += 3;
                        continue;
                    }
                    // Qualified annotation names: take the last segment.
                    let mut simple = word.clone();
                    i += 2;
                    while let (Some((Tok::Sym('.'), _)), Some((Tok::Word(next), _))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        simple = next.clone();
                        i += 2;
                    }
                    pending.annotations.push(simple);
                    if let Some((Tok::Sym('('), _)) = tokens.get(i) {
                        i = skip_parens(&tokens, i);
                    }
                    continue;
                }
            }
            Tok::Word(word) => {
                let after_dot = i > 0 && tokens[i - 1].0 == Tok::Sym('.');
                // `record` is contextual: only a following name makes it a type.
                let declared = match tokens.get(i + 1) {
                    Some((Tok::Word(name), _))
                        if !after_dot && TYPE_KEYWORDS.contains(&word.as_str()) =>
                    {
                        Some(name.clone())
                    }
                    _ => None,
                };
                if let Some(name) = declared {
                    pending_type = Some((name, word == "interface"));
                    pending = PendingDecl::default();
                    i += 2;
                    continue;
                }
                if MODIFIERS.contains(&word.as_str()) {
                    pending.modifiers.insert(word.clone());
                } else {
                    pending.last_word = Some((word.clone(), *line));
                }
            }
            Tok::Sym('(') => {
                let in_type_body = types.last().is_some_and(|ty| ty.body == depth);
                if pending_type.is_none() && in_type_body && !pending.saw_assign {
                    if let Some((name, name_line)) = pending.last_word.take() {
                        if !pending.annotations.is_empty() {
                            let enclosing = types
                                .iter()
                                .map(|ty| ty.name.as_str())
                                .collect::<Vec<_>>()
                                .join(".");
                            let kind = if types.last().is_some_and(|ty| ty.name == name) {
                                DeclarationKind::Constructor
                            } else {
                                DeclarationKind::Method
                            };
                            let mut modifiers = std::mem::take(&mut pending.modifiers);
                            // Interface members are implicitly public unless private.
                            if types.last().is_some_and(|ty| ty.interface)
                                && !modifiers.contains("private")
                            {
                                modifiers.insert("public".to_string());
                            }
                            found.push(MarkedDeclaration {
                                package: package.clone(),
                                enclosing_type: enclosing,
                                name,
                                kind,
                                modifiers,
                                tags: std::mem::take(&mut pending.annotations),
                                source: path.to_path_buf(),
                                line: name_line,
                            });
                        }
                        pending = PendingDecl::default();
                        i = skip_parens(&tokens, i);
                        continue;
                    }
                }
            }
            Tok::Sym('=') => pending.saw_assign = true,
            Tok::Sym('{') => {
                depth += 1;
                if let Some((name, interface)) = pending_type.take() {
                    types.push(OpenType {
                        name,
                        body: depth,
                        interface,
                    });
                }
                pending = PendingDecl::default();
            }
            Tok::Sym('}') => {
                if types.last().is_some_and(|ty| ty.body == depth) {
                    types.pop();
                }
                depth = depth.saturating_sub(1);
                pending = PendingDecl::default();
            }
            Tok::Sym(';') => pending = PendingDecl::default(),
            _ => {}
        }
        i += 1;
    }
    found
}

/// Index just past the `)` matching the `(` at `open`.
fn skip_parens(tokens: &[(Tok, usize)], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < tokens.len() {
        match tokens[i].0 {
            Tok::Sym('(') => depth += 1,
            Tok::Sym(')') => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    tokens.len()
}
