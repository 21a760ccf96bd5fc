//! `module-info.java` reader and canonical writer.
//!
//! The parser accepts the module declaration grammar (requires, exports,
//! opens, uses, provides) plus comments, leading imports and annotations. It
//! does not reject duplicates; that is validation's job. A comment containing
//! `TODO` written between the previous directive and an `exports` directive
//! marks that export provisional.

use crate::descriptor::identity::{
    ModuleName, PackageName, ProvisionalNote, TypeName, Visibility, canonical_note,
};
use crate::descriptor::model::{
    ExportDecl, ModuleDescriptor, OpensDecl, Requirement, RequiresModifier, ServiceProvision,
};
use crate::error::{BoundaryError, DescriptorParseError};
use std::collections::BTreeSet;
use std::fmt::Write as _;

const PROVISIONAL_MARKER: &str = "TODO";
const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    /// Identifier, possibly dotted (`love.forte.codegentle.common`).
    Name(String),
    Symbol(char),
    Str,
    Comment(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, DescriptorParseError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            let (line, column) = (self.line, self.column);
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            let kind = if c == '/' {
                self.bump();
                match self.bump() {
                    Some('/') => {
                        let mut text = String::new();
                        while let Some(&next) = self.chars.peek() {
                            if next == '\n' {
                                break;
                            }
                            text.push(next);
                            self.bump();
                        }
                        TokenKind::Comment(text)
                    }
                    Some('*') => TokenKind::Comment(self.block_comment(line, column)?),
                    _ => {
                        return Err(DescriptorParseError::new(line, column, "unexpected '/'"));
                    }
                }
            } else if c == '"' {
                self.bump();
                self.string_literal(line, column)?;
                TokenKind::Str
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                let mut name = String::new();
                while let Some(&next) = self.chars.peek() {
                    if next.is_alphanumeric() || matches!(next, '_' | '$' | '.') {
                        name.push(next);
                        self.bump();
                    } else {
                        break;
                    }
                }
                TokenKind::Name(name)
            } else if matches!(c, '{' | '}' | ';' | ',' | '@' | '(' | ')' | '=' | '*') {
                self.bump();
                TokenKind::Symbol(c)
            } else {
                return Err(DescriptorParseError::new(
                    line,
                    column,
                    format!("unexpected character '{c}'"),
                ));
            };
            tokens.push(Token { kind, line, column });
        }
        Ok(tokens)
    }

    fn block_comment(
        &mut self,
        line: usize,
        column: usize,
    ) -> Result<String, DescriptorParseError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('*') if self.chars.peek() == Some(&'/') => {
                    self.bump();
                    return Ok(text);
                }
                Some(c) => text.push(c),
                None => {
                    return Err(DescriptorParseError::new(
                        line,
                        column,
                        "unterminated block comment",
                    ));
                }
            }
        }
    }

    fn string_literal(&mut self, line: usize, column: usize) -> Result<(), DescriptorParseError> {
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('"') => return Ok(()),
                Some('\n') | None => {
                    return Err(DescriptorParseError::new(
                        line,
                        column,
                        "unterminated string literal",
                    ));
                }
                Some(_) => {}
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    comments: Vec<String>,
    eof: (usize, usize),
}

impl Parser {
    /// Next non-comment token; comments seen on the way are buffered.
    fn next(&mut self) -> Option<Token> {
        while let Some(token) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            if let TokenKind::Comment(text) = token.kind {
                self.comments.push(text);
                continue;
            }
            return Some(token);
        }
        None
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens[self.pos..]
            .iter()
            .find(|token| !matches!(token.kind, TokenKind::Comment(_)))
    }

    fn error_at(&self, token: Option<&Token>, message: impl Into<String>) -> DescriptorParseError {
        let (line, column) = token
            .map(|t| (t.line, t.column))
            .unwrap_or(self.eof);
        DescriptorParseError::new(line, column, message)
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<Token, DescriptorParseError> {
        match self.next() {
            Some(token) if token.kind == TokenKind::Symbol(symbol) => Ok(token),
            other => Err(self.error_at(other.as_ref(), format!("expected '{symbol}'"))),
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<(String, Token), DescriptorParseError> {
        match self.next() {
            Some(token) => match &token.kind {
                TokenKind::Name(name) => Ok((name.clone(), token.clone())),
                _ => Err(self.error_at(Some(&token), format!("expected {what}"))),
            },
            None => Err(self.error_at(None, format!("expected {what}, found end of input"))),
        }
    }

    fn peek_is_name(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Name(name), .. }) if name == word)
    }

    fn peek_is_symbol(&self, symbol: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Symbol(c), .. }) if *c == symbol)
    }

    fn skip_annotation(&mut self) -> Result<(), DescriptorParseError> {
        self.expect_symbol('@')?;
        self.expect_name("annotation name")?;
        if !self.peek_is_symbol('(') {
            return Ok(());
        }
        let mut depth = 0usize;
        loop {
            let token = self.next();
            match token.as_ref().map(|t| &t.kind) {
                Some(TokenKind::Symbol('(')) => depth += 1,
                Some(TokenKind::Symbol(')')) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(self.error_at(None, "unterminated annotation arguments")),
            }
        }
    }

    fn skip_import(&mut self) -> Result<(), DescriptorParseError> {
        self.next();
        loop {
            match self.next() {
                Some(token) if token.kind == TokenKind::Symbol(';') => return Ok(()),
                Some(_) => {}
                None => return Err(self.error_at(None, "unterminated import declaration")),
            }
        }
    }

    fn parse(mut self) -> Result<ModuleDescriptor, DescriptorParseError> {
        loop {
            if self.peek_is_symbol('@') {
                self.skip_annotation()?;
            } else if self.peek_is_name("import") {
                self.skip_import()?;
            } else {
                break;
            }
        }

        let open = if self.peek_is_name("open") {
            self.next();
            true
        } else {
            false
        };

        let (keyword, token) = self.expect_name("'module'")?;
        if keyword != "module" {
            return Err(
                self.error_at(Some(&token), format!("expected 'module', found '{keyword}'"))
            );
        }
        let name = self.module_name()?;
        self.expect_symbol('{')?;

        let mut descriptor = ModuleDescriptor::new(name);
        descriptor.open = open;
        self.comments.clear();

        loop {
            let Some(token) = self.next() else {
                return Err(self.error_at(None, "missing closing '}'"));
            };
            let directive = match &token.kind {
                TokenKind::Symbol('}') => break,
                TokenKind::Name(word) => word.clone(),
                _ => return Err(self.error_at(Some(&token), "expected a module directive")),
            };
            let pending = std::mem::take(&mut self.comments);
            match directive.as_str() {
                "requires" => descriptor.requires.push(self.requires()?),
                "exports" => {
                    let (package, visibility) = self.package_directive()?;
                    descriptor.exports.push(ExportDecl {
                        package,
                        visibility,
                        provisional: provisional_note(&pending),
                    });
                }
                "opens" => {
                    let (package, visibility) = self.package_directive()?;
                    descriptor.opens.push(OpensDecl {
                        package,
                        visibility,
                    });
                }
                "uses" => {
                    descriptor.uses.push(self.type_name()?);
                    self.expect_symbol(';')?;
                }
                "provides" => descriptor.provides.push(self.provides()?),
                other => {
                    return Err(
                        self.error_at(Some(&token), format!("unknown module directive '{other}'"))
                    );
                }
            }
        }

        if let Some(token) = self.next() {
            return Err(self.error_at(Some(&token), "unexpected content after module declaration"));
        }
        Ok(descriptor)
    }

    fn requires(&mut self) -> Result<Requirement, DescriptorParseError> {
        let mut words = Vec::new();
        loop {
            let Some(token) = self.next() else {
                return Err(self.error_at(None, "unterminated requires directive"));
            };
            match &token.kind {
                TokenKind::Symbol(';') => break,
                TokenKind::Name(word) => words.push((word.clone(), token.clone())),
                _ => return Err(self.error_at(Some(&token), "expected module name")),
            }
        }
        let Some((module, module_token)) = words.pop() else {
            return Err(self.error_at(None, "requires directive without a module name"));
        };
        let mut modifiers = BTreeSet::new();
        for (word, token) in words {
            let modifier = match word.as_str() {
                "transitive" => RequiresModifier::Transitive,
                "static" => RequiresModifier::Static,
                other => {
                    return Err(self.error_at(
                        Some(&token),
                        format!("unknown requires modifier '{other}'"),
                    ));
                }
            };
            if !modifiers.insert(modifier) {
                return Err(self.error_at(Some(&token), format!("repeated modifier '{word}'")));
            }
        }
        let module = ModuleName::new(module).map_err(|err| name_error(&module_token, err))?;
        Ok(Requirement { module, modifiers })
    }

    fn package_directive(&mut self) -> Result<(PackageName, Visibility), DescriptorParseError> {
        let (raw, token) = self.expect_name("package name")?;
        let package = PackageName::new(raw).map_err(|err| name_error(&token, err))?;
        if self.peek_is_name("to") {
            self.next();
            let mut targets = BTreeSet::new();
            loop {
                targets.insert(self.module_name()?);
                if self.peek_is_symbol(',') {
                    self.next();
                    continue;
                }
                break;
            }
            self.expect_symbol(';')?;
            return Ok((package, Visibility::RestrictedTo(targets)));
        }
        self.expect_symbol(';')?;
        Ok((package, Visibility::Public))
    }

    fn provides(&mut self) -> Result<ServiceProvision, DescriptorParseError> {
        let service = self.type_name()?;
        let (with, token) = self.expect_name("'with'")?;
        if with != "with" {
            return Err(self.error_at(Some(&token), format!("expected 'with', found '{with}'")));
        }
        let mut implementations = vec![self.type_name()?];
        while self.peek_is_symbol(',') {
            self.next();
            implementations.push(self.type_name()?);
        }
        self.expect_symbol(';')?;
        Ok(ServiceProvision {
            service,
            implementations,
        })
    }

    fn module_name(&mut self) -> Result<ModuleName, DescriptorParseError> {
        let (raw, token) = self.expect_name("module name")?;
        ModuleName::new(raw).map_err(|err| name_error(&token, err))
    }

    fn type_name(&mut self) -> Result<TypeName, DescriptorParseError> {
        let (raw, token) = self.expect_name("type name")?;
        TypeName::new(raw).map_err(|err| name_error(&token, err))
    }
}

fn name_error(token: &Token, err: BoundaryError) -> DescriptorParseError {
    DescriptorParseError::new(token.line, token.column, err.to_string())
}

fn provisional_note(comments: &[String]) -> Option<ProvisionalNote> {
    comments.iter().find_map(|comment| {
        let rest = after_marker(comment)?;
        let text = rest
            .lines()
            .map(|line| line.trim().trim_start_matches('*'))
            .collect::<Vec<_>>()
            .join(" ");
        Some(ProvisionalNote::new(&text))
    })
}

/// Text following the first standalone `TODO` word (not `TODOS`, `MYTODO`).
fn after_marker(comment: &str) -> Option<&str> {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    comment.match_indices(PROVISIONAL_MARKER).find_map(|(start, _)| {
        let end = start + PROVISIONAL_MARKER.len();
        let before = comment[..start].chars().next_back();
        let after = comment[end..].chars().next();
        let standalone = !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char);
        standalone.then(|| &comment[end..])
    })
}

/// Parse the text of a `module-info.java` file.
pub fn parse_module_info(input: &str) -> Result<ModuleDescriptor, DescriptorParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let eof = tokens
        .last()
        .map(|token| (token.line, token.column))
        .unwrap_or((1, 1));
    Parser {
        tokens,
        pos: 0,
        comments: Vec::new(),
        eof,
    }
    .parse()
}

/// Render a descriptor in canonical `module-info.java` layout.
///
/// Declaration order is kept inside each directive group. Provisional exports
/// are preceded by a `// TODO` comment carrying their note so the output
/// parses back to the same descriptor.
pub fn render_module_info(descriptor: &ModuleDescriptor) -> String {
    let mut groups: Vec<Vec<String>> = Vec::new();

    groups.push(
        descriptor
            .requires
            .iter()
            .map(|req| {
                let mut line = String::from("requires ");
                for modifier in &req.modifiers {
                    line.push_str(modifier.as_str());
                    line.push(' ');
                }
                let _ = write!(line, "{};", req.module);
                line
            })
            .collect(),
    );

    let mut exports = Vec::new();
    for export in &descriptor.exports {
        if let Some(note) = &export.provisional {
            // The note must stay inside one line comment.
            let note = canonical_note(&note.0);
            if note.is_empty() {
                exports.push(format!("// {PROVISIONAL_MARKER}"));
            } else {
                exports.push(format!("// {PROVISIONAL_MARKER} {note}"));
            }
        }
        exports.push(format!(
            "exports {}{};",
            export.package,
            target_clause(&export.visibility)
        ));
    }
    groups.push(exports);

    groups.push(
        descriptor
            .opens
            .iter()
            .map(|opens| format!("opens {}{};", opens.package, target_clause(&opens.visibility)))
            .collect(),
    );
    groups.push(descriptor.uses.iter().map(|ty| format!("uses {ty};")).collect());
    groups.push(
        descriptor
            .provides
            .iter()
            .map(|provision| {
                let impls = provision
                    .implementations
                    .iter()
                    .map(TypeName::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("provides {} with {impls};", provision.service)
            })
            .collect(),
    );

    let mut out = String::new();
    if descriptor.open {
        out.push_str("open ");
    }
    let _ = writeln!(out, "module {} {{", descriptor.name);
    let mut first = true;
    for group in groups.into_iter().filter(|group| !group.is_empty()) {
        if !first {
            out.push('\n');
        }
        first = false;
        for line in group {
            let _ = writeln!(out, "{INDENT}{line}");
        }
    }
    out.push_str("}\n");
    out
}

fn target_clause(visibility: &Visibility) -> String {
    match visibility {
        Visibility::Public => String::new(),
        Visibility::RestrictedTo(targets) => {
            let names = targets
                .iter()
                .map(ModuleName::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            format!(" to {names}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODEGENTLE_COMMON: &str = r#"module love.forte.codegentle.common {
    requires java.compiler;
    requires kotlin.stdlib;

    exports love.forte.codegentle.common;
    exports love.forte.codegentle.common.code;
    // TODO exports .. to .. Only?
    exports love.forte.codegentle.common.codepoint;
    exports love.forte.codegentle.common.naming;
    exports love.forte.codegentle.common.ref;
    exports love.forte.codegentle.common.spec;
    exports love.forte.codegentle.common.utils;
    exports love.forte.codegentle.common.writer;
}
"#;

    #[test]
    fn parses_observed_descriptor() {
        let descriptor = parse_module_info(CODEGENTLE_COMMON).expect("parses");
        assert_eq!(descriptor.name.as_str(), "love.forte.codegentle.common");
        assert!(!descriptor.open);
        let requires: Vec<&str> = descriptor
            .requires
            .iter()
            .map(|req| req.module.as_str())
            .collect();
        assert_eq!(requires, ["java.compiler", "kotlin.stdlib"]);
        assert_eq!(descriptor.exports.len(), 8);

        let provisional: Vec<&ExportDecl> = descriptor.provisional_exports().collect();
        assert_eq!(provisional.len(), 1);
        assert_eq!(
            provisional[0].package.relative_to(&descriptor.name),
            "codepoint"
        );
        assert_eq!(
            provisional[0].provisional.as_ref().map(|n| n.0.as_str()),
            Some("exports .. to .. Only?")
        );
        assert!(descriptor.exports.iter().all(|e| e.visibility.is_public()));
    }

    #[test]
    fn render_then_parse_preserves_descriptor() {
        let descriptor = parse_module_info(CODEGENTLE_COMMON).unwrap();
        let rendered = render_module_info(&descriptor);
        let reparsed = parse_module_info(&rendered).unwrap();
        assert_eq!(reparsed, descriptor);
        assert_eq!(render_module_info(&reparsed), rendered);
    }

    #[test]
    fn parses_full_directive_grammar() {
        let input = r#"
import com.example.spi.Plugin;

/** Module docs. */
@Deprecated(since = "9", forRemoval = false)
open module com.example.app {
    requires transitive static com.example.base;
    exports com.example.app.api to com.example.web, com.example.cli;
    opens com.example.app.model;
    uses com.example.spi.Plugin;
    provides com.example.spi.Plugin with com.example.app.PluginA, com.example.app.PluginB;
}
"#;
        let descriptor = parse_module_info(input).expect("parses");
        assert!(descriptor.open);
        assert_eq!(
            descriptor.requires[0].modifiers,
            BTreeSet::from([RequiresModifier::Transitive, RequiresModifier::Static])
        );
        let targets: Vec<&str> = descriptor.exports[0]
            .visibility
            .targets()
            .map(ModuleName::as_str)
            .collect();
        assert_eq!(targets, ["com.example.cli", "com.example.web"]);
        assert_eq!(descriptor.opens.len(), 1);
        assert_eq!(descriptor.uses[0].as_str(), "com.example.spi.Plugin");
        assert_eq!(descriptor.provides[0].implementations.len(), 2);

        let reparsed = parse_module_info(&render_module_info(&descriptor)).unwrap();
        assert_eq!(reparsed, descriptor);
    }

    #[test]
    fn duplicates_survive_parsing() {
        let input = "module m { exports m.codepoint; exports m.codepoint; }";
        let descriptor = parse_module_info(input).unwrap();
        assert_eq!(descriptor.exports.len(), 2);
    }

    #[test]
    fn block_todo_comment_marks_export_provisional() {
        let input = "module m {\n  exports m.a;\n  /* TODO: restrict\n   * to the java module */\n  exports m.b;\n  exports m.c;\n}";
        let descriptor = parse_module_info(input).unwrap();
        assert!(descriptor.exports[0].stable());
        assert_eq!(
            descriptor.exports[1].provisional,
            Some(ProvisionalNote("restrict to the java module".into()))
        );
        assert!(descriptor.exports[2].stable());
    }

    #[test]
    fn todo_must_be_a_standalone_word() {
        let input = "module m {\n  // see TODOS.md\n  exports m.a;\n  // MYTODO list\n  exports m.b;\n  // TODO(forte): narrow\n  exports m.c;\n}";
        let descriptor = parse_module_info(input).unwrap();
        assert!(descriptor.exports[0].stable());
        assert!(descriptor.exports[1].stable());
        assert_eq!(
            descriptor.exports[2].provisional,
            Some(ProvisionalNote("(forte): narrow".into()))
        );
    }

    #[test]
    fn multiline_note_renders_as_one_comment() {
        let mut descriptor = ModuleDescriptor::new(ModuleName::new("m").unwrap());
        descriptor.exports.push(ExportDecl {
            package: PackageName::new("m.a").unwrap(),
            visibility: Visibility::Public,
            provisional: Some(ProvisionalNote("narrow later\nexports m.injected;".into())),
        });
        let rendered = render_module_info(&descriptor);
        assert_eq!(
            rendered,
            "module m {\n    // TODO narrow later exports m.injected;\n    exports m.a;\n}\n"
        );

        let reparsed = parse_module_info(&rendered).unwrap();
        let exports: Vec<&str> = reparsed.exported_packages().map(PackageName::as_str).collect();
        assert_eq!(exports, ["m.a"]);
        assert_eq!(
            reparsed.exports[0].provisional,
            Some(ProvisionalNote("narrow later exports m.injected;".into()))
        );
    }

    #[test]
    fn reports_position_of_errors() {
        let err = parse_module_info("module m {\n    exports m.a\n}").unwrap_err();
        assert_eq!((err.line, err.column), (3, 1));
        assert!(err.message.contains("';'"));

        let err = parse_module_info("module m {\n  permits m.a;\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("permits"));

        let err = parse_module_info("module m {\n  exports m.class;\n}").unwrap_err();
        assert!(err.message.contains("m.class"));

        let err = parse_module_info("module m {\n  exports m.a;\n").unwrap_err();
        assert!(err.message.contains("'}'"));
    }
}
