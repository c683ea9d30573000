//! Code completion for the script editor

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

use quarry_script::lexer::{is_ident_continue, tokenize, TokenKind};
use quarry_script::{parser, Program, ReferenceSurface, KEYWORDS};

/// Upper bound on items returned for one request
pub const MAX_COMPLETIONS: usize = 50;

/// What a completion item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionKind {
    Keyword,
    Module,
    Function,
    Method,
    Property,
    Variable,
    Snippet,
}

/// A single completion suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    /// Text shown in the list
    pub display_text: String,

    /// Text inserted in place of the typed prefix
    pub insert_text: String,

    pub kind: CompletionKind,

    pub description: String,
}

impl CompletionItem {
    fn new(
        display_text: impl Into<String>,
        insert_text: impl Into<String>,
        kind: CompletionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            display_text: display_text.into(),
            insert_text: insert_text.into(),
            kind,
            description: description.into(),
        }
    }
}

/// Suggestions for the cursor at byte `offset` in `source`
///
/// Never fails: anything unexpected yields an empty list.
pub fn complete(
    surface: &ReferenceSurface,
    source: &str,
    offset: usize,
    limit: usize,
) -> Vec<CompletionItem> {
    let limit = limit.min(MAX_COMPLETIONS);
    match panic::catch_unwind(AssertUnwindSafe(|| {
        CompletionContext::new(surface, source, offset).items(limit)
    })) {
        Ok(items) => items,
        Err(_) => {
            debug!(offset, "Completion failed, returning no items");
            Vec::new()
        }
    }
}

/// Largest char boundary not after `offset`
fn clamp_offset(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Start of the identifier ending at `end`
fn identifier_start(text: &str, end: usize) -> usize {
    text[..end]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_continue(*c))
        .last()
        .map_or(end, |(index, _)| index)
}

enum FrameKind {
    Block,
    Function,
    Connector(String),
}

struct Frame {
    kind: FrameKind,
    names: Vec<String>,
}

/// Declarations visible at the cursor, recovered from the tokens before it
#[derive(Default)]
struct Scope {
    frames: Vec<Frame>,
    constants: Vec<String>,
    imports: Vec<String>,
}

impl Scope {
    fn scan(text: &str) -> Self {
        let (tokens, _) = tokenize(text);
        let mut scope = Scope::default();
        let mut pending_names = Vec::new();
        let mut pending_kind = None;

        let ident_at = |index: usize| match tokens.get(index).map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => Some(name.clone()),
            _ => None,
        };

        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i].kind {
                TokenKind::Use => {
                    if let Some(name) = ident_at(i + 1) {
                        scope.imports.push(name);
                    }
                }
                TokenKind::Const => {
                    if let Some(name) = ident_at(i + 1) {
                        scope.constants.push(name);
                    }
                }
                TokenKind::Let => {
                    if let (Some(name), Some(frame)) = (ident_at(i + 1), scope.frames.last_mut()) {
                        frame.names.push(name);
                    }
                }
                TokenKind::For => {
                    if let Some(name) = ident_at(i + 1) {
                        pending_names.push(name);
                    }
                }
                TokenKind::Connector => {
                    if let Some(name) = ident_at(i + 1) {
                        pending_kind = Some(FrameKind::Connector(name));
                    }
                }
                TokenKind::Fn => {
                    pending_kind = Some(FrameKind::Function);
                    let mut j = i + 2;
                    if matches!(tokens.get(j).map(|t| &t.kind), Some(TokenKind::LParen)) {
                        j += 1;
                        while let Some(token) = tokens.get(j) {
                            match &token.kind {
                                TokenKind::Ident(name) => pending_names.push(name.clone()),
                                TokenKind::Comma => {}
                                _ => break,
                            }
                            j += 1;
                        }
                        i = j;
                        continue;
                    }
                }
                TokenKind::LBrace => scope.frames.push(Frame {
                    kind: pending_kind.take().unwrap_or(FrameKind::Block),
                    names: std::mem::take(&mut pending_names),
                }),
                TokenKind::RBrace => {
                    scope.frames.pop();
                }
                _ => {}
            }
            i += 1;
        }
        scope
    }

    /// Innermost enclosing connector declaration
    fn connector(&self) -> Option<&str> {
        self.frames.iter().rev().find_map(|f| match &f.kind {
            FrameKind::Connector(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Whether the cursor sits directly in a connector body, outside any method
    fn in_connector_body(&self) -> bool {
        matches!(self.frames.last().map(|f| &f.kind), Some(FrameKind::Connector(_)))
    }

    fn in_function(&self) -> bool {
        self.frames
            .iter()
            .any(|f| matches!(f.kind, FrameKind::Function))
    }

    /// Local names, innermost first
    fn locals(&self) -> impl Iterator<Item = &String> {
        self.frames.iter().rev().flat_map(|f| f.names.iter().rev())
    }
}

/// State for one completion request
struct CompletionContext<'a> {
    surface: &'a ReferenceSurface,
    program: Program,
    scope: Scope,
    prefix: &'a str,

    /// Identifier before a `.` preceding the prefix
    target: Option<&'a str>,
}

impl<'a> CompletionContext<'a> {
    fn new(surface: &'a ReferenceSurface, source: &'a str, offset: usize) -> Self {
        let offset = clamp_offset(source, offset);
        let prefix_start = identifier_start(source, offset);
        let target = source[..prefix_start]
            .strip_suffix('.')
            .map(|before| &before[identifier_start(before, before.len())..])
            .filter(|name| !name.is_empty());
        let (program, _) = parser::parse(source);

        Self {
            surface,
            program,
            scope: Scope::scan(&source[..prefix_start]),
            prefix: &source[prefix_start..offset],
            target,
        }
    }

    fn items(&self, limit: usize) -> Vec<CompletionItem> {
        let candidates = match self.target {
            Some("self") => self.self_members(),
            Some(module) => self.module_functions(module),
            None => self.general(),
        };

        let prefix = self.prefix.to_lowercase();
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|item| filter_text(item).to_lowercase().starts_with(&prefix))
            .filter(|item| seen.insert((item.display_text.clone(), item.kind)))
            .take(limit)
            .collect()
    }

    fn module_functions(&self, name: &str) -> Vec<CompletionItem> {
        if self.scope.locals().any(|local| local == name) {
            return Vec::new();
        }
        self.surface
            .module(name)
            .map(|module| {
                module
                    .functions
                    .iter()
                    .map(|f| {
                        CompletionItem::new(f.signature, f.name, CompletionKind::Function, f.description)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn self_members(&self) -> Vec<CompletionItem> {
        let mut items = Vec::new();
        if let Some(decl) = self.scope.connector().and_then(|name| self.program.connector(name)) {
            for connector in self.program.connector_chain(decl) {
                for property in connector.properties() {
                    items.push(CompletionItem::new(
                        property.name.name.as_str(),
                        property.name.name.as_str(),
                        CompletionKind::Property,
                        format!("Property of {}", connector.name.name),
                    ));
                }
                for method in connector.methods() {
                    items.push(method_item(
                        &method.name.name,
                        method.params.iter().map(|p| p.name.as_str()),
                        format!("Method of {}", connector.name.name),
                    ));
                }
            }
        }

        let contract = self.surface.contract();
        for property in contract
            .required_properties
            .iter()
            .chain(&contract.optional_properties)
        {
            items.push(CompletionItem::new(
                *property,
                *property,
                CompletionKind::Property,
                "Connector property",
            ));
        }
        for method in &contract.methods {
            items.push(method_item(method.name, method.params.iter().copied(), method.description));
        }
        items
    }

    fn general(&self) -> Vec<CompletionItem> {
        let mut items = Vec::new();

        if self.scope.in_connector_body() {
            items.extend(self.contract_snippets());
        }

        if self.scope.in_function() {
            for local in self.scope.locals() {
                items.push(CompletionItem::new(
                    local.as_str(),
                    local.as_str(),
                    CompletionKind::Variable,
                    "Local variable",
                ));
            }
        }

        let constants = self
            .program
            .constants()
            .map(|c| c.name.name.as_str())
            .chain(self.scope.constants.iter().map(String::as_str));
        for constant in constants {
            items.push(CompletionItem::new(constant, constant, CompletionKind::Variable, "Constant"));
        }

        for function in self.program.functions() {
            let mut item = method_item(
                &function.name.name,
                function.params.iter().map(|p| p.name.as_str()),
                "Script function",
            );
            item.kind = CompletionKind::Function;
            items.push(item);
        }

        if let Some(core) = self.surface.module(ReferenceSurface::CORE) {
            for function in &core.functions {
                items.push(CompletionItem::new(
                    function.signature,
                    function.name,
                    CompletionKind::Function,
                    function.description,
                ));
            }
        }

        let imports = self
            .program
            .uses()
            .map(|u| u.module.name.as_str())
            .chain(self.scope.imports.iter().map(String::as_str));
        for import in imports {
            if let Some(module) = self.surface.module(import) {
                items.push(CompletionItem::new(
                    module.name,
                    module.name,
                    CompletionKind::Module,
                    module.description,
                ));
            }
        }

        for keyword in KEYWORDS {
            items.push(CompletionItem::new(*keyword, *keyword, CompletionKind::Keyword, "Keyword"));
        }
        items
    }

    /// Skeletons for contract methods the enclosing connector has not declared yet
    fn contract_snippets(&self) -> Vec<CompletionItem> {
        let declared = self
            .scope
            .connector()
            .and_then(|name| self.program.connector(name));
        self.surface
            .contract()
            .methods
            .iter()
            .filter(|m| declared.map_or(true, |c| self.program.find_method(c, m.name).is_none()))
            .map(|m| {
                let header = format!("fn {}({})", m.name, m.params.join(", "));
                CompletionItem::new(
                    header.clone(),
                    format!("{} {{\n    \n}}", header),
                    CompletionKind::Snippet,
                    m.description,
                )
            })
            .collect()
    }
}

/// Text the typed prefix is matched against
fn filter_text(item: &CompletionItem) -> &str {
    match item.kind {
        CompletionKind::Snippet => item.display_text.trim_start_matches("fn "),
        _ => &item.insert_text,
    }
}

fn method_item<'p>(
    name: &str,
    params: impl Iterator<Item = &'p str>,
    description: impl Into<String>,
) -> CompletionItem {
    let params: Vec<&str> = params.collect();
    CompletionItem::new(
        format!("{}({})", name, params.join(", ")),
        name,
        CompletionKind::Method,
        description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::surface::reference_surface;

    fn names(source: &str, offset: usize) -> Vec<String> {
        complete(&reference_surface(), source, offset, MAX_COMPLETIONS)
            .into_iter()
            .map(|item| item.insert_text)
            .collect()
    }

    /// Completions at the `|` marker
    fn at_marker(source: &str) -> Vec<String> {
        let offset = source.find('|').unwrap();
        names(&source.replacen('|', "", 1), offset)
    }

    #[test]
    fn test_module_functions_after_dot() {
        let items = at_marker("use json;\nfn f() { return json.p| }");
        assert_eq!(items, vec!["parse", "pretty"]);
    }

    #[test]
    fn test_self_members() {
        let items = at_marker(
            "connector A {\n id = \"a\";\n name = \"A\";\n hits = 0;\n fn search(query, max_results) { return self.h| }\n}",
        );
        assert_eq!(items, vec!["hits"]);
    }

    #[test]
    fn test_locals_and_params_in_scope() {
        let items = at_marker("fn f(total) {\n let tally = 1;\n return t| }");
        assert_eq!(items[0], "tally");
        assert_eq!(items[1], "total");
        assert!(items.contains(&"to_string".to_string()));
        assert!(items.contains(&"true".to_string()));
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        let items = at_marker("const LIMIT = 3;\nfn f() { return li| }");
        assert_eq!(items[0], "LIMIT");
    }

    #[test]
    fn test_contract_snippets_in_connector_body() {
        let surface = reference_surface();
        let source = "connector A {\n fn search(query, max_results) { return []; }\n dis\n}";
        let offset = source.find("dis").unwrap() + 3;
        let items = complete(&surface, source, offset, MAX_COMPLETIONS);
        assert_eq!(items[0].kind, CompletionKind::Snippet);
        assert_eq!(items[0].display_text, "fn dispose()");
        assert!(items.iter().all(|i| i.display_text != "fn search(query, max_results)"));
    }

    #[test]
    fn test_offsets_are_clamped() {
        assert!(!names("fn f() {}", 1000).is_empty());
        let items = names("fn é() {}", 4);
        assert!(items.len() <= MAX_COMPLETIONS);
    }

    #[test]
    fn test_limit_is_capped() {
        let surface = reference_surface();
        assert!(complete(&surface, "", 0, 500).len() <= MAX_COMPLETIONS);
        assert_eq!(complete(&surface, "", 0, 5).len(), 5);
    }

    #[test]
    fn test_unknown_target_yields_nothing() {
        assert!(at_marker("fn f() { return nothing.| }").is_empty());
    }
}
