// Language parsers: tree-sitter source text -> symbol records

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::index::{Language, ParseIssue, ParseOutcome, SymbolKind, SymbolRecord};

/// Characters that never appear in a syntactically valid symbol name.
/// Guards against mis-captured expression noise.
static INVALID_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s(){}\[\]<>]").unwrap());

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !INVALID_NAME.is_match(name)
}

/// Contract every language parser satisfies: pure, no I/O, never fails the
/// whole file. Rejected candidates surface as `ParseIssue`s instead of
/// records.
pub trait SourceParser: Send + Sync {
    fn can_parse(&self, file_path: &str) -> bool;
    fn language(&self) -> Language;
    fn parse(&self, file_path: &str, source: &str) -> ParseOutcome;
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

fn opt_node_text(node: Option<Node>, source: &str) -> Option<String> {
    node.map(|n| node_text(n, source))
}

/// Depth-first collection of every node with one of the given kinds
fn collect_kinds<'t>(node: Node<'t>, kinds: &[&str], out: &mut Vec<Node<'t>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_kinds(child, kinds, out);
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_tree(&self, source: &str) -> Option<Tree> {
        let mut parser = TreeParser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .ok()?;
        parser.parse(source, None)
    }

    fn extract_imports(&self, root: Node, source: &str) -> Vec<String> {
        let mut nodes = Vec::new();
        collect_kinds(root, &["import_statement", "import_from_statement"], &mut nodes);
        nodes.into_iter().map(|n| node_text(n, source)).collect()
    }

    fn visit(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        imports: &[String],
        outcome: &mut ParseOutcome,
    ) {
        match node.kind() {
            "function_definition" => self.extract_function(node, file_path, source, imports, outcome),
            "class_definition" => self.extract_class(node, file_path, source, imports, outcome),
            "assignment" => {
                if self.is_module_scope_assignment(node) {
                    self.extract_global(node, file_path, source, imports, outcome);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, file_path, source, imports, outcome);
        }
    }

    /// An assignment counts only at true module scope: its statement sits
    /// directly under the module node. Anything inside a function or class
    /// body is a local and never becomes a symbol.
    fn is_module_scope_assignment(&self, node: Node) -> bool {
        let Some(statement) = node.parent() else {
            return false;
        };
        statement.kind() == "expression_statement"
            && statement.parent().is_some_and(|p| p.kind() == "module")
    }

    fn reject(&self, outcome: &mut ParseOutcome, file_path: &str, node: Node, reason: &str) {
        outcome.issues.push(ParseIssue {
            file_path: file_path.to_string(),
            line: node.start_position().row,
            reason: reason.to_string(),
        });
    }

    fn extract_function(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        imports: &[String],
        outcome: &mut ParseOutcome,
    ) {
        if node.has_error() {
            self.reject(outcome, file_path, node, "function spans a parse error");
            return;
        }
        let Some(name) = opt_node_text(node.child_by_field_name("name"), source) else {
            self.reject(outcome, file_path, node, "function without a name");
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid function name");
            return;
        }

        let parent_name = self.enclosing_class(node, source);
        let kind = if parent_name.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };
        let body = node.child_by_field_name("body");

        let signature = body.map(|b| {
            source[node.start_byte()..b.start_byte()]
                .trim()
                .trim_end_matches(':')
                .trim()
                .to_string()
        });

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: Language::Python,
            docstring: body.and_then(|b| self.extract_docstring(b, source)),
            signature,
            return_type: opt_node_text(node.child_by_field_name("return_type"), source),
            parameters: self.extract_parameters(node, source),
            parent_name,
            imports: imports.to_vec(),
            called_symbol_names: body.map(|b| self.extract_calls(b, source)).unwrap_or_default(),
        });
    }

    fn extract_class(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        imports: &[String],
        outcome: &mut ParseOutcome,
    ) {
        if node.has_error() {
            self.reject(outcome, file_path, node, "class spans a parse error");
            return;
        }
        let Some(name) = opt_node_text(node.child_by_field_name("name"), source) else {
            self.reject(outcome, file_path, node, "class without a name");
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid class name");
            return;
        }

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind: SymbolKind::Class,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: Language::Python,
            docstring: node
                .child_by_field_name("body")
                .and_then(|b| self.extract_docstring(b, source)),
            signature: None,
            return_type: None,
            parameters: Vec::new(),
            parent_name: None,
            imports: imports.to_vec(),
            called_symbol_names: Vec::new(),
        });
    }

    fn extract_global(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        imports: &[String],
        outcome: &mut ParseOutcome,
    ) {
        if node.has_error() {
            self.reject(outcome, file_path, node, "assignment spans a parse error");
            return;
        }
        let Some(name) = self.assignment_target(node, source) else {
            // Unpacking and attribute targets are not module variables
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid variable name");
            return;
        }

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind: SymbolKind::GlobalVar,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: Language::Python,
            docstring: None,
            signature: None,
            return_type: None,
            parameters: Vec::new(),
            parent_name: None,
            imports: imports.to_vec(),
            called_symbol_names: Vec::new(),
        });
    }

    fn assignment_target(&self, node: Node, source: &str) -> Option<String> {
        let left = node.child_by_field_name("left")?;
        if left.kind() == "identifier" {
            return Some(node_text(left, source));
        }
        let mut cursor = left.walk();
        let result = left
            .children(&mut cursor)
            .find(|c| c.kind() == "identifier")
            .map(|c| node_text(c, source));
        result
    }

    /// Docstring: first statement of the body, if it is a bare string
    fn extract_docstring(&self, body: Node, source: &str) -> Option<String> {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            match child.kind() {
                "comment" => continue,
                "expression_statement" => {
                    let first = child.child(0)?;
                    if first.kind() == "string" {
                        return Some(trim_docstring(&node_text(first, source)));
                    }
                    return None;
                }
                _ => return None,
            }
        }
        None
    }

    fn extract_parameters(&self, node: Node, source: &str) -> Vec<String> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut cursor = params.walk();
        params
            .children(&mut cursor)
            .filter(|c| {
                matches!(
                    c.kind(),
                    "identifier"
                        | "typed_parameter"
                        | "default_parameter"
                        | "typed_default_parameter"
                )
            })
            .map(|c| node_text(c, source))
            .collect()
    }

    /// Callee names of every call expression in the body; attribute calls
    /// contribute the attribute name.
    fn extract_calls(&self, body: Node, source: &str) -> Vec<String> {
        let mut calls = Vec::new();
        collect_kinds(body, &["call"], &mut calls);

        let mut names = Vec::new();
        for call in calls {
            let Some(function) = call.child_by_field_name("function") else {
                continue;
            };
            let name = match function.kind() {
                "identifier" => Some(node_text(function, source)),
                "attribute" => opt_node_text(function.child_by_field_name("attribute"), source),
                _ => None,
            };
            if let Some(name) = name {
                if is_valid_name(&name) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn enclosing_class(&self, node: Node, source: &str) -> Option<String> {
        let mut current = node.parent();
        while let Some(parent) = current {
            if parent.kind() == "class_definition" {
                return opt_node_text(parent.child_by_field_name("name"), source);
            }
            current = parent.parent();
        }
        None
    }
}

impl SourceParser for PythonParser {
    fn can_parse(&self, file_path: &str) -> bool {
        Language::from_path(file_path) == Some(Language::Python)
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, file_path: &str, source: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        let Some(tree) = self.parse_tree(source) else {
            outcome.issues.push(ParseIssue {
                file_path: file_path.to_string(),
                line: 0,
                reason: "tree-sitter produced no tree".to_string(),
            });
            return outcome;
        };
        let root = tree.root_node();
        let imports = self.extract_imports(root, source);
        self.visit(root, file_path, source, &imports, &mut outcome);
        outcome
    }
}

/// Strip triple or single quote delimiters from a Python string literal
fn trim_docstring(raw: &str) -> String {
    let mut text = raw.trim();
    for prefix in ["r", "R", "b", "B", "u", "U", "f", "F"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest;
            break;
        }
    }
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            return inner.trim().to_string();
        }
    }
    text.trim().to_string()
}

// ---------------------------------------------------------------------------
// C / C++
// ---------------------------------------------------------------------------

/// Parser for the C family. One implementation covers C and C++; the
/// language flag controls the grammar and whether class captures apply.
pub struct CFamilyParser {
    language: Language,
}

const DECLARATOR_WRAPPERS: &[&str] = &[
    "init_declarator",
    "pointer_declarator",
    "reference_declarator",
    "array_declarator",
    "parenthesized_declarator",
];

const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "qualified_identifier",
    "type_identifier",
    "operator_name",
    "destructor_name",
];

impl CFamilyParser {
    pub fn new(language: Language) -> Self {
        debug_assert!(matches!(language, Language::C | Language::Cpp));
        Self { language }
    }

    fn parse_tree(&self, source: &str) -> Option<Tree> {
        let mut parser = TreeParser::new();
        let grammar = match self.language {
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            _ => tree_sitter_c::LANGUAGE.into(),
        };
        parser.set_language(&grammar).ok()?;
        parser.parse(source, None)
    }

    fn extract_includes(&self, root: Node, source: &str) -> Vec<String> {
        let mut nodes = Vec::new();
        collect_kinds(root, &["preproc_include"], &mut nodes);
        nodes
            .into_iter()
            .map(|n| node_text(n, source).trim().to_string())
            .collect()
    }

    fn visit(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        includes: &[String],
        outcome: &mut ParseOutcome,
    ) {
        match node.kind() {
            "function_definition" => {
                self.extract_function(node, file_path, source, includes, outcome)
            }
            "struct_specifier" => {
                self.extract_type(node, SymbolKind::Struct, file_path, source, includes, outcome)
            }
            "class_specifier" if self.language == Language::Cpp => {
                self.extract_type(node, SymbolKind::Class, file_path, source, includes, outcome)
            }
            "enum_specifier" => {
                self.extract_type(node, SymbolKind::Enum, file_path, source, includes, outcome)
            }
            "type_definition" => self.extract_typedef(node, file_path, source, includes, outcome),
            "preproc_def" | "preproc_function_def" => {
                self.extract_macro(node, file_path, source, includes, outcome)
            }
            "declaration" => {
                if node.parent().is_some_and(|p| p.kind() == "translation_unit") {
                    self.extract_declaration(node, file_path, source, includes, outcome);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, file_path, source, includes, outcome);
        }
    }

    fn reject(&self, outcome: &mut ParseOutcome, file_path: &str, node: Node, reason: &str) {
        outcome.issues.push(ParseIssue {
            file_path: file_path.to_string(),
            line: node.start_position().row,
            reason: reason.to_string(),
        });
    }

    /// Walk a declarator chain down to the named identifier
    fn declarator_name(&self, declarator: Option<Node>, source: &str) -> Option<String> {
        let mut current = declarator?;
        loop {
            if IDENTIFIER_KINDS.contains(&current.kind()) {
                return Some(node_text(current, source));
            }
            if current.kind() == "function_declarator"
                || DECLARATOR_WRAPPERS.contains(&current.kind())
            {
                if let Some(inner) = current.child_by_field_name("declarator") {
                    current = inner;
                    continue;
                }
            }
            // Last resort: first identifier child
            let mut cursor = current.walk();
            return current
                .children(&mut cursor)
                .find(|c| IDENTIFIER_KINDS.contains(&c.kind()))
                .map(|c| node_text(c, source));
        }
    }

    fn find_function_declarator<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut current = node.child_by_field_name("declarator")?;
        loop {
            if current.kind() == "function_declarator" {
                return Some(current);
            }
            if DECLARATOR_WRAPPERS.contains(&current.kind()) {
                if let Some(inner) = current.child_by_field_name("declarator") {
                    current = inner;
                    continue;
                }
            }
            return None;
        }
    }

    /// C-family docstring: the contiguous run of comments directly above
    fn extract_docstring(&self, node: Node, source: &str) -> Option<String> {
        let mut comments = Vec::new();
        let mut prev = node.prev_sibling();
        while let Some(sibling) = prev {
            if sibling.kind() != "comment" {
                break;
            }
            comments.insert(0, node_text(sibling, source).trim().to_string());
            prev = sibling.prev_sibling();
        }
        if comments.is_empty() {
            None
        } else {
            Some(comments.join("\n"))
        }
    }

    fn extract_parameters(&self, node: Node, source: &str) -> Vec<String> {
        let Some(declarator) = self.find_function_declarator(node) else {
            return Vec::new();
        };
        let Some(params) = declarator.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut cursor = params.walk();
        params
            .children(&mut cursor)
            .filter(|c| matches!(c.kind(), "parameter_declaration" | "variadic_parameter"))
            .map(|c| node_text(c, source).trim().to_string())
            .collect()
    }

    fn extract_calls(&self, body: Node, source: &str) -> Vec<String> {
        let mut calls = Vec::new();
        collect_kinds(body, &["call_expression"], &mut calls);

        let mut names = Vec::new();
        for call in calls {
            let Some(function) = call.child_by_field_name("function") else {
                continue;
            };
            let name = match function.kind() {
                "identifier" => Some(node_text(function, source)),
                "field_expression" => opt_node_text(function.child_by_field_name("field"), source),
                "qualified_identifier" => {
                    opt_node_text(function.child_by_field_name("name"), source)
                }
                _ => None,
            };
            if let Some(name) = name {
                if is_valid_name(&name) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Enclosing type for inline method definitions (C++)
    fn enclosing_type(&self, node: Node, source: &str) -> Option<String> {
        let mut current = node.parent();
        while let Some(parent) = current {
            if matches!(parent.kind(), "class_specifier" | "struct_specifier") {
                return opt_node_text(parent.child_by_field_name("name"), source);
            }
            current = parent.parent();
        }
        None
    }

    fn extract_function(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        includes: &[String],
        outcome: &mut ParseOutcome,
    ) {
        if node.has_error() {
            self.reject(outcome, file_path, node, "function spans a parse error");
            return;
        }
        let Some(name) = self.declarator_name(node.child_by_field_name("declarator"), source)
        else {
            self.reject(outcome, file_path, node, "function without a resolvable name");
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid function name");
            return;
        }

        let parent_name = self.enclosing_type(node, source);
        let kind = if parent_name.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };
        let body = node.child_by_field_name("body");
        let signature = body.map(|b| source[node.start_byte()..b.start_byte()].trim().to_string());

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: self.language,
            docstring: self.extract_docstring(node, source),
            signature,
            return_type: node
                .child_by_field_name("type")
                .map(|t| node_text(t, source).trim().to_string()),
            parameters: self.extract_parameters(node, source),
            parent_name,
            imports: includes.to_vec(),
            called_symbol_names: body.map(|b| self.extract_calls(b, source)).unwrap_or_default(),
        });
    }

    fn extract_type(
        &self,
        node: Node,
        kind: SymbolKind,
        file_path: &str,
        source: &str,
        includes: &[String],
        outcome: &mut ParseOutcome,
    ) {
        // Specifiers without a body are references, not definitions
        if node.child_by_field_name("body").is_none() {
            return;
        }
        if node.has_error() {
            self.reject(outcome, file_path, node, "type spans a parse error");
            return;
        }
        // Anonymous types are dropped
        let Some(name) = opt_node_text(node.child_by_field_name("name"), source) else {
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid type name");
            return;
        }

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: self.language,
            docstring: self.extract_docstring(node, source),
            signature: None,
            return_type: None,
            parameters: Vec::new(),
            parent_name: None,
            imports: includes.to_vec(),
            called_symbol_names: Vec::new(),
        });
    }

    fn extract_typedef(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        includes: &[String],
        outcome: &mut ParseOutcome,
    ) {
        if node.has_error() {
            self.reject(outcome, file_path, node, "typedef spans a parse error");
            return;
        }
        let Some(name) = self.declarator_name(node.child_by_field_name("declarator"), source)
        else {
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid typedef name");
            return;
        }

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind: SymbolKind::Typedef,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: self.language,
            docstring: self.extract_docstring(node, source),
            signature: None,
            return_type: None,
            parameters: Vec::new(),
            parent_name: None,
            imports: includes.to_vec(),
            called_symbol_names: Vec::new(),
        });
    }

    fn extract_macro(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        includes: &[String],
        outcome: &mut ParseOutcome,
    ) {
        let Some(name) = opt_node_text(node.child_by_field_name("name"), source) else {
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid macro name");
            return;
        }

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind: SymbolKind::Macro,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source).trim_end().to_string(),
            language: self.language,
            docstring: self.extract_docstring(node, source),
            signature: None,
            return_type: None,
            parameters: Vec::new(),
            parent_name: None,
            imports: includes.to_vec(),
            called_symbol_names: Vec::new(),
        });
    }

    /// Top-level declarations split into prototypes and globals
    fn extract_declaration(
        &self,
        node: Node,
        file_path: &str,
        source: &str,
        includes: &[String],
        outcome: &mut ParseOutcome,
    ) {
        if node.has_error() {
            self.reject(outcome, file_path, node, "declaration spans a parse error");
            return;
        }
        // A declaration without any declarator is a bare type specifier;
        // the nested specifier node is captured on its own.
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };

        let is_prototype = self.find_function_declarator(node).is_some();
        let Some(name) = self.declarator_name(Some(declarator), source) else {
            self.reject(outcome, file_path, node, "declaration without a resolvable name");
            return;
        };
        if !is_valid_name(&name) {
            self.reject(outcome, file_path, node, "invalid declaration name");
            return;
        }

        let (kind, signature, return_type, parameters) = if is_prototype {
            (
                SymbolKind::FunctionDecl,
                Some(
                    node_text(node, source)
                        .trim()
                        .trim_end_matches(';')
                        .trim()
                        .to_string(),
                ),
                node.child_by_field_name("type")
                    .map(|t| node_text(t, source).trim().to_string()),
                self.extract_parameters(node, source),
            )
        } else {
            (SymbolKind::GlobalVar, None, None, Vec::new())
        };

        outcome.records.push(SymbolRecord {
            id: String::new(),
            kind,
            name,
            file_path: file_path.to_string(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            raw_content: node_text(node, source),
            language: self.language,
            docstring: self.extract_docstring(node, source),
            signature,
            return_type,
            parameters,
            parent_name: None,
            imports: includes.to_vec(),
            called_symbol_names: Vec::new(),
        });
    }
}

impl SourceParser for CFamilyParser {
    fn can_parse(&self, file_path: &str) -> bool {
        Language::from_path(file_path) == Some(self.language)
    }

    fn language(&self) -> Language {
        self.language
    }

    fn parse(&self, file_path: &str, source: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        let Some(tree) = self.parse_tree(source) else {
            outcome.issues.push(ParseIssue {
                file_path: file_path.to_string(),
                line: 0,
                reason: "tree-sitter produced no tree".to_string(),
            });
            return outcome;
        };
        let root = tree.root_node();
        let includes = self.extract_includes(root, source);
        self.visit(root, file_path, source, &includes, &mut outcome);
        outcome
    }
}

/// All registered parsers, in lookup order
pub fn all_parsers() -> Vec<Box<dyn SourceParser>> {
    vec![
        Box::new(PythonParser::new()),
        Box::new(CFamilyParser::new(Language::C)),
        Box::new(CFamilyParser::new(Language::Cpp)),
    ]
}
