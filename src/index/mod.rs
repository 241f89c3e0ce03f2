// Symbol data model, identity assignment, and the file registry

pub mod identity;
pub mod registry;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Symbol kinds recognized by the parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Typedef,
    Macro,
    GlobalVar,
    FunctionDecl,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Typedef => "typedef",
            SymbolKind::Macro => "macro",
            SymbolKind::GlobalVar => "global_var",
            SymbolKind::FunctionDecl => "function_decl",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "function" => Ok(SymbolKind::Function),
            "method" => Ok(SymbolKind::Method),
            "class" => Ok(SymbolKind::Class),
            "struct" => Ok(SymbolKind::Struct),
            "enum" => Ok(SymbolKind::Enum),
            "typedef" => Ok(SymbolKind::Typedef),
            "macro" => Ok(SymbolKind::Macro),
            "global_var" => Ok(SymbolKind::GlobalVar),
            "function_decl" => Ok(SymbolKind::FunctionDecl),
            _ => anyhow::bail!("Unknown symbol kind: {}", s),
        }
    }
}

/// Source languages with a registered parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    C,
    Cpp,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    /// Map a file extension to its language, if supported
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "py" => Some(Language::Python),
            "c" | "h" => Some(Language::C),
            "cpp" | "hpp" | "cc" | "cxx" => Some(Language::Cpp),
            _ => None,
        }
    }
}

/// One parsed source definition with its structural metadata.
///
/// `start_line`/`end_line` are 0-indexed and inclusive. `id` is empty until
/// `identity::assign_ids` runs; strategies must never see an unassigned
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: String,
    pub kind: SymbolKind,
    pub name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub raw_content: String,
    pub language: Language,
    pub docstring: Option<String>,
    pub signature: Option<String>,
    pub return_type: Option<String>,
    pub parameters: Vec<String>,
    pub parent_name: Option<String>,
    /// File-scope import/include statements, shared by every record of a file
    pub imports: Vec<String>,
    /// Bare callee names referenced in the body; resolved globally later
    pub called_symbol_names: Vec<String>,
}

/// A candidate the parser extracted but rejected, kept for diagnostics
/// instead of being silently dropped.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub file_path: String,
    pub line: usize,
    pub reason: String,
}

/// Best-effort parse result: whatever well-formed records could be
/// extracted, plus the rejects.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: Vec<SymbolRecord>,
    pub issues: Vec<ParseIssue>,
}

/// Metadata row stored alongside each document in the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub file_path: String,
    pub project_root: String,
    pub relative_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub language: Language,
    pub start_line: usize,
    pub end_line: usize,
    pub parent_name: Option<String>,
    pub signature: Option<String>,
    pub return_type: Option<String>,
    pub imports: Option<String>,
    pub parameters: Option<String>,
    pub called_names: Option<String>,
}

/// A fully materialized store row: id + embedding text + metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub document: String,
    pub metadata: DocMetadata,
}

/// Concatenated text embedded for a symbol: docstring, signature, return
/// type, and parameters ahead of the body for semantic quality.
pub fn embedding_text(record: &SymbolRecord) -> String {
    let mut parts = Vec::new();
    if let Some(doc) = &record.docstring {
        parts.push(format!("Docstring: {}", doc));
    }
    if let Some(sig) = &record.signature {
        parts.push(format!("Signature: {}", sig));
    }
    if let Some(ret) = &record.return_type {
        parts.push(format!("Returns: {}", ret));
    }
    if !record.parameters.is_empty() {
        parts.push(format!("Parameters: {}", record.parameters.join(", ")));
    }
    parts.push(format!("Code:\n{}", record.raw_content));
    parts.join("\n\n")
}
