use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported programming language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Swift,
    Kotlin,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Parse a language name as produced by [`Language::as_str`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rust" => Language::Rust,
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            "csharp" => Language::CSharp,
            "ruby" => Language::Ruby,
            "swift" => Language::Swift,
            "kotlin" => Language::Kotlin,
            _ => Language::Unknown,
        }
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Unknown => "unknown",
        }
    }

    /// Line prefixes that open a top-level definition. Used as chunk
    /// boundaries in addition to the strategy's own markers.
    pub fn definition_markers(self) -> Vec<&'static str> {
        match self {
            Language::Rust => vec![
                "fn ",
                "pub fn ",
                "pub(crate) fn ",
                "async fn ",
                "pub async fn ",
                "impl ",
                "impl<",
                "struct ",
                "pub struct ",
                "enum ",
                "pub enum ",
                "trait ",
                "pub trait ",
                "mod ",
                "pub mod ",
            ],
            Language::Python => vec!["def ", "class ", "async def "],
            Language::JavaScript | Language::TypeScript => vec![
                "function ",
                "async function ",
                "class ",
                "export function ",
                "export async function ",
                "export class ",
                "export default ",
                "interface ",
                "export interface ",
            ],
            Language::Go => vec!["func ", "type "],
            Language::Java | Language::CSharp | Language::Kotlin => vec![
                "public ",
                "private ",
                "protected ",
                "class ",
                "interface ",
                "fun ",
            ],
            Language::Ruby => vec!["def ", "class ", "module "],
            Language::Swift => vec!["func ", "class ", "struct ", "extension "],
            Language::C | Language::Cpp | Language::Unknown => vec![],
        }
    }
}
