//! Language Registry.
//!
//! Maps a file path to a `Language` tag, optionally to a concrete
//! `tree-sitter` grammar, and holds the per-language rule set the Symbol
//! Extractor (`crate::tree`) and Cross-file Resolver (`crate::resolver`) are
//! both polymorphic over.
//!
//! Deliberately *not* a per-language struct hierarchy: one
//! `LanguageRules` record per language, looked up by `Language`, is the only
//! extension point.

mod rules;

pub use rules::{LanguageRules, rules_for};

use crate::model::SymbolKind;

/// Every language this registry can classify a path into. `Text` is the
/// fallback for anything unrecognised or for languages we classify but do
/// not wire a grammar for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Go,
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Java,
    C,
    Cpp,
    CSharp,
    Php,
    Ruby,
    Rust,
    Swift,
    Kotlin,
    Scala,
    Elixir,
    Lua,
    Elm,
    OCaml,
    Text,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Rust => "rust",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Elixir => "elixir",
            Language::Lua => "lua",
            Language::Elm => "elm",
            Language::OCaml => "ocaml",
            Language::Text => "text",
        }
    }
}

/// Classifies `path` into a language. Decision order: exact filename, then
/// lowercased extension, then the generic `Text` fallback. Deterministic.
pub fn classify(path: &str) -> Language {
    let file_name = path.rsplit('/').next().unwrap_or(path);

    match file_name {
        "Gemfile" | "Rakefile" | "Guardfile" => return Language::Ruby,
        "Dockerfile" | "Makefile" | "Vagrantfile" => return Language::Text,
        _ => {}
    }

    let ext = file_name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("go") => Language::Go,
        Some("js" | "jsx" | "mjs" | "cjs") => Language::JavaScript,
        Some("ts" | "mts" | "cts") => Language::TypeScript,
        Some("tsx") => Language::Tsx,
        Some("py" | "pyi") => Language::Python,
        Some("java") => Language::Java,
        Some("h" | "c") => Language::C,
        Some("hpp" | "hh" | "cc" | "cpp" | "cxx" | "hxx") => Language::Cpp,
        Some("cs") => Language::CSharp,
        Some("php") => Language::Php,
        Some("rb") => Language::Ruby,
        Some("rs") => Language::Rust,
        Some("swift") => Language::Swift,
        Some("kt" | "kts") => Language::Kotlin,
        Some("scala" | "sc") => Language::Scala,
        Some("ex" | "exs") => Language::Elixir,
        Some("lua") => Language::Lua,
        Some("elm") => Language::Elm,
        Some("ml" | "mli") => Language::OCaml,
        _ => Language::Text,
    }
}

/// Returns a concrete `tree-sitter` grammar for `language`, or `None` when
/// this build has no grammar crate wired for it. `None` is a recoverable
/// signal, not a failure: the Context Assembler falls back to
/// plain-text diff handling for that file.
pub fn grammar(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::C => Some(tree_sitter_c::LANGUAGE.into()),
        Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
        Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
        Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
        Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
        Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
        // No published/maintained grammar crate wired for these in this
        // build; classified for the Finding Mapper's language tag, but
        // symbol extraction silently skips them (see DESIGN.md).
        Language::Scala | Language::Elixir | Language::Lua | Language::Elm | Language::OCaml => {
            None
        }
        Language::Text => None,
    }
}

/// Whether `node_type` is a symbol-defining node for `language`. When the
/// caller is unsure of the language (e.g. a re-anchored snippet with no
/// known extension), pass `None` to fall back to the union across every
/// language's rule set.
pub fn is_symbol_defining(language: Option<Language>, node_type: &str) -> bool {
    match language {
        Some(lang) => rules_for(lang).symbol_defining_node_types.contains(&node_type),
        None => rules::ALL_LANGUAGES
            .iter()
            .any(|lang| rules_for(*lang).symbol_defining_node_types.contains(&node_type)),
    }
}

/// Maps a symbol-defining node type to the coarse `SymbolKind` the rest of
/// the pipeline understands, using the owning language's lookup table.
pub fn symbol_kind_for(language: Language, node_type: &str) -> SymbolKind {
    rules_for(language)
        .kind_by_node_type
        .iter()
        .find(|(ty, _)| *ty == node_type)
        .map(|(_, kind)| *kind)
        .unwrap_or(SymbolKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_deterministic_and_extension_based() {
        assert_eq!(classify("src/main.rs"), classify("src/main.rs"));
        assert!(matches!(classify("pkg/util.go"), Language::Go));
        assert!(matches!(classify("app/component.tsx"), Language::Tsx));
        assert!(matches!(classify("README.md"), Language::Text));
    }

    #[test]
    fn exact_filenames_take_precedence_over_extension() {
        assert!(matches!(classify("backend/Gemfile"), Language::Ruby));
        assert!(matches!(classify("Dockerfile"), Language::Text));
    }

    #[test]
    fn grammar_is_none_for_intentionally_text_only_languages() {
        assert!(grammar(Language::Scala).is_none());
        assert!(grammar(Language::Rust).is_some());
    }
}
