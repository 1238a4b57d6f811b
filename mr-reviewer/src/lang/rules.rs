//! Per-language rule records looked up by `Language`.
//!
//! Each `LanguageRules` is a flat data record, not a trait impl: adding a
//! language means adding one `const` below, never touching the call sites in
//! `crate::tree` or `crate::resolver`. Node-type strings are the exact
//! `tree-sitter` grammar node kinds for each wired grammar; languages with no
//! grammar (see `super::grammar`) still get a rule record so callers that
//! only need the name-extraction or stdlib-prefix tables keep working against
//! a plain-text fallback node set.

use crate::model::SymbolKind;
use crate::lang::Language;

/// The full set of languages the registry is polymorphic over, in
/// declaration order. Used to build the `None`-language union in
/// `super::is_symbol_defining`.
pub const ALL_LANGUAGES: &[Language] = &[
    Language::Go,
    Language::JavaScript,
    Language::TypeScript,
    Language::Tsx,
    Language::Python,
    Language::Java,
    Language::C,
    Language::Cpp,
    Language::CSharp,
    Language::Php,
    Language::Ruby,
    Language::Rust,
    Language::Swift,
    Language::Kotlin,
    Language::Scala,
    Language::Elixir,
    Language::Lua,
    Language::Elm,
    Language::OCaml,
    Language::Text,
];

/// Everything the Symbol Extractor and Cross-file Resolver need to stay
/// generic over a concrete language.
pub struct LanguageRules {
    /// `tree-sitter` node kinds that introduce a `Symbol` worth extracting.
    pub symbol_defining_node_types: &'static [&'static str],
    /// Field names tried first via `node.child_by_field_name(..)` to find a
    /// symbol-defining node's name child (the declared-field lookup).
    pub name_field_candidates: &'static [&'static str],
    /// Node kinds scanned, in order, as a fallback when no name field
    /// candidate matched (the first identifier-like descendant).
    pub name_node_kind_candidates: &'static [&'static str],
    /// Node-type substrings that mark a call-expression, used by the
    /// resolver to find outbound `Dependency`/inbound `Caller` edges.
    pub call_node_type_substrings: &'static [&'static str],
    /// Node-type substrings that mark any declaration/definition construct,
    /// used to decide whether a dependency reference is itself a
    /// re-declaration rather than a usage.
    pub declaration_node_type_substrings: &'static [&'static str],
    /// Prefixes that mark an import path as standard-library/runtime rather
    /// than project-local, so the resolver doesn't try to resolve it as a
    /// `Dependency` against the repository snapshot.
    pub stdlib_prefixes: &'static [&'static str],
    /// Node type to coarse `SymbolKind`, scanned in order.
    pub kind_by_node_type: &'static [(&'static str, SymbolKind)],
}

const EMPTY_STRS: &[&str] = &[];
const EMPTY_KINDS: &[(&str, SymbolKind)] = &[];

static TEXT: LanguageRules = LanguageRules {
    symbol_defining_node_types: EMPTY_STRS,
    name_field_candidates: EMPTY_STRS,
    name_node_kind_candidates: EMPTY_STRS,
    call_node_type_substrings: EMPTY_STRS,
    declaration_node_type_substrings: EMPTY_STRS,
    stdlib_prefixes: EMPTY_STRS,
    kind_by_node_type: EMPTY_KINDS,
};

static RUST: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_item",
        "struct_item",
        "enum_item",
        "impl_item",
        "trait_item",
        "mod_item",
        "const_item",
        "static_item",
        "type_item",
        "use_declaration",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier", "type_identifier", "field_identifier"],
    call_node_type_substrings: &["call_expression", "macro_invocation"],
    declaration_node_type_substrings: &["_item", "use_declaration"],
    stdlib_prefixes: &["std::", "core::", "alloc::"],
    kind_by_node_type: &[
        ("function_item", SymbolKind::Function),
        ("struct_item", SymbolKind::Struct),
        ("enum_item", SymbolKind::Enum),
        ("impl_item", SymbolKind::Class),
        ("trait_item", SymbolKind::Interface),
        ("mod_item", SymbolKind::Package),
        ("const_item", SymbolKind::Constant),
        ("static_item", SymbolKind::Constant),
        ("type_item", SymbolKind::Type),
        ("use_declaration", SymbolKind::Import),
    ],
};

static GO: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_declaration",
        "method_declaration",
        "type_spec",
        "const_spec",
        "var_spec",
        "import_spec",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier", "type_identifier", "field_identifier"],
    call_node_type_substrings: &["call_expression"],
    declaration_node_type_substrings: &["_declaration", "_spec"],
    stdlib_prefixes: &["fmt", "os", "io", "net", "strings", "errors", "context", "time"],
    kind_by_node_type: &[
        ("function_declaration", SymbolKind::Function),
        ("method_declaration", SymbolKind::Method),
        ("type_spec", SymbolKind::Type),
        ("const_spec", SymbolKind::Constant),
        ("var_spec", SymbolKind::Variable),
        ("import_spec", SymbolKind::Import),
    ],
};

static JAVASCRIPT: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_declaration",
        "class_declaration",
        "method_definition",
        "variable_declarator",
        "arrow_function",
        "import_statement",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier", "property_identifier"],
    call_node_type_substrings: &["call_expression", "new_expression"],
    declaration_node_type_substrings: &["_declaration", "_definition"],
    stdlib_prefixes: &["node:", "fs", "path", "http", "util"],
    kind_by_node_type: &[
        ("function_declaration", SymbolKind::Function),
        ("class_declaration", SymbolKind::Class),
        ("method_definition", SymbolKind::Method),
        ("variable_declarator", SymbolKind::Variable),
        ("arrow_function", SymbolKind::Function),
        ("import_statement", SymbolKind::Import),
    ],
};

static TYPESCRIPT: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_declaration",
        "class_declaration",
        "interface_declaration",
        "method_definition",
        "variable_declarator",
        "type_alias_declaration",
        "enum_declaration",
        "import_statement",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier", "type_identifier", "property_identifier"],
    call_node_type_substrings: &["call_expression", "new_expression"],
    declaration_node_type_substrings: &["_declaration", "_definition"],
    stdlib_prefixes: &["node:", "fs", "path", "http", "util"],
    kind_by_node_type: &[
        ("function_declaration", SymbolKind::Function),
        ("class_declaration", SymbolKind::Class),
        ("interface_declaration", SymbolKind::Interface),
        ("method_definition", SymbolKind::Method),
        ("variable_declarator", SymbolKind::Variable),
        ("type_alias_declaration", SymbolKind::Type),
        ("enum_declaration", SymbolKind::Enum),
        ("import_statement", SymbolKind::Import),
    ],
};

static PYTHON: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_definition",
        "class_definition",
        "import_statement",
        "import_from_statement",
        "assignment",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier"],
    call_node_type_substrings: &["call"],
    declaration_node_type_substrings: &["_definition", "_statement"],
    stdlib_prefixes: &["os", "sys", "re", "json", "typing", "collections", "itertools"],
    kind_by_node_type: &[
        ("function_definition", SymbolKind::Function),
        ("class_definition", SymbolKind::Class),
        ("import_statement", SymbolKind::Import),
        ("import_from_statement", SymbolKind::Import),
        ("assignment", SymbolKind::Variable),
    ],
};

static JAVA: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "method_declaration",
        "constructor_declaration",
        "field_declaration",
        "import_declaration",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier", "type_identifier"],
    call_node_type_substrings: &["method_invocation", "object_creation_expression"],
    declaration_node_type_substrings: &["_declaration"],
    stdlib_prefixes: &["java.", "javax."],
    kind_by_node_type: &[
        ("class_declaration", SymbolKind::Class),
        ("interface_declaration", SymbolKind::Interface),
        ("enum_declaration", SymbolKind::Enum),
        ("method_declaration", SymbolKind::Method),
        ("constructor_declaration", SymbolKind::Method),
        ("field_declaration", SymbolKind::Variable),
        ("import_declaration", SymbolKind::Import),
    ],
};

static C: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_definition",
        "struct_specifier",
        "enum_specifier",
        "union_specifier",
        "declaration",
        "preproc_include",
    ],
    name_field_candidates: &["declarator", "name"],
    name_node_kind_candidates: &["identifier", "type_identifier"],
    call_node_type_substrings: &["call_expression"],
    declaration_node_type_substrings: &["_definition", "_specifier", "declaration"],
    stdlib_prefixes: &["stdio.h", "stdlib.h", "string.h", "unistd.h"],
    kind_by_node_type: &[
        ("function_definition", SymbolKind::Function),
        ("struct_specifier", SymbolKind::Struct),
        ("enum_specifier", SymbolKind::Enum),
        ("union_specifier", SymbolKind::Struct),
        ("declaration", SymbolKind::Variable),
        ("preproc_include", SymbolKind::Import),
    ],
};

static CPP: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_definition",
        "class_specifier",
        "struct_specifier",
        "enum_specifier",
        "namespace_definition",
        "declaration",
        "preproc_include",
    ],
    name_field_candidates: &["declarator", "name"],
    name_node_kind_candidates: &["identifier", "type_identifier", "namespace_identifier"],
    call_node_type_substrings: &["call_expression"],
    declaration_node_type_substrings: &["_definition", "_specifier", "declaration"],
    stdlib_prefixes: &["std::", "<iostream>", "<vector>", "<string>"],
    kind_by_node_type: &[
        ("function_definition", SymbolKind::Function),
        ("class_specifier", SymbolKind::Class),
        ("struct_specifier", SymbolKind::Struct),
        ("enum_specifier", SymbolKind::Enum),
        ("namespace_definition", SymbolKind::Package),
        ("declaration", SymbolKind::Variable),
        ("preproc_include", SymbolKind::Import),
    ],
};

static CSHARP: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "class_declaration",
        "interface_declaration",
        "struct_declaration",
        "enum_declaration",
        "method_declaration",
        "property_declaration",
        "using_directive",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier"],
    call_node_type_substrings: &["invocation_expression", "object_creation_expression"],
    declaration_node_type_substrings: &["_declaration", "_directive"],
    stdlib_prefixes: &["System"],
    kind_by_node_type: &[
        ("class_declaration", SymbolKind::Class),
        ("interface_declaration", SymbolKind::Interface),
        ("struct_declaration", SymbolKind::Struct),
        ("enum_declaration", SymbolKind::Enum),
        ("method_declaration", SymbolKind::Method),
        ("property_declaration", SymbolKind::Variable),
        ("using_directive", SymbolKind::Import),
    ],
};

static PHP: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_definition",
        "method_declaration",
        "class_declaration",
        "interface_declaration",
        "trait_declaration",
        "namespace_use_declaration",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["name", "identifier"],
    call_node_type_substrings: &["function_call_expression", "object_creation_expression"],
    declaration_node_type_substrings: &["_declaration", "_definition"],
    stdlib_prefixes: &["\\"],
    kind_by_node_type: &[
        ("function_definition", SymbolKind::Function),
        ("method_declaration", SymbolKind::Method),
        ("class_declaration", SymbolKind::Class),
        ("interface_declaration", SymbolKind::Interface),
        ("trait_declaration", SymbolKind::Interface),
        ("namespace_use_declaration", SymbolKind::Import),
    ],
};

static RUBY: LanguageRules = LanguageRules {
    symbol_defining_node_types: &["method", "singleton_method", "class", "module", "assignment"],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["identifier", "constant"],
    call_node_type_substrings: &["call", "method_call"],
    declaration_node_type_substrings: &["class", "module", "method"],
    stdlib_prefixes: &["Kernel", "FileUtils", "Net::"],
    kind_by_node_type: &[
        ("method", SymbolKind::Method),
        ("singleton_method", SymbolKind::Method),
        ("class", SymbolKind::Class),
        ("module", SymbolKind::Package),
        ("assignment", SymbolKind::Variable),
    ],
};

static SWIFT: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_declaration",
        "class_declaration",
        "protocol_declaration",
        "property_declaration",
        "import_declaration",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["simple_identifier", "type_identifier"],
    call_node_type_substrings: &["call_expression"],
    declaration_node_type_substrings: &["_declaration"],
    stdlib_prefixes: &["Foundation", "Swift"],
    kind_by_node_type: &[
        ("function_declaration", SymbolKind::Function),
        ("class_declaration", SymbolKind::Class),
        ("protocol_declaration", SymbolKind::Interface),
        ("property_declaration", SymbolKind::Variable),
        ("import_declaration", SymbolKind::Import),
    ],
};

static KOTLIN: LanguageRules = LanguageRules {
    symbol_defining_node_types: &[
        "function_declaration",
        "class_declaration",
        "object_declaration",
        "property_declaration",
        "import_header",
    ],
    name_field_candidates: &["name"],
    name_node_kind_candidates: &["simple_identifier", "type_identifier"],
    call_node_type_substrings: &["call_expression"],
    declaration_node_type_substrings: &["_declaration", "_header"],
    stdlib_prefixes: &["kotlin.", "java."],
    kind_by_node_type: &[
        ("function_declaration", SymbolKind::Function),
        ("class_declaration", SymbolKind::Class),
        ("object_declaration", SymbolKind::Class),
        ("property_declaration", SymbolKind::Variable),
        ("import_header", SymbolKind::Import),
    ],
};

/// Returns the rule record for `language`. Total over every variant: the
/// text-only languages (no grammar wired) get the empty `TEXT` record so
/// lookups stay infallible rather than `Option`-wrapped.
pub fn rules_for(language: Language) -> &'static LanguageRules {
    match language {
        Language::Rust => &RUST,
        Language::Go => &GO,
        Language::JavaScript => &JAVASCRIPT,
        Language::TypeScript | Language::Tsx => &TYPESCRIPT,
        Language::Python => &PYTHON,
        Language::Java => &JAVA,
        Language::C => &C,
        Language::Cpp => &CPP,
        Language::CSharp => &CSHARP,
        Language::Php => &PHP,
        Language::Ruby => &RUBY,
        Language::Swift => &SWIFT,
        Language::Kotlin => &KOTLIN,
        Language::Scala
        | Language::Elixir
        | Language::Lua
        | Language::Elm
        | Language::OCaml
        | Language::Text => &TEXT,
    }
}
