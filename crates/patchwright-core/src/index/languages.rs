//! Extension to grammar registry

use tree_sitter::Language;

/// One supported source language
#[derive(Clone)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub language: Language,
    /// Node kinds that become definition units, in emission order
    pub definition_kinds: &'static [&'static str],
}

impl std::fmt::Debug for LanguageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageSpec")
            .field("name", &self.name)
            .field("definition_kinds", &self.definition_kinds)
            .finish()
    }
}

/// Maps file extensions (without the dot) to a language
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    entries: Vec<(String, LanguageSpec)>,
}

impl LanguageRegistry {
    /// Python, Java and Rust
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(
            "py",
            LanguageSpec {
                name: "python",
                language: tree_sitter_python::LANGUAGE.into(),
                definition_kinds: &["function_definition"],
            },
        );
        registry.register(
            "java",
            LanguageSpec {
                name: "java",
                language: tree_sitter_java::LANGUAGE.into(),
                definition_kinds: &["constructor_declaration", "method_declaration"],
            },
        );
        registry.register(
            "rs",
            LanguageSpec {
                name: "rust",
                language: tree_sitter_rust::LANGUAGE.into(),
                definition_kinds: &["function_item"],
            },
        );
        registry
    }

    /// Add or replace the language for `extension`
    pub fn register(&mut self, extension: &str, spec: LanguageSpec) {
        let ext = normalize(extension);
        match self.entries.iter_mut().find(|(e, _)| *e == ext) {
            Some(entry) => entry.1 = spec,
            None => self.entries.push((ext, spec)),
        }
    }

    pub fn get(&self, extension: &str) -> Option<&LanguageSpec> {
        let ext = normalize(extension);
        self.entries.iter().find(|(e, _)| *e == ext).map(|(_, s)| s)
    }

    pub fn extensions(&self) -> Vec<String> {
        self.entries.iter().map(|(e, _)| e.clone()).collect()
    }

    /// Registry restricted to `extensions`; unknown ones are dropped
    pub fn select(&self, extensions: &[String]) -> Self {
        let mut selected = Self::default();
        for ext in extensions {
            if let Some(spec) = self.get(ext) {
                selected.register(ext, spec.clone());
            }
        }
        selected
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}
