//! Resolution of `\input`-like inclusion commands.
//!
//! The engine performs no I/O. When it meets an inclusion command it hands the
//! captured file name to an [InputResolver] supplied by the caller, which returns the
//! file's contents or [None] when the file cannot be found.

use std::collections::HashMap;

pub trait InputResolver {
    fn resolve(&mut self, name: &str) -> Option<String>;
}

impl<F: FnMut(&str) -> Option<String>> InputResolver for F {
    fn resolve(&mut self, name: &str) -> Option<String> {
        self(name)
    }
}

/// A resolver serving files from memory.
///
/// Names are looked up as given and then with a `.tex` extension.
#[derive(Debug, Default, Clone)]
pub struct InMemoryResolver {
    files: HashMap<String, String>,
}

impl InMemoryResolver {
    pub fn new() -> InMemoryResolver {
        Default::default()
    }

    pub fn with_file(mut self, name: &str, content: &str) -> InMemoryResolver {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl InputResolver for InMemoryResolver {
    fn resolve(&mut self, name: &str) -> Option<String> {
        self.files
            .get(name)
            .or_else(|| self.files.get(&format!("{name}.tex")))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_adds_extension() {
        let mut resolver = InMemoryResolver::new().with_file("chapter.tex", "hello");
        assert_eq!(resolver.resolve("chapter"), Some("hello".to_string()));
        assert_eq!(resolver.resolve("chapter.tex"), Some("hello".to_string()));
        assert_eq!(resolver.resolve("missing"), None);
    }

    #[test]
    fn closures_are_resolvers() {
        let mut calls = 0;
        let mut resolver = |name: &str| {
            calls += 1;
            (name == "a").then(|| "x".to_string())
        };
        assert_eq!(resolver.resolve("a"), Some("x".into()));
        assert_eq!(resolver.resolve("b"), None);
        assert_eq!(calls, 2);
    }
}
