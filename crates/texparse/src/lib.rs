//! # Texparse: a mode-sensitive parser for TeX-family markup.
//!
//! TeX has no fixed grammar. What a character means depends on its category code,
//! which the document itself can change, and what a command consumes depends on
//! definitions that may appear anywhere before it. This crate parses TeX, LaTeX and
//! friends into a lossless tree while tracking that state: the catcode table, a
//! stack of scopes with their macro bindings, and the current mode.
//!
//! The parser knows no commands of its own. Everything it recognizes comes from a
//! [Registry] of declarations supplied as data; the `texparse-grammars` crate
//! provides registries for plain TeX and common LaTeX packages.
//!
//! ```
//! use texparse::{parse, Mode, Registry};
//! use texparse::grammar::{CommandDecl, group};
//!
//! let registry = Registry::new()
//!     .with_commands([CommandDecl::new("emph").with_parameters(vec![group()])]);
//! let document = parse("\\emph{x} $y$", Mode::Text, &registry);
//! assert_eq!(document.to_sexp(), r#"(document (emph (argument "x")) (inline_math "y"))"#);
//! assert_eq!(document.write_source(), "\\emph{x} $y$");
//! assert!(document.diagnostics().is_empty());
//! ```

extern crate texparse_stdext;

pub mod error;
pub mod grammar;
pub mod input;
pub mod parse;
pub mod scope;
pub mod texmacro;
pub mod token;
pub mod tree;

pub use error::{Diagnostic, Kind};
pub use grammar::Registry;
pub use input::InputResolver;
pub use parse::incremental::{reparse, reparse_with_resolver};
pub use parse::{parse, parse_with_options, Document, Edit, InvalidEdit, ParseOptions};
pub use scope::Mode;
