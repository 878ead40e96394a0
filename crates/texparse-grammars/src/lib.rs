//! # Texparse grammars
//!
//! Declarations of the commands and environments of plain TeX, the LaTeX kernel and
//! a number of common packages, for use with the Texparse engine.
//!
//! Each module covers one package and provides a `registry` function returning its
//! declarations. The [registry] function of this crate merges all of them.
//!
//! ```
//! use texparse::{parse, Mode};
//! let registry = texparse_grammars::registry();
//! let document = parse(r"\section{A} $x^2$", Mode::Text, &registry);
//! assert!(document.diagnostics().is_empty());
//! ```

extern crate texparse;

use texparse::Registry;

pub mod amsmath;
pub mod expl3;
pub mod initex;
pub mod latex;
pub mod luatex;
pub mod verbatim;

/// A registry with the declarations of every package in this crate.
pub fn registry() -> Registry {
    let mut registry = initex::registry();
    for package in [
        latex::registry(),
        amsmath::registry(),
        verbatim::registry(),
        luatex::registry(),
        expl3::registry(),
    ] {
        registry.merge(package);
    }
    log::debug!(
        "built registry with {} commands and {} environments",
        registry.command_names().len(),
        registry.environment_names().len()
    );
    registry
}
