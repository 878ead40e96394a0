//! The LaTeX3 programming layer's syntax switches.

use texparse::grammar::*;
use texparse::token::{CatCode, CatCodeRange};

/// Catcodes set by `\ExplSyntaxOn`.
const EXPL_SYNTAX: [CatCodeRange; 9] = [
    CatCodeRange::single('\t', CatCode::Ignored),
    CatCodeRange::single(' ', CatCode::Ignored),
    CatCodeRange::single('"', CatCode::Other),
    CatCodeRange::single('&', CatCode::AlignmentTab),
    CatCodeRange::single(':', CatCode::Letter),
    CatCodeRange::single('^', CatCode::Superscript),
    CatCodeRange::single('_', CatCode::Letter),
    CatCodeRange::single('|', CatCode::Other),
    CatCodeRange::single('~', CatCode::Space),
];

/// Catcodes restored by `\ExplSyntaxOff`.
const DOCUMENT_SYNTAX: [CatCodeRange; 5] = [
    CatCodeRange::single('\t', CatCode::Space),
    CatCodeRange::single(' ', CatCode::Space),
    CatCodeRange::single(':', CatCode::Other),
    CatCodeRange::single('_', CatCode::Subscript),
    CatCodeRange::single('~', CatCode::Active),
];

pub fn registry() -> Registry {
    Registry::new()
        .with_commands([
            CommandDecl::new("ExplSyntaxOn")
                .with_effect(Effect::CatCodes(EXPL_SYNTAX.to_vec()))
                .local(),
            CommandDecl::new("ExplSyntaxOff")
                .with_effect(Effect::CatCodes(DOCUMENT_SYNTAX.to_vec()))
                .local(),
        ])
        .with_commands(
            ["ProvidesExplPackage", "ProvidesExplClass", "ProvidesExplFile"].map(|name| {
                CommandDecl::new(name)
                    .with_parameters(vec![group(), group(), group(), group()])
                    .with_effect(Effect::CatCodes(EXPL_SYNTAX.to_vec()))
                    .local()
            }),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use texparse_testing::*;

    test_suite![
        sexp_tests(
            (
                names_take_colons_and_underscores,
                r"\ExplSyntaxOn\tl_set:Nn",
                r#"(document (ExplSyntaxOn) (command \tl_set:Nn))"#
            ),
            (
                syntax_off,
                r"\ExplSyntaxOn\ExplSyntaxOff\a_b",
                r#"(document (ExplSyntaxOn) (ExplSyntaxOff) (command \a) "_" "b")"#
            ),
            (
                syntax_is_scoped,
                r"{\ExplSyntaxOn}\a_b",
                r#"(document (group (ExplSyntaxOn)) (command \a) "_" "b")"#
            ),
            (
                provides_expl_package,
                r"\ProvidesExplPackage{a}{2024-01-01}{1.0}{b}\c_d",
                r#"(document (ProvidesExplPackage (argument "a") (argument "2" "0" "2" "4" "-" "0" "1" "-" "0" "1") (argument "1" "." "0") (argument "b")) (command \c_d))"#
            ),
        ),
    ];
}
