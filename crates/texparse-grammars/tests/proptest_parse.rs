//! Property-based tests for the parser with the full set of grammars.
//!
//! Inputs are built from fragments that exercise the hard parts of TeX: unbalanced
//! groups, catcode changes, definitions, math shifts and verbatim.

use proptest::prelude::*;
use texparse::{parse, reparse, Edit, Mode};

fn fragment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{1,6}",
        Just("{".to_string()),
        Just("}".to_string()),
        Just("$".to_string()),
        Just("$$".to_string()),
        Just("\n\n".to_string()),
        Just("% comment\n".to_string()),
        Just("\\begingroup".to_string()),
        Just("\\endgroup".to_string()),
        Just("\\bgroup".to_string()),
        Just("\\egroup".to_string()),
        Just("\\def\\x#1{#1#1}".to_string()),
        Just("\\x{ab}".to_string()),
        Just("\\let\\y=\\x".to_string()),
        Just("\\makeatletter".to_string()),
        Just("\\a@b".to_string()),
        Just("\\catcode`\\$=12 ".to_string()),
        Just("\\section{".to_string()),
        Just("\\frac{a}{b}".to_string()),
        Just("\\verb|".to_string()),
        Just("\\mint{c}|".to_string()),
        Just("|".to_string()),
        Just("\\begin{itemize}".to_string()),
        Just("\\end{itemize}".to_string()),
        Just("\\begin{verbatim}".to_string()),
        Just("\\end{verbatim}".to_string()),
        Just("\\end{verbatim*}".to_string()),
        Just("\\(".to_string()),
        Just("\\]".to_string()),
        Just("\\expandafter".to_string()),
        Just("\\ExplSyntaxOn".to_string()),
        Just("\u{7f}".to_string()),
        Just("\\".to_string()),
    ]
}

fn source_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment_strategy(), 0..24).prop_map(|fragments| fragments.concat())
}

/// An edit of the source. The generated characters are ASCII so any byte offset is a
/// valid range boundary.
fn edit_strategy() -> impl Strategy<Value = (String, usize, usize, String)> {
    (
        source_strategy(),
        any::<usize>(),
        0..8_usize,
        prop_oneof![Just(String::new()), fragment_strategy()],
    )
}

proptest! {
    #[test]
    fn round_trip(source in source_strategy()) {
        let registry = texparse_grammars::registry();
        let document = parse(&source, Mode::Text, &registry);
        prop_assert_eq!(document.write_source(), source);
    }

    #[test]
    fn diagnostics_point_into_the_source(source in source_strategy()) {
        let registry = texparse_grammars::registry();
        let document = parse(&source, Mode::Text, &registry);
        for diagnostic in document.diagnostics() {
            let span = diagnostic.span();
            prop_assert!(span.start <= span.end && span.end <= source.len(), "{:?}", span);
        }
    }

    #[test]
    fn reparse_matches_parse((source, start, len, text) in edit_strategy()) {
        let registry = texparse_grammars::registry();
        let start = start % (source.len() + 1);
        let end = (start + len).min(source.len());
        let edit = Edit::new(start..end, &text);
        let prior = parse(&source, Mode::Text, &registry);
        let reparsed = reparse(&prior, &edit, &registry).expect("edit range is valid");
        let edited = edit.apply(&source).expect("edit range is valid");
        let fresh = parse(&edited, Mode::Text, &registry);
        prop_assert_eq!(reparsed.write_source(), edited);
        prop_assert_eq!(reparsed.to_sexp(), fresh.to_sexp());
        prop_assert_eq!(reparsed.diagnostics(), fresh.diagnostics());
    }
}
