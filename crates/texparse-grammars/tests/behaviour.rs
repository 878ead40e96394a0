//! End-to-end behaviour of the parser with the full set of grammars.

use texparse::texmacro::Binding;
use texparse::tree::{Node, Tag};
use texparse::{parse, Document, Kind, Mode};

fn parse_latex(source: &str) -> Document {
    parse(source, Mode::Text, &texparse_grammars::registry())
}

fn verbatim_bodies(document: &Document) -> Vec<String> {
    let mut bodies = vec![];
    document.root().visit(&mut |node: &Node| {
        if let Tag::Verbatim { .. } = node.tag() {
            let text = node.span().map(|s| s.slice(document.source())).unwrap_or("");
            bodies.push(text.to_string());
        }
    });
    bodies
}

#[test]
fn group_kinds_must_match() {
    let document = parse_latex(r"\begingroup\egroup");
    assert_eq!(document.diagnostic_kinds(), vec![Kind::GroupKindMismatch]);
}

#[test]
fn scope_isolation() {
    let source = r"\def\x{a}\begingroup\makeatletter\def\x{b}\catcode`\$=12 \endgroup";
    let document = parse_latex(source);
    assert_eq!(document.diagnostics(), &[]);
    assert_eq!(document.state_before(1), Some(document.final_state()));
    assert_eq!(document.final_state().cat_code_override('$'), None);

    let document = parse_latex(&format!("{source}$y$"));
    assert!(matches!(
        document.root().children().last().map(|c| c.tag()),
        Some(Tag::Math { .. })
    ));
}

#[test]
fn verbatim_environment_names() {
    assert_eq!(
        parse_latex(r"\begin{verbatim} a \end{verbatim}").diagnostic_kinds(),
        vec![]
    );
    assert_eq!(
        parse_latex(r"\begin{verbatim} a \end{verbatim*}").diagnostic_kinds(),
        vec![Kind::EnvironmentNameMismatch]
    );
}

#[test]
fn first_verbatim_delimiter_wins() {
    let document = parse_latex(r"\mint{python}|print(1)|");
    assert_eq!(verbatim_bodies(&document), vec!["print(1)"]);

    let document = parse_latex(r"\mint{python}|a|b|");
    assert_eq!(verbatim_bodies(&document), vec!["a"]);
    assert_eq!(document.write_source(), r"\mint{python}|a|b|");
}

#[test]
fn math_balancing() {
    let document = parse_latex("$x^2$");
    assert_eq!(document.diagnostics(), &[]);
    let math = &document.root().children()[0];
    assert!(matches!(math.tag(), Tag::Math { mode: Mode::Math, .. }));
    assert_eq!(math.tokens().count(), 3);

    let document = parse_latex("$$x^2$$");
    assert_eq!(document.diagnostics(), &[]);
    assert!(matches!(
        document.root().children()[0].tag(),
        Tag::Math {
            mode: Mode::DisplayMath,
            ..
        }
    ));

    let document = parse_latex("$$x^2$");
    assert_eq!(document.diagnostic_kinds(), vec![Kind::UnterminatedMath]);
    assert_eq!(document.write_source(), "$$x^2$");
}

#[test]
fn expandafter_expands_one_step() {
    let document = parse_latex(r"\def\a{A}\def\b{\a}\expandafter\x\b");
    assert_eq!(document.diagnostics(), &[]);
    let sexp = document.to_sexp();
    // `\b` expands to `\a`, which is left alone; `\x` is not examined.
    assert!(
        sexp.ends_with(r"(expandafter \expandafter \x \b) (command ~\x) (macro ~\a))"),
        "{sexp}"
    );
}

#[test]
fn definitions_are_scoped() {
    let document = parse_latex(r"\def\x{1}{\def\x{2}}");
    assert_eq!(document.diagnostics(), &[]);
    let Some(Binding::Macro(m)) = document.binding("x") else {
        panic!("\\x is not a macro");
    };
    assert!(m.parameter_text().is_empty());
    assert_eq!(
        texparse::token::write_tokens(m.body(), document.interner()),
        "1"
    );
}

#[test]
fn unknown_commands_are_not_errors() {
    let document = parse_latex(r"\foo[bar]{baz}\begin{unknown}x\end{unknown}");
    assert_eq!(document.diagnostics(), &[]);
}

#[test]
fn parse_completes_on_malformed_input() {
    let source = "}\\end{x}$\\begin{itemize}\\verb|\n{\\catcode`\\{=16 \u{7f}";
    let document = parse_latex(source);
    assert!(!document.diagnostics().is_empty());
    assert_eq!(document.write_source(), source);
}

#[test]
fn deep_nesting_completes() {
    for source in [
        r"\begin{itemize}".repeat(10_000),
        "{".repeat(100_000),
    ] {
        let document = parse_latex(&source);
        assert_eq!(document.write_source(), source);
        assert!(document.diagnostic_kinds().contains(&Kind::UnexpectedToken));
    }
}
