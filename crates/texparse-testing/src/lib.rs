/*!
Texparse unit testing library

This is a crate for writing unit tests for grammars built on Texparse.
It is used extensively in the `texparse-grammars` crate,
    so the unit tests there are good examples of what this crate can do.

Every test parses a TeX snippet with a [Registry] provided by the test writer
    and checks the result.
Whatever else a test checks, it also verifies that writing the parse tree back out
    reproduces the snippet exactly.

## Test types

### S-expression tests

Run using [`run_sexp_test`].

These tests verify that a snippet parses without diagnostics to a specific tree,
    written as an S-expression (see [`Document::to_sexp`]).
For example, with a registry declaring `\section` taking one argument,
```tex
\section{Intro}
```
parses to `(document (section (argument "I" "n" "t" "r" "o")))`.

### Diagnostic tests

Run using [`run_diagnostic_test`].

These tests verify that parsing a snippet produces exactly the given diagnostic kinds,
    in order.

### Reparse tests

Run using [`run_reparse_test`].

These tests parse a snippet, apply an edit and reparse incrementally.
The test passes if the result is the same as parsing the edited snippet from scratch.

## The test suite macro

The preferred way to write a suite of unit tests is to use the [`test_suite`] macro.
See the macro's documentation for instructions on using it.
*/

use texparse::input::InMemoryResolver;
use texparse::*;

/// Option passed to a test runner.
pub enum TestOption<'a> {
    /// The registry is the result of invoking the provided static function.
    ///
    /// Overrides previous `Registry` or `RegistryDyn` options.
    Registry(fn() -> Registry),

    /// The registry is the result of invoking the provided closure.
    ///
    /// Overrides previous `Registry` or `RegistryDyn` options.
    RegistryDyn(Box<dyn Fn() -> Registry + 'a>),

    /// The mode at the start of the snippet. Defaults to text mode.
    ///
    /// Overrides previous `Mode` options.
    Mode(Mode),

    /// Files available to `\input`, as (name, content) pairs.
    ///
    /// Adds to previous `Files` options.
    Files(Vec<(&'a str, &'a str)>),
}

struct ResolvedOptions<'a> {
    registry: &'a dyn Fn() -> Registry,
    mode: Mode,
    files: Vec<(&'a str, &'a str)>,
}

impl<'a> ResolvedOptions<'a> {
    fn new(options: &'a [TestOption]) -> Self {
        let mut resolved = Self {
            registry: &Registry::new,
            mode: Mode::Text,
            files: vec![],
        };
        for option in options {
            match option {
                TestOption::Registry(f) => resolved.registry = f,
                TestOption::RegistryDyn(f) => resolved.registry = f,
                TestOption::Mode(mode) => resolved.mode = *mode,
                TestOption::Files(files) => resolved.files.extend(files.iter().copied()),
            }
        }
        resolved
    }

    fn resolver(&self) -> InMemoryResolver {
        self.files
            .iter()
            .fold(InMemoryResolver::new(), |resolver, (name, content)| {
                resolver.with_file(name, content)
            })
    }

    fn parse(&self, source: &str, registry: &Registry) -> Document {
        let mut resolver = self.resolver();
        parse_with_options(
            source,
            &ParseOptions::default().with_mode(self.mode),
            registry,
            Some(&mut resolver),
        )
    }
}

/// Initialize logging for a test. Logs are written for tests run with `RUST_LOG` set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn print_diagnostics(document: &Document) {
    for diagnostic in document.diagnostics() {
        println!("{}", diagnostic.display("testing.tex", document.source()));
    }
}

fn check_round_trip(document: &Document) {
    let written = document.write_source();
    if written != document.source() {
        println!("------[input]------");
        println!("{}", document.source());
        println!("-----[written]-----");
        println!("{written}");
        println!("-------------------");
        panic!("Round trip test failed");
    }
}

/// Run an S-expression test.
///
/// The test passes if the input parses without diagnostics to the expected tree.
pub fn run_sexp_test(input: &str, expected: &str, options: &[TestOption]) {
    init_logging();
    let options = ResolvedOptions::new(options);
    let registry = (options.registry)();
    let document = options.parse(input, &registry);
    check_round_trip(&document);
    if !document.diagnostics().is_empty() {
        print_diagnostics(&document);
        panic!(
            "S-expression test failed: {} unexpected diagnostics",
            document.diagnostics().len()
        );
    }
    let actual = document.to_sexp();
    if actual != expected {
        println!("------[expected]------");
        println!("{expected}");
        println!("-------[actual]-------");
        println!("{actual}");
        println!("----------------------");
        panic!("S-expression test failed");
    }
}

/// Run a diagnostic test.
///
/// The test passes if parsing the input produces diagnostics of exactly the expected kinds.
pub fn run_diagnostic_test(input: &str, expected: &[Kind], options: &[TestOption]) {
    init_logging();
    let options = ResolvedOptions::new(options);
    let registry = (options.registry)();
    let document = options.parse(input, &registry);
    check_round_trip(&document);
    let actual = document.diagnostic_kinds();
    if actual != expected {
        print_diagnostics(&document);
        println!("Tree: {}", document.to_sexp());
        panic!("Diagnostic test failed: expected {expected:?}, found {actual:?}");
    }
}

/// Run a reparse test.
///
/// The test passes if reparsing the input after the edit gives the same tree and
/// diagnostics as parsing the edited input from scratch.
pub fn run_reparse_test(input: &str, edit: Edit, options: &[TestOption]) {
    init_logging();
    let options = ResolvedOptions::new(options);
    let registry = (options.registry)();
    let prior = options.parse(input, &registry);
    let edited = match edit.apply(input) {
        Ok(edited) => edited,
        Err(err) => panic!("Invalid reparse test: {err}"),
    };
    let mut resolver = options.resolver();
    let reparsed = match reparse_with_resolver(&prior, &edit, &registry, Some(&mut resolver)) {
        Ok(reparsed) => reparsed,
        Err(err) => panic!("Reparse failed: {err}"),
    };
    let fresh = options.parse(&edited, &registry);
    check_round_trip(&reparsed);
    log::info!(
        "reused {} of {} top-level nodes",
        reparsed.reused(),
        prior.root().children().len()
    );
    if reparsed.to_sexp() != fresh.to_sexp() {
        println!("------[reparsed]------");
        println!("{}", reparsed.to_sexp());
        println!("--------[fresh]-------");
        println!("{}", fresh.to_sexp());
        println!("----------------------");
        panic!("Reparse test failed: trees differ");
    }
    if reparsed.diagnostics() != fresh.diagnostics() {
        println!("------[reparsed]------");
        print_diagnostics(&reparsed);
        println!("--------[fresh]-------");
        print_diagnostics(&fresh);
        println!("----------------------");
        panic!("Reparse test failed: diagnostics differ");
    }
}

/// Macro to generate a suite of unit tests
///
/// The general use of this macros looks like this:
/// ```
/// # use texparse_testing::*;
/// # use texparse::grammar::*;
/// # use texparse::Kind;
/// fn registry() -> Registry {
///     Registry::new().with_commands([CommandDecl::new("emph").with_parameters(vec![group()])])
/// }
/// test_suite![
///     options(TestOption::Registry(registry)),
///     sexp_tests(
///         (case_1, r"\emph{a}", r#"(document (emph (argument "a")))"#),
///     ),
///     diagnostic_tests(
///         (case_2, r"\emph{a", [Kind::UnbalancedGroup]),
///     ),
///     reparse_tests(
///         (case_3, r"\emph{a}\emph{b}", 6..7, "c"),
///     ),
/// ];
/// ```
///
/// The arguments to the macro are:
///
/// - `options(option_1, option_2, ..., option_n)`: options to pass to the test runner.
///     This is a list of values of type [TestOption].
///     The options can be omitted, in which case they default to `options(TestOption::Registry(registry))`.
///     In this case `registry` is a static function in scope that returns the registry to test.
///
/// - `sexp_tests(cases...)`: a list of S-expression test cases.
///     Each case is of the form (case name, input, expected S-expression).
///     The data here is fed into the [run_sexp_test] test runner.
///
/// - `diagnostic_tests(cases...)`: a list of diagnostic test cases.
///     Each case is of the form (case name, input, [kinds...]).
///     The data here is fed into the [run_diagnostic_test] test runner.
///
/// - `reparse_tests(cases...)`: a list of reparse test cases.
///     Each case is of the form (case name, input, replaced byte range, replacement text).
///     The data here is fed into the [run_reparse_test] test runner.
///
/// Only one `options()` argument may be provided, and if provided it must be in the first position.
/// Zero or more of the other arguments may be provided, and in any order.
#[macro_export]
macro_rules! test_suite {
    ( options $options: tt, sexp_tests ( $( ($name: ident, $input: expr, $expected: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options = vec! $options;
                texparse_testing::run_sexp_test($input, $expected, &options);
            }
        )*
    );
    ( options $options: tt, sexp_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for sexp_tests: must be a list of tuples (name, input, expected)");
    );
    ( options $options: tt, diagnostic_tests ( $( ($name: ident, $input: expr, [ $( $kind: expr ),* $(,)? ] $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options = vec! $options;
                texparse_testing::run_diagnostic_test($input, &[ $( $kind ),* ], &options);
            }
        )*
    );
    ( options $options: tt, diagnostic_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for diagnostic_tests: must be a list of tuples (name, input, [kinds...])");
    );
    ( options $options: tt, reparse_tests ( $( ($name: ident, $input: expr, $range: expr, $text: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options = vec! $options;
                texparse_testing::run_reparse_test($input, texparse::Edit::new($range, $text), &options);
            }
        )*
    );
    ( options $options: tt, reparse_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for reparse_tests: must be a list of tuples (name, input, range, text)");
    );
    ( options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `options`, `sexp_tests`, `diagnostic_tests`, `reparse_tests`");
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            texparse_testing::test_suite![options $options, $test_kind $test_cases,];
        )+
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        texparse_testing::test_suite![options (texparse_testing::TestOption::Registry(registry)), $( $test_kind $test_cases, )+ ];
    );
}
