//! Display math environments and math-mode commands of `amsmath` and the kernel.

use texparse::grammar::*;
use texparse::scope::Mode;

/// Environments whose content is display math. Each also has a starred form.
const DISPLAY_ENVIRONMENTS: [&str; 6] = [
    "equation", "align", "gather", "multline", "flalign", "eqnarray",
];

const MATH_STYLES: [&str; 11] = [
    "mathbf",
    "mathrm",
    "mathit",
    "mathsf",
    "mathtt",
    "mathcal",
    "mathbb",
    "mathfrak",
    "mathscr",
    "boldsymbol",
    "operatorname",
];

const MATH_ACCENTS: [&str; 12] = [
    "hat",
    "bar",
    "vec",
    "tilde",
    "dot",
    "ddot",
    "check",
    "breve",
    "widehat",
    "widetilde",
    "overline",
    "underline",
];

pub fn registry() -> Registry {
    Registry::new()
        .with_environments(DISPLAY_ENVIRONMENTS.into_iter().flat_map(|name| {
            [name.to_string(), format!("{name}*")].map(|full_name| {
                EnvironmentDecl::new(&full_name)
                    .with_label(name)
                    .with_mode(Mode::DisplayMath)
                    .text()
            })
        }))
        .with_commands(MATH_STYLES.into_iter().chain(MATH_ACCENTS).map(|name| {
            CommandDecl::new(name)
                .with_parameters(vec![group()])
                .math()
        }))
        .with_commands([
            fraction("frac"),
            fraction("dfrac"),
            fraction("tfrac"),
            fraction("binom"),
            CommandDecl::new("sqrt")
                .with_parameters(vec![optional(brack_group()), group()])
                .math(),
            CommandDecl::new("tag")
                .with_parameters(vec![optional(literal('*')), group_in(Mode::Text)])
                .math(),
            CommandDecl::new("intertext")
                .with_parameters(vec![group_in(Mode::Text)])
                .math(),
        ])
}

fn fraction(name: &str) -> CommandDecl {
    CommandDecl::new(name)
        .with_parameters(vec![group(), group()])
        .math()
}
