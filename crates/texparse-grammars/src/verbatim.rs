//! Verbatim environments and inline verbatim commands from `verbatim`, `comment`,
//! `fancyvrb`, `listings`, `minted` and `filecontents`.

use texparse::grammar::*;

/// `fancyvrb` environments; each also has a starred form.
const FANCYVRB_ENVIRONMENTS: [&str; 3] = ["Verbatim", "BVerbatim", "LVerbatim"];

pub fn registry() -> Registry {
    let mut registry = Registry::new()
        .with_environments([
            EnvironmentDecl::new("verbatim").verbatim().bare(),
            EnvironmentDecl::new("verbatim*")
                .with_label("verbatim")
                .verbatim()
                .bare(),
            EnvironmentDecl::new("comment").verbatim().bare(),
            EnvironmentDecl::new("lstlisting")
                .with_begin_parameters(vec![optional(brack_group())])
                .verbatim(),
            EnvironmentDecl::new("minted")
                .with_begin_parameters(vec![optional(brack_group()), token(TokenClass::Argument)])
                .verbatim()
                .bare(),
        ])
        .with_environments(["filecontents", "filecontents*"].map(|name| {
            EnvironmentDecl::new(name)
                .with_label("filecontents")
                .with_begin_parameters(vec![optional(brack_group()), token(TokenClass::Argument)])
                .verbatim()
        }))
        .with_commands([
            CommandDecl::new("lstinline")
                .with_parameters(vec![optional(brack_group()), Pattern::Verbatim])
                .text(),
            inline_minted("mint"),
            inline_minted("mintinline"),
        ]);
    for name in FANCYVRB_ENVIRONMENTS {
        for full_name in [name.to_string(), format!("{name}*")] {
            registry.add_environment(
                EnvironmentDecl::new(&full_name)
                    .with_label(name)
                    .with_begin_parameters(vec![optional(brack_group())])
                    .verbatim(),
            );
        }
    }
    registry
}

fn inline_minted(name: &str) -> CommandDecl {
    CommandDecl::new(name)
        .with_label("minted")
        .with_parameters(vec![
            optional(brack_group()),
            token(TokenClass::Argument),
            Pattern::Verbatim,
        ])
        .text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use texparse::Kind;
    use texparse_testing::*;

    fn verbatim_packages() -> Registry {
        let mut merged = crate::latex::registry();
        merged.merge(registry());
        merged
    }

    test_suite![
        options(TestOption::Registry(verbatim_packages)),
        sexp_tests(
            (
                mint,
                r"\mint{python}|print(1)|",
                r#"(document (minted (argument "p" "y" "t" "h" "o" "n") (verbatim "print(1)")))"#
            ),
            (
                mint_first_delimiter_wins,
                r"\mint{python}|a|b|",
                r#"(document (minted (argument "p" "y" "t" "h" "o" "n") (verbatim "a")) "b" "|")"#
            ),
            (
                lstinline,
                r"\lstinline[language=C]!x{!",
                r#"(document (lstinline (brack_group "l" "a" "n" "g" "u" "a" "g" "e" "=" "C") (verbatim "x{")))"#
            ),
        ),
        diagnostic_tests(
            (verbatim, r"\begin{verbatim}\x{ $\end{verbatim}", []),
            (verbatim_star, r"\begin{verbatim*} a \end{verbatim*}", []),
            (
                verbatim_star_mismatch,
                r"\begin{verbatim}x\end{verbatim*}",
                [Kind::EnvironmentNameMismatch]
            ),
            (
                verbatim_ends_at_spaced_end,
                r"\begin{verbatim}x\end {verbatim}",
                []
            ),
            (unterminated_verbatim, r"\begin{verbatim}\x", [Kind::UnterminatedVerbatim]),
            (comment, r"\begin{comment}}{\end{comment}", []),
            (fancyvrb, r"\begin{Verbatim}[numbers=left]$\end{Verbatim}", []),
            (fancyvrb_star, r"\begin{BVerbatim*}$\end{BVerbatim*}", []),
            (lstlisting, r"\begin{lstlisting}[language=C]int x;}\end{lstlisting}", []),
            (minted, "\\begin{minted}{python}\nprint('{')\n\\end{minted}", []),
            (filecontents, r"\begin{filecontents*}{a.tex}\def\end{filecontents*}", []),
            (unterminated_mint, "\\mint{python}|print\n|", [Kind::UnterminatedVerbatim]),
        ),
        reparse_tests(
            (reparse_opens_verbatim, r"a \begin{verbatim}x\end{verbatim} {b}", 0..1, r"\begin{verbatim}"),
            (reparse_inside_verbatim, r"\begin{verbatim}x\end{verbatim}{b}", 16..17, "}"),
        ),
    ];
}
