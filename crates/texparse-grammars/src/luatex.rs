//! Lua code in LuaTeX documents, and the `alltt` environment.
//!
//! Each of these reads its content under its own catcode table, which only lasts for
//! the environment or the argument.

use texparse::grammar::*;
use texparse::token::{CatCode, CatCodeRange};

/// Catcodes inside the `luacode` environment: only escape, grouping and letters keep
/// their meaning.
const LUACODE: [CatCodeRange; 11] = [
    CatCodeRange::new('\u{1}', '@', CatCode::Other),
    CatCodeRange::new('A', 'Z', CatCode::Letter),
    CatCodeRange::single('[', CatCode::Other),
    CatCodeRange::single('\\', CatCode::Escape),
    CatCodeRange::new(']', '`', CatCode::Other),
    CatCodeRange::new('a', 'z', CatCode::Letter),
    CatCodeRange::single('{', CatCode::BeginGroup),
    CatCodeRange::single('|', CatCode::Other),
    CatCodeRange::single('}', CatCode::EndGroup),
    CatCodeRange::single('~', CatCode::Other),
    CatCodeRange::single('\u{7f}', CatCode::Invalid),
];

/// Catcodes inside the argument of `\luadirect` and `\directlua`.
const LUADIRECT: [CatCodeRange; 15] = [
    CatCodeRange::new('\u{1}', '\t', CatCode::EndOfLine),
    CatCodeRange::single('\n', CatCode::EndOfLine),
    CatCodeRange::new('\u{b}', '$', CatCode::Other),
    CatCodeRange::single('%', CatCode::Comment),
    CatCodeRange::new('&', '@', CatCode::Other),
    CatCodeRange::new('A', 'Z', CatCode::Letter),
    CatCodeRange::single('[', CatCode::Other),
    CatCodeRange::single('\\', CatCode::Escape),
    CatCodeRange::new(']', '`', CatCode::Other),
    CatCodeRange::new('a', 'z', CatCode::Letter),
    CatCodeRange::single('{', CatCode::BeginGroup),
    CatCodeRange::single('|', CatCode::Other),
    CatCodeRange::single('}', CatCode::EndGroup),
    CatCodeRange::single('~', CatCode::Active),
    CatCodeRange::single('\u{7f}', CatCode::Invalid),
];

const ALLTT: [CatCodeRange; 14] = [
    CatCodeRange::single('\t', CatCode::Other),
    CatCodeRange::single(' ', CatCode::Other),
    CatCodeRange::single('#', CatCode::Other),
    CatCodeRange::single('$', CatCode::Other),
    CatCodeRange::single('%', CatCode::Other),
    CatCodeRange::single('&', CatCode::Other),
    CatCodeRange::single('^', CatCode::Other),
    CatCodeRange::single('_', CatCode::Other),
    CatCodeRange::single('~', CatCode::Other),
    CatCodeRange::new('A', 'Z', CatCode::Letter),
    CatCodeRange::new('a', 'z', CatCode::Letter),
    CatCodeRange::single('\\', CatCode::Escape),
    CatCodeRange::single('{', CatCode::BeginGroup),
    CatCodeRange::single('}', CatCode::EndGroup),
];

pub fn registry() -> Registry {
    Registry::new()
        .with_environments([
            EnvironmentDecl::new("luacode").with_cat_codes(LUACODE.to_vec()),
            EnvironmentDecl::new("luacode*")
                .with_label("luacode")
                .verbatim()
                .bare()
                .text(),
            EnvironmentDecl::new("alltt")
                .with_cat_codes(ALLTT.to_vec())
                .text(),
        ])
        .with_commands(
            ["luadirect", "directlua", "latelua"].map(|name| lua_command(name, LUADIRECT.to_vec())),
        )
        .with_commands([lua_command("luaexec", luaexec_cat_codes())])
}

/// `\luaexec` reads its argument like `\luadirect`, except that `~` is not active.
fn luaexec_cat_codes() -> Vec<CatCodeRange> {
    let mut cat_codes = LUADIRECT.to_vec();
    cat_codes.push(CatCodeRange::single('~', CatCode::Other));
    cat_codes
}

fn lua_command(name: &str, cat_codes: Vec<CatCodeRange>) -> CommandDecl {
    CommandDecl::new(name)
        .with_label("lua")
        .with_parameters(vec![token_group()])
        .with_cat_codes(cat_codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use texparse::Kind;
    use texparse_testing::*;

    fn lua() -> Registry {
        let mut merged = crate::latex::registry();
        merged.merge(registry());
        merged
    }

    test_suite![
        options(TestOption::Registry(lua)),
        sexp_tests(
            (
                luaexec_keeps_hash,
                r"\luaexec{#}",
                r##"(document (lua (body "#")))"##
            ),
            (
                alltt_keeps_dollars_as_text,
                r"\begin{alltt}$\end{alltt}",
                r#"(document (environment alltt (begin \begin "a" "l" "l" "t" "t") "$" (end \end "a" "l" "l" "t" "t")))"#
            ),
        ),
        diagnostic_tests(
            (luacode, r#"\begin{luacode}local s = "%" .. #t\end{luacode}"#, []),
            (luacode_star, r"\begin{luacode*}\x{\end{luacode*}", []),
            (luacode_star_mismatch, r"\begin{luacode*}x\end{luacode}", [Kind::EnvironmentNameMismatch]),
            (directlua_comment, "\\directlua{x = 1 % }\n}", []),
            (catcodes_end_with_environment, r"\begin{alltt}$\end{alltt}$x$", []),
            (catcodes_end_with_argument, r"\luaexec{#}$x", [Kind::UnterminatedMath]),
        ),
    ];
}
