//! The LaTeX kernel and the commands of its standard document classes.

use texparse::grammar::*;
use texparse::scope::Mode;
use texparse::token::{CatCode, CatCodeRange};

const SECTIONING_COMMANDS: [&str; 10] = [
    "part",
    "chapter",
    "section",
    "subsection",
    "subsubsection",
    "paragraph",
    "subparagraph",
    "addchap",
    "addsec",
    "addpart",
];

/// Font commands whose argument is typeset as text, in any mode.
const TEXT_STYLE_COMMANDS: [&str; 14] = [
    "textbf",
    "textit",
    "textmd",
    "textnormal",
    "textrm",
    "textsc",
    "textsf",
    "textsl",
    "texttt",
    "textup",
    "emph",
    "text",
    "mbox",
    "fbox",
];

const CITATION_COMMANDS: [&str; 10] = [
    "cite", "citep", "citet", "citeauthor", "citeyear", "nocite", "parencite", "textcite",
    "autocite", "footcite",
];

const PACKAGE_COMMANDS: [&str; 4] = ["usepackage", "documentclass", "RequirePackage", "LoadClass"];

const PROVIDES_COMMANDS: [&str; 3] = ["ProvidesPackage", "ProvidesClass", "ProvidesFile"];

const NEWCOMMAND_COMMANDS: [&str; 4] = [
    "newcommand",
    "renewcommand",
    "providecommand",
    "DeclareRobustCommand",
];

const AT_LETTER: CatCodeRange = CatCodeRange::single('@', CatCode::Letter);
const AT_OTHER: CatCodeRange = CatCodeRange::single('@', CatCode::Other);

pub fn registry() -> Registry {
    Registry::new()
        .with_commands([
            CommandDecl::new("begin").with_effect(Effect::BeginEnvironment),
            CommandDecl::new("end").with_effect(Effect::EndEnvironment),
        ])
        .with_commands(math_shifts())
        .with_commands(catcode_switches())
        .with_commands(definitions())
        .with_commands(SECTIONING_COMMANDS.map(sectioning))
        .with_commands(TEXT_STYLE_COMMANDS.map(|name| one_argument(name, Mode::Text)))
        .with_commands([one_argument("ensuremath", Mode::Math)])
        .with_commands(CITATION_COMMANDS.map(citation))
        .with_commands(PACKAGE_COMMANDS.map(package))
        .with_commands(references())
        .with_commands(misc())
        .with_commands(verbatim_commands())
        .with_environments(environments())
}

fn math_shifts() -> [CommandDecl; 4] {
    [
        CommandDecl::new("(").with_effect(Effect::OpenMath(Mode::Math)),
        CommandDecl::new(")").with_effect(Effect::CloseMath(Mode::Math)),
        CommandDecl::new("[").with_effect(Effect::OpenMath(Mode::DisplayMath)),
        CommandDecl::new("]").with_effect(Effect::CloseMath(Mode::DisplayMath)),
    ]
}

fn catcode_switches() -> Vec<CommandDecl> {
    let mut decls = vec![
        CommandDecl::new("makeatletter")
            .with_effect(Effect::CatCodes(vec![AT_LETTER]))
            .local(),
        CommandDecl::new("makeatother")
            .with_effect(Effect::CatCodes(vec![AT_OTHER]))
            .local(),
        CommandDecl::new("obeycr")
            .with_effect(Effect::CatCodes(vec![CatCodeRange::single(
                '\n',
                CatCode::Active,
            )]))
            .local(),
        CommandDecl::new("restorecr")
            .with_effect(Effect::CatCodes(vec![CatCodeRange::single(
                '\n',
                CatCode::EndOfLine,
            )]))
            .local(),
    ];
    decls.extend(PROVIDES_COMMANDS.map(|name| {
        CommandDecl::new(name)
            .with_parameters(vec![group(), optional(brack_group())])
            .with_effect(Effect::CatCodes(vec![AT_LETTER]))
            .local()
    }));
    decls
}

/// `\newcommand` and friends: a name, an optional parameter count, an optional
/// default for the first parameter and a body.
fn definitions() -> Vec<CommandDecl> {
    let mut decls: Vec<CommandDecl> = NEWCOMMAND_COMMANDS
        .into_iter()
        .map(|name| {
            CommandDecl::new(name)
                .with_parameters(vec![
                    optional(literal('*')),
                    choice(
                        token(TokenClass::ControlSequence),
                        Pattern::DelimitedGroup(Box::new(token(TokenClass::ControlSequence))),
                    ),
                    optional(Pattern::BracketGroup(Box::new(token(TokenClass::Number)))),
                    optional(Pattern::BracketGroup(Box::new(Pattern::Tokens))),
                    token_group(),
                ])
                .with_effect(Effect::NewCommand)
                .local()
        })
        .collect();
    decls.extend(["newenvironment", "renewenvironment"].map(|name| {
        CommandDecl::new(name).with_parameters(vec![
            optional(literal('*')),
            token_group(),
            optional(Pattern::BracketGroup(Box::new(token(TokenClass::Number)))),
            optional(Pattern::BracketGroup(Box::new(Pattern::Tokens))),
            token_group(),
            token_group(),
        ])
    }));
    decls
}

fn sectioning(name: &str) -> CommandDecl {
    CommandDecl::new(name)
        .with_parameters(vec![
            optional(literal('*')),
            optional(brack_group()),
            group(),
        ])
        .text()
}

fn one_argument(name: &str, mode: Mode) -> CommandDecl {
    CommandDecl::new(name).with_parameters(vec![group_in(mode)])
}

fn citation(name: &str) -> CommandDecl {
    CommandDecl::new(name)
        .with_label("citation")
        .with_parameters(vec![
            optional(brack_group()),
            optional(brack_group()),
            token_group(),
        ])
}

fn package(name: &str) -> CommandDecl {
    CommandDecl::new(name).with_parameters(vec![optional(brack_group()), token_group()])
}

fn references() -> Vec<CommandDecl> {
    let mut decls = vec![CommandDecl::new("label").with_parameters(vec![token_group()])];
    decls.extend(["ref", "eqref", "pageref", "autoref", "cref"].map(|name| {
        CommandDecl::new(name)
            .with_label("reference")
            .with_parameters(vec![token_group()])
    }));
    decls.push(CommandDecl::new("url").with_parameters(vec![token_group()]));
    decls.push(CommandDecl::new("href").with_parameters(vec![token_group(), group()]));
    decls
}

fn misc() -> Vec<CommandDecl> {
    vec![
        CommandDecl::new("item")
            .with_parameters(vec![optional(brack_group())])
            .text(),
        CommandDecl::new("footnote").with_parameters(vec![optional(brack_group()), group()]),
        CommandDecl::new("title").with_parameters(vec![optional(brack_group()), group()]),
        CommandDecl::new("author").with_parameters(vec![optional(brack_group()), group()]),
        CommandDecl::new("date").with_parameters(vec![group()]),
        CommandDecl::new("thanks").with_parameters(vec![group()]),
        CommandDecl::new("caption").with_parameters(vec![optional(brack_group()), group()]),
    ]
}

fn verbatim_commands() -> Vec<CommandDecl> {
    let mut decls = vec![CommandDecl::new("verb")
        .with_parameters(vec![optional(literal('*')), Pattern::Verbatim])];
    for (name, active) in [
        ("MakeShortVerb", true),
        ("DefineShortVerb", true),
        ("DeleteShortVerb", false),
        ("UndefineShortVerb", false),
    ] {
        decls.push(
            CommandDecl::new(name)
                .with_parameters(vec![optional(literal('*')), token(TokenClass::Argument)])
                .with_effect(Effect::ShortVerb(active)),
        );
    }
    decls
}

fn environments() -> Vec<EnvironmentDecl> {
    let mut decls: Vec<EnvironmentDecl> = ["document", "itemize", "enumerate", "description"]
        .map(EnvironmentDecl::new)
        .into();
    decls.extend(["figure", "figure*", "table", "table*"].map(|name| {
        EnvironmentDecl::new(name)
            .with_label(name.trim_end_matches('*'))
            .with_begin_parameters(vec![optional(Pattern::BracketGroup(Box::new(
                token(TokenClass::Text),
            )))])
            .text()
    }));
    decls.push(
        EnvironmentDecl::new("tabular").with_begin_parameters(vec![
            optional(Pattern::BracketGroup(Box::new(token(TokenClass::Text)))),
            token_group(),
        ]),
    );
    decls.extend([
        EnvironmentDecl::new("math").with_mode(Mode::Math).text(),
        EnvironmentDecl::new("displaymath")
            .with_mode(Mode::DisplayMath)
            .text(),
    ]);
    decls
}
