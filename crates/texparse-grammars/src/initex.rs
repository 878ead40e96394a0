//! TeX primitives: grouping, category codes, definitions and expansion.

use texparse::grammar::*;
use texparse::scope::GroupKind;

/// Commands that take a character code, an optional `=` and a value.
///
/// Only `\catcode` changes how the parser reads the document.
const CODE_COMMANDS: [&str; 7] = [
    "catcode", "lccode", "uccode", "sfcode", "mathcode", "delcode", "kcatcode",
];

/// `\def`-style commands and whether they define globally.
const DEFINITION_COMMANDS: [(&str, bool); 4] = [
    ("def", false),
    ("edef", false),
    ("gdef", true),
    ("xdef", true),
];

pub fn registry() -> Registry {
    Registry::new()
        .with_commands(grouping())
        .with_commands(codes())
        .with_commands(definitions())
        .with_commands([
            get_let(),
            CommandDecl::new("global").with_effect(Effect::GlobalPrefix),
            CommandDecl::new("relax"),
            CommandDecl::new("par").with_effect(Effect::Paragraph),
            CommandDecl::new("expandafter").with_effect(Effect::ExpandAfter),
            CommandDecl::new("string").with_effect(Effect::Stringify),
            CommandDecl::new("left")
                .with_parameters(vec![token(TokenClass::Token)])
                .math(),
            CommandDecl::new("right")
                .with_parameters(vec![token(TokenClass::Token)])
                .math(),
        ])
        .with_commands(["input", "include"].map(get_input))
}

fn grouping() -> [CommandDecl; 4] {
    [
        CommandDecl::new("begingroup").with_effect(Effect::EnterScope(GroupKind::BeginGroup)),
        CommandDecl::new("endgroup").with_effect(Effect::ExitScope(GroupKind::BeginGroup)),
        CommandDecl::new("bgroup").with_effect(Effect::EnterScope(GroupKind::BGroup)),
        CommandDecl::new("egroup").with_effect(Effect::ExitScope(GroupKind::BGroup)),
    ]
}

fn codes() -> impl Iterator<Item = CommandDecl> {
    CODE_COMMANDS.into_iter().map(|name| {
        let decl = CommandDecl::new(name).with_parameters(vec![
            token(TokenClass::Number),
            optional(literal('=')),
            token(TokenClass::Number),
        ]);
        if name == "catcode" {
            decl.with_effect(Effect::CatCodeAssignment).local()
        } else {
            decl
        }
    })
}

/// The parameters shared by every `\def`-style command: the defined name, the
/// parameter text and the body.
pub fn definition_parameters() -> Vec<Pattern> {
    vec![
        choice(
            token(TokenClass::ActiveCharacter),
            token(TokenClass::ControlSequence),
        ),
        repeat(choice(
            token(TokenClass::ParameterRef),
            choice(token(TokenClass::Text), token(TokenClass::ControlSequence)),
        )),
        Pattern::NilGroup,
    ]
}

fn definitions() -> impl Iterator<Item = CommandDecl> {
    DEFINITION_COMMANDS.into_iter().map(|(name, global)| {
        let decl = CommandDecl::new(name)
            .with_label("definition")
            .with_parameters(definition_parameters())
            .with_effect(Effect::Define);
        if global {
            decl
        } else {
            decl.local()
        }
    })
}

/// Get the `\let` command.
pub fn get_let() -> CommandDecl {
    CommandDecl::new("let")
        .with_parameters(vec![
            choice(
                token(TokenClass::ActiveCharacter),
                token(TokenClass::ControlSequence),
            ),
            optional(literal('=')),
            token(TokenClass::Token),
        ])
        .with_effect(Effect::Let)
        .local()
}

fn get_input(name: &str) -> CommandDecl {
    CommandDecl::new(name)
        .with_label("input")
        .with_parameters(vec![token(TokenClass::FileName)])
        .with_effect(Effect::Input)
}
