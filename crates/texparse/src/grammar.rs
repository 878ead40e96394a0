//! Command and environment declarations.
//!
//! The engine knows nothing about individual commands. What `\def` or
//! `\begin{verbatim}` look like is described by declarations held in a [Registry],
//! which the parser consults every time it reads a control sequence or an
//! environment name. Declarations are plain data: a parameter pattern built from
//! [Pattern] nodes, a content grammar and an optional [Effect] that the parser applies
//! once the whole command has matched.
//!
//! The free functions at the bottom of this module ([optional], [choice], [repeat],
//! ...) build patterns and are meant to be glob imported by grammar definitions:
//!
//! ```
//! use texparse::grammar::*;
//! let def = CommandDecl::new("def")
//!     .with_parameters(vec![
//!         choice(token(TokenClass::ActiveCharacter), token(TokenClass::ControlSequence)),
//!         repeat(choice(
//!             token(TokenClass::ParameterRef),
//!             choice(token(TokenClass::Text), token(TokenClass::ControlSequence)),
//!         )),
//!         Pattern::NilGroup,
//!     ])
//!     .with_effect(Effect::Define)
//!     .local();
//! assert_eq!(def.name(), "def");
//! ```

use crate::scope::{GroupKind, Locality, Mode};
use crate::token::CatCodeRange;
use std::collections::HashMap;
use std::rc::Rc;

/// A class of tokens that a [Pattern::TokenRef] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    /// Any single token other than a group delimiter, read with the
    /// mode-relative rule of [Mode::skips].
    Token,
    /// A TeX undelimited argument: a single token or a braced group, whose
    /// contents are parsed in the current mode.
    Argument,
    ControlSequence,
    ActiveCharacter,
    /// `#1` ... `#9` or `##`.
    ParameterRef,
    /// A run of letter and other characters.
    Text,
    /// A TeX integer: decimal, `"` hexadecimal, `'` octal or a `` ` `` character code.
    Number,
    /// A file name, braced or terminated by a space.
    FileName,
}

/// A specific token that a [Pattern::Literal] requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// A letter or other character.
    Char(char),
    ControlSequence(String),
}

/// Parameter pattern AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Literal(Literal),
    TokenRef(TokenClass),
    /// Zero-width when the inner pattern does not match.
    Optional(Box<Pattern>),
    /// The first alternative that matches.
    Choice(Box<Pattern>, Box<Pattern>),
    /// Greedy repetition, zero or more times.
    Repeat(Box<Pattern>),
    Sequence(Vec<Pattern>),
    /// A balanced `{ ... }` group whose interior matches the inner pattern.
    DelimitedGroup(Box<Pattern>),
    /// A `[ ... ]` group whose interior matches the inner pattern.
    BracketGroup(Box<Pattern>),
    /// Inside a group: ordinary content up to the closing delimiter, parsed in the
    /// given mode or the current one.
    Content(Option<Mode>),
    /// Inside a group: an unparsed balanced token list up to the closing delimiter.
    Tokens,
    /// Raw text between two occurrences of a delimiter character.
    Verbatim,
    /// The end of a definition's parameter text. Matches the body group; everything
    /// matched between the defined name and the body becomes the parameter text.
    NilGroup,
}

/// What a command does to the parser state after it has matched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    None,
    /// `\begingroup`, `\bgroup`.
    EnterScope(GroupKind),
    /// `\endgroup`, `\egroup`.
    ExitScope(GroupKind),
    /// Assign fixed catcodes, e.g. `\makeatletter`.
    CatCodes(Vec<CatCodeRange>),
    /// `\catcode <char code> = <category>`.
    CatCodeAssignment,
    /// Bind the defined name to a macro built from the parameter text and body.
    Define,
    /// `\let`.
    Let,
    /// `\newcommand` and friends: a macro with a number of undelimited parameters.
    NewCommand,
    /// `\global`: the next assignment is global.
    GlobalPrefix,
    /// `\input`: resolve the file name argument and parse the file.
    Input,
    /// `\expandafter`.
    ExpandAfter,
    /// `\string`.
    Stringify,
    /// `\begin`.
    BeginEnvironment,
    /// `\end`.
    EndEnvironment,
    /// `\(` and `\[`; the mode is the math mode entered.
    OpenMath(Mode),
    /// `\)` and `\]`.
    CloseMath(Mode),
    /// Register (`true`) or remove (`false`) a short verbatim delimiter.
    ShortVerb(bool),
    /// `\par`.
    Paragraph,
}

/// The modes in which a declaration is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModeAffinity {
    #[default]
    Common,
    /// Vertical and text mode.
    Text,
    /// Inline and display math.
    Math,
}

impl ModeAffinity {
    pub fn admits(self, mode: Mode) -> bool {
        match self {
            ModeAffinity::Common => true,
            ModeAffinity::Text => !mode.is_math(),
            ModeAffinity::Math => mode.is_math(),
        }
    }
}

/// Declaration of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDecl {
    name: String,
    label: Rc<str>,
    affinity: ModeAffinity,
    locality: Locality,
    parameters: Vec<Pattern>,
    effect: Effect,
    cat_codes: Vec<CatCodeRange>,
}

impl CommandDecl {
    /// A command with no parameters and no effect, labelled by its name.
    pub fn new(name: &str) -> CommandDecl {
        CommandDecl {
            name: name.into(),
            label: name.into(),
            affinity: ModeAffinity::Common,
            locality: Locality::Global,
            parameters: vec![],
            effect: Effect::None,
            cat_codes: vec![],
        }
    }

    /// Set the label used in the parse tree. Commands sharing a rule share a label.
    pub fn with_label(mut self, label: &str) -> CommandDecl {
        self.label = label.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Pattern>) -> CommandDecl {
        self.parameters = parameters;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> CommandDecl {
        self.effect = effect;
        self
    }

    /// Catcodes in force while the arguments are matched.
    pub fn with_cat_codes(mut self, cat_codes: Vec<CatCodeRange>) -> CommandDecl {
        self.cat_codes = cat_codes;
        self
    }

    pub fn text(mut self) -> CommandDecl {
        self.affinity = ModeAffinity::Text;
        self
    }

    pub fn math(mut self) -> CommandDecl {
        self.affinity = ModeAffinity::Math;
        self
    }

    /// The command's assignments are confined to the current scope.
    pub fn local(mut self) -> CommandDecl {
        self.locality = Locality::Local;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &Rc<str> {
        &self.label
    }

    pub fn affinity(&self) -> ModeAffinity {
        self.affinity
    }

    pub fn locality(&self) -> Locality {
        self.locality
    }

    pub fn parameters(&self) -> &[Pattern] {
        &self.parameters
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    pub fn cat_codes(&self) -> &[CatCodeRange] {
        &self.cat_codes
    }
}

/// How the body of an environment is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentGrammar {
    /// Ordinary content, parsed recursively.
    #[default]
    Parse,
    /// Raw text up to `\end{name}`.
    Verbatim,
}

/// Declaration of an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDecl {
    name: String,
    label: Rc<str>,
    affinity: ModeAffinity,
    mode: Option<Mode>,
    bare: bool,
    begin_parameters: Vec<Pattern>,
    content: ContentGrammar,
    end_parameters: Vec<Pattern>,
    cat_codes: Vec<CatCodeRange>,
}

impl EnvironmentDecl {
    pub fn new(name: &str) -> EnvironmentDecl {
        EnvironmentDecl {
            name: name.into(),
            label: name.into(),
            affinity: ModeAffinity::Common,
            mode: None,
            bare: false,
            begin_parameters: vec![],
            content: ContentGrammar::Parse,
            end_parameters: vec![],
            cat_codes: vec![],
        }
    }

    pub fn with_label(mut self, label: &str) -> EnvironmentDecl {
        self.label = label.into();
        self
    }

    /// The mode the content is parsed in.
    pub fn with_mode(mut self, mode: Mode) -> EnvironmentDecl {
        self.mode = Some(mode);
        self
    }

    pub fn with_begin_parameters(mut self, parameters: Vec<Pattern>) -> EnvironmentDecl {
        self.begin_parameters = parameters;
        self
    }

    pub fn with_end_parameters(mut self, parameters: Vec<Pattern>) -> EnvironmentDecl {
        self.end_parameters = parameters;
        self
    }

    pub fn with_cat_codes(mut self, cat_codes: Vec<CatCodeRange>) -> EnvironmentDecl {
        self.cat_codes = cat_codes;
        self
    }

    pub fn verbatim(mut self) -> EnvironmentDecl {
        self.content = ContentGrammar::Verbatim;
        self
    }

    /// The tree node records only which declaration matched, not the name.
    pub fn bare(mut self) -> EnvironmentDecl {
        self.bare = true;
        self
    }

    pub fn text(mut self) -> EnvironmentDecl {
        self.affinity = ModeAffinity::Text;
        self
    }

    pub fn math(mut self) -> EnvironmentDecl {
        self.affinity = ModeAffinity::Math;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &Rc<str> {
        &self.label
    }

    pub fn affinity(&self) -> ModeAffinity {
        self.affinity
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn is_bare(&self) -> bool {
        self.bare
    }

    pub fn begin_parameters(&self) -> &[Pattern] {
        &self.begin_parameters
    }

    pub fn content(&self) -> ContentGrammar {
        self.content
    }

    pub fn end_parameters(&self) -> &[Pattern] {
        &self.end_parameters
    }

    pub fn cat_codes(&self) -> &[CatCodeRange] {
        &self.cat_codes
    }
}

/// A set of declarations, immutable while a parse is running.
///
/// A name can carry several declarations with different mode affinities; lookups
/// return the first one, in insertion order, that admits the current mode.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: HashMap<String, Vec<CommandDecl>>,
    environments: HashMap<String, Vec<EnvironmentDecl>>,
}

impl Registry {
    pub fn new() -> Registry {
        Default::default()
    }

    pub fn add_command(&mut self, decl: CommandDecl) {
        self.commands.entry(decl.name.clone()).or_default().push(decl);
    }

    pub fn add_environment(&mut self, decl: EnvironmentDecl) {
        self.environments
            .entry(decl.name.clone())
            .or_default()
            .push(decl);
    }

    pub fn with_commands<I: IntoIterator<Item = CommandDecl>>(mut self, decls: I) -> Registry {
        for decl in decls {
            self.add_command(decl);
        }
        self
    }

    pub fn with_environments<I: IntoIterator<Item = EnvironmentDecl>>(
        mut self,
        decls: I,
    ) -> Registry {
        for decl in decls {
            self.add_environment(decl);
        }
        self
    }

    /// Add every declaration of another registry after this one's.
    pub fn merge(&mut self, other: Registry) {
        for (_, decls) in other.commands {
            for decl in decls {
                self.add_command(decl);
            }
        }
        for (_, decls) in other.environments {
            for decl in decls {
                self.add_environment(decl);
            }
        }
    }

    pub fn command(&self, name: &str, mode: Mode) -> Option<&CommandDecl> {
        self.commands
            .get(name)?
            .iter()
            .find(|decl| decl.affinity.admits(mode))
    }

    pub fn environment(&self, name: &str, mode: Mode) -> Option<&EnvironmentDecl> {
        self.environments
            .get(name)?
            .iter()
            .find(|decl| decl.affinity.admits(mode))
    }

    /// All command names, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// All environment names, sorted.
    pub fn environment_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.environments.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.environments.is_empty()
    }
}

pub fn token(class: TokenClass) -> Pattern {
    Pattern::TokenRef(class)
}

pub fn literal(c: char) -> Pattern {
    Pattern::Literal(Literal::Char(c))
}

pub fn optional(pattern: Pattern) -> Pattern {
    Pattern::Optional(Box::new(pattern))
}

pub fn choice(first: Pattern, second: Pattern) -> Pattern {
    Pattern::Choice(Box::new(first), Box::new(second))
}

pub fn repeat(pattern: Pattern) -> Pattern {
    Pattern::Repeat(Box::new(pattern))
}

pub fn seq(patterns: Vec<Pattern>) -> Pattern {
    Pattern::Sequence(patterns)
}

/// `{ ... }` with ordinary content in the current mode.
pub fn group() -> Pattern {
    Pattern::DelimitedGroup(Box::new(Pattern::Content(None)))
}

/// `{ ... }` with ordinary content parsed in `mode`.
pub fn group_in(mode: Mode) -> Pattern {
    Pattern::DelimitedGroup(Box::new(Pattern::Content(Some(mode))))
}

/// `{ ... }` holding an unparsed token list.
pub fn token_group() -> Pattern {
    Pattern::DelimitedGroup(Box::new(Pattern::Tokens))
}

/// `[ ... ]` with ordinary content.
pub fn brack_group() -> Pattern {
    Pattern::BracketGroup(Box::new(Pattern::Content(None)))
}
