//! Tokens, spans and category codes.
//!
//! Every token remembers the byte range of the source it was lexed from. Tokens
//! that TeX itself would never produce (comments, blanks skipped after a control
//! word, ignored characters) are still emitted so that the concatenation of all
//! token lexemes is the original source.

mod catcode;
pub mod lexer;

pub use catcode::{CatCode, CatCodeRange, CatCodeTable};
use std::num;
use texparse_stdext::collections::interner;

/// A half-open byte range `[start, end)` in a source string.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    pub fn empty(pos: usize) -> Span {
        Span {
            start: pos,
            end: pos,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both spans.
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Move the span by a signed byte offset.
    pub fn shifted(self, delta: isize) -> Span {
        Span {
            start: self.start.saturating_add_signed(delta),
            end: self.end.saturating_add_signed(delta),
        }
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Control sequence name.
///
/// The implementation is opaque; names are resolved to strings through a [CsNameInterner].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsName(num::NonZeroU32);

/// String interner for control sequence names.
pub type CsNameInterner = interner::Interner<CsName>;

impl interner::Key for CsName {
    fn try_from_usize(index: usize) -> Option<Self> {
        num::NonZeroU32::try_from_usize(index).map(CsName)
    }

    fn into_usize(self) -> usize {
        self.0.into_usize()
    }
}

/// Kinds of comments that carry meaning for tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommentKind {
    Plain,
    /// `%:` section tags, as used by editors for outlines.
    Tag,
    /// `% arara: ...` build directives.
    Arara,
    /// `% !TeX key = value` magic comments.
    Magic,
    /// `% !BIB key = value` magic comments.
    Bib,
}

impl CommentKind {
    /// Classify the text of a comment, starting at the comment character.
    pub fn classify(comment: &str) -> CommentKind {
        let mut chars = comment.chars();
        chars.next();
        let body = chars.as_str();
        if body.starts_with(':') {
            return CommentKind::Tag;
        }
        let body = body.trim_start_matches([' ', '\t']);
        if starts_with_ignore_case(body, "arara:") {
            return CommentKind::Arara;
        }
        let Some(rest) = body.strip_prefix('!') else {
            return CommentKind::Plain;
        };
        let (kind, keyword) = if starts_with_ignore_case(rest, "tex") {
            (CommentKind::Magic, 3)
        } else if starts_with_ignore_case(rest, "bib") {
            (CommentKind::Bib, 3)
        } else {
            return CommentKind::Plain;
        };
        match rest[keyword..].chars().next() {
            None | Some(' ') | Some('\t') | Some('\n') | Some('\r') => kind,
            _ => CommentKind::Plain,
        }
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// The value of a token.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    BeginGroup(char),
    EndGroup(char),
    MathShift(char),
    AlignmentTab(char),
    Parameter(char),
    Superscript(char),
    Subscript(char),
    Space(char),
    Letter(char),
    Other(char),
    CommandRef(CommandRef),
    /// A blank line: a run of whitespace holding two or more end-of-line characters.
    Par,
    /// Input that TeX's input processor drops: catcode 9 characters and blanks
    /// skipped after control words and comments.
    Ignored(char),
    Comment(CommentKind),
    Invalid(char),
}

/// The value of a token that references a command
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandRef {
    ControlSequence(CsName),
    ActiveCharacter(char),
}

impl CommandRef {
    pub fn to_string(&self, cs_name_interner: &CsNameInterner) -> String {
        match self {
            CommandRef::ControlSequence(cs_name) => {
                format!("\\{}", cs_name_interner.resolve(*cs_name).unwrap_or("?"))
            }
            CommandRef::ActiveCharacter(c) => format!("{c}"),
        }
    }
}

impl Value {
    /// Build the value of a character token.
    ///
    /// Returns [None] for the categories that never form character tokens.
    pub fn new(c: char, cat_code: CatCode) -> Option<Value> {
        Some(match cat_code {
            CatCode::BeginGroup => Value::BeginGroup(c),
            CatCode::EndGroup => Value::EndGroup(c),
            CatCode::MathShift => Value::MathShift(c),
            CatCode::AlignmentTab => Value::AlignmentTab(c),
            CatCode::Parameter => Value::Parameter(c),
            CatCode::Superscript => Value::Superscript(c),
            CatCode::Subscript => Value::Subscript(c),
            CatCode::Space => Value::Space(c),
            CatCode::Letter => Value::Letter(c),
            CatCode::Other => Value::Other(c),
            CatCode::Active => Value::CommandRef(CommandRef::ActiveCharacter(c)),
            CatCode::Ignored => Value::Ignored(c),
            CatCode::Invalid => Value::Invalid(c),
            CatCode::Escape | CatCode::EndOfLine | CatCode::Comment => return None,
        })
    }
}

/// A TeX token.
///
/// Equality compares values only: two `\x` tokens from different places are equal.
#[derive(Debug, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    value: Value,
    span: Span,
    synthetic: bool,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

macro_rules! token_constructor {
    ($name: ident, $value: expr) => {
        pub fn $name(c: char, span: Span) -> Token {
            Token::new(($value)(c), span)
        }
    };
}

impl Token {
    pub fn new(value: Value, span: Span) -> Token {
        Token {
            value,
            span,
            synthetic: false,
        }
    }

    token_constructor!(new_begin_group, Value::BeginGroup);
    token_constructor!(new_end_group, Value::EndGroup);
    token_constructor!(new_space, Value::Space);
    token_constructor!(new_letter, Value::Letter);
    token_constructor!(new_other, Value::Other);

    pub fn new_control_sequence(name: CsName, span: Span) -> Token {
        Token::new(Value::CommandRef(CommandRef::ControlSequence(name)), span)
    }

    /// The same token, marked as produced by expansion rather than read from the source.
    pub fn into_synthetic(mut self) -> Token {
        self.synthetic = true;
        self
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.span
    }

    /// Whether the token was produced by expansion. Synthetic tokens are not part
    /// of the source text.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn shifted(mut self, delta: isize) -> Token {
        self.span = self.span.shifted(delta);
        self
    }

    /// The raw text of the token.
    pub fn lexeme<'a>(&self, source: &'a str) -> &'a str {
        self.span.slice(source)
    }

    pub fn char(&self) -> Option<char> {
        match self.value {
            Value::BeginGroup(c)
            | Value::EndGroup(c)
            | Value::MathShift(c)
            | Value::AlignmentTab(c)
            | Value::Parameter(c)
            | Value::Superscript(c)
            | Value::Subscript(c)
            | Value::Space(c)
            | Value::Letter(c)
            | Value::Other(c)
            | Value::Ignored(c)
            | Value::Invalid(c) => Some(c),
            Value::CommandRef(CommandRef::ActiveCharacter(c)) => Some(c),
            Value::CommandRef(CommandRef::ControlSequence(_))
            | Value::Par
            | Value::Comment(_) => None,
        }
    }

    pub fn cat_code(&self) -> Option<CatCode> {
        Some(match self.value {
            Value::BeginGroup(_) => CatCode::BeginGroup,
            Value::EndGroup(_) => CatCode::EndGroup,
            Value::MathShift(_) => CatCode::MathShift,
            Value::AlignmentTab(_) => CatCode::AlignmentTab,
            Value::Parameter(_) => CatCode::Parameter,
            Value::Superscript(_) => CatCode::Superscript,
            Value::Subscript(_) => CatCode::Subscript,
            Value::Space(_) => CatCode::Space,
            Value::Letter(_) => CatCode::Letter,
            Value::Other(_) => CatCode::Other,
            Value::CommandRef(CommandRef::ActiveCharacter(_)) => CatCode::Active,
            Value::Ignored(_) => CatCode::Ignored,
            Value::Comment(_) => CatCode::Comment,
            Value::Invalid(_) => CatCode::Invalid,
            Value::CommandRef(CommandRef::ControlSequence(_)) | Value::Par => return None,
        })
    }

    pub fn command_ref(&self) -> Option<CommandRef> {
        match self.value {
            Value::CommandRef(command_ref) => Some(command_ref),
            _ => None,
        }
    }

    pub fn cs_name(&self) -> Option<CsName> {
        match self.value {
            Value::CommandRef(CommandRef::ControlSequence(name)) => Some(name),
            _ => None,
        }
    }

    /// Tokens that TeX never sees: comments and dropped input.
    pub fn is_ignorable(&self) -> bool {
        matches!(self.value, Value::Ignored(_) | Value::Comment(_))
    }

    pub fn is_space(&self) -> bool {
        matches!(self.value, Value::Space(_))
    }

    /// Whether this is a space token whose text ends a line.
    pub fn ends_line(&self, source: &str) -> bool {
        matches!(self.value, Value::Space(_) | Value::Ignored(_) | Value::Par)
            && self.lexeme(source).contains(['\n', '\r'])
    }

    /// Write the token as TeX would print it.
    pub fn write(&self, interner: &CsNameInterner, out: &mut String) {
        match self.value {
            Value::CommandRef(CommandRef::ControlSequence(name)) => {
                out.push('\\');
                out.push_str(interner.resolve(name).unwrap_or(""));
            }
            Value::Par => out.push_str("\n\n"),
            Value::Comment(_) => out.push('%'),
            _ => {
                if let Some(c) = self.char() {
                    out.push(c)
                }
            }
        }
    }
}

/// Write a token list the way TeX would print it, inserting a space after control
/// words that are followed by a letter.
pub fn write_tokens<'a, T>(tokens: T, interner: &CsNameInterner) -> String
where
    T: IntoIterator<Item = &'a Token>,
{
    let mut out = String::new();
    let mut after_control_word = false;
    for token in tokens {
        if after_control_word && matches!(token.value, Value::Letter(_)) {
            out.push(' ');
        }
        token.write(interner, &mut out);
        after_control_word = match token.cs_name() {
            Some(name) => interner
                .resolve(name)
                .and_then(|s| s.chars().last())
                .map(char::is_alphabetic)
                .unwrap_or(false),
            None => false,
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_span() {
        let a = Token::new_letter('a', Span::new(0, 1));
        let b = Token::new_letter('a', Span::new(7, 8)).into_synthetic();
        assert_eq!(a, b);
        assert_ne!(a, Token::new_other('a', Span::new(0, 1)));
    }

    #[test]
    fn write_tokens_separates_control_words() {
        let mut interner: CsNameInterner = Default::default();
        let name = interner.get_or_intern("relax");
        let symbol = interner.get_or_intern("{");
        let tokens = vec![
            Token::new_control_sequence(name, Span::default()),
            Token::new_letter('a', Span::default()),
            Token::new_control_sequence(symbol, Span::default()),
            Token::new_letter('b', Span::default()),
        ];
        assert_eq!(write_tokens(&tokens, &interner), r"\relax a\{b");
    }

    macro_rules! comment_kind_tests {
        ($( ( $name: ident, $input: expr, $expected: expr ), )+) => {
            $(
            #[test]
            fn $name() {
                assert_eq!(CommentKind::classify($input), $expected);
            }
            )+
        };
    }

    comment_kind_tests![
        (comment_plain, "% just words", CommentKind::Plain),
        (comment_tag, "%: Section one", CommentKind::Tag),
        (comment_arara, "% arara: pdflatex", CommentKind::Arara),
        (comment_arara_no_space, "%ARARA: pdflatex", CommentKind::Arara),
        (comment_magic, "% !TeX program = lualatex", CommentKind::Magic),
        (comment_magic_lowercase, "%!tex root = main.tex", CommentKind::Magic),
        (comment_bib, "% !BIB program = biber", CommentKind::Bib),
        (comment_not_magic, "% !TeXnician", CommentKind::Plain),
        (comment_bang_only, "% !", CommentKind::Plain),
    ];
}
