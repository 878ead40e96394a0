//! The lexer, which turns characters into tokens using the active catcodes.
//!
//! Lexing is "just in time": a token is only produced when the parser asks for it,
//! because commands can change catcodes. In
//! ```tex
//! \makeatletter\foo@bar
//! ```
//! the `@` must be lexed after `\makeatletter` has taken effect, so that `\foo@bar` is a
//! single control sequence. The lexer therefore takes the catcode lookup as an
//! argument on every call instead of owning a table.
//!
//! Unlike TeX's input processor the lexer is lossless: comments, ignored characters and
//! the blanks TeX skips after control words come out as trivia tokens. Every byte of the
//! input belongs to exactly one token.

use crate::token::{CatCode, CatCodeTable, CommandRef, CommentKind, CsNameInterner, Span};
use crate::token::{Token, Value};
use std::rc::Rc;
use texparse_stdext::str::Cursor;

pub trait CatCodeFn {
    fn cat_code(&self, c: char) -> CatCode;
}

impl CatCodeFn for std::collections::HashMap<char, CatCode> {
    fn cat_code(&self, c: char) -> CatCode {
        self.get(&c).copied().unwrap_or_default()
    }
}

impl CatCodeFn for CatCodeTable {
    fn cat_code(&self, c: char) -> CatCode {
        self.get(c)
    }
}

/// The part of the lexer's state that determines what it produces next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerState {
    pub pos: usize,
    /// TeX's state S: blanks are being skipped after a control word or comment.
    pub skip_blanks: bool,
}

/// The lexer.
#[derive(Debug, Clone)]
pub struct Lexer {
    cursor: Cursor,
    skip_blanks: bool,
    // We read control sequence names into a shared buffer to avoid allocating for each one.
    buffer: String,
}

impl Lexer {
    pub fn new(source: Rc<str>) -> Lexer {
        Lexer {
            cursor: Cursor::new(source),
            skip_blanks: false,
            buffer: Default::default(),
        }
    }

    pub fn source(&self) -> &Rc<str> {
        self.cursor.shared_str()
    }

    pub fn pos(&self) -> usize {
        self.cursor.pos()
    }

    /// Furthest byte the lexer has examined; see [Cursor::high_water].
    pub fn high_water(&self) -> usize {
        self.cursor.high_water()
    }

    pub fn state(&self) -> LexerState {
        LexerState {
            pos: self.cursor.pos(),
            skip_blanks: self.skip_blanks,
        }
    }

    pub fn restore(&mut self, state: LexerState) {
        self.cursor.set_pos(state.pos);
        self.skip_blanks = state.skip_blanks;
    }

    /// Raw access to the characters, for scanners that suspend tokenization.
    ///
    /// Moving the cursor resets the skip-blanks state.
    pub fn cursor(&mut self) -> &mut Cursor {
        self.skip_blanks = false;
        &mut self.cursor
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor.is_at_end()
    }

    /// Lex the next token without consuming it.
    pub fn peek<F: CatCodeFn>(
        &mut self,
        cat_code_fn: &F,
        cs_name_interner: &mut CsNameInterner,
    ) -> Option<Token> {
        let state = self.state();
        let token = self.next(cat_code_fn, cs_name_interner);
        self.restore(state);
        token
    }

    pub fn next<F: CatCodeFn>(
        &mut self,
        cat_code_fn: &F,
        cs_name_interner: &mut CsNameInterner,
    ) -> Option<Token> {
        let start = self.cursor.pos();
        let c = self.cursor.next()?;
        let code = cat_code_fn.cat_code(c);
        let value = match code {
            CatCode::Escape => {
                let name = self.read_control_sequence(cat_code_fn, cs_name_interner);
                Value::CommandRef(CommandRef::ControlSequence(name))
            }
            CatCode::EndOfLine | CatCode::Space => {
                let num_new_lines = self.consume_whitespace(c, code, cat_code_fn);
                let value = if num_new_lines >= 2 {
                    Value::Par
                } else if self.skip_blanks {
                    Value::Ignored(c)
                } else {
                    Value::Space(c)
                };
                self.skip_blanks = false;
                value
            }
            CatCode::Comment => {
                while let Some(next) = self.cursor.peek() {
                    if cat_code_fn.cat_code(next) == CatCode::EndOfLine {
                        break;
                    }
                    self.cursor.next();
                }
                self.skip_blanks = true;
                let text = &self.cursor.str()[start..self.cursor.pos()];
                Value::Comment(CommentKind::classify(text))
            }
            CatCode::Ignored => Value::Ignored(c),
            _ => {
                self.skip_blanks = false;
                Value::new(c, code).unwrap_or(Value::Other(c))
            }
        };
        Some(Token::new(value, Span::new(start, self.cursor.pos())))
    }

    /// Consume a run of blanks and return how many lines it ends.
    /// A `\r\n` pair counts as a single line ending.
    fn consume_whitespace<F: CatCodeFn>(
        &mut self,
        first: char,
        first_code: CatCode,
        cat_code_fn: &F,
    ) -> usize {
        let mut num_new_lines = usize::from(first_code == CatCode::EndOfLine);
        let mut prev = first;
        while let Some(c) = self.cursor.peek() {
            match cat_code_fn.cat_code(c) {
                CatCode::EndOfLine => {
                    if !(prev == '\r' && c == '\n') {
                        num_new_lines += 1;
                    }
                }
                CatCode::Space => {}
                _ => break,
            }
            prev = c;
            self.cursor.next();
        }
        num_new_lines
    }

    fn read_control_sequence<F: CatCodeFn>(
        &mut self,
        cat_code_fn: &F,
        cs_name_interner: &mut CsNameInterner,
    ) -> crate::token::CsName {
        self.buffer.clear();
        self.skip_blanks = false;
        if let Some(first) = self.cursor.next() {
            self.buffer.push(first);
            match cat_code_fn.cat_code(first) {
                CatCode::Letter => {
                    while let Some(c) = self.cursor.peek() {
                        if cat_code_fn.cat_code(c) != CatCode::Letter {
                            break;
                        }
                        self.cursor.next();
                        self.buffer.push(c);
                    }
                    self.skip_blanks = true;
                }
                CatCode::Space | CatCode::EndOfLine => {
                    self.skip_blanks = true;
                }
                _ => {}
            }
        }
        cs_name_interner.get_or_intern(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::CatCode::*;

    enum TokenValue {
        Character(char, CatCode),
        ControlSequence(&'static str),
        Blank(&'static str),
        Comment(CommentKind),
        Par,
    }
    use TokenValue::{Blank, Character, Comment, ControlSequence, Par};

    impl TokenValue {
        fn matches(&self, token: &Token, source: &str, interner: &CsNameInterner) -> bool {
            match (self, token.value()) {
                (ControlSequence(name), Value::CommandRef(CommandRef::ControlSequence(cs))) => {
                    interner.resolve(cs) == Some(*name)
                }
                (Character(c, cat_code), _) => {
                    token.char() == Some(*c) && token.cat_code() == Some(*cat_code)
                }
                (Blank(lexeme), Value::Ignored(_)) => token.lexeme(source) == *lexeme,
                (Comment(kind), Value::Comment(actual)) => *kind == actual,
                (Par, Value::Par) => true,
                _ => false,
            }
        }
    }

    fn lexer_test(input: &str, expected_tokens: Vec<TokenValue>) {
        let mut table = CatCodeTable::latex();
        table.set('X', EndOfLine);
        table.set('Y', Space);
        table.set('Z', Ignored);
        let mut lexer = Lexer::new(input.into());
        let mut interner: CsNameInterner = Default::default();
        let mut actual = Vec::new();
        let mut round_trip = String::new();
        while let Some(t) = lexer.next(&table, &mut interner) {
            round_trip.push_str(t.lexeme(input));
            actual.push(t);
        }
        assert_eq!(round_trip, input);
        assert_eq!(
            actual.len(),
            expected_tokens.len(),
            "unexpected token count: {actual:?}"
        );
        for (expected, token) in expected_tokens.iter().zip(&actual) {
            assert!(
                expected.matches(token, input, &interner),
                "unexpected token {token:?}"
            );
        }
    }

    macro_rules! lexer_tests {
        ($( ( $name: ident, $input: expr, $ ( $expected_token : expr, ) * ), )+) => {
            $(
            #[test]
            fn $name() {
                let input = $input;
                let expected_tokens = vec!( $( $expected_token ),* );
                lexer_test(&input, expected_tokens);
            }
            )+
        };
    }

    lexer_tests![
        (
            control_word_then_group,
            r"\a{b}",
            ControlSequence("a"),
            Character('{', BeginGroup),
            Character('b', Letter),
            Character('}', EndGroup),
        ),
        (
            blanks_after_control_word_are_ignored,
            "\\a  b",
            ControlSequence("a"),
            Blank("  "),
            Character('b', Letter),
        ),
        (
            newline_after_control_word_is_ignored,
            "\\a\n b",
            ControlSequence("a"),
            Blank("\n "),
            Character('b', Letter),
        ),
        (
            multi_character_control_sequence,
            "\\ABC",
            ControlSequence("ABC"),
        ),
        (
            control_symbol_does_not_skip_blanks,
            "\\{ A",
            ControlSequence("{"),
            Character(' ', Space),
            Character('A', Letter),
        ),
        (
            control_space_skips_blanks,
            "\\  A",
            ControlSequence(" "),
            Blank(" "),
            Character('A', Letter),
        ),
        (
            lone_escape_at_end,
            "a\\",
            Character('a', Letter),
            ControlSequence(""),
        ),
        (
            comment_then_newline,
            "A%a comment here\nC",
            Character('A', Letter),
            Comment(CommentKind::Plain),
            Blank("\n"),
            Character('C', Letter),
        ),
        (
            comment_then_blank_line,
            "A%\n\nB",
            Character('A', Letter),
            Comment(CommentKind::Plain),
            Par,
            Character('B', Letter),
        ),
        (
            single_newline_is_space,
            "A\nB",
            Character('A', Letter),
            Character('\n', Space),
            Character('B', Letter),
        ),
        (
            blank_line_is_par,
            "A \n \n B",
            Character('A', Letter),
            Par,
            Character('B', Letter),
        ),
        (
            crlf_is_one_line_ending,
            "A\r\nB",
            Character('A', Letter),
            Character('\r', Space),
            Character('B', Letter),
        ),
        (
            crlf_blank_line,
            "A\r\n\r\nB",
            Character('A', Letter),
            Par,
            Character('B', Letter),
        ),
        (
            custom_end_of_line,
            "AXXB",
            Character('A', Letter),
            Par,
            Character('B', Letter),
        ),
        (
            custom_space,
            "AYB",
            Character('A', Letter),
            Character('Y', Space),
            Character('B', Letter),
        ),
        (
            ignored_character,
            "AZB",
            Character('A', Letter),
            Character('Z', Ignored),
            Character('B', Letter),
        ),
        (
            magic_comment,
            "% !tex program = lualatex\n",
            Comment(CommentKind::Magic),
            Blank("\n"),
        ),
        (
            math_characters,
            "$x^2_i$",
            Character('$', MathShift),
            Character('x', Letter),
            Character('^', Superscript),
            Character('2', Other),
            Character('_', Subscript),
            Character('i', Letter),
            Character('$', MathShift),
        ),
        (
            parameter_and_active,
            "#1~&",
            Character('#', Parameter),
            Character('1', Other),
            Character('~', Active),
            Character('&', AlignmentTab),
        ),
        (
            invalid_character,
            "a\u{7f}b",
            Character('a', Letter),
            Character('\u{7f}', Invalid),
            Character('b', Letter),
        ),
        (
            non_ascii_letters_in_control_words,
            "\\café",
            ControlSequence("café"),
        ),
    ];

    #[test]
    fn catcode_change_between_tokens() {
        let input = r"\foo@bar";
        let mut lexer = Lexer::new(input.into());
        let mut interner: CsNameInterner = Default::default();
        let mut table = CatCodeTable::latex();
        let first = lexer.peek(&table, &mut interner).unwrap();
        assert_eq!(first.lexeme(input), r"\foo");
        table.set('@', Letter);
        let first = lexer.next(&table, &mut interner).unwrap();
        assert_eq!(first.lexeme(input), r"\foo@bar");
        assert!(lexer.next(&table, &mut interner).is_none());
    }

    #[test]
    fn state_restore() {
        let input = "\\a  b";
        let mut lexer = Lexer::new(input.into());
        let mut interner: CsNameInterner = Default::default();
        let table = CatCodeTable::latex();
        lexer.next(&table, &mut interner);
        let state = lexer.state();
        assert!(state.skip_blanks);
        let blank = lexer.next(&table, &mut interner).unwrap();
        lexer.restore(state);
        assert_eq!(lexer.next(&table, &mut interner).unwrap().span(), blank.span());
    }

    #[test]
    fn high_water_covers_lookahead() {
        let input = "ab cd";
        let mut lexer = Lexer::new(input.into());
        let mut interner: CsNameInterner = Default::default();
        let table = CatCodeTable::latex();
        lexer.next(&table, &mut interner);
        assert_eq!(lexer.high_water(), 1);
        lexer.next(&table, &mut interner);
        lexer.next(&table, &mut interner);
        assert_eq!(lexer.high_water(), 4);
    }
}
