//! Verbatim text: tokenization suspended until a delimiter.
//!
//! There are two kinds. Character-delimited verbatim (`\verb|...|`, short verbs,
//! `\mint{lang}|...|`) runs to the next occurrence of its first character and may
//! not cross a line end. Environment-delimited verbatim runs to `\end{name}`.

use super::{Failure, Parser, Stop};
use crate::error::{Diagnostic, Kind};
use crate::token::{CatCode, CommandRef, Span, Token, Value};
use crate::tree::{CommandKind, Node, Tag};
use std::rc::Rc;
use texparse_stdext::str::Cursor;

impl<'r, 'i> Parser<'r, 'i> {
    /// Scan `<c> text <c>` into delimiter and verbatim leaves.
    pub(super) fn scan_delimited_verbatim(&mut self, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        while let Some(token) = self.peek_raw() {
            if token.is_synthetic() || !matches!(token.value(), Value::Ignored(_)) {
                break;
            }
            self.next_raw();
            out.push(Node::token(token));
        }
        if let Some(token) = self.pending.last() {
            return Err(Failure::mismatch(
                token.span(),
                "verbatim text cannot start with an expanded token",
            ));
        }
        let start = self.lexer.pos();
        let cursor = self.lexer.cursor();
        let delimiter = match cursor.peek() {
            None => {
                return Err(Failure::mismatch(
                    Span::empty(start),
                    "expected a verbatim delimiter, found the end of the input",
                ))
            }
            Some(c) if self.scopes.cat_code(c) == CatCode::EndOfLine => {
                return Err(Failure::mismatch(
                    Span::new(start, start + c.len_utf8()),
                    "expected a verbatim delimiter, found the end of the line",
                ))
            }
            Some(c) => c,
        };
        cursor.next();
        let body_start = cursor.pos();
        let closed = loop {
            match cursor.peek() {
                None => break false,
                Some(c) if c == delimiter => break true,
                Some(c) if self.scopes.cat_code(c) == CatCode::EndOfLine => break false,
                Some(_) => {
                    cursor.next();
                }
            }
        };
        let body_end = cursor.pos();
        if closed {
            cursor.next();
        }
        self.tokens_read += 1;
        out.push(Node::text(Tag::Delimiter, Span::new(start, body_start)));
        out.push(Node::text(
            Tag::Verbatim { complete: closed },
            Span::new(body_start, body_end),
        ));
        if closed {
            out.push(Node::text(
                Tag::Delimiter,
                Span::new(body_end, body_end + delimiter.len_utf8()),
            ));
        } else {
            self.report(Diagnostic::new(
                Kind::UnterminatedVerbatim,
                Span::new(start, body_end),
                format!("verbatim text has no closing `{delimiter}`"),
            ));
        }
        Ok(())
    }

    /// A character declared with `\MakeShortVerb` starts verbatim text.
    pub(super) fn parse_short_verb(&mut self, token: Token, out: &mut Vec<Rc<Node>>) -> Result<(), Stop> {
        let Some(c) = token.char() else {
            return Ok(());
        };
        let mut children = vec![];
        match self.scan_delimited_verbatim(&mut children) {
            Ok(()) => {}
            // The character is in the source, so there is always a delimiter.
            Err(Failure::Mismatch(diagnostic)) => self.report(*diagnostic),
            Err(Failure::Stop(stop)) => return Err(stop),
        }
        out.push(Node::branch(
            Tag::Command {
                command: CommandRef::ActiveCharacter(c),
                kind: CommandKind::ShortVerb,
            },
            children,
        ));
        Ok(())
    }

    /// Scan the body of a verbatim environment up to, not including, its `\end`.
    ///
    /// The terminator is `\end`, optional spaces and `{name}`, where a trailing `*` of
    /// the name is optional so that a mismatched star is reported as such rather than
    /// swallowing the rest of the input. Returns whether it was found.
    pub(super) fn scan_verbatim_environment(&mut self, name: &str, out: &mut Vec<Rc<Node>>) -> bool {
        let base = name.strip_suffix('*').unwrap_or(name);
        let start = self.lexer.pos();
        let cursor = self.lexer.cursor();
        let found = loop {
            match cursor.peek() {
                None => break false,
                Some(c) if self.scopes.cat_code(c) == CatCode::Escape => {
                    if end_length(cursor, &self.scopes, base).is_some() {
                        break true;
                    }
                    cursor.next();
                }
                Some(_) => {
                    cursor.next();
                }
            }
        };
        let end = cursor.pos();
        self.tokens_read += 1;
        out.push(Node::text(
            Tag::Verbatim { complete: found },
            Span::new(start, end),
        ));
        if !found {
            self.report(Diagnostic::new(
                Kind::UnterminatedVerbatim,
                Span::new(start, end),
                format!("`\\begin{{{name}}}` has no matching `\\end{{{name}}}`"),
            ));
        }
        found
    }
}

/// Length in bytes of an `\end{base}` or `\end{base*}` terminator at the cursor.
fn end_length<F: crate::token::lexer::CatCodeFn>(cursor: &mut Cursor, cat_codes: &F, base: &str) -> Option<usize> {
    let mut offset = cursor.peek()?.len_utf8();
    for expected in "end".chars() {
        if cursor.peek_at(offset)? != expected {
            return None;
        }
        offset += 1;
    }
    if let Some(c) = cursor.peek_at(offset) {
        if cat_codes.cat_code(c) == CatCode::Letter {
            return None;
        }
    }
    while let Some(c) = cursor.peek_at(offset) {
        if cat_codes.cat_code(c) != CatCode::Space {
            break;
        }
        offset += c.len_utf8();
    }
    let open = cursor.peek_at(offset)?;
    if cat_codes.cat_code(open) != CatCode::BeginGroup {
        return None;
    }
    offset += open.len_utf8();
    for expected in base.chars() {
        if cursor.peek_at(offset)? != expected {
            return None;
        }
        offset += expected.len_utf8();
    }
    if cursor.peek_at(offset) == Some('*') {
        offset += 1;
    }
    let close = cursor.peek_at(offset)?;
    if cat_codes.cat_code(close) != CatCode::EndGroup {
        return None;
    }
    Some(offset + close.len_utf8())
}

#[cfg(test)]
mod tests {
    use crate::error::Kind;
    use crate::grammar::*;
    use crate::scope::Mode;
    use crate::tree::Tag;
    use crate::{parse, Registry};

    fn registry() -> Registry {
        Registry::new().with_commands([
            CommandDecl::new("verb").with_parameters(vec![optional(literal('*')), Pattern::Verbatim]),
            CommandDecl::new("mint").with_parameters(vec![token(TokenClass::Argument), Pattern::Verbatim]),
            CommandDecl::new("MakeShortVerb")
                .with_parameters(vec![token(TokenClass::Argument)])
                .with_effect(Effect::ShortVerb(true)),
        ])
    }

    fn verbatim_texts(source: &str) -> Vec<(String, bool)> {
        let document = parse(source, Mode::Text, &registry());
        let mut texts = vec![];
        document.root().visit(&mut |node| {
            if let Tag::Verbatim { complete } = node.tag() {
                let text = node.span().map(|s| s.slice(source)).unwrap_or("");
                texts.push((text.to_string(), *complete));
            }
        });
        texts
    }

    #[test]
    fn verb() {
        assert_eq!(verbatim_texts("\\verb|a{b|"), vec![("a{b".to_string(), true)]);
        assert_eq!(verbatim_texts("\\verb*+ x+"), vec![(" x".to_string(), true)]);
    }

    #[test]
    fn first_recurrence_closes() {
        let source = "\\mint{python}|a|b|";
        assert_eq!(verbatim_texts(source), vec![("a".to_string(), true)]);
        let document = parse(source, Mode::Text, &registry());
        assert_eq!(document.write_source(), source);
    }

    #[test]
    fn mint_body() {
        assert_eq!(
            verbatim_texts("\\mint{python}|print(1)|"),
            vec![("print(1)".to_string(), true)]
        );
    }

    #[test]
    fn stops_at_line_end() {
        let source = "\\verb|abc\ndef|";
        let document = parse(source, Mode::Text, &registry());
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnterminatedVerbatim]);
        assert_eq!(verbatim_texts(source), vec![("abc".to_string(), false)]);
        assert_eq!(document.write_source(), source);
    }

    #[test]
    fn missing_delimiter() {
        let document = parse("\\verb", Mode::Text, &registry());
        assert_eq!(document.diagnostic_kinds(), vec![Kind::ParameterMatch]);
    }

    #[test]
    fn short_verb() {
        let source = "\\MakeShortVerb{\\|}|\\x{|y";
        let document = parse(source, Mode::Text, &registry());
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(verbatim_texts(source), vec![("\\x{".to_string(), true)]);
        assert_eq!(document.to_sexp(), r#"(document (MakeShortVerb (argument (command \|))) (short_verb (verbatim "\\x{")) "y")"#);
    }
}
