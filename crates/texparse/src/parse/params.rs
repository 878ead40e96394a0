//! Matching command parameters against their declared patterns.

use super::{delimiter, Failure, Level, Parser, Stop};
use crate::error::{Diagnostic, Kind};
use crate::grammar::{Literal, Pattern, TokenClass};
use crate::scope::GroupKind;
use crate::token::{CommandRef, Span, Token, Value};
use crate::tree::{Node, Tag};
use std::rc::Rc;

impl<'r, 'i> Parser<'r, 'i> {
    /// Match a command's parameter patterns in order.
    ///
    /// When the last pattern is [Pattern::NilGroup] the nodes matched between the
    /// first pattern and it are wrapped in a [Tag::ParameterText] node.
    ///
    /// On a mismatch the input is rewound to before the failing element and the nodes
    /// matched so far are left in `out`.
    pub(crate) fn match_parameters(
        &mut self,
        patterns: &[Pattern],
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Failure> {
        let nil_group = matches!(patterns.last(), Some(Pattern::NilGroup)) && patterns.len() > 1;
        let last = patterns.len().saturating_sub(1);
        let mut parameter_text = vec![];
        for (i, pattern) in patterns.iter().enumerate() {
            let collecting = nil_group && i >= 1 && i < last;
            if nil_group && i == last {
                out.push(Node::branch(
                    Tag::ParameterText,
                    std::mem::take(&mut parameter_text),
                ));
            }
            let target = if collecting {
                &mut parameter_text
            } else {
                &mut *out
            };
            if let Err(failure) = self.match_element(pattern, target) {
                if collecting {
                    out.push(Node::branch(Tag::ParameterText, parameter_text));
                }
                return Err(failure);
            }
        }
        Ok(())
    }

    /// Match one element, rewinding on a mismatch.
    fn match_element(&mut self, pattern: &Pattern, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        let mark = self.mark();
        let len = out.len();
        let result = self.match_pattern(pattern, out);
        if let Err(Failure::Mismatch(_)) = result {
            self.rewind(mark);
            out.truncate(len);
        }
        result
    }

    fn match_pattern(&mut self, pattern: &Pattern, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        match pattern {
            Pattern::Literal(literal) => self.match_literal(literal, out),
            Pattern::TokenRef(class) => self.match_token_class(*class, out),
            Pattern::Optional(inner) => {
                let mark = self.mark();
                let len = out.len();
                match self.match_pattern(inner, out) {
                    Ok(()) | Err(Failure::Stop(Stop::Cancelled)) => {}
                    Err(_) => {
                        self.rewind(mark);
                        out.truncate(len);
                    }
                }
                if self.cancelled {
                    return Err(Stop::Cancelled.into());
                }
                Ok(())
            }
            Pattern::Choice(first, second) => {
                let mark = self.mark();
                let len = out.len();
                match self.match_pattern(first, out) {
                    Ok(()) => Ok(()),
                    Err(Failure::Stop(Stop::Cancelled)) => Err(Stop::Cancelled.into()),
                    Err(_) => {
                        self.rewind(mark);
                        out.truncate(len);
                        self.match_element(second, out)
                    }
                }
            }
            Pattern::Repeat(inner) => {
                loop {
                    let mark = self.mark();
                    let len = out.len();
                    match self.match_pattern(inner, out) {
                        Ok(()) => {
                            if !self.moved_since(&mark) {
                                break;
                            }
                        }
                        Err(Failure::Stop(Stop::Cancelled)) => return Err(Stop::Cancelled.into()),
                        Err(_) => {
                            self.rewind(mark);
                            out.truncate(len);
                            break;
                        }
                    }
                }
                Ok(())
            }
            Pattern::Sequence(patterns) => {
                for pattern in patterns {
                    self.match_pattern(pattern, out)?;
                }
                Ok(())
            }
            Pattern::DelimitedGroup(inner) => self.match_delimited_group(inner, out),
            Pattern::BracketGroup(inner) => self.match_bracket_group(inner, out),
            // Content and token lists only have a meaning inside a group.
            Pattern::Content(_) | Pattern::Tokens => Ok(()),
            Pattern::Verbatim => self.scan_delimited_verbatim(out),
            Pattern::NilGroup => {
                self.skip_insignificant(out);
                match self.peek_raw() {
                    Some(token) if matches!(token.value(), Value::BeginGroup(_)) => {
                        self.read_token_group(Tag::Body, out)
                    }
                    other => Err(self.expected("a `{` starting the definition body", other)),
                }
            }
        }
    }

    fn expected(&self, what: &str, found: Option<Token>) -> Failure {
        match found {
            Some(token) => Failure::mismatch(
                token.span(),
                format!("expected {what}, found {}", self.describe(token)),
            ),
            None => Failure::mismatch(
                Span::empty(self.lexer.source().len()),
                format!("expected {what}, found the end of the input"),
            ),
        }
    }

    pub(crate) fn describe(&self, token: Token) -> String {
        match token.value() {
            Value::CommandRef(command_ref) => format!("`{}`", self.name_of(command_ref)),
            Value::Par => "a paragraph break".to_string(),
            Value::Space(_) => "a space".to_string(),
            _ => match token.char() {
                Some(c) => format!("`{c}`"),
                None => "a comment".to_string(),
            },
        }
    }

    fn match_literal(&mut self, literal: &Literal, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        self.skip_insignificant(out);
        let token = self.peek_raw();
        let matched = token.is_some_and(|token| match (literal, token.value()) {
            (Literal::Char(c), Value::Letter(d) | Value::Other(d)) => *c == d,
            (Literal::ControlSequence(name), Value::CommandRef(CommandRef::ControlSequence(cs))) => {
                self.interner.resolve(cs) == Some(name.as_str())
            }
            _ => false,
        });
        if !matched {
            let what = match literal {
                Literal::Char(c) => format!("`{c}`"),
                Literal::ControlSequence(name) => format!("`\\{name}`"),
            };
            return Err(self.expected(&what, token));
        }
        self.next_raw();
        out.extend(token.map(Node::token));
        Ok(())
    }

    fn match_token_class(&mut self, class: TokenClass, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        match class {
            TokenClass::ParameterRef | TokenClass::Text => self.skip_ignorable(out),
            _ => self.skip_insignificant(out),
        }
        let token = self.peek_raw();
        let Some(token) = token else {
            return Err(self.expected(class_description(class), None));
        };
        let accepted = match (class, token.value()) {
            (TokenClass::Token, Value::BeginGroup(_) | Value::EndGroup(_)) => false,
            (TokenClass::Token, _) => true,
            (TokenClass::ControlSequence, Value::CommandRef(CommandRef::ControlSequence(_))) => true,
            (TokenClass::ActiveCharacter, Value::CommandRef(CommandRef::ActiveCharacter(_))) => {
                true
            }
            (TokenClass::ParameterRef, Value::Parameter(_)) => true,
            (TokenClass::Text, Value::Letter(_) | Value::Other(_)) => !self.closes_bracket(token),
            (TokenClass::Argument, _) => return self.match_argument(token, out),
            (TokenClass::Number, _) => return self.match_number(out),
            (TokenClass::FileName, _) => return self.match_file_name(token, out),
            _ => false,
        };
        if !accepted {
            return Err(self.expected(class_description(class), Some(token)));
        }
        self.next_raw();
        out.push(Node::token(token));
        match class {
            TokenClass::ParameterRef => {
                let next = self.peek_raw();
                let valid = next.is_some_and(|t| match t.value() {
                    Value::Other(c) => c.is_ascii_digit() && c != '0',
                    Value::Parameter(_) => true,
                    _ => false,
                });
                if !valid {
                    return Err(self.expected("a parameter number", next));
                }
                self.next_raw();
                out.extend(next.map(Node::token));
            }
            TokenClass::Text => {
                while let Some(next) = self.peek_raw() {
                    let text = matches!(
                        next.value(),
                        Value::Letter(_) | Value::Other(_) | Value::Space(_)
                    ) && !self.closes_bracket(next);
                    if !text {
                        break;
                    }
                    self.next_raw();
                    out.push(Node::token(next));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether the token is a `]` that closes the innermost bracket group.
    fn closes_bracket(&self, token: Token) -> bool {
        matches!(token.value(), Value::Other(']'))
            && self.frames.last() == Some(&Level::Bracket)
    }

    fn match_argument(&mut self, token: Token, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        match token.value() {
            Value::BeginGroup(_) => {
                self.parse_brace_group(Tag::Argument, None, out)?;
                Ok(())
            }
            Value::EndGroup(_) | Value::Par => Err(self.expected("an argument", Some(token))),
            _ => {
                self.next_raw();
                out.push(Node::branch(Tag::Argument, vec![Node::token(token)]));
                Ok(())
            }
        }
    }

    /// Read a TeX integer constant into a [Tag::Number] node.
    fn match_number(&mut self, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        let mut children = vec![];
        let mut negative = false;
        loop {
            self.skip_insignificant(&mut children);
            match self.peek_raw() {
                Some(token) if matches!(token.value(), Value::Other('+') | Value::Other('-')) => {
                    negative ^= token.value() == Value::Other('-');
                    self.next_raw();
                    children.push(Node::token(token));
                }
                _ => break,
            }
        }
        let first = self.peek_raw();
        let radix = match first.map(|t| t.value()) {
            Some(Value::Other('"')) => 16,
            Some(Value::Other('\'')) => 8,
            Some(Value::Other('`')) => 0,
            _ => 10,
        };
        let magnitude: i64 = if radix == 0 {
            self.next_raw();
            children.extend(first.map(Node::token));
            let Some(token) = self.next_raw() else {
                return Err(self.expected("a character after `` ` ``", None));
            };
            children.push(Node::token(token));
            let c = match token.value() {
                Value::CommandRef(CommandRef::ControlSequence(name)) => {
                    let name = self.interner.resolve(name).unwrap_or("");
                    let mut chars = name.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => None,
                    }
                }
                _ => token.char(),
            };
            match c {
                Some(c) => c as i64,
                None => return Err(self.expected("a single character", Some(token))),
            }
        } else {
            if radix != 10 {
                self.next_raw();
                children.extend(first.map(Node::token));
            }
            let mut value: i64 = 0;
            let mut digits = 0;
            while let Some(token) = self.peek_raw() {
                let digit = match token.value() {
                    Value::Other(c) => c.to_digit(radix),
                    Value::Letter(c) if radix == 16 && c.is_ascii_uppercase() => c.to_digit(16),
                    _ => None,
                };
                let Some(digit) = digit else {
                    break;
                };
                value = value.saturating_mul(radix as i64).saturating_add(digit as i64);
                digits += 1;
                self.next_raw();
                children.push(Node::token(token));
            }
            if digits == 0 {
                let found = self.peek_raw();
                return Err(self.expected("a number", found));
            }
            value
        };
        // One optional space ends the number.
        if let Some(token) = self.peek_raw() {
            if token.is_space() {
                self.next_raw();
                children.push(Node::token(token));
            }
        }
        let value = if negative { -magnitude } else { magnitude };
        out.push(Node::branch(Tag::Number(value), children));
        Ok(())
    }

    fn match_file_name(&mut self, token: Token, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        if let Value::BeginGroup(_) = token.value() {
            let mut children = vec![];
            self.read_token_group(Tag::Argument, &mut children)?;
            out.extend(children);
            return Ok(());
        }
        let mut children = vec![];
        while let Some(token) = self.peek_raw() {
            let part = matches!(
                token.value(),
                Value::Letter(_)
                    | Value::Other(_)
                    | Value::Subscript(_)
                    | Value::Superscript(_)
                    | Value::CommandRef(CommandRef::ActiveCharacter(_))
            ) && !self.closes_bracket(token);
            if !part {
                break;
            }
            self.next_raw();
            children.push(Node::token(token));
        }
        if children.is_empty() {
            return Err(self.expected("a file name", Some(token)));
        }
        out.push(Node::branch(Tag::Argument, children));
        Ok(())
    }

    fn match_delimited_group(
        &mut self,
        inner: &Pattern,
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Failure> {
        self.skip_insignificant(out);
        let token = self.peek_raw();
        if !token.is_some_and(|t| matches!(t.value(), Value::BeginGroup(_))) {
            return Err(self.expected("`{`", token));
        }
        match inner {
            Pattern::Content(mode) => Ok(self.parse_brace_group(Tag::Argument, *mode, out)?),
            Pattern::Tokens => self.read_token_group(Tag::Body, out),
            inner => {
                let Some(open) = self.next_raw() else {
                    return Err(self.expected("`{`", None));
                };
                let depth = self.scopes.depth();
                self.scopes.enter(GroupKind::Brace, None);
                let index = self.push_frame(Level::Group);
                let mut children = vec![delimiter(open)];
                let mut result = self.match_pattern(inner, &mut children);
                if result.is_ok() {
                    self.skip_insignificant(&mut children);
                    let close = self.peek_raw();
                    if close.is_some_and(|t| matches!(t.value(), Value::EndGroup(_))) {
                        self.next_raw();
                        children.extend(close.map(delimiter));
                    } else {
                        result = Err(self.expected("`}`", close));
                    }
                }
                self.pop_frame(index);
                self.scopes.unwind_to(depth);
                out.push(Node::branch(Tag::Argument, children));
                result
            }
        }
    }

    fn match_bracket_group(
        &mut self,
        inner: &Pattern,
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Failure> {
        self.skip_insignificant(out);
        let token = self.peek_raw();
        let Some(open) = token.filter(|t| t.value() == Value::Other('[')) else {
            return Err(self.expected("`[`", token));
        };
        self.next_raw();
        let index = self.push_frame(Level::Bracket);
        let mut children = vec![delimiter(open)];
        let result = match inner {
            Pattern::Content(_) | Pattern::Tokens => {
                let stop = self.parse_sequence(&mut children);
                if stop == Stop::Close(index) {
                    Ok(())
                } else {
                    Err(Failure::Stop(stop))
                }
            }
            inner => self.match_pattern(inner, &mut children).and_then(|()| {
                self.skip_insignificant(&mut children);
                let close = self.peek_raw();
                if self.frame(index).is_some() && close.is_some_and(|t| self.closes_bracket(t)) {
                    Ok(())
                } else {
                    Err(self.expected("`]`", close))
                }
            }),
        };
        if result.is_ok() {
            if let Some(close) = self.next_raw() {
                children.push(delimiter(close));
            }
        }
        self.pop_frame(index);
        out.push(Node::branch(Tag::BracketGroup, children));
        if let Err(Failure::Stop(stop)) = result {
            if stop != Stop::Cancelled && stop != Stop::EndOfInput {
                // A closing token of an enclosing construct inside `[...]`: the optional
                // argument was not one after all.
                let found = self.peek_raw();
                return Err(self.expected("`]`", found));
            }
            return Err(Failure::Stop(stop));
        }
        result
    }

    /// Read a balanced `{ ... }` token list without interpreting it.
    pub(crate) fn read_token_group(&mut self, tag: Tag, out: &mut Vec<Rc<Node>>) -> Result<(), Failure> {
        let Some(open) = self.next_raw() else {
            return Err(self.expected("`{`", None));
        };
        let mut children = vec![delimiter(open)];
        let mut depth = 0_usize;
        loop {
            if self.should_stop() {
                out.push(Node::branch(tag, children));
                return Err(Stop::Cancelled.into());
            }
            let Some(token) = self.next_raw() else {
                self.report(Diagnostic::new(
                    Kind::UnbalancedGroup,
                    open.span(),
                    "`{` is never closed",
                ));
                out.push(Node::branch(tag, children));
                return Err(Stop::EndOfInput.into());
            };
            match token.value() {
                Value::BeginGroup(_) => depth += 1,
                Value::EndGroup(_) if depth == 0 => {
                    children.push(delimiter(token));
                    break;
                }
                Value::EndGroup(_) => depth -= 1,
                _ => {}
            }
            children.push(Node::token(token));
        }
        out.push(Node::branch(tag, children));
        Ok(())
    }
}

fn class_description(class: TokenClass) -> &'static str {
    match class {
        TokenClass::Token => "a token",
        TokenClass::Argument => "an argument",
        TokenClass::ControlSequence => "a control sequence",
        TokenClass::ActiveCharacter => "an active character",
        TokenClass::ParameterRef => "a parameter",
        TokenClass::Text => "text",
        TokenClass::Number => "a number",
        TokenClass::FileName => "a file name",
    }
}
