//! One-step expansion for `\expandafter`.
//!
//! `\expandafter P1 P2` reads `P1` and `P2`, expands `P2` once and puts `P1` followed
//! by the expansion back into the input. Only `P2` is expanded: if the expansion
//! itself starts with a macro, that macro is parsed as an ordinary call afterwards.
//!
//! The reinserted tokens are synthetic. They keep the spans of the tokens they came
//! from for diagnostics, but contribute no source text.

use super::{MacroArguments, Meaning, Parser};
use crate::error::{Diagnostic, Kind};
use crate::grammar::Effect;
use crate::scope::Mode;
use crate::texmacro::CallError;
use crate::token::{CommandRef, Token, Value};
use crate::tree::{Node, Tag};
use std::rc::Rc;

impl<'r, 'i> Parser<'r, 'i> {
    pub(super) fn parse_expandafter(&mut self, out: &mut Vec<Rc<Node>>) {
        let mut children = vec![];
        let Some(cs) = self.next_raw() else {
            return;
        };
        children.push(Node::token(cs));
        let mode = self.scopes.mode();
        match self.expand_after(mode, &mut children) {
            Some(expansion) => {
                log::trace!("\\expandafter reinserts {} tokens", expansion.len());
                self.push_pending(&expansion);
                out.push(Node::branch(
                    Tag::ExpandAfter {
                        expansion: expansion.into_iter().map(Token::into_synthetic).collect(),
                    },
                    children,
                ));
            }
            None => {
                self.report(Diagnostic::new(
                    Kind::ParameterMatch,
                    cs.span(),
                    "`\\expandafter` needs two tokens to follow it",
                ));
                out.push(Node::branch(Tag::Error(Kind::ParameterMatch), children));
            }
        }
    }

    /// Read the token `mode` does not skip, pushing what it skips and the token as leaves.
    fn next_in_mode(&mut self, mode: Mode, out: &mut Vec<Rc<Node>>) -> Option<Token> {
        while let Some(token) = self.peek_raw() {
            self.next_raw();
            out.push(Node::token(token));
            if !mode.skips(&token) {
                return Some(token);
            }
        }
        None
    }

    /// `P1` followed by the one-step expansion of `P2`.
    fn expand_after(&mut self, mode: Mode, out: &mut Vec<Rc<Node>>) -> Option<Vec<Token>> {
        let held = self.next_in_mode(mode, out)?;
        let expansion = self.expand_once(mode, out)?;
        let mut tokens = Vec::with_capacity(expansion.len() + 1);
        tokens.push(held);
        tokens.extend(expansion);
        Some(tokens)
    }

    fn expand_once(&mut self, mode: Mode, out: &mut Vec<Rc<Node>>) -> Option<Vec<Token>> {
        let token = self.next_in_mode(mode, out)?;
        let Some(command_ref) = token.command_ref() else {
            return Some(vec![token]);
        };
        match self.meaning(command_ref) {
            Meaning::Macro(m) => {
                let (call, error) = match m.match_call(&mut MacroArguments::new(self)) {
                    Ok(call) => (call, None),
                    Err((call, error)) => (call, Some(error)),
                };
                out.extend(call.consumed().copied().map(Node::token));
                match error {
                    None => Some(m.expand(&call)),
                    Some(error) => {
                        let title = match error {
                            CallError::PrefixMismatch { .. } => format!(
                                "use of {} does not match its definition",
                                self.name_of(command_ref)
                            ),
                            CallError::EndOfInput { param_num } => format!(
                                "argument {param_num} of {} is incomplete",
                                self.name_of(command_ref)
                            ),
                        };
                        self.report(Diagnostic::new(Kind::ParameterMatch, token.span(), title));
                        let mut tokens = vec![token];
                        tokens.extend(call.consumed().copied());
                        Some(tokens)
                    }
                }
            }
            Meaning::Declared(decl) => match decl.effect() {
                Effect::ExpandAfter => self.expand_after(mode, out),
                Effect::Stringify => {
                    self.skip_ignorable(out);
                    let Some(target) = self.next_raw() else {
                        return Some(vec![token]);
                    };
                    out.push(Node::token(target));
                    Some(self.stringify(target))
                }
                _ => Some(vec![token]),
            },
            Meaning::Character | Meaning::Undeclared => Some(vec![token]),
        }
    }

    /// The character tokens `\string` produces for a token.
    pub(crate) fn stringify(&self, token: Token) -> Vec<Token> {
        let span = token.span();
        let text = match token.value() {
            Value::CommandRef(command_ref @ CommandRef::ControlSequence(_)) => {
                self.name_of(command_ref)
            }
            _ => match token.char() {
                Some(c) => c.to_string(),
                None => return vec![],
            },
        };
        text.chars()
            .map(|c| {
                let value = if c == ' ' {
                    Value::Space(c)
                } else {
                    Value::Other(c)
                };
                Token::new(value, span).into_synthetic()
            })
            .collect()
    }
}
