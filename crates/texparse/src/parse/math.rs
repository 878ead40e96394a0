//! Math shifts and the `\(`, `\[` commands.
//!
//! A `$` outside math opens inline math, and `$$` display math. Inside math the parser
//! treats `$` as a closing token (see [Parser::parse_item]), so nesting is resolved by
//! the frame stack: `$$ ... $` closes display math with a single shift and is
//! reported, and math still open when an enclosing construct ends is closed with
//! [MathClosing::Exit].

use super::{delimiter, Level, MathOpener, Parser, Stop};
use crate::error::{Diagnostic, Kind};
use crate::scope::{GroupKind, Mode};
use crate::token::Value;
use crate::tree::{MathClosing, Node, Tag};
use std::rc::Rc;

impl<'r, 'i> Parser<'r, 'i> {
    pub(super) fn parse_math_shift(&mut self, out: &mut Vec<Rc<Node>>) -> Result<(), Stop> {
        let Some(open) = self.next_raw() else {
            return Err(Stop::EndOfInput);
        };
        let mut children = vec![delimiter(open)];
        let double = self
            .peek_raw()
            .is_some_and(|t| matches!(t.value(), Value::MathShift(_)));
        if double {
            if let Some(second) = self.next_raw() {
                children.push(delimiter(second));
            }
        }
        let (mode, opener) = if double {
            (Mode::DisplayMath, MathOpener::DoubleDollar)
        } else {
            (Mode::Math, MathOpener::Dollar)
        };
        self.parse_math(mode, opener, children, out)
    }

    pub(super) fn parse_math_command(&mut self, mode: Mode, out: &mut Vec<Rc<Node>>) -> Result<(), Stop> {
        let Some(open) = self.next_raw() else {
            return Err(Stop::EndOfInput);
        };
        let opener = if mode == Mode::DisplayMath {
            MathOpener::Bracket
        } else {
            MathOpener::Paren
        };
        self.parse_math(mode, opener, vec![Node::token(open)], out)
    }

    fn parse_math(
        &mut self,
        mode: Mode,
        opener: MathOpener,
        mut children: Vec<Rc<Node>>,
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Stop> {
        let open_span = children
            .iter()
            .filter_map(|c| c.span())
            .reduce(|a, b| a.cover(b))
            .unwrap_or_default();
        if self.scopes.mode() == Mode::Vertical {
            self.scopes.set_paragraph_mode(Mode::Text);
        }
        let depth = self.scopes.depth();
        self.scopes.enter(GroupKind::Math, Some(mode));
        let index = self.push_frame(Level::Math(opener));
        let stop = self.parse_sequence(&mut children);
        let (closing, result) = if stop == Stop::Close(index) {
            let closing = match self.next_raw() {
                Some(close) if matches!(close.value(), Value::CommandRef(_)) => {
                    children.push(Node::token(close));
                    MathClosing::Command
                }
                Some(close) => {
                    children.push(delimiter(close));
                    self.close_display_math(opener, &mut children)
                }
                None => MathClosing::Exit,
            };
            (closing, Ok(()))
        } else {
            if stop != Stop::Cancelled {
                let expected = match opener {
                    MathOpener::Dollar => "`$`",
                    MathOpener::DoubleDollar => "`$$`",
                    MathOpener::Paren => "`\\)`",
                    MathOpener::Bracket => "`\\]`",
                };
                self.report(Diagnostic::new(
                    Kind::UnterminatedMath,
                    open_span,
                    format!("math is not closed by {expected}"),
                ));
            }
            (MathClosing::Exit, Err(stop))
        };
        self.pop_frame(index);
        let span = children.last().and_then(|c| c.span()).unwrap_or(open_span);
        self.close_scope(GroupKind::Math, depth, span);
        out.push(Node::branch(Tag::Math { mode, closing }, children));
        result
    }

    /// Read the second shift of a `$$` closing display math.
    fn close_display_math(&mut self, opener: MathOpener, children: &mut Vec<Rc<Node>>) -> MathClosing {
        if opener != MathOpener::DoubleDollar {
            return MathClosing::Single;
        }
        match self.peek_raw() {
            Some(second) if matches!(second.value(), Value::MathShift(_)) => {
                self.next_raw();
                children.push(delimiter(second));
                MathClosing::Double
            }
            _ => {
                let span = children.last().and_then(|c| c.span()).unwrap_or_default();
                self.report(Diagnostic::new(
                    Kind::UnterminatedMath,
                    span,
                    "display math closed by a single `$`",
                ));
                MathClosing::Single
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Kind;
    use crate::grammar::*;
    use crate::scope::Mode;
    use crate::tree::{MathClosing, Tag};
    use crate::{parse, Registry};

    fn registry() -> Registry {
        Registry::new().with_commands([
            CommandDecl::new("(").with_effect(Effect::OpenMath(Mode::Math)),
            CommandDecl::new(")").with_effect(Effect::CloseMath(Mode::Math)),
            CommandDecl::new("[").with_effect(Effect::OpenMath(Mode::DisplayMath)),
            CommandDecl::new("]").with_effect(Effect::CloseMath(Mode::DisplayMath)),
            CommandDecl::new("text").with_parameters(vec![group_in(Mode::Text)]),
        ])
    }

    fn math(source: &str) -> (Tag, usize, Vec<Kind>) {
        let document = parse(source, Mode::Text, &registry());
        let node = document.root().children()[0].clone();
        (
            node.tag().clone(),
            node.tokens().count(),
            document.diagnostic_kinds(),
        )
    }

    #[test]
    fn inline() {
        assert_eq!(
            math("$x^2$"),
            (
                Tag::Math {
                    mode: Mode::Math,
                    closing: MathClosing::Single
                },
                3,
                vec![]
            )
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            math("$$x^2$$"),
            (
                Tag::Math {
                    mode: Mode::DisplayMath,
                    closing: MathClosing::Double
                },
                3,
                vec![]
            )
        );
    }

    #[test]
    fn display_closed_by_single_shift() {
        let (tag, _, kinds) = math("$$x^2$");
        assert_eq!(
            tag,
            Tag::Math {
                mode: Mode::DisplayMath,
                closing: MathClosing::Single
            }
        );
        assert_eq!(kinds, vec![Kind::UnterminatedMath]);
    }

    #[test]
    fn unterminated() {
        let (tag, _, kinds) = math("$x");
        assert_eq!(
            tag,
            Tag::Math {
                mode: Mode::Math,
                closing: MathClosing::Exit
            }
        );
        assert_eq!(kinds, vec![Kind::UnterminatedMath]);
    }

    #[test]
    fn closed_by_enclosing_group() {
        let document = parse("{$x}y", Mode::Text, &registry());
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnterminatedMath]);
        assert_eq!(
            document.to_sexp(),
            r#"(document (group (inline_math "x" unterminated)) "y")"#
        );
        assert_eq!(document.final_state().mode(), Mode::Text);
    }

    #[test]
    fn commands() {
        let (tag, _, kinds) = math("\\(x\\)");
        assert_eq!(
            tag,
            Tag::Math {
                mode: Mode::Math,
                closing: MathClosing::Command
            }
        );
        assert_eq!(kinds, vec![]);
        let (tag, _, _) = math("\\[x\\]");
        assert_eq!(
            tag,
            Tag::Math {
                mode: Mode::DisplayMath,
                closing: MathClosing::Command
            }
        );
    }

    #[test]
    fn text_inside_math() {
        let document = parse("$a\\text{b $c$}$", Mode::Text, &registry());
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(
            document.to_sexp(),
            r#"(document (inline_math "a" (text (argument "b" (inline_math "c")))))"#
        );
    }

    #[test]
    fn vertical_mode_starts_paragraph() {
        let document = parse("$x$", Mode::Vertical, &registry());
        assert_eq!(document.final_state().mode(), Mode::Text);
    }
}
