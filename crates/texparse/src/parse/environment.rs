//! `\begin{name} ... \end{name}`.

use super::{delimiter, Failure, Level, Parser, Stop};
use crate::error::{Diagnostic, Kind};
use crate::grammar::{ContentGrammar, EnvironmentDecl};
use crate::scope::{GroupKind, Locality};
use crate::token::{Span, Value};
use crate::tree::{Node, Tag};
use std::rc::Rc;

impl<'r, 'i> Parser<'r, 'i> {
    /// Read `{name}` after `\begin` or `\end`.
    ///
    /// Returns [None] without consuming anything if the name is not a braced run of
    /// letters, others and spaces.
    fn read_environment_name(&mut self, out: &mut Vec<Rc<Node>>) -> Option<Rc<str>> {
        let mark = self.mark();
        let len = out.len();
        let name = self.try_read_environment_name(out);
        if name.is_none() {
            self.rewind(mark);
            out.truncate(len);
        }
        name
    }

    fn try_read_environment_name(&mut self, out: &mut Vec<Rc<Node>>) -> Option<Rc<str>> {
        self.skip_insignificant(out);
        let open = self.next_raw()?;
        if !matches!(open.value(), Value::BeginGroup(_)) {
            return None;
        }
        out.push(delimiter(open));
        let mut name = String::new();
        loop {
            let token = self.next_raw()?;
            match token.value() {
                Value::EndGroup(_) => {
                    out.push(delimiter(token));
                    return Some(name.into());
                }
                Value::Letter(c) | Value::Other(c) | Value::Space(c) => name.push(c),
                _ => return None,
            }
            out.push(Node::token(token));
        }
    }

    /// The name after the `\end` that is the next token, without consuming anything.
    pub(super) fn peek_end_name(&mut self) -> Option<Rc<str>> {
        let mark = self.mark();
        self.next_raw();
        let name = self.read_environment_name(&mut vec![]);
        self.rewind(mark);
        name
    }

    /// Consume `\end{name}` into an [Tag::End] node.
    pub(super) fn parse_end(&mut self, out: &mut Vec<Rc<Node>>) -> Option<Rc<str>> {
        let mut children = vec![];
        if let Some(cs) = self.next_raw() {
            children.push(Node::token(cs));
        }
        let name = self.read_environment_name(&mut children);
        out.push(Node::branch(Tag::End, children));
        name
    }

    pub(super) fn parse_environment(&mut self, out: &mut Vec<Rc<Node>>) -> Result<(), Stop> {
        let mut begin = vec![];
        let Some(cs) = self.next_raw() else {
            return Err(Stop::EndOfInput);
        };
        begin.push(Node::token(cs));
        let Some(name) = self.read_environment_name(&mut begin) else {
            self.report(Diagnostic::new(
                Kind::ParameterMatch,
                cs.span(),
                "`\\begin` is not followed by an environment name",
            ));
            out.push(Node::branch(Tag::Error(Kind::ParameterMatch), begin));
            return Ok(());
        };
        let generic;
        let decl = match self.registry.environment(&name, self.scopes.mode()) {
            Some(decl) => decl,
            None => {
                generic = EnvironmentDecl::new(&name).with_label("generic");
                &generic
            }
        };
        log::debug!("begin environment {name} ({})", decl.label());
        let depth = self.scopes.depth();
        self.scopes.enter(GroupKind::Environment, decl.mode());
        for range in decl.cat_codes() {
            for c in range.chars() {
                self.scopes.set_cat_code(c, range.cat_code, Locality::Local);
            }
        }
        let index = self.push_frame(Level::Environment(name.clone()));

        let mut result = match self.match_parameters(decl.begin_parameters(), &mut begin) {
            Ok(()) => Ok(()),
            Err(Failure::Mismatch(diagnostic)) => {
                self.report(
                    Diagnostic::new(
                        Kind::ParameterMatch,
                        diagnostic.span(),
                        format!("the arguments of `\\begin{{{name}}}` do not match its declaration"),
                    )
                    .with_note(diagnostic.title()),
                );
                Ok(())
            }
            Err(Failure::Stop(stop)) => Err(stop),
        };
        let mut children = vec![Node::branch(Tag::Begin, begin)];
        let mut closed = false;
        if result.is_ok() {
            let stop = match decl.content() {
                ContentGrammar::Parse => self.parse_sequence(&mut children),
                ContentGrammar::Verbatim => {
                    if self.scan_verbatim_environment(&name, &mut children) {
                        Stop::Close(index)
                    } else {
                        Stop::EndOfInput
                    }
                }
            };
            if stop == Stop::Close(index) {
                if let Some(end_name) = self.parse_end(&mut children) {
                    if end_name != name {
                        let span = children.last().and_then(|c| c.span()).unwrap_or_default();
                        self.report(Diagnostic::new(
                            Kind::EnvironmentNameMismatch,
                            span,
                            format!("`\\begin{{{name}}}` ended by `\\end{{{end_name}}}`"),
                        ));
                    }
                }
                closed = true;
            } else {
                self.report_unclosed(&name, cs.span(), stop, decl.content());
                result = Err(stop);
            }
        }
        self.pop_frame(index);
        let span = children.last().and_then(|c| c.span()).unwrap_or(cs.span());
        self.close_scope(GroupKind::Environment, depth, span);
        log::debug!("end environment {name}");

        if closed && !decl.end_parameters().is_empty() {
            let end = children.len() - 1;
            let mut end_children = children[end].children().to_vec();
            match self.match_parameters(decl.end_parameters(), &mut end_children) {
                Ok(()) | Err(Failure::Mismatch(_)) => {}
                Err(Failure::Stop(stop)) => result = Err(stop),
            }
            children[end] = Node::branch(Tag::End, end_children);
        }
        out.push(Node::branch(
            Tag::Environment {
                label: decl.label().clone(),
                name: (!decl.is_bare()).then_some(name),
            },
            children,
        ));
        result
    }

    fn report_unclosed(&mut self, name: &str, span: Span, stop: Stop, content: ContentGrammar) {
        match stop {
            Stop::Cancelled => {}
            // The verbatim scanner has reported it.
            Stop::EndOfInput if content == ContentGrammar::Verbatim => {}
            Stop::EndOfInput => self.report(Diagnostic::new(
                Kind::UnbalancedGroup,
                span,
                format!("`\\begin{{{name}}}` is never ended"),
            )),
            Stop::Close(outer) => {
                let diagnostic = match self.frame(outer) {
                    Some(Level::Environment(outer_name)) => Diagnostic::new(
                        Kind::EnvironmentNameMismatch,
                        span,
                        format!("`\\begin{{{name}}}` ended by `\\end{{{outer_name}}}`"),
                    ),
                    _ => Diagnostic::new(
                        Kind::UnbalancedGroup,
                        span,
                        format!("`\\begin{{{name}}}` is not ended before its enclosing group"),
                    ),
                };
                self.report(diagnostic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Kind;
    use crate::grammar::*;
    use crate::scope::Mode;
    use crate::tree::Tag;
    use crate::{parse, Registry};

    fn registry() -> Registry {
        Registry::new()
            .with_commands([
                CommandDecl::new("begin").with_effect(Effect::BeginEnvironment),
                CommandDecl::new("end").with_effect(Effect::EndEnvironment),
            ])
            .with_environments([
                EnvironmentDecl::new("itemize"),
                EnvironmentDecl::new("verbatim").verbatim(),
                EnvironmentDecl::new("verbatim*")
                    .with_label("verbatim")
                    .verbatim(),
                EnvironmentDecl::new("equation").with_mode(Mode::DisplayMath),
                EnvironmentDecl::new("tabular").with_begin_parameters(vec![group()]),
            ])
    }

    #[test]
    fn nested_environments() {
        let document = parse(
            "\\begin{itemize}a\\begin{tabular}{ll}b\\end{tabular}\\end{itemize}",
            Mode::Text,
            &registry(),
        );
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(
            document.to_sexp(),
            r#"(document (environment itemize (begin \begin "i" "t" "e" "m" "i" "z" "e") "a" (environment tabular (begin \begin "t" "a" "b" "u" "l" "a" "r" (argument "l" "l")) "b" (end \end "t" "a" "b" "u" "l" "a" "r")) (end \end "i" "t" "e" "m" "i" "z" "e")))"#
        );
    }

    #[test]
    fn name_mismatch() {
        let document = parse("\\begin{itemize}a\\end{enumerate}", Mode::Text, &registry());
        assert_eq!(
            document.diagnostic_kinds(),
            vec![Kind::EnvironmentNameMismatch]
        );
        assert_eq!(document.root().children().len(), 1);
    }

    #[test]
    fn inner_environment_closed_by_outer_end() {
        let document = parse(
            "\\begin{itemize}\\begin{foo}x\\end{itemize}",
            Mode::Text,
            &registry(),
        );
        assert_eq!(
            document.diagnostic_kinds(),
            vec![Kind::EnvironmentNameMismatch]
        );
        let outer = &document.root().children()[0];
        assert!(matches!(outer.tag(), Tag::Environment { label, .. } if &**label == "itemize"));
        assert_eq!(outer.children().last().map(|c| c.tag()), Some(&Tag::End));
    }

    #[test]
    fn unknown_environment_is_generic() {
        let document = parse("\\begin{foo}x\\end{foo}", Mode::Text, &registry());
        assert_eq!(document.diagnostics(), &[]);
        assert!(document.to_sexp().starts_with(r#"(document (environment generic "foo""#));
    }

    #[test]
    fn verbatim_star_mismatch() {
        let source = "\\begin{verbatim}x\\end{verbatim*}";
        let document = parse(source, Mode::Text, &registry());
        assert_eq!(
            document.diagnostic_kinds(),
            vec![Kind::EnvironmentNameMismatch]
        );
        assert_eq!(document.write_source(), source);
    }

    #[test]
    fn verbatim_content() {
        let source = "\\begin{verbatim}\\x{ $\\end{verbatim}";
        let document = parse(source, Mode::Text, &registry());
        assert_eq!(document.diagnostics(), &[]);
        assert!(document.to_sexp().contains(r#"(verbatim "\\x{ $")"#));
    }

    #[test]
    fn unterminated_verbatim() {
        let document = parse("\\begin{verbatim}abc", Mode::Text, &registry());
        assert_eq!(
            document.diagnostic_kinds(),
            vec![Kind::UnterminatedVerbatim]
        );
    }

    #[test]
    fn environment_mode() {
        let document = parse("\\begin{equation}x\\end{equation}y", Mode::Text, &registry());
        assert_eq!(document.state_before(0).map(|s| s.mode()), Some(Mode::Text));
        assert_eq!(document.final_state().mode(), Mode::Text);
        assert_eq!(document.final_state().depth(), 0);
    }

    #[test]
    fn stray_end() {
        let document = parse("a\\end{itemize}b", Mode::Text, &registry());
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
        assert_eq!(document.write_source(), "a\\end{itemize}b");
    }

    #[test]
    fn unclosed_environment() {
        let document = parse("\\begin{itemize}a", Mode::Text, &registry());
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
        assert_eq!(document.final_state().depth(), 0);
    }
}
