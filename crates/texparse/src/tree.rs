//! The parse tree.
//!
//! Nodes are immutable and reference counted, so that a reparse can hand whole
//! subtrees of the previous tree to the new one. Leaves hold either a token or a raw
//! span of source text; concatenating the text of the leaves in order gives back the
//! source exactly (see [Node::write_source]).

use crate::error::{Diagnostic, Kind};
use crate::scope::Mode;
use crate::token::{CommandRef, CsNameInterner, Span, Token, Value};
use std::rc::Rc;

/// How a command node was recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Matched against a registry declaration with this label.
    Declared(Rc<str>),
    /// A call of a user-defined macro.
    Macro,
    /// A character made active by a short verbatim declaration.
    ShortVerb,
    /// Bound by `\let` to a character token.
    Character,
    /// Neither declared nor defined.
    Undeclared,
}

/// How a math node was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathClosing {
    /// `$`, or a single `$` closing display math.
    Single,
    /// `$$`.
    Double,
    /// `\)` or `\]`.
    Command,
    /// The node was closed by the end of its enclosing construct or of the input.
    Exit,
}

/// A file pulled in by `\input`, parsed in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Included {
    pub source: Rc<str>,
    pub root: Rc<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Document,
    Token(Token),
    /// Raw text captured with tokenization suspended.
    Verbatim {
        complete: bool,
    },
    /// Structural punctuation: braces, brackets, math shifts and verbatim delimiters.
    Delimiter,
    /// Source left unread because the parse was cancelled.
    Unparsed,
    Group,
    BracketGroup,
    Math {
        mode: Mode,
        closing: MathClosing,
    },
    Command {
        command: CommandRef,
        kind: CommandKind,
    },
    Argument,
    ParameterText,
    Body,
    Number(i64),
    Environment {
        label: Rc<str>,
        /// [None] for bare environments.
        name: Option<Rc<str>>,
    },
    Begin,
    End,
    ExpandAfter {
        /// The tokens reinserted into the input: the held token followed by the
        /// one-step expansion.
        expansion: Rc<[Token]>,
    },
    Input {
        name: String,
        included: Option<Rc<Included>>,
    },
    Error(Kind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    tag: Tag,
    span: Option<Span>,
    children: Vec<Rc<Node>>,
}

impl Node {
    pub fn token(token: Token) -> Rc<Node> {
        Rc::new(Node {
            tag: Tag::Token(token),
            span: if token.is_synthetic() {
                None
            } else {
                Some(token.span())
            },
            children: vec![],
        })
    }

    /// A leaf covering raw source text.
    pub fn text(tag: Tag, span: Span) -> Rc<Node> {
        Rc::new(Node {
            tag,
            span: Some(span),
            children: vec![],
        })
    }

    pub fn branch(tag: Tag, children: Vec<Rc<Node>>) -> Rc<Node> {
        let span = children
            .iter()
            .filter_map(|child| child.span)
            .reduce(Span::cover);
        Rc::new(Node {
            tag,
            span,
            children,
        })
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// The source covered by this node; [None] when it holds only synthetic tokens.
    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn children(&self) -> &[Rc<Node>] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Children that are token leaves, skipping trivia.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.children.iter().filter_map(|child| match &child.tag {
            Tag::Token(token) if !is_trivia(token) => Some(token),
            _ => None,
        })
    }

    /// All token leaves of the subtree in order, including trivia.
    pub fn all_tokens(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.visit(&mut |node| {
            if let Tag::Token(token) = node.tag {
                tokens.push(token);
            }
        });
        tokens
    }

    /// Visit the subtree in pre-order. Included files are not entered.
    pub fn visit<'a, F: FnMut(&'a Node)>(&'a self, f: &mut F) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Find the first node in pre-order satisfying the predicate.
    pub fn find<P: Fn(&Node) -> bool>(&self, predicate: &P) -> Option<&Node> {
        if predicate(self) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find(predicate))
    }

    /// Every error node of the subtree.
    pub fn errors(&self) -> Vec<Kind> {
        let mut kinds = Vec::new();
        self.visit(&mut |node| {
            if let Tag::Error(kind) = node.tag {
                kinds.push(kind);
            }
        });
        kinds
    }

    /// A copy with every span moved by `delta` bytes.
    ///
    /// Included files keep their spans, which refer to their own source.
    pub fn shifted(&self, delta: isize) -> Rc<Node> {
        let tag = match &self.tag {
            Tag::Token(token) => Tag::Token(token.shifted(delta)),
            tag => tag.clone(),
        };
        Rc::new(Node {
            tag,
            span: self.span.map(|span| span.shifted(delta)),
            children: self
                .children
                .iter()
                .map(|child| child.shifted(delta))
                .collect(),
        })
    }

    /// Append the source text of the subtree to `out`.
    pub fn write_source(&self, source: &str, out: &mut String) {
        match &self.tag {
            Tag::Token(token) => {
                if !token.is_synthetic() {
                    out.push_str(token.lexeme(source))
                }
            }
            Tag::Verbatim { .. } | Tag::Delimiter | Tag::Unparsed => {
                if let Some(span) = self.span {
                    out.push_str(span.slice(source))
                }
            }
            _ => {
                for child in &self.children {
                    child.write_source(source, out);
                }
            }
        }
    }

    /// Render the subtree as an S-expression.
    ///
    /// Blanks and delimiters are left out; synthetic tokens are marked with `~`.
    pub fn write_sexp(&self, source: &str, interner: &CsNameInterner, out: &mut String) {
        let mut printer = SexpPrinter {
            source,
            interner,
            out,
            just_opened: false,
        };
        printer.node(self);
    }
}

fn is_trivia(token: &Token) -> bool {
    matches!(
        token.value(),
        Value::Space(_) | Value::Ignored(_) | Value::Comment(_) | Value::Par
    )
}

struct SexpPrinter<'a> {
    source: &'a str,
    interner: &'a CsNameInterner,
    out: &'a mut String,
    /// Set directly after an opening parenthesis with an empty head.
    just_opened: bool,
}

impl<'a> SexpPrinter<'a> {
    fn atom(&mut self, s: &str) {
        if !self.out.is_empty() && !self.just_opened {
            self.out.push(' ');
        }
        self.out.push_str(s);
        self.just_opened = false;
    }

    fn open(&mut self, head: &str) {
        self.atom("(");
        self.out.push_str(head);
        self.just_opened = head.is_empty();
    }

    fn close(&mut self) {
        self.out.push(')');
    }

    fn children(&mut self, node: &Node) {
        for child in &node.children {
            self.node(child);
        }
    }

    fn token(&mut self, token: &Token) {
        let marker = if token.is_synthetic() { "~" } else { "" };
        let s = match token.value() {
            Value::Space(_) | Value::Ignored(_) => return,
            Value::Par => "par".to_string(),
            Value::Comment(_) => "comment".to_string(),
            Value::CommandRef(command_ref) => command_ref.to_string(self.interner),
            _ => match token.char() {
                Some(c) => format!("{:?}", c.to_string()),
                None => return,
            },
        };
        self.atom(&format!("{marker}{s}"));
    }

    fn node(&mut self, node: &Node) {
        match &node.tag {
            Tag::Token(token) => self.token(token),
            Tag::Delimiter => {}
            Tag::Verbatim { complete } => {
                let text = node.span.map(|s| s.slice(self.source)).unwrap_or("");
                self.open("verbatim");
                self.atom(&format!("{text:?}"));
                if !complete {
                    self.atom("incomplete");
                }
                self.close();
            }
            Tag::Unparsed => {
                let len = node.span.map(|s| s.len()).unwrap_or(0);
                self.open("unparsed");
                self.atom(&len.to_string());
                self.close();
            }
            Tag::Document => {
                self.open("document");
                self.children(node);
                self.close();
            }
            Tag::Group | Tag::BracketGroup => {
                self.open(if node.tag == Tag::Group {
                    "group"
                } else {
                    "brack_group"
                });
                self.children(node);
                self.close();
            }
            Tag::Math { mode, closing } => {
                self.open(match mode {
                    Mode::DisplayMath => "display_math",
                    _ => "inline_math",
                });
                self.children(node);
                if *closing == MathClosing::Exit {
                    self.atom("unterminated");
                }
                self.close();
            }
            Tag::Command { command, kind } => {
                let head = match kind {
                    CommandKind::Declared(label) => label.to_string(),
                    CommandKind::Macro => "macro".to_string(),
                    CommandKind::ShortVerb => "short_verb".to_string(),
                    CommandKind::Character => "character".to_string(),
                    CommandKind::Undeclared => "command".to_string(),
                };
                self.open(&head);
                for (i, child) in node.children.iter().enumerate() {
                    // The label already names a declared command.
                    let is_name = i == 0
                        && matches!(kind, CommandKind::Declared(_))
                        && matches!(&child.tag, Tag::Token(t) if t.command_ref() == Some(*command));
                    if !is_name {
                        self.node(child);
                    }
                }
                self.close();
            }
            Tag::Argument => self.simple("argument", node),
            Tag::ParameterText => self.simple("parameter_text", node),
            Tag::Body => self.simple("body", node),
            Tag::Begin => self.simple("begin", node),
            Tag::End => self.simple("end", node),
            Tag::Number(n) => {
                self.open("number");
                self.atom(&n.to_string());
                self.close();
            }
            Tag::Environment { label, name } => {
                self.open("environment");
                self.atom(label);
                if let Some(name) = name {
                    if name != label {
                        self.atom(&format!("{name:?}"));
                    }
                }
                self.children(node);
                self.close();
            }
            Tag::ExpandAfter { .. } => self.simple("expandafter", node),
            Tag::Input { name, included } => {
                self.open("input");
                self.atom(&format!("{name:?}"));
                if let Some(included) = included {
                    let mut printer = SexpPrinter {
                        source: &included.source,
                        interner: self.interner,
                        out: self.out,
                        just_opened: false,
                    };
                    printer.node(&included.root);
                }
                self.close();
            }
            Tag::Error(kind) => {
                self.open("ERROR");
                self.atom(kind.name());
                self.children(node);
                self.close();
            }
        }
    }

    fn simple(&mut self, head: &str, node: &Node) {
        self.open(head);
        self.children(node);
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (String, Rc<Node>) {
        let source = "{ab}".to_string();
        let children = vec![
            Node::text(Tag::Delimiter, Span::new(0, 1)),
            Node::token(Token::new_letter('a', Span::new(1, 2))),
            Node::token(Token::new_letter('b', Span::new(2, 3))),
            Node::text(Tag::Delimiter, Span::new(3, 4)),
        ];
        let group = Node::branch(Tag::Group, children);
        (source, Node::branch(Tag::Document, vec![group]))
    }

    #[test]
    fn branch_span_covers_children() {
        let (_, root) = sample();
        assert_eq!(root.span(), Some(Span::new(0, 4)));
    }

    #[test]
    fn synthetic_tokens_have_no_span() {
        let synthetic = Token::new_letter('x', Span::new(7, 8)).into_synthetic();
        let node = Node::branch(Tag::Argument, vec![Node::token(synthetic)]);
        assert_eq!(node.span(), None);
        let mut out = String::new();
        node.write_source("", &mut out);
        assert_eq!(out, "");
    }

    #[test]
    fn write_source() {
        let (source, root) = sample();
        let mut out = String::new();
        root.write_source(&source, &mut out);
        assert_eq!(out, source);
    }

    #[test]
    fn shifted_moves_every_span() {
        let (source, root) = sample();
        let shifted = root.shifted(3);
        assert_eq!(shifted.span(), Some(Span::new(3, 7)));
        let mut out = String::new();
        shifted.write_source(&format!("xyz{source}"), &mut out);
        assert_eq!(out, source);
    }

    #[test]
    fn sexp() {
        let (source, root) = sample();
        let mut out = String::new();
        root.write_sexp(&source, &Default::default(), &mut out);
        assert_eq!(out, r#"(document (group "a" "b"))"#);
    }

    #[test]
    fn sexp_separates_atoms_ending_in_a_parenthesis() {
        let source = r"\(x";
        let mut interner = CsNameInterner::default();
        let name = interner.get_or_intern("(");
        let children = vec![
            Node::token(Token::new_control_sequence(name, Span::new(0, 2))),
            Node::token(Token::new_letter('x', Span::new(2, 3))),
        ];
        let root = Node::branch(Tag::Document, children);
        let mut out = String::new();
        root.write_sexp(source, &interner, &mut out);
        assert_eq!(out, r#"(document \( "x")"#);
    }
}
