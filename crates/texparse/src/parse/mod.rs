//! The parser.
//!
//! The parser pulls tokens from the lexer one at a time, using the catcodes of the
//! live scope stack, and dispatches on what it reads: braces and math shifts open
//! nested constructs, control sequences are looked up in the scope stack (user
//! macros) and then in the [Registry]. Declared commands are matched against their
//! parameter pattern by the generic matcher in [params]; environments, verbatim text,
//! `\expandafter` and math have their own submodules.
//!
//! # Constructs and terminators
//!
//! Each open construct that expects a closing token (a brace group, an environment,
//! math, a bracket group) pushes a frame. When the parser reads a closing token it
//! finds the innermost frame that token can close. If that is the current frame the
//! construct ends normally. If it is an enclosing frame, every construct in between
//! is ended early with a diagnostic, without consuming the token, and the token then
//! closes its own frame. A closing token no frame accepts is reported and kept as
//! an error node.
//!
//! Closing is signalled with [Stop], which travels up the call stack the way an
//! error would, together with the end of input and cancellation.
//!
//! # Error recovery
//!
//! Parameter patterns backtrack: the parser state is captured in a [Mark] before
//! each attempt and restored when the attempt fails. When a required element of a
//! command fails, the command becomes an error node holding what matched so far and
//! parsing continues right after it.

mod environment;
mod expansion;
pub(crate) mod incremental;
mod math;
mod params;
mod verbatim;

use crate::error::{Diagnostic, Kind};
use crate::grammar::{CommandDecl, Effect, Registry};
use crate::input::InputResolver;
use crate::scope::{GroupKind, Locality, Mode, ScopeId, Scopes, Snapshot};
use crate::texmacro::{Binding, Macro, TokenStream};
use crate::token::lexer::{Lexer, LexerState};
use crate::token::{CatCodeTable, CommandRef, CsNameInterner, Span, Token, Value};
use crate::tree::{CommandKind, Included, Node, Tag};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use incremental::{Edit, InvalidEdit};

/// Configuration of a parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Mode at the start of the input.
    pub mode: Mode,
    /// Catcodes at the start of the input.
    pub cat_codes: CatCodeTable,
    /// Stop after reading this many tokens.
    pub max_tokens: Option<usize>,
    /// Stop as soon as this flag is set.
    pub interrupt: Option<Arc<AtomicBool>>,
    /// Maximum nesting of `\input` files.
    pub max_input_depth: usize,
    /// Maximum nesting of groups, environments and math. Constructs opened deeper
    /// are reported and read without structure.
    pub max_nesting: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            mode: Mode::Vertical,
            cat_codes: CatCodeTable::latex(),
            max_tokens: None,
            interrupt: None,
            max_input_depth: 64,
            max_nesting: 100,
        }
    }
}

impl ParseOptions {
    pub fn with_mode(mut self, mode: Mode) -> ParseOptions {
        self.mode = mode;
        self
    }

    pub fn with_cat_codes(mut self, cat_codes: CatCodeTable) -> ParseOptions {
        self.cat_codes = cat_codes;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> ParseOptions {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> ParseOptions {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn with_max_input_depth(mut self, depth: usize) -> ParseOptions {
        self.max_input_depth = depth;
        self
    }

    pub fn with_max_nesting(mut self, depth: usize) -> ParseOptions {
        self.max_nesting = depth;
        self
    }
}

/// Parser state between two top-level nodes.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    pub(crate) lexer: LexerState,
    pub(crate) pending: Vec<Token>,
    pub(crate) scopes: Snapshot,
    pub(crate) global_prefix: bool,
    /// Number of diagnostics emitted before this point.
    pub(crate) diagnostics: usize,
    /// Furthest byte examined while parsing the node that follows, exclusive.
    pub(crate) lookahead_end: usize,
}

impl Checkpoint {
    /// Whether parsing from both checkpoints over identical input gives identical results.
    pub(crate) fn same_state(&self, other: &Checkpoint) -> bool {
        self.lexer.skip_blanks == other.lexer.skip_blanks
            && self.global_prefix == other.global_prefix
            && self.pending == other.pending
            && self.scopes == other.scopes
    }

    pub(crate) fn shifted(&self, delta: isize, diagnostics_delta: isize) -> Checkpoint {
        let mut c = self.clone();
        c.lexer.pos = c.lexer.pos.saturating_add_signed(delta);
        c.lookahead_end = c.lookahead_end.saturating_add_signed(delta);
        c.diagnostics = c.diagnostics.saturating_add_signed(diagnostics_delta);
        c
    }
}

/// The result of a parse.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) source: Rc<str>,
    pub(crate) root: Rc<Node>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) interner: CsNameInterner,
    /// The state before each child of the root.
    pub(crate) checkpoints: Vec<Checkpoint>,
    /// The state at the end of the input.
    pub(crate) end: Checkpoint,
    pub(crate) scopes: Scopes,
    pub(crate) open_scopes: Vec<(ScopeId, GroupKind)>,
    pub(crate) cancelled: bool,
    pub(crate) reused: usize,
    pub(crate) options: ParseOptions,
}

impl Document {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostic_kinds(&self) -> Vec<Kind> {
        self.diagnostics.iter().map(Diagnostic::kind).collect()
    }

    pub fn interner(&self) -> &CsNameInterner {
        &self.interner
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Whether the parse stopped early. The rest of the input is an [Tag::Unparsed] leaf.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Scopes still open when parsing stopped, innermost first.
    pub fn open_scopes(&self) -> &[(ScopeId, GroupKind)] {
        &self.open_scopes
    }

    /// Number of top-level nodes taken over from the previous document by a reparse.
    pub fn reused(&self) -> usize {
        self.reused
    }

    /// The scope state before the `i`-th top-level node.
    pub fn state_before(&self, i: usize) -> Option<&Snapshot> {
        self.checkpoints.get(i).map(|c| &c.scopes)
    }

    /// The scope state at the end of the input.
    pub fn final_state(&self) -> &Snapshot {
        &self.end.scopes
    }

    /// The binding of a control sequence, without its escape character, at the end of
    /// the input.
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        let name = self.interner.get(name)?;
        self.end
            .scopes
            .binding(CommandRef::ControlSequence(name))
    }

    /// The source text, rebuilt from the leaves of the tree.
    pub fn write_source(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        self.root.write_source(&self.source, &mut out);
        out
    }

    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.root.write_sexp(&self.source, &self.interner, &mut out);
        out
    }
}

/// Why a sequence of items ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    EndOfInput,
    Cancelled,
    /// The next token closes the frame at this index. It has not been consumed.
    Close(usize),
}

/// Failure to match a parameter pattern.
#[derive(Debug)]
pub(crate) enum Failure {
    /// The input does not match; the caller rewinds.
    Mismatch(Box<Diagnostic>),
    /// A nested construct was ended; nothing is rewound.
    Stop(Stop),
}

impl From<Stop> for Failure {
    fn from(stop: Stop) -> Self {
        Failure::Stop(stop)
    }
}

impl Failure {
    fn mismatch<T: Into<String>>(span: Span, title: T) -> Failure {
        Failure::Mismatch(Box::new(Diagnostic::new(
            Kind::UnexpectedToken,
            span,
            title,
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathOpener {
    Dollar,
    DoubleDollar,
    Paren,
    Bracket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Level {
    Document,
    Group,
    Bracket,
    Environment(Rc<str>),
    Math(MathOpener),
}

/// A saved parser state to backtrack to.
pub(crate) struct Mark {
    lexer: LexerState,
    pending: Vec<Token>,
    scopes: Snapshot,
    diagnostics: usize,
    global_prefix: bool,
    frames: usize,
}

/// What a command token means at the point it is read.
pub(crate) enum Meaning<'r> {
    Macro(Rc<Macro>),
    Character,
    Declared(&'r CommandDecl),
    Undeclared,
}

pub(crate) struct Parser<'r, 'i> {
    registry: &'r Registry,
    resolver: Option<&'i mut dyn InputResolver>,
    options: ParseOptions,
    lexer: Lexer,
    /// Synthetic tokens waiting to be read, next token last.
    pending: Vec<Token>,
    scopes: Scopes,
    interner: CsNameInterner,
    diagnostics: Vec<Diagnostic>,
    /// Open constructs that wait for a closing token, outermost first.
    frames: Vec<Level>,
    /// A `\global` prefix applies to the next item.
    global_prefix: bool,
    /// The current item was preceded by `\global`.
    global_armed: bool,
    tokens_read: usize,
    cancelled: bool,
    /// Scopes open at the moment of cancellation, before constructs unwound them.
    open_at_cancel: Option<Vec<(ScopeId, GroupKind)>>,
    input_depth: usize,
    /// Open constructs of the files including the one being parsed.
    outer_nesting: usize,
}

/// Parse a document with default options.
pub fn parse(source: &str, mode: Mode, registry: &Registry) -> Document {
    parse_with_options(
        source,
        &ParseOptions::default().with_mode(mode),
        registry,
        None,
    )
}

/// Parse a document. `resolver` is consulted for inclusion commands.
pub fn parse_with_options(
    source: &str,
    options: &ParseOptions,
    registry: &Registry,
    resolver: Option<&mut dyn InputResolver>,
) -> Document {
    let scopes = Scopes::new(options.cat_codes.clone(), options.mode);
    let mut parser = Parser::new(
        source.into(),
        options.clone(),
        registry,
        resolver,
        Default::default(),
        scopes,
    );
    let mut top_level = TopLevel::default();
    let end = parser.parse_top_level(&mut top_level, |_| false);
    parser.finish(top_level, end, 0)
}

#[derive(Default)]
pub(crate) struct TopLevel {
    pub(crate) children: Vec<Rc<Node>>,
    pub(crate) checkpoints: Vec<Checkpoint>,
}

pub(crate) enum TopLevelEnd {
    EndOfInput,
    Cancelled,
    /// The callback accepted this state; nothing after it was parsed.
    Resync(Checkpoint),
}

impl<'r, 'i> Parser<'r, 'i> {
    pub(crate) fn new(
        source: Rc<str>,
        options: ParseOptions,
        registry: &'r Registry,
        resolver: Option<&'i mut dyn InputResolver>,
        interner: CsNameInterner,
        scopes: Scopes,
    ) -> Parser<'r, 'i> {
        Parser {
            registry,
            resolver,
            options,
            lexer: Lexer::new(source),
            pending: vec![],
            scopes,
            interner,
            diagnostics: vec![],
            frames: vec![Level::Document],
            global_prefix: false,
            global_armed: false,
            tokens_read: 0,
            cancelled: false,
            open_at_cancel: None,
            input_depth: 0,
            outer_nesting: 0,
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            lexer: self.lexer.state(),
            pending: self.pending.clone(),
            scopes: self.scopes.snapshot(),
            global_prefix: self.global_prefix,
            diagnostics: self.diagnostics.len(),
            lookahead_end: 0,
        }
    }

    /// Continue from a checkpoint with the diagnostics emitted before it.
    pub(crate) fn resume(&mut self, checkpoint: &Checkpoint, diagnostics: Vec<Diagnostic>) {
        self.lexer.restore(checkpoint.lexer);
        self.pending = checkpoint.pending.clone();
        self.scopes.restore(checkpoint.scopes.clone());
        self.global_prefix = checkpoint.global_prefix;
        self.diagnostics = diagnostics;
    }

    /// Parse top-level items until the input ends or `resync` accepts the state before
    /// an item.
    pub(crate) fn parse_top_level<F: FnMut(&Checkpoint) -> bool>(
        &mut self,
        top_level: &mut TopLevel,
        mut resync: F,
    ) -> TopLevelEnd {
        loop {
            let mut checkpoint = self.checkpoint();
            if resync(&checkpoint) {
                return TopLevelEnd::Resync(checkpoint);
            }
            let num_children = top_level.children.len();
            let result = self.parse_item(&mut top_level.children);
            if top_level.children.len() > num_children {
                checkpoint.lookahead_end = self.lexer.high_water();
                top_level.checkpoints.push(checkpoint);
            }
            match result {
                Ok(()) => continue,
                Err(Stop::Cancelled) => {
                    let pos = self.lexer.pos();
                    let end = self.lexer.source().len();
                    log::info!("parse cancelled at byte {pos} of {end}");
                    let checkpoint = self.checkpoint();
                    top_level
                        .children
                        .push(Node::text(Tag::Unparsed, Span::new(pos, end)));
                    top_level.checkpoints.push(checkpoint);
                    return TopLevelEnd::Cancelled;
                }
                Err(Stop::EndOfInput) | Err(Stop::Close(_)) => {
                    return TopLevelEnd::EndOfInput;
                }
            }
        }
    }

    /// Build the document once the top level has been parsed.
    pub(crate) fn finish(
        mut self,
        top_level: TopLevel,
        end: TopLevelEnd,
        reused: usize,
    ) -> Document {
        let open_scopes = match self.open_at_cancel.take() {
            Some(open_scopes) => open_scopes,
            None => self.scopes.snapshot().open_scopes(),
        };
        let end_checkpoint = self.checkpoint();
        if let TopLevelEnd::EndOfInput = end {
            let pos = self.lexer.source().len();
            for (_, kind) in &open_scopes {
                if matches!(kind, GroupKind::BeginGroup | GroupKind::BGroup) {
                    self.diagnostics.push(Diagnostic::new(
                        Kind::UnbalancedGroup,
                        Span::empty(pos),
                        format!(
                            "{} is still open at the end of the input",
                            kind.opener()
                        ),
                    ));
                }
            }
        }
        Document {
            source: self.lexer.source().clone(),
            root: Node::branch(Tag::Document, top_level.children),
            diagnostics: self.diagnostics,
            interner: self.interner,
            checkpoints: top_level.checkpoints,
            end: end_checkpoint,
            scopes: self.scopes,
            open_scopes,
            cancelled: matches!(end, TopLevelEnd::Cancelled),
            reused,
            options: self.options,
        }
    }

    // Token access

    pub(crate) fn next_raw(&mut self) -> Option<Token> {
        let token = match self.pending.pop() {
            Some(token) => Some(token),
            None => self.lexer.next(&self.scopes, &mut self.interner),
        };
        if token.is_some() {
            self.tokens_read += 1;
        }
        token
    }

    pub(crate) fn peek_raw(&mut self) -> Option<Token> {
        match self.pending.last() {
            Some(token) => Some(*token),
            None => self.lexer.peek(&self.scopes, &mut self.interner),
        }
    }

    /// Consume the tokens the current mode skips, as leaves.
    pub(crate) fn skip_insignificant(&mut self, out: &mut Vec<Rc<Node>>) {
        let mode = self.scopes.mode();
        self.skip_while(out, |token| mode.skips(token));
    }

    /// Consume comments and ignored input, as leaves.
    pub(crate) fn skip_ignorable(&mut self, out: &mut Vec<Rc<Node>>) {
        self.skip_while(out, Token::is_ignorable);
    }

    fn skip_while<P: Fn(&Token) -> bool>(&mut self, out: &mut Vec<Rc<Node>>, predicate: P) {
        while let Some(token) = self.peek_raw() {
            if !predicate(&token) {
                break;
            }
            self.next_raw();
            out.push(Node::token(token));
        }
    }

    /// Push synthetic tokens to be read next, in order.
    pub(crate) fn push_pending(&mut self, tokens: &[Token]) {
        self.pending
            .extend(tokens.iter().rev().map(|t| t.into_synthetic()));
    }

    pub(crate) fn pos(&self) -> usize {
        self.lexer.pos()
    }

    fn should_stop(&mut self) -> bool {
        if !self.cancelled {
            let over_budget = self
                .options
                .max_tokens
                .is_some_and(|max| self.tokens_read >= max);
            let interrupted = self
                .options
                .interrupt
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed));
            self.cancelled = over_budget || interrupted;
            if self.cancelled {
                self.open_at_cancel = Some(self.scopes.snapshot().open_scopes());
            }
        }
        self.cancelled
    }

    // Backtracking

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            lexer: self.lexer.state(),
            pending: self.pending.clone(),
            scopes: self.scopes.snapshot(),
            diagnostics: self.diagnostics.len(),
            global_prefix: self.global_prefix,
            frames: self.frames.len(),
        }
    }

    pub(crate) fn rewind(&mut self, mark: Mark) {
        self.lexer.restore(mark.lexer);
        self.pending = mark.pending;
        self.scopes.restore(mark.scopes);
        self.diagnostics.truncate(mark.diagnostics);
        self.global_prefix = mark.global_prefix;
        self.frames.truncate(mark.frames);
    }

    /// Whether anything was consumed since the mark.
    pub(crate) fn moved_since(&self, mark: &Mark) -> bool {
        self.lexer.state() != mark.lexer || self.pending.len() != mark.pending.len()
    }

    // Diagnostics

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        log::debug!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn name_of(&self, command_ref: CommandRef) -> String {
        command_ref.to_string(&self.interner)
    }

    // Frames

    pub(crate) fn push_frame(&mut self, level: Level) -> usize {
        self.frames.push(level);
        self.frames.len() - 1
    }

    pub(crate) fn pop_frame(&mut self, index: usize) {
        self.frames.truncate(index);
    }

    pub(crate) fn frame(&self, index: usize) -> Option<&Level> {
        self.frames.get(index)
    }

    fn innermost<P: Fn(&Level) -> bool>(&self, predicate: P) -> Option<usize> {
        self.frames.iter().rposition(predicate)
    }

    /// Leave the scope a construct entered at `depth`.
    ///
    /// Scopes opened inside the construct and never closed are closed here too, and
    /// reported unless the parse was cancelled; cancellation records them instead.
    pub(crate) fn close_scope(&mut self, kind: GroupKind, depth: usize, span: Span) {
        if self.scopes.depth() > depth + 1 && !self.cancelled {
            let open = self.scopes.top_kind();
            self.report(Diagnostic::new(
                Kind::GroupKindMismatch,
                span,
                format!("{} closed by {}", open.opener(), kind.closer()),
            ));
        }
        self.scopes.unwind_to(depth);
    }

    // Dispatch

    pub(crate) fn meaning(&self, command_ref: CommandRef) -> Meaning<'r> {
        let name = match self.scopes.binding(command_ref) {
            Some(Binding::Macro(m)) => return Meaning::Macro(m.clone()),
            Some(Binding::Character(_)) => return Meaning::Character,
            Some(Binding::Command(name)) => *name,
            None => match command_ref {
                CommandRef::ControlSequence(name) => name,
                CommandRef::ActiveCharacter(c) => {
                    let mut buffer = [0_u8; 4];
                    return match self
                        .registry
                        .command(c.encode_utf8(&mut buffer), self.scopes.mode())
                    {
                        Some(decl) => Meaning::Declared(decl),
                        None => Meaning::Undeclared,
                    };
                }
            },
        };
        let decl = self
            .interner
            .resolve(name)
            .and_then(|name| self.registry.command(name, self.scopes.mode()));
        match decl {
            Some(decl) => Meaning::Declared(decl),
            None => Meaning::Undeclared,
        }
    }

    /// Which frame, if any, the token closes.
    ///
    /// Returns [None] when the token is not a closing token, and `Some(None)` when it
    /// is one but no open frame accepts it.
    fn closing_frame(&mut self, token: Token) -> Option<Option<usize>> {
        match token.value() {
            Value::EndGroup(_) => Some(self.innermost(|l| *l == Level::Group)),
            Value::Other(']') => {
                let top = self.frames.len() - 1;
                (self.frames[top] == Level::Bracket).then_some(Some(top))
            }
            Value::MathShift(_) if self.scopes.mode().is_math() => Some(self.innermost(|l| {
                matches!(
                    l,
                    Level::Math(MathOpener::Dollar) | Level::Math(MathOpener::DoubleDollar)
                )
            })),
            Value::CommandRef(command_ref) => {
                let Meaning::Declared(decl) = self.meaning(command_ref) else {
                    return None;
                };
                match decl.effect() {
                    Effect::EndEnvironment => {
                        let name = self.peek_end_name();
                        let named = name.and_then(|name| {
                            self.innermost(|l| matches!(l, Level::Environment(n) if **n == *name))
                        });
                        Some(named.or_else(|| self.innermost(|l| matches!(l, Level::Environment(_)))))
                    }
                    Effect::CloseMath(mode) => {
                        let opener = if *mode == Mode::DisplayMath {
                            MathOpener::Bracket
                        } else {
                            MathOpener::Paren
                        };
                        Some(self.innermost(|l| *l == Level::Math(opener)))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Consume a closing token that no open construct accepts.
    fn parse_stray(&mut self, token: Token, out: &mut Vec<Rc<Node>>) {
        let (kind, title) = match token.value() {
            Value::EndGroup(_) => (Kind::UnbalancedGroup, "`}` with no open group".to_string()),
            Value::MathShift(_) => (
                Kind::UnexpectedToken,
                "math shift inside a math environment".to_string(),
            ),
            _ => match token.command_ref() {
                Some(command_ref) if self.is_end_environment(command_ref) => (
                    Kind::UnbalancedGroup,
                    format!("{} with no open environment", self.name_of(command_ref)),
                ),
                Some(command_ref) => (
                    Kind::UnexpectedToken,
                    format!("{} outside of math", self.name_of(command_ref)),
                ),
                None => (Kind::UnexpectedToken, "unexpected token".to_string()),
            },
        };
        let mut children = vec![];
        match token.command_ref() {
            Some(command_ref) if self.is_end_environment(command_ref) => {
                self.parse_end(&mut children);
            }
            _ => {
                self.next_raw();
                children.push(Node::token(token));
            }
        }
        self.report(Diagnostic::new(kind, token.span(), title));
        out.push(Node::branch(Tag::Error(kind), children));
    }

    fn is_end_environment(&self, command_ref: CommandRef) -> bool {
        matches!(self.meaning(command_ref), Meaning::Declared(decl) if *decl.effect() == Effect::EndEnvironment)
    }

    /// Parse items until something stops the sequence.
    pub(crate) fn parse_sequence(&mut self, out: &mut Vec<Rc<Node>>) -> Stop {
        loop {
            if let Err(stop) = self.parse_item(out) {
                return stop;
            }
        }
    }

    /// Parse one item, pushing exactly one node on success.
    pub(crate) fn parse_item(&mut self, out: &mut Vec<Rc<Node>>) -> Result<(), Stop> {
        if self.should_stop() {
            return Err(Stop::Cancelled);
        }
        let Some(token) = self.peek_raw() else {
            return Err(Stop::EndOfInput);
        };
        match self.closing_frame(token) {
            Some(Some(index)) => return Err(Stop::Close(index)),
            Some(None) => {
                self.global_prefix = false;
                self.parse_stray(token, out);
                return Ok(());
            }
            None => {}
        }
        match token.value() {
            Value::Space(_) | Value::Ignored(_) | Value::Comment(_) => {
                self.next_raw();
                out.push(Node::token(token));
                return Ok(());
            }
            _ => {}
        }
        if self.nesting() >= self.options.max_nesting && self.parse_too_deep(token, out)? {
            self.global_prefix = false;
            return Ok(());
        }
        self.global_armed = std::mem::take(&mut self.global_prefix);
        match token.value() {
            Value::BeginGroup(_) => {
                self.parse_brace_group(Tag::Group, None, out)?;
            }
            Value::MathShift(_) => {
                self.parse_math_shift(out)?;
            }
            Value::CommandRef(command_ref) => {
                self.parse_command(token, command_ref, out)?;
            }
            Value::Invalid(c) => {
                self.next_raw();
                self.report(Diagnostic::new(
                    Kind::InvalidCharacter,
                    token.span(),
                    format!("invalid character {c:?}"),
                ));
                out.push(Node::branch(
                    Tag::Error(Kind::InvalidCharacter),
                    vec![Node::token(token)],
                ));
            }
            Value::Par => {
                self.next_raw();
                if !self.scopes.mode().is_math() {
                    self.scopes.set_paragraph_mode(Mode::Vertical);
                }
                out.push(Node::token(token));
            }
            _ => {
                let short_verb = !token.is_synthetic()
                    && token.char().is_some_and(|c| self.scopes.is_short_verb(c));
                if short_verb {
                    self.parse_short_verb(token, out)?;
                } else {
                    self.next_raw();
                    if self.scopes.mode() == Mode::Vertical {
                        self.scopes.set_paragraph_mode(Mode::Text);
                    }
                    out.push(Node::token(token));
                }
            }
        }
        Ok(())
    }

    /// Open constructs, counting those of including files.
    fn nesting(&self) -> usize {
        self.outer_nesting + self.frames.len()
    }

    /// Read a token that would open a construct past the nesting limit as an error.
    ///
    /// A group is read as a plain balanced token list, a declared command or math
    /// shift as a single token. Returns false for tokens that open nothing.
    fn parse_too_deep(&mut self, token: Token, out: &mut Vec<Rc<Node>>) -> Result<bool, Stop> {
        let opens = match token.value() {
            Value::BeginGroup(_) | Value::MathShift(_) => true,
            Value::CommandRef(command_ref) => {
                matches!(self.meaning(command_ref), Meaning::Declared(_))
            }
            _ => false,
        };
        if !opens {
            return Ok(false);
        }
        self.report(Diagnostic::new(
            Kind::UnexpectedToken,
            token.span(),
            format!("nested more than {} levels deep", self.options.max_nesting),
        ));
        let tag = Tag::Error(Kind::UnexpectedToken);
        if let Value::BeginGroup(_) = token.value() {
            return match self.read_token_group(tag, out) {
                Ok(()) => Ok(true),
                Err(Failure::Stop(stop)) => Err(stop),
                Err(Failure::Mismatch(_)) => Err(Stop::EndOfInput),
            };
        }
        self.next_raw();
        out.push(Node::branch(tag, vec![Node::token(token)]));
        Ok(true)
    }

    /// Parse `{ ... }` as a scoped group of content.
    pub(crate) fn parse_brace_group(
        &mut self,
        tag: Tag,
        mode: Option<Mode>,
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Stop> {
        let Some(open) = self.next_raw() else {
            return Err(Stop::EndOfInput);
        };
        let depth = self.scopes.depth();
        self.scopes.enter(GroupKind::Brace, mode);
        let index = self.push_frame(Level::Group);
        let mut children = vec![delimiter(open)];
        let stop = self.parse_sequence(&mut children);
        let result = if stop == Stop::Close(index) {
            if let Some(close) = self.next_raw() {
                children.push(delimiter(close));
            }
            Ok(())
        } else {
            if stop != Stop::Cancelled {
                self.report(Diagnostic::new(
                    Kind::UnbalancedGroup,
                    open.span(),
                    "`{` is never closed",
                ));
            }
            Err(stop)
        };
        self.pop_frame(index);
        let span = children
            .last()
            .and_then(|c| c.span())
            .unwrap_or(open.span());
        self.close_scope(GroupKind::Brace, depth, span);
        out.push(Node::branch(tag, children));
        result
    }

    fn parse_command(
        &mut self,
        token: Token,
        command_ref: CommandRef,
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Stop> {
        match self.meaning(command_ref) {
            Meaning::Macro(m) => {
                log::trace!("macro call {}", self.name_of(command_ref));
                self.parse_macro_call(command_ref, &m, out);
                Ok(())
            }
            Meaning::Character => {
                self.next_raw();
                if self.scopes.mode() == Mode::Vertical {
                    self.scopes.set_paragraph_mode(Mode::Text);
                }
                out.push(Node::branch(
                    Tag::Command {
                        command: command_ref,
                        kind: CommandKind::Character,
                    },
                    vec![Node::token(token)],
                ));
                Ok(())
            }
            Meaning::Declared(decl) => {
                log::trace!("command {} ({})", self.name_of(command_ref), decl.label());
                self.parse_declared(token, command_ref, decl, out)
            }
            Meaning::Undeclared => {
                self.next_raw();
                out.push(Node::branch(
                    Tag::Command {
                        command: command_ref,
                        kind: CommandKind::Undeclared,
                    },
                    vec![Node::token(token)],
                ));
                Ok(())
            }
        }
    }

    fn parse_macro_call(&mut self, command_ref: CommandRef, m: &Macro, out: &mut Vec<Rc<Node>>) {
        let mut children = vec![];
        if let Some(cs) = self.next_raw() {
            children.push(Node::token(cs));
        }
        let (tag, call) = match m.match_call(&mut MacroArguments::new(self)) {
            Ok(call) => (
                Tag::Command {
                    command: command_ref,
                    kind: CommandKind::Macro,
                },
                call,
            ),
            Err((call, err)) => {
                let span = children
                    .first()
                    .and_then(|c| c.span())
                    .unwrap_or(Span::empty(self.pos()));
                let title = match err {
                    crate::texmacro::CallError::PrefixMismatch { .. } => format!(
                        "use of {} does not match its definition",
                        self.name_of(command_ref)
                    ),
                    crate::texmacro::CallError::EndOfInput { param_num } => format!(
                        "argument {param_num} of {} is incomplete",
                        self.name_of(command_ref)
                    ),
                };
                self.report(Diagnostic::new(Kind::ParameterMatch, span, title));
                (Tag::Error(Kind::ParameterMatch), call)
            }
        };
        children.extend(call.prefix.iter().copied().map(Node::token));
        for argument in &call.arguments {
            children.push(Node::branch(
                Tag::Argument,
                argument.consumed.iter().copied().map(Node::token).collect(),
            ));
        }
        out.push(Node::branch(tag, children));
    }

    fn parse_declared(
        &mut self,
        token: Token,
        command_ref: CommandRef,
        decl: &'r CommandDecl,
        out: &mut Vec<Rc<Node>>,
    ) -> Result<(), Stop> {
        match decl.effect() {
            Effect::BeginEnvironment => return self.parse_environment(out),
            Effect::OpenMath(mode) => return self.parse_math_command(*mode, out),
            Effect::ExpandAfter => {
                self.parse_expandafter(out);
                return Ok(());
            }
            Effect::EndEnvironment | Effect::CloseMath(_) => {
                self.parse_stray(token, out);
                return Ok(());
            }
            _ => {}
        }
        let mut children = vec![];
        if let Some(cs) = self.next_raw() {
            children.push(Node::token(cs));
        }
        let depth = self.scopes.depth();
        if !decl.cat_codes().is_empty() {
            self.scopes.enter(GroupKind::Arguments, None);
            for range in decl.cat_codes() {
                for c in range.chars() {
                    self.scopes.set_cat_code(c, range.cat_code, Locality::Local);
                }
            }
        }
        let result = self.match_parameters(decl.parameters(), &mut children);
        self.scopes.unwind_to(depth);
        let command = Tag::Command {
            command: command_ref,
            kind: CommandKind::Declared(decl.label().clone()),
        };
        match result {
            Ok(()) => {
                let tag = match self.apply_effect(decl, token, &children) {
                    Ok(Some(tag)) => tag,
                    Ok(None) => command,
                    Err(diagnostic) => {
                        let kind = diagnostic.kind();
                        self.report(diagnostic);
                        Tag::Error(kind)
                    }
                };
                out.push(Node::branch(tag, children));
                Ok(())
            }
            Err(Failure::Mismatch(diagnostic)) => {
                let span = if token.is_synthetic() {
                    diagnostic.span()
                } else {
                    token.span()
                };
                let error = Diagnostic::new(
                    Kind::ParameterMatch,
                    span,
                    format!(
                        "the arguments of {} do not match its declaration",
                        self.name_of(command_ref)
                    ),
                )
                .with_note(diagnostic.title());
                self.report(error);
                out.push(Node::branch(Tag::Error(Kind::ParameterMatch), children));
                Ok(())
            }
            Err(Failure::Stop(stop)) => {
                out.push(Node::branch(command, children));
                Err(stop)
            }
        }
    }

    fn locality(&self, decl: &CommandDecl) -> Locality {
        if self.global_armed {
            Locality::Global
        } else {
            decl.locality()
        }
    }

    /// Apply a command's effect once its parameters have matched.
    ///
    /// Returns a replacement tag for the command node, if any.
    fn apply_effect(
        &mut self,
        decl: &CommandDecl,
        token: Token,
        children: &[Rc<Node>],
    ) -> Result<Option<Tag>, Diagnostic> {
        match decl.effect() {
            Effect::None | Effect::Stringify => {}
            Effect::EnterScope(kind) => {
                self.scopes.enter(*kind, None);
            }
            Effect::ExitScope(kind) => match self.scopes.exit(*kind) {
                Ok(()) => {}
                Err(crate::scope::ExitError::Underflow) => {
                    return Err(Diagnostic::new(
                        Kind::UnbalancedGroup,
                        token.span(),
                        format!("{} with no open group", kind.closer()),
                    ))
                }
                Err(crate::scope::ExitError::Mismatch { open }) => {
                    // A flat group closed by the wrong command is still closed.
                    if matches!(open, GroupKind::BeginGroup | GroupKind::BGroup) {
                        self.scopes.unwind_to(self.scopes.depth() - 1);
                    }
                    return Err(Diagnostic::new(
                        Kind::GroupKindMismatch,
                        token.span(),
                        format!("{} closed by {}", open.opener(), kind.closer()),
                    ))
                }
            },
            Effect::CatCodes(ranges) => {
                let locality = self.locality(decl);
                for range in ranges {
                    for c in range.chars() {
                        self.scopes.set_cat_code(c, range.cat_code, locality);
                    }
                }
            }
            Effect::CatCodeAssignment => self.assign_cat_code(decl, children)?,
            Effect::Define => self.define(decl, children),
            Effect::Let => self.let_assignment(decl, children),
            Effect::NewCommand => self.new_command(decl, children),
            Effect::GlobalPrefix => self.global_prefix = true,
            Effect::Input => return Ok(Some(self.input(children))),
            Effect::ShortVerb(active) => {
                if let Some(c) = short_verb_char(&self.interner, children) {
                    self.scopes.set_short_verb(c, *active);
                }
            }
            Effect::Paragraph => {
                if !self.scopes.mode().is_math() {
                    self.scopes.set_paragraph_mode(Mode::Vertical);
                }
            }
            Effect::ExpandAfter
            | Effect::BeginEnvironment
            | Effect::EndEnvironment
            | Effect::OpenMath(_)
            | Effect::CloseMath(_) => {}
        }
        Ok(None)
    }

    fn assign_cat_code(
        &mut self,
        decl: &CommandDecl,
        children: &[Rc<Node>],
    ) -> Result<(), Diagnostic> {
        let numbers: Vec<(i64, Option<Span>)> = children
            .iter()
            .filter_map(|c| match c.tag() {
                Tag::Number(n) => Some((*n, c.span())),
                _ => None,
            })
            .collect();
        let [(code, code_span), (value, value_span)] = numbers[..] else {
            return Ok(());
        };
        let Some(c) = u32::try_from(code).ok().and_then(char::from_u32) else {
            return Err(Diagnostic::new(
                Kind::UnexpectedToken,
                code_span.unwrap_or_default(),
                format!("{code} is not a valid character code"),
            ));
        };
        let Some(cat_code) = u8::try_from(value)
            .ok()
            .and_then(crate::token::CatCode::from_int)
        else {
            return Err(Diagnostic::new(
                Kind::UnexpectedToken,
                value_span.unwrap_or_default(),
                format!("{value} is not a valid category code"),
            )
            .with_note("category codes are between 0 and 15 inclusive"));
        };
        let locality = self.locality(decl);
        self.scopes.set_cat_code(c, cat_code, locality);
        Ok(())
    }

    fn define(&mut self, decl: &CommandDecl, children: &[Rc<Node>]) {
        let Some(name) = defined_name(children) else {
            return;
        };
        let parameter_text = children
            .iter()
            .find(|c| *c.tag() == Tag::ParameterText)
            .map(|c| significant(c))
            .unwrap_or_default();
        let body = children
            .iter()
            .find(|c| *c.tag() == Tag::Body)
            .map(|c| significant(c))
            .unwrap_or_default();
        let (m, issues) = Macro::new(parameter_text, body);
        for issue in issues {
            self.report(Diagnostic::new(
                Kind::UnexpectedToken,
                issue.token.span(),
                issue.message,
            ));
        }
        let locality = self.locality(decl);
        log::trace!("define {} ({locality:?})", self.name_of(name));
        self.scopes.bind(name, Binding::Macro(Rc::new(m)), locality);
    }

    fn let_assignment(&mut self, decl: &CommandDecl, children: &[Rc<Node>]) {
        let tokens: Vec<Token> = children
            .iter()
            .skip(1)
            .flat_map(|c| c.all_tokens())
            .filter(|t| !t.is_ignorable() && !t.is_space())
            .collect();
        let (Some(name), Some(target)) = (
            tokens.first().and_then(Token::command_ref),
            tokens.get(1..).and_then(|rest| rest.last()),
        ) else {
            return;
        };
        let binding = match target.command_ref() {
            Some(target_ref) => match self.scopes.binding(target_ref) {
                Some(binding) => binding.clone(),
                None => match target_ref {
                    CommandRef::ControlSequence(target_name) => Binding::Command(target_name),
                    CommandRef::ActiveCharacter(_) => {
                        Binding::Character(Value::CommandRef(target_ref))
                    }
                },
            },
            None => Binding::Character(target.value()),
        };
        let locality = self.locality(decl);
        self.scopes.bind(name, binding, locality);
    }

    fn new_command(&mut self, decl: &CommandDecl, children: &[Rc<Node>]) {
        let Some(name) = children
            .iter()
            .skip(1)
            .flat_map(|c| c.all_tokens())
            .find_map(|t| t.command_ref())
        else {
            return;
        };
        let num_parameters = children
            .iter()
            .filter(|c| *c.tag() == Tag::BracketGroup)
            .find_map(|c| {
                c.children().iter().find_map(|n| match n.tag() {
                    Tag::Number(n) => Some(*n),
                    _ => None,
                })
            })
            .unwrap_or(0)
            .clamp(0, 9) as usize;
        let body = children
            .iter()
            .rfind(|c| *c.tag() == Tag::Body)
            .map(|c| significant(c))
            .unwrap_or_default();
        let (m, issues) = Macro::with_undelimited_parameters(num_parameters, body);
        for issue in issues {
            self.report(Diagnostic::new(
                Kind::UnexpectedToken,
                issue.token.span(),
                issue.message,
            ));
        }
        let locality = self.locality(decl);
        self.scopes.bind(name, Binding::Macro(Rc::new(m)), locality);
    }

    fn input(&mut self, children: &[Rc<Node>]) -> Tag {
        let name: String = children
            .iter()
            .skip(1)
            .filter(|c| *c.tag() == Tag::Argument)
            .flat_map(|c| c.all_tokens())
            .filter(|t| !t.is_ignorable())
            .map(|t| match t.cs_name() {
                Some(cs_name) => format!("\\{}", self.interner.resolve(cs_name).unwrap_or("")),
                None => t.char().map(String::from).unwrap_or_default(),
            })
            .collect::<String>()
            .trim()
            .to_string();
        let included = self.include(&name);
        Tag::Input { name, included }
    }

    /// Parse a file named by an inclusion command in place.
    ///
    /// The file shares the scope stack with the including document.
    fn include(&mut self, name: &str) -> Option<Rc<Included>> {
        if self.input_depth >= self.options.max_input_depth {
            log::warn!(
                "not including {name}: more than {} nested inputs",
                self.options.max_input_depth
            );
            return None;
        }
        let Some(content) = self.resolver.as_mut().and_then(|r| r.resolve(name)) else {
            log::debug!("input {name} not resolved");
            return None;
        };
        let source: Rc<str> = content.into();
        log::debug!("including {name} ({} bytes)", source.len());
        let lexer = std::mem::replace(&mut self.lexer, Lexer::new(source.clone()));
        let pending = std::mem::take(&mut self.pending);
        let frames = std::mem::replace(&mut self.frames, vec![Level::Document]);
        let diagnostics = std::mem::take(&mut self.diagnostics);
        self.input_depth += 1;
        self.outer_nesting += frames.len();
        let mut children = vec![];
        let stop = self.parse_sequence(&mut children);
        if stop == Stop::Cancelled {
            let pos = self.lexer.pos();
            children.push(Node::text(Tag::Unparsed, Span::new(pos, source.len())));
        }
        self.input_depth -= 1;
        self.outer_nesting -= frames.len();
        self.lexer = lexer;
        self.pending = pending;
        self.frames = frames;
        let included_diagnostics = std::mem::replace(&mut self.diagnostics, diagnostics);
        Some(Rc::new(Included {
            source,
            root: Node::branch(Tag::Document, children),
            diagnostics: included_diagnostics,
        }))
    }
}

/// A structural delimiter leaf. Synthetic delimiters stay tokens so they are not
/// written back as source text.
pub(crate) fn delimiter(token: Token) -> Rc<Node> {
    if token.is_synthetic() {
        Node::token(token)
    } else {
        Node::text(Tag::Delimiter, token.span())
    }
}

/// The significant tokens of a subtree, for building macros.
fn significant(node: &Node) -> Vec<Token> {
    node.all_tokens()
        .into_iter()
        .filter(|t| !t.is_ignorable())
        .collect()
}

/// The command a definition defines: the first command token after the defining
/// command itself.
fn defined_name(children: &[Rc<Node>]) -> Option<CommandRef> {
    children
        .iter()
        .skip(1)
        .take_while(|c| *c.tag() != Tag::ParameterText && *c.tag() != Tag::Body)
        .find_map(|c| match c.tag() {
            Tag::Token(token) => token.command_ref(),
            _ => None,
        })
}

fn short_verb_char(interner: &CsNameInterner, children: &[Rc<Node>]) -> Option<char> {
    let token = children
        .iter()
        .filter(|c| *c.tag() == Tag::Argument)
        .flat_map(|c| c.all_tokens())
        .find(|t| !t.is_ignorable() && !t.is_space())?;
    match token.value() {
        Value::CommandRef(CommandRef::ControlSequence(name)) => {
            let name = interner.resolve(name)?;
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
        _ => token.char(),
    }
}

/// Token source for matching the arguments of a user macro.
///
/// A closing brace at brace depth zero ends the stream: it belongs to an
/// enclosing group, not to the call.
pub(crate) struct MacroArguments<'p, 'r, 'i> {
    parser: &'p mut Parser<'r, 'i>,
    depth: usize,
}

impl<'p, 'r, 'i> MacroArguments<'p, 'r, 'i> {
    pub(crate) fn new(parser: &'p mut Parser<'r, 'i>) -> Self {
        MacroArguments { parser, depth: 0 }
    }

    fn admits(&self, token: &Token) -> bool {
        self.depth > 0 || !matches!(token.value(), Value::EndGroup(_))
    }
}

impl<'p, 'r, 'i> TokenStream for MacroArguments<'p, 'r, 'i> {
    fn next_token(&mut self) -> Option<Token> {
        let token = self.parser.peek_raw()?;
        if !self.admits(&token) {
            return None;
        }
        self.parser.next_raw();
        match token.value() {
            Value::BeginGroup(_) => self.depth += 1,
            Value::EndGroup(_) => self.depth -= 1,
            _ => {}
        }
        Some(token)
    }

    fn peek_token(&mut self) -> Option<Token> {
        let token = self.parser.peek_raw()?;
        self.admits(&token).then_some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::*;
    use crate::input::InMemoryResolver;

    fn registry() -> Registry {
        let name = choice(
            token(TokenClass::ActiveCharacter),
            token(TokenClass::ControlSequence),
        );
        Registry::new().with_commands([
            CommandDecl::new("begingroup").with_effect(Effect::EnterScope(GroupKind::BeginGroup)),
            CommandDecl::new("endgroup").with_effect(Effect::ExitScope(GroupKind::BeginGroup)),
            CommandDecl::new("bgroup").with_effect(Effect::EnterScope(GroupKind::BGroup)),
            CommandDecl::new("egroup").with_effect(Effect::ExitScope(GroupKind::BGroup)),
            CommandDecl::new("def")
                .with_parameters(vec![
                    name.clone(),
                    repeat(choice(
                        token(TokenClass::ParameterRef),
                        token(TokenClass::Text),
                    )),
                    Pattern::NilGroup,
                ])
                .with_effect(Effect::Define)
                .local(),
            CommandDecl::new("global").with_effect(Effect::GlobalPrefix),
            CommandDecl::new("let")
                .with_parameters(vec![
                    name,
                    optional(literal('=')),
                    token(TokenClass::Token),
                ])
                .with_effect(Effect::Let)
                .local(),
            CommandDecl::new("newcommand")
                .with_parameters(vec![
                    choice(
                        token(TokenClass::ControlSequence),
                        Pattern::DelimitedGroup(Box::new(token(TokenClass::ControlSequence))),
                    ),
                    optional(Pattern::BracketGroup(Box::new(token(TokenClass::Number)))),
                    token_group(),
                ])
                .with_effect(Effect::NewCommand)
                .local(),
            CommandDecl::new("input")
                .with_parameters(vec![token(TokenClass::FileName)])
                .with_effect(Effect::Input),
            CommandDecl::new("section").with_parameters(vec![group()]),
            CommandDecl::new("par").with_effect(Effect::Paragraph),
        ])
    }

    fn parse_text(source: &str) -> Document {
        parse(source, Mode::Text, &registry())
    }

    fn last_kind(document: &Document) -> Option<CommandKind> {
        let node = document.root().children().iter().rev().find(|c| !c.is_leaf())?;
        match node.tag() {
            Tag::Command { kind, .. } => Some(kind.clone()),
            _ => None,
        }
    }

    #[test]
    fn round_trip() {
        let source = "\\section{A % comment\n}  {x}\n\n\\begingroup \\def\\a#1{#1}\\endgroup ^^M";
        let document = parse_text(source);
        assert_eq!(document.write_source(), source);
    }

    #[test]
    fn definition_is_scoped() {
        let document = parse_text("{\\def\\x{a}\\x}\\x");
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(last_kind(&document), Some(CommandKind::Undeclared));
        assert!(document.binding("x").is_none());
    }

    #[test]
    fn definition_is_restored_after_group() {
        let document = parse_text("\\def\\x#1{a}{\\def\\x{b}\\x}\\x{y}");
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(last_kind(&document), Some(CommandKind::Macro));
        // The outer definition takes one argument.
        let call = document.root().children().last().cloned();
        assert_eq!(call.map(|c| c.children().len()), Some(2));
    }

    #[test]
    fn global_definition_survives_group() {
        let document = parse_text("{\\global\\def\\x{a}}\\x");
        assert_eq!(last_kind(&document), Some(CommandKind::Macro));
        assert!(matches!(document.binding("x"), Some(Binding::Macro(_))));
    }

    #[test]
    fn global_prefix_applies_to_next_item_only() {
        let document = parse_text("{\\global\\def\\x{a}\\def\\y{b}}\\x\\y");
        assert!(document.binding("x").is_some());
        assert!(document.binding("y").is_none());
    }

    #[test]
    fn begingroup_closed_by_egroup() {
        let document = parse_text("\\begingroup x\\egroup");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::GroupKindMismatch]);
        assert_eq!(document.write_source(), "\\begingroup x\\egroup");
    }

    #[test]
    fn flat_groups_scope_definitions() {
        let document = parse_text("\\begingroup\\def\\x{a}\\endgroup\\x");
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(last_kind(&document), Some(CommandKind::Undeclared));
    }

    #[test]
    fn endgroup_without_begingroup() {
        let document = parse_text("x\\endgroup");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
    }

    #[test]
    fn begingroup_open_at_end() {
        let document = parse_text("\\begingroup x");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
        assert_eq!(document.open_scopes().len(), 1);
        assert_eq!(document.open_scopes()[0].1, GroupKind::BeginGroup);
    }

    #[test]
    fn begingroup_closed_by_brace() {
        let document = parse_text("{\\begingroup\\def\\x{a}}\\x");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::GroupKindMismatch]);
        assert_eq!(last_kind(&document), Some(CommandKind::Undeclared));
    }

    #[test]
    fn stray_closing_brace() {
        let document = parse_text("a}b");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
        assert_eq!(
            document.to_sexp(),
            r#"(document "a" (ERROR UnbalancedGroupError "}") "b")"#
        );
    }

    #[test]
    fn unclosed_brace() {
        let document = parse_text("{a");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
        assert_eq!(document.write_source(), "{a");
    }

    #[test]
    fn invalid_character() {
        let document = parse_text("a\u{7f}b");
        assert_eq!(document.diagnostic_kinds(), vec![Kind::InvalidCharacter]);
        assert_eq!(document.write_source(), "a\u{7f}b");
    }

    #[test]
    fn let_copies_meaning() {
        let document = parse_text("\\def\\a{x}\\let\\b=\\a\\def\\a{y}\\b");
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(last_kind(&document), Some(CommandKind::Macro));
        assert_ne!(document.binding("a"), document.binding("b"));
    }

    #[test]
    fn let_to_declared_command() {
        let document = parse_text("\\let\\s\\section\\s{T}");
        assert_eq!(document.diagnostics(), &[]);
        assert!(document.to_sexp().ends_with("(section (argument \"T\")))"), "{}", document.to_sexp());
    }

    #[test]
    fn let_to_character() {
        let document = parse_text("\\let\\a=b\\a");
        assert_eq!(last_kind(&document), Some(CommandKind::Character));
    }

    #[test]
    fn newcommand() {
        let document = parse_text("\\newcommand{\\x}[1]{<#1>}\\x{a}");
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(last_kind(&document), Some(CommandKind::Macro));
        let call = document.root().children().last().cloned();
        assert_eq!(call.map(|c| c.children().len()), Some(2));
    }

    #[test]
    fn input_shares_scopes() {
        let registry = registry();
        let mut resolver = InMemoryResolver::new().with_file("defs.tex", "\\def\\x{a}\\endgroup");
        let document = parse_with_options(
            "\\begingroup\\input{defs}\\x",
            &ParseOptions::default(),
            &registry,
            Some(&mut resolver),
        );
        // The included file may close a group the including file opened.
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(last_kind(&document), Some(CommandKind::Undeclared));
        let input = document
            .root()
            .children()
            .iter()
            .find(|c| matches!(c.tag(), Tag::Input { .. }))
            .cloned();
        let Some(Tag::Input { name, included }) = input.map(|n| n.tag().clone()) else {
            panic!("no input node in {}", document.to_sexp());
        };
        assert_eq!(name, "defs");
        assert!(included.is_some_and(|i| i.diagnostics.is_empty()));
        assert_eq!(document.write_source(), "\\begingroup\\input{defs}\\x");
    }

    #[test]
    fn input_definitions_are_visible() {
        let registry = registry();
        let mut resolver = InMemoryResolver::new().with_file("defs.tex", "\\def\\x{a}");
        let document = parse_with_options(
            "\\input defs \\x",
            &ParseOptions::default(),
            &registry,
            Some(&mut resolver),
        );
        assert_eq!(last_kind(&document), Some(CommandKind::Macro));
    }

    #[test]
    fn input_not_found() {
        let document = parse_text("\\input{missing}");
        assert_eq!(document.diagnostics(), &[]);
        assert!(matches!(
            document.root().children()[0].tag(),
            Tag::Input { included: None, .. }
        ));
    }

    #[test]
    fn recursive_input_is_bounded() {
        let registry = registry();
        let mut resolver = InMemoryResolver::new().with_file("self.tex", "a\\input{self}");
        let options = ParseOptions::default().with_max_input_depth(3);
        let document = parse_with_options("\\input{self}", &options, &registry, Some(&mut resolver));
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(document.write_source(), "\\input{self}");
    }

    #[test]
    fn token_budget_cancels() {
        let options = ParseOptions::default().with_max_tokens(3);
        let document = parse_with_options("{\\begingroup abc}", &options, &registry(), None);
        assert!(document.is_cancelled());
        assert_eq!(document.diagnostics(), &[]);
        assert_eq!(document.write_source(), "{\\begingroup abc}");
        let kinds: Vec<GroupKind> = document.open_scopes().iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec![GroupKind::BeginGroup, GroupKind::Brace]);
        assert!(document.to_sexp().ends_with("(unparsed 4))"), "{}", document.to_sexp());
    }

    #[test]
    fn cancelled_math_is_not_reported() {
        let options = ParseOptions::default().with_max_tokens(3);
        let document = parse_with_options("$\\begingroup x$", &options, &registry(), None);
        assert!(document.is_cancelled());
        assert_eq!(document.diagnostics(), &[]);
        let kinds: Vec<GroupKind> = document.open_scopes().iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec![GroupKind::BeginGroup, GroupKind::Math]);
    }

    #[test]
    fn nesting_limit() {
        let options = ParseOptions::default().with_max_nesting(3);
        let document = parse_with_options("{{{a}}}b", &options, &registry(), None);
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnexpectedToken]);
        assert_eq!(document.write_source(), "{{{a}}}b");
        assert_eq!(
            document.to_sexp(),
            r#"(document (group (group (ERROR UnexpectedTokenError "a"))) "b")"#
        );
    }

    #[test]
    fn deep_groups_complete() {
        let source = "{".repeat(100_000);
        let document = parse(&source, Mode::Text, &registry());
        assert_eq!(document.write_source(), source);
        let kinds = document.diagnostic_kinds();
        assert!(kinds.contains(&Kind::UnexpectedToken));
        assert!(kinds.contains(&Kind::UnbalancedGroup));
    }

    #[test]
    fn interrupt_cancels() {
        let interrupt = Arc::new(AtomicBool::new(true));
        let options = ParseOptions::default().with_interrupt(interrupt);
        let document = parse_with_options("abc", &options, &registry(), None);
        assert!(document.is_cancelled());
        assert_eq!(document.to_sexp(), "(document (unparsed 3))");
    }

    #[test]
    fn paragraph_mode() {
        let document = parse("a\n\nb\\par", Mode::Vertical, &registry());
        assert_eq!(document.state_before(0).map(|s| s.mode()), Some(Mode::Vertical));
        assert_eq!(document.state_before(1).map(|s| s.mode()), Some(Mode::Text));
        assert_eq!(document.final_state().mode(), Mode::Vertical);
    }
}
