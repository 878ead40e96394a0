//! The scope and mode stack.
//!
//! Scopes form a chain from the innermost open group back to the root. Each scope
//! holds only the catcodes and bindings assigned while it was the innermost one;
//! lookups walk outward until an entry is found, and closing a scope simply drops its
//! entries, making whatever was shadowed visible again.
//!
//! Scopes are shared, persistent values: a child references its parent through an
//! [Rc] and mutations copy on write. Taking a [Snapshot] is therefore a pointer copy,
//! which the parser does for backtracking and for every checkpoint used by
//! incremental reparsing.
//!
//! The mode lives on the scope chain too. A scope entered with an explicit mode (math,
//! a text-mode argument inside math) is a mode boundary; leaving it restores the mode
//! of its parent exactly. Paragraph transitions between vertical and text mode are not
//! group-local in TeX and propagate outward up to the nearest boundary.

use crate::texmacro::Binding;
use crate::token::lexer::CatCodeFn;
use crate::token::{CatCode, CatCodeTable, CommandRef, Token, Value};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// The typesetting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Vertical,
    Text,
    Math,
    DisplayMath,
}

impl Mode {
    pub fn is_math(self) -> bool {
        matches!(self, Mode::Math | Mode::DisplayMath)
    }

    /// Whether a token is passed over when reading "the next token" in this mode.
    ///
    /// Trivia and spaces are skipped everywhere. Math mode discards paragraph
    /// breaks as well.
    pub fn skips(self, token: &Token) -> bool {
        match token.value() {
            Value::Ignored(_) | Value::Comment(_) | Value::Space(_) => true,
            Value::Par => self.is_math(),
            _ => false,
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            Mode::Vertical => "vertical",
            Mode::Text => "text",
            Mode::Math => "math",
            Mode::DisplayMath => "display math",
        }
    }
}

/// The construct that opened a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupKind {
    Root,
    /// `{ ... }`
    Brace,
    /// `\begingroup ... \endgroup`
    BeginGroup,
    /// `\bgroup ... \egroup`
    BGroup,
    /// `\begin{name} ... \end{name}`
    Environment,
    /// `$ ... $`, `\( ... \)` and the display variants.
    Math,
    /// Temporary scope used while matching the arguments of a command that declares
    /// its own catcodes.
    Arguments,
}

impl GroupKind {
    pub fn opener(self) -> &'static str {
        match self {
            GroupKind::Root => "the document",
            GroupKind::Brace => "`{`",
            GroupKind::BeginGroup => r"`\begingroup`",
            GroupKind::BGroup => r"`\bgroup`",
            GroupKind::Environment => r"`\begin`",
            GroupKind::Math => "math shift",
            GroupKind::Arguments => "command arguments",
        }
    }

    pub fn closer(self) -> &'static str {
        match self {
            GroupKind::Root => "end of input",
            GroupKind::Brace => "`}`",
            GroupKind::BeginGroup => r"`\endgroup`",
            GroupKind::BGroup => r"`\egroup`",
            GroupKind::Environment => r"`\end`",
            GroupKind::Math => "math shift",
            GroupKind::Arguments => "end of arguments",
        }
    }
}

/// Identifier of a scope, unique within one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeId(u32);

/// Whether an assignment is confined to the innermost scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Locality {
    Local,
    Global,
}

#[derive(Debug, Clone)]
struct Scope {
    id: ScopeId,
    kind: GroupKind,
    mode: Mode,
    mode_boundary: bool,
    cat_codes: HashMap<char, CatCode>,
    bindings: HashMap<CommandRef, Binding>,
    parent: Option<Rc<Scope>>,
}

// Ids are bookkeeping; two scopes with the same contents in the same position are equal.
impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.mode == other.mode
            && self.mode_boundary == other.mode_boundary
            && self.cat_codes == other.cat_codes
            && self.bindings == other.bindings
            && match (&self.parent, &other.parent) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b) || a == b,
                _ => false,
            }
    }
}

impl Eq for Scope {}

/// Error closing a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitError {
    /// Only the root scope is open.
    Underflow,
    /// The innermost scope was opened by a different construct.
    Mismatch { open: GroupKind },
}

/// An immutable view of the scope stack at one point of a parse.
#[derive(Debug, Clone)]
pub struct Snapshot {
    top: Rc<Scope>,
    short_verbs: BTreeSet<char>,
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        (Rc::ptr_eq(&self.top, &other.top) || self.top == other.top)
            && self.short_verbs == other.short_verbs
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    pub fn mode(&self) -> Mode {
        self.top.mode
    }

    /// Number of open scopes above the root.
    pub fn depth(&self) -> usize {
        chain(&self.top).count() - 1
    }

    pub fn binding(&self, key: CommandRef) -> Option<&Binding> {
        chain(&self.top).find_map(|s| s.bindings.get(&key))
    }

    /// The innermost catcode assigned to `c` in an open scope. The base table is not consulted.
    pub fn cat_code_override(&self, c: char) -> Option<CatCode> {
        chain(&self.top).find_map(|s| s.cat_codes.get(&c).copied())
    }

    pub fn is_short_verb(&self, c: char) -> bool {
        self.short_verbs.contains(&c)
    }

    /// The open scopes, innermost first, excluding the root.
    pub fn open_scopes(&self) -> Vec<(ScopeId, GroupKind)> {
        chain(&self.top)
            .filter(|s| s.parent.is_some())
            .map(|s| (s.id, s.kind))
            .collect()
    }
}

fn chain(top: &Rc<Scope>) -> impl Iterator<Item = &Scope> {
    let mut next = Some(top.as_ref());
    std::iter::from_fn(move || {
        let current = next?;
        next = current.parent.as_deref();
        Some(current)
    })
}

/// The live scope stack used by the parser.
#[derive(Debug, Clone)]
pub struct Scopes {
    top: Rc<Scope>,
    base: Rc<CatCodeTable>,
    short_verbs: BTreeSet<char>,
    next_id: u32,
}

impl Scopes {
    pub fn new(base: CatCodeTable, mode: Mode) -> Scopes {
        Scopes {
            top: Rc::new(Scope {
                id: ScopeId(0),
                kind: GroupKind::Root,
                mode,
                mode_boundary: true,
                cat_codes: Default::default(),
                bindings: Default::default(),
                parent: None,
            }),
            base: Rc::new(base),
            short_verbs: Default::default(),
            next_id: 1,
        }
    }

    pub fn base_table(&self) -> &CatCodeTable {
        &self.base
    }

    /// Push a scope. With `mode` set the scope becomes a mode boundary.
    pub fn enter(&mut self, kind: GroupKind, mode: Option<Mode>) -> ScopeId {
        let id = ScopeId(self.next_id);
        self.next_id += 1;
        let parent = self.top.clone();
        log::debug!("enter scope {id:?} ({kind:?}) at depth {}", self.depth() + 1);
        self.top = Rc::new(Scope {
            id,
            kind,
            mode: mode.unwrap_or(parent.mode),
            mode_boundary: mode.is_some(),
            cat_codes: Default::default(),
            bindings: Default::default(),
            parent: Some(parent),
        });
        id
    }

    /// Pop the innermost scope if it was opened by `kind`.
    pub fn exit(&mut self, kind: GroupKind) -> Result<(), ExitError> {
        let Some(parent) = self.top.parent.clone() else {
            return Err(ExitError::Underflow);
        };
        if self.top.kind != kind {
            return Err(ExitError::Mismatch {
                open: self.top.kind,
            });
        }
        log::debug!("exit scope {:?} ({kind:?})", self.top.id);
        self.top = parent;
        Ok(())
    }

    /// Pop scopes until `depth` scopes remain open above the root.
    ///
    /// Returns the kinds of the scopes popped, innermost first.
    pub fn unwind_to(&mut self, depth: usize) -> Vec<GroupKind> {
        let mut popped = Vec::new();
        while self.depth() > depth {
            let Some(parent) = self.top.parent.clone() else {
                break;
            };
            log::debug!("unwind scope {:?} ({:?})", self.top.id, self.top.kind);
            popped.push(self.top.kind);
            self.top = parent;
        }
        popped
    }

    pub fn depth(&self) -> usize {
        chain(&self.top).count() - 1
    }

    pub fn top_kind(&self) -> GroupKind {
        self.top.kind
    }

    pub fn top_id(&self) -> ScopeId {
        self.top.id
    }

    pub fn mode(&self) -> Mode {
        self.top.mode
    }

    /// Switch between vertical and text mode. Propagates to enclosing scopes up to the
    /// nearest mode boundary.
    pub fn set_paragraph_mode(&mut self, mode: Mode) {
        if self.top.mode == mode {
            return;
        }
        fn set(scope: &mut Rc<Scope>, mode: Mode) {
            let scope = Rc::make_mut(scope);
            scope.mode = mode;
            if !scope.mode_boundary {
                if let Some(parent) = &mut scope.parent {
                    set(parent, mode);
                }
            }
        }
        set(&mut self.top, mode);
    }

    pub fn cat_code(&self, c: char) -> CatCode {
        chain(&self.top)
            .find_map(|s| s.cat_codes.get(&c).copied())
            .unwrap_or_else(|| self.base.get(c))
    }

    pub fn set_cat_code(&mut self, c: char, cat_code: CatCode, locality: Locality) {
        match locality {
            Locality::Local => {
                Rc::make_mut(&mut self.top).cat_codes.insert(c, cat_code);
            }
            Locality::Global => {
                fn set(scope: &mut Rc<Scope>, c: char, cat_code: CatCode) {
                    let scope = Rc::make_mut(scope);
                    match &mut scope.parent {
                        Some(parent) => {
                            scope.cat_codes.remove(&c);
                            set(parent, c, cat_code);
                        }
                        None => {
                            scope.cat_codes.insert(c, cat_code);
                        }
                    }
                }
                set(&mut self.top, c, cat_code);
            }
        }
    }

    pub fn binding(&self, key: CommandRef) -> Option<&Binding> {
        chain(&self.top).find_map(|s| s.bindings.get(&key))
    }

    pub fn bind(&mut self, key: CommandRef, binding: Binding, locality: Locality) {
        match locality {
            Locality::Local => {
                Rc::make_mut(&mut self.top).bindings.insert(key, binding);
            }
            Locality::Global => {
                fn set(scope: &mut Rc<Scope>, key: CommandRef, binding: Binding) {
                    let scope = Rc::make_mut(scope);
                    match &mut scope.parent {
                        Some(parent) => {
                            scope.bindings.remove(&key);
                            set(parent, key, binding);
                        }
                        None => {
                            scope.bindings.insert(key, binding);
                        }
                    }
                }
                set(&mut self.top, key, binding);
            }
        }
    }

    /// Register or remove a short verbatim delimiter. These are always global.
    pub fn set_short_verb(&mut self, c: char, active: bool) {
        if active {
            self.short_verbs.insert(c);
        } else {
            self.short_verbs.remove(&c);
        }
    }

    pub fn is_short_verb(&self, c: char) -> bool {
        self.short_verbs.contains(&c)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            top: self.top.clone(),
            short_verbs: self.short_verbs.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.top = snapshot.top;
        self.short_verbs = snapshot.short_verbs;
    }
}

impl CatCodeFn for Scopes {
    fn cat_code(&self, c: char) -> CatCode {
        Scopes::cat_code(self, c)
    }
}
