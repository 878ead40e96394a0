//! Incremental reparsing.
//!
//! A reparse reuses the top-level nodes of the previous document on both sides of an
//! edit. Each top-level node records the parser state before it and the furthest byte
//! the parser looked at while building it.
//!
//! - A node before the edit is reused if the parser never looked at the edited range
//!   while building it.
//! - Parsing restarts from the state before the first node that is not reused.
//! - Once the new parse is past the edit, it stops at the first point where its
//!   state is identical to the previous parse's state at the corresponding old
//!   position. The rest of the old tree is shifted by the change in length and
//!   reused.
//!
//! The result is identical to parsing the edited source from scratch, apart from
//! the numbering of interned names and scope ids.

use super::{Checkpoint, Document, Parser, TopLevel, TopLevelEnd};
use crate::grammar::Registry;
use crate::input::InputResolver;
use std::ops::Range;

/// A replacement of a byte range of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// The replaced range of the old source.
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn new(range: Range<usize>, text: &str) -> Edit {
        Edit {
            range,
            text: text.into(),
        }
    }

    pub fn insert(pos: usize, text: &str) -> Edit {
        Edit::new(pos..pos, text)
    }

    pub fn delete(range: Range<usize>) -> Edit {
        Edit::new(range, "")
    }

    /// Change in the length of the source.
    pub fn delta(&self) -> isize {
        self.text.len() as isize - (self.range.end - self.range.start) as isize
    }

    /// The source after the edit.
    pub fn apply(&self, source: &str) -> Result<String, InvalidEdit> {
        let valid = self.range.start <= self.range.end
            && self.range.end <= source.len()
            && source.is_char_boundary(self.range.start)
            && source.is_char_boundary(self.range.end);
        if !valid {
            return Err(InvalidEdit {
                range: self.range.clone(),
                len: source.len(),
            });
        }
        let mut edited = String::with_capacity(source.len() + self.text.len());
        edited.push_str(&source[..self.range.start]);
        edited.push_str(&self.text);
        edited.push_str(&source[self.range.end..]);
        Ok(edited)
    }
}

/// An edit whose range does not fit the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEdit {
    pub range: Range<usize>,
    /// Length of the source in bytes.
    pub len: usize,
}

impl std::fmt::Display for InvalidEdit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "edit range {}..{} is not a valid range of a {} byte source",
            self.range.start, self.range.end, self.len
        )
    }
}

impl std::error::Error for InvalidEdit {}

/// Parse the document after an edit, reusing what is unaffected.
pub fn reparse(prior: &Document, edit: &Edit, registry: &Registry) -> Result<Document, InvalidEdit> {
    reparse_with_resolver(prior, edit, registry, None)
}

pub fn reparse_with_resolver(
    prior: &Document,
    edit: &Edit,
    registry: &Registry,
    resolver: Option<&mut dyn InputResolver>,
) -> Result<Document, InvalidEdit> {
    let source = edit.apply(&prior.source)?;
    if prior.cancelled {
        log::info!("previous parse was cancelled; parsing from scratch");
        return Ok(super::parse_with_options(
            &source,
            &prior.options,
            registry,
            resolver,
        ));
    }
    let old = &prior.checkpoints;
    let reused_prefix = old
        .iter()
        .take_while(|c| c.lookahead_end <= edit.range.start)
        .count();
    let start = old.get(reused_prefix).unwrap_or(&prior.end);

    let mut parser = Parser::new(
        source.into(),
        prior.options.clone(),
        registry,
        resolver,
        prior.interner.clone(),
        prior.scopes.clone(),
    );
    parser.resume(start, prior.diagnostics[..start.diagnostics].to_vec());
    let mut top_level = TopLevel {
        children: prior.root.children()[..reused_prefix].to_vec(),
        checkpoints: old[..reused_prefix].to_vec(),
    };

    let delta = edit.delta();
    let edited_end = edit.range.start + edit.text.len();
    let end = parser.parse_top_level(&mut top_level, |checkpoint| {
        resync_point(old, reused_prefix, checkpoint, edit, edited_end, delta).is_some()
    });
    let checkpoint = match end {
        TopLevelEnd::Resync(checkpoint) => checkpoint,
        end => {
            log::info!(
                "reparse reused {reused_prefix} of {} top-level nodes",
                old.len()
            );
            return Ok(parser.finish(top_level, end, reused_prefix));
        }
    };
    let Some(resumed) = resync_point(old, reused_prefix, &checkpoint, edit, edited_end, delta)
    else {
        return Ok(parser.finish(top_level, TopLevelEnd::EndOfInput, reused_prefix));
    };
    let diagnostics_delta = checkpoint.diagnostics as isize - old[resumed].diagnostics as isize;
    let reused_suffix = old.len() - resumed;
    log::info!(
        "reparse reused {reused_prefix} + {reused_suffix} of {} top-level nodes",
        old.len()
    );
    for (child, checkpoint) in prior.root.children()[resumed..].iter().zip(&old[resumed..]) {
        top_level.children.push(if delta == 0 {
            child.clone()
        } else {
            child.shifted(delta)
        });
        top_level
            .checkpoints
            .push(checkpoint.shifted(delta, diagnostics_delta));
    }
    let mut diagnostics = parser.diagnostics;
    diagnostics.extend(
        prior.diagnostics[old[resumed].diagnostics..]
            .iter()
            .map(|d| d.shifted(delta)),
    );
    Ok(Document {
        source: parser.lexer.source().clone(),
        root: crate::tree::Node::branch(crate::tree::Tag::Document, top_level.children),
        diagnostics,
        interner: parser.interner,
        checkpoints: top_level.checkpoints,
        end: prior.end.shifted(delta, diagnostics_delta),
        scopes: prior.scopes.clone(),
        open_scopes: prior.open_scopes.clone(),
        cancelled: false,
        reused: reused_prefix + reused_suffix,
        options: prior.options.clone(),
    })
}

/// The index of the old checkpoint the new parse can continue from, if any.
fn resync_point(
    old: &[Checkpoint],
    first: usize,
    checkpoint: &Checkpoint,
    edit: &Edit,
    edited_end: usize,
    delta: isize,
) -> Option<usize> {
    let pos = checkpoint.lexer.pos;
    if pos < edited_end {
        return None;
    }
    let old_pos = pos.checked_add_signed(-delta)?;
    if old_pos < edit.range.end {
        return None;
    }
    let candidates = &old[first..];
    let from = candidates.partition_point(|c| c.lexer.pos < old_pos);
    candidates[from..]
        .iter()
        .take_while(|c| c.lexer.pos == old_pos)
        .position(|c| c.same_state(checkpoint))
        .map(|i| first + from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;
    use crate::grammar::*;
    use crate::scope::Mode;
    use crate::{parse, ParseOptions};

    fn registry() -> Registry {
        Registry::new().with_commands([
            CommandDecl::new("def")
                .with_parameters(vec![
                    token(TokenClass::ControlSequence),
                    repeat(choice(
                        token(TokenClass::ParameterRef),
                        token(TokenClass::Text),
                    )),
                    Pattern::NilGroup,
                ])
                .with_effect(Effect::Define)
                .local(),
            CommandDecl::new("section").with_parameters(vec![group()]),
        ])
    }

    fn check(source: &str, edit: Edit) -> Document {
        let registry = registry();
        let prior = parse(source, Mode::Text, &registry);
        let reparsed = match reparse(&prior, &edit, &registry) {
            Ok(document) => document,
            Err(err) => panic!("{err}"),
        };
        let edited = match edit.apply(source) {
            Ok(edited) => edited,
            Err(err) => panic!("{err}"),
        };
        let fresh = parse(&edited, Mode::Text, &registry);
        assert_eq!(reparsed.source(), edited);
        assert_eq!(reparsed.to_sexp(), fresh.to_sexp());
        assert_eq!(reparsed.diagnostics(), fresh.diagnostics());
        assert_eq!(reparsed.write_source(), edited);
        reparsed
    }

    #[test]
    fn edit_inside_group() {
        let document = check(
            "\\section{A} {b} \\section{C}",
            Edit::new(13..14, "bb"),
        );
        assert!(document.reused() >= 3, "reused {}", document.reused());
    }

    #[test]
    fn edit_changes_following_groups() {
        check("{a} {b} {c}", Edit::insert(2, "{"));
        check("{a} {b} {c}", Edit::delete(2..3));
    }

    #[test]
    fn edit_changes_definition() {
        let document = check("\\def\\x{1}\\x{a}b", Edit::insert(6, "#1"));
        assert_eq!(document.diagnostic_kinds(), Vec::<Kind>::new());
        check("\\def\\x#1{1}\\x{a}b", Edit::delete(6..8));
    }

    #[test]
    fn edit_at_end() {
        let document = check("{a}{b}", Edit::insert(6, "{c"));
        assert_eq!(document.diagnostic_kinds(), vec![Kind::UnbalancedGroup]);
        assert_eq!(document.reused(), 2);
    }

    #[test]
    fn edit_at_start() {
        let document = check("a{b}{c}", Edit::new(0..1, "xyz"));
        assert_eq!(document.reused(), 2);
    }

    #[test]
    fn invalid_edit() {
        let registry = registry();
        let prior = parse("abc", Mode::Text, &registry);
        assert_eq!(
            reparse(&prior, &Edit::new(2..5, ""), &registry).map(|d| d.reused()),
            Err(InvalidEdit { range: 2..5, len: 3 })
        );
    }

    #[test]
    fn cancelled_prior_is_reparsed() {
        let registry = registry();
        let options = ParseOptions::default().with_max_tokens(2);
        let prior = crate::parse_with_options("{abc}", &options, &registry, None);
        assert!(prior.is_cancelled());
        let document = match reparse(&prior, &Edit::insert(0, "x"), &registry) {
            Ok(document) => document,
            Err(err) => panic!("{err}"),
        };
        assert!(document.is_cancelled());
        assert_eq!(document.reused(), 0);
    }
}
