//! Rendering diagnostics against their source code.
//!
//! ```text
//! Error: `\begingroup` closed by `\egroup`
//!  >>> input.tex:1:12
//!   |
//! 1 | \begingroup\egroup
//!   |            ^^^^^^^ GroupKindMismatchError
//! ```

use super::{Diagnostic, Kind};
use crate::token::Span;
use texparse_stdext::color::Colorize;

/// A diagnostic together with the source it refers to.
pub struct Rendered<'a> {
    pub(super) diagnostic: &'a Diagnostic,
    pub(super) file_name: &'a str,
    pub(super) source: &'a str,
}

/// Location of a span within its source.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceCodeTrace {
    /// Content of the line the span starts on, without the line ending.
    pub line_content: String,
    /// Number of the line, starting at 1.
    pub line_number: usize,
    /// Index in characters within the line that the span starts.
    pub index: usize,
    /// Number of characters of the span on its first line; at least 1.
    pub width: usize,
}

impl SourceCodeTrace {
    pub fn new(source: &str, span: Span) -> SourceCodeTrace {
        let start = floor_char_boundary(source, span.start.min(source.len()));
        let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = source[start..]
            .find(['\n', '\r'])
            .map(|i| start + i)
            .unwrap_or(source.len());
        let line_number = source[..start].matches('\n').count() + 1;
        let index = source[line_start..start].chars().count();
        let end = floor_char_boundary(source, span.end.clamp(start, line_end));
        let width = source[start..end].chars().count().max(1);
        SourceCodeTrace {
            line_content: source[line_start..line_end].to_string(),
            line_number,
            index,
            width,
        }
    }
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn paint(kind: Kind, s: String) -> String {
    match kind {
        Kind::UnterminatedVerbatim | Kind::UnterminatedMath => s.bright_yellow().to_string(),
        _ => s.bright_red().to_string(),
    }
}

impl<'a> std::fmt::Display for Rendered<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = self.diagnostic;
        let s = SourceCodeTrace::new(self.source, d.span());
        let margin = " ".repeat(s.line_number.to_string().len() + 1);
        writeln!(
            f,
            "{}: {}",
            paint(d.kind(), "Error".to_string()).bold(),
            d.title().bold()
        )?;
        writeln!(
            f,
            "{}{} {}:{}:{}",
            &margin[1..],
            ">>>".bright_cyan().bold(),
            self.file_name,
            s.line_number,
            s.index + 1
        )?;
        writeln!(f, "{}{}", margin, "|".bright_cyan())?;
        writeln!(
            f,
            "{} {}{}",
            s.line_number.to_string().bright_cyan(),
            "| ".bright_cyan(),
            s.line_content.trim_end()
        )?;
        writeln!(
            f,
            "{}{}{}{} {}",
            margin,
            "| ".bright_cyan(),
            " ".repeat(s.index),
            paint(d.kind(), "^".repeat(s.width)).bold(),
            paint(d.kind(), d.kind().name().to_string()),
        )?;
        for note in d.notes() {
            writeln!(f, "{}{}", margin, "|".bright_cyan())?;
            writeln!(
                f,
                "{}{} {} {}",
                margin,
                "=".bright_cyan(),
                "note:".bold(),
                note
            )?;
        }
        Ok(())
    }
}
