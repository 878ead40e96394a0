//! Diagnostics
//!
//! Parsing never fails. Every fault found in the input becomes a [Diagnostic] and,
//! where it interrupts a construct, an error node in the tree; the parser then
//! carries on. A document's diagnostics are in source order of detection.

use crate::token::Span;

pub mod display;

/// The type of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// A group closed with nothing open, or left open at a boundary.
    UnbalancedGroup,
    /// A group closed by a construct of another kind, e.g. `\begingroup ... \egroup`.
    GroupKindMismatch,
    UnexpectedToken,
    /// A required element of a command's parameter pattern did not match.
    ParameterMatch,
    /// `\end{name}` does not match the open `\begin{name}`.
    EnvironmentNameMismatch,
    /// Verbatim text without its closing delimiter.
    UnterminatedVerbatim,
    /// Math mode without its closing shift.
    UnterminatedMath,
    /// A character with category code 15.
    InvalidCharacter,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::UnbalancedGroup => "UnbalancedGroupError",
            Kind::GroupKindMismatch => "GroupKindMismatchError",
            Kind::UnexpectedToken => "UnexpectedTokenError",
            Kind::ParameterMatch => "ParameterMatchError",
            Kind::EnvironmentNameMismatch => "EnvironmentNameMismatchError",
            Kind::UnterminatedVerbatim => "UnterminatedVerbatimError",
            Kind::UnterminatedMath => "UnterminatedMathError",
            Kind::InvalidCharacter => "InvalidCharacterError",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A fault found in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    kind: Kind,
    span: Span,
    title: String,
    notes: Vec<String>,
}

impl Diagnostic {
    pub fn new<T: Into<String>>(kind: Kind, span: Span, title: T) -> Diagnostic {
        Diagnostic {
            kind,
            span,
            title: title.into(),
            notes: vec![],
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Diagnostic {
        self.notes.push(note.into());
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// One-line description of the fault.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn shifted(&self, delta: isize) -> Diagnostic {
        Diagnostic {
            span: self.span.shifted(delta),
            ..self.clone()
        }
    }

    /// A view of the diagnostic that renders it against its source.
    pub fn display<'a>(&'a self, file_name: &'a str, source: &'a str) -> display::Rendered<'a> {
        display::Rendered {
            diagnostic: self,
            file_name,
            source,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.span, self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifted_keeps_message() {
        let diagnostic = Diagnostic::new(Kind::UnterminatedMath, Span::new(4, 5), "missing `$`")
            .with_note("math started here");
        let shifted = diagnostic.shifted(-2);
        assert_eq!(shifted.span(), Span::new(2, 3));
        assert_eq!(shifted.title(), "missing `$`");
        assert_eq!(shifted.notes(), diagnostic.notes());
    }

    #[test]
    fn plain_display() {
        let diagnostic = Diagnostic::new(Kind::InvalidCharacter, Span::new(0, 1), "invalid");
        assert_eq!(
            diagnostic.to_string(),
            "InvalidCharacterError at 0..1: invalid"
        );
    }
}
