//! Category codes and catcode tables.
//!
//! The following table lists all 16 category codes in TeX. Names marked with * never
//! appear as the category of a significant token; the lexer either folds them into
//! other tokens or emits them as trivia.
//!
//! | name           | #  | e.g. | description |
//! |----------------|----|------|-------------|
//! | `Escape`*      | 0  | `\`  | Begins a control sequence.
//! | `BeginGroup`   | 1  | `{`  | Starts a new group/scope.
//! | `EndGroup`     | 2  | `}`  | Ends a group/scope.
//! | `MathShift`    | 3  | `$`  | Enters or leaves math mode.
//! | `AlignmentTab` | 4  | `&`  |
//! | `EndOfLine`*   | 5  | `\n` | Folds to a space; two in a row make a paragraph break.
//! | `Parameter`    | 6  | `#`  | Begins a parameter reference in a macro definition.
//! | `Superscript`  | 7  | `^`  |
//! | `Subscript`    | 8  | `_`  |
//! | `Ignored`*     | 9  |      | Dropped by TeX's input processor.
//! | `Space`        | 10 | ` `  |
//! | `Letter`       | 11 | `A`  | May appear in multi-character control sequence names.
//! | `Other`        | 12 | `@`  |
//! | `Active`       | 13 | `~`  | A one-character command.
//! | `Comment`*     | 14 | `%`  | Discards the rest of the line.
//! | `Invalid`*     | 15 |      | Reading one is an error.
use std::collections::HashMap;

use CatCode::*;

/// A TeX category code.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CatCode {
    Escape,
    BeginGroup,
    EndGroup,
    MathShift,
    AlignmentTab,
    EndOfLine,
    Parameter,
    Superscript,
    Subscript,
    Ignored,
    Space,
    Letter,
    #[default]
    Other,
    Active,
    Comment,
    Invalid,
}

impl CatCode {
    pub fn int(&self) -> u8 {
        match self {
            Escape => 0,
            BeginGroup => 1,
            EndGroup => 2,
            MathShift => 3,
            AlignmentTab => 4,
            EndOfLine => 5,
            Parameter => 6,
            Superscript => 7,
            Subscript => 8,
            Ignored => 9,
            Space => 10,
            Letter => 11,
            Other => 12,
            Active => 13,
            Comment => 14,
            Invalid => 15,
        }
    }

    pub fn from_int(int: u8) -> Option<CatCode> {
        Some(match int {
            0 => Escape,
            1 => BeginGroup,
            2 => EndGroup,
            3 => MathShift,
            4 => AlignmentTab,
            5 => EndOfLine,
            6 => Parameter,
            7 => Superscript,
            8 => Subscript,
            9 => Ignored,
            10 => Space,
            11 => Letter,
            12 => Other,
            13 => Active,
            14 => Comment,
            15 => Invalid,
            _ => return None,
        })
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Escape => "escape",
            BeginGroup => "begin group",
            EndGroup => "end group",
            MathShift => "math shift",
            AlignmentTab => "alignment tab",
            EndOfLine => "end of line",
            Parameter => "parameter",
            Superscript => "superscript",
            Subscript => "subscript",
            Ignored => "ignored",
            Space => "space",
            Letter => "letter",
            Other => "other",
            Active => "active",
            Comment => "comment",
            Invalid => "invalid",
        }
    }

    /// Category codes of the first 128 characters in initex.
    pub const INITEX_DEFAULTS: [CatCode; 128] = {
        let mut table = [Other; 128];
        table[0] = Ignored;
        table[b'\n' as usize] = EndOfLine;
        table[b'\r' as usize] = EndOfLine;
        table[b' ' as usize] = Space;
        table[b'%' as usize] = Comment;
        table[b'\\' as usize] = Escape;
        table[0x7f] = Invalid;
        let mut c = b'a';
        while c <= b'z' {
            table[c as usize] = Letter;
            table[(c - b'a' + b'A') as usize] = Letter;
            c += 1;
        }
        table
    };

    /// Category codes of the first 128 characters in a LaTeX document body.
    pub const LATEX_DEFAULTS: [CatCode; 128] = {
        let mut table = CatCode::INITEX_DEFAULTS;
        table[0] = Other;
        table[b'\t' as usize] = Space;
        table[b'{' as usize] = BeginGroup;
        table[b'}' as usize] = EndGroup;
        table[b'$' as usize] = MathShift;
        table[b'&' as usize] = AlignmentTab;
        table[b'#' as usize] = Parameter;
        table[b'^' as usize] = Superscript;
        table[b'_' as usize] = Subscript;
        table[b'~' as usize] = Active;
        table
    };
}

impl std::fmt::Display for CatCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.to_str(), self.int())
    }
}

/// A complete assignment of category codes to characters.
///
/// This is the base layer under all scoped overrides. ASCII characters are stored in a
/// flat array; everything else falls back to a map, and then to the table's rule for
/// non-ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatCodeTable {
    low: [CatCode; 128],
    high: HashMap<char, CatCode>,
    unicode_letters: bool,
}

impl CatCodeTable {
    /// The initex table: non-ASCII characters are [Other].
    pub fn initex() -> CatCodeTable {
        CatCodeTable {
            low: CatCode::INITEX_DEFAULTS,
            high: Default::default(),
            unicode_letters: false,
        }
    }

    /// The LaTeX document table. Non-ASCII alphabetic characters are letters, as in
    /// the Unicode TeX engines.
    pub fn latex() -> CatCodeTable {
        CatCodeTable {
            low: CatCode::LATEX_DEFAULTS,
            high: Default::default(),
            unicode_letters: true,
        }
    }

    pub fn get(&self, c: char) -> CatCode {
        match self.low.get(c as usize) {
            Some(cat_code) => *cat_code,
            None => match self.high.get(&c) {
                Some(cat_code) => *cat_code,
                None if self.unicode_letters && c.is_alphabetic() => Letter,
                None => Other,
            },
        }
    }

    pub fn set(&mut self, c: char, cat_code: CatCode) {
        match self.low.get_mut(c as usize) {
            Some(slot) => *slot = cat_code,
            None => {
                self.high.insert(c, cat_code);
            }
        }
    }
}

impl Default for CatCodeTable {
    fn default() -> Self {
        CatCodeTable::latex()
    }
}

/// A category code assigned to every character in an inclusive range.
///
/// Catcode-changing commands and environments are declared with lists of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatCodeRange {
    pub first: char,
    pub last: char,
    pub cat_code: CatCode,
}

impl CatCodeRange {
    pub const fn single(c: char, cat_code: CatCode) -> CatCodeRange {
        CatCodeRange {
            first: c,
            last: c,
            cat_code,
        }
    }

    pub const fn new(first: char, last: char, cat_code: CatCode) -> CatCodeRange {
        CatCodeRange {
            first,
            last,
            cat_code,
        }
    }

    pub fn chars(&self) -> impl Iterator<Item = char> {
        self.first..=self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        for i in 0..16_u8 {
            assert_eq!(CatCode::from_int(i).map(|c| c.int()), Some(i));
        }
        assert_eq!(CatCode::from_int(16), None);
    }

    #[test]
    fn latex_defaults() {
        let table = CatCodeTable::latex();
        assert_eq!(table.get('\\'), Escape);
        assert_eq!(table.get('@'), Other);
        assert_eq!(table.get('~'), Active);
        assert_eq!(table.get('\t'), Space);
        assert_eq!(table.get('é'), Letter);
        assert_eq!(table.get('→'), Other);
    }

    #[test]
    fn set_high_character() {
        let mut table = CatCodeTable::initex();
        assert_eq!(table.get('é'), Other);
        table.set('é', Active);
        assert_eq!(table.get('é'), Active);
        table.set('@', Letter);
        assert_eq!(table.get('@'), Letter);
    }
}
