//! A cursor over a shared string.
//!
//! The lexer and the verbatim scanner both walk the same source. [Cursor] owns a
//! reference-counted handle to it so positions can be saved and restored freely,
//! and it remembers the furthest byte ever looked at.

use std::rc::Rc;

/// Byte-position cursor over a shared string with a high-water mark.
#[derive(Debug, Clone)]
pub struct Cursor {
    s: Rc<str>,
    pos: usize,
    high_water: usize,
}

impl Cursor {
    pub fn new(s: Rc<str>) -> Cursor {
        Cursor {
            s,
            pos: 0,
            high_water: 0,
        }
    }

    pub fn str(&self) -> &str {
        &self.s
    }

    pub fn shared_str(&self) -> &Rc<str> {
        &self.s
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor. The position must be on a char boundary.
    pub fn set_pos(&mut self, pos: usize) {
        debug_assert!(self.s.is_char_boundary(pos));
        self.pos = pos;
    }

    /// The furthest position examined so far, exclusive.
    ///
    /// Observing the end of the string counts as examining one byte past it.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Look at the character `offset` bytes ahead of the cursor without moving.
    #[inline]
    pub fn peek_at(&mut self, offset: usize) -> Option<char> {
        let start = self.pos + offset;
        match self.s.get(start..).and_then(|rest| rest.chars().next()) {
            Some(c) => {
                self.high_water = self.high_water.max(start + c.len_utf8());
                Some(c)
            }
            None => {
                self.high_water = self.high_water.max(self.s.len() + 1);
                None
            }
        }
    }

    #[inline]
    pub fn peek(&mut self) -> Option<char> {
        self.peek_at(0)
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.s.len()
    }
}

impl std::iter::Iterator for Cursor {
    type Item = char;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let c_opt = self.peek();
        if let Some(c) = c_opt {
            self.pos += c.len_utf8();
        }
        c_opt
    }
}
