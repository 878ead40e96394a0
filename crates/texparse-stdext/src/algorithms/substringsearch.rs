//! Knuth–Morris–Pratt substring search
//!
//! Finds a fixed substring inside a string whose elements arrive one at a time.
//! Delimited macro arguments are the motivating case: the delimiter is known
//! when the macro is defined, but the tokens of the argument only become
//! available as the parser pulls them from the input.
//!
//! A [Matcher] is built once per substring and precomputes the prefix function.
//! Each scan of a string gets its own [Search].
//!
//! ```
//! # use texparse_stdext::algorithms::substringsearch::Matcher;
//! let matcher = Matcher::new(vec![2, 3, 2]).unwrap();
//! let mut search = matcher.start();
//! assert_eq![search.next(&1), false];
//! assert_eq![search.next(&2), false];
//! assert_eq![search.next(&3), false];
//! assert_eq![search.next(&2), true];
//! assert_eq![search.next(&3), false];
//! assert_eq![search.next(&2), true];
//! ```

/// Data structure used to match a specific, non-empty substring in many strings.
#[derive(Debug, Clone)]
pub struct Matcher<T: PartialEq> {
    substring: Vec<T>,
    prefix_fn: Vec<usize>,
}

impl<T: PartialEq> PartialEq for Matcher<T> {
    fn eq(&self, other: &Self) -> bool {
        self.substring == other.substring
    }
}

impl<T: Eq> Eq for Matcher<T> {}

impl<T: PartialEq> Matcher<T> {
    /// Create a new matcher for the provided substring.
    ///
    /// Returns [None] if the substring is empty; the empty string matches everywhere
    /// and there is nothing to search for.
    pub fn new(substring: Vec<T>) -> Option<Matcher<T>> {
        if substring.is_empty() {
            return None;
        }
        let mut prefix_fn = Vec::with_capacity(substring.len());
        prefix_fn.push(0);
        let mut k = 0;
        for i in 1..substring.len() {
            while k > 0 && substring[k] != substring[i] {
                k = prefix_fn[k - 1];
            }
            if substring[k] == substring[i] {
                k += 1;
            }
            prefix_fn.push(k);
        }
        Some(Matcher {
            substring,
            prefix_fn,
        })
    }

    /// Start a new substring search.
    pub fn start(&self) -> Search<T> {
        Search {
            matcher: self,
            q: 0,
        }
    }

    /// The substring being searched for.
    pub fn substring(&self) -> &[T] {
        &self.substring
    }
}

/// An in-progress search for a substring within one string.
pub struct Search<'a, T: PartialEq> {
    matcher: &'a Matcher<T>,
    q: usize,
}

impl<'a, T: PartialEq> Search<'a, T> {
    /// Provide the next element of the string.
    ///
    /// Returns true if the last `m` elements passed in equal the substring,
    /// where `m` is the length of the substring.
    pub fn next(&mut self, tail: &T) -> bool {
        let substring = &self.matcher.substring;
        while self.q > 0 && &substring[self.q] != tail {
            self.q = self.matcher.prefix_fn[self.q - 1];
        }
        if &substring[self.q] == tail {
            self.q += 1;
        }
        if self.q == substring.len() {
            self.q = self.matcher.prefix_fn[self.q - 1];
            return true;
        }
        false
    }

    /// Number of trailing elements currently matching a prefix of the substring.
    pub fn partial_match_len(&self) -> usize {
        self.q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_positions(substring: &str, string: &str) -> Vec<usize> {
        let matcher = Matcher::new(substring.chars().collect()).unwrap();
        let mut search = matcher.start();
        string
            .chars()
            .enumerate()
            .filter_map(|(i, c)| if search.next(&c) { Some(i) } else { None })
            .collect()
    }

    macro_rules! substring_search_tests {
        ($( ( $name: ident, $substring: expr, $string: expr, $expected: expr ), )+) => {
            $(
            #[test]
            fn $name() {
                assert_eq!(match_positions($substring, $string), $expected);
            }
            )+
        };
    }

    substring_search_tests![
        (single_element, "a", "banana", vec![1, 3, 5]),
        (overlapping_matches, "ana", "banana", vec![3, 5]),
        (no_match, "xyz", "banana", Vec::<usize>::new()),
        (repeated_prefix, "aab", "aaab", vec![3]),
        (whole_string, "banana", "banana", vec![5]),
        (longer_than_string, "bananas", "banana", Vec::<usize>::new()),
    ];

    #[test]
    fn empty_substring_is_rejected() {
        assert!(Matcher::<char>::new(vec![]).is_none());
    }

    #[test]
    fn partial_match_len() {
        let matcher = Matcher::new(vec!['a', 'b', 'c']).unwrap();
        let mut search = matcher.start();
        search.next(&'a');
        search.next(&'b');
        assert_eq!(search.partial_match_len(), 2);
        search.next(&'x');
        assert_eq!(search.partial_match_len(), 0);
    }
}
