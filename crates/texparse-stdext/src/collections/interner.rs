//! String interner
//!
//! Control sequence names are compared and hashed constantly while parsing.
//! The interner maps each distinct name to a small integer key so that
//!     tokens stay `Copy` and comparisons are integer comparisons.
//!
//! Keys are dense and assigned in insertion order. An interner only ever grows,
//!     so a key obtained from an interner stays valid in every clone made later.
//! The incremental parser relies on this: a reparse starts from a clone of the
//!     previous interner and reuses subtrees holding keys from it.
//!
//! ```
//! # use texparse_stdext::collections::interner::Interner;
//! let mut interner: Interner = Default::default();
//! let hello = interner.get_or_intern("hello");
//! assert_eq!(interner.get_or_intern("hello"), hello);
//! assert_eq!(interner.resolve(hello), Some("hello"));
//! ```
use std::collections::HashMap;
use std::num;
use std::rc::Rc;

/// Types implementing this trait can be used as keys in the [Interner].
pub trait Key: Copy {
    /// Create a key from an index. The first string interned gets index 0.
    fn try_from_usize(index: usize) -> Option<Self>;

    /// Convert the key back into the index it was created from.
    fn into_usize(self) -> usize;
}

impl Key for num::NonZeroU32 {
    fn try_from_usize(index: usize) -> Option<Self> {
        let u: u32 = index.checked_add(1)?.try_into().ok()?;
        num::NonZeroU32::new(u)
    }

    fn into_usize(self) -> usize {
        self.get() as usize - 1
    }
}

/// String interner.
#[derive(Debug, Clone)]
pub struct Interner<K = num::NonZeroU32> {
    strings: Vec<Rc<str>>,
    keys: HashMap<Rc<str>, K>,
}

impl<K> Default for Interner<K> {
    fn default() -> Self {
        Self {
            strings: Default::default(),
            keys: Default::default(),
        }
    }
}

impl<K: Key> Interner<K> {
    /// Intern the provided string and return its key.
    ///
    /// # Panics
    ///
    /// Panics if the key type cannot represent the number of distinct strings.
    pub fn get_or_intern(&mut self, s: &str) -> K {
        if let Some(key) = self.keys.get(s) {
            return *key;
        }
        let key = match K::try_from_usize(self.strings.len()) {
            Some(key) => key,
            None => panic!("interner key space exhausted after {} strings", self.strings.len()),
        };
        let s: Rc<str> = s.into();
        self.strings.push(s.clone());
        self.keys.insert(s, key);
        key
    }

    /// Get the key for the provided string if it has already been interned.
    pub fn get(&self, s: &str) -> Option<K> {
        self.keys.get(s).copied()
    }

    /// Return the interned string corresponding to the provided key.
    pub fn resolve(&self, k: K) -> Option<&str> {
        self.strings.get(k.into_usize()).map(AsRef::as_ref)
    }

    /// Number of distinct strings interned.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(feature = "serde")]
impl<K> serde::Serialize for Interner<K> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.strings.len()))?;
        for s in &self.strings {
            seq.serialize_element(s.as_ref())?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, K: Key> serde::Deserialize<'de> for Interner<K> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let strings: Vec<String> = serde::Deserialize::deserialize(deserializer)?;
        let mut interner: Interner<K> = Default::default();
        for s in strings {
            interner.get_or_intern(&s);
        }
        Ok(interner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_across_clones() {
        let mut interner: Interner = Default::default();
        let hello = interner.get_or_intern("hello");
        let mut clone = interner.clone();
        let world = clone.get_or_intern("world");
        assert_eq!(clone.resolve(hello), Some("hello"));
        assert_eq!(clone.resolve(world), Some("world"));
        assert_eq!(interner.resolve(world), None);
        assert_eq!(clone.get_or_intern("hello"), hello);
    }

    #[test]
    fn get_does_not_intern() {
        let mut interner: Interner = Default::default();
        assert_eq!(interner.get("par"), None);
        let par = interner.get_or_intern("par");
        assert_eq!(interner.get("par"), Some(par));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn empty_string_is_a_valid_name() {
        let mut interner: Interner = Default::default();
        let empty = interner.get_or_intern("");
        assert_eq!(interner.resolve(empty), Some(""));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let mut interner: Interner = Default::default();
        let hello_1 = interner.get_or_intern("hello");
        let world_1 = interner.get_or_intern("world");

        let serialized = serde_json::to_string_pretty(&interner).unwrap();
        let mut interner_de: Interner = serde_json::from_str(&serialized).unwrap();
        assert_eq!(interner_de.get_or_intern("hello"), hello_1);
        assert_eq!(interner_de.get_or_intern("world"), world_1);
    }
}
