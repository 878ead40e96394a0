//! Data structures and algorithms used by the texparse engine.
//!
//! Nothing in this crate knows about TeX; it is a small toolbox of generic
//! pieces the engine is built from.

pub mod algorithms;
pub mod collections;
pub mod color;
pub mod str;
