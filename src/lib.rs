#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Hashing strategies for table elements.
///
/// Tables are parameterized by a stateless [`hash::ElementHasher`]; the
/// [`hash::DefaultHasher`] covers every `T: Hash`.
pub mod hash;

/// A key-value map built on the open-addressing `HashTable`.
///
/// This module provides a `HashMap` that stores keys and values together in
/// `Bucket`s and probes the table by key alone.
pub mod hash_map;

/// The open-addressing hash table with per-slot metadata bytes.
pub mod hash_table;

pub use hash::DefaultHasher;
pub use hash::ElementHasher;
pub use hash_map::HashMap;
pub use hash_table::HashTable;
pub use hash_table::InsertResult;
pub use hash_table::RemoveResult;
