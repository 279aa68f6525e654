#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod group;

/// A HashMap implementation backed by the extendible hash table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

/// The core table: tagged probe groups behind an extendible-hash directory.
pub mod hash_table;

/// A hash set implementation backed by the extendible hash table.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers.
pub mod hash_set;

pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::Error;
pub use hash_table::HashTable;

/// Default hasher builder for [`HashMap`] and [`HashSet`].
#[cfg(feature = "foldhash")]
pub type DefaultHashBuilder = foldhash::fast::RandomState;
