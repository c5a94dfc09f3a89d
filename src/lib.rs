//! library-cli — a book catalog kept in a single JSON file.
//!
//! Layers:
//! - `domain`: records, the ordered catalog, and the persistence trait
//! - `application`: `RecordStore`, which couples every mutation to a save
//! - `infra`: the JSON file repository (atomic write, advisory lock)
//! - `interface`: the `library` command-line surface

pub mod application;
pub mod domain;
pub mod infra;
pub mod interface;
