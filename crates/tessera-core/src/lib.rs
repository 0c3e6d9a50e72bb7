//! # tessera-core
//!
//! Core types and validation logic for tessera controlled lists.
//!
//! This crate holds everything about controlled vocabulary lists and
//! the reference value type that does not touch storage: the data
//! model, the tile value contracts (parse, validate, serialize,
//! projection), label ranking, and export assembly. The PostgreSQL
//! layer lives in `tessera-db`.

pub mod error;
pub mod export;
pub mod models;
pub mod ranking;
pub mod reference;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result, ValidationIssue};
pub use export::serialize_list;
pub use models::*;
pub use ranking::{best_label, rank_label};
pub use reference::{
    NodeConfig, ParseError, Reference, ReferenceLabel, ReferenceProjection, TileInput,
};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
