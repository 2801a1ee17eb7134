//! # obelisk-column
//!
//! A columnar container for semi-structured object values. Each row is a
//! mapping from dotted string paths to heterogeneous scalars, stored in a
//! layout optimized for analytic scans, merges, and bounded schema growth.
//!
//! ## Core type
//!
//! [`object::ObjectColumn`] holds three coherent sub-stores:
//! - *typed paths*, declared at construction, as dense
//!   [`typed::TypedColumn`]s,
//! - up to `max_dynamic_paths` *dynamic paths* discovered at ingest time,
//!   as self-describing [`dynamic::DynamicColumn`]s,
//! - a per-row *shared data* overflow ([`shared::SharedDataStore`]) holding
//!   every further path as a sorted binary map.
//!
//! Rows go in through `insert`/`try_insert`/`insert_range_from`, come back
//! out through `read_row`, and query operators consume rearranged views via
//! `filter`/`permute`/`index_values`/`replicate`/`scatter`. Rows spill to
//! shuffle buffers through the arena codec and whole columns through the
//! lz4 compression wrapper. At merge time,
//! `take_dynamic_structure_from_source_columns` reshapes the dynamic path
//! set to the statistically densest paths across all merge sources.
//!
//! ## Storage primitives
//!
//! - [`values::Values`]: raw byte buffer with typed element access
//! - [`offsets::Offsets`]: monotone offsets for variable-length data
//! - [`presence::Presence`]: trivial / all-null / per-byte null tracking
//! - [`binary::BinaryColumn`]: variable-length byte values
//! - [`paths::PathTable`]: path-to-column map with hashed membership
//! - [`codec::ValueCodec`]: single-scalar binary encoding

pub mod binary;
pub mod codec;
pub mod column;
pub mod compress;
pub mod dynamic;
pub mod object;
pub mod offsets;
pub mod paths;
pub mod presence;
pub mod shared;
pub mod typed;
pub mod value;
pub mod values;

mod arena;
mod bulk;
mod merge;

pub use column::ColumnOps;
pub use object::{ObjectColumn, Statistics, StatisticsSource};
pub use value::{ObjectRow, Scalar, ScalarKind};
