//! Table transforms - flatten nested records into fixed, ordered columns
//!
//! Every transform is a pure function from an input [`Table`](crate::Table)
//! to a new one:
//!
//! - **normalize**: nested mappings become dotted-path columns
//! - **expand**: a list-of-scalars field becomes `<prefix>_1..<prefix>_N`
//! - **explode**: a list-of-mappings field becomes one row per element
//! - **keys**: sequential surrogate keys for exploded rows
//! - **order**: projection onto a canonical column layout

pub mod normalize;
pub mod literal;
pub mod expand;
pub mod explode;
pub mod keys;
pub mod order;

pub use normalize::{flatten_record, normalize, Normalizer};
pub use literal::{parse_literal, read_list, LiteralError, ListPolicy};
pub use expand::{expand_array, indexed_columns};
pub use explode::{explode, Carry, ExplodeSpec};
pub use keys::{assign_surrogate_keys, SurrogateKeys};
pub use order::{reorder, CanonicalOrder, ColumnSlot};
