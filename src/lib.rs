//! # Kiln - flatten paginated JSON collections into tables
//!
//! Turns a paginated JSON resource collection into flat, load-ready tables
//! with reproducible column layouts.
//!
//! ## Modules
//!
//! - **fetch**: page-by-page retrieval of a resource collection
//! - **flatten**: normalize, expand, explode, key and reorder tables
//! - **resources**: the rules for products, reviews and carts
//! - **sink**: CSV artifacts and table loads
//! - **pipeline**: end-to-end runs driven by an explicit [`EtlConfig`]
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln::flatten::{expand_array, explode, normalize, ExplodeSpec};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = serde_json::from_value::<Vec<kiln::Record>>(json!([
//!     {"id": 1, "images": ["a.png", "b.png"], "meta": {"barcode": "123"},
//!      "reviews": [{"rating": 5}, {"rating": 3}]},
//!     {"id": 2, "images": ["c.png"], "meta": {"barcode": "456"}, "reviews": []}
//! ]))?;
//!
//! let base = normalize(&records);
//! assert_eq!(base.columns(), ["id", "images", "meta.barcode", "reviews"]);
//!
//! let products = expand_array(&base, "images", "image")?;
//! assert_eq!(products.rows()[1]["image_2"], serde_json::Value::Null);
//!
//! let reviews = explode(&base, &ExplodeSpec::new("reviews").carrying("id", "product_id"))?;
//! assert_eq!(reviews.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod pipeline;
pub mod resources;
pub mod sink;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{DatabaseConfig, EtlConfig};
pub use error::{EtlError, Result};
pub use fetch::{Fetcher, HttpTransport, Transport};
pub use pipeline::{Pipeline, RunReport, TableSummary};
pub use resources::Resource;
pub use sink::{ArtifactWriter, SqliteLoader, TableLoader};
pub use types::{ColumnMapping, Record, ResourceKey, Table};
