//! Output side of the pipeline: CSV artifacts and table loads

pub mod artifact;
pub mod sqlite;

pub use artifact::{cell_text, write_csv, ArtifactWriter};
pub use sqlite::{SqliteLoader, TableLoader};
