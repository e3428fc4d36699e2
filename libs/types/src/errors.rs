//! Error types for record validation
//!
//! Taxonomy using thiserror; transport- and store-level errors live with
//! their owning components in the service crate.

use thiserror::Error;

/// A raw record that cannot enter a snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record has an empty address")]
    EmptyAddress,

    #[error("negative quantity for {field}: {value}")]
    NegativeQuantity { field: String, value: f64 },
}
