//! Field extraction from document text

pub mod fields;

pub use fields::{extract_fields, ExtractedFields};
