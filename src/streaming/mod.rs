//! STRM placeholder handling.
//!
//!   - classification: path-prefix rules deciding which kind of STRM an entry is.
pub mod classification;

pub use classification::{StrmClassification, StrmClassifier};
