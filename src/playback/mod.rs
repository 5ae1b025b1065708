//! Playback-info rewriting rules

pub mod params;
pub mod policy;

pub use params::extract_preserved_params;
pub use policy::{apply_policy, PolicyOutcome, PolicySettings, SizeLookup, StreamPathTemplate};
