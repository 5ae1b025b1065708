pub mod item;
pub mod playback;

pub use item::{BaseItem, ItemResult};
pub use playback::{MediaSourceDescriptor, PlaybackInfoResponse};
