/// Configuration default values
///
/// All default values for configuration options live here so they can be
/// changed in one place.
use std::time::Duration;

// Server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9000;

// Media server defaults
pub const DEFAULT_MEDIA_SERVER_ADDR: &str = "http://127.0.0.1:8096";
pub const DEFAULT_MEDIA_SERVER_TIMEOUT: Duration = Duration::from_secs(15);

// Redirect resolution defaults
pub const MAX_REDIRECT_ATTEMPTS: usize = 10;
pub const DEFAULT_REDIRECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REDIRECT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_REDIRECT_CACHE_CAPACITY: usize = 1024;

// Storage defaults
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

// Subtitle defaults
pub const DEFAULT_ASS_STYLE: &[&str] = &[
    "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding",
    "Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,1,0,2,10,10,10,1",
];
