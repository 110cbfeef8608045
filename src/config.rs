use std::env;

/// Default duration, in 90kHz ticks, given to a video sample that has no
/// neighbour to measure against (one frame at 30fps).
pub const DEFAULT_VIDEO_SAMPLE_DURATION: u32 = 3000;

/// Transmuxer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Video width/height announced by the manifest (`RESOLUTION=`).
    /// When absent the dimensions are parsed out of the SPS.
    pub video_dimensions: Option<(u32, u32)>,
    /// Verify the CRC-32/MPEG-2 of PAT and PMT sections.
    pub verify_psi_crc: bool,
    /// Duration of a lone video sample, in 90kHz ticks.
    pub default_video_sample_duration: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_dimensions: None,
            verify_psi_crc: false,
            default_video_sample_duration: DEFAULT_VIDEO_SAMPLE_DURATION,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from defaults overridden by `HLSMUX_*`
    /// environment variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        let width = env_parse::<u32>("HLSMUX_VIDEO_WIDTH");
        let height = env_parse::<u32>("HLSMUX_VIDEO_HEIGHT");
        if let (Some(width), Some(height)) = (width, height) {
            config.video_dimensions = Some((width, height));
        }

        if let Ok(value) = env::var("HLSMUX_VERIFY_PSI_CRC") {
            config.verify_psi_crc = matches!(value.trim(), "1" | "true" | "yes" | "on");
        }

        if let Some(duration) = env_parse::<u32>("HLSMUX_DEFAULT_VIDEO_SAMPLE_DURATION") {
            config.default_video_sample_duration = duration;
        }

        config
    }

    pub fn with_video_dimensions(mut self, width: u32, height: u32) -> Self {
        self.video_dimensions = Some((width, height));
        self
    }

    pub fn with_psi_crc_verification(mut self, verify: bool) -> Self {
        self.verify_psi_crc = verify;
        self
    }

    pub fn with_default_video_sample_duration(mut self, ticks: u32) -> Self {
        self.default_video_sample_duration = ticks;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
