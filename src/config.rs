use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};

use crate::effects::{DEFAULT_STROBE_SPEED, MAX_STROBE_SPEED};
use crate::particles::DEFAULT_CAPACITY;
use crate::surface::Rgb;

pub const DEFAULT_MIRROR_PORT: u16 = 47_800;

#[derive(Parser, Debug, Clone)]
#[command(name = "media_fx", version, about = "Layer glitch, analog, trails, strobe and abstract effects over media, in the terminal")]
pub struct Config {
    /// Media file to load at startup (video, gif/jpeg, pdf, audio).
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    #[arg(long, value_enum, default_value_t = GlitchStrategy::ChannelSmear)]
    pub glitch: GlitchStrategy,

    /// Maximum number of abstract-mode particles kept alive.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Publish effect events to a mirror view from startup.
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub mirror: bool,

    #[arg(long, default_value_t = DEFAULT_MIRROR_PORT)]
    pub mirror_port: u16,

    #[arg(long, value_name = "DIR", default_value = ".")]
    pub record_dir: PathBuf,

    /// Seed for every random draw (glitch pixels, particles, beat picks).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Drive the beat detector from an input device while no clip is loaded.
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub mic: bool,

    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long, default_value_t = DEFAULT_STROBE_SPEED)]
    pub strobe_speed: u32,

    #[arg(long, default_value_t = Rgb::WHITE)]
    pub strobe_color: Rgb,

    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fps == 0 {
            bail!("--fps must be >= 1");
        }
        if self.capacity == 0 {
            bail!("--capacity must be >= 1");
        }
        if self.strobe_speed == 0 || self.strobe_speed > MAX_STROBE_SPEED {
            bail!("--strobe-speed must be within 1..={MAX_STROBE_SPEED}");
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mirror_view", version, about = "Secondary surface that replays media_fx effect events")]
pub struct MirrorConfig {
    #[arg(long, default_value_t = DEFAULT_MIRROR_PORT)]
    pub port: u16,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Drawing surface size; the terminal view is scaled from it.
    #[arg(long, default_value_t = 800)]
    pub width: usize,

    #[arg(long, default_value_t = 450)]
    pub height: usize,

    #[arg(long, value_enum, default_value_t = GlitchStrategy::ChannelSmear)]
    pub glitch: GlitchStrategy,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

impl MirrorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fps == 0 {
            bail!("--fps must be >= 1");
        }
        if self.width == 0 || self.height == 0 {
            bail!("--width and --height must be >= 1");
        }
        Ok(())
    }
}

/// How the glitch pass picks and rewrites pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GlitchStrategy {
    /// Copy color channels from a pixel a short distance to the right.
    #[value(alias = "smear")]
    ChannelSmear,
    /// Replace pixels with random colors.
    #[value(alias = "noise")]
    PixelNoise,
    /// Smear horizontal runs from an offset further along the row.
    #[value(alias = "rows")]
    RowShift,
}

impl GlitchStrategy {
    pub fn label(self) -> &'static str {
        match self {
            Self::ChannelSmear => "smear",
            Self::PixelNoise => "noise",
            Self::RowShift => "rows",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::ChannelSmear => Self::PixelNoise,
            Self::PixelNoise => Self::RowShift,
            Self::RowShift => Self::ChannelSmear,
        }
    }
}
