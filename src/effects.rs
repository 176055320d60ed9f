use std::fmt;

use serde::{Deserialize, Serialize};

use crate::surface::Rgb;

pub const DEFAULT_INTENSITY: f32 = 0.5;
pub const DEFAULT_STROBE_SPEED: u32 = 10;
pub const MAX_STROBE_SPEED: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Glitch,
    Analog,
    Trails,
    Strobe,
    Abstract,
}

impl Effect {
    pub const ALL: [Self; 5] = [
        Self::Glitch,
        Self::Analog,
        Self::Trails,
        Self::Strobe,
        Self::Abstract,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "glitch" => Some(Self::Glitch),
            "analog" => Some(Self::Analog),
            "trails" => Some(Self::Trails),
            "strobe" => Some(Self::Strobe),
            "abstract" => Some(Self::Abstract),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Glitch => "glitch",
            Self::Analog => "analog",
            Self::Trails => "trails",
            Self::Strobe => "strobe",
            Self::Abstract => "abstract",
        }
    }

    pub fn has_intensity(self) -> bool {
        matches!(self, Self::Glitch | Self::Analog | Self::Trails)
    }

    fn index(self) -> usize {
        match self {
            Self::Glitch => 0,
            Self::Analog => 1,
            Self::Trails => 2,
            Self::Strobe => 3,
            Self::Abstract => 4,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strobe {
    pub speed: u32,
    pub color: Rgb,
    pub phase: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectState {
    active: [bool; 5],
    intensity: [f32; 3],
    strobe: Strobe,
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            active: [false; 5],
            intensity: [DEFAULT_INTENSITY; 3],
            strobe: Strobe {
                speed: DEFAULT_STROBE_SPEED,
                color: Rgb::WHITE,
                phase: false,
            },
        }
    }
}

impl EffectState {
    pub fn is_active(&self, effect: Effect) -> bool {
        self.active[effect.index()]
    }

    pub fn toggle(&mut self, effect: Effect) -> bool {
        let v = !self.active[effect.index()];
        self.set_active(effect, v);
        v
    }

    pub fn set_active(&mut self, effect: Effect, on: bool) {
        self.active[effect.index()] = on;
        if effect == Effect::Strobe && !on {
            self.strobe.phase = false;
        }
    }

    pub fn intensity(&self, effect: Effect) -> f32 {
        if effect.has_intensity() {
            self.intensity[effect.index()]
        } else {
            0.0
        }
    }

    /// Out-of-range values are clamped, NaN falls back to the default.
    pub fn set_intensity(&mut self, effect: Effect, value: f32) -> f32 {
        if !effect.has_intensity() {
            return 0.0;
        }
        let v = if value.is_nan() {
            DEFAULT_INTENSITY
        } else {
            value.clamp(0.0, 1.0)
        };
        self.intensity[effect.index()] = v;
        v
    }

    pub fn strobe(&self) -> Strobe {
        self.strobe
    }

    pub fn set_strobe_speed(&mut self, speed: u32) -> u32 {
        self.strobe.speed = speed.clamp(1, MAX_STROBE_SPEED);
        self.strobe.speed
    }

    pub fn set_strobe_color(&mut self, color: Rgb) {
        self.strobe.color = color;
    }

    /// Flip the flash phase. No-op (and phase stays off) while strobe is inactive.
    pub fn flip_strobe_phase(&mut self) -> bool {
        if !self.is_active(Effect::Strobe) {
            self.strobe.phase = false;
            return false;
        }
        self.strobe.phase = !self.strobe.phase;
        self.strobe.phase
    }

    pub fn flash_visible(&self) -> bool {
        self.is_active(Effect::Strobe) && self.strobe.phase
    }

    /// Reset flags, intensities and strobe phase. Strobe speed and color are user
    /// configuration and survive.
    pub fn clear_all(&mut self) {
        self.active = [false; 5];
        self.intensity = [DEFAULT_INTENSITY; 3];
        self.strobe.phase = false;
    }

    pub fn active_effects(&self) -> impl Iterator<Item = Effect> + '_ {
        Effect::ALL.into_iter().filter(|e| self.is_active(*e))
    }
}
