use crate::config::GlitchStrategy;
use crate::effects::{Effect, EffectState};
use crate::particles::AbstractMode;
use crate::surface::{BlendMode, Rgb, Surface};

pub const GLITCH_PIXEL_FRACTION: f32 = 0.01;
pub const ANALOG_ALPHA_SCALE: f32 = 0.2;

const SMEAR_MAX_OFFSET: usize = 20;
const ROW_SHIFT_MAX_OFFSET: usize = 100;

const MIRROR_GLITCH_INTENSITY: f32 = 0.5;
const MIRROR_ANALOG_INTENSITY: f32 = 0.5;
const MIRROR_TRAILS_FADE: f32 = 0.1;
const MIRROR_ABSTRACT_FADE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    pub glitch_intensity: f32,
    pub analog_intensity: f32,
    pub trails_intensity: f32,
    pub glitch: GlitchStrategy,
    pub abstract_fade: f32,
}

impl EffectParams {
    pub fn live(state: &EffectState, glitch: GlitchStrategy) -> Self {
        let trails = state.intensity(Effect::Trails);
        Self {
            glitch_intensity: state.intensity(Effect::Glitch),
            analog_intensity: state.intensity(Effect::Analog),
            trails_intensity: trails,
            glitch,
            abstract_fade: 1.0 - trails,
        }
    }

    pub fn mirror_defaults(glitch: GlitchStrategy) -> Self {
        Self {
            glitch_intensity: MIRROR_GLITCH_INTENSITY,
            analog_intensity: MIRROR_ANALOG_INTENSITY,
            trails_intensity: 1.0 - MIRROR_TRAILS_FADE,
            glitch,
            abstract_fade: MIRROR_ABSTRACT_FADE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BaseFrame<'a> {
    pub pixels: &'a [u8],
    pub width: usize,
    pub height: usize,
}

/// Layer every active effect onto `surface`, in a fixed order:
/// base media, glitch, analog, trails, strobe flash, abstract particles.
pub fn composite_frame(
    surface: &mut Surface,
    base: Option<BaseFrame<'_>>,
    state: &EffectState,
    params: &EffectParams,
    abstract_mode: &mut AbstractMode,
    rng: &mut fastrand::Rng,
) {
    if surface.is_empty() {
        return;
    }

    if let Some(frame) = base {
        surface.draw_image(frame.pixels, frame.width, frame.height);
    }
    if state.is_active(Effect::Glitch) {
        apply_glitch(surface, params.glitch_intensity, params.glitch, rng);
    }
    if state.is_active(Effect::Analog) {
        apply_analog(surface, params.analog_intensity);
    }
    if state.is_active(Effect::Trails) {
        apply_trails(surface, params.trails_intensity);
    }
    if state.flash_visible() {
        surface.flood(state.strobe().color);
    }
    if state.is_active(Effect::Abstract) && abstract_mode.is_running() {
        apply_fade(surface, params.abstract_fade);
        abstract_mode.advance(surface);
    }
}

pub fn apply_once(surface: &mut Surface, effect: Effect, params: &EffectParams, rng: &mut fastrand::Rng) {
    match effect {
        Effect::Glitch => apply_glitch(surface, params.glitch_intensity, params.glitch, rng),
        Effect::Analog => apply_analog(surface, params.analog_intensity),
        Effect::Trails => apply_trails(surface, params.trails_intensity),
        Effect::Strobe | Effect::Abstract => {}
    }
}

pub fn glitch_budget(area: usize, intensity: f32) -> usize {
    let i = if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) };
    (area as f32 * GLITCH_PIXEL_FRACTION * i).round() as usize
}

pub fn apply_glitch(surface: &mut Surface, intensity: f32, strategy: GlitchStrategy, rng: &mut fastrand::Rng) {
    if surface.is_empty() {
        return;
    }
    let budget = glitch_budget(surface.area(), intensity);
    if budget == 0 {
        return;
    }
    let w = surface.width();
    let h = surface.height();
    let data = surface.pixels_mut();
    let len = data.len();

    match strategy {
        GlitchStrategy::ChannelSmear => {
            for _ in 0..budget {
                let i = rng.usize(..w * h) * 4;
                let src = i + rng.usize(..SMEAR_MAX_OFFSET) * 4;
                if src + 2 < len {
                    data.copy_within(src..src + 3, i);
                }
            }
        }
        GlitchStrategy::PixelNoise => {
            for _ in 0..budget {
                let i = rng.usize(..w * h) * 4;
                data[i] = rng.u8(..);
                data[i + 1] = rng.u8(..);
                data[i + 2] = rng.u8(..);
                data[i + 3] = 255;
            }
        }
        GlitchStrategy::RowShift => {
            // Runs average w/4 pixels, so this many runs tracks the same budget.
            let runs = (budget / (w / 4).max(1)).max(1);
            for _ in 0..runs {
                let start = rng.usize(..h) * w * 4;
                let run = rng.usize(..=w / 2);
                let offset = rng.usize(..ROW_SHIFT_MAX_OFFSET) * 4;
                for x in 0..run {
                    let i = start + x * 4;
                    if i + offset + 2 < len {
                        data.copy_within(i + offset..i + offset + 3, i);
                    }
                }
            }
        }
    }
}

pub fn apply_analog(surface: &mut Surface, intensity: f32) {
    surface.fill(Rgb::CYAN, intensity * ANALOG_ALPHA_SCALE, BlendMode::Multiply);
}

// Higher intensity means a more transparent fill, so old content lingers longer.
pub fn apply_trails(surface: &mut Surface, intensity: f32) {
    apply_fade(surface, 1.0 - intensity);
}

pub fn apply_fade(surface: &mut Surface, alpha: f32) {
    surface.fill(Rgb::BLACK, alpha, BlendMode::SourceOver);
}
