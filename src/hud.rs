use std::fmt::Write as _;
use std::time::Instant;

use crate::config::GlitchStrategy;
use crate::effects::{Effect, EffectState};
use crate::error::{Notice, Severity};
use crate::media::MediaKind;

pub struct HudInfo<'a> {
    pub media: Option<(MediaKind, &'a str)>,
    pub audio: Option<(&'static str, bool)>,
    pub effects: &'a EffectState,
    pub selected: Effect,
    pub glitch: GlitchStrategy,
    pub particles: usize,
    pub recording: bool,
    pub mirror: Option<String>,
    pub notice: Option<&'a Notice>,
    pub prompt: Option<&'a str>,
    pub fps: f32,
}

pub const KEYS_LINE: &str = "Keys: g/a/t/s toggle | b abstract | tab select | up/down intensity | [/] strobe speed | c color | n glitch mode | space play | x stop | o open | e eject | r rec | m mirror | z clear | i HUD | ? help | q quit";

pub fn build_hud(cols: usize, info: &HudInfo<'_>) -> String {
    let media = match info.media {
        Some((kind, name)) => format!("{name} ({kind})"),
        None => "none".to_string(),
    };
    let audio = match info.audio {
        Some((label, true)) => format!("{label} playing"),
        Some((label, false)) => format!("{label} paused"),
        None => "none".to_string(),
    };

    let mut fx = String::new();
    for effect in [Effect::Glitch, Effect::Analog, Effect::Trails] {
        let _ = write!(
            fx,
            "{}{}{} {:.2} ",
            if effect == info.selected { ">" } else { " " },
            if info.effects.is_active(effect) { "+" } else { "-" },
            effect,
            info.effects.intensity(effect),
        );
    }
    let strobe = info.effects.strobe();

    let status = format!(
        "Media: {media} | Audio: {audio} | FPS: {:>4.1}",
        info.fps
    );
    let effects = format!(
        "FX:{fx}| {}strobe {}/s {} | {}abstract {} | glitch {} | rec {} | mirror {}",
        if info.effects.is_active(Effect::Strobe) { "+" } else { "-" },
        strobe.speed,
        strobe.color,
        if info.effects.is_active(Effect::Abstract) { "+" } else { "-" },
        info.particles,
        info.glitch.label(),
        if info.recording { "on" } else { "off" },
        info.mirror.as_deref().unwrap_or("off"),
    );
    let message = match (info.prompt, info.notice) {
        (Some(p), _) => format!("Open file: {p}_  (enter load, esc cancel)"),
        (None, Some(n)) => format!("{}: {}", severity_label(n.severity), n.text),
        (None, None) => String::new(),
    };

    let logical = [status, effects, message, KEYS_LINE.to_string()];
    wrap_hud_lines(cols, &logical).join("\n")
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Info => "info",
        Severity::Warn => "warning",
        Severity::Error => "error",
    }
}

pub fn hud_rows_for_text(term_rows: u16, show_hud: bool, hud: &str) -> u16 {
    if !show_hud {
        return 0;
    }
    let wanted = hud.lines().count() as u16;
    wanted.min(term_rows.saturating_sub(1))
}

pub fn wrap_hud_lines(cols: usize, lines: &[String]) -> Vec<String> {
    let width = cols.max(1);
    lines
        .iter()
        .flat_map(|l| hard_wrap_line(l, width))
        .collect()
}

/// Split at exactly `width` chars. An empty line stays one empty line.
pub fn hard_wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars = line.chars().collect::<Vec<_>>();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

pub fn help_popup_text() -> &'static str {
    "media_fx keys\n\
g / a / t / s  toggle glitch / analog / trails / strobe\n\
b  start or stop abstract mode\n\
tab or left/right  select glitch, analog or trails\n\
up/down  intensity of the selected effect\n\
[ / ]  strobe speed down / up\n\
c  next strobe color\n\
n  next glitch mode (smear, noise, rows)\n\
space  play / pause audio (starts beat detection)\n\
x  stop audio and rewind\n\
o  open a file, e  eject media\n\
r  start / stop recording\n\
m  publish to mirror_view\n\
z  clear all effects\n\
i  show/hide HUD\n\
? or h or F1  toggle this help\n\
q or esc  quit"
}

pub struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = (self.frames as f32) / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}
