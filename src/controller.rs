use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::audio::{BIN_COUNT, ClipPlayer, Playback};
use crate::beat::{self, BeatDetector};
use crate::capture::{self, Recorder};
use crate::compositor::{self, EffectParams};
use crate::config::{Config, GlitchStrategy};
use crate::effects::{DEFAULT_STROBE_SPEED, Effect, EffectState};
use crate::error::{FxError, NoticeBoard, Severity};
use crate::media::{self, AudioClip, LoadedMedia, MediaKind, VisualSource};
use crate::mirror::{MirrorChannel, MirrorMessage, MirrorTransport};
use crate::particles::{AbstractMode, DEFAULT_CAPACITY};
use crate::scheduler::{Clock, Scheduler, SystemClock, TaskId};
use crate::surface::{Rgb, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Render,
    DetectBeat,
    AbstractSpawn,
    StrobeFlip,
    PulseEnd { effect: Effect, pulse: u64 },
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub width: usize,
    pub height: usize,
    pub capacity: usize,
    pub glitch: GlitchStrategy,
    pub strobe_speed: u32,
    pub strobe_color: Rgb,
    pub seed: Option<u64>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            width: 160,
            height: 90,
            capacity: DEFAULT_CAPACITY,
            glitch: GlitchStrategy::ChannelSmear,
            strobe_speed: DEFAULT_STROBE_SPEED,
            strobe_color: Rgb::WHITE,
            seed: None,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(cfg: &Config, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            capacity: cfg.capacity,
            glitch: cfg.glitch,
            strobe_speed: cfg.strobe_speed,
            strobe_color: cfg.strobe_color,
            seed: cfg.seed,
        }
    }
}

pub type PlayerFactory = Box<dyn FnMut(AudioClip) -> (Box<dyn Playback>, Option<FxError>)>;

struct ActiveMedia {
    kind: MediaKind,
    name: String,
    visual: Option<Box<dyn VisualSource>>,
    loaded_at: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Pulse {
    id: u64,
    timer: TaskId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub frames_rendered: u64,
    pub detector_ticks: u64,
    pub beats: u64,
    pub pulses_skipped: u64,
    pub strobe_flips: u64,
}

pub struct Controller<C: Clock = SystemClock> {
    clock: C,
    scheduler: Scheduler<Task>,
    surface: Surface,
    effects: EffectState,
    abstract_mode: AbstractMode,
    beat: BeatDetector,
    mirror: MirrorChannel,
    rng: fastrand::Rng,
    glitch: GlitchStrategy,
    notices: NoticeBoard,

    media: Option<ActiveMedia>,
    clip: Option<Box<dyn Playback>>,
    mic: Option<Box<dyn Playback>>,
    player_factory: PlayerFactory,
    recorder: Option<Recorder>,
    bins: Vec<u8>,

    render_task: Option<TaskId>,
    detect_task: Option<TaskId>,
    spawn_task: Option<TaskId>,
    strobe_task: Option<TaskId>,
    pulses: HashMap<Effect, Pulse>,
    next_pulse: u64,
    last_tick: Option<Duration>,
    counters: Counters,
}

impl Controller<SystemClock> {
    pub fn new(opts: ControllerOptions) -> Self {
        Self::with_clock(opts, SystemClock::new())
    }
}

impl<C: Clock> Controller<C> {
    pub fn with_clock(opts: ControllerOptions, clock: C) -> Self {
        let mut effects = EffectState::default();
        effects.set_strobe_speed(opts.strobe_speed);
        effects.set_strobe_color(opts.strobe_color);
        let rng = opts
            .seed
            .map(fastrand::Rng::with_seed)
            .unwrap_or_else(fastrand::Rng::new);

        Self {
            clock,
            scheduler: Scheduler::new(),
            surface: Surface::new(opts.width, opts.height),
            effects,
            abstract_mode: AbstractMode::new(opts.capacity.max(1)),
            beat: BeatDetector::default(),
            mirror: MirrorChannel::default(),
            rng,
            glitch: opts.glitch,
            notices: NoticeBoard::default(),
            media: None,
            clip: None,
            mic: None,
            player_factory: Box::new(|clip| {
                let (player, warning) = ClipPlayer::new(clip, true);
                (Box::new(player) as Box<dyn Playback>, warning)
            }),
            recorder: None,
            bins: vec![0; BIN_COUNT],
            render_task: None,
            detect_task: None,
            spawn_task: None,
            strobe_task: None,
            pulses: HashMap::new(),
            next_pulse: 1,
            last_tick: None,
            counters: Counters::default(),
        }
    }

    pub fn set_player_factory(&mut self, factory: PlayerFactory) {
        self.player_factory = factory;
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn effects(&self) -> &EffectState {
        &self.effects
    }

    pub fn abstract_mode(&self) -> &AbstractMode {
        &self.abstract_mode
    }

    pub fn beat(&self) -> &BeatDetector {
        &self.beat
    }

    pub fn mirror(&self) -> &MirrorChannel {
        &self.mirror
    }

    pub fn glitch_strategy(&self) -> GlitchStrategy {
        self.glitch
    }

    pub fn set_glitch_strategy(&mut self, strategy: GlitchStrategy) {
        self.glitch = strategy;
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.media.as_ref().map(|m| m.kind)
    }

    pub fn media_name(&self) -> Option<&str> {
        self.media.as_ref().map(|m| m.name.as_str())
    }

    pub fn has_audio(&self) -> bool {
        self.clip.is_some() || self.mic.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playback().is_some_and(|p| p.is_playing())
    }

    pub fn audio_label(&self) -> Option<&'static str> {
        self.playback().map(|p| p.label())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn is_pulsing(&self, effect: Effect) -> bool {
        self.pulses.contains_key(&effect)
    }

    pub fn scheduled_tasks(&self) -> Vec<Task> {
        self.scheduler.tasks().copied().collect()
    }

    pub fn is_scheduled(&self, task: Task) -> bool {
        self.scheduler.tasks().any(|t| *t == task)
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.surface.width() && height == self.surface.height() {
            return;
        }
        self.surface.resize(width, height);
        tracing::debug!(width, height, "surface resized");
    }

    pub fn open_file(&mut self, path: &Path) -> Result<(), FxError> {
        let loaded = media::load(path, self.surface.width(), self.surface.height())?;
        self.load_media(loaded);
        Ok(())
    }

    pub fn load_media(&mut self, loaded: LoadedMedia) {
        self.clear_media();
        self.clear_effects();

        let name = loaded
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| loaded.path.display().to_string());
        if let Some(clip) = loaded.audio {
            let (player, warning) = (self.player_factory)(clip);
            if let Some(w) = warning {
                self.notices.post_error(&w);
            }
            self.clip = Some(player);
        }
        tracing::debug!(kind = %loaded.kind, %name, "media attached");
        self.media = Some(ActiveMedia {
            kind: loaded.kind,
            name,
            visual: loaded.visual,
            loaded_at: self.clock.now(),
        });
        self.sync_chains();
    }

    pub fn clear_media(&mut self) {
        if let Some(mut clip) = self.clip.take() {
            clip.stop();
        }
        if self.mic.is_none() {
            self.beat.stop();
        }
        self.media = None;
        self.surface.clear();
        self.sync_chains();
    }

    pub fn clear_effects(&mut self) {
        for (_, pulse) in self.pulses.drain() {
            self.scheduler.cancel(pulse.timer);
        }
        if let Some(id) = self.strobe_task.take() {
            self.scheduler.cancel(id);
        }
        let was_flashing = self.effects.flash_visible();
        if self.abstract_mode.stop() {
            self.surface.clear();
        }
        self.effects.clear_all();
        if was_flashing {
            self.redraw_base();
        }
        self.mirror.publish(&MirrorMessage::Clear);
        tracing::debug!("effects cleared");
        self.sync_chains();
    }

    pub fn toggle(&mut self, effect: Effect) -> bool {
        self.release_pulse(effect);
        let on = !self.effects.is_active(effect);
        self.set_effect(effect, on);
        on
    }

    pub fn set_intensity(&mut self, effect: Effect, value: f32) -> f32 {
        self.effects.set_intensity(effect, value)
    }

    pub fn adjust_intensity(&mut self, effect: Effect, delta: f32) -> f32 {
        let v = self.effects.intensity(effect) + delta;
        self.effects.set_intensity(effect, v)
    }

    pub fn set_strobe_speed(&mut self, speed: u32) -> u32 {
        let speed = self.effects.set_strobe_speed(speed);
        if let Some(id) = self.strobe_task.take() {
            self.scheduler.cancel(id);
            self.strobe_task = Some(self.start_strobe_interval());
        }
        speed
    }

    pub fn set_strobe_color(&mut self, color: Rgb) {
        self.effects.set_strobe_color(color);
    }

    pub fn start_abstract(&mut self) -> bool {
        self.release_pulse(Effect::Abstract);
        if self.effects.is_active(Effect::Abstract) {
            return false;
        }
        self.set_effect(Effect::Abstract, true);
        true
    }

    pub fn stop_abstract(&mut self) -> bool {
        self.release_pulse(Effect::Abstract);
        if !self.effects.is_active(Effect::Abstract) {
            return false;
        }
        self.set_effect(Effect::Abstract, false);
        true
    }

    pub fn play_pause(&mut self) -> Option<bool> {
        let playback = self.playback_mut()?;
        let playing = if playback.is_playing() {
            playback.pause();
            false
        } else {
            playback.play();
            true
        };
        if playing {
            self.beat.start();
            if let Some(id) = self.detect_task.take() {
                self.scheduler.cancel(id);
            }
        }
        tracing::debug!(playing, "playback toggled");
        self.sync_chains();
        Some(playing)
    }

    pub fn stop_audio(&mut self) -> bool {
        let Some(playback) = self.playback_mut() else {
            return false;
        };
        playback.stop();
        self.beat.stop();
        self.surface.clear();
        self.mirror.publish(&MirrorMessage::Clear);
        tracing::debug!("audio stopped");
        self.sync_chains();
        true
    }

    pub fn attach_mic(&mut self, mic: Box<dyn Playback>) {
        self.mic = Some(mic);
    }

    pub fn launch_mirror(&mut self, transport: Box<dyn MirrorTransport>) -> bool {
        if self.mirror.is_attached() {
            return false;
        }
        self.mirror.attach(transport);
        true
    }

    pub fn toggle_recording(&mut self, dir: &Path) -> Result<bool, FxError> {
        if let Some(rec) = self.recorder.take() {
            let path = rec.stop()?;
            self.notices
                .post(Severity::Info, format!("recording saved to {}", path.display()));
            return Ok(false);
        }
        let path = capture::recording_path(dir);
        let rec = Recorder::start(&path, self.surface.width(), self.surface.height())?;
        self.notices
            .post(Severity::Info, format!("recording to {}", path.display()));
        self.recorder = Some(rec);
        Ok(true)
    }

    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let dt = self.last_tick.map(|t| now.saturating_sub(t)).unwrap_or_default();
        self.last_tick = Some(now);

        if let Some(playback) = self.playback_mut() {
            playback.advance(dt);
            if playback.take_ended() {
                self.beat.stop();
                tracing::debug!("audio ended");
                self.sync_chains();
            }
        }

        self.scheduler.poll(now);
        let mut ran = 0;
        while let Some(task) = self.scheduler.next_ready() {
            self.dispatch(task, now);
            ran += 1;
        }
        ran
    }

    pub fn shutdown(&mut self) {
        self.scheduler.clear();
        self.render_task = None;
        self.detect_task = None;
        self.spawn_task = None;
        self.strobe_task = None;
        self.pulses.clear();
        if let Some(rec) = self.recorder.take() {
            match rec.stop() {
                Ok(path) => tracing::info!(path = %path.display(), "recording finalized on exit"),
                Err(err) => tracing::warn!(%err, "recording lost on exit"),
            }
        }
        if let Some(mut clip) = self.clip.take() {
            clip.stop();
        }
        self.mirror.detach();
    }

    fn dispatch(&mut self, task: Task, now: Duration) {
        match task {
            Task::Render => {
                self.render_task = None;
                self.render(now);
            }
            Task::DetectBeat => {
                self.detect_task = None;
                self.detect(now);
            }
            Task::AbstractSpawn => {
                self.spawn_task = None;
                let (w, h) = (self.surface.width(), self.surface.height());
                self.abstract_mode.maybe_spawn(&mut self.rng, w, h);
            }
            Task::StrobeFlip => self.flip_strobe(now),
            Task::PulseEnd { effect, pulse } => {
                if self.pulses.get(&effect).is_some_and(|p| p.id == pulse) {
                    self.pulses.remove(&effect);
                    tracing::debug!(%effect, "pulse ended");
                    self.set_effect(effect, false);
                }
            }
        }
        self.sync_chains();
    }

    fn render(&mut self, now: Duration) {
        let params = EffectParams::live(&self.effects, self.glitch);
        let base = match self.media.as_mut() {
            Some(m) => {
                let elapsed = now.saturating_sub(m.loaded_at);
                m.visual.as_mut().and_then(|v| v.frame(elapsed))
            }
            None => None,
        };
        compositor::composite_frame(
            &mut self.surface,
            base,
            &self.effects,
            &params,
            &mut self.abstract_mode,
            &mut self.rng,
        );
        self.counters.frames_rendered += 1;

        let pushed = match self.recorder.as_mut() {
            Some(rec) => rec.push_frame(now, &self.surface),
            None => return,
        };
        if let Err(err) = pushed {
            self.recorder = None;
            self.notices.post_error(&err);
        }
    }

    fn detect(&mut self, now: Duration) {
        let Some(playback) = self.clip.as_deref_mut().or(self.mic.as_deref_mut()) else {
            self.beat.stop();
            return;
        };
        playback.byte_frequency_data(&mut self.bins);
        self.counters.detector_ticks += 1;
        if let Some(effect) = self.beat.sample(&self.bins, &mut self.rng) {
            self.pulse(effect, now);
        }
    }

    // Beat-triggered activation. An effect that is already on is left alone, so a
    // pulse never clears something the user turned on. The mirror hears every beat.
    fn pulse(&mut self, effect: Effect, now: Duration) {
        self.counters.beats += 1;
        self.mirror.publish(&MirrorMessage::Effect { effect });
        if self.effects.is_active(effect) {
            self.counters.pulses_skipped += 1;
            tracing::trace!(%effect, "pulse skipped, effect already on");
            return;
        }
        let id = self.next_pulse;
        self.next_pulse += 1;
        let timer = self.scheduler.set_timeout(
            now,
            beat::pulse_dwell(effect),
            Task::PulseEnd { effect, pulse: id },
        );
        self.pulses.insert(effect, Pulse { id, timer });
        tracing::debug!(%effect, pulse = id, "pulse");
        self.set_effect(effect, true);
    }

    fn release_pulse(&mut self, effect: Effect) {
        if let Some(p) = self.pulses.remove(&effect) {
            self.scheduler.cancel(p.timer);
            tracing::debug!(%effect, pulse = p.id, "user took over pulsed effect");
        }
    }

    fn set_effect(&mut self, effect: Effect, on: bool) {
        if self.effects.is_active(effect) == on {
            return;
        }
        match effect {
            Effect::Strobe => {
                let was_flashing = self.effects.flash_visible();
                self.effects.set_active(Effect::Strobe, on);
                if on {
                    self.strobe_task = Some(self.start_strobe_interval());
                } else {
                    if let Some(id) = self.strobe_task.take() {
                        self.scheduler.cancel(id);
                    }
                    if was_flashing {
                        self.redraw_base();
                    }
                    let color = self.effects.strobe().color;
                    self.mirror
                        .publish(&MirrorMessage::Strobe { show: false, color });
                }
            }
            Effect::Abstract => {
                self.effects.set_active(Effect::Abstract, on);
                if on {
                    self.abstract_mode.start();
                } else if self.abstract_mode.stop() {
                    self.surface.clear();
                }
            }
            _ => self.effects.set_active(effect, on),
        }
        tracing::debug!(%effect, on, "effect set");
        self.sync_chains();
    }

    fn start_strobe_interval(&mut self) -> TaskId {
        let period = Duration::from_secs(1) / self.effects.strobe().speed.max(1);
        self.scheduler
            .set_interval(self.clock.now(), period, Task::StrobeFlip)
    }

    fn flip_strobe(&mut self, now: Duration) {
        if !self.effects.is_active(Effect::Strobe) {
            return;
        }
        let show = self.effects.flip_strobe_phase();
        self.counters.strobe_flips += 1;
        let color = self.effects.strobe().color;
        if show {
            self.surface.flood(color);
        } else {
            self.redraw_base_at(now);
        }
        self.mirror.publish(&MirrorMessage::Strobe { show, color });
    }

    fn redraw_base(&mut self) {
        let now = self.clock.now();
        self.redraw_base_at(now);
    }

    fn redraw_base_at(&mut self, now: Duration) {
        let base = match self.media.as_mut() {
            Some(m) => {
                let elapsed = now.saturating_sub(m.loaded_at);
                m.visual.as_mut().and_then(|v| v.frame(elapsed))
            }
            None => None,
        };
        match base {
            Some(frame) => {
                self.surface.clear();
                self.surface.draw_image(frame.pixels, frame.width, frame.height);
            }
            None => self.surface.clear(),
        }
    }

    // Keep exactly one pending tick per running chain, and none for stopped ones.
    fn sync_chains(&mut self) {
        let want_render = self.media.is_some()
            || self.abstract_mode.is_running()
            || self.effects.is_active(Effect::Strobe);
        let want_spawn = self.abstract_mode.is_running();
        let want_detect = self.beat.is_sampling() && self.has_audio();

        chain(&mut self.scheduler, &mut self.render_task, want_render, Task::Render);
        chain(&mut self.scheduler, &mut self.spawn_task, want_spawn, Task::AbstractSpawn);
        chain(&mut self.scheduler, &mut self.detect_task, want_detect, Task::DetectBeat);
    }

    fn playback(&self) -> Option<&dyn Playback> {
        self.clip.as_deref().or(self.mic.as_deref())
    }

    fn playback_mut(&mut self) -> Option<&mut (dyn Playback + 'static)> {
        self.clip.as_deref_mut().or(self.mic.as_deref_mut())
    }
}

fn chain(scheduler: &mut Scheduler<Task>, slot: &mut Option<TaskId>, want: bool, task: Task) {
    match (want, *slot) {
        (true, None) => *slot = Some(scheduler.request_tick(task)),
        (false, Some(id)) => {
            scheduler.cancel(id);
            *slot = None;
        }
        _ => {}
    }
}
