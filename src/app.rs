use crate::audio::MicInput;
use crate::config::Config;
use crate::controller::{Controller, ControllerOptions};
use crate::effects::Effect;
use crate::error::{FxError, Severity};
use crate::hud::{self, FpsCounter, HudInfo};
use crate::mirror::UdpTransport;
use crate::render::{Frame, HalfBlockRenderer, Layout};
use crate::surface::Rgb;
use crate::terminal::{self, TerminalGuard};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const INTENSITY_STEP: f32 = 0.05;

const STROBE_PALETTE: [Rgb; 7] = [
    Rgb::WHITE,
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 255, 0),
    Rgb::CYAN,
];

const SELECTABLE: [Effect; 3] = [Effect::Glitch, Effect::Analog, Effect::Trails];

struct UiState {
    show_hud: bool,
    show_help: bool,
    selected: Effect,
    prompt: Option<String>,
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let _term = TerminalGuard::enter()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut renderer = HalfBlockRenderer::new();

    let mut ui = UiState {
        show_hud: true,
        show_help: false,
        selected: Effect::Glitch,
        prompt: None,
    };

    let mut size = terminal::size()?;
    let mut layout = Layout::new(size.0, size.1, 4);
    let (w, h) = layout.pixel_size();
    let mut ctl = Controller::new(ControllerOptions::from_config(&cfg, w, h));

    if cfg.mic {
        match MicInput::open(cfg.device.as_deref()) {
            Ok(mic) => ctl.attach_mic(Box::new(mic)),
            Err(err) => ctl
                .notices_mut()
                .post(Severity::Warn, format!("microphone unavailable: {err:#}")),
        }
    }
    if cfg.mirror {
        launch_mirror(&mut ctl, cfg.mirror_port);
    }
    if let Some(path) = cfg.file.as_deref() {
        let res = ctl.open_file(path);
        report(&mut ctl, res);
    }

    let mut fps = FpsCounter::new();
    let target = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);

    loop {
        let frame_start = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    if handle_key(k.code, k.modifiers, &mut ctl, &mut ui, &cfg) {
                        ctl.shutdown();
                        return Ok(());
                    }
                }
                Event::Resize(c, r) => size = (c, r),
                _ => {}
            }
        }
        // Resize events can be missed in some terminals.
        let sz = terminal::size()?;
        if sz != size {
            size = sz;
        }

        ctl.tick();

        let hud_text = if ui.show_hud {
            let notice = ctl.notices().current(Instant::now());
            let info = HudInfo {
                media: ctl.media_kind().zip(ctl.media_name()),
                audio: ctl.audio_label().map(|l| (l, ctl.is_playing())),
                effects: ctl.effects(),
                selected: ui.selected,
                glitch: ctl.glitch_strategy(),
                particles: ctl.abstract_mode().registry().len(),
                recording: ctl.is_recording(),
                mirror: ctl.mirror().describe(),
                notice,
                prompt: ui.prompt.as_deref(),
                fps: fps.fps(),
            };
            hud::build_hud(size.0 as usize, &info)
        } else {
            String::new()
        };

        let hud_rows = hud::hud_rows_for_text(size.1, ui.show_hud, &hud_text);
        let next = Layout::new(size.0, size.1, hud_rows);
        if next != layout {
            layout = next;
            let (w, h) = layout.pixel_size();
            ctl.resize(w, h);
        }

        let frame = Frame {
            layout,
            surface: ctl.surface(),
            hud: &hud_text,
            overlay: ui.show_help.then(hud::help_popup_text),
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;
        fps.tick();

        let elapsed = frame_start.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

fn report<T>(ctl: &mut Controller, res: Result<T, FxError>) {
    if let Err(err) = res {
        ctl.notices_mut().post_error(&err);
    }
}

fn launch_mirror(ctl: &mut Controller, port: u16) {
    if ctl.mirror().is_attached() {
        ctl.notices_mut()
            .post(Severity::Info, "mirror already publishing");
        return;
    }
    match UdpTransport::connect(port) {
        Ok(t) => {
            ctl.launch_mirror(Box::new(t));
            ctl.notices_mut().post(
                Severity::Info,
                format!("mirror publishing; run `mirror_view --port {port}` in another terminal"),
            );
        }
        Err(err) => ctl.notices_mut().post_error(&FxError::capability(
            "mirror",
            format!("open udp socket: {err}"),
        )),
    }
}

fn handle_key(
    code: KeyCode,
    mods: KeyModifiers,
    ctl: &mut Controller,
    ui: &mut UiState,
    cfg: &Config,
) -> bool {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return true;
    }

    if let Some(prompt) = ui.prompt.as_mut() {
        match code {
            KeyCode::Esc => ui.prompt = None,
            KeyCode::Enter => {
                let path = PathBuf::from(prompt.trim());
                ui.prompt = None;
                if !path.as_os_str().is_empty() {
                    let res = ctl.open_file(&path);
                    report(ctl, res);
                }
            }
            KeyCode::Backspace => {
                prompt.pop();
            }
            KeyCode::Char(c) => prompt.push(c),
            _ => {}
        }
        return false;
    }

    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => return true,
        KeyCode::Char('g') => select_and_toggle(ctl, ui, Effect::Glitch),
        KeyCode::Char('a') => select_and_toggle(ctl, ui, Effect::Analog),
        KeyCode::Char('t') => select_and_toggle(ctl, ui, Effect::Trails),
        KeyCode::Char('s') => {
            ctl.toggle(Effect::Strobe);
        }
        KeyCode::Char('b') => {
            if !ctl.start_abstract() {
                ctl.stop_abstract();
            }
        }
        KeyCode::Tab | KeyCode::Right => ui.selected = cycle_selected(ui.selected, 1),
        KeyCode::BackTab | KeyCode::Left => ui.selected = cycle_selected(ui.selected, -1),
        KeyCode::Up => {
            ctl.adjust_intensity(ui.selected, INTENSITY_STEP);
        }
        KeyCode::Down => {
            ctl.adjust_intensity(ui.selected, -INTENSITY_STEP);
        }
        KeyCode::Char(']') => {
            let s = ctl.effects().strobe().speed;
            ctl.set_strobe_speed(s.saturating_add(1));
        }
        KeyCode::Char('[') => {
            let s = ctl.effects().strobe().speed;
            ctl.set_strobe_speed(s.saturating_sub(1));
        }
        KeyCode::Char('c') | KeyCode::Char('C') => {
            let cur = ctl.effects().strobe().color;
            let next = STROBE_PALETTE
                .iter()
                .position(|c| *c == cur)
                .map(|i| STROBE_PALETTE[(i + 1) % STROBE_PALETTE.len()])
                .unwrap_or(STROBE_PALETTE[0]);
            ctl.set_strobe_color(next);
        }
        KeyCode::Char('n') | KeyCode::Char('N') => {
            let next = ctl.glitch_strategy().next();
            ctl.set_glitch_strategy(next);
        }
        KeyCode::Char(' ') => {
            if ctl.play_pause().is_none() {
                ctl.notices_mut().post(Severity::Info, "no audio loaded");
            }
        }
        KeyCode::Char('x') | KeyCode::Char('X') => {
            ctl.stop_audio();
        }
        KeyCode::Char('o') | KeyCode::Char('O') => {
            ui.prompt = Some(String::new());
            ui.show_hud = true;
        }
        KeyCode::Char('e') | KeyCode::Char('E') => {
            ctl.clear_media();
            ctl.clear_effects();
        }
        KeyCode::Char('r') | KeyCode::Char('R') => {
            let res = ctl.toggle_recording(&cfg.record_dir);
            report(ctl, res);
        }
        KeyCode::Char('m') | KeyCode::Char('M') => launch_mirror(ctl, cfg.mirror_port),
        KeyCode::Char('z') | KeyCode::Char('Z') => ctl.clear_effects(),
        KeyCode::Char('i') | KeyCode::Char('I') => ui.show_hud = !ui.show_hud,
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::F(1) => {
            ui.show_help = !ui.show_help;
        }
        _ => {}
    }
    false
}

fn select_and_toggle(ctl: &mut Controller, ui: &mut UiState, effect: Effect) {
    ui.selected = effect;
    ctl.toggle(effect);
}

fn cycle_selected(cur: Effect, step: isize) -> Effect {
    let n = SELECTABLE.len() as isize;
    let i = SELECTABLE.iter().position(|e| *e == cur).unwrap_or(0) as isize;
    SELECTABLE[((i + step).rem_euclid(n)) as usize]
}
