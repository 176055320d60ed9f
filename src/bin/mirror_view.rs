use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::BufWriter;
use std::time::{Duration, Instant};

use media_fx::compositor::EffectParams;
use media_fx::config::MirrorConfig;
use media_fx::hud::{self, FpsCounter};
use media_fx::mirror::{self, MirrorMessage, MirrorSurface, UdpListener};
use media_fx::render::{Frame, HalfBlockRenderer, Layout};
use media_fx::terminal::{self, TerminalGuard};

fn main() -> Result<()> {
    let cfg = MirrorConfig::parse();
    cfg.validate()?;

    if let Err(err) = media_fx::logging::init(&cfg.log_level, cfg.log_file.as_deref(), "mirror_view") {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let mut listener = UdpListener::bind(cfg.port)
        .with_context(|| format!("bind mirror port {} on localhost", cfg.port))?;
    let port = listener.local_port().unwrap_or(cfg.port);
    tracing::info!(port, "mirror view listening");

    let rng = cfg
        .seed
        .map(fastrand::Rng::with_seed)
        .unwrap_or_else(fastrand::Rng::new);
    let mut view = MirrorSurface::new(
        cfg.width,
        cfg.height,
        EffectParams::mirror_defaults(cfg.glitch),
        rng,
    );

    let _term = TerminalGuard::enter()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut renderer = HalfBlockRenderer::new();
    let mut fps = FpsCounter::new();
    let mut received = 0u64;
    let mut last: Option<MirrorMessage> = None;
    let target = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);

    loop {
        let frame_start = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Release {
                    continue;
                }
                let ctrl_c = k.modifiers.contains(KeyModifiers::CONTROL)
                    && matches!(k.code, KeyCode::Char('c'));
                if ctrl_c || matches!(k.code, KeyCode::Esc | KeyCode::Char('q')) {
                    return Ok(());
                }
            }
        }

        for msg in mirror::drain(&mut listener) {
            tracing::debug!(?msg, "mirror event");
            view.handle(&msg);
            received += 1;
            last = Some(msg);
        }
        view.tick();

        let (cols, rows) = terminal::size()?;
        let last_label = match &last {
            Some(MirrorMessage::Clear) => "clear".to_string(),
            Some(MirrorMessage::Effect { effect }) => format!("effect {effect}"),
            Some(MirrorMessage::Strobe { show, color }) => {
                format!("strobe {} {color}", if *show { "on" } else { "off" })
            }
            None => "waiting".to_string(),
        };
        let status = format!(
            "mirror udp 127.0.0.1:{port} | events {received} | last {last_label} | shapes {} | FPS {:>4.1} | q quit",
            view.shapes().len(),
            fps.fps(),
        );
        let hud_text = hud::wrap_hud_lines(cols as usize, &[status]).join("\n");
        let layout = Layout::new(cols, rows, hud::hud_rows_for_text(rows, true, &hud_text));

        let frame = Frame {
            layout,
            surface: view.surface(),
            hud: &hud_text,
            overlay: None,
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
