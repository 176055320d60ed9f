use std::time::Instant;

use media_fx::config::GlitchStrategy;
use media_fx::effects::{Effect, EffectState};
use media_fx::error::{FxError, NoticeBoard, Severity};
use media_fx::hud::{self, HudInfo};
use media_fx::media::MediaKind;
use media_fx::render::{Frame, HalfBlockRenderer, Layout};
use media_fx::surface::{BlendMode, Rgb, Surface};

/// Render one frame into a string.
fn render(
    surface: &Surface,
    layout: Layout,
    hud: &str,
    overlay: Option<&str>,
    sync: bool,
) -> String {
    let mut out = Vec::new();
    let frame = Frame {
        layout,
        surface,
        hud,
        overlay,
        sync_updates: sync,
    };
    HalfBlockRenderer::new()
        .render(&frame, &mut out)
        .expect("render");
    String::from_utf8(out).expect("utf8")
}

fn info<'a>(effects: &'a EffectState) -> HudInfo<'a> {
    HudInfo {
        media: Some((MediaKind::Video, "clip.mp4")),
        audio: Some(("clip", true)),
        effects,
        selected: Effect::Analog,
        glitch: GlitchStrategy::RowShift,
        particles: 12,
        recording: true,
        mirror: None,
        notice: None,
        prompt: None,
        fps: 59.9,
    }
}

// ── Layout ──────────────────────────────────────────────────────────────────

#[test]
fn layout_keeps_one_picture_row() {
    let l = Layout::new(10, 3, 5);
    assert_eq!(l.hud_rows, 2);
    assert_eq!(l.visual_rows(), 1);
    assert_eq!(l.pixel_size(), (10, 2));

    let l = Layout::new(80, 24, 4);
    assert_eq!(l.pixel_size(), (80, 40));
}

// ── Half-block renderer ─────────────────────────────────────────────────────

#[test]
fn solid_surface_renders_colored_half_blocks() {
    let mut s = Surface::new(4, 4);
    s.flood(Rgb::new(255, 0, 0));
    let text = render(&s, Layout::new(4, 3, 1), "status", None, false);
    assert_eq!(text.matches('\u{2580}').count(), 8);
    assert!(text.contains("\x1b[38;2;255;0;0m"));
    assert!(text.contains("\x1b[48;2;255;0;0m"));
    assert!(text.contains("status"));
    assert!(!text.contains("\x1b[?2026h"));
}

#[test]
fn transparent_pixels_render_black() {
    let s = Surface::new(8, 8);
    let text = render(&s, Layout::new(8, 4, 0), "", None, true);
    assert!(text.contains("\x1b[38;2;0;0;0m"));
    assert!(text.starts_with("\x1b[?2026h"));
    assert!(text.ends_with("\x1b[?2026l"));
}

#[test]
fn large_surface_is_downsampled() {
    let mut s = Surface::new(8, 8);
    s.fill_rect(0.0, 0.0, 4.0, 8.0, Rgb::new(255, 0, 0));
    s.fill_rect(4.0, 0.0, 4.0, 8.0, Rgb::new(0, 0, 255));
    let text = render(&s, Layout::new(2, 2, 0), "", None, false);
    assert!(text.contains("\x1b[38;2;255;0;0m"));
    assert!(text.contains("\x1b[38;2;0;0;255m"));
}

#[test]
fn overlay_is_drawn_over_the_picture() {
    let s = Surface::new(40, 20);
    let text = render(&s, Layout::new(40, 12, 2), "", Some("Help\nq quit"), false);
    assert!(text.contains("Help"));
    assert!(text.contains("q quit"));
}

#[test]
fn zero_width_terminal_writes_nothing() {
    let s = Surface::new(4, 4);
    assert!(render(&s, Layout::new(0, 10, 2), "hud", None, true).is_empty());
}

// ── HUD ─────────────────────────────────────────────────────────────────────

#[test]
fn hard_wrap_splits_at_width() {
    assert_eq!(hud::hard_wrap_line("abcdef", 4), vec!["abcd", "ef"]);
    assert_eq!(hud::hard_wrap_line("", 4), vec![""]);
    assert_eq!(hud::hard_wrap_line("ab", 0), vec!["a", "b"]);
}

#[test]
fn hud_rows_never_take_the_whole_screen() {
    assert_eq!(hud::hud_rows_for_text(10, true, "a\nb\nc"), 3);
    assert_eq!(hud::hud_rows_for_text(2, true, "a\nb\nc"), 1);
    assert_eq!(hud::hud_rows_for_text(10, false, "a\nb\nc"), 0);
}

#[test]
fn hud_reports_media_effects_and_state() {
    let mut effects = EffectState::default();
    effects.toggle(Effect::Analog);
    effects.set_intensity(Effect::Analog, 0.75);
    let text = hud::build_hud(400, &info(&effects));

    assert!(text.contains("clip.mp4 (video)"));
    assert!(text.contains("clip playing"));
    assert!(text.contains(">+analog 0.75"));
    assert!(text.contains("glitch rows"));
    assert!(text.contains("rec on"));
    assert!(text.contains("mirror off"));
    assert!(text.contains("abstract 12"));
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn hud_prompt_wins_over_notice() {
    let effects = EffectState::default();
    let mut board = NoticeBoard::default();
    board.post_error(&FxError::UnsupportedMediaType {
        mime: "text/plain".into(),
    });
    let now = Instant::now();

    let mut i = info(&effects);
    i.notice = board.current(now);
    let text = hud::build_hud(400, &i);
    assert!(text.contains("warning: unsupported file type: text/plain"));

    i.prompt = Some("/tmp/a.jpg");
    let text = hud::build_hud(400, &i);
    assert!(text.contains("Open file: /tmp/a.jpg_"));
    assert!(!text.contains("unsupported"));
}

#[test]
fn narrow_hud_wraps() {
    let effects = EffectState::default();
    let text = hud::build_hud(20, &info(&effects));
    assert!(text.lines().all(|l| l.chars().count() <= 20));
    assert!(text.lines().count() > 4);
}

#[test]
fn notices_expire() {
    let mut board = NoticeBoard::default();
    board.post(Severity::Info, "hello");
    let at = board.current(Instant::now()).expect("fresh notice").at;
    assert!(board.current(at + std::time::Duration::from_secs(7)).is_none());
}

// ── Surface primitives ──────────────────────────────────────────────────────

#[test]
fn multiply_fill_on_blank_surface_acts_as_source_over() {
    let mut s = Surface::new(2, 2);
    s.fill(Rgb::CYAN, 1.0, BlendMode::Multiply);
    assert_eq!(s.pixel(0, 0), Some([0, 255, 255, 255]));
}

#[test]
fn draw_image_scales_and_blends_alpha() {
    let mut s = Surface::new(4, 4);
    s.flood(Rgb::WHITE);
    let src = [0, 0, 0, 0, 0, 0, 0, 255];
    s.draw_image(&src, 2, 1);
    assert_eq!(s.pixel(0, 0), Some([255, 255, 255, 255]));
    assert_eq!(s.pixel(3, 3), Some([0, 0, 0, 255]));
}

#[test]
fn resample_flattens_alpha_over_black() {
    let mut s = Surface::new(2, 1);
    s.pixels_mut().copy_from_slice(&[200, 100, 50, 128, 255, 255, 255, 255]);
    let mut out = Vec::new();
    s.resample_over_black(2, 1, &mut out);
    assert_eq!(out, vec![100, 50, 25, 255, 255, 255, 255, 255]);
}

#[test]
fn out_of_range_pixel_is_none() {
    let s = Surface::new(3, 3);
    assert_eq!(s.pixel(3, 0), None);
    assert!(s.is_blank());
}
