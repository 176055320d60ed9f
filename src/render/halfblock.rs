use std::io::Write;

use crate::render::{Frame, draw_overlay_popup};

const HALF_BLOCK: char = '\u{2580}';

/// Truecolor `▀` cells: foreground is the upper pixel, background the lower one.
/// The surface is sampled nearest-neighbour and flattened over black.
pub struct HalfBlockRenderer {
    last_fg: Option<[u8; 3]>,
    last_bg: Option<[u8; 3]>,
}

impl Default for HalfBlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }

    pub fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let cols = frame.layout.cols as usize;
        let visual_rows = frame.layout.visual_rows() as usize;
        if cols == 0 || frame.layout.rows == 0 {
            return Ok(());
        }

        if frame.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        // Home, reset, autowrap off while painting full-width rows.
        out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
        self.last_fg = None;
        self.last_bg = None;

        let px_h = visual_rows * 2;
        for row in 0..visual_rows {
            for x in 0..cols {
                let top = sample(frame, x, row * 2, cols, px_h);
                let bot = sample(frame, x, row * 2 + 1, cols, px_h);
                if self.last_fg != Some(top) {
                    write!(out, "\x1b[38;2;{};{};{}m", top[0], top[1], top[2])?;
                    self.last_fg = Some(top);
                }
                if self.last_bg != Some(bot) {
                    write!(out, "\x1b[48;2;{};{};{}m", bot[0], bot[1], bot[2])?;
                    self.last_bg = Some(bot);
                }
                write!(out, "{HALF_BLOCK}")?;
            }
            out.write_all(b"\r\n")?;
        }

        let mut hud_lines = frame.hud.lines();
        for i in 0..frame.layout.hud_rows as usize {
            write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", visual_rows + i + 1)?;
            if let Some(line) = hud_lines.next() {
                let clipped: String = line.chars().take(cols).collect();
                out.write_all(clipped.as_bytes())?;
            }
        }

        if let Some(text) = frame.overlay {
            draw_overlay_popup(out, frame.layout.cols, frame.layout.rows, text)?;
        }

        out.write_all(b"\x1b[?7h")?;
        if frame.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}

fn sample(frame: &Frame<'_>, x: usize, y: usize, cols: usize, rows: usize) -> [u8; 3] {
    let s = frame.surface;
    if s.is_empty() {
        return [0, 0, 0];
    }
    let sx = (x * s.width() / cols).min(s.width() - 1);
    let sy = (y * s.height() / rows).min(s.height() - 1);
    match s.pixel(sx, sy) {
        Some([r, g, b, a]) => {
            let a = a as u16;
            let f = |c: u8| ((c as u16 * a + 127) / 255) as u8;
            [f(r), f(g), f(b)]
        }
        None => [0, 0, 0],
    }
}
