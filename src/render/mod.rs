mod halfblock;

pub use halfblock::HalfBlockRenderer;

use std::io::Write;

use crate::hud::hard_wrap_line;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub cols: u16,
    pub rows: u16,
    pub hud_rows: u16,
}

impl Layout {
    // The HUD never takes the last picture row.
    pub fn new(cols: u16, rows: u16, hud_rows: u16) -> Self {
        Self {
            cols,
            rows,
            hud_rows: hud_rows.min(rows.saturating_sub(1)),
        }
    }

    pub fn visual_rows(&self) -> u16 {
        self.rows.saturating_sub(self.hud_rows).max(1)
    }

    pub fn pixel_size(&self) -> (usize, usize) {
        (self.cols as usize, self.visual_rows() as usize * 2)
    }
}

pub struct Frame<'a> {
    pub layout: Layout,
    pub surface: &'a Surface,
    pub hud: &'a str,
    pub overlay: Option<&'a str>,
    pub sync_updates: bool,
}

pub fn draw_overlay_popup(
    out: &mut dyn Write,
    term_cols: u16,
    term_rows: u16,
    text: &str,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }

    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner_w = cols.saturating_sub(6).max(1);
    let lines = text
        .lines()
        .flat_map(|l| hard_wrap_line(l, max_inner_w))
        .collect::<Vec<_>>();

    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, max_inner_w);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2)).max(4);
    let inner_w = box_w.saturating_sub(4);
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = (body_h + 2).min(rows.saturating_sub(1)).max(3);

    let left = (cols.saturating_sub(box_w)) / 2 + 1;
    let top = (rows.saturating_sub(box_h)) / 2 + 1;
    let edge = format!("+{}+", "-".repeat(box_w.saturating_sub(2)));
    let blank = " ".repeat(inner_w);

    out.write_all(b"\x1b[0m\x1b[38;2;230;230;230m\x1b[48;2;0;0;0m")?;
    for row in 1..=rows {
        write!(out, "\x1b[{row};1H\x1b[2K")?;
    }

    out.write_all(b"\x1b[48;2;24;24;24m")?;
    write!(out, "\x1b[{top};{left}H{edge}")?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = top + 1 + i;
        write!(out, "\x1b[{row};{left}H| {blank} |")?;
        if i == 0 {
            write!(out, "\x1b[{row};{}H\x1b[1m{line}\x1b[22m", left + 2)?;
        } else {
            write!(out, "\x1b[{row};{}H{line}", left + 2)?;
        }
    }
    write!(out, "\x1b[{};{left}H{edge}", top + box_h - 1)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}
