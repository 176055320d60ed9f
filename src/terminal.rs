use anyhow::{Context, bail};
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, ClearType},
};
use std::io::{Stdout, Write, stdout};

pub const MIN_COLS: u16 = 8;
pub const MIN_ROWS: u16 = 4;

pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Guard exists before the remaining steps so Drop undoes raw mode on failure.
        let guard = Self { _private: () };

        let mut out = stdout();
        out.execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        out.execute(terminal::Clear(ClearType::All))
            .context("clear screen")?;
        out.execute(cursor::Hide).context("hide cursor")?;
        Ok(guard)
    }

    pub fn stdout() -> Stdout {
        stdout()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        // Sync output off, autowrap on, colors reset.
        let _ = out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = out.flush();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
    }
}

pub fn size() -> anyhow::Result<(u16, u16)> {
    let (cols, rows) = terminal::size().context("get terminal size")?;
    if cols < MIN_COLS || rows < MIN_ROWS {
        bail!("terminal too small (need at least {MIN_COLS}x{MIN_ROWS}, got {cols}x{rows})");
    }
    Ok((cols, rows))
}
