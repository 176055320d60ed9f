use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::FxError;
use crate::media::spawn_error;
use crate::surface::Surface;

pub const RECORD_FPS: u32 = 30;

pub struct Recorder {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    width: usize,
    height: usize,
    frames: u64,
    last_push: Option<Duration>,
    scratch: Vec<u8>,
}

impl Recorder {
    pub fn start(path: &Path, width: usize, height: usize) -> Result<Self, FxError> {
        // Encoders want even dimensions.
        let (width, height) = ((width.max(2) / 2) * 2, (height.max(2) / 2) * 2);
        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgba")
            .arg("-video_size")
            .arg(format!("{width}x{height}"))
            .arg("-framerate")
            .arg(RECORD_FPS.to_string())
            .arg("-i")
            .arg("-")
            .arg("-c:v")
            .arg("libvpx-vp9")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-b:v")
            .arg("2M")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", e))?;
        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            return Err(FxError::capability("recording", "ffmpeg stdin unavailable"));
        }
        tracing::info!(path = %path.display(), width, height, "recording started");
        Ok(Self {
            child,
            stdin,
            path: path.to_path_buf(),
            width,
            height,
            frames: 0,
            last_push: None,
            scratch: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn push_frame(&mut self, now: Duration, surface: &Surface) -> Result<bool, FxError> {
        let period = Duration::from_secs(1) / RECORD_FPS;
        if let Some(last) = self.last_push {
            if now < last + period {
                return Ok(false);
            }
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(false);
        };
        surface.resample_over_black(self.width, self.height, &mut self.scratch);
        stdin.write_all(&self.scratch)?;
        self.last_push = Some(match self.last_push {
            // Keep the cadence on the grid unless we fell far behind.
            Some(last) if now < last + period * 2 => last + period,
            _ => now,
        });
        self.frames += 1;
        Ok(true)
    }

    pub fn stop(mut self) -> Result<PathBuf, FxError> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(FxError::capability(
                "recording",
                format!("ffmpeg exited with status {status}"),
            ));
        }
        tracing::info!(path = %self.path.display(), frames = self.frames, "recording saved");
        Ok(self.path.clone())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.wait();
        }
    }
}

/// `<dir>/media_fx-<unix seconds>.webm`
pub fn recording_path(dir: &Path) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("media_fx-{secs}.webm"))
}
