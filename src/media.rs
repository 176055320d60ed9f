use std::ffi::OsStr;
use std::fmt;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;

use crate::compositor::BaseFrame;
use crate::error::FxError;

pub const DECODE_SAMPLE_RATE: u32 = 44_100;

const MIN_GIF_DELAY: Duration = Duration::from_millis(20);
const PDF_DPI: u32 = 72;
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Pdf,
    Audio,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Result<Self, FxError> {
        let m = mime.trim().to_ascii_lowercase();
        let kind = if m.starts_with("video/") {
            Some(Self::Video)
        } else if matches!(m.as_str(), "image/gif" | "image/jpeg" | "image/jpg") {
            Some(Self::Image)
        } else if m == "application/pdf" {
            Some(Self::Pdf)
        } else if m.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            None
        };
        kind.ok_or(FxError::UnsupportedMediaType { mime: m })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn sniff_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "pdf" => "application/pdf",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/aac",
        "opus" => "audio/opus",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Picture {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width * height * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_rgba(img: image::RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        Self::new(w as usize, h as usize, img.into_raw())
    }

    pub fn as_base(&self) -> BaseFrame<'_> {
        BaseFrame {
            pixels: &self.pixels,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

pub trait VisualSource {
    fn frame(&mut self, elapsed: Duration) -> Option<BaseFrame<'_>>;
}

impl VisualSource for Picture {
    fn frame(&mut self, _elapsed: Duration) -> Option<BaseFrame<'_>> {
        Some(self.as_base())
    }
}

pub struct Animation {
    frames: Vec<(Picture, Duration)>,
    total: Duration,
}

impl Animation {
    pub fn new(frames: Vec<(Picture, Duration)>) -> Self {
        let frames = frames
            .into_iter()
            .map(|(p, d)| (p, d.max(MIN_GIF_DELAY)))
            .collect::<Vec<_>>();
        let total = frames.iter().map(|(_, d)| *d).sum();
        Self { frames, total }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn index_at(&self, elapsed: Duration) -> usize {
        if self.frames.len() <= 1 || self.total.is_zero() {
            return 0;
        }
        let mut t = Duration::from_nanos((elapsed.as_nanos() % self.total.as_nanos()) as u64);
        for (i, (_, d)) in self.frames.iter().enumerate() {
            if t < *d {
                return i;
            }
            t -= *d;
        }
        self.frames.len() - 1
    }
}

impl VisualSource for Animation {
    fn frame(&mut self, elapsed: Duration) -> Option<BaseFrame<'_>> {
        let i = self.index_at(elapsed);
        self.frames.get(i).map(|(p, _)| p.as_base())
    }
}

pub struct VideoStream {
    child: Child,
    frames: Receiver<Vec<u8>>,
    current: Picture,
}

impl VideoStream {
    /// Frames are scaled to `width`×`height` by ffmpeg. Fails unless the first
    /// frame arrives.
    pub fn open(path: &Path, width: usize, height: usize) -> Result<Self, FxError> {
        Self::open_with(OsStr::new("ffmpeg"), path, width, height)
    }

    pub fn open_with(
        program: &OsStr,
        path: &Path,
        width: usize,
        height: usize,
    ) -> Result<Self, FxError> {
        let (width, height) = (width.max(2), height.max(2));
        let mut child = Command::new(program)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-re")
            .arg("-stream_loop")
            .arg("-1")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-vf")
            .arg(format!("scale={width}:{height}"))
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgba")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", e))?;

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(FxError::decode(path, "ffmpeg pipes unavailable"));
        };

        let errors = thread::Builder::new()
            .name("video-stderr".to_string())
            .spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })?;

        let frame_len = width * height * 4;
        let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(2);
        let shown = path.display().to_string();
        thread::Builder::new()
            .name("video-decode".to_string())
            .spawn(move || {
                loop {
                    let mut buf = vec![0u8; frame_len];
                    if let Err(err) = stdout.read_exact(&mut buf) {
                        tracing::debug!(%err, path = %shown, "video pipe closed");
                        return;
                    }
                    if tx.send(buf).is_err() {
                        return;
                    }
                }
            })?;

        let first = match rx.recv_timeout(FIRST_FRAME_TIMEOUT) {
            Ok(buf) => buf,
            Err(err) => {
                let _ = child.kill();
                let status = child.wait().ok();
                let stderr = errors.join().unwrap_or_default();
                let detail = match stderr.trim() {
                    "" if matches!(err, RecvTimeoutError::Timeout) => {
                        format!("no frame within {FIRST_FRAME_TIMEOUT:?}")
                    }
                    "" => match status {
                        Some(st) => format!("ffmpeg {st}: no frames decoded"),
                        None => "ffmpeg produced no frames".to_string(),
                    },
                    text => text.to_string(),
                };
                tracing::warn!(path = %path.display(), %detail, "video decode failed");
                return Err(FxError::decode(path, detail));
            }
        };

        tracing::info!(path = %path.display(), width, height, "video stream opened");
        Ok(Self {
            child,
            frames: rx,
            current: Picture::new(width, height, first),
        })
    }
}

impl VisualSource for VideoStream {
    fn frame(&mut self, _elapsed: Duration) -> Option<BaseFrame<'_>> {
        loop {
            match self.frames.try_recv() {
                Ok(buf) => self.current.pixels = buf,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Some(self.current.as_base())
    }
}

impl Drop for VideoStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct LoadedMedia {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub visual: Option<Box<dyn VisualSource>>,
    pub audio: Option<AudioClip>,
}

impl LoadedMedia {
    pub fn still(path: impl Into<PathBuf>, picture: Picture) -> Self {
        Self {
            kind: MediaKind::Image,
            path: path.into(),
            visual: Some(Box::new(picture)),
            audio: None,
        }
    }

    pub fn audio(path: impl Into<PathBuf>, clip: AudioClip) -> Self {
        Self {
            kind: MediaKind::Audio,
            path: path.into(),
            visual: None,
            audio: Some(clip),
        }
    }
}

impl fmt::Debug for LoadedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedMedia")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("visual", &self.visual.is_some())
            .field("audio", &self.audio.as_ref().map(|a| a.samples.len()))
            .finish()
    }
}

pub fn load(path: &Path, surface_w: usize, surface_h: usize) -> Result<LoadedMedia, FxError> {
    let kind = MediaKind::from_mime(sniff_mime(path))?;
    if !path.exists() {
        return Err(FxError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let (visual, audio): (Option<Box<dyn VisualSource>>, Option<AudioClip>) = match kind {
        MediaKind::Image => (Some(decode_image(path)?), None),
        MediaKind::Pdf => (Some(Box::new(render_pdf_page(path, 1)?)), None),
        MediaKind::Video => (Some(Box::new(VideoStream::open(path, surface_w, surface_h)?)), None),
        MediaKind::Audio => (None, Some(decode_audio(path)?)),
    };
    tracing::info!(path = %path.display(), %kind, "media loaded");
    Ok(LoadedMedia {
        kind,
        path: path.to_path_buf(),
        visual,
        audio,
    })
}

fn decode_image(path: &Path) -> Result<Box<dyn VisualSource>, FxError> {
    let is_gif = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("gif"));
    if is_gif {
        let anim = decode_gif(path)?;
        if anim.len() > 1 {
            return Ok(Box::new(anim));
        }
    }
    let img = image::open(path).map_err(|e| FxError::decode(path, e.to_string()))?;
    Ok(Box::new(Picture::from_rgba(img.to_rgba8())))
}

pub fn decode_gif(path: &Path) -> Result<Animation, FxError> {
    let file = std::fs::File::open(path)?;
    let decoder =
        GifDecoder::new(BufReader::new(file)).map_err(|e| FxError::decode(path, e.to_string()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| FxError::decode(path, e.to_string()))?;
    let frames = frames
        .into_iter()
        .map(|f| {
            let (num, den) = f.delay().numer_denom_ms();
            let ms = if den == 0 { 0 } else { num / den };
            (Picture::from_rgba(f.into_buffer()), Duration::from_millis(ms as u64))
        })
        .collect::<Vec<_>>();
    if frames.is_empty() {
        return Err(FxError::decode(path, "gif has no frames"));
    }
    Ok(Animation::new(frames))
}

pub fn render_pdf_page(path: &Path, page: u32) -> Result<Picture, FxError> {
    let page = page.max(1).to_string();
    let out = Command::new("pdftoppm")
        .arg("-f")
        .arg(&page)
        .arg("-l")
        .arg(&page)
        .arg("-singlefile")
        .arg("-r")
        .arg(PDF_DPI.to_string())
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error("pdftoppm", e))?;
    if !out.status.success() {
        let detail = String::from_utf8_lossy(&out.stderr).trim().to_string();
        return Err(FxError::decode(path, format!("pdftoppm {}: {detail}", out.status)));
    }
    decode_ppm(path, &out.stdout)
}

pub fn decode_ppm(path: &Path, bytes: &[u8]) -> Result<Picture, FxError> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Pnm)
        .map_err(|e| FxError::decode(path, e.to_string()))?;
    Ok(Picture::from_rgba(img.to_rgba8()))
}

pub fn decode_audio(path: &Path) -> Result<AudioClip, FxError> {
    let is_wav = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        decode_wav(path)
    } else {
        decode_with_ffmpeg(path)
    }
}

/// Any PCM WAV, downmixed to mono f32.
pub fn decode_wav(path: &Path) -> Result<AudioClip, FxError> {
    let reader = hound::WavReader::open(path).map_err(|e| FxError::decode(path, e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| FxError::decode(path, e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| FxError::decode(path, e.to_string()))?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect::<Vec<_>>();
    Ok(AudioClip::new(mono, spec.sample_rate))
}

fn decode_with_ffmpeg(path: &Path) -> Result<AudioClip, FxError> {
    let out = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(path)
        .arg("-vn")
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg(DECODE_SAMPLE_RATE.to_string())
        .arg("-f")
        .arg("f32le")
        .arg("-")
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error("ffmpeg", e))?;
    if !out.status.success() {
        let detail = String::from_utf8_lossy(&out.stderr).trim().to_string();
        return Err(FxError::decode(path, format!("ffmpeg {}: {detail}", out.status)));
    }
    let samples = out
        .stdout
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect::<Vec<_>>();
    Ok(AudioClip::new(samples, DECODE_SAMPLE_RATE))
}

pub(crate) fn spawn_error(tool: &'static str, err: io::Error) -> FxError {
    if err.kind() == io::ErrorKind::NotFound {
        FxError::capability(tool, format!("{tool} not found in PATH"))
    } else {
        FxError::Io(err)
    }
}
