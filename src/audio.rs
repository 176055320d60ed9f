use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::FxError;
use crate::media::AudioClip;

pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

pub trait FrequencySource {
    fn bin_count(&self) -> usize {
        BIN_COUNT
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

pub trait Playback: FrequencySource {
    fn play(&mut self);
    fn pause(&mut self);
    /// Pause and rewind to the start.
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
    fn advance(&mut self, dt: Duration);
    fn take_ended(&mut self) -> bool;
    fn label(&self) -> &'static str;
}

/// 256-point FFT with Blackman window, temporal smoothing and a -100..-30 dB byte
/// mapping.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let n = FFT_SIZE;
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        Self {
            fft: planner.plan_fft_forward(n),
            window,
            buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    pub fn analyse(&mut self, samples: &[f32], out: &mut [u8]) {
        let n = FFT_SIZE;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();
        for i in 0..n {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            self.buf[i] = Complex {
                re: s * self.window[i],
                im: 0.0,
            };
        }
        self.fft.process(&mut self.buf);

        for (i, slot) in out.iter_mut().enumerate().take(BIN_COUNT) {
            let c = self.buf[i];
            let mag = (c.re * c.re + c.im * c.im).sqrt() / n as f32;
            self.smoothed[i] = SMOOTHING * self.smoothed[i] + (1.0 - SMOOTHING) * mag;
            *slot = magnitude_to_byte(self.smoothed[i]);
        }
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

fn magnitude_to_byte(mag: f32) -> u8 {
    if mag <= 0.0 {
        return 0;
    }
    let db = 20.0 * mag.log10();
    let scaled = 255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB);
    scaled.clamp(0.0, 255.0) as u8
}

struct PlayheadShared {
    playing: AtomicBool,
    ended: AtomicBool,
    looping: bool,
    // f64 bits: position in clip samples.
    cursor: AtomicU64,
}

impl PlayheadShared {
    fn cursor(&self) -> f64 {
        f64::from_bits(self.cursor.load(Ordering::Relaxed))
    }

    fn set_cursor(&self, v: f64) {
        self.cursor.store(v.to_bits(), Ordering::Relaxed);
    }

    fn step(&self, step: f64, len: usize) {
        let mut pos = self.cursor() + step;
        if pos >= len as f64 {
            if self.looping && len > 0 {
                pos %= len as f64;
            } else {
                pos = len as f64;
                self.playing.store(false, Ordering::Relaxed);
                self.ended.store(true, Ordering::Relaxed);
            }
        }
        self.set_cursor(pos);
    }
}

pub struct ClipPlayer {
    clip: AudioClip,
    shared: Arc<PlayheadShared>,
    analyser: Analyser,
    window: Vec<f32>,
    stream: Option<cpal::Stream>,
}

impl ClipPlayer {
    pub fn new(clip: AudioClip, looping: bool) -> (Self, Option<FxError>) {
        let shared = Arc::new(PlayheadShared {
            playing: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            looping,
            cursor: AtomicU64::new(0f64.to_bits()),
        });
        let (stream, err) = match open_output(&clip, Arc::clone(&shared)) {
            Ok(s) => (Some(s), None),
            Err(e) => {
                tracing::warn!(error = %e, "audio output unavailable, playing silently");
                (None, Some(FxError::capability("audio output", format!("{e:#}"))))
            }
        };
        let player = Self {
            clip,
            shared,
            analyser: Analyser::new(),
            window: vec![0.0; FFT_SIZE],
            stream,
        };
        (player, err)
    }

    pub fn silent(clip: AudioClip, looping: bool) -> Self {
        let shared = Arc::new(PlayheadShared {
            playing: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            looping,
            cursor: AtomicU64::new(0f64.to_bits()),
        });
        Self {
            clip,
            shared,
            analyser: Analyser::new(),
            window: vec![0.0; FFT_SIZE],
            stream: None,
        }
    }

    pub fn position_secs(&self) -> f32 {
        self.shared.cursor() as f32 / self.clip.sample_rate.max(1) as f32
    }
}

impl FrequencySource for ClipPlayer {
    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let end = (self.shared.cursor() as usize).min(self.clip.samples.len());
        let start = end.saturating_sub(FFT_SIZE);
        let chunk = &self.clip.samples[start..end];
        self.window.clear();
        self.window.extend_from_slice(chunk);
        self.analyser.analyse(&self.window, out);
    }
}

impl Playback for ClipPlayer {
    fn play(&mut self) {
        if self.shared.cursor() as usize >= self.clip.samples.len() {
            self.shared.set_cursor(0.0);
        }
        self.shared.ended.store(false, Ordering::Relaxed);
        self.shared.playing.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.play() {
                tracing::warn!(%err, "audio output refused to start");
            }
        }
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.pause();
        self.shared.set_cursor(0.0);
        self.analyser.reset();
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    fn advance(&mut self, dt: Duration) {
        if self.stream.is_some() || !self.is_playing() {
            return;
        }
        let step = dt.as_secs_f64() * self.clip.sample_rate as f64;
        self.shared.step(step, self.clip.samples.len());
    }

    fn take_ended(&mut self) -> bool {
        self.shared.ended.swap(false, Ordering::Relaxed)
    }

    fn label(&self) -> &'static str {
        if self.stream.is_some() { "clip" } else { "clip (silent)" }
    }
}

fn open_output(clip: &AudioClip, shared: Arc<PlayheadShared>) -> anyhow::Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no default output device found"))?;
    let supported = device
        .default_output_config()
        .context("get default output config")?;
    let channels = supported.channels() as usize;
    let step = clip.sample_rate as f64 / supported.sample_rate().0.max(1) as f64;
    let config: cpal::StreamConfig = supported.clone().into();
    let samples = Arc::clone(&clip.samples);

    let err_fn = |err| tracing::error!(%err, "audio output stream error");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _| fill_output(data, channels, step, &samples, &shared),
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _| fill_output(data, channels, step, &samples, &shared),
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _| fill_output(data, channels, step, &samples, &shared),
            err_fn,
            None,
        )?,
        fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
    };
    stream.play().context("start output stream")?;
    Ok(stream)
}

fn fill_output<T: SizedSample + FromSample<f32>>(
    data: &mut [T],
    channels: usize,
    step: f64,
    samples: &[f32],
    shared: &PlayheadShared,
) {
    for frame in data.chunks_mut(channels.max(1)) {
        let v = if shared.playing.load(Ordering::Relaxed) {
            let idx = shared.cursor() as usize;
            let s = samples.get(idx).copied().unwrap_or(0.0);
            shared.step(step, samples.len());
            s
        } else {
            0.0
        };
        for out in frame.iter_mut() {
            *out = T::from_sample(v);
        }
    }
}

pub struct MicInput {
    _stream: cpal::Stream,
    cons: ringbuf::HeapCons<f32>,
    ring: SampleRing,
    window: Vec<f32>,
    analyser: Analyser,
    playing: bool,
}

impl MicInput {
    pub fn open(device_query: Option<&str>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_mic_input_device(&host, device_query)?;
        let supported = device
            .default_input_config()
            .context("get default input config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let rb = HeapRb::<f32>::new((sample_rate_hz as usize).max(FFT_SIZE));
        let (mut prod, cons) = rb.split();

        let err_fn = |err| tracing::error!(%err, "audio input stream error");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };

        stream.play().context("start input stream")?;

        Ok(Self {
            _stream: stream,
            cons,
            ring: SampleRing::new(FFT_SIZE),
            window: vec![0.0; FFT_SIZE],
            analyser: Analyser::new(),
            playing: false,
        })
    }
}

impl FrequencySource for MicInput {
    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        while let Some(s) = self.cons.try_pop() {
            self.ring.push(s);
        }
        self.ring.unroll_into(&mut self.window);
        self.analyser.analyse(&self.window, out);
    }
}

// Most recent `len` samples, oldest first once unrolled.
struct SampleRing {
    buf: Vec<f32>,
    write_pos: usize,
}

impl SampleRing {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len.max(1)],
            write_pos: 0,
        }
    }

    fn push(&mut self, s: f32) {
        self.buf[self.write_pos] = s;
        self.write_pos = (self.write_pos + 1) % self.buf.len();
    }

    fn unroll_into(&self, out: &mut [f32]) {
        let (newer, older) = self.buf.split_at(self.write_pos);
        let n = older.len().min(out.len());
        out[..n].copy_from_slice(&older[..n]);
        let m = newer.len().min(out.len() - n);
        out[n..n + m].copy_from_slice(&newer[..m]);
    }
}

impl Playback for MicInput {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.analyser.reset();
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn advance(&mut self, _dt: Duration) {}

    fn take_ended(&mut self) -> bool {
        false
    }

    fn label(&self) -> &'static str {
        "mic"
    }
}

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

fn select_mic_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    let devices = host
        .input_devices()
        .context("enumerate input devices")?
        .collect::<Vec<_>>();

    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no input device matching: {want}"));
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    for frame in data.chunks(channels.max(1)) {
        let mut acc = 0.0f32;
        for s in frame {
            acc += (*s).to_float_sample();
        }
        let mono = acc / channels.max(1) as f32;
        let _ = prod.try_push(mono);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_maps_to_zero_bins() {
        let mut a = Analyser::new();
        let mut out = vec![7u8; BIN_COUNT];
        a.analyse(&[0.0; FFT_SIZE], &mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn loud_tone_lights_its_bin() {
        let mut a = Analyser::new();
        let bin = 16usize;
        let tone = (0..FFT_SIZE)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / FFT_SIZE as f32).sin())
            .collect::<Vec<_>>();
        let mut out = vec![0u8; BIN_COUNT];
        for _ in 0..20 {
            a.analyse(&tone, &mut out);
        }
        assert!(out[bin] > 200, "tone bin too quiet: {}", out[bin]);
        assert!(out[bin + 20] < out[bin] / 2, "leak: {}", out[bin + 20]);
    }

    #[test]
    fn sample_ring_unrolls_oldest_first() {
        let mut ring = SampleRing::new(4);
        let mut out = [9.0; 4];
        ring.unroll_into(&mut out);
        assert_eq!(out, [0.0; 4]);

        for s in 1..=6 {
            ring.push(s as f32);
        }
        ring.unroll_into(&mut out);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);

        ring.push(7.0);
        ring.push(8.0);
        ring.unroll_into(&mut out);
        assert_eq!(out, [5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn magnitude_scaling_clamps_both_ends() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        assert_eq!(magnitude_to_byte(1e-9), 0);
        assert_eq!(magnitude_to_byte(1.0), 255);
    }
}
