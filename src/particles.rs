use std::collections::VecDeque;
use std::f32::consts::PI;

use crate::surface::{Rgb, Surface};

pub const DEFAULT_CAPACITY: usize = 200;
pub const MIRROR_CAPACITY: usize = 100;
pub const SPAWN_PROBABILITY: f32 = 0.10;

const BLOB_VERTICES: usize = 8;
const CURVE_STEPS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Pixel,
    Circle,
    Blob,
    Heart,
    Smiley,
}

impl ParticleKind {
    pub const ABSTRACT: [Self; 4] = [Self::Pixel, Self::Blob, Self::Heart, Self::Smiley];
    pub const MIRROR: [Self; 1] = [Self::Circle];
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnProfile {
    pub size_min: f32,
    pub size_max: f32,
    pub max_speed: f32,
    pub kinds: &'static [ParticleKind],
}

impl SpawnProfile {
    pub const ABSTRACT: Self = Self {
        size_min: 5.0,
        size_max: 35.0,
        max_speed: 2.0,
        kinds: &ParticleKind::ABSTRACT,
    };

    pub const MIRROR: Self = Self {
        size_min: 10.0,
        size_max: 60.0,
        max_speed: 2.5,
        kinds: &ParticleKind::MIRROR,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub size: f32,
    pub color: Rgb,
    pub kind: ParticleKind,
    // Per-vertex radius factors so a blob keeps its outline between frames.
    pub jitter: [f32; BLOB_VERTICES],
}

impl Particle {
    pub fn new(x: f32, y: f32, dx: f32, dy: f32, size: f32, color: Rgb, kind: ParticleKind) -> Self {
        Self {
            x,
            y,
            dx,
            dy,
            size,
            color,
            kind,
            jitter: [1.0; BLOB_VERTICES],
        }
    }

    pub fn spawn(rng: &mut fastrand::Rng, width: usize, height: usize, profile: &SpawnProfile) -> Self {
        let size = profile.size_min + rng.f32() * (profile.size_max - profile.size_min);
        let x = rng.f32() * width as f32;
        let y = rng.f32() * height as f32;
        let dx = (rng.f32() - 0.5) * 2.0 * profile.max_speed;
        let dy = (rng.f32() - 0.5) * 2.0 * profile.max_speed;
        let color = Rgb::from_hsl(rng.f32() * 360.0, 1.0, 0.5);
        let kind = if profile.kinds.is_empty() {
            ParticleKind::Circle
        } else {
            profile.kinds[rng.usize(..profile.kinds.len())]
        };
        let mut p = Self::new(x, y, dx, dy, size, color, kind);
        for j in &mut p.jitter {
            *j = 0.6 + rng.f32() * 0.4;
        }
        p
    }

    /// Integrate one step, then reflect off any edge the particle is moving into.
    pub fn step(&mut self, width: usize, height: usize) {
        self.x += self.dx;
        self.y += self.dy;
        let (w, h) = (width as f32, height as f32);
        if (self.x - self.size < 0.0 && self.dx < 0.0) || (self.x + self.size > w && self.dx > 0.0) {
            self.dx = -self.dx;
        }
        if (self.y - self.size < 0.0 && self.dy < 0.0) || (self.y + self.size > h && self.dy > 0.0) {
            self.dy = -self.dy;
        }
    }

    pub fn draw(&self, surface: &mut Surface) {
        let (x, y, s) = (self.x, self.y, self.size);
        match self.kind {
            ParticleKind::Pixel => surface.fill_rect(x - s * 0.5, y - s * 0.5, s, s, self.color),
            ParticleKind::Circle => surface.fill_circle(x, y, s, self.color),
            ParticleKind::Blob => {
                let pts = (0..BLOB_VERTICES)
                    .map(|i| {
                        let a = i as f32 / BLOB_VERTICES as f32 * 2.0 * PI;
                        let r = s * self.jitter[i];
                        (x + a.cos() * r, y + a.sin() * r)
                    })
                    .collect::<Vec<_>>();
                surface.fill_polygon(&pts, self.color);
            }
            ParticleKind::Heart => surface.fill_polygon(&heart_outline(x, y, s), self.color),
            ParticleKind::Smiley => {
                surface.fill_circle(x, y, s, self.color);
                let eye = (s * 0.15).max(0.5);
                surface.fill_circle(x - s * 0.35, y - s * 0.3, eye, Rgb::BLACK);
                surface.fill_circle(x + s * 0.35, y - s * 0.3, eye, Rgb::BLACK);
                let mouth = (0..=CURVE_STEPS)
                    .map(|i| {
                        let a = PI * (0.15 + 0.7 * i as f32 / CURVE_STEPS as f32);
                        (x + a.cos() * s * 0.55, y + 0.05 * s + a.sin() * s * 0.55)
                    })
                    .collect::<Vec<_>>();
                surface.stroke_polyline(&mouth, (s * 0.1).max(1.0), Rgb::BLACK);
            }
        }
    }
}

fn heart_outline(x: f32, y: f32, s: f32) -> Vec<(f32, f32)> {
    let p = |u: f32, v: f32| (x + u * s, y + v * s);
    let top = p(0.0, -0.35);
    let bottom = p(0.0, 0.9);
    let mut pts = Vec::with_capacity(CURVE_STEPS * 2);
    cubic_into(&mut pts, top, p(-0.9, -1.1), p(-1.3, 0.25), bottom);
    cubic_into(&mut pts, bottom, p(1.3, 0.25), p(0.9, -1.1), top);
    pts
}

fn cubic_into(
    out: &mut Vec<(f32, f32)>,
    p0: (f32, f32),
    p1: (f32, f32),
    p2: (f32, f32),
    p3: (f32, f32),
) {
    for i in 0..CURVE_STEPS {
        let t = i as f32 / CURVE_STEPS as f32;
        let u = 1.0 - t;
        let a = u * u * u;
        let b = 3.0 * u * u * t;
        let c = 3.0 * u * t * t;
        let d = t * t * t;
        out.push((
            a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0,
            a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1,
        ));
    }
}

/// Insertion-ordered, bounded particle store. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct ShapeRegistry {
    items: VecDeque<Particle>,
    capacity: usize,
}

impl ShapeRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, particle: Particle) -> usize {
        self.items.push_back(particle);
        let mut evicted = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.items.iter_mut()
    }

    pub fn step_all(&mut self, width: usize, height: usize) {
        for p in &mut self.items {
            p.step(width, height);
        }
    }

    pub fn draw_all(&self, surface: &mut Surface) {
        for p in &self.items {
            p.draw(surface);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstractState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub struct AbstractMode {
    state: AbstractState,
    registry: ShapeRegistry,
    profile: SpawnProfile,
    spawn_probability: f32,
}

impl AbstractMode {
    pub fn new(capacity: usize) -> Self {
        Self::with_profile(capacity, SpawnProfile::ABSTRACT, SPAWN_PROBABILITY)
    }

    pub fn with_profile(capacity: usize, profile: SpawnProfile, spawn_probability: f32) -> Self {
        Self {
            state: AbstractState::Stopped,
            registry: ShapeRegistry::new(capacity),
            profile,
            spawn_probability: spawn_probability.clamp(0.0, 1.0),
        }
    }

    pub fn state(&self) -> AbstractState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == AbstractState::Running
    }

    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = AbstractState::Running;
        true
    }

    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = AbstractState::Stopped;
        self.registry.clear();
        true
    }

    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ShapeRegistry {
        &mut self.registry
    }

    pub fn maybe_spawn(&mut self, rng: &mut fastrand::Rng, width: usize, height: usize) -> bool {
        if !self.is_running() || rng.f32() >= self.spawn_probability {
            return false;
        }
        self.spawn(rng, width, height);
        true
    }

    pub fn spawn(&mut self, rng: &mut fastrand::Rng, width: usize, height: usize) {
        let p = Particle::spawn(rng, width, height, &self.profile);
        self.registry.push(p);
    }

    pub fn advance(&mut self, surface: &mut Surface) {
        if surface.is_empty() {
            return;
        }
        self.registry.step_all(surface.width(), surface.height());
        self.registry.draw_all(surface);
    }
}
