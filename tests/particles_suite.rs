use media_fx::particles::{
    AbstractMode, AbstractState, DEFAULT_CAPACITY, Particle, ParticleKind, ShapeRegistry,
    SpawnProfile,
};
use media_fx::surface::{Rgb, Surface};

fn marker(i: usize) -> Particle {
    Particle::new(i as f32, 0.0, 0.0, 0.0, 1.0, Rgb::WHITE, ParticleKind::Pixel)
}

// ── Registry ────────────────────────────────────────────────────────────────

#[test]
fn registry_evicts_oldest_first() {
    for capacity in [1usize, 5, 17] {
        let mut reg = ShapeRegistry::new(capacity);
        let n = capacity * 3 + 2;
        for i in 0..n {
            reg.push(marker(i));
        }
        assert_eq!(reg.len(), capacity);
        let xs = reg.iter().map(|p| p.x as usize).collect::<Vec<_>>();
        let expected = (n - capacity..n).collect::<Vec<_>>();
        assert_eq!(xs, expected, "capacity {capacity}");
    }
}

#[test]
fn registry_push_reports_evictions() {
    let mut reg = ShapeRegistry::new(2);
    assert_eq!(reg.push(marker(0)), 0);
    assert_eq!(reg.push(marker(1)), 0);
    assert_eq!(reg.push(marker(2)), 1);
    reg.clear();
    assert!(reg.is_empty());
}

// ── Motion ──────────────────────────────────────────────────────────────────

#[test]
fn particle_bounces_off_left_edge() {
    let mut p = Particle::new(0.0, 50.0, -2.0, 0.0, 5.0, Rgb::WHITE, ParticleKind::Pixel);
    p.step(100, 100);
    assert_eq!(p.dx, 2.0);
    assert_eq!(p.x, -2.0);
}

#[test]
fn particle_bounces_off_right_and_bottom_edges() {
    let mut p = Particle::new(98.0, 97.0, 1.0, 1.5, 5.0, Rgb::WHITE, ParticleKind::Circle);
    p.step(100, 100);
    assert_eq!(p.dx, -1.0);
    assert_eq!(p.dy, -1.5);
}

#[test]
fn particle_straddling_edge_but_moving_inward_keeps_velocity() {
    let mut p = Particle::new(2.0, 50.0, 1.0, 0.0, 5.0, Rgb::WHITE, ParticleKind::Blob);
    p.step(100, 100);
    assert_eq!(p.dx, 1.0);
    p.step(100, 100);
    assert_eq!(p.dx, 1.0);
}

// ── Spawning ────────────────────────────────────────────────────────────────

#[test]
fn abstract_spawns_stay_within_profile_ranges() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..500 {
        let p = Particle::spawn(&mut rng, 320, 180, &SpawnProfile::ABSTRACT);
        assert!((5.0..=35.0).contains(&p.size), "size {}", p.size);
        assert!(p.dx.abs() <= 2.0 && p.dy.abs() <= 2.0);
        assert!((0.0..=320.0).contains(&p.x) && (0.0..=180.0).contains(&p.y));
        assert!(ParticleKind::ABSTRACT.contains(&p.kind));
        assert!(p.jitter.iter().all(|j| (0.6..=1.0).contains(j)));
    }
}

#[test]
fn mirror_spawns_are_large_circles() {
    let mut rng = fastrand::Rng::with_seed(8);
    for _ in 0..200 {
        let p = Particle::spawn(&mut rng, 800, 450, &SpawnProfile::MIRROR);
        assert_eq!(p.kind, ParticleKind::Circle);
        assert!((10.0..=60.0).contains(&p.size));
        assert!(p.dx.abs() <= 2.5 && p.dy.abs() <= 2.5);
    }
}

#[test]
fn every_kind_draws_something() {
    let kinds = [
        ParticleKind::Pixel,
        ParticleKind::Circle,
        ParticleKind::Blob,
        ParticleKind::Heart,
        ParticleKind::Smiley,
    ];
    for kind in kinds {
        let mut surface = Surface::new(40, 40);
        let p = Particle::new(20.0, 20.0, 0.0, 0.0, 8.0, Rgb::new(255, 0, 0), kind);
        p.draw(&mut surface);
        assert!(!surface.is_blank(), "{kind:?} drew nothing");
        assert_eq!(surface.pixel(20, 20), Some([255, 0, 0, 255]), "{kind:?}");
    }
}

#[test]
fn drawing_off_surface_is_clipped() {
    let mut surface = Surface::new(10, 10);
    let p = Particle::new(-50.0, -50.0, 0.0, 0.0, 5.0, Rgb::WHITE, ParticleKind::Heart);
    p.draw(&mut surface);
    assert!(surface.is_blank());
}

// ── Abstract mode ───────────────────────────────────────────────────────────

#[test]
fn abstract_mode_start_stop_transitions() {
    let mut mode = AbstractMode::new(DEFAULT_CAPACITY);
    assert_eq!(mode.state(), AbstractState::Stopped);
    assert!(!mode.stop());
    assert!(mode.start());
    assert!(!mode.start());
    assert_eq!(mode.state(), AbstractState::Running);

    let mut rng = fastrand::Rng::with_seed(1);
    for _ in 0..5 {
        mode.spawn(&mut rng, 64, 64);
    }
    assert_eq!(mode.registry().len(), 5);

    assert!(mode.stop());
    assert!(mode.registry().is_empty());
    assert_eq!(mode.state(), AbstractState::Stopped);
}

#[test]
fn stopped_mode_never_spawns() {
    let mut mode = AbstractMode::new(10);
    let mut rng = fastrand::Rng::with_seed(3);
    for _ in 0..1000 {
        assert!(!mode.maybe_spawn(&mut rng, 64, 64));
    }
    assert!(mode.registry().is_empty());
}

#[test]
fn spawn_probability_is_about_ten_percent() {
    let mut mode = AbstractMode::new(100_000);
    mode.start();
    let mut rng = fastrand::Rng::with_seed(42);
    let spawned = (0..10_000)
        .filter(|_| mode.maybe_spawn(&mut rng, 64, 64))
        .count();
    assert!((800..=1200).contains(&spawned), "spawned {spawned}");
    assert_eq!(mode.registry().len(), spawned);
}

#[test]
fn advance_steps_then_draws() {
    let mut mode = AbstractMode::new(4);
    mode.start();
    mode.registry_mut().push(Particle::new(
        10.0,
        10.0,
        1.0,
        0.0,
        2.0,
        Rgb::new(0, 255, 0),
        ParticleKind::Pixel,
    ));
    let mut surface = Surface::new(32, 32);
    mode.advance(&mut surface);

    let p = mode.registry().iter().next().expect("particle");
    assert_eq!(p.x, 11.0);
    assert_eq!(surface.pixel(11, 10), Some([0, 255, 0, 255]));
}

#[test]
fn advance_on_empty_surface_is_noop() {
    let mut mode = AbstractMode::new(4);
    mode.start();
    let mut rng = fastrand::Rng::with_seed(5);
    mode.spawn(&mut rng, 10, 10);
    let before = mode.registry().iter().next().cloned();
    let mut surface = Surface::new(0, 0);
    mode.advance(&mut surface);
    assert_eq!(mode.registry().iter().next().cloned(), before);
}
