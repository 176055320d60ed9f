use clap::Parser;

use media_fx::config::{Config, DEFAULT_MIRROR_PORT, GlitchStrategy, MirrorConfig};
use media_fx::logging;
use media_fx::surface::Rgb;

fn parse(args: &[&str]) -> Config {
    let mut argv = vec!["media_fx"];
    argv.extend_from_slice(args);
    Config::try_parse_from(argv).expect("parse args")
}

#[test]
fn defaults_are_valid() {
    let cfg = parse(&[]);
    assert_eq!(cfg.fps, 60);
    assert_eq!(cfg.capacity, 200);
    assert_eq!(cfg.strobe_speed, 10);
    assert_eq!(cfg.strobe_color, Rgb::WHITE);
    assert_eq!(cfg.glitch, GlitchStrategy::ChannelSmear);
    assert_eq!(cfg.mirror_port, DEFAULT_MIRROR_PORT);
    assert!(!cfg.mirror && !cfg.mic);
    assert!(cfg.sync_updates);
    assert!(cfg.file.is_none());
    cfg.validate().expect("defaults validate");
}

#[test]
fn flags_override_defaults() {
    let cfg = parse(&[
        "--file",
        "clip.mp4",
        "--strobe-color",
        "#ff8800",
        "--strobe-speed",
        "25",
        "--glitch",
        "noise",
        "--mirror",
        "true",
        "--seed",
        "7",
    ]);
    assert_eq!(cfg.file.as_deref(), Some(std::path::Path::new("clip.mp4")));
    assert_eq!(cfg.strobe_color, Rgb::new(0xff, 0x88, 0x00));
    assert_eq!(cfg.strobe_speed, 25);
    assert_eq!(cfg.glitch, GlitchStrategy::PixelNoise);
    assert!(cfg.mirror);
    assert_eq!(cfg.seed, Some(7));
}

#[test]
fn glitch_strategy_accepts_names_and_aliases() {
    for (arg, want) in [
        ("channel-smear", GlitchStrategy::ChannelSmear),
        ("smear", GlitchStrategy::ChannelSmear),
        ("pixel-noise", GlitchStrategy::PixelNoise),
        ("row-shift", GlitchStrategy::RowShift),
        ("rows", GlitchStrategy::RowShift),
    ] {
        assert_eq!(parse(&["--glitch", arg]).glitch, want, "{arg}");
    }
    assert!(Config::try_parse_from(["media_fx", "--glitch", "melt"]).is_err());
}

#[test]
fn glitch_strategy_cycles() {
    let mut s = GlitchStrategy::ChannelSmear;
    let mut labels = Vec::new();
    for _ in 0..3 {
        labels.push(s.label());
        s = s.next();
    }
    assert_eq!(labels, ["smear", "noise", "rows"]);
    assert_eq!(s, GlitchStrategy::ChannelSmear);
}

#[test]
fn bad_color_is_a_parse_error() {
    for bad in ["orange", "#12345", "ff0000", "#gg0000"] {
        assert!(
            Config::try_parse_from(["media_fx", "--strobe-color", bad]).is_err(),
            "{bad} accepted"
        );
    }
}

#[test]
fn validate_rejects_out_of_range_values() {
    for args in [
        &["--fps", "0"][..],
        &["--capacity", "0"][..],
        &["--strobe-speed", "0"][..],
        &["--strobe-speed", "61"][..],
    ] {
        assert!(parse(args).validate().is_err(), "{args:?}");
    }
}

#[test]
fn mirror_config_defaults() {
    let cfg = MirrorConfig::try_parse_from(["mirror_view"]).expect("parse");
    assert_eq!(cfg.port, DEFAULT_MIRROR_PORT);
    assert_eq!((cfg.width, cfg.height), (800, 450));
    cfg.validate().expect("valid");

    let bad = MirrorConfig::try_parse_from(["mirror_view", "--width", "0"]).expect("parse");
    assert!(bad.validate().is_err());
}

#[test]
fn colors_parse_long_and_short_hex() {
    assert_eq!("#abc".parse::<Rgb>().expect("short"), Rgb::new(0xaa, 0xbb, 0xcc));
    assert_eq!(" #00FF7f ".parse::<Rgb>().expect("long"), Rgb::new(0, 255, 127));
    assert_eq!(Rgb::new(1, 2, 255).to_string(), "#0102ff");
}

#[test]
fn hsl_primaries() {
    assert_eq!(Rgb::from_hsl(0.0, 1.0, 0.5), Rgb::new(255, 0, 0));
    assert_eq!(Rgb::from_hsl(120.0, 1.0, 0.5), Rgb::new(0, 255, 0));
    assert_eq!(Rgb::from_hsl(240.0, 1.0, 0.5), Rgb::new(0, 0, 255));
    assert_eq!(Rgb::from_hsl(360.0, 1.0, 0.5), Rgb::new(255, 0, 0));
    assert_eq!(Rgb::from_hsl(42.0, 0.0, 1.0), Rgb::WHITE);
}

#[test]
fn log_levels() {
    assert!(logging::parse_level("debug").is_ok());
    assert!(logging::parse_level(" WARN ").is_ok());
    assert!(logging::parse_level("loud").is_err());
}
