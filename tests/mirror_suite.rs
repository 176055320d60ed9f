use std::time::Duration;

use media_fx::compositor::EffectParams;
use media_fx::config::GlitchStrategy;
use media_fx::effects::Effect;
use media_fx::mirror::{
    self, MirrorChannel, MirrorMessage, MirrorSource, MirrorSurface, UdpListener, UdpTransport,
};
use media_fx::surface::Rgb;
use serde_json::json;

fn view(w: usize, h: usize, glitch: GlitchStrategy) -> MirrorSurface {
    MirrorSurface::new(
        w,
        h,
        EffectParams::mirror_defaults(glitch),
        fastrand::Rng::with_seed(21),
    )
}

/// Feeds canned payloads to [`mirror::drain`].
struct Canned(Vec<Vec<u8>>);

impl MirrorSource for Canned {
    fn try_recv(&mut self) -> Option<Vec<u8>> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }
}

// ── Wire format ─────────────────────────────────────────────────────────────

#[test]
fn messages_encode_as_tagged_json() {
    let cases = [
        (MirrorMessage::Clear, json!({"type": "clear"})),
        (
            MirrorMessage::Effect { effect: Effect::Glitch },
            json!({"type": "effect", "effect": "glitch"}),
        ),
        (
            MirrorMessage::Strobe { show: true, color: Rgb::new(255, 0, 0) },
            json!({"type": "strobe", "show": true, "color": "#ff0000"}),
        ),
    ];
    for (msg, expected) in cases {
        let value: serde_json::Value =
            serde_json::from_slice(&msg.encode()).expect("valid json");
        assert_eq!(value, expected);
        assert_eq!(MirrorMessage::decode(&msg.encode()).expect("decode"), msg);
    }
}

#[test]
fn short_hex_colors_are_accepted() {
    let msg = MirrorMessage::decode(br##"{"type":"strobe","show":false,"color":"#0f0"}"##)
        .expect("decode");
    assert_eq!(
        msg,
        MirrorMessage::Strobe { show: false, color: Rgb::new(0, 255, 0) }
    );
}

#[test]
fn drain_skips_malformed_payloads() {
    let mut src = Canned(vec![
        b"not json".to_vec(),
        br#"{"type":"effect","effect":"blur"}"#.to_vec(),
        br#"{"type":"clear"}"#.to_vec(),
        br#"{"type":"strobe","show":true,"color":"pink"}"#.to_vec(),
        br#"{"type":"effect","effect":"trails"}"#.to_vec(),
    ]);
    let got = mirror::drain(&mut src);
    assert_eq!(
        got,
        vec![
            MirrorMessage::Clear,
            MirrorMessage::Effect { effect: Effect::Trails },
        ]
    );
}

// ── Publishing ──────────────────────────────────────────────────────────────

#[test]
fn publish_without_transport_is_silent() {
    let mut ch = MirrorChannel::default();
    assert!(!ch.is_attached());
    ch.publish(&MirrorMessage::Clear);
    assert_eq!(ch.published(), 0);
    assert_eq!(ch.describe(), None);
}

#[test]
fn channel_transport_delivers_in_order() {
    let (tx, mut rx) = mirror::channel(16);
    let mut ch = MirrorChannel::default();
    ch.attach(Box::new(tx));
    assert_eq!(ch.describe().as_deref(), Some("in-process"));

    ch.publish(&MirrorMessage::Effect { effect: Effect::Analog });
    ch.publish(&MirrorMessage::Clear);
    assert_eq!(ch.published(), 2);
    assert_eq!(
        mirror::drain(&mut rx),
        vec![
            MirrorMessage::Effect { effect: Effect::Analog },
            MirrorMessage::Clear,
        ]
    );
}

#[test]
fn full_queue_drops_instead_of_blocking() {
    let (tx, mut rx) = mirror::channel(1);
    let mut ch = MirrorChannel::default();
    ch.attach(Box::new(tx));
    for _ in 0..5 {
        ch.publish(&MirrorMessage::Clear);
    }
    assert_eq!(mirror::drain(&mut rx).len(), 1);
}

#[test]
fn dropped_listener_does_not_break_publishing() {
    let (tx, rx) = mirror::channel(4);
    drop(rx);
    let mut ch = MirrorChannel::default();
    ch.attach(Box::new(tx));
    ch.publish(&MirrorMessage::Clear);
    ch.detach();
    assert!(!ch.is_attached());
}

#[test]
fn udp_loopback_round_trip() {
    let mut listener = UdpListener::bind(0).expect("bind");
    let port = listener.local_port().expect("port");
    let mut ch = MirrorChannel::default();
    ch.attach(Box::new(UdpTransport::connect(port).expect("connect")));
    ch.publish(&MirrorMessage::Effect { effect: Effect::Abstract });

    let mut got = Vec::new();
    for _ in 0..200 {
        got.extend(mirror::drain(&mut listener));
        if !got.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(got, vec![MirrorMessage::Effect { effect: Effect::Abstract }]);
}

#[test]
fn udp_send_to_nobody_is_silent() {
    let port = {
        let l = UdpListener::bind(0).expect("bind");
        l.local_port().expect("port")
    };
    let mut ch = MirrorChannel::default();
    ch.attach(Box::new(UdpTransport::connect(port).expect("connect")));
    for _ in 0..3 {
        ch.publish(&MirrorMessage::Clear);
    }
    assert_eq!(ch.published(), 3);
}

// ── Mirror surface ──────────────────────────────────────────────────────────

#[test]
fn clear_blanks_surface_and_drops_shapes() {
    let mut v = view(80, 45, GlitchStrategy::ChannelSmear);
    v.handle(&MirrorMessage::Effect { effect: Effect::Abstract });
    v.handle(&MirrorMessage::Strobe { show: true, color: Rgb::WHITE });
    assert!(!v.surface().is_blank());

    v.handle(&MirrorMessage::Clear);
    assert!(v.surface().is_blank());
    assert!(v.shapes().is_empty());
    assert!(!v.is_animating());
}

#[test]
fn strobe_show_floods_and_hide_clears() {
    let mut v = view(40, 20, GlitchStrategy::ChannelSmear);
    let color = Rgb::new(10, 20, 30);
    v.handle(&MirrorMessage::Strobe { show: true, color });
    assert!(v.surface().pixels().chunks_exact(4).all(|p| p == [10, 20, 30, 255]));

    v.tick();
    assert_eq!(v.surface().pixel(0, 0), Some([10, 20, 30, 255]), "idle tick changed the surface");

    v.handle(&MirrorMessage::Strobe { show: false, color });
    assert!(v.surface().is_blank());
}

#[test]
fn abstract_event_spawns_an_animated_circle() {
    let mut v = view(80, 45, GlitchStrategy::ChannelSmear);
    v.handle(&MirrorMessage::Effect { effect: Effect::Abstract });
    assert_eq!(v.shapes().len(), 1);
    assert!(v.is_animating());
    assert!(v.surface().is_blank());

    v.tick();
    assert!(!v.surface().is_blank());
}

#[test]
fn shapes_are_capped() {
    let mut v = view(80, 45, GlitchStrategy::ChannelSmear);
    for _ in 0..150 {
        v.handle(&MirrorMessage::Effect { effect: Effect::Abstract });
    }
    assert_eq!(v.shapes().len(), 100);
}

#[test]
fn effect_events_apply_once_with_fixed_params() {
    let mut v = view(100, 100, GlitchStrategy::PixelNoise);
    v.handle(&MirrorMessage::Strobe { show: true, color: Rgb::WHITE });
    let before = v.surface().clone();

    v.handle(&MirrorMessage::Effect { effect: Effect::Strobe });
    assert_eq!(v.surface(), &before);

    v.handle(&MirrorMessage::Effect { effect: Effect::Glitch });
    let changed = before
        .pixels()
        .chunks_exact(4)
        .zip(v.surface().pixels().chunks_exact(4))
        .filter(|(a, b)| a != b)
        .count();
    assert!(changed > 0 && changed <= 50, "changed {changed}");
}
