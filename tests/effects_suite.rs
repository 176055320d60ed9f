use media_fx::effects::{
    DEFAULT_INTENSITY, DEFAULT_STROBE_SPEED, Effect, EffectState, MAX_STROBE_SPEED,
};
use media_fx::surface::Rgb;

#[test]
fn toggle_returns_new_value_and_is_its_own_inverse() {
    for effect in Effect::ALL {
        let mut state = EffectState::default();
        state.set_intensity(Effect::Glitch, 0.8);
        let before = state.clone();

        assert!(state.toggle(effect));
        assert!(state.is_active(effect));
        assert!(!state.toggle(effect));
        assert_eq!(state, before, "double toggle of {effect} changed state");
    }
}

#[test]
fn toggle_only_touches_the_named_flag() {
    let mut state = EffectState::default();
    state.toggle(Effect::Analog);
    let active = state.active_effects().collect::<Vec<_>>();
    assert_eq!(active, vec![Effect::Analog]);
}

#[test]
fn set_intensity_clamps_instead_of_rejecting() {
    let mut state = EffectState::default();
    assert_eq!(state.set_intensity(Effect::Glitch, 1.7), 1.0);
    assert_eq!(state.intensity(Effect::Glitch), 1.0);
    assert_eq!(state.set_intensity(Effect::Analog, -0.3), 0.0);
    assert_eq!(state.set_intensity(Effect::Trails, f32::NAN), DEFAULT_INTENSITY);
    assert_eq!(state.set_intensity(Effect::Trails, 0.25), 0.25);
}

#[test]
fn effects_without_intensity_ignore_it() {
    let mut state = EffectState::default();
    let before = state.clone();
    assert_eq!(state.set_intensity(Effect::Strobe, 0.9), 0.0);
    assert_eq!(state.set_intensity(Effect::Abstract, 0.9), 0.0);
    assert_eq!(state.intensity(Effect::Abstract), 0.0);
    assert_eq!(state, before);
}

#[test]
fn clear_all_resets_flags_and_intensities_but_keeps_strobe_config() {
    let mut state = EffectState::default();
    for effect in Effect::ALL {
        state.toggle(effect);
    }
    state.set_intensity(Effect::Glitch, 0.9);
    state.set_strobe_speed(25);
    state.set_strobe_color(Rgb::new(255, 0, 0));
    state.flip_strobe_phase();

    state.clear_all();

    assert_eq!(state.active_effects().count(), 0);
    assert_eq!(state.intensity(Effect::Glitch), DEFAULT_INTENSITY);
    assert!(!state.strobe().phase);
    assert_eq!(state.strobe().speed, 25);
    assert_eq!(state.strobe().color, Rgb::new(255, 0, 0));
}

#[test]
fn deactivating_strobe_resets_phase() {
    let mut state = EffectState::default();
    state.toggle(Effect::Strobe);
    assert!(state.flip_strobe_phase());
    assert!(state.flash_visible());

    state.toggle(Effect::Strobe);
    assert!(!state.strobe().phase);
    assert!(!state.flash_visible());
}

#[test]
fn strobe_phase_cannot_flip_while_inactive() {
    let mut state = EffectState::default();
    assert!(!state.flip_strobe_phase());
    assert!(!state.flip_strobe_phase());
    assert!(!state.strobe().phase);
}

#[test]
fn strobe_speed_is_clamped_to_supported_range() {
    let mut state = EffectState::default();
    assert_eq!(state.strobe().speed, DEFAULT_STROBE_SPEED);
    assert_eq!(state.set_strobe_speed(0), 1);
    assert_eq!(state.set_strobe_speed(500), MAX_STROBE_SPEED);
}

#[test]
fn effect_names_parse_and_serialize_lowercase() {
    for effect in Effect::ALL {
        assert_eq!(Effect::parse(effect.as_str()), Some(effect));
        let json = serde_json::to_string(&effect).expect("serialize effect");
        assert_eq!(json, format!("\"{}\"", effect.as_str()));
    }
    assert_eq!(Effect::parse("blur"), None);
}
