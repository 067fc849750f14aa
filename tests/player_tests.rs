//! Animation Player Tests
//!
//! Tests for:
//! - Play requests: default animation, unknown clips, position normalization
//! - Layer ordering, layer-filtered lookup and every fade-out mode
//! - Time advance: sign of dt, looping, finite play counts, time scale
//! - Fade-in/fade-out weights and removal of faded states
//! - Blend-node satellites following their primary
//! - Bone poses written by bone timelines
//! - Transform cache: enabled for a single state, disabled for blends

use std::sync::Arc;

use sinew::animation::{AnimationConfig, FadeOutMode, FadeState};
use sinew::geom::Transform2D;
use sinew::model::{
    AnimationData, ArmatureData, BlendTimeline, BoneData, BoneTimeline, InterpolationMode, KeyframeTrack, SkinData,
};
use sinew::{Armature, NullBackend, RuntimeSettings};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Fixtures
// ============================================================================

fn clip(name: &str, duration: f32) -> AnimationData {
    let mut clip = AnimationData::new(name, duration, (duration * 24.0) as u32);
    clip.play_times = 0;
    clip
}

/// `walk` moves `root` from x = 0 to x = 10 over one second.
fn walk() -> AnimationData {
    let mut walk = clip("walk", 1.0);
    walk.bone_timelines.push(BoneTimeline {
        bone: "root".into(),
        track: KeyframeTrack::new(
            vec![0.0, 1.0],
            vec![Transform2D::IDENTITY, Transform2D::from_translation(10.0, 0.0)],
            InterpolationMode::Linear,
        ),
    });
    walk
}

fn skeleton(animations: Vec<AnimationData>) -> ArmatureData {
    let mut data = ArmatureData::new("hero");
    data.bones.push(BoneData::new("root", None));
    data.bones.push(
        BoneData::new("arm", Some("root")).with_transform(Transform2D::from_translation(5.0, 0.0)),
    );
    data.skins.push(SkinData::new("default"));
    data.animations = animations.into_iter().map(Arc::new).collect();
    data
}

fn armature(data: ArmatureData) -> anyhow::Result<Armature> {
    let _ = env_logger::builder().is_test(true).try_init();
    Ok(Armature::new(Arc::new(data), RuntimeSettings::default(), Box::new(NullBackend::new()))?)
}

fn default_armature() -> anyhow::Result<Armature> {
    armature(skeleton(vec![walk(), clip("run", 2.0), clip("idle", 1.0), clip("wave", 0.5)]))
}

fn layered(name: &str, layer: i32, group: &str, mode: FadeOutMode) -> AnimationConfig {
    AnimationConfig {
        layer,
        group: group.into(),
        fade_out_mode: mode,
        ..AnimationConfig::with_animation(name)
    }
}

// ============================================================================
// Play Requests
// ============================================================================

#[test]
fn play_without_default_animation_does_nothing() -> anyhow::Result<()> {
    let mut armature = default_armature()?;

    assert!(armature.animation().play(None, -1).is_none());
    assert!(armature.animation().play(Some(""), -1).is_none());
    assert!(armature.animation_player().last_animation_state().is_none());
    assert_eq!(armature.animation_player().state_count(), 0);
    Ok(())
}

#[test]
fn play_none_uses_default_animation() -> anyhow::Result<()> {
    let mut data = skeleton(vec![walk(), clip("idle", 1.0)]);
    data.default_animation = Some("idle".into());
    let mut armature = armature(data)?;

    let key = armature.animation().play(None, -1);
    assert!(key.is_some());
    assert_eq!(armature.animation_player().last_animation_name(), Some("idle"));
    Ok(())
}

#[test]
fn play_none_resumes_stopped_state() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature.animation().play(Some("walk"), 0).expect("walk exists");

    armature.animation().stop(Some("walk"));
    assert!(!armature.animation_player().is_playing());

    let resumed = armature.animation().play(None, -1);
    assert_eq!(resumed, Some(key), "Resuming keeps the same state");
    assert!(armature.animation_player().is_playing());
    Ok(())
}

#[test]
fn unknown_clip_is_rejected() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    armature.animation().play(Some("walk"), 0);

    let key = armature
        .animation()
        .fade_in("missing", 0.2, -1, 0, None, FadeOutMode::All);
    assert!(key.is_none());

    let player = armature.animation_player();
    assert_eq!(player.state_count(), 1, "Nothing was faded out");
    assert_eq!(player.last_animation_name(), Some("walk"));
    Ok(())
}

#[test]
fn position_at_duration_keeps_last_frame() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let mut config = AnimationConfig {
        position: 1.0,
        ..AnimationConfig::with_animation("walk")
    };
    let key = armature.animation().play_config(&mut config).expect("walk exists");

    assert!(config.position < 1.0);
    assert!(approx(config.position, 1.0 - 0.000_001));
    let state = armature.animation_player().state(key).expect("state is alive");
    assert!(approx(state.position(), config.position));
    Ok(())
}

#[test]
fn position_wraps_into_clip() -> anyhow::Result<()> {
    let mut armature = default_armature()?;

    let mut past_end = AnimationConfig {
        position: 2.5,
        fade_out_mode: FadeOutMode::None,
        ..AnimationConfig::with_animation("walk")
    };
    armature.animation().play_config(&mut past_end);
    assert!(approx(past_end.position, 0.5), "2.5 wraps to 0.5, got {}", past_end.position);

    let mut negative = AnimationConfig {
        position: -0.25,
        fade_out_mode: FadeOutMode::None,
        ..AnimationConfig::with_animation("walk")
    };
    armature.animation().play_config(&mut negative);
    assert!(approx(negative.position, 0.75), "-0.25 wraps to 0.75, got {}", negative.position);
    Ok(())
}

#[test]
fn config_defaults_resolve_from_clip() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    armature.animation().play(Some("walk"), 0);

    let mut config = AnimationConfig::with_animation("run");
    armature.animation().play_config(&mut config);

    assert_eq!(config.play_times, 0, "Clip default play count");
    assert!(approx(config.time_scale, 1.0), "Inverse of clip scale 1");
    assert!(approx(config.fade_in_time, 0.0));
    assert!(approx(config.fade_out_time, config.fade_in_time));
    assert!(approx(config.duration, -1.0), "Zero duration means the whole clip");
    Ok(())
}

#[test]
fn goto_and_stop_freezes_playhead() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature.animation().goto_and_stop_by_progress("run", 0.25).expect("run exists");
    armature.advance_time(0.5);

    let state = armature.animation_player().state(key).expect("state is alive");
    assert!(!state.is_playing());
    assert!(approx(state.current_time(), 0.5), "Quarter of a 2s clip, got {}", state.current_time());
    Ok(())
}

#[test]
fn goto_and_play_by_frame_converts_to_seconds() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature.animation().goto_and_play_by_frame("run", 12, 0).expect("run exists");
    let state = armature.animation_player().state(key).expect("state is alive");
    assert!(approx(state.position(), 0.5), "Frame 12 of 48 in 2s, got {}", state.position());
    Ok(())
}

// ============================================================================
// Ordering & Fade-Out Modes
// ============================================================================

#[test]
fn states_sorted_by_descending_layer() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    for (name, layer) in [("walk", 0), ("run", 2), ("idle", 1)] {
        armature
            .animation()
            .play_config(&mut layered(name, layer, "", FadeOutMode::None));
    }

    let layers: Vec<i32> = armature
        .animation_player()
        .states()
        .map(|(_, state)| state.layer())
        .collect();
    assert_eq!(layers, vec![2, 1, 0]);
    Ok(())
}

#[test]
fn same_layer_and_group_fades_only_matching_states() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let upper = armature
        .animation()
        .play_config(&mut layered("walk", 0, "upper", FadeOutMode::None))
        .expect("walk exists");
    let lower = armature
        .animation()
        .play_config(&mut layered("run", 0, "lower", FadeOutMode::None))
        .expect("run exists");
    let other_layer = armature
        .animation()
        .play_config(&mut layered("idle", 1, "upper", FadeOutMode::None))
        .expect("idle exists");

    armature
        .animation()
        .play_config(&mut layered("wave", 0, "upper", FadeOutMode::SameLayerAndGroup));

    let player = armature.animation_player();
    let fading = |key| player.state(key).is_some_and(|s| s.is_fade_out());
    assert!(fading(upper), "Same layer and group fades out");
    assert!(!fading(lower), "Other group keeps playing");
    assert!(!fading(other_layer), "Other layer keeps playing");
    Ok(())
}

#[test]
fn same_layer_fades_every_group_on_that_layer() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let upper = armature
        .animation()
        .play_config(&mut layered("walk", 0, "upper", FadeOutMode::None))
        .expect("walk exists");
    let lower = armature
        .animation()
        .play_config(&mut layered("run", 0, "lower", FadeOutMode::None))
        .expect("run exists");
    let other_layer = armature
        .animation()
        .play_config(&mut layered("idle", 1, "upper", FadeOutMode::None))
        .expect("idle exists");

    armature
        .animation()
        .play_config(&mut layered("wave", 0, "face", FadeOutMode::SameLayer));

    let player = armature.animation_player();
    let fading = |key| player.state(key).is_some_and(|s| s.is_fade_out());
    assert!(fading(upper));
    assert!(fading(lower), "Group is ignored");
    assert!(!fading(other_layer));
    Ok(())
}

#[test]
fn same_group_fades_across_layers() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let upper = armature
        .animation()
        .play_config(&mut layered("walk", 0, "upper", FadeOutMode::None))
        .expect("walk exists");
    let lower = armature
        .animation()
        .play_config(&mut layered("run", 0, "lower", FadeOutMode::None))
        .expect("run exists");
    let upper_high = armature
        .animation()
        .play_config(&mut layered("idle", 1, "upper", FadeOutMode::None))
        .expect("idle exists");

    armature
        .animation()
        .play_config(&mut layered("wave", 2, "upper", FadeOutMode::SameGroup));

    let player = armature.animation_player();
    let fading = |key| player.state(key).is_some_and(|s| s.is_fade_out());
    assert!(fading(upper));
    assert!(fading(upper_high), "Layer is ignored");
    assert!(!fading(lower));
    Ok(())
}

#[test]
fn get_state_filters_by_layer() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature
        .animation()
        .play_config(&mut layered("walk", 1, "", FadeOutMode::None))
        .expect("walk exists");

    let player = armature.animation_player();
    assert_eq!(player.get_state("walk", 1), Some(key));
    assert_eq!(player.get_state("walk", -1), Some(key), "Negative layer matches any");
    assert_eq!(player.get_state("walk", 0), None);
    assert_eq!(player.get_state("run", 1), None);
    Ok(())
}

#[test]
fn single_mode_reuses_running_state() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let first = armature
        .animation()
        .fade_in("walk", 0.3, -1, 0, None, FadeOutMode::Single);
    let second = armature
        .animation()
        .fade_in("walk", 0.3, -1, 0, None, FadeOutMode::Single);

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(armature.animation_player().state_count(), 1);
    Ok(())
}

#[test]
fn fade_all_replaces_every_state() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    armature.animation().play_config(&mut layered("walk", 0, "", FadeOutMode::None));
    armature.animation().play_config(&mut layered("run", 3, "", FadeOutMode::None));
    armature.animation().fade_in("idle", 0.0, -1, 1, None, FadeOutMode::All);

    // Zero-length fade-outs complete on the next advance and are removed.
    armature.advance_time(0.0);
    armature.advance_time(0.0);

    let names: Vec<&str> = armature.animation_player().states().map(|(_, s)| s.name()).collect();
    assert_eq!(names, vec!["idle"]);
    Ok(())
}

// ============================================================================
// Time Advance
// ============================================================================

#[test]
fn negative_dt_advances_like_positive() -> anyhow::Result<()> {
    let mut forward = default_armature()?;
    let mut backward = default_armature()?;
    let a = forward.animation().play(Some("run"), 0).expect("run exists");
    let b = backward.animation().play(Some("run"), 0).expect("run exists");

    forward.advance_time(0.25);
    backward.advance_time(-0.25);

    let ta = forward.animation_player().state(a).map(|s| s.current_time()).unwrap_or_default();
    let tb = backward.animation_player().state(b).map(|s| s.current_time()).unwrap_or_default();
    assert!(approx(ta, 0.25), "Got {ta}");
    assert!(approx(ta, tb), "Sign of dt must not matter: {ta} vs {tb}");
    Ok(())
}

#[test]
fn looping_state_wraps_and_counts() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature.animation().play(Some("walk"), 0).expect("walk exists");
    for _ in 0..9 {
        armature.advance_time(0.25);
    }

    let state = armature.animation_player().state(key).expect("state is alive");
    assert!(approx(state.current_time(), 0.25), "Got {}", state.current_time());
    assert_eq!(state.current_play_times(), 2);
    assert!(state.is_playing());
    Ok(())
}

#[test]
fn finite_play_times_complete() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature.animation().play(Some("wave"), 2).expect("wave exists");
    armature.advance_time(0.75);
    assert!(!armature.animation_player().is_completed());
    armature.advance_time(0.5);

    let player = armature.animation_player();
    assert!(player.is_completed());
    let state = player.state(key).expect("completed states stay until faded");
    assert!(approx(state.current_time(), 0.5));
    assert_eq!(state.current_play_times(), 2);
    Ok(())
}

#[test]
fn idle_player_is_not_completed() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    assert!(!armature.animation_player().is_completed());

    armature.advance_time(1.0);
    assert!(!armature.animation_player().is_completed(), "No states, nothing completed");
    Ok(())
}

#[test]
fn player_time_scale_multiplies_dt() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let key = armature.animation().play(Some("run"), 0).expect("run exists");
    armature.animation_player_mut().time_scale = 2.0;
    armature.advance_time(0.25);

    let state = armature.animation_player().state(key).expect("state is alive");
    assert!(approx(state.current_time(), 0.5), "Got {}", state.current_time());
    Ok(())
}

// ============================================================================
// Fading
// ============================================================================

#[test]
fn cross_fade_hands_weight_over() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let walk = armature.animation().play(Some("walk"), 0).expect("walk exists");
    let mut config = AnimationConfig {
        fade_in_time: 0.5,
        ..AnimationConfig::with_animation("run")
    };
    let run = armature.animation().play_config(&mut config).expect("run exists");

    armature.advance_time(0.25);
    {
        let player = armature.animation_player();
        let w_walk = player.state(walk).map(|s| s.weight_result()).unwrap_or_default();
        let w_run = player.state(run).map(|s| s.weight_result()).unwrap_or_default();
        assert!(approx(w_walk, 0.5), "walk weight {w_walk}");
        assert!(approx(w_run, 0.5), "run weight {w_run}");
    }

    armature.advance_time(0.25);
    armature.advance_time(0.0);
    let player = armature.animation_player();
    assert!(player.state(walk).is_none(), "Faded-out state is removed");
    assert_eq!(
        player.state(run).map(|s| s.fade_state()),
        Some(FadeState::Settled)
    );
    assert_eq!(player.last_animation_state(), Some(run));
    Ok(())
}

#[test]
fn removing_last_state_falls_back_to_list_tail() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    let walk = armature
        .animation()
        .play_config(&mut layered("walk", 0, "", FadeOutMode::None))
        .expect("walk exists");
    let run = armature
        .animation()
        .play_config(&mut layered("run", 1, "", FadeOutMode::None))
        .expect("run exists");
    assert_eq!(armature.animation_player().last_animation_state(), Some(run));

    armature.animation().fade_out(run, 0.0, true);
    armature.advance_time(0.1);
    armature.advance_time(0.1);

    let player = armature.animation_player();
    assert!(player.state(run).is_none(), "Faded-out state is removed");
    assert_eq!(player.state_count(), 1);
    assert_eq!(player.last_animation_state(), Some(walk));
    assert_eq!(player.last_animation_name(), Some("walk"));
    Ok(())
}

#[test]
fn reset_returns_states_to_pool() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    armature.animation().play_config(&mut layered("walk", 0, "", FadeOutMode::None));
    armature.animation().play_config(&mut layered("run", 1, "", FadeOutMode::None));
    armature.animation().reset();

    let player = armature.animation_player();
    assert_eq!(player.state_count(), 0);
    assert!(player.last_animation_state().is_none());
    let stats = player.pool_stats();
    assert_eq!(stats.outstanding(), 0, "Every state went back: {stats:?}");
    Ok(())
}

// ============================================================================
// Blend Nodes
// ============================================================================

fn blend_armature() -> anyhow::Result<Armature> {
    let mut primary = walk();
    primary.blend_timelines.push(BlendTimeline {
        name: "lean".into(),
        progress: KeyframeTrack::constant(0.5),
        weight: KeyframeTrack::constant(0.25),
    });
    armature(skeleton(vec![primary, clip("lean", 2.0)]))
}

#[test]
fn blend_node_creates_satellite() -> anyhow::Result<()> {
    let mut armature = blend_armature()?;
    let walk = armature.animation().play(Some("walk"), 0).expect("walk exists");

    let player = armature.animation_player();
    assert_eq!(player.state_count(), 2);
    let lean = player.get_state("lean", -1).expect("satellite created");
    assert_eq!(player.state(lean).and_then(|s| s.parent()), Some(walk));
    assert_eq!(player.state(walk).map(|s| s.children().to_vec()), Some(vec![lean]));
    assert_eq!(player.last_animation_state(), Some(walk));

    let order: Vec<_> = player.states().map(|(key, _)| key).collect();
    assert_eq!(order, vec![walk, lean], "Primary precedes its satellite");
    Ok(())
}

#[test]
fn blend_node_follows_parent_progress_and_weight() -> anyhow::Result<()> {
    let mut armature = blend_armature()?;
    armature.animation().play(Some("walk"), 0);
    armature.advance_time(0.1);

    let player = armature.animation_player();
    let lean = player.get_state("lean", -1).and_then(|key| player.state(key)).expect("satellite");
    assert!(approx(lean.current_time(), 1.0), "Half of a 2s clip, got {}", lean.current_time());
    assert!(approx(lean.weight_result(), 0.25), "Got {}", lean.weight_result());
    Ok(())
}

#[test]
fn fading_primary_fades_satellites() -> anyhow::Result<()> {
    let mut armature = blend_armature()?;
    let walk = armature.animation().play(Some("walk"), 0).expect("walk exists");
    armature.animation().fade_out(walk, 0.2, false);

    let player = armature.animation_player();
    let lean = player.get_state("lean", -1).expect("satellite");
    assert!(player.state(lean).is_some_and(|s| s.is_fade_out()));
    Ok(())
}

// ============================================================================
// Bone Poses
// ============================================================================

#[test]
fn bone_timeline_moves_bone_and_children() -> anyhow::Result<()> {
    let mut armature = default_armature()?;
    armature.animation().play(Some("walk"), 0);
    armature.advance_time(0.5);

    let root = armature.bone("root").expect("root");
    let arm = armature.bone("arm").expect("arm");
    assert!(approx(root.animation_pose().x, 5.0), "Pose {}", root.animation_pose().x);
    assert!(approx(root.global().x, 5.0));
    assert!(approx(arm.global().x, 10.0), "Child follows, got {}", arm.global().x);
    Ok(())
}

#[test]
fn higher_layer_takes_weight_first() -> anyhow::Result<()> {
    let mut heavy = walk();
    heavy.name = "heavy".into();
    heavy.bone_timelines[0].track = KeyframeTrack::constant(Transform2D::from_translation(20.0, 0.0));
    let mut armature = armature(skeleton(vec![walk(), heavy]))?;

    armature.animation().play_config(&mut layered("walk", 0, "", FadeOutMode::None));
    let mut top = AnimationConfig {
        weight: 0.75,
        ..layered("heavy", 1, "", FadeOutMode::None)
    };
    armature.animation().play_config(&mut top);
    armature.advance_time(0.5);

    // Layer 1 keeps 0.75 of 20; layer 0 gets the remaining 0.25 of 5.
    let x = armature.bone("root").map(|b| b.animation_pose().x).unwrap_or_default();
    assert!(approx(x, 15.0 + 1.25), "Got {x}");
    Ok(())
}

// ============================================================================
// Transform Cache
// ============================================================================

fn cached_armature() -> anyhow::Result<Armature> {
    let mut data = skeleton(vec![walk(), clip("run", 2.0)]);
    data.cache_frame_rate = 24;
    armature(data)
}

#[test]
fn single_state_uses_cache_frames() -> anyhow::Result<()> {
    let mut armature = cached_armature()?;
    armature.animation().play(Some("walk"), 0);
    armature.advance_time(0.25);
    assert_eq!(armature.cache_frame_index(), 6);
    Ok(())
}

#[test]
fn blending_disables_cache() -> anyhow::Result<()> {
    let mut armature = cached_armature()?;
    armature.animation().play(Some("walk"), 0);
    armature.advance_time(0.25);
    armature.animation().fade_in("run", 0.5, -1, 1, None, FadeOutMode::None);
    armature.advance_time(0.25);

    assert_eq!(armature.animation_player().state_count(), 2);
    assert_eq!(armature.cache_frame_index(), -1);
    Ok(())
}

#[test]
fn second_loop_reuses_cached_transforms() -> anyhow::Result<()> {
    let mut armature = cached_armature()?;
    armature.animation().play(Some("walk"), 0);
    for _ in 0..4 {
        armature.advance_time(0.25);
    }
    let after_first_loop = armature.frame_cache().frame_count();
    let x_first = armature.bone("arm").map(|b| b.global().x).unwrap_or_default();
    assert!(after_first_loop > 0);

    for _ in 0..4 {
        armature.advance_time(0.25);
    }
    assert_eq!(armature.frame_cache().frame_count(), after_first_loop);
    let x_second = armature.bone("arm").map(|b| b.global().x).unwrap_or_default();
    assert!(approx(x_first, x_second), "{x_first} vs {x_second}");
    Ok(())
}
