//! Armature Tests
//!
//! Tests for:
//! - Construction: validation errors, settings from JSON, cache rate choice
//! - Bone hierarchy resolution and user offsets
//! - Child armatures: attach, default animation, authored actions, detach
//! - Time scale inheritance from the parent player
//! - Cache rate changes propagating to child armatures

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use sinew::geom::Transform2D;
use sinew::model::{
    ActionData, AnimationData, ArmatureData, BoneData, BoneTimeline, DisplayData, DisplayKind, InterpolationMode,
    KeyframeTrack, SkinData, SlotData,
};
use sinew::{Armature, NullBackend, RuntimeSettings, SinewError};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Fixtures
// ============================================================================

fn looping(name: &str, duration: f32) -> Arc<AnimationData> {
    let mut clip = AnimationData::new(name, duration, (duration * 24.0) as u32);
    clip.play_times = 0;
    Arc::new(clip)
}

fn build(data: ArmatureData) -> anyhow::Result<Armature> {
    Ok(Armature::new(Arc::new(data), RuntimeSettings::default(), Box::new(NullBackend::new()))?)
}

/// Armature shown inside a slot: one bone, `idle` by default, plus `wave`.
fn sword() -> anyhow::Result<Armature> {
    let mut data = ArmatureData::new("sword");
    data.bones.push(BoneData::new("blade", None));
    data.skins.push(SkinData::new("default"));
    data.animations = vec![looping("idle", 1.0), looping("wave", 0.5)];
    data.default_animation = Some("idle".into());
    build(data)
}

/// Parent with slot `hand` whose only display is an armature display.
fn holder(actions: Vec<ActionData>) -> ArmatureData {
    let mut data = ArmatureData::new("knight");
    data.bones.push(BoneData::new("root", None));
    data.slots.push(SlotData::new("hand", "root"));

    let mut skin = SkinData::new("default");
    skin.add_display(
        "hand",
        Some(Arc::new(DisplayData::new(
            "sword",
            "default",
            DisplayKind::Armature {
                path: "sword".into(),
                actions,
            },
        ))),
    );
    data.skins.push(skin);
    data
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn duplicate_bone_is_rejected() {
    let mut data = ArmatureData::new("broken");
    data.bones.push(BoneData::new("root", None));
    data.bones.push(BoneData::new("root", None));
    data.skins.push(SkinData::new("default"));

    let result = Armature::new(Arc::new(data), RuntimeSettings::default(), Box::new(NullBackend::new()));
    assert!(matches!(
        result,
        Err(SinewError::DuplicateName { kind: "bone", .. })
    ));
}

#[test]
fn unknown_parent_and_missing_skin_are_rejected() {
    let mut orphan = ArmatureData::new("orphan");
    orphan.bones.push(BoneData::new("hand", Some("arm")));
    orphan.skins.push(SkinData::new("default"));
    let result = Armature::new(Arc::new(orphan), RuntimeSettings::default(), Box::new(NullBackend::new()));
    assert!(matches!(result, Err(SinewError::UnknownParentBone { .. })));

    let mut bare = ArmatureData::new("bare");
    bare.bones.push(BoneData::new("root", None));
    let result = Armature::new(Arc::new(bare), RuntimeSettings::default(), Box::new(NullBackend::new()));
    assert!(matches!(result, Err(SinewError::MissingDefaultSkin(name)) if name == "bare"));
}

#[test]
fn settings_json_supplies_cache_rate() -> anyhow::Result<()> {
    let settings = RuntimeSettings::from_json_str(r#"{ "default_cache_frame_rate": 12 }"#)?;
    assert!(settings.y_down, "Missing fields keep their defaults");

    let mut data = ArmatureData::new("hero");
    data.bones.push(BoneData::new("root", None));
    data.skins.push(SkinData::new("default"));
    let armature = Armature::new(Arc::new(data.clone()), settings, Box::new(NullBackend::new()))?;
    assert_eq!(armature.cache_frame_rate(), 12);
    assert_eq!(armature.animation_player().cache_frame_rate(), 12);

    data.cache_frame_rate = 30;
    let authored = Armature::new(Arc::new(data), settings, Box::new(NullBackend::new()))?;
    assert_eq!(authored.cache_frame_rate(), 30, "Authored rate wins over the default");
    Ok(())
}

#[test]
fn settings_round_trip_through_serde() -> anyhow::Result<()> {
    let value = serde_json::json!({ "y_down": false, "default_cache_frame_rate": 60 });
    let settings: RuntimeSettings = serde_json::from_value(value)?;
    assert!(!settings.y_down);
    assert_eq!(settings.default_cache_frame_rate, 60);

    let text = serde_json::to_string(&settings)?;
    assert_eq!(RuntimeSettings::from_json_str(&text)?, settings);
    assert!(matches!(
        RuntimeSettings::from_json_str("[1, 2]"),
        Err(SinewError::Settings(_))
    ));
    Ok(())
}

#[test]
fn null_backend_numbers_displays_in_build_order() -> anyhow::Result<()> {
    let armature = build(holder(Vec::new()))?;
    let slot = armature.slot("hand").expect("slot exists");
    assert_eq!(armature.display().0, 1);
    assert_eq!(slot.raw_display().0, 2);
    assert_eq!(slot.mesh_display().0, 3);
    Ok(())
}

// ============================================================================
// Bone Hierarchy
// ============================================================================

fn turned_arm() -> ArmatureData {
    let mut data = ArmatureData::new("arm");
    data.bones.push(BoneData::new("shoulder", None).with_transform(Transform2D {
        rotation: FRAC_PI_2,
        ..Transform2D::from_translation(10.0, 0.0)
    }));
    data.bones.push(
        BoneData::new("elbow", Some("shoulder")).with_transform(Transform2D::from_translation(5.0, 0.0)),
    );
    data.skins.push(SkinData::new("default"));
    data
}

#[test]
fn child_bone_follows_parent_rotation() -> anyhow::Result<()> {
    let mut armature = build(turned_arm())?;
    armature.advance_time(0.0);

    let elbow = armature.bone("elbow").expect("bone exists").global();
    assert!(approx(elbow.x, 10.0) && approx(elbow.y, 5.0), "Got ({}, {})", elbow.x, elbow.y);
    assert!(approx(elbow.rotation, FRAC_PI_2));
    Ok(())
}

#[test]
fn bone_offset_applies_after_invalidate() -> anyhow::Result<()> {
    let mut armature = build(turned_arm())?;
    armature.advance_time(0.0);

    if let Some(shoulder) = armature.bone_mut("shoulder") {
        shoulder.offset = Transform2D::from_translation(0.0, 3.0);
    }
    armature.invalidate_update(Some("shoulder"));
    armature.advance_time(0.0);

    let elbow = armature.bone("elbow").expect("bone exists").global();
    assert!(approx(elbow.x, 10.0) && approx(elbow.y, 8.0), "Got ({}, {})", elbow.x, elbow.y);
    Ok(())
}

#[test]
fn animated_pose_adds_to_setup_pose() -> anyhow::Result<()> {
    let mut data = turned_arm();
    let mut lift = AnimationData::new("lift", 1.0, 24);
    lift.bone_timelines.push(BoneTimeline {
        bone: "elbow".into(),
        track: KeyframeTrack::new(
            vec![0.0, 1.0],
            vec![Transform2D::IDENTITY, Transform2D::from_translation(2.0, 0.0)],
            InterpolationMode::Linear,
        ),
    });
    data.animations.push(Arc::new(lift));

    let mut armature = build(data)?;
    armature.animation().play(Some("lift"), 1);
    armature.advance_time(0.5);

    // Elbow local x = 5 + 1, rotated a quarter turn by the shoulder.
    let elbow = armature.bone("elbow").expect("bone exists").global();
    assert!(approx(elbow.x, 10.0) && approx(elbow.y, 6.0), "Got ({}, {})", elbow.x, elbow.y);
    Ok(())
}

// ============================================================================
// Child Armatures
// ============================================================================

#[test]
fn attached_child_plays_default_animation() -> anyhow::Result<()> {
    let mut knight = build(holder(Vec::new()))?;
    let key = knight.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    knight.advance_time(0.1);

    let slot = knight.slot("hand").expect("slot exists");
    assert_eq!(slot.child_armature(), Some(key));

    let child = knight.child_armature(key).expect("child is owned by the parent");
    assert_eq!(slot.render_display(), Some(child.display()));
    let player = child.animation_player();
    assert_eq!(player.last_animation_name(), Some("idle"));
    let state = player.last_animation_state().and_then(|k| player.state(k)).expect("state exists");
    assert!(approx(state.current_time(), 0.1), "Child advanced with the parent, got {}", state.current_time());
    Ok(())
}

#[test]
fn authored_actions_run_instead_of_default() -> anyhow::Result<()> {
    let actions = vec![ActionData::Event("ready".into()), ActionData::Play("wave".into())];
    let mut knight = build(holder(actions))?;
    let key = knight.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    knight.advance_time(0.0);

    let events: Vec<_> = knight.drain_events().collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].slot, "hand");
    assert_eq!(events[0].name, "ready");
    assert!(knight.drain_events().next().is_none(), "Events are drained once");

    let child = knight.child_armature(key).expect("child exists");
    assert_eq!(child.animation_player().last_animation_name(), Some("wave"));
    assert_eq!(child.animation_player().state_count(), 1);
    Ok(())
}

#[test]
fn detaching_child_resets_its_player() -> anyhow::Result<()> {
    let mut knight = build(holder(Vec::new()))?;
    let key = knight.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    knight.advance_time(0.0);
    assert_eq!(knight.child_armature(key).map(|c| c.animation_player().state_count()), Some(1));

    knight.edit_slot("hand").expect("slot exists").replace_display(None, 0);
    knight.advance_time(0.0);

    assert!(knight.slot("hand").is_some_and(|s| s.child_armature().is_none()));
    assert_eq!(knight.child_armature(key).map(|c| c.animation_player().state_count()), Some(0));
    Ok(())
}

#[test]
fn independent_child_is_left_alone() -> anyhow::Result<()> {
    let mut knight = build(holder(Vec::new()))?;
    let mut child = sword()?;
    child.inherit_animation = false;
    let key = knight.attach_child_armature("hand", 0, child).expect("slot exists");
    knight.advance_time(0.1);

    let child = knight.child_armature(key).expect("child exists");
    assert!(child.animation_player().last_animation_state().is_none());
    Ok(())
}

#[test]
fn attach_to_unknown_slot_fails() -> anyhow::Result<()> {
    let mut knight = build(holder(Vec::new()))?;
    assert!(knight.attach_child_armature("tail", 0, sword()?).is_none());
    Ok(())
}

#[test]
fn child_inherits_parent_time_scale() -> anyhow::Result<()> {
    let mut knight = build(holder(Vec::new()))?;
    let key = knight.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    knight.animation_player_mut().time_scale = 2.0;
    knight.advance_time(0.1);

    let player = knight.child_armature(key).expect("child exists").animation_player();
    let state = player.last_animation_state().and_then(|k| player.state(k)).expect("state exists");
    assert!(approx(state.current_time(), 0.2), "Got {}", state.current_time());
    Ok(())
}

#[test]
fn grandchild_inherits_every_ancestor_scale() -> anyhow::Result<()> {
    let mut middle = build(holder(Vec::new()))?;
    let sword_key = middle.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    middle.animation_player_mut().time_scale = 1.5;

    let mut knight = build(holder(Vec::new()))?;
    let middle_key = knight.attach_child_armature("hand", 0, middle).expect("slot exists");
    knight.animation_player_mut().time_scale = 2.0;
    knight.advance_time(0.1);

    let middle = knight.child_armature(middle_key).expect("middle exists");
    assert!(approx(middle.animation_player().effective_time_scale(), 3.0));

    let player = middle.child_armature(sword_key).expect("sword exists").animation_player();
    let state = player.last_animation_state().and_then(|k| player.state(k)).expect("state exists");
    assert!(approx(state.current_time(), 0.3), "0.1 * 2 * 1.5, got {}", state.current_time());
    Ok(())
}

// ============================================================================
// Cache Rate
// ============================================================================

#[test]
fn cache_rate_change_clears_and_propagates() -> anyhow::Result<()> {
    let mut data = holder(Vec::new());
    let mut sway = AnimationData::new("sway", 1.0, 24);
    sway.bone_timelines.push(BoneTimeline {
        bone: "root".into(),
        track: KeyframeTrack::new(
            vec![0.0, 1.0],
            vec![Transform2D::IDENTITY, Transform2D::from_translation(4.0, 0.0)],
            InterpolationMode::Linear,
        ),
    });
    data.animations.push(Arc::new(sway));
    data.cache_frame_rate = 24;

    let mut knight = build(data)?;
    let key = knight.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    knight.animation().play(Some("sway"), 0);
    knight.advance_time(0.25);
    assert!(knight.frame_cache().frame_count() > 0);
    assert_eq!(
        knight.child_armature(key).map(Armature::cache_frame_rate),
        Some(24),
        "Attached child adopts the parent rate"
    );

    knight.set_cache_frame_rate(12);
    assert_eq!(knight.frame_cache().frame_count(), 0);
    assert_eq!(knight.cache_frame_index(), -1);
    assert_eq!(knight.animation_player().cache_frame_rate(), 12);
    let child = knight.child_armature(key).expect("child exists");
    assert_eq!(child.cache_frame_rate(), 24, "Child keeps a rate it already has");
    Ok(())
}

#[test]
fn rateless_child_follows_rate_change() -> anyhow::Result<()> {
    let mut knight = build(holder(Vec::new()))?;
    let key = knight.attach_child_armature("hand", 0, sword()?).expect("slot exists");
    knight.advance_time(0.0);
    assert_eq!(knight.child_armature(key).map(Armature::cache_frame_rate), Some(0));

    knight.set_cache_frame_rate(30);
    let child = knight.child_armature(key).expect("child exists");
    assert_eq!(child.cache_frame_rate(), 30);
    assert_eq!(child.animation_player().cache_frame_rate(), 30);
    Ok(())
}
