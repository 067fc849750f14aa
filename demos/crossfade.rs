use std::sync::Arc;

use glam::Vec2;
use sinew::geom::Transform2D;
use sinew::model::{
    AnimationData, ArmatureData, BoneData, BoneTimeline, BoundingBoxData, DisplayData, DisplayKind,
    InterpolationMode, KeyframeTrack, SkinData, SlotData,
};
use sinew::{Armature, FadeOutMode, NullBackend, RuntimeSettings};

fn clip(name: &str, duration: f32, reach: f32) -> AnimationData {
    let mut clip = AnimationData::new(name, duration, (duration * 24.0) as u32);
    clip.play_times = 0;
    clip.bone_timelines.push(BoneTimeline {
        bone: "root".into(),
        track: KeyframeTrack::new(
            vec![0.0, duration * 0.5, duration],
            vec![
                Transform2D::IDENTITY,
                Transform2D::from_translation(reach, 0.0),
                Transform2D::IDENTITY,
            ],
            InterpolationMode::Linear,
        ),
    });
    clip
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut data = ArmatureData::new("runner");
    data.cache_frame_rate = 24;
    data.bones.push(BoneData::new("root", None));
    data.bones
        .push(BoneData::new("head", Some("root")).with_transform(Transform2D::from_translation(0.0, -20.0)));
    data.slots.push(SlotData::new("hitbox", "head"));

    let mut skin = SkinData::new("default");
    skin.add_display(
        "hitbox",
        Some(Arc::new(DisplayData::new(
            "head_box",
            "default",
            DisplayKind::BoundingBox(Arc::new(BoundingBoxData::rectangle(10.0, 10.0))),
        ))),
    );
    data.skins.push(skin);
    data.animations = vec![Arc::new(clip("walk", 1.0, 10.0)), Arc::new(clip("run", 0.5, 30.0))];
    data.default_animation = Some("walk".into());

    let settings = RuntimeSettings::from_json_str(r#"{ "y_down": true }"#)?;
    let mut armature = Armature::new(Arc::new(data), settings, Box::new(NullBackend::new()))?;
    armature.animation().play(None, -1);

    let dt = 1.0 / 24.0;
    for frame in 0..72 {
        if frame == 24 {
            armature
                .animation()
                .fade_in("run", 0.3, -1, 0, None, FadeOutMode::SameLayerAndGroup);
        }
        armature.advance_time(dt);

        if frame % 6 == 0 {
            let head = armature.bone("head").map(|b| *b.global()).unwrap_or_default();
            let hit = armature.contains_point(Vec2::new(head.x, head.y)).map(|s| s.name().to_owned());
            println!(
                "frame {frame:>2}: head at ({:>6.2}, {:>6.2}), cache frame {:>3}, hit {:?}",
                head.x,
                head.y,
                armature.cache_frame_index(),
                hit
            );
        }
    }

    let stats = armature.animation_player().pool_stats();
    println!("animation states: {} borrowed, {} returned", stats.borrowed, stats.returned);
    Ok(())
}
