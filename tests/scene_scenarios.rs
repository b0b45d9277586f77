//! End-to-end scenarios over the public scene API, driven by scripted layouts.

use evergreen::config::SceneConfig;
use evergreen::error::{ConfigError, GroupUpdateError};
use evergreen::foliage::FoliageConfig;
use evergreen::layout::{generate_layout_set, LayoutParams};
use evergreen::ornament::{OrnamentConfig, OrnamentGroup, OrnamentShape};
use evergreen::sampler::ScriptedSampler;
use evergreen::star::StarConfig;
use evergreen::transition::Mode;
use evergreen::visualiser::{FrameContext, VisualiserState};
use glam::Vec3;

fn three_box_sampler() -> ScriptedSampler {
    ScriptedSampler::new(
        vec![Vec3::new(10.0, -3.0, 4.0), Vec3::new(-7.5, 2.25, 1.0), Vec3::new(0.5, 12.0, -9.0)],
        vec![Vec3::new(0.0, 5.5, 0.0), Vec3::new(1.25, -2.0, -0.75), Vec3::new(-3.0, -5.0, 2.5)],
        vec![0.1, 0.5, 0.9],
    )
}

fn box_config(label: &str, count: usize) -> OrnamentConfig {
    OrnamentConfig {
        label: label.to_string(),
        count,
        shape: OrnamentShape::Box,
        ..Default::default()
    }
}

fn scripted_scene(initial_mode: Mode, ornaments: Vec<OrnamentConfig>) -> SceneConfig {
    SceneConfig {
        initial_mode,
        foliage: FoliageConfig {
            count: 1,
            ..Default::default()
        },
        ornaments,
        star: StarConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_single_large_step_lands_exactly_on_tree() {
    let mut sampler = three_box_sampler();
    let mut group = OrnamentGroup::new(&box_config("gold", 3), Mode::Scattered, &mut sampler).unwrap();
    assert_eq!(group.transition().progress(), 0.0);

    // Box speed is 1.0, so one second is a full step.
    group
        .update(&FrameContext {
            mode: Mode::Assembled,
            elapsed: 1.0,
            delta: 1.0,
        })
        .unwrap();

    assert_eq!(group.transition().progress(), 1.0);
    for i in 0..3 {
        let tree = group.layout().tree_position(i);
        assert_eq!(group.instance_transform(i).position, tree);
        let model = group.instances()[i].model;
        assert_eq!([model[3][0], model[3][1], model[3][2]], tree.to_array());
    }
}

#[test]
fn test_upload_is_offered_once_per_publish() {
    let mut group = OrnamentGroup::new(&box_config("gold", 3), Mode::Assembled, &mut three_box_sampler()).unwrap();
    assert_eq!(group.take_upload().map(|b| b.len()), Some(3));
    assert!(group.take_upload().is_none());

    let ctx = FrameContext {
        mode: Mode::Assembled,
        elapsed: 0.016,
        delta: 0.016,
    };
    group.update(&ctx).unwrap();
    assert_eq!(group.frames_published(), 1);
    assert_eq!(group.take_upload().map(|b| b.len()), Some(3));
    assert!(group.take_upload().is_none());
}

#[test]
fn test_toggle_back_before_any_frame_keeps_progress() {
    let config = scripted_scene(Mode::Assembled, vec![box_config("gold", 3)]);
    let mut scene = VisualiserState::with_sampler(&config, &mut three_box_sampler()).unwrap();

    assert_eq!(scene.toggle_mode(), Mode::Scattered);
    assert_eq!(scene.toggle_mode(), Mode::Assembled);
    assert_eq!(scene.foliage().transition().progress(), 1.0);
    assert_eq!(scene.ornaments()[0].transition().progress(), 1.0);

    scene.update(1.0 / 60.0);
    assert_eq!(scene.foliage().transition().progress(), 1.0);
    assert_eq!(scene.ornaments()[0].transition().progress(), 1.0);
}

#[test]
fn test_repeated_set_mode_matches_single_request() {
    let config = scripted_scene(Mode::Scattered, vec![box_config("gold", 3)]);
    let mut once = VisualiserState::with_sampler(&config, &mut three_box_sampler()).unwrap();
    let mut thrice = VisualiserState::with_sampler(&config, &mut three_box_sampler()).unwrap();

    once.set_mode(Mode::Assembled);
    for _ in 0..3 {
        thrice.set_mode(Mode::Assembled);
    }
    for _ in 0..5 {
        once.update(0.02);
        thrice.update(0.02);
    }

    assert_eq!(once.foliage().transition(), thrice.foliage().transition());
    assert_eq!(once.ornaments()[0].transition(), thrice.ornaments()[0].transition());
    assert_eq!(once.ornaments()[0].instances(), thrice.ornaments()[0].instances());
}

#[test]
fn test_failing_group_does_not_stop_others() {
    // Scatter points are drawn in order: foliage, then "bad", then "good".
    let mut sampler = ScriptedSampler::new(
        vec![Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0)],
        vec![Vec3::Y],
        vec![0.5],
    );
    let config = scripted_scene(Mode::Scattered, vec![box_config("bad", 1), box_config("good", 1)]);
    let mut scene = VisualiserState::with_sampler(&config, &mut sampler).unwrap();
    scene.set_mode(Mode::Assembled);

    let report = scene.update(0.1);
    assert_eq!(
        report.failures,
        vec![GroupUpdateError::NonFiniteTransform {
            group: "bad".to_string(),
            index: 0,
        }]
    );

    let bad = &scene.ornaments()[0];
    let good = &scene.ornaments()[1];
    assert_eq!(bad.frames_published(), 0);
    assert_eq!(bad.transition().progress(), 0.0);
    assert_eq!(good.frames_published(), 1);
    assert!(good.transition().progress() > 0.0);
    assert!(scene.foliage().transition().progress() > 0.0);
    assert_eq!(scene.frame(), 1);
}

#[test]
fn test_empty_groups_are_valid() {
    let config = SceneConfig {
        foliage: FoliageConfig {
            count: 0,
            ..Default::default()
        },
        ornaments: vec![box_config("none", 0)],
        ..Default::default()
    };
    let mut scene = VisualiserState::with_sampler(&config, &mut ScriptedSampler::default()).unwrap();
    let report = scene.update(0.5);
    assert!(report.failures.is_empty());
    assert!(scene.foliage().is_empty());
    assert!(scene.ornaments()[0].instances().is_empty());

    let set = generate_layout_set(0, 15.0, 12.0, 5.0).unwrap();
    assert!(set.is_empty());
    assert!(set.scatter_positions().is_empty());
}

#[test]
fn test_layout_buffers_are_flat() {
    let set = generate_layout_set(7, 15.0, 12.0, 5.0).unwrap();
    assert_eq!(set.scatter_positions().len(), 21);
    assert_eq!(set.tree_positions().len(), 21);
    assert_eq!(set.randoms().len(), 7);
    for i in 0..7 {
        assert_eq!(set.tree_position(i).x, set.tree_positions()[i * 3]);
    }
}

#[test]
fn test_degenerate_geometry_is_rejected_up_front() {
    let mut config = SceneConfig::default();
    config.ornaments[0].layout = LayoutParams::new(20.0, -1.0, 4.5);
    let err = VisualiserState::new(&config).err();
    assert!(matches!(err, Some(ConfigError::NonPositive { .. })));

    assert!(generate_layout_set(10, 0.0, 12.0, 5.0).is_err());
    assert!(generate_layout_set(10, 15.0, 0.0, 5.0).is_err());
}
