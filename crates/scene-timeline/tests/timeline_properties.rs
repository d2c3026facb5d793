use proptest::prelude::*;

use scenereel_project_model::{Asset, AssetPool, Cue, SceneSpec};
use scenereel_scene_timeline::resolver::{AssetResolver, ResolvedScene};
use scenereel_scene_timeline::timeline::{
    CueInput, ProbedScene, SceneDurations, Timeline, TimelineBuilder,
};

fn build(durations: &[(f64, f64)], cues: Vec<Cue>) -> Timeline {
    let scenes = durations
        .iter()
        .enumerate()
        .map(|(i, (v, a))| {
            ProbedScene::new(
                ResolvedScene::empty(i as u32 + 1),
                SceneDurations::new(*v, *a),
            )
        })
        .collect();
    TimelineBuilder::new().build(scenes, CueInput::Shared(cues))
}

fn duration_strategy() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec(
        (
            prop_oneof![Just(0.0), 0.5f64..30.0],
            prop_oneof![Just(0.0), 0.5f64..30.0],
        ),
        1..8,
    )
}

fn cue_strategy() -> impl Strategy<Value = Vec<Cue>> {
    prop::collection::vec((0.0f64..200.0, 0.1f64..10.0), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (start, len))| Cue::new(start, start + len, format!("cue {i}")))
            .collect()
    })
}

proptest! {
    #[test]
    fn windows_partition_the_timeline(durations in duration_strategy(), cues in cue_strategy()) {
        let timeline = build(&durations, cues);

        let mut expected_start = 0.0;
        for (scene, (v, a)) in timeline.scenes.iter().zip(&durations) {
            let anchor = if *a > 0.0 { *a } else { *v };
            prop_assert_eq!(scene.window.start, expected_start);
            prop_assert!((scene.window.end - (expected_start + anchor)).abs() < 1e-9);
            expected_start = scene.window.end;
        }
        prop_assert!((timeline.total_secs - expected_start).abs() < 1e-9);
    }

    #[test]
    fn every_retained_cue_lands_in_exactly_one_scene(
        durations in duration_strategy(),
        cues in cue_strategy(),
    ) {
        let total_input = cues.len();
        let timeline = build(&durations, cues.clone());

        let assigned: usize = timeline.scenes.iter().map(|s| s.cues.len()).sum();
        prop_assert_eq!(assigned + timeline.dropped_cues, total_input);

        for scene in &timeline.scenes {
            let width = scene.window.end - scene.window.start;
            for cue in &scene.cues {
                prop_assert!(cue.start_time >= 0.0);
                prop_assert!(cue.start_time < width + 1e-9);
                prop_assert!(cue.start_time < cue.end_time);
            }
        }

        let expected_dropped = cues
            .iter()
            .filter(|c| c.start_time >= timeline.total_secs)
            .count();
        prop_assert_eq!(timeline.dropped_cues, expected_dropped);
    }

    #[test]
    fn resolution_is_deterministic(id in 1u32..40, names in prop::collection::vec("[a-z_ 0-9]{1,12}", 0..10)) {
        let pool = AssetPool::new(
            names
                .iter()
                .map(|n| Asset::from_path_bytes(format!("{n}.mp4"), n.as_bytes().to_vec())),
        );
        let resolver = AssetResolver::new(&pool);
        let spec = SceneSpec::new(id).with_video("scene");
        prop_assert_eq!(resolver.resolve(&spec), resolver.resolve(&spec));
    }
}
