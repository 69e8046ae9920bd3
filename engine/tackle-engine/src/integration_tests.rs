//! End-to-end tests running synthetic plays through the whole pipeline

use crate::config::FailurePolicy;
use crate::io::{self, CsvPartition, InMemoryPartition};
use crate::{
    Pipeline, PipelineConfig, PipelineError, PipelineOutput, Play, PlayDirection, PlayKey,
    PlayerRecord, TackleRecord, TrackingRecord,
};

const CARRIER: i64 = 7;
const BLOCKER: i64 = 8;
const CHASER: i64 = 100;
const TRAILER: i64 = 101;

fn track(
    play_id: i64,
    nfl_id: Option<i64>,
    club: &str,
    frame_id: i64,
    x: f64,
    event: Option<&str>,
) -> TrackingRecord {
    TrackingRecord {
        game_id: 2022090800,
        play_id,
        nfl_id,
        frame_id,
        time: String::new(),
        jersey_number: nfl_id.map(|id| (id % 100) as u32),
        club: club.to_string(),
        play_direction: PlayDirection::Right,
        x,
        y: 25.0,
        s: if nfl_id.is_some() { 4.0 } else { 0.5 },
        o: if nfl_id.is_some() { 90.0 } else { f64::NAN },
        dir: if nfl_id.is_some() { 270.0 } else { f64::NAN },
        event: event.map(str::to_string),
    }
}

/// Handoff at frame 5, carrier down at frame 60. The chaser is within one yard
/// of the carrier on frames 38-40 and again on 55-57, ten yards away otherwise.
fn reapproach_play(play_id: i64) -> Vec<TrackingRecord> {
    let mut rows = Vec::new();
    for frame in 1..=60 {
        let event = match frame {
            5 => Some("handoff"),
            60 => Some("tackle"),
            _ => None,
        };
        let in_range = (38..=40).contains(&frame) || (55..=57).contains(&frame);
        let chaser_x = if in_range { 31.0 } else { 40.0 };

        rows.push(track(play_id, Some(CARRIER), "KC", frame, 30.0, event));
        rows.push(track(play_id, Some(BLOCKER), "KC", frame, 32.0, event));
        rows.push(track(play_id, Some(CHASER), "DEN", frame, chaser_x, event));
        rows.push(track(play_id, Some(TRAILER), "DEN", frame, 33.0, event));
        rows.push(track(play_id, None, "football", frame, 30.0, event));
    }
    rows
}

/// Carrier never receives the ball
fn no_receipt_play(play_id: i64) -> Vec<TrackingRecord> {
    (1..=6)
        .flat_map(|frame| {
            let event = (frame == 6).then_some("qb_sack");
            [
                track(play_id, Some(CARRIER), "KC", frame, 30.0, event),
                track(play_id, Some(CHASER), "DEN", frame, 31.0, event),
            ]
        })
        .collect()
}

/// A defender missing from the player table is on the field
fn unknown_defender_play(play_id: i64) -> Vec<TrackingRecord> {
    (1..=4)
        .flat_map(|frame| {
            let event = match frame {
                1 => Some("run"),
                4 => Some("out_of_bounds"),
                _ => None,
            };
            [
                track(play_id, Some(CARRIER), "KC", frame, 30.0, event),
                track(play_id, Some(555), "DEN", frame, 31.0, event),
            ]
        })
        .collect()
}

fn plays() -> Vec<Play> {
    [10, 20, 30, 40]
        .into_iter()
        .map(|play_id| Play { game_id: 2022090800, play_id, ball_carrier_id: CARRIER })
        .collect()
}

fn players() -> Vec<PlayerRecord> {
    [
        (CARRIER, "5-10", 210.0, "RB"),
        (BLOCKER, "6-1", 195.0, "WR"),
        (CHASER, "6-2", 240.0, "ILB"),
        (TRAILER, "6-0", 190.0, "CB"),
    ]
    .into_iter()
    .map(|(nfl_id, height, weight, position)| PlayerRecord {
        nfl_id,
        height: height.to_string(),
        weight,
        position: position.to_string(),
        display_name: String::new(),
    })
    .collect()
}

fn tackles() -> Vec<TackleRecord> {
    [10, 40]
        .into_iter()
        .map(|play_id| TackleRecord {
            game_id: 2022090800,
            play_id,
            nfl_id: CHASER,
            tackle: true,
            assist: false,
            forced_fumble: false,
            pff_missed_tackle: true,
        })
        .collect()
}

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, &plays(), &players(), &tackles()).unwrap()
}

fn opportunities_csv(output: &PipelineOutput) -> Vec<u8> {
    let mut buf = Vec::new();
    io::write_opportunities(&mut buf, &output.opportunities).unwrap();
    buf
}

fn defenders_csv(output: &PipelineOutput) -> Vec<u8> {
    let mut buf = Vec::new();
    io::write_feature_frames(&mut buf, &output.defenders).unwrap();
    buf
}

#[test]
fn test_reapproach_splits_into_miss_then_tackle() {
    let partitions = vec![InMemoryPartition::new("week_1", reapproach_play(10))];
    let output = pipeline(PipelineConfig::default()).run(&partitions).unwrap();

    // frames 5..=60, chaser and trailer each frame
    assert_eq!(output.defenders.len(), 2 * 56);
    assert_eq!(output.report.counts.carrier_frames, 56);
    assert_eq!(output.report.candidate_rows, 6);

    let opps = &output.opportunities;
    assert_eq!(opps.len(), 2);

    assert_eq!(opps[0].tidx, 1);
    assert_eq!(opps[0].entry.frame.frame_id, 38);
    assert!(opps[0].outcome.missed_tackle);
    assert!(!opps[0].outcome.made_contact());
    assert_eq!(opps[0].weight, 1.0);

    assert_eq!(opps[1].tidx, 2);
    assert_eq!(opps[1].entry.frame.frame_id, 55);
    assert!(opps[1].outcome.tackle);
    assert!(!opps[1].outcome.missed_tackle);
    assert_eq!(opps[1].weight, 1.0);

    assert_eq!(output.report.label_quality.keys, 1);
    assert_eq!(output.report.label_quality.non_ambiguous_keys, 0);
    assert_eq!(output.report.attribution_policy, "terminal_opportunity_only");
}

#[test]
fn test_support_counts_and_features() {
    let partitions = vec![InMemoryPartition::new("week_1", reapproach_play(10))];
    let output = pipeline(PipelineConfig::default()).run(&partitions).unwrap();

    let entry = &output.opportunities[0].entry;
    assert_eq!(entry.frame.blockers_nearby, 1);
    assert_eq!(entry.frame.defenders_nearby, 2);
    assert_eq!(entry.features.net_defenders_nearby, 1);
    assert_eq!(entry.features.congestion, 3);
    assert!((entry.features.time_since_receipt - 3.3).abs() < 1e-9);
    assert_eq!(entry.features.is_caught_pass, 0);
    assert_eq!(entry.features.is_qb, 0);

    // chaser out of range; only the trailer is nearby
    let far = output
        .defenders
        .iter()
        .find(|f| f.frame.defender.nfl_id == CHASER && f.frame.frame_id == 20)
        .unwrap();
    assert_eq!(far.frame.defenders_nearby, 1);
    assert!((far.frame.dist_to_carrier - 10.0).abs() < 1e-9);
}

#[test]
fn test_outputs_sorted_by_game_play_frame_defender() {
    let mut tracking = reapproach_play(40);
    tracking.extend(reapproach_play(10));
    tracking.reverse();
    let partitions = vec![InMemoryPartition::new("week_1", tracking)];
    let output = pipeline(PipelineConfig::default()).run(&partitions).unwrap();

    let keys: Vec<_> = output.defenders.iter().map(|f| f.frame.sort_key()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let opp_keys: Vec<_> = output.opportunities.iter().map(|o| o.entry.frame.sort_key()).collect();
    assert_eq!(opp_keys.len(), 4);
    assert!(opp_keys.windows(2).all(|w| w[0] <= w[1]));

    // segment indices run over the whole candidate set
    let tidx: Vec<u32> = output.opportunities.iter().map(|o| o.tidx).collect();
    assert_eq!(tidx, vec![1, 2, 3, 4]);
}

#[test]
fn test_play_without_receipt_is_excluded() {
    let mut tracking = reapproach_play(10);
    tracking.extend(no_receipt_play(20));
    let partitions = vec![InMemoryPartition::new("week_1", tracking)];
    let output = pipeline(PipelineConfig::default()).run(&partitions).unwrap();

    assert_eq!(
        output.report.plays_without_receipt,
        vec![PlayKey { game_id: 2022090800, play_id: 20 }]
    );
    assert_eq!(output.report.counts.plays_seen, 2);
    assert!(output.defenders.iter().all(|f| f.frame.play_id() == 10));
}

#[test]
fn test_rerun_is_byte_identical() {
    let partitions = vec![
        InMemoryPartition::new("week_1", reapproach_play(10)),
        InMemoryPartition::new("week_2", reapproach_play(40)),
    ];
    let pipeline = pipeline(PipelineConfig::default());

    let first = pipeline.run(&partitions).unwrap();
    let second = pipeline.run(&partitions).unwrap();
    assert_eq!(opportunities_csv(&first), opportunities_csv(&second));
    assert_eq!(defenders_csv(&first), defenders_csv(&second));
}

#[test]
fn test_parallel_matches_sequential() {
    let partitions = vec![
        InMemoryPartition::new("week_2", reapproach_play(40)),
        InMemoryPartition::new("week_1", reapproach_play(10)),
        InMemoryPartition::new("week_3", no_receipt_play(20)),
    ];

    let parallel = pipeline(PipelineConfig::default()).run(&partitions).unwrap();

    let mut config = PipelineConfig::default();
    config.execution.parallel = false;
    let sequential = pipeline(config).run(&partitions).unwrap();

    assert_eq!(opportunities_csv(&parallel), opportunities_csv(&sequential));
    assert_eq!(defenders_csv(&parallel), defenders_csv(&sequential));
    assert_eq!(parallel.report.counts, sequential.report.counts);
}

#[test]
fn test_halt_policy_aborts_on_unknown_player() {
    let partitions = vec![
        InMemoryPartition::new("week_1", reapproach_play(10)),
        InMemoryPartition::new("week_2", unknown_defender_play(30)),
    ];
    let err = pipeline(PipelineConfig::default()).run(&partitions).unwrap_err();

    match err {
        PipelineError::Partition { partition, source } => {
            assert_eq!(partition, "week_2");
            assert!(matches!(*source, PipelineError::UnknownPlayer { nfl_id: 555 }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_isolate_policy_drops_failed_partition() {
    let partitions = vec![
        InMemoryPartition::new("week_1", reapproach_play(10)),
        InMemoryPartition::new("week_2", unknown_defender_play(30)),
    ];
    let mut config = PipelineConfig::default();
    config.execution.failure_policy = FailurePolicy::Isolate;
    let output = pipeline(config).run(&partitions).unwrap();

    assert_eq!(output.report.partitions_processed, 1);
    assert_eq!(output.report.partitions_failed.len(), 1);
    assert_eq!(output.report.partitions_failed[0].partition, "week_2");
    assert_eq!(output.opportunities.len(), 2);
}

#[test]
fn test_tighter_tackle_range_removes_candidates() {
    let partitions = vec![InMemoryPartition::new("week_1", reapproach_play(10))];
    let mut config = PipelineConfig::default();
    config.segmentation.tackle_dist = 0.5;
    let output = pipeline(config).run(&partitions).unwrap();

    assert_eq!(output.report.candidate_rows, 0);
    assert!(output.opportunities.is_empty());
    assert_eq!(output.report.non_ambiguous_rate, None);
}

#[test]
fn test_csv_partitions_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let week_1 = dir.path().join("tracking_week_1.csv");
    let week_2 = dir.path().join("tracking_week_2.csv");
    io::write_rows(io::create_file(&week_1).unwrap(), &reapproach_play(10)).unwrap();
    io::write_rows(io::create_file(&week_2).unwrap(), &reapproach_play(40)).unwrap();

    let partitions = vec![CsvPartition::new(&week_1), CsvPartition::new(&week_2)];
    let output = pipeline(PipelineConfig::default()).run(&partitions).unwrap();
    assert_eq!(output.opportunities.len(), 4);
    assert_eq!(output.feature_columns.len(), crate::FEATURE_COLUMNS.len());

    let from_memory = pipeline(PipelineConfig::default())
        .run(&[
            InMemoryPartition::new("a", reapproach_play(10)),
            InMemoryPartition::new("b", reapproach_play(40)),
        ])
        .unwrap();
    assert_eq!(opportunities_csv(&output), opportunities_csv(&from_memory));

    let report_path = dir.path().join("report.json");
    io::write_json(&report_path, &output.report).unwrap();
    let raw = std::fs::read_to_string(&report_path).unwrap();
    let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["opportunities"], 4);
}

#[test]
fn test_duplicate_play_rows_are_rejected() {
    let mut plays = plays();
    plays.push(plays[0].clone());

    let err = Pipeline::new(PipelineConfig::default(), &plays, &players(), &tackles()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Integrity { stage: "play metadata index", expected: 5, actual: 4 }
    ));
}

#[test]
fn test_duplicate_tackle_rows_are_rejected() {
    let mut tackles = tackles();
    tackles.push(tackles[0].clone());

    let err = Pipeline::new(PipelineConfig::default(), &plays(), &players(), &tackles).unwrap_err();
    match err {
        PipelineError::DuplicateOutcome { key } => {
            assert_eq!((key.game_id, key.play_id, key.defender_id), (2022090800, 10, CHASER));
        }
        other => panic!("unexpected error: {other}"),
    }
}
