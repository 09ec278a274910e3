//! End-to-end pipeline runs against a small synthetic event log.

use std::path::Path;

use tempfile::TempDir;

use recast::cascade::ResharingEvent;
use recast::pipeline::{Pipeline, RunConfig, Stage};
use recast::store;

fn event(
    cascade: &str,
    id: &str,
    user: &str,
    parent: Option<&str>,
    ts: i64,
    followers: f64,
) -> ResharingEvent {
    ResharingEvent {
        cascade_id: cascade.to_string(),
        event_id: id.to_string(),
        user_id: user.to_string(),
        parent_id: parent.map(str::to_string),
        timestamp: ts,
        follower_count: followers,
    }
}

fn write_event_log(path: &Path) {
    let events = vec![
        // A five-event cascade with a branching observed structure.
        event("1", "e10", "u1", None, 1_000, 100.0),
        event("1", "e11", "u2", Some("e10"), 1_010, 50.0),
        event("1", "e12", "u3", Some("e10"), 1_030, 20.0),
        event("1", "e13", "u4", Some("e11"), 1_100, 10.0),
        event("1", "e14", "u5", Some("e12"), 1_200, 5.0),
        // A three-event chain; u1 and u2 recur across cascades.
        event("2", "e20", "u2", None, 2_000, 80.0),
        event("2", "e21", "u6", Some("e20"), 2_050, 30.0),
        event("2", "e22", "u1", Some("e21"), 2_100, 60.0),
        // A length-2 cascade: exactly one possible wiring.
        event("3", "e30", "u7", None, 3_000, 40.0),
        event("3", "e31", "u8", Some("e30"), 3_010, 15.0),
        // A singleton, dropped during cleaning.
        event("4", "e40", "u9", None, 4_000, 25.0),
    ];

    let mut writer = csv::Writer::from_path(path).unwrap();
    for e in events {
        writer.serialize(e).unwrap();
    }
    writer.flush().unwrap();
}

fn small_config(events: &Path, data_dir: &Path) -> RunConfig {
    let mut config = RunConfig::new(events, data_dir);
    config.gammas = vec![0.5];
    config.alphas = vec![2.0];
    config.variants = 3;
    config.community_reps = 2;
    config.bootstrap_resamples = 200;
    config.fit_sims = 5;
    config.seed = 7;
    config
}

#[test]
fn full_run_produces_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.csv");
    let data = dir.path().join("data");
    write_event_log(&events);

    let pipeline = Pipeline::new(small_config(&events, &data)).unwrap();
    let cleaning = pipeline.cleaning_report();
    assert_eq!(cleaning.kept, 3);
    assert_eq!(cleaning.dropped_short, 1);

    let reports = pipeline.run().unwrap();
    assert_eq!(reports.len(), 6);
    assert_eq!(reports[0].stage, Stage::Reconstruct);
    assert_eq!(reports[5].stage, Stage::Stats);
    assert!(reports.iter().all(|r| r.written > 0));

    // Manifest.
    assert!(data.join("run_config.json").is_file());

    // Variants: three per stochastic method for the larger cascades, one for
    // the length-2 cascade.
    let pdi = data.join("pdi/gamma_0_5/alpha_2");
    for version in 1..=3 {
        assert!(pdi.join(format!("00001/v_{version:03}.edges.zst")).is_file());
    }
    assert!(pdi.join("00003/v_001.edges.zst").is_file());
    assert!(!pdi.join("00003/v_002.edges.zst").exists());
    assert!(data.join("random/00002/v_003.edges.zst").is_file());
    assert!(data.join("tid/00001/v_001.edges.zst").is_file());

    // Networks: one per version, a single one for TID, plus the baseline.
    for version in 1..=3 {
        assert!(pdi
            .join(format!("network_version_{version:03}.edges.zst"))
            .is_file());
    }
    assert!(data.join("tid/network_version_001.edges.zst").is_file());
    assert!(!data.join("tid/network_version_002.edges.zst").exists());
    assert!(data.join("naive_network.edges.zst").is_file());

    // Tabular outputs.
    for table in [
        "centralities",
        "similarity",
        "communities",
        "cascade_metrics",
        "metrics_cosine",
        "strength_changes",
        "strength_correlations",
        "top_k_jaccard",
        "alpha_fits",
    ] {
        let path = data.join(format!("{table}.csv"));
        assert!(path.is_file(), "missing {table}.csv");
        assert!(path.metadata().unwrap().len() > 0);
    }
}

#[test]
fn naive_network_wires_roots_to_resharers() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.csv");
    let data = dir.path().join("data");
    write_event_log(&events);

    let mut config = small_config(&events, &data);
    config.stages = vec![Stage::Reconstruct, Stage::Networks];
    Pipeline::new(config).unwrap().run().unwrap();

    let naive = store::read_network(&data.join("naive_network.edges.zst")).unwrap();
    // Every user of the three kept cascades is a vertex.
    for user in ["u1", "u2", "u3", "u4", "u5", "u6", "u7", "u8"] {
        assert!(naive.node_id(user).is_some(), "missing {user}");
    }
    assert!(naive.node_id("u9").is_none());

    // Cascade 1 stars out of u1: four reshares, four distinct users.
    let u1 = naive.node_id("u1").unwrap();
    assert_eq!(naive.out_neighbors(u1).len(), 4);
}

#[test]
fn rerun_skips_existing_artifacts() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.csv");
    let data = dir.path().join("data");
    write_event_log(&events);

    let mut config = small_config(&events, &data);
    config.stages = vec![Stage::Reconstruct, Stage::Networks];

    let first = Pipeline::new(config.clone()).unwrap().run().unwrap();
    assert!(first.iter().all(|r| r.skipped == 0));

    let second = Pipeline::new(config.clone()).unwrap().run().unwrap();
    assert!(second.iter().all(|r| r.written == 0));
    assert!(second.iter().all(|r| r.skipped > 0));

    // --force regenerates everything.
    config.force = true;
    let third = Pipeline::new(config).unwrap().run().unwrap();
    assert!(third.iter().all(|r| r.skipped == 0));
    assert!(third.iter().all(|r| r.written > 0));
}

#[test]
fn reconstruction_is_reproducible_across_runs() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.csv");
    write_event_log(&events);

    let data_a = dir.path().join("a");
    let data_b = dir.path().join("b");
    for data in [&data_a, &data_b] {
        let mut config = small_config(&events, data);
        config.stages = vec![Stage::Reconstruct];
        Pipeline::new(config).unwrap().run().unwrap();
    }

    let relative = "pdi/gamma_0_5/alpha_2/00001/v_002.edges.zst";
    let a = store::read_variant(&data_a.join(relative), "1", 2).unwrap();
    let b = store::read_variant(&data_b.join(relative), "1", 2).unwrap();
    assert_eq!(a, b);
}

#[test]
fn event_log_without_reconstructible_cascades_is_rejected() {
    let dir = TempDir::new().unwrap();
    let events = dir.path().join("events.csv");
    let mut writer = csv::Writer::from_path(&events).unwrap();
    writer
        .serialize(event("1", "e1", "u1", None, 1_000, 1.0))
        .unwrap();
    writer
        .serialize(event("2", "e2", "u2", None, 2_000, 1.0))
        .unwrap();
    writer.flush().unwrap();

    let config = RunConfig::new(&events, dir.path().join("data"));
    assert!(Pipeline::new(config).is_err());
}
