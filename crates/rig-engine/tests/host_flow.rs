//! End-to-end flow over the execution host with a fully mocked bench:
//! connect → check → measure → query the result model.

use rig_core::config::catalog_from_str;
use rig_core::params::SecondaryParams;
use rig_engine::{
    ExecutionHost, HostEvent, HostState, InstrumentRack, MeasureResult, ReferenceSource,
    ReferenceTable, Sample, SequenceEngine,
};
use rig_driver_mock::{
    MockAnalyzer, MockGenerator, MockGeneratorConfig, MockSource,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const CATALOG: &str = r#"
    [device."DUT 07"]
    f = [1.15, 1.35, 1.75, 1.92, 2.25, 2.54, 2.7, 3.0]
    p1 = 15.0
    p2 = 21.0
    p_check = -10.0
    level = -20.0
    i_min_ma = 5.0
    i_max_ma = 50.0
    att = 30.0
"#;

const REFERENCE: &str = r#"
    [[device]]
    index = 7
    columns = [
        { label = "F1, GHz", span = 0.0, step = 0.0, mean = 1.15 },
        { label = "Kp, dB", span = 0.5, step = 0.05, mean = 12.0 },
        { label = "IIP3, dBm" },
    ]
"#;

struct Bench {
    source: Arc<MockSource>,
    analyzer: Arc<MockAnalyzer>,
    rack: InstrumentRack,
}

fn bench() -> Bench {
    let source = Arc::new(MockSource::new());
    let gen1 = Arc::new(MockGenerator::with_config(MockGeneratorConfig {
        label: "gen1".to_string(),
        ..Default::default()
    }));
    let gen2 = Arc::new(MockGenerator::with_config(MockGeneratorConfig {
        label: "gen2".to_string(),
        ..Default::default()
    }));
    let analyzer = Arc::new(MockAnalyzer::new());
    let rack = InstrumentRack::new(source.clone(), gen1, gen2, analyzer.clone());
    Bench {
        source,
        analyzer,
        rack,
    }
}

fn mock_result(dir: &std::path::Path) -> MeasureResult {
    let mut file = std::fs::File::create(dir.join("batch.toml")).unwrap();
    file.write_all(REFERENCE.as_bytes()).unwrap();
    let table = ReferenceTable::from_toml_str(REFERENCE).unwrap();
    MeasureResult::mock(ReferenceSource::new(dir), table, Some(42))
}

fn spawn_host(bench: Bench, result: MeasureResult) -> ExecutionHost {
    let catalog = Arc::new(catalog_from_str(CATALOG).unwrap());
    let engine = SequenceEngine::new(catalog).with_settle(Duration::ZERO);
    ExecutionHost::spawn(bench.rack, engine, result)
}

#[tokio::test]
async fn connect_check_measure_flow() {
    let bench = bench();
    bench.analyzer.set_marker_power(-10.0);
    bench.source.set_drawn_current(10.0);
    let dir = tempfile::tempdir().unwrap();
    let result = mock_result(dir.path());

    let host = spawn_host(bench, result);
    let mut events = host.subscribe();

    assert!(host.connect(Default::default()).await.unwrap());
    assert!(matches!(
        events.recv().await.unwrap(),
        HostEvent::Connected { found: true }
    ));

    let present = host
        .check("DUT 07", SecondaryParams { important: false })
        .await
        .unwrap();
    assert!(present);
    assert!(matches!(
        events.recv().await.unwrap(),
        HostEvent::CheckComplete { present: true, .. }
    ));

    let ready = host
        .measure("DUT 07", SecondaryParams { important: false })
        .await
        .unwrap();
    assert!(ready);
    assert!(matches!(
        events.recv().await.unwrap(),
        HostEvent::MeasureComplete { ready: true, .. }
    ));

    let snapshot = host.result().await.unwrap();
    assert!(snapshot.ready);
    assert!(!snapshot.only_important);
    assert_eq!(snapshot.headers, vec!["F1, GHz", "Kp, dB", "IIP3, dBm"]);
    assert_eq!(snapshot.data[0], Sample::Value(1.15));
    assert!(matches!(snapshot.data[1], Sample::Value(v) if (11.5..=12.5).contains(&v)));
    assert_eq!(snapshot.data[2], Sample::NoData);

    assert_eq!(host.state().await, HostState::Idle);
}

#[tokio::test]
async fn safety_abort_keeps_prior_result() {
    let bench = bench();
    bench.analyzer.set_marker_power(-10.0);
    bench.source.set_drawn_current(10.0);
    let dir = tempfile::tempdir().unwrap();
    let result = mock_result(dir.path());

    let source = bench.source.clone();
    let host = spawn_host(bench, result);

    assert!(host.connect(Default::default()).await.unwrap());
    assert!(host
        .check("DUT 07", SecondaryParams::default())
        .await
        .unwrap());
    assert!(host
        .measure("DUT 07", SecondaryParams::default())
        .await
        .unwrap());
    let before = host.result().await.unwrap();

    // Push the drawn current to the limit: the next measure trips the
    // interlock, returns no result, and leaves the model as it was.
    source.set_drawn_current(60.0);
    let ready = host
        .measure("DUT 07", SecondaryParams::default())
        .await
        .unwrap();
    assert!(!ready);

    let after = host.result().await.unwrap();
    assert_eq!(after.headers, before.headers);
    assert_eq!(after.data, before.data);
}

#[tokio::test]
async fn important_only_flag_is_copied_into_result() {
    let bench = bench();
    bench.analyzer.set_marker_power(-10.0);
    bench.source.set_drawn_current(10.0);
    let dir = tempfile::tempdir().unwrap();
    let result = mock_result(dir.path());

    let host = spawn_host(bench, result);
    assert!(host.connect(Default::default()).await.unwrap());
    assert!(host
        .check("DUT 07", SecondaryParams { important: true })
        .await
        .unwrap());
    assert!(host
        .measure("DUT 07", SecondaryParams { important: true })
        .await
        .unwrap());

    let snapshot = host.result().await.unwrap();
    assert!(snapshot.only_important);
}

#[tokio::test]
async fn failed_check_leaves_not_present_and_is_reattemptable() {
    let bench = bench();
    bench.analyzer.set_marker_power(-25.0);
    bench.source.set_drawn_current(10.0);
    let dir = tempfile::tempdir().unwrap();
    let result = mock_result(dir.path());

    let analyzer = bench.analyzer.clone();
    let host = spawn_host(bench, result);
    assert!(host.connect(Default::default()).await.unwrap());

    assert!(!host
        .check("DUT 07", SecondaryParams::default())
        .await
        .unwrap());

    // Fix the DUT (stronger tone) and try again.
    analyzer.set_marker_power(-10.0);
    assert!(host
        .check("DUT 07", SecondaryParams::default())
        .await
        .unwrap());
}

#[tokio::test]
async fn statuses_reflect_discovery() {
    let bench = bench();
    let dir = tempfile::tempdir().unwrap();
    let result = mock_result(dir.path());
    let host = spawn_host(bench, result);

    use rig_core::capabilities::InstrumentStatus;
    for (_, status) in host.statuses().await.unwrap() {
        assert_eq!(status, InstrumentStatus::Unknown);
    }

    host.connect(Default::default()).await.unwrap();
    for (_, status) in host.statuses().await.unwrap() {
        assert_eq!(status, InstrumentStatus::Ready);
    }
}
