//! Run a full check/measure cycle against the mock bench.
//!
//! ```bash
//! cargo run -p rig-engine --example mock_bench
//! ```

use anyhow::Result;
use rig_core::config::catalog_from_str;
use rig_core::driver::DriverFactory;
use rig_core::params::SecondaryParams;
use rig_engine::{
    ExecutionHost, InstrumentRack, MeasureResult, ReferenceSource, ReferenceTable, SequenceEngine,
};
use rig_driver_mock::{MockAnalyzerFactory, MockGeneratorFactory, MockSourceFactory};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const CATALOG: &str = r#"
    [device."DUT 01"]
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
    index = 1
    columns = [
        { label = "F1, GHz", span = 0.0, step = 0.0, mean = 1.15 },
        { label = "Kp, dB", span = 0.5, step = 0.05, mean = 12.0 },
        { label = "P1dB, dBm", span = 1.0, step = 0.1, mean = 23.0 },
        { label = "IIP3, dBm" },
    ]
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    // Assemble the bench from driver factories, the way a live bench would
    // be built from config.
    let source = MockSourceFactory
        .build(toml::Value::Table(toml::toml! {
            addr = "GPIB0::5::INSTR"
            drawn_current_ma = 10.0
        }))
        .await?
        .source
        .ok_or_else(|| anyhow::anyhow!("factory produced no source"))?;
    let gen1 = MockGeneratorFactory
        .build(toml::Value::Table(toml::toml! {
            addr = "GPIB0::19::INSTR"
            label = "gen1"
        }))
        .await?
        .generator
        .ok_or_else(|| anyhow::anyhow!("factory produced no generator"))?;
    let gen2 = MockGeneratorFactory
        .build(toml::Value::Table(toml::toml! {
            addr = "GPIB0::20::INSTR"
            label = "gen2"
        }))
        .await?
        .generator
        .ok_or_else(|| anyhow::anyhow!("factory produced no generator"))?;
    let analyzer = MockAnalyzerFactory
        .build(toml::Value::Table(toml::toml! {
            addr = "GPIB0::9::INSTR"
            marker_power_dbm = -10.0
        }))
        .await?
        .analyzer
        .ok_or_else(|| anyhow::anyhow!("factory produced no analyzer"))?;
    let rack = InstrumentRack::new(source, gen1, gen2, analyzer);

    // One reference table file in a scratch directory, as the mock result
    // model expects.
    let ref_dir = std::env::temp_dir().join("rig-mock-bench-reference");
    std::fs::create_dir_all(&ref_dir)?;
    for entry in std::fs::read_dir(&ref_dir)? {
        std::fs::remove_file(entry?.path())?;
    }
    let mut file = std::fs::File::create(ref_dir.join("batch.toml"))?;
    file.write_all(REFERENCE.as_bytes())?;

    let catalog = Arc::new(catalog_from_str(CATALOG)?);
    let engine = SequenceEngine::new(catalog).with_settle(Duration::from_millis(10));
    let result = MeasureResult::mock(
        ReferenceSource::new(&ref_dir),
        ReferenceTable::load(&ref_dir.join("batch.toml"))?,
        None,
    );
    let host = ExecutionHost::spawn(rack, engine, result);

    let found = host.connect(Default::default()).await?;
    println!("bench discovered: {found}");

    let secondary = SecondaryParams { important: false };
    let present = host.check("DUT 01", secondary).await?;
    println!("DUT present: {present}");

    if present {
        let ready = host.measure("DUT 01", secondary).await?;
        println!("measure ready: {ready}");

        let snapshot = host.result().await?;
        for (header, value) in snapshot.headers.iter().zip(snapshot.data.iter()) {
            println!("  {header:12} = {value}");
        }
    }

    Ok(())
}
