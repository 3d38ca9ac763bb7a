use crate::common::{run_date, test_config, write_catalog, ScriptedTransport};
use anyhow::Result;
use download_badges::config::AppConfig;
use download_badges::errors::AppError;
use download_badges::pipeline::{RunDecision, StatsRun};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Tests for the monotonic write gate
///
/// Outputs move only when the npm cumulative total strictly grows; any
/// other outcome leaves every previously written file as it was.

const CATALOG: &str = r#"{"alpha": false, "beta": true}"#;

fn transport(scale: u64) -> Arc<ScriptedTransport> {
    let transport = ScriptedTransport::new();
    transport.npm("@fontsource/alpha", 100 * scale, 1_000 * scale);
    transport.npm("@fontsource/beta", 200 * scale, 2_000 * scale);
    transport.npm("@fontsource-variable/beta", 50 * scale, 500 * scale);
    Arc::new(transport)
}

fn config(dir: &Path) -> AppConfig {
    write_catalog(dir, CATALOG);
    let mut config = test_config(dir);
    config.cdn.enabled = false;
    config
}

async fn run(config: &AppConfig, transport: Arc<ScriptedTransport>) -> Result<RunDecision> {
    let outcome = StatsRun::from_config(config, transport, run_date())?
        .execute()
        .await?;
    Ok(outcome.decision)
}

fn read(dir: &Path, file: &str) -> String {
    fs::read_to_string(dir.join("out").join(file)).unwrap()
}

#[tokio::test]
async fn test_identical_rerun_leaves_outputs_untouched() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(dir.path());

    run(&config, transport(1)).await?;
    let totals = read(dir.path(), "totals.json");
    let badge = read(dir.path(), "badges/npm-month.json");

    let decision = run(&config, transport(1)).await?;
    assert_eq!(
        decision,
        RunDecision::Unchanged {
            previous: 3_500,
            current: 3_500
        }
    );
    // generatedAt would differ on a rewrite
    assert_eq!(read(dir.path(), "totals.json"), totals);
    assert_eq!(read(dir.path(), "badges/npm-month.json"), badge);
    Ok(())
}

#[tokio::test]
async fn test_growth_replaces_outputs() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(dir.path());

    run(&config, transport(1)).await?;
    let decision = run(&config, transport(2)).await?;

    assert_eq!(
        decision,
        RunDecision::Updated {
            previous: 3_500,
            current: 7_000
        }
    );
    assert!(read(dir.path(), "badges/npm-month.json").contains("700/month"));
    assert!(read(dir.path(), "badges/npm-total.json").contains("\"7K\""));
    Ok(())
}

#[tokio::test]
async fn test_smaller_total_never_overwrites() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(dir.path());

    run(&config, transport(2)).await?;
    let before = read(dir.path(), "rankings/npm-month.json");

    let decision = run(&config, transport(1)).await?;
    assert!(matches!(decision, RunDecision::Unchanged { previous: 7_000, .. }));
    assert_eq!(read(dir.path(), "rankings/npm-month.json"), before);
    Ok(())
}

#[tokio::test]
async fn test_previous_larger_total_blocks_first_write() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(dir.path());
    let out = dir.path().join("out");
    fs::create_dir_all(&out)?;
    fs::write(
        out.join("totals.json"),
        r#"{"schemaVersion":1,"generatedAt":"2024-01-01T00:00:00Z","providers":{"npm":{"month":1,"total":1000000000}}}"#,
    )?;

    let decision = run(&config, transport(1)).await?;

    assert!(matches!(decision, RunDecision::Unchanged { .. }));
    assert!(!out.join("badges").exists());
    assert!(!out.join("rankings").exists());
    Ok(())
}

#[tokio::test]
async fn test_malformed_totals_aborts_before_any_request() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(dir.path());
    let out = dir.path().join("out");
    fs::create_dir_all(&out)?;
    fs::write(out.join("totals.json"), "{ not json")?;

    let transport = transport(1);
    let result = StatsRun::from_config(&config, transport.clone(), run_date())?
        .execute()
        .await;

    assert!(matches!(result, Err(AppError::Snapshot(_))));
    assert!(transport.calls().is_empty());
    assert_eq!(fs::read_to_string(out.join("totals.json"))?, "{ not json");
    Ok(())
}

#[tokio::test]
async fn test_dry_run_reports_but_writes_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config(dir.path());

    let outcome = StatsRun::from_config(&config, transport(1), run_date())?
        .dry_run(true)
        .execute()
        .await?;

    assert_eq!(
        outcome.decision,
        RunDecision::DryRun {
            previous: 0,
            current: 3_500,
            would_update: true
        }
    );
    assert!(!dir.path().join("out").exists());
    Ok(())
}
