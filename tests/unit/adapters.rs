use crate::common::{run_date, ScriptedTransport, RUN_DATE};
use anyhow::Result;
use download_badges::config::{CdnConfig, FetchConfig, NpmConfig};
use download_badges::errors::FetchError;
use download_badges::fetch::{HttpResponse, RateLimitedFetcher};
use download_badges::sources::{CdnSource, NpmSource, StatSource};
use download_badges::types::{PackageId, Provider, StatWindow};
use std::sync::Arc;

fn fast_fetch() -> FetchConfig {
    FetchConfig {
        rate_limit_backoff_ms: 1,
        max_rate_limit_retries: Some(3),
        ..FetchConfig::default()
    }
}

fn npm_source(transport: Arc<ScriptedTransport>, start: &str) -> NpmSource {
    let config = NpmConfig {
        cumulative_start: start.to_string(),
        max_range_days: 20,
        ..NpmConfig::default()
    };
    let start = config.cumulative_start_date().unwrap();
    NpmSource::new(
        RateLimitedFetcher::new(transport, &fast_fetch()),
        &config,
        start,
        run_date(),
    )
}

fn cdn_source(transport: Arc<ScriptedTransport>) -> CdnSource {
    CdnSource::new(
        RateLimitedFetcher::new(transport, &fast_fetch()),
        &CdnConfig::default(),
    )
}

#[tokio::test]
async fn test_npm_cumulative_sums_every_chunk() -> Result<()> {
    let pkg = PackageId::new("@fontsource/alpha");
    let transport = Arc::new(ScriptedTransport::new());
    transport.ok("last-month/@fontsource/alpha", r#"{"downloads": 40}"#);
    // 2024-01-01..=2024-01-31 in 20-day chunks: two range requests
    transport.ok(
        "2024-01-20/@fontsource/alpha",
        r#"{"downloads":[{"downloads":5,"day":"2024-01-01"},{"downloads":6,"day":"2024-01-02"}]}"#,
    );
    transport.ok(
        format!("{}/@fontsource/alpha", RUN_DATE),
        r#"{"downloads":[{"downloads":100,"day":"2024-01-21"}]}"#,
    );

    let facts = npm_source(transport.clone(), "2024-01-01").collect(&pkg).await?;

    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].window, StatWindow::Month);
    assert_eq!(facts[0].downloads, 40);
    assert_eq!(facts[1].window, StatWindow::CumulativeRange);
    assert_eq!(facts[1].downloads, 111);
    assert!(facts.iter().all(|f| f.provider == Provider::Npm && f.package == pkg));
    assert_eq!(transport.calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_npm_empty_range_is_zero_not_failure() -> Result<()> {
    let pkg = PackageId::new("fontsource-new");
    let transport = Arc::new(ScriptedTransport::new());
    transport.ok("last-month/fontsource-new", r#"{"downloads": 0}"#);
    transport.ok("/fontsource-new", r#"{"downloads": []}"#);

    let facts = npm_source(transport, "2024-01-15").collect(&pkg).await?;
    assert_eq!(facts[1].downloads, 0);
    Ok(())
}

#[tokio::test]
async fn test_npm_missing_count_is_bad_response() {
    let pkg = PackageId::new("@fontsource/alpha");
    let transport = Arc::new(ScriptedTransport::new());
    transport.ok("last-month/@fontsource/alpha", r#"{"error": "package not found"}"#);

    let err = npm_source(transport, "2024-01-01")
        .collect(&pkg)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::BadResponse { .. }));
}

#[tokio::test]
async fn test_npm_failed_chunk_fails_whole_provider() {
    let pkg = PackageId::new("@fontsource/alpha");
    let transport = Arc::new(ScriptedTransport::new());
    transport.ok("last-month/@fontsource/alpha", r#"{"downloads": 40}"#);
    transport.ok("2024-01-20/@fontsource/alpha", r#"{"downloads":[]}"#);
    transport.route(
        format!("{}/@fontsource/alpha", RUN_DATE),
        vec![Ok(HttpResponse::new(500, ""))],
    );

    let result = npm_source(transport, "2024-01-01").collect(&pkg).await;
    assert!(matches!(result, Err(FetchError::BadStatus { status: 500, .. })));
}

#[tokio::test]
async fn test_cdn_total_is_year_plus_prior_year() -> Result<()> {
    let transport = Arc::new(ScriptedTransport::new());
    transport.cdn("@fontsource/beta", 900, 12_000, 8_000);

    let facts = cdn_source(transport)
        .collect(&PackageId::new("@fontsource/beta"))
        .await?;

    let total = facts
        .iter()
        .find(|f| f.window == StatWindow::CumulativeRange)
        .unwrap();
    assert_eq!(total.downloads, 20_000);
    assert_eq!(total.provider, Provider::Cdn);
    Ok(())
}

#[tokio::test]
async fn test_cdn_prior_year_failure_records_nothing() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.ok("npm/@fontsource/beta?period=month", crate::common::cdn_hits(900));
    transport.ok("npm/@fontsource/beta?period=year", crate::common::cdn_hits(12_000));
    transport.route(
        "npm/@fontsource/beta?period=s-year",
        vec![Err("connection reset by peer".to_string())],
    );

    let result = cdn_source(transport)
        .collect(&PackageId::new("@fontsource/beta"))
        .await;
    assert!(matches!(result, Err(FetchError::Transport { .. })));
}

#[tokio::test]
async fn test_cdn_negative_count_is_bad_response() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.ok("npm/@fontsource/beta?period=month", crate::common::cdn_hits(900));
    transport.ok("npm/@fontsource/beta?period=year", r#"{"hits":{"total":-3}}"#);
    transport.ok("npm/@fontsource/beta?period=s-year", crate::common::cdn_hits(8_000));

    let err = cdn_source(transport)
        .collect(&PackageId::new("@fontsource/beta"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::BadResponse { .. }));
}
