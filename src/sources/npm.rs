use crate::config::NpmConfig;
use crate::errors::{FetchError, FetchResult};
use crate::fetch::RateLimitedFetcher;
use crate::sources::{checked_sum, decode, StatSource};
use crate::types::{PackageId, Provider, StatFact, StatWindow};
use crate::utils::time::{date_chunks, iso_date};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;

/// `/downloads/point/...` response
#[derive(Debug, Deserialize)]
struct NpmPoint {
    downloads: u64,
}

/// `/downloads/range/...` response
#[derive(Debug, Deserialize)]
struct NpmRange {
    downloads: Vec<NpmDay>,
}

#[derive(Debug, Deserialize)]
struct NpmDay {
    downloads: u64,
}

/// npm registry download counts: last month plus a summed cumulative range
pub struct NpmSource {
    fetcher: RateLimitedFetcher,
    base_url: String,
    ranges: Vec<(NaiveDate, NaiveDate)>,
}

impl NpmSource {
    /// `run_date` closes the cumulative range; it is fixed for the whole run
    pub fn new(
        fetcher: RateLimitedFetcher,
        config: &NpmConfig,
        start: NaiveDate,
        run_date: NaiveDate,
    ) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ranges: date_chunks(start, run_date, config.max_range_days),
        }
    }

    pub fn month_url(&self, package: &PackageId) -> String {
        format!("{}/downloads/point/last-month/{}", self.base_url, package)
    }

    pub fn range_urls(&self, package: &PackageId) -> Vec<String> {
        self.ranges
            .iter()
            .map(|(start, end)| {
                format!(
                    "{}/downloads/range/{}:{}/{}",
                    self.base_url,
                    iso_date(*start),
                    iso_date(*end),
                    package
                )
            })
            .collect()
    }

    async fn month(&self, package: &PackageId) -> FetchResult<u64> {
        let url = self.month_url(package);
        let body = self.fetcher.fetch(&url).await?;
        let point: NpmPoint = decode(&url, body)?;
        Ok(point.downloads)
    }

    async fn cumulative(&self, package: &PackageId) -> FetchResult<u64> {
        let urls = self.range_urls(package);
        if urls.is_empty() {
            return Err(FetchError::BadResponse {
                url: format!("{}/downloads/range/{}", self.base_url, package),
                reason: "cumulative range is empty, start is after the run date".to_string(),
            });
        }

        let mut total = 0u64;
        for url in urls {
            let body = self.fetcher.fetch(&url).await?;
            let range: NpmRange = decode(&url, body)?;
            for day in range.downloads {
                total = checked_sum(&url, total, day.downloads)?;
            }
        }
        Ok(total)
    }

    fn fact(package: &PackageId, window: StatWindow, downloads: u64) -> StatFact {
        StatFact {
            package: package.clone(),
            provider: Provider::Npm,
            window,
            downloads,
        }
    }
}

impl StatSource for NpmSource {
    fn provider(&self) -> Provider {
        Provider::Npm
    }

    fn collect<'a>(&'a self, package: &'a PackageId) -> BoxFuture<'a, FetchResult<Vec<StatFact>>> {
        async move {
            let month = self.month(package).await?;
            let cumulative = self.cumulative(package).await?;
            Ok(vec![
                Self::fact(package, StatWindow::Month, month),
                Self::fact(package, StatWindow::CumulativeRange, cumulative),
            ])
        }
        .boxed()
    }
}
