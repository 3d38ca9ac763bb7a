use crate::config::CdnConfig;
use crate::errors::FetchResult;
use crate::fetch::RateLimitedFetcher;
use crate::sources::{checked_sum, decode, StatSource};
use crate::types::{PackageId, Provider, StatFact, StatWindow};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CdnStats {
    hits: CdnHits,
}

#[derive(Debug, Deserialize)]
struct CdnHits {
    total: u64,
}

/// jsDelivr hit counts for the last month and the last two rolling years
///
/// The cumulative fact is the current rolling year plus the prior one,
/// combined here so the aggregator only ever sees a single total.
pub struct CdnSource {
    fetcher: RateLimitedFetcher,
    base_url: String,
    month_period: String,
    year_period: String,
    prior_year_period: String,
}

impl CdnSource {
    pub fn new(fetcher: RateLimitedFetcher, config: &CdnConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            month_period: config.month_period.clone(),
            year_period: config.year_period.clone(),
            prior_year_period: config.prior_year_period.clone(),
        }
    }

    pub fn url(&self, package: &PackageId, window: StatWindow) -> String {
        let period = match window {
            StatWindow::Month => &self.month_period,
            StatWindow::RollingYear | StatWindow::CumulativeRange => &self.year_period,
            StatWindow::RollingYearPrior => &self.prior_year_period,
        };
        format!(
            "{}/stats/packages/npm/{}?period={}",
            self.base_url, package, period
        )
    }

    async fn hits(&self, package: &PackageId, window: StatWindow) -> FetchResult<u64> {
        let url = self.url(package, window);
        let body = self.fetcher.fetch(&url).await?;
        let stats: CdnStats = decode(&url, body)?;
        Ok(stats.hits.total)
    }
}

impl StatSource for CdnSource {
    fn provider(&self) -> Provider {
        Provider::Cdn
    }

    fn collect<'a>(&'a self, package: &'a PackageId) -> BoxFuture<'a, FetchResult<Vec<StatFact>>> {
        async move {
            let month = self.hits(package, StatWindow::Month).await?;
            let year = self.hits(package, StatWindow::RollingYear).await?;
            let prior = self.hits(package, StatWindow::RollingYearPrior).await?;
            let total = checked_sum(&self.url(package, StatWindow::RollingYear), year, prior)?;

            Ok(vec![
                StatFact {
                    package: package.clone(),
                    provider: Provider::Cdn,
                    window: StatWindow::Month,
                    downloads: month,
                },
                StatFact {
                    package: package.clone(),
                    provider: Provider::Cdn,
                    window: StatWindow::CumulativeRange,
                    downloads: total,
                },
            ])
        }
        .boxed()
    }
}
