use download_badges::aggregate::AggregateState;
use download_badges::types::{
    Metric, PackageId, PackageVariant, Provider, StatFact, StatWindow, Submission, VariantPolicy,
};
use std::sync::Arc;

/// Tests for concurrent aggregation
///
/// Final totals and rankings must not depend on the order tasks complete in.

fn submissions() -> Vec<Submission> {
    ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"]
        .iter()
        .enumerate()
        .map(|(ordinal, id)| Submission {
            ordinal,
            package: PackageId::new(format!("@fontsource/{}", id)),
            catalog_id: id.to_string(),
            variant: PackageVariant::Standard,
        })
        .collect()
}

fn facts_for(submission: &Submission) -> Vec<StatFact> {
    let base = 100 * (submission.ordinal as u64 % 3 + 1);
    vec![
        StatFact {
            package: submission.package.clone(),
            provider: Provider::Npm,
            window: StatWindow::Month,
            downloads: base,
        },
        StatFact {
            package: submission.package.clone(),
            provider: Provider::Npm,
            window: StatWindow::CumulativeRange,
            downloads: base * 12,
        },
        StatFact {
            package: submission.package.clone(),
            provider: Provider::Cdn,
            window: StatWindow::Month,
            downloads: base / 2,
        },
    ]
}

/// Record every submission's facts from its own task, in `order`
async fn record_concurrently(order: &[usize]) -> Arc<AggregateState> {
    let state = Arc::new(AggregateState::new(VariantPolicy::Merge));
    let all = submissions();

    let handles: Vec<_> = order
        .iter()
        .map(|&i| {
            let state = Arc::clone(&state);
            let submission = all[i].clone();
            tokio::spawn(async move {
                for fact in facts_for(&submission) {
                    tokio::task::yield_now().await;
                    state.record(&submission, &fact);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
    state
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completion_order_does_not_change_result() {
    let orders: [[usize; 6]; 4] = [
        [0, 1, 2, 3, 4, 5],
        [5, 4, 3, 2, 1, 0],
        [2, 5, 0, 3, 1, 4],
        [1, 3, 5, 0, 2, 4],
    ];

    let baseline = record_concurrently(&orders[0]).await.snapshot();
    for order in &orders[1..] {
        let snapshot = record_concurrently(order).await.snapshot();
        assert_eq!(snapshot, baseline, "order {:?} diverged", order);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_totals_equal_sum_of_facts() {
    let state = record_concurrently(&[0, 1, 2, 3, 4, 5]).await;

    let expected_month: u64 = submissions()
        .iter()
        .flat_map(facts_for)
        .filter(|f| f.provider == Provider::Npm && f.window == StatWindow::Month)
        .map(|f| f.downloads)
        .sum();

    assert_eq!(state.total(Provider::Npm, Metric::Month), expected_month);
    assert_eq!(state.total(Provider::Npm, Metric::Total), expected_month * 12);
    assert_eq!(state.fact_count(), 18);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_equal_counts_rank_in_catalog_order() {
    let snapshot = record_concurrently(&[5, 4, 3, 2, 1, 0]).await.snapshot();
    let names: Vec<&str> = snapshot
        .ranking(Provider::Npm, Metric::Month)
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();

    // ordinals 2 and 5 share the top count, then 1 and 4, then 0 and 3
    assert_eq!(names, vec!["gamma", "zeta", "beta", "epsilon", "alpha", "delta"]);
}

#[test]
fn test_failed_provider_contributes_nothing() {
    let state = AggregateState::new(VariantPolicy::Merge);
    let all = submissions();

    // only npm facts for alpha, as if its CDN adapter failed
    for fact in facts_for(&all[0]).into_iter().filter(|f| f.provider == Provider::Npm) {
        state.record(&all[0], &fact);
    }

    let snapshot = state.snapshot();
    assert!(snapshot.has_provider(Provider::Npm));
    assert!(!snapshot.has_provider(Provider::Cdn));
    assert_eq!(snapshot.total(Provider::Cdn, Metric::Month), 0);
}
