use std::collections::BTreeMap;
use std::time::Duration;

use tickerflow_core::StageName;
use tickerflow_exec::executor::concurrency::ConcurrencyLimits;

#[tokio::test]
async fn global_limit_blocks_until_release() {
    let limits = ConcurrencyLimits::new(2, &BTreeMap::new());
    let p1 = limits.acquire(StageName::Ingestion).await.unwrap();
    let _p2 = limits.acquire(StageName::Indicators).await.unwrap();

    let blocked = tokio::time::timeout(Duration::from_millis(30), limits.acquire(StageName::Signals)).await;
    assert!(blocked.is_err());

    drop(p1);
    let p3 = tokio::time::timeout(Duration::from_millis(200), limits.acquire(StageName::Signals)).await;
    assert!(p3.is_ok());
}

#[tokio::test]
async fn per_stage_limit_leaves_other_stages_free() {
    let mut per_stage = BTreeMap::new();
    per_stage.insert(StageName::FinancialData, 1);
    let limits = ConcurrencyLimits::new(10, &per_stage);

    let p1 = limits.acquire(StageName::FinancialData).await.unwrap();
    let blocked =
        tokio::time::timeout(Duration::from_millis(30), limits.acquire(StageName::FinancialData)).await;
    assert!(blocked.is_err());

    let _a = limits.acquire(StageName::Indicators).await.unwrap();
    let _b = limits.acquire(StageName::Indicators).await.unwrap();

    drop(p1);
    assert!(limits.acquire(StageName::FinancialData).await.is_ok());
}
