//! End-to-end tests for the extraction pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use harstat_core::metrics::Metric;
use harstat_core::report::to_xlsx;
use harstat_core::{Config, CredentialPool, CredentialStrategy, Error, Oracle, Outcome, Pipeline};

fn fixture(name: &str) -> Vec<u8> {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let base = manifest.parent().unwrap().parent().unwrap();
    std::fs::read(base.join("tests/fixtures/har").join(name)).unwrap()
}

fn single_entry_har(body: &str) -> Vec<u8> {
    serde_json::json!({
        "log": {
            "entries": [{
                "request": { "method": "POST", "url": "https://www.tripadvisor.com/data/graphql/ids" },
                "response": {
                    "status": 200,
                    "content": { "mimeType": "application/json", "text": body }
                }
            }]
        }
    })
    .to_string()
    .into_bytes()
}

const SCENARIO_BODY: &str = r#"[{"data":{"RsOwnerMetrics_x":{"groupDimensionValue":"2024-01-01","metrics":[{"metricType":"RANKING","metricValue":12}]}}}]"#;

/// Answers every prompt with the same completion.
struct CannedOracle(&'static str);

#[async_trait]
impl Oracle for CannedOracle {
    async fn complete(&self, _prompt: &str, _credential: &str) -> harstat_core::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Fails for the "bad" key; otherwise returns one record with a new date.
#[derive(Default)]
struct CountingOracle {
    good: AtomicUsize,
    bad: AtomicUsize,
}

#[async_trait]
impl Oracle for CountingOracle {
    async fn complete(&self, _prompt: &str, credential: &str) -> harstat_core::Result<String> {
        if credential == "bad" {
            self.bad.fetch_add(1, Ordering::SeqCst);
            return Err(Error::oracle("rate limited"));
        }
        let n = self.good.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "```json\n[{{\"Date\": \"2024-01-{:02}\", \"Listing impressions\": {}}}]\n```",
            n + 1,
            n
        ))
    }
}

fn assert_only_ranking(outcome: &Outcome) {
    let table = outcome.table().expect("a table");
    assert_eq!(table.len(), 1);
    let row = &table.rows()[0];
    assert_eq!(row.date_string(), "2024-01-01");
    assert_eq!(row.label, "Site A");
    for metric in Metric::ALL {
        let expected = if metric == Metric::AverageRanking { 12.0 } else { 0.0 };
        assert_eq!(row.get(metric), expected, "{}", metric);
    }
}

#[tokio::test]
async fn test_scenario_with_mapper() -> harstat_core::Result<()> {
    let pipeline = Pipeline::mapper(Config::default())?;
    let outcome = pipeline.run(&single_entry_har(SCENARIO_BODY), "Site A").await?;
    assert_only_ranking(&outcome);
    Ok(())
}

#[tokio::test]
async fn test_scenario_with_oracle() -> harstat_core::Result<()> {
    let oracle = CannedOracle(r#"[{"Date":"2024-01-01","Label":"Site A","Average ranking":12}]"#);
    let pipeline = Pipeline::with_oracle(
        Config::default(),
        Arc::new(oracle),
        CredentialPool::new(["key"])?,
    )?;
    let outcome = pipeline.run(&single_entry_har(SCENARIO_BODY), "Site A").await?;
    assert_only_ranking(&outcome);
    Ok(())
}

#[tokio::test]
async fn test_fixture_with_mapper() -> harstat_core::Result<()> {
    let pipeline = Pipeline::mapper(Config::default())?;
    let outcome = pipeline.run(&fixture("metrics.har"), "Site A").await?;
    let table = outcome.into_table().expect("a table");

    let dates: Vec<String> = table.rows().iter().map(|r| r.date_string()).collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);

    let first = &table.rows()[0];
    assert_eq!(first.get(Metric::ListingImpressions), 120.0);
    assert_eq!(first.get(Metric::AverageRanking), 12.0);
    assert_eq!(first.get(Metric::BookingClicks), 1.0);

    let second = &table.rows()[1];
    assert_eq!(second.get(Metric::AverageBubbleRating), 4.5);
    assert_eq!(second.get(Metric::AverageBookingLeadTime), 131.5);

    // Comes from the base64 encoded entry.
    let third = &table.rows()[2];
    assert_eq!(third.get(Metric::NewReviews), 2.0);
    assert_eq!(third.get(Metric::AverageBookingLength), 2.5);

    let bytes = to_xlsx(&table)?;
    assert!(bytes.starts_with(b"PK"));
    Ok(())
}

#[tokio::test]
async fn test_failing_chunks_do_not_abort_others() -> harstat_core::Result<()> {
    let oracle = Arc::new(CountingOracle::default());
    let config = Config {
        chunk_size: 200,
        credential_strategy: CredentialStrategy::RoundRobin,
        ..Config::default()
    };
    let pipeline = Pipeline::with_oracle(
        config,
        oracle.clone(),
        CredentialPool::new(["good", "bad"])?,
    )?;
    assert_eq!(pipeline.workers(), 2);

    let outcome = pipeline.run(&fixture("metrics.har"), "Site A").await?;
    let table = outcome.into_table().expect("a table");

    let good = oracle.good.load(Ordering::SeqCst);
    let bad = oracle.bad.load(Ordering::SeqCst);
    assert!(good >= 1);
    assert!(bad >= 3);
    // Every chunk on the failing key burns all of its attempts.
    assert_eq!(bad % 3, 0);
    // Chunks alternate between the keys.
    assert!(good == bad / 3 || good == bad / 3 + 1);
    assert_eq!(table.len(), good);

    let dates: Vec<String> = table.rows().iter().map(|r| r.date_string()).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    Ok(())
}

#[tokio::test]
async fn test_sequential_strategy_recovers_with_second_key() -> harstat_core::Result<()> {
    let oracle = Arc::new(CountingOracle::default());
    let config = Config {
        credential_strategy: CredentialStrategy::Sequential,
        ..Config::default()
    };
    let pipeline = Pipeline::with_oracle(
        config,
        oracle.clone(),
        CredentialPool::new(["bad", "good"])?,
    )?;
    let outcome = pipeline.run(&fixture("metrics.har"), "Site A").await?;
    let table = outcome.into_table().expect("a table");
    assert_eq!(table.len(), 1);
    assert_eq!(oracle.bad.load(Ordering::SeqCst), 1);
    assert_eq!(oracle.good.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_extraction_is_no_records() -> harstat_core::Result<()> {
    let pipeline = Pipeline::with_oracle(
        Config::default(),
        Arc::new(CannedOracle("I could not find any data.")),
        CredentialPool::new(["key"])?,
    )?;
    let outcome = pipeline.run(&fixture("metrics.har"), "Site A").await?;
    assert_eq!(outcome, Outcome::NoRecords { entries: 2 });
    Ok(())
}

#[tokio::test]
async fn test_capture_without_metrics() -> harstat_core::Result<()> {
    let pipeline = Pipeline::mapper(Config::default())?;
    let outcome = pipeline
        .run(&single_entry_har(r#"{"data":{"viewer":{"id":1}}}"#), "Site A")
        .await?;
    assert_eq!(outcome, Outcome::NoEntries);
    Ok(())
}
