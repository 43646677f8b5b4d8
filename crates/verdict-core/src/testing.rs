//! Assertion helpers for using suites inside `#[tokio::test]` functions.
//!
//! ```ignore
//! let result = suite.run().await;
//! assert_min_mean(&result, "exact_match", 0.8)?;
//! ```

use anyhow::Result;
use verdict_types::EvalSuiteResult;

/// Fail unless the named metric's mean meets a minimum.
pub fn assert_min_mean(result: &EvalSuiteResult, metric: &str, min: f64) -> Result<()> {
    let Some(agg) = result.aggregated.get(metric) else {
        anyhow::bail!("metric '{}' not found in results", metric);
    };
    if agg.mean < min {
        anyhow::bail!(
            "metric '{}' mean {:.3} is below threshold {:.3}\n{}",
            metric,
            agg.mean,
            min,
            result.summary_table()
        );
    }
    Ok(())
}

/// Fail if any case recorded an error.
pub fn assert_all_completed(result: &EvalSuiteResult) -> Result<()> {
    let failed: Vec<usize> = result
        .results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.error.is_some())
        .map(|(i, _)| i)
        .collect();
    if !failed.is_empty() {
        anyhow::bail!(
            "{}/{} cases failed (indices {:?})\n{}",
            failed.len(),
            result.stats.total,
            failed,
            result.summary_table()
        );
    }
    Ok(())
}

/// Fail if any configured assertion did not pass.
pub fn assert_no_failed_assertions(result: &EvalSuiteResult) -> Result<()> {
    let failed: Vec<&str> = result
        .assertions
        .iter()
        .filter(|a| !a.passed)
        .map(|a| a.name.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("failed assertions: {}\n{}", failed.join(", "), result.summary_table());
    }
    Ok(())
}
