//! Pure statistics over score vectors: percentile aggregation, a paired
//! t-test, and McNemar's discordant-pairs test for binary outcomes.
//!
//! The special functions (Lanczos log-gamma, continued-fraction regularized
//! incomplete beta, Abramowitz–Stegun erf) are self-contained so the crate
//! needs no numerics dependency.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use verdict_types::AggregatedMetric;

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("paired samples must have equal length (left {left}, right {right})")]
    LengthMismatch { left: usize, right: usize },
    #[error("need at least 2 paired samples, got {n}")]
    TooFewSamples { n: usize },
}

/// Result of a paired t-test on per-case score differences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTestResult {
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub mean_difference: f64,
    /// 95% confidence interval for the mean difference.
    pub confidence_interval: (f64, f64),
    pub significant: bool,
}

/// Result of McNemar's test on discordant-pair counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McNemarResult {
    pub chi_square: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Linear-interpolated percentile. Sorts a copy; the input is never
/// mutated. Empty input yields 0, a singleton yields its sole element.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 0.5)
}

/// Sample standard deviation (Bessel-corrected). Returns 0 for n < 2.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Bundle mean/median/min/max/std_dev/p50/p95/p99 for one metric's scores.
/// Empty input yields the all-zero struct.
pub fn aggregate(name: &str, values: &[f64]) -> AggregatedMetric {
    if values.is_empty() {
        return AggregatedMetric::zero(name);
    }
    AggregatedMetric {
        name: name.to_string(),
        mean: mean(values),
        median: median(values),
        min: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        std_dev: std_dev(values),
        p50: percentile(values, 0.50),
        p95: percentile(values, 0.95),
        p99: percentile(values, 0.99),
    }
}

/// Two-tailed paired t-test on per-pair differences `a[i] - b[i]`.
///
/// Swapping the arguments flips the sign of the t-statistic and preserves
/// the p-value. Errors on mismatched lengths or fewer than 2 pairs.
pub fn paired_t_test(a: &[f64], b: &[f64]) -> Result<TTestResult, StatsError> {
    if a.len() != b.len() {
        return Err(StatsError::LengthMismatch { left: a.len(), right: b.len() });
    }
    if a.len() < 2 {
        return Err(StatsError::TooFewSamples { n: a.len() });
    }

    let n = a.len() as f64;
    let diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
    let mean_d = mean(&diffs);
    let sd_d = std_dev(&diffs);
    let df = n - 1.0;

    if sd_d == 0.0 {
        // All differences identical: either no effect at all, or a constant
        // shift that no finite-variance test can reject.
        return Ok(if mean_d == 0.0 {
            TTestResult {
                t_statistic: 0.0,
                degrees_of_freedom: df,
                p_value: 1.0,
                mean_difference: 0.0,
                confidence_interval: (0.0, 0.0),
                significant: false,
            }
        } else {
            TTestResult {
                t_statistic: mean_d.signum() * f64::INFINITY,
                degrees_of_freedom: df,
                p_value: 0.0,
                mean_difference: mean_d,
                confidence_interval: (mean_d, mean_d),
                significant: true,
            }
        });
    }

    let se = sd_d / n.sqrt();
    let t = mean_d / se;
    let p_value = t_two_tailed_p(t, df);
    let t_crit = t_quantile(0.975, df);
    let margin = t_crit * se;

    Ok(TTestResult {
        t_statistic: t,
        degrees_of_freedom: df,
        p_value,
        mean_difference: mean_d,
        confidence_interval: (mean_d - margin, mean_d + margin),
        significant: p_value < 0.05,
    })
}

/// McNemar's test with Yates' continuity correction.
///
/// `b` and `c` are discordant-pair counts: cases where exactly one of the
/// two paired binary outcomes was correct.
pub fn mcnemars_test(b: u64, c: u64) -> McNemarResult {
    let total = (b + c) as f64;
    if total == 0.0 {
        return McNemarResult { chi_square: 0.0, p_value: 1.0, significant: false };
    }
    let num = (b as f64 - c as f64).abs() - 1.0;
    let chi_square = num * num / total;
    // One-df chi-square is Z squared, so the survival function reduces to
    // a single erfc evaluation.
    let p_value = erfc((chi_square / 2.0).sqrt());
    McNemarResult { chi_square, p_value, significant: p_value < 0.05 }
}

/// Two-tailed p-value for Student's t with `df` degrees of freedom.
fn t_two_tailed_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    inc_beta(df / 2.0, 0.5, df / (df + t * t))
}

/// Student-t CDF at `t` (upper half handled via symmetry).
fn t_cdf(t: f64, df: f64) -> f64 {
    let half_p = 0.5 * t_two_tailed_p(t, df);
    if t >= 0.0 {
        1.0 - half_p
    } else {
        half_p
    }
}

/// Invert the t CDF by bisection. `p` must be in (0.5, 1).
fn t_quantile(p: f64, df: f64) -> f64 {
    let mut hi = 2.0;
    while t_cdf(hi, df) < p && hi < 1e12 {
        hi *= 2.0;
    }
    let mut lo = 0.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Lanczos approximation of ln Γ(x), g = 7.
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    if x < 0.5 {
        // Reflection formula.
        let pi = std::f64::consts::PI;
        (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut a = COEF[0];
        for (i, c) in COEF.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        let t = x + 7.5;
        0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
    }
}

/// Continued fraction for the incomplete beta function (Lentz's method).
fn betacf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3e-14;
    const FPMIN: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta `I_x(a, b)`.
fn inc_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_bt = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let bt = ln_bt.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * betacf(a, b, x) / a
    } else {
        1.0 - bt * betacf(b, a, 1.0 - x) / b
    }
}

/// Error function, Abramowitz & Stegun 7.1.26 rational approximation.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

fn erfc(x: f64) -> f64 {
    1.0 - erf(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_does_not_mutate_input() {
        let values = vec![5.0, 1.0, 3.0];
        let _ = percentile(&values, 0.5);
        assert_eq!(values, vec![5.0, 1.0, 3.0]);
    }

    #[test]
    fn percentile_bounds_are_min_and_max() {
        let values = vec![0.3, 0.9, 0.1, 0.7];
        assert_eq!(percentile(&values, 0.0), 0.1);
        assert_eq!(percentile(&values, 1.0), 0.9);
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 0.5) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn percentile_edge_inputs() {
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[0.42], 0.95), 0.42);
    }

    #[test]
    fn std_dev_is_sample_corrected() {
        assert_eq!(std_dev(&[1.0]), 0.0);
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.13809).abs() < 1e-4);
    }

    #[test]
    fn aggregate_empty_is_all_zero() {
        let agg = aggregate("m", &[]);
        for field in ["mean", "median", "min", "max", "std_dev", "p50", "p95", "p99"] {
            assert_eq!(agg.field(field), Some(0.0), "{field} should be 0");
        }
    }

    #[test]
    fn aggregate_bundles_consistent_fields() {
        let values = vec![0.2, 0.4, 0.6, 0.8, 1.0];
        let agg = aggregate("m", &values);
        assert!((agg.mean - 0.6).abs() < 1e-12);
        assert_eq!(agg.min, 0.2);
        assert_eq!(agg.max, 1.0);
        assert_eq!(agg.median, agg.p50);
    }

    #[test]
    fn paired_t_test_identical_samples() {
        let a = vec![0.1, 0.5, 0.9, 0.3];
        let r = paired_t_test(&a, &a).unwrap();
        assert_eq!(r.t_statistic, 0.0);
        assert_eq!(r.p_value, 1.0);
        assert!(!r.significant);
        assert_eq!(r.confidence_interval, (0.0, 0.0));
    }

    #[test]
    fn paired_t_test_is_symmetric() {
        let a = vec![0.9, 0.8, 0.95, 0.85, 0.9];
        let b = vec![0.5, 0.6, 0.55, 0.5, 0.65];
        let ab = paired_t_test(&a, &b).unwrap();
        let ba = paired_t_test(&b, &a).unwrap();
        assert!((ab.p_value - ba.p_value).abs() < 1e-12);
        assert!((ab.t_statistic + ba.t_statistic).abs() < 1e-12);
    }

    #[test]
    fn paired_t_test_detects_clear_separation() {
        let a = vec![0.9, 0.85, 0.95, 0.9, 0.92];
        let b = vec![0.5, 0.55, 0.45, 0.5, 0.52];
        let r = paired_t_test(&a, &b).unwrap();
        assert!(r.significant);
        assert!(r.p_value < 0.01);
        assert!(r.t_statistic > 0.0);
    }

    #[test]
    fn paired_t_test_constant_shift_is_degenerate() {
        let a = vec![0.5, 0.6, 0.7];
        let b = vec![0.4, 0.5, 0.6];
        let r = paired_t_test(&a, &b).unwrap();
        assert_eq!(r.t_statistic, f64::INFINITY);
        assert_eq!(r.p_value, 0.0);
        assert!(r.significant);
    }

    #[test]
    fn paired_t_test_rejects_bad_input() {
        assert!(matches!(
            paired_t_test(&[1.0, 2.0], &[1.0]),
            Err(StatsError::LengthMismatch { left: 2, right: 1 })
        ));
        assert!(matches!(
            paired_t_test(&[1.0], &[1.0]),
            Err(StatsError::TooFewSamples { n: 1 })
        ));
    }

    #[test]
    fn t_distribution_matches_table_values() {
        // Two-tailed p at the textbook 0.05 critical value for df = 4.
        let p = t_two_tailed_p(2.776445, 4.0);
        assert!((p - 0.05).abs() < 1e-3, "p = {p}");
        let q = t_quantile(0.975, 4.0);
        assert!((q - 2.776445).abs() < 1e-3, "q = {q}");
    }

    #[test]
    fn mcnemar_degenerate_is_tie() {
        let r = mcnemars_test(0, 0);
        assert_eq!(r.chi_square, 0.0);
        assert_eq!(r.p_value, 1.0);
        assert!(!r.significant);
    }

    #[test]
    fn mcnemar_single_discordant_pair_is_not_significant() {
        // Yates correction zeroes the statistic at b=1, c=0.
        let r = mcnemars_test(1, 0);
        assert_eq!(r.chi_square, 0.0);
        assert!(!r.significant);
    }

    #[test]
    fn mcnemar_detects_lopsided_disagreement() {
        let r = mcnemars_test(20, 5);
        assert!((r.chi_square - 7.84).abs() < 1e-12);
        assert!(r.p_value < 0.05);
        assert!((r.p_value - 0.00511).abs() < 5e-4);
        assert!(r.significant);
    }

    #[test]
    fn mcnemar_balanced_disagreement_is_not_significant() {
        let r = mcnemars_test(6, 6);
        assert!(!r.significant);
        assert!(r.p_value > 0.5);
    }
}
