//! Descriptive and inferential statistics over metric columns.
//!
//! Everything operates on plain `&[f64]` slices so callers can feed metric
//! columns straight in. Percentiles use linear interpolation between order
//! statistics; confidence intervals come from a seeded percentile bootstrap;
//! rank correlation is Spearman's rho with a t-approximation p-value.

mod beta;

use rand::prelude::*;

use crate::error::{RecastError, Result};
use beta::incomplete_beta;

/// Arithmetic mean. Returns 0.0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// The `q`-th percentile (`q` in `[0, 100]`) with linear interpolation
/// between adjacent order statistics.
///
/// # Errors
///
/// Returns [`RecastError::EmptyInput`] on an empty slice and
/// [`RecastError::InvalidParameter`] for `q` outside `[0, 100]`.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(RecastError::EmptyInput {
            what: "percentile input".to_string(),
        });
    }
    if !(0.0..=100.0).contains(&q) {
        return Err(RecastError::InvalidParameter {
            param: "q".to_string(),
            value: q.to_string(),
            constraint: "must be in [0, 100]".to_string(),
        });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Ok(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// A two-sided bootstrap confidence interval around the mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    /// Mean of the original sample.
    pub mean: f64,
    /// Lower percentile bound.
    pub lower: f64,
    /// Upper percentile bound.
    pub upper: f64,
}

/// Percentile bootstrap CI for the mean of `samples`.
///
/// `confidence` is the coverage (e.g. 0.95); resampling is seeded so results
/// are reproducible.
///
/// # Errors
///
/// Fails on an empty sample or a `confidence` outside `(0, 1)`.
pub fn bootstrap_ci(
    samples: &[f64],
    confidence: f64,
    n_resamples: usize,
    seed: u64,
) -> Result<ConfidenceInterval> {
    if samples.is_empty() {
        return Err(RecastError::EmptyInput {
            what: "bootstrap samples".to_string(),
        });
    }
    if !(0.0..1.0).contains(&confidence) || confidence == 0.0 {
        return Err(RecastError::InvalidParameter {
            param: "confidence".to_string(),
            value: confidence.to_string(),
            constraint: "must be in (0, 1)".to_string(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut means = Vec::with_capacity(n_resamples);
    for _ in 0..n_resamples {
        let mut total = 0.0;
        for _ in 0..samples.len() {
            total += samples[rng.gen_range(0..samples.len())];
        }
        means.push(total / samples.len() as f64);
    }

    let tail = (1.0 - confidence) / 2.0 * 100.0;
    Ok(ConfidenceInterval {
        mean: mean(samples),
        lower: percentile(&means, tail)?,
        upper: percentile(&means, 100.0 - tail)?,
    })
}

/// Average ranks with ties sharing their mean rank (1-based).
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j are tied; all get the mean rank.
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Result of a Spearman rank correlation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpearmanResult {
    /// Rank correlation coefficient in `[-1, 1]`.
    pub rho: f64,
    /// Two-sided p-value from the t approximation.
    pub p_value: f64,
}

/// Spearman rank correlation with average ranks for ties.
///
/// The p-value uses the t approximation
/// `t = rho * sqrt((n - 2) / (1 - rho^2))` with `n - 2` degrees of freedom,
/// which is what SciPy reports for samples of this size.
///
/// # Errors
///
/// Requires equal-length inputs with at least three observations. A
/// zero-variance input yields [`RecastError::Other`].
pub fn spearman(x: &[f64], y: &[f64]) -> Result<SpearmanResult> {
    if x.len() != y.len() {
        return Err(RecastError::InvalidParameter {
            param: "y".to_string(),
            value: y.len().to_string(),
            constraint: format!("must match x length {}", x.len()),
        });
    }
    if x.len() < 3 {
        return Err(RecastError::EmptyInput {
            what: "spearman needs at least 3 observations".to_string(),
        });
    }

    let rx = average_ranks(x);
    let ry = average_ranks(y);

    let mx = mean(&rx);
    let my = mean(&ry);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..rx.len() {
        let dx = rx[i] - mx;
        let dy = ry[i] - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return Err(RecastError::Other(
            "constant input, rank correlation is undefined".to_string(),
        ));
    }

    let rho = (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0);
    let df = (x.len() - 2) as f64;
    let p_value = if (1.0 - rho.abs()) < 1e-15 {
        0.0
    } else {
        let t = rho * (df / (1.0 - rho * rho)).sqrt();
        t_distribution_pvalue(t, df)
    };
    Ok(SpearmanResult { rho, p_value })
}

/// Two-sided p-value of the t distribution via the regularized incomplete
/// beta function.
fn t_distribution_pvalue(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Cosine similarity between two equal-length vectors.
///
/// # Errors
///
/// Fails on mismatched lengths or when either vector has zero norm.
pub fn cosine_similarity(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(RecastError::InvalidParameter {
            param: "y".to_string(),
            value: y.len().to_string(),
            constraint: format!("must match x length {}", x.len()),
        });
    }
    if x.is_empty() {
        return Err(RecastError::EmptyInput {
            what: "cosine similarity input".to_string(),
        });
    }

    let dot: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let norm_x: f64 = x.iter().map(|a| a * a).sum::<f64>().sqrt();
    let norm_y: f64 = y.iter().map(|b| b * b).sum::<f64>().sqrt();
    if norm_x == 0.0 || norm_y == 0.0 {
        return Err(RecastError::Other(
            "zero-norm vector, cosine similarity is undefined".to_string(),
        ));
    }
    Ok(dot / (norm_x * norm_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_eq!(percentile(&values, 100.0).unwrap(), 4.0);
        assert!((percentile(&values, 50.0).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 25.0).unwrap() - 1.75).abs() < 1e-12);
    }

    #[test]
    fn percentile_rejects_bad_inputs() {
        assert!(percentile(&[], 50.0).is_err());
        assert!(percentile(&[1.0], 101.0).is_err());
    }

    #[test]
    fn bootstrap_ci_brackets_the_mean() {
        let samples: Vec<f64> = (0..200).map(|i| (i % 10) as f64).collect();
        let ci = bootstrap_ci(&samples, 0.95, 2_000, 42).unwrap();
        assert!(ci.lower <= ci.mean);
        assert!(ci.mean <= ci.upper);
        assert!((ci.mean - 4.5).abs() < 1e-12);
        // A 200-point sample gives a tight interval around 4.5.
        assert!(ci.upper - ci.lower < 1.0);
    }

    #[test]
    fn bootstrap_ci_is_seed_reproducible() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let a = bootstrap_ci(&samples, 0.95, 500, 7).unwrap();
        let b = bootstrap_ci(&samples, 0.95, 500, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ties_share_average_ranks() {
        let ranks = average_ranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn spearman_detects_monotone_association() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let result = spearman(&x, &y).unwrap();
        assert!((result.rho - 1.0).abs() < 1e-12);
        assert!(result.p_value < 1e-6);

        let reversed: Vec<f64> = x.iter().rev().copied().collect();
        let inverse = spearman(&x, &reversed).unwrap();
        assert!((inverse.rho + 1.0).abs() < 1e-12);
    }

    #[test]
    fn spearman_pvalue_large_for_noise() {
        let x = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.0, 6.0];
        let y = [2.0, 7.0, 1.0, 8.0, 2.5, 8.5, 0.5, 9.5];
        let result = spearman(&x, &y).unwrap();
        assert!(result.rho.abs() < 1.0);
        assert!(result.p_value > 0.01);
    }

    #[test]
    fn spearman_rejects_constant_input() {
        assert!(spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn cosine_similarity_bounds() {
        let x = [1.0, 0.0];
        assert!((cosine_similarity(&x, &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((cosine_similarity(&x, &[0.0, 1.0]).unwrap()).abs() < 1e-12);
        assert!((cosine_similarity(&x, &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&x, &[0.0, 0.0]).is_err());
    }
}
