//! Per-parameter posterior summaries and summary options.

use ed_core::{Error, ParamKey, PosteriorDraws, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostics::compute_param_diagnostics;
use crate::interval::{central_interval_sorted, sorted, validate_level};

/// Options shared by all summary functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Central credible interval level.
    pub ci_level: f64,
    /// Compute R-hat/ESS from the chains when the engine reported none.
    pub compute_missing_diagnostics: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self { ci_level: 0.95, compute_missing_diagnostics: true }
    }
}

impl SummaryOptions {
    /// Set the credible level.
    pub fn ci_level(mut self, level: f64) -> Self {
        self.ci_level = level;
        self
    }

    /// Toggle computing diagnostics the engine did not report.
    pub fn compute_missing_diagnostics(mut self, on: bool) -> Self {
        self.compute_missing_diagnostics = on;
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(s)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reject an out-of-range credible level.
    pub fn validate(&self) -> Result<()> {
        validate_level(self.ci_level)
    }

    /// Label of the lower interval bound (`"2.5%"` at the default level).
    pub fn lower_label(&self) -> String {
        percent_label((1.0 - self.ci_level) / 2.0)
    }

    /// Label of the upper interval bound (`"97.5%"` at the default level).
    pub fn upper_label(&self) -> String {
        percent_label(1.0 - (1.0 - self.ci_level) / 2.0)
    }
}

fn percent_label(p: f64) -> String {
    let s = format!("{:.4}", p * 100.0);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{s}%")
}

/// Posterior summary of one flat parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSummary {
    /// Flat parameter name in bracket spelling (`"beta[3]"`).
    pub name: String,
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation (n-1 denominator; NaN for a single draw).
    pub sd: f64,
    /// Lower credible bound.
    pub lower: f64,
    /// Upper credible bound.
    pub upper: f64,
    /// Bulk effective sample size.
    pub ess_bulk: Option<f64>,
    /// Tail effective sample size.
    pub ess_tail: Option<f64>,
    /// Potential scale reduction factor.
    pub r_hat: Option<f64>,
}

/// Summarize column `idx` of `draws`; `name` is reported as given.
///
/// Options are assumed validated.
pub(crate) fn summarize_column(
    draws: &PosteriorDraws,
    idx: usize,
    name: String,
    options: &SummaryOptions,
) -> ParamSummary {
    let pooled = draws.pooled_draws(idx);
    let n = pooled.len() as f64;
    let mean = pooled.iter().sum::<f64>() / n;
    let sd = if pooled.len() > 1 {
        (pooled.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };
    let (lower, upper) = central_interval_sorted(&sorted(&pooled), options.ci_level);

    let reported =
        draws.reported_diagnostics(&draws.param_names[idx]).copied().unwrap_or_default();
    let has_reported =
        reported.r_hat.is_some() || reported.ess_bulk.is_some() || reported.ess_tail.is_some();
    let diag = if !has_reported && options.compute_missing_diagnostics {
        compute_param_diagnostics(&draws.param_draws(idx))
    } else {
        reported
    };

    ParamSummary {
        name,
        mean,
        sd,
        lower,
        upper,
        ess_bulk: diag.ess_bulk,
        ess_tail: diag.ess_tail,
        r_hat: diag.r_hat,
    }
}

/// Summarize one parameter by flat name (`beta[3]` or `beta.3`).
pub fn summarize_param(
    draws: &PosteriorDraws,
    name: &str,
    options: &SummaryOptions,
) -> Result<ParamSummary> {
    options.validate()?;
    let idx = draws
        .param_index(name)
        .ok_or_else(|| Error::Aggregation(format!("draws have no parameter '{name}'")))?;
    let display =
        ParamKey::parse(name).map(|k| k.to_flat_name()).unwrap_or_else(|| name.to_string());
    Ok(summarize_column(draws, idx, display, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ed_core::{Chain, ParamDiagnostics};
    use std::collections::BTreeMap;

    fn draws() -> PosteriorDraws {
        let c1 = Chain { draws: (0..50).map(|t| vec![t as f64, 2.0]).collect() };
        let c2 = Chain { draws: (50..100).map(|t| vec![t as f64, 2.0]).collect() };
        PosteriorDraws::new(vec!["beta.1".into(), "sigma".into()], vec![c1, c2], 50)
    }

    #[test]
    fn test_mean_sd_interval() {
        let s = summarize_param(&draws(), "beta[1]", &SummaryOptions::default()).unwrap();
        assert_eq!(s.name, "beta[1]");
        assert_relative_eq!(s.mean, 49.5);
        // sd of 0..99 with n-1 denominator
        assert_relative_eq!(s.sd, (100.0 * 9999.0 / 12.0 / 99.0f64).sqrt(), epsilon = 1e-9);
        assert_relative_eq!(s.lower, 0.025 * 99.0, epsilon = 1e-12);
        assert_relative_eq!(s.upper, 0.975 * 99.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reported_diagnostics_take_precedence() {
        let mut diag = BTreeMap::new();
        diag.insert(
            "beta[1]".to_string(),
            ParamDiagnostics { ess_bulk: Some(123.0), ess_tail: Some(99.0), r_hat: Some(1.002) },
        );
        let d = draws().with_diagnostics(diag);
        let s = summarize_param(&d, "beta.1", &SummaryOptions::default()).unwrap();
        assert_eq!(s.ess_bulk, Some(123.0));
        assert_eq!(s.r_hat, Some(1.002));
    }

    #[test]
    fn test_missing_diagnostics_computed_or_left_empty() {
        let s = summarize_param(&draws(), "beta[1]", &SummaryOptions::default()).unwrap();
        // Chains sit on disjoint ranges, so mixing is terrible.
        assert!(s.r_hat.unwrap() > 1.5);
        assert!(s.ess_bulk.is_some());

        let opts = SummaryOptions::default().compute_missing_diagnostics(false);
        let s = summarize_param(&draws(), "beta[1]", &opts).unwrap();
        assert_eq!((s.r_hat, s.ess_bulk, s.ess_tail), (None, None, None));
    }

    #[test]
    fn test_unknown_parameter() {
        let err = summarize_param(&draws(), "alpha[1]", &SummaryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Aggregation(ref m) if m.contains("alpha[1]")));
    }

    #[test]
    fn test_options() {
        let opts = SummaryOptions::from_json(r#"{"ci_level": 0.9}"#).unwrap();
        assert!(opts.compute_missing_diagnostics);
        assert_eq!(opts.lower_label(), "5%");
        assert_eq!(opts.upper_label(), "95%");
        assert_eq!(SummaryOptions::default().lower_label(), "2.5%");
        assert!(SummaryOptions::from_json(r#"{"ci_level": 1.5}"#).is_err());
    }
}
