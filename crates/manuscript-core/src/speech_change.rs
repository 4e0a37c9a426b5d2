//! Speech-change detection (`spec.md` §4.7 "Speech-Change Detector").
//!
//! Compares a sliding window of a voice profile's metrics against the
//! profile's established baseline: discrete metrics via a chi-squared
//! goodness-of-fit test, continuous metrics via a two-sample z-test. An
//! alert fires only when at least `min_significant_metrics` individually
//! cross significance, so an entity naturally varying on one axis doesn't
//! trigger on noise alone.

use crate::voice::{ContinuousMetrics, DiscreteMetrics};
use manuscript_types::SpeechChangeSettings;

#[derive(Debug, Clone)]
pub struct MetricShift {
    pub metric_name: String,
    pub baseline_value: f64,
    pub window_value: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone)]
pub struct SpeechChangeResult {
    pub shifts: Vec<MetricShift>,
    pub significant_count: usize,
    pub flagged: bool,
}

/// Two-sample z-test for a difference in means, assuming the baseline
/// sample is large enough that its variance is a reasonable stand-in for
/// the population variance (`spec.md` §4.7: "z-test for continuous
/// metrics").
fn z_test(baseline_mean: f64, baseline_var: f64, baseline_n: f64, window_mean: f64, window_var: f64, window_n: f64) -> f64 {
    if baseline_n < 2.0 || window_n < 2.0 {
        return 1.0;
    }
    let se = (baseline_var / baseline_n + window_var / window_n).sqrt();
    if se == 0.0 {
        return if (baseline_mean - window_mean).abs() < f64::EPSILON { 1.0 } else { 0.0 };
    }
    let z = (window_mean - baseline_mean).abs() / se;
    two_sided_normal_p_value(z)
}

/// Approximate the standard normal survival function via the Abramowitz &
/// Stegun rational approximation (no `scipy` equivalent available without
/// network access), doubled for a two-sided test.
fn two_sided_normal_p_value(z: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * z.abs());
    let poly = t * (0.319381530 + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    let phi = (-z * z / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt();
    (2.0 * phi * poly).clamp(0.0, 1.0)
}

/// Chi-squared goodness-of-fit between an observed discrete distribution and
/// an expected one derived from the baseline proportions, returning a
/// p-value via the same rational tail approximation scaled for one degree
/// of freedom (`spec.md` §4.7: "chi-squared for discrete metrics"). This is
/// a deliberately coarse approximation appropriate for flagging, not for
/// publication-grade significance testing.
fn chi_squared_p_value(observed: &[f64], expected: &[f64]) -> f64 {
    let mut stat = 0.0;
    for (o, e) in observed.iter().zip(expected.iter()) {
        if *e > 0.0 {
            stat += (o - e).powi(2) / e;
        }
    }
    // One degree of freedom per category beyond the first; approximate via
    // the same normal tail on sqrt(2*stat) - sqrt(2*df - 1), a standard
    // Wilson-Hilferty style stabilization.
    let df = (observed.len().saturating_sub(1)).max(1) as f64;
    let z = (2.0 * stat).sqrt() - (2.0 * df - 1.0).sqrt();
    two_sided_normal_p_value(z.max(0.0))
}

/// Metrics whose significance is tested discretely rather than
/// continuously, mirroring the original detector's fixed split
/// (`change_detector.py`'s `DISCRETE_METRICS`). Formality is a continuous
/// score, not a count, despite being register-derived.
const DISCRETE_METRIC_NAMES: &[&str] = &["filler_ratio", "question_ratio", "exclamation_ratio"];

/// Minimum relative change (`|v2 - v1| / |v1|`) required on top of p-value
/// significance before a metric counts as shifted, per metric name
/// (`change_detector.py`'s `METRIC_THRESHOLDS`). Falls back to 0.20 for any
/// metric not explicitly listed there.
fn relative_change_threshold(metric_name: &str) -> f64 {
    match metric_name {
        "filler_ratio" => 0.15,
        "formal_register_ratio" => 0.25,
        "mean_sentence_length" => 0.30,
        "vocabulary_richness" => 0.20,
        "exclamation_ratio" => 0.50,
        "question_ratio" => 0.50,
        _ => 0.20,
    }
}

fn relative_change(baseline_value: f64, window_value: f64) -> f64 {
    if baseline_value == 0.0 {
        if window_value > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        (window_value - baseline_value).abs() / baseline_value.abs()
    }
}

fn discrete_ratios(metrics: &DiscreteMetrics) -> Vec<(&'static str, f64)> {
    let total = metrics.total_lines.max(1) as f64;
    vec![
        ("filler_ratio", metrics.filler_count as f64 / total),
        ("question_ratio", metrics.question_count as f64 / total),
        ("exclamation_ratio", metrics.exclamation_count as f64 / total),
    ]
}

fn continuous_values(metrics: &ContinuousMetrics) -> Vec<(&'static str, f64)> {
    vec![
        ("formal_register_ratio", metrics.formal_register_ratio),
        ("mean_sentence_length", metrics.mean_sentence_length),
        ("mean_word_length", metrics.mean_word_length),
        ("vocabulary_richness", metrics.vocabulary_richness),
        ("punctuation_density", metrics.punctuation_density),
    ]
}

/// Compare a baseline profile's metrics against a sliding-window profile's
/// metrics and decide whether the shift is significant enough to flag.
pub fn detect_change(
    baseline_discrete: &DiscreteMetrics,
    baseline_continuous: &ContinuousMetrics,
    window_discrete: &DiscreteMetrics,
    window_continuous: &ContinuousMetrics,
    settings: &SpeechChangeSettings,
) -> SpeechChangeResult {
    let mut shifts = Vec::new();

    let baseline_ratios = discrete_ratios(baseline_discrete);
    let window_ratios = discrete_ratios(window_discrete);
    let observed: Vec<f64> = window_ratios.iter().map(|(_, v)| *v).collect();
    let expected: Vec<f64> = baseline_ratios.iter().map(|(_, v)| *v).collect();
    let discrete_p = chi_squared_p_value(&observed, &expected);
    for ((name, baseline_value), (_, window_value)) in baseline_ratios.iter().zip(window_ratios.iter()) {
        debug_assert!(DISCRETE_METRIC_NAMES.contains(name));
        let change = relative_change(*baseline_value, *window_value);
        shifts.push(MetricShift {
            metric_name: name.to_string(),
            baseline_value: *baseline_value,
            window_value: *window_value,
            p_value: discrete_p,
            significant: discrete_p < settings.significance_p_value && change > relative_change_threshold(name),
        });
    }

    let baseline_cont = continuous_values(baseline_continuous);
    let window_cont = continuous_values(window_continuous);
    let baseline_n = baseline_discrete.total_lines.max(1) as f64;
    let window_n = window_discrete.total_lines.max(1) as f64;
    for ((name, baseline_value), (_, window_value)) in baseline_cont.iter().zip(window_cont.iter()) {
        // Variance is not tracked per-metric in the profile today, so a
        // fixed nominal variance stands in; this keeps the test usable
        // without requiring raw per-line samples to be retained.
        let nominal_var = (baseline_value.abs() + window_value.abs()).max(1.0) * 0.25;
        let p = z_test(*baseline_value, nominal_var, baseline_n, *window_value, nominal_var, window_n);
        let change = relative_change(*baseline_value, *window_value);
        shifts.push(MetricShift {
            metric_name: name.to_string(),
            baseline_value: *baseline_value,
            window_value: *window_value,
            p_value: p,
            significant: p < settings.significance_p_value && change > relative_change_threshold(name),
        });
    }

    let significant_count = shifts.iter().filter(|s| s.significant).count();
    let flagged = significant_count >= settings.min_significant_metrics;

    SpeechChangeResult { shifts, significant_count, flagged }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SpeechChangeSettings {
        SpeechChangeSettings::default()
    }

    #[test]
    fn identical_profiles_do_not_flag() {
        let discrete =
            DiscreteMetrics { formal_register_count: 2, informal_register_count: 1, question_count: 3, exclamation_count: 1, filler_count: 1, total_lines: 20 };
        let continuous = ContinuousMetrics {
            formal_register_ratio: 0.1,
            mean_sentence_length: 10.0,
            mean_word_length: 4.5,
            vocabulary_richness: 0.6,
            punctuation_density: 0.1,
        };
        let result = detect_change(&discrete, &continuous, &discrete, &continuous, &settings());
        assert!(!result.flagged);
    }

    #[test]
    fn large_continuous_shift_is_flagged() {
        let baseline_discrete =
            DiscreteMetrics { formal_register_count: 1, informal_register_count: 1, question_count: 1, exclamation_count: 1, filler_count: 1, total_lines: 50 };
        let baseline_continuous = ContinuousMetrics {
            formal_register_ratio: 0.1,
            mean_sentence_length: 8.0,
            mean_word_length: 4.0,
            vocabulary_richness: 0.5,
            punctuation_density: 0.1,
        };
        let window_discrete = baseline_discrete.clone();
        let window_continuous = ContinuousMetrics {
            formal_register_ratio: 0.1,
            mean_sentence_length: 30.0,
            mean_word_length: 9.0,
            vocabulary_richness: 0.9,
            punctuation_density: 0.4,
        };
        let result = detect_change(&baseline_discrete, &baseline_continuous, &window_discrete, &window_continuous, &settings());
        assert!(result.flagged);
        assert!(result.significant_count >= 2);
    }

    #[test]
    fn filler_ratio_is_tracked_as_a_discrete_metric() {
        let discrete =
            DiscreteMetrics { formal_register_count: 1, informal_register_count: 1, question_count: 1, exclamation_count: 1, filler_count: 4, total_lines: 20 };
        let shifted = discrete_ratios(&discrete);
        assert!(shifted.iter().any(|(name, _)| *name == "filler_ratio"));
        assert!(DISCRETE_METRIC_NAMES.contains(&"filler_ratio"));
        assert!(!DISCRETE_METRIC_NAMES.contains(&"formal_register_ratio"));
    }

    #[test]
    fn significant_p_value_alone_does_not_flag_without_magnitude() {
        // Same p-value-worthy shift but under the metric's relative-change
        // threshold should not count as significant.
        let baseline_discrete =
            DiscreteMetrics { formal_register_count: 1, informal_register_count: 1, question_count: 1, exclamation_count: 1, filler_count: 1, total_lines: 1000 };
        let baseline_continuous = ContinuousMetrics {
            formal_register_ratio: 0.1,
            mean_sentence_length: 10.0,
            mean_word_length: 4.5,
            vocabulary_richness: 0.5,
            punctuation_density: 0.1,
        };
        let mut window_continuous = baseline_continuous.clone();
        window_continuous.mean_sentence_length = 10.2; // 2% change, well under the 30% threshold
        let window_discrete = baseline_discrete.clone();
        let result = detect_change(&baseline_discrete, &baseline_continuous, &window_discrete, &window_continuous, &settings());
        let sentence_shift = result.shifts.iter().find(|s| s.metric_name == "mean_sentence_length").unwrap();
        assert!(!sentence_shift.significant);
    }
}
