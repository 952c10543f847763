use super::*;
use crate::delta::IsotopeTable;
use crate::error::PersistenceError;
use tempfile::tempdir;

fn iron() -> IsotopeTable {
    IsotopeTable::new()
        .with_isotope("Fe54", 0.05845)
        .with_isotope("Fe56", 0.91754)
        .with_isotope("Fe57", 0.02119)
}

fn record(name: &str, counts: &[f64]) -> IntegralRecord {
    IntegralRecord {
        name: name.to_string(),
        timestamp: None,
        peaks: vec!["54Fe".to_string(), "56Fe".to_string(), "57Fe".to_string()],
        integrals: counts.iter().map(|&c| Integral::from_counts(c)).collect(),
    }
}

fn standard() -> IntegralEvaluator {
    let mut standard = IntegralEvaluator::new();
    standard
        .add_integral(record("std", &[100.0, 1000.0, 50.0]), false)
        .unwrap();
    standard
}

#[test]
fn test_duplicate_sample() {
    let mut ev = IntegralEvaluator::new();
    ev.add_integral(record("a", &[1.0, 2.0, 3.0]), false).unwrap();
    let result = ev.add_integral(record("a", &[4.0, 5.0, 6.0]), false);
    assert!(matches!(result, Err(EvaluatorError::DuplicateSample(name)) if name == "a"));

    ev.add_integral(record("a", &[4.0, 5.0, 6.0]), true).unwrap();
    assert_eq!(ev.names(), vec!["a"]);
    assert_eq!(ev.sample_integrals("a").unwrap()[0].value, 4.0);
}

#[test]
fn test_peak_mismatch() {
    let mut ev = IntegralEvaluator::new();
    ev.add_integral(record("a", &[1.0, 2.0, 3.0]), false).unwrap();

    let mut other = record("b", &[1.0, 2.0, 3.0]);
    other.peaks[2] = "58Fe".to_string();
    assert!(matches!(ev.add_integral(other, false), Err(EvaluatorError::PeakMismatch)));

    let mut short = record("c", &[1.0, 2.0, 3.0]);
    short.integrals.pop();
    assert!(matches!(
        ev.add_integral(short, false),
        Err(EvaluatorError::ShapeMismatch { peaks: 3, integrals: 2 })
    ));
}

#[test]
fn test_summed_integrals() {
    let mut ev = IntegralEvaluator::new();
    assert!(matches!(ev.integrals(), Err(EvaluatorError::NoSamples)));

    ev.add_integral(record("a", &[100.0, 400.0, 9.0]), false).unwrap();
    ev.add_integral(record("b", &[300.0, 500.0, 16.0]), false).unwrap();

    let sum = ev.integrals().unwrap();
    assert_eq!(sum[0].value, 400.0);
    assert!((sum[0].uncertainty - 20.0).abs() < 1e-12);
    assert!((sum[2].uncertainty - 5.0).abs() < 1e-12);
    assert_eq!(ev.name(), Some("a"));
}

#[test]
fn test_deltas_against_standard() {
    let mut ev = IntegralEvaluator::new();
    ev.add_integral(record("a", &[110.0, 1000.0, 50.0]), false).unwrap();
    ev.set_standard(standard()).unwrap();

    let deltas = ev.deltas(&iron()).unwrap();
    assert!((deltas[0].value - 100.0).abs() < 1e-9);
    assert_eq!(deltas[1].value, 0.0);
    assert!(deltas[2].value.abs() < 1e-9);

    let labels = ev.delta_labels(&iron()).unwrap();
    assert_eq!(labels[0].as_deref(), Some("δ(54Fe/56Fe)"));
}

#[test]
fn test_standard_must_match_peaks() {
    let mut ev = IntegralEvaluator::new();
    ev.add_integral(record("a", &[1.0, 2.0, 3.0]), false).unwrap();

    let mut other = IntegralEvaluator::new();
    let mut rec = record("std", &[1.0, 2.0, 3.0]);
    rec.peaks.reverse();
    other.add_integral(rec, false).unwrap();
    assert!(matches!(ev.set_standard(other), Err(EvaluatorError::PeakMismatch)));
    assert!(matches!(
        ev.set_standard(IntegralEvaluator::new()),
        Err(EvaluatorError::NoSamples)
    ));
}

#[test]
fn test_correlations() {
    let mut ev = IntegralEvaluator::new();
    ev.add_integral(record("a", &[110.0, 1000.0, 55.0]), false).unwrap();

    ev.add_correlation(0, 2, &iron()).unwrap();
    assert!(matches!(
        ev.add_correlation(0, 0, &iron()),
        Err(EvaluatorError::IncompatibleCorrelation(0, 0))
    ));
    assert!(matches!(
        ev.add_correlation(0, 7, &iron()),
        Err(EvaluatorError::IncompatibleCorrelation(0, 7))
    ));
    assert!(matches!(
        ev.correlation_coefficients(&iron()),
        Err(EvaluatorError::MissingStandard)
    ));

    ev.set_standard(standard()).unwrap();
    let coefficients = ev.correlation_coefficients(&iron()).unwrap();
    assert_eq!(coefficients.len(), 1);
    assert_eq!(coefficients[0].0, (0, 2));
    assert!(coefficients[0].1 > 0.0 && coefficients[0].1 < 1.0);
}

#[test]
fn test_eval_file_roundtrip() {
    let dir = tempdir().unwrap();
    let sample_path = dir.path().join("sample.json");
    let standard_path = dir.path().join("standard.json");
    record("a", &[110.0, 1000.0, 55.0]).save(&sample_path).unwrap();
    record("std", &[100.0, 1000.0, 50.0]).save(&standard_path).unwrap();

    let mut ev = IntegralEvaluator::new();
    ev.add_integral_file(&sample_path, false).unwrap();
    let mut std_ev = IntegralEvaluator::new();
    std_ev.add_integral_file(&standard_path, false).unwrap();
    ev.set_standard(std_ev).unwrap();
    ev.set_standard_timestamp(Some(
        "2023-05-04T10:11:12".parse::<NaiveDateTime>().unwrap(),
    ));
    ev.add_correlation(0, 2, &iron()).unwrap();

    let saved = save_integral_evaluator(&ev, dir.path().join("session.txt")).unwrap();
    assert_eq!(saved.extension().and_then(|e| e.to_str()), Some("eval"));

    let loaded = load_integral_evaluator(&saved, None).unwrap();
    assert_eq!(loaded, ev);
}

#[test]
fn test_eval_file_cwd_fallback() {
    let dir = tempdir().unwrap();
    let eval = EvalFile {
        sample_files: vec!["/moved/away/sample.json".to_string()],
        correlations: vec![],
        standard_files: None,
        standard_timestamp: None,
    };
    let eval_path = dir.path().join("moved.eval");
    std::fs::write(&eval_path, serde_json::to_string(&eval).unwrap()).unwrap();

    let missing = load_integral_evaluator(&eval_path, None);
    assert!(matches!(
        missing,
        Err(EvaluatorError::Persistence(PersistenceError::FileNotFound(_)))
    ));

    record("a", &[1.0, 2.0, 3.0]).save(dir.path().join("sample.json")).unwrap();
    let loaded = load_integral_evaluator(&eval_path, Some(dir.path())).unwrap();
    assert_eq!(loaded.names(), vec!["a"]);
    assert!(loaded.standard().is_none());
    assert!(loaded.standard_timestamp().is_none());
}

#[test]
fn test_eval_file_bad_timestamp() {
    let dir = tempdir().unwrap();
    record("a", &[1.0, 2.0, 3.0]).save(dir.path().join("sample.json")).unwrap();
    let eval = EvalFile {
        sample_files: vec![dir.path().join("sample.json").display().to_string()],
        correlations: vec![(0, 2)],
        standard_files: None,
        standard_timestamp: Some("yesterday".to_string()),
    };
    let eval_path = dir.path().join("bad.eval");
    std::fs::write(&eval_path, serde_json::to_string(&eval).unwrap()).unwrap();

    assert!(matches!(
        load_integral_evaluator(&eval_path, None),
        Err(EvaluatorError::Persistence(PersistenceError::InvalidTimestamp(_)))
    ));
}
