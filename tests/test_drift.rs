//! Integration test: drift evaluation over logged predictions

mod common;

use std::io::Write;
use std::path::Path;

use kickwatch::drift::{DriftConfig, DriftEvaluator, DriftReport, FeatureWindow};
use kickwatch::error::KickwatchError;
use kickwatch::features::{Feature, FeatureVector};
use kickwatch::storage::{NewPrediction, PredictionStore, SqliteStore};

use common::vector;

fn record(v: FeatureVector, prediction: f64) -> NewPrediction {
    NewPrediction::scored(v, prediction, prediction.max(1.0 - prediction), 0.4)
}

/// Reference CSV in the training-data layout, target column included
fn write_reference(path: &Path, vectors: &[FeatureVector], with_predictions: bool) {
    let mut file = std::fs::File::create(path).unwrap();
    let mut header: Vec<&str> = Feature::names();
    header.push("resultat");
    if with_predictions {
        header.push("prediction");
    }
    writeln!(file, "{}", header.join(",")).unwrap();

    for (i, v) in vectors.iter().enumerate() {
        let mut cells: Vec<String> = v.to_array().iter().map(|x| x.to_string()).collect();
        cells.push((i % 2).to_string());
        if with_predictions {
            cells.push(format!("{}", 0.3 + (i % 5) as f64 / 10.0));
        }
        writeln!(file, "{}", cells.join(",")).unwrap();
    }
}

fn spread_distance(i: usize) -> f64 {
    2.0 + (i % 98) as f64
}

fn evaluator(reports_dir: &Path) -> DriftEvaluator {
    DriftEvaluator::new(
        DriftConfig::default()
            .with_min_samples(50)
            .with_batch_size(1000)
            .with_reports_dir(reports_dir),
    )
}

fn report_files(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_same_distribution_no_drift() {
    let dir = tempfile::tempdir().unwrap();
    let vectors: Vec<FeatureVector> = (0..400).map(|i| vector(i, spread_distance(i))).collect();
    let csv = dir.path().join("reference.csv");
    write_reference(&csv, &vectors, false);

    let store = SqliteStore::open_in_memory().unwrap();
    for v in &vectors {
        store.append(record(*v, 0.6)).unwrap();
    }

    let reference = FeatureWindow::from_csv(&csv).unwrap();
    let reports = dir.path().join("reports");
    let (report, path) = evaluator(&reports).run(&store, &reference).unwrap();

    assert_eq!(report.n_drifted, 0);
    assert!(!report.dataset_drift);
    assert_eq!(report.reference_size, 400);
    assert_eq!(report.live_size, 400);
    assert!(report.prediction.is_none());
    assert!(path.exists());
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("drift_report_"));
}

#[test]
fn test_long_kicks_drift_distance_only() {
    let dir = tempfile::tempdir().unwrap();
    let reference_vectors: Vec<FeatureVector> =
        (0..400).map(|i| vector(i, spread_distance(i))).collect();
    let reference = FeatureWindow::from_vectors(&reference_vectors).unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    for i in 0..400 {
        let distance = 95.0 + (i % 6) as f64;
        store.append(record(vector(i, distance), 0.2)).unwrap();
    }

    let (report, path) = evaluator(dir.path()).run(&store, &reference).unwrap();
    assert_eq!(report.drifted_features(), vec!["distance"]);
    assert_eq!(report.n_drifted, 1);
    assert!(!report.dataset_drift);

    let distance = report.feature("distance").unwrap();
    assert!(distance.score > 0.2);
    assert!(distance.live_mean > 95.0);

    let written: DriftReport = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(written.n_drifted, 1);
}

#[test]
fn test_majority_drift_flags_dataset() {
    let reference_vectors: Vec<FeatureVector> =
        (0..300).map(|i| vector(i, spread_distance(i))).collect();
    let reference = FeatureWindow::from_vectors(&reference_vectors).unwrap();

    // Every flag set and long kicks: the six booleans plus distance move
    let live_vectors: Vec<FeatureVector> = (0..300)
        .map(|i| {
            let mut values = vector(i, 97.0).to_array();
            for f in [
                Feature::IsLeftFooted,
                Feature::GameAway,
                Feature::IsEndgame,
                Feature::IsStart,
                Feature::IsLeftSide,
                Feature::HasPreviousAttempts,
            ] {
                values[f.index()] = 1.0;
            }
            FeatureVector::from_values(&values).unwrap()
        })
        .collect();
    let live = FeatureWindow::from_vectors(&live_vectors).unwrap();

    let report = DriftEvaluator::new(DriftConfig::default().with_min_samples(50))
        .evaluate(&reference, &live)
        .unwrap();
    assert_eq!(report.n_drifted, 7);
    assert!(report.drifted_share > 0.5);
    assert!(report.dataset_drift);
}

#[test]
fn test_too_few_records_yields_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let reference_vectors: Vec<FeatureVector> =
        (0..200).map(|i| vector(i, spread_distance(i))).collect();
    let reference = FeatureWindow::from_vectors(&reference_vectors).unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    for i in 0..5 {
        store.append(record(vector(i, 30.0), 0.5)).unwrap();
    }

    let reports = dir.path().join("reports");
    let err = evaluator(&reports).run(&store, &reference).unwrap_err();
    assert!(matches!(
        err,
        KickwatchError::InsufficientData { required: 50, actual: 5, .. }
    ));
    assert!(report_files(&reports).is_empty());
}

#[test]
fn test_live_window_is_most_recent_batch() {
    let dir = tempfile::tempdir().unwrap();
    let reference_vectors: Vec<FeatureVector> =
        (0..300).map(|i| vector(i, spread_distance(i))).collect();
    let reference = FeatureWindow::from_vectors(&reference_vectors).unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    // Old drifted traffic followed by a recent batch that matches the reference
    for i in 0..300 {
        store.append(record(vector(i, 99.0), 0.1)).unwrap();
    }
    for v in &reference_vectors {
        store.append(record(*v, 0.6)).unwrap();
    }

    let evaluator = DriftEvaluator::new(
        DriftConfig::default()
            .with_min_samples(50)
            .with_batch_size(300)
            .with_reports_dir(dir.path()),
    );
    let (report, _) = evaluator.run(&store, &reference).unwrap();
    assert_eq!(report.live_size, 300);
    assert_eq!(report.n_drifted, 0);
}

#[test]
fn test_prediction_drift_reported_separately() {
    let dir = tempfile::tempdir().unwrap();
    let vectors: Vec<FeatureVector> = (0..300).map(|i| vector(i, spread_distance(i))).collect();
    let csv = dir.path().join("reference.csv");
    write_reference(&csv, &vectors, true);
    let reference = FeatureWindow::from_csv(&csv).unwrap();
    assert!(reference.predictions().is_some());

    let store = SqliteStore::open_in_memory().unwrap();
    for v in &vectors {
        store.append(record(*v, 0.95)).unwrap();
    }

    let (report, _) = evaluator(&dir.path().join("reports"))
        .run(&store, &reference)
        .unwrap();
    let prediction = report.prediction.as_ref().unwrap();
    assert!(prediction.drifted);
    assert_eq!(report.n_drifted, 0);
    assert!(!report.dataset_drift);
}

#[test]
fn test_failed_attempts_stay_out_of_live_window() {
    let dir = tempfile::tempdir().unwrap();
    let reference_vectors: Vec<FeatureVector> =
        (0..300).map(|i| vector(i, spread_distance(i))).collect();
    let reference = FeatureWindow::from_vectors(&reference_vectors).unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    for v in &reference_vectors {
        store.append(record(*v, 0.6)).unwrap();
    }
    // Model failures on long kicks would drift distance if they were counted
    for i in 0..100 {
        store
            .append(NewPrediction::failed(vector(i, 99.0), "model unavailable", 0.1))
            .unwrap();
    }

    let (report, _) = evaluator(dir.path()).run(&store, &reference).unwrap();
    assert_eq!(report.live_size, 300);
    assert_eq!(report.n_drifted, 0);
}
