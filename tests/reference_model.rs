use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use stroke_risk::attribution::ExplainerKind;
use stroke_risk::config::RiskConfig;
use stroke_risk::model_adapter::{ModelSource, ModelStore};
use stroke_risk::{
    InputRecord, RiskBand, RiskClass, RiskEngine, RiskError, Sex, SmokingStatus, WorkType,
};

fn model_path(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models").join(file)
}

fn engine_for(file: &str, strategy: ExplainerKind) -> RiskEngine {
    let mut config = RiskConfig::default();
    config.model.path = model_path(file);
    config.explainer.strategy = strategy;
    RiskEngine::from_config(&config).expect("valid config")
}

fn reference_input() -> InputRecord {
    InputRecord::new(
        45.0,
        Sex::Male,
        true,
        WorkType::Private,
        false,
        false,
        90.0,
        SmokingStatus::NeverSmoked,
    )
    .unwrap()
}

fn high_risk_input(age: f64) -> InputRecord {
    InputRecord::new(
        age,
        Sex::Male,
        true,
        WorkType::Private,
        true,
        true,
        180.0,
        SmokingStatus::Smokes,
    )
    .unwrap()
}

#[test]
fn reference_input_scores_low_and_is_led_by_age() {
    let engine = engine_for("stroke_gb_v1.json", ExplainerKind::Shapley);
    let record = engine.compute_risk(&reference_input()).unwrap();

    assert!((record.probability - 0.02253263945644731).abs() < 1e-9);
    assert_eq!(record.classification, RiskClass::Baseline);
    assert_eq!(record.band, RiskBand::Low);
    assert!((record.percent - record.probability * 100.0).abs() < 1e-12);

    assert_eq!(record.attributions.len(), 8);
    assert!((record.attributions.total() - record.probability).abs() < 1e-6);
    assert!(record.attributions.iter().all(|a| a.contribution >= 0.0));

    let age = record.attributions.get("age").unwrap();
    let gender = record.attributions.get("gender").unwrap();
    assert!((age.contribution - 0.01929587897227725).abs() < 1e-9);
    assert!((gender.contribution - 0.0032367604841700612).abs() < 1e-9);
    assert_eq!(record.attributions.largest().unwrap().attribute, "age");
    assert_eq!(record.attributions.get("hypertension").unwrap().contribution, 0.0);
}

#[test]
fn input_on_the_baseline_branches_is_still_attributed() {
    // Every tree sends this record down the same branch as the baseline row, so
    // all Shapley values are zero; the split-frequency importances take over.
    let engine = engine_for("stroke_gb_v1.json", ExplainerKind::Shapley);
    let input = InputRecord::new(
        30.0,
        Sex::Female,
        true,
        WorkType::Private,
        false,
        false,
        100.0,
        SmokingStatus::NeverSmoked,
    )
    .unwrap();

    let record = engine.compute_risk(&input).unwrap();
    assert!((record.probability - 0.01598484834220258).abs() < 1e-9);
    assert_eq!(record.band, RiskBand::Low);
    assert!((record.attributions.total() - record.probability).abs() < 1e-6);

    // Age and glucose carry 3 of the 13 base-attribute splits each; ties keep
    // encoding order.
    let age = record.attributions.get("age").unwrap().contribution;
    assert!((age - 0.003688811155892904).abs() < 1e-9);
    let smoking = record.attributions.get("smoking_status").unwrap().contribution;
    assert!((smoking - 0.002459207437261935).abs() < 1e-9);
    assert_eq!(record.attributions.largest().unwrap().attribute, "age");
    assert!(record.attributions.iter().all(|a| a.contribution > 0.0));
}

#[test]
fn repeated_calls_are_deterministic() {
    let engine = engine_for("stroke_gb_v1.json", ExplainerKind::Shapley);
    let first = engine.compute_risk(&reference_input()).unwrap();
    let second = engine.compute_risk(&reference_input()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn older_patient_with_risk_factors_scores_higher() {
    let engine = engine_for("stroke_gb_v1.json", ExplainerKind::Shapley);
    let younger = engine.compute_risk(&high_risk_input(40.0)).unwrap();
    let older = engine.compute_risk(&high_risk_input(80.0)).unwrap();

    assert!((younger.probability - 0.21081829347774705).abs() < 1e-9);
    assert!((older.probability - 0.8429045311145473).abs() < 1e-9);
    assert!(older.probability > younger.probability);

    assert_eq!(older.classification, RiskClass::Elevated);
    assert_eq!(older.band, RiskBand::High);
    assert!((older.attributions.total() - older.probability).abs() < 1e-6);
}

#[test]
fn logistic_artifact_scores_through_the_same_pipeline() {
    for strategy in [ExplainerKind::Shapley, ExplainerKind::GlobalImportance] {
        let engine = engine_for("stroke_logistic_v1.json", strategy);

        let reference = engine.compute_risk(&reference_input()).unwrap();
        assert!((reference.probability - 0.024964964067633263).abs() < 1e-9);
        assert!((reference.attributions.total() - reference.probability).abs() < 1e-6);
        assert_eq!(reference.model_name.as_deref(), Some("stroke_logistic"));

        let younger = engine.compute_risk(&high_risk_input(40.0)).unwrap();
        let older = engine.compute_risk(&high_risk_input(80.0)).unwrap();
        assert!((younger.probability - 0.1544652650835348).abs() < 1e-9);
        assert!((older.probability - 0.710949502625004).abs() < 1e-9);
        assert_eq!(older.band, RiskBand::High);
    }
}

#[test]
fn global_importance_ranks_by_model_weights() {
    let engine = engine_for("stroke_logistic_v1.json", ExplainerKind::GlobalImportance);
    let record = engine.compute_risk(&reference_input()).unwrap();

    // Largest absolute coefficient is heart disease.
    assert_eq!(record.attributions.largest().unwrap().attribute, "heart_disease");
    let top: Vec<&str> = record
        .attributions
        .top(2)
        .iter()
        .map(|a| a.attribute.as_str())
        .collect();
    assert_eq!(top, vec!["heart_disease", "hypertension"]);
}

#[test]
fn checksum_pin_rejects_a_different_artifact() {
    let mut config = RiskConfig::default();
    config.model.path = model_path("stroke_gb_v1.json");
    config.model.expected_sha256 = Some("0".repeat(64));
    let engine = RiskEngine::from_config(&config).unwrap();

    let err = engine.compute_risk(&reference_input()).unwrap_err();
    assert!(matches!(err, RiskError::ModelLoad { .. }));
    assert!(!err.is_client_error());
}

#[test]
fn model_store_loads_once_and_shares_across_threads() {
    let store = Arc::new(ModelStore::new(ModelSource {
        path: model_path("stroke_gb_v1.json"),
        expected_sha256: None,
    }));
    assert!(!store.is_loaded());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.get().unwrap())
        })
        .collect();
    let adapters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(store.is_loaded());
    for adapter in &adapters[1..] {
        assert!(Arc::ptr_eq(&adapters[0], adapter));
    }
    assert_eq!(adapters[0].metadata().name, "stroke_gb");
    assert_eq!(adapters[0].metadata().sha256.as_deref().map(str::len), Some(64));
}

#[test]
fn concurrent_requests_match_sequential_results() {
    let engine = Arc::new(engine_for("stroke_gb_v1.json", ExplainerKind::Shapley));
    let expected = engine.compute_risk(&high_risk_input(62.0)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || engine.compute_risk(&high_risk_input(62.0)).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
