//! End-to-end controller scenario: upload, select, train, predict, all
//! driven through effects and applied outcomes with no live service.

use trainbench_client::{ModelType, SessionId, TrainReport, UploadReceipt};
use trainbench_workflow::{Effect, Severity, WorkflowState};

#[test]
fn full_session_without_a_network() {
    let mut state = WorkflowState::default();

    // First activation issues exactly one liveness probe.
    assert_eq!(state.initialize(), Some(Effect::Probe));
    assert_eq!(state.initialize(), None);

    // Upload a dataset and install the returned catalog and session.
    state.select_file("housing.csv", b"sqft,age,price\n".to_vec());
    let Some(Effect::Upload {
        seq,
        file_name,
        bytes,
    }) = state.begin_upload()
    else {
        panic!("expected an upload effect");
    };
    assert_eq!(file_name, "housing.csv");
    assert_eq!(bytes, b"sqft,age,price\n");
    state.apply_upload_outcome(
        seq,
        Ok(UploadReceipt {
            columns: vec!["sqft".into(), "age".into(), "price".into()],
            session_id: SessionId("s1".into()),
        }),
    );
    assert_eq!(state.columns(), ["sqft", "age", "price"]);

    // Select features and target, then train.
    state.toggle_feature("sqft").unwrap();
    state.toggle_feature("age").unwrap();
    state.set_target("price").unwrap();
    let Some(Effect::Train { seq, request }) = state.begin_train() else {
        panic!("expected a train effect");
    };
    assert_eq!(request.session_id, SessionId("s1".into()));
    assert_eq!(request.features, ["sqft", "age"]);
    assert_eq!(request.target, "price");
    assert_eq!(request.model_type, ModelType::Regression);
    assert!(state.is_busy());

    let report: TrainReport = serde_json::from_str(
        r#"{
            "mse": 1250.5,
            "best_params": {"max_depth": 6, "min_samples_split": 2},
            "feature_importances": [0.3, 0.7]
        }"#,
    )
    .unwrap();
    state.apply_train_outcome(seq, Ok(report));
    assert!(!state.is_busy());
    assert_eq!(state.status().unwrap().severity(), Severity::Success);

    // Importance scores pair with the selected feature order.
    let report = state.train_report().unwrap();
    let pairs = report.importance_pairs(state.features());
    assert_eq!(
        pairs,
        vec![("sqft".to_string(), 0.3), ("age".to_string(), 0.7)]
    );

    // Enter one value per feature and predict.
    state.update_prediction_input("sqft", "1500");
    state.update_prediction_input("age", "12");
    let Some(Effect::Predict { seq, request }) = state.begin_predict() else {
        panic!("expected a predict effect");
    };
    assert_eq!(request.session_id, SessionId("s1".into()));
    assert_eq!(request.data.len(), 2);

    state.apply_predict_outcome(seq, Ok(serde_json::json!({"prediction": [250000.0]})));
    assert_eq!(
        state.prediction(),
        Some(&serde_json::json!({"prediction": [250000.0]}))
    );
    assert_eq!(
        state.status().unwrap().text(),
        "Prediction made successfully."
    );
}
