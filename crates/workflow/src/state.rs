use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};
use trainbench_client::{
    ClientError, ModelType, PredictRequest, SessionId, TrainReport, TrainRequest, UploadReceipt,
};

use crate::effect::Effect;
use crate::error::SelectionError;
use crate::status::{self, StatusLine};

/// A user-chosen dataset file that has not been uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Issues sequence numbers for one request family and recognizes whether a
/// returning response is still the latest one issued.
#[derive(Debug, Default)]
struct SequenceGate {
    issued: u64,
}

impl SequenceGate {
    fn next(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn is_current(&self, seq: u64) -> bool {
        self.issued == seq
    }
}

/// All client-visible state of the training workflow.
///
/// Surfaces call the `begin_*` operations on user input and feed request
/// outcomes back through the `apply_*_outcome` operations, echoing the
/// sequence number their [`Effect`] carried.
#[derive(Debug, Default)]
pub struct WorkflowState {
    pending_file: Option<PendingFile>,
    columns: Vec<String>,
    session: Option<SessionId>,
    features: Vec<String>,
    target: Option<String>,
    model_type: ModelType,
    prediction_input: BTreeMap<String, String>,
    train_report: Option<TrainReport>,
    prediction: Option<Value>,
    status: Option<StatusLine>,
    busy: bool,
    initialized: bool,
    upload_gate: SequenceGate,
    train_gate: SequenceGate,
    predict_gate: SequenceGate,
}

impl WorkflowState {
    /// First-activation hook: yields a single liveness probe of the service
    /// root. The probe outcome is diagnostic only and gates nothing.
    pub fn initialize(&mut self) -> Option<Effect> {
        if self.initialized {
            return None;
        }
        self.initialized = true;
        Some(Effect::Probe)
    }

    /// Record the chosen dataset file. Clears no other state: a displayed
    /// training result stays valid until a new upload completes.
    pub fn select_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let file = PendingFile {
            name: name.into(),
            bytes,
        };
        debug!(file = %file.name, size = file.bytes.len(), "dataset file selected");
        self.pending_file = Some(file);
    }

    /// Start an upload of the pending file. The file handle is kept until
    /// the upload succeeds so a failed attempt can be retried.
    pub fn begin_upload(&mut self) -> Option<Effect> {
        let Some(file) = self.pending_file.clone() else {
            self.status = Some(StatusLine::new(status::MSG_NO_FILE));
            return None;
        };
        let seq = self.upload_gate.next();
        Some(Effect::Upload {
            seq,
            file_name: file.name,
            bytes: file.bytes,
        })
    }

    /// Apply the outcome of the upload tagged `seq`. A success replaces the
    /// column catalog and session; selections referring to columns absent
    /// from the new catalog are pruned. A failure leaves catalog and
    /// session untouched.
    pub fn apply_upload_outcome(&mut self, seq: u64, outcome: Result<UploadReceipt, ClientError>) {
        if !self.upload_gate.is_current(seq) {
            debug!(seq, "discarding superseded upload response");
            return;
        }
        match outcome {
            Ok(receipt) => {
                if let Some(retired) = self.session.replace(receipt.session_id) {
                    // The service has no close endpoint; the old session is
                    // simply orphaned on its side.
                    info!(session = %retired, "retiring previous session");
                }
                self.columns = receipt.columns;
                self.pending_file = None;
                self.prune_dead_selections();
                self.status = Some(StatusLine::new(status::MSG_UPLOAD_OK));
            }
            Err(err) => {
                warn!(error = %err, "upload failed");
                self.status = Some(StatusLine::new(status::MSG_UPLOAD_ERR));
            }
        }
    }

    fn prune_dead_selections(&mut self) {
        let columns = &self.columns;
        self.features.retain(|f| columns.contains(f));
        if self.target.as_ref().is_some_and(|t| !columns.contains(t)) {
            self.target = None;
        }
        self.prediction_input.retain(|k, _| columns.contains(k));
    }

    /// Toggle a catalog column in or out of the feature selection. Picking
    /// the current target is refused; selection order is preserved because
    /// importance scores align with it.
    pub fn toggle_feature(&mut self, column: &str) -> Result<(), SelectionError> {
        if let Some(pos) = self.features.iter().position(|f| f == column) {
            self.features.remove(pos);
            return Ok(());
        }
        if !self.columns.iter().any(|c| c == column) {
            return Err(SelectionError::UnknownColumn(column.to_owned()));
        }
        if self.target.as_deref() == Some(column) {
            return Err(SelectionError::TargetConflict(column.to_owned()));
        }
        self.features.push(column.to_owned());
        Ok(())
    }

    /// Choose the target column. Picking a selected feature is refused.
    pub fn set_target(&mut self, column: &str) -> Result<(), SelectionError> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(SelectionError::UnknownColumn(column.to_owned()));
        }
        if self.features.iter().any(|f| f == column) {
            return Err(SelectionError::FeatureConflict(column.to_owned()));
        }
        self.target = Some(column.to_owned());
        Ok(())
    }

    pub fn set_model_type(&mut self, model_type: ModelType) {
        self.model_type = model_type;
    }

    /// Merge one per-feature input value. Previously entered values survive.
    pub fn update_prediction_input(&mut self, feature: impl Into<String>, raw: impl Into<String>) {
        self.prediction_input.insert(feature.into(), raw.into());
    }

    /// Start a training request for the current selection. Selections can
    /// only come from an uploaded catalog, so a complete selection implies
    /// an active session.
    pub fn begin_train(&mut self) -> Option<Effect> {
        let (target, session) = match (self.target.clone(), self.session.clone()) {
            (Some(target), Some(session)) if !self.features.is_empty() => (target, session),
            _ => {
                self.status = Some(StatusLine::new(status::MSG_NO_SELECTION));
                return None;
            }
        };
        self.busy = true;
        self.train_report = None;
        let seq = self.train_gate.next();
        Some(Effect::Train {
            seq,
            request: TrainRequest {
                session_id: session,
                features: self.features.clone(),
                target,
                model_type: self.model_type,
            },
        })
    }

    /// Apply the outcome of the training request tagged `seq`. Outcomes of
    /// superseded requests are discarded entirely; the busy flag belongs to
    /// the latest request.
    pub fn apply_train_outcome(&mut self, seq: u64, outcome: Result<TrainReport, ClientError>) {
        if !self.train_gate.is_current(seq) {
            debug!(seq, "discarding superseded train response");
            return;
        }
        self.busy = false;
        match outcome {
            Ok(report) => {
                self.train_report = Some(report);
                self.status = Some(StatusLine::new(status::MSG_TRAIN_OK));
            }
            Err(err) => {
                warn!(error = %err, "training request failed");
                self.status = Some(StatusLine::new(status::MSG_TRAIN_ERR));
            }
        }
    }

    /// Start a prediction request for the entered input values.
    pub fn begin_predict(&mut self) -> Option<Effect> {
        if self.prediction_input.is_empty() {
            self.status = Some(StatusLine::new(status::MSG_NO_INPUT));
            return None;
        }
        let Some(session) = self.session.clone() else {
            self.status = Some(StatusLine::new(status::MSG_NO_SESSION));
            return None;
        };
        self.busy = true;
        self.prediction = None;
        let seq = self.predict_gate.next();
        Some(Effect::Predict {
            seq,
            request: PredictRequest {
                session_id: session,
                features: self.features.clone(),
                data: self.prediction_input.clone(),
            },
        })
    }

    /// Apply the outcome of the prediction request tagged `seq`.
    pub fn apply_predict_outcome(&mut self, seq: u64, outcome: Result<Value, ClientError>) {
        if !self.predict_gate.is_current(seq) {
            debug!(seq, "discarding superseded predict response");
            return;
        }
        self.busy = false;
        match outcome {
            Ok(prediction) => {
                self.prediction = Some(prediction);
                self.status = Some(StatusLine::new(status::MSG_PREDICT_OK));
            }
            Err(err) => {
                warn!(error = %err, "prediction request failed");
                self.status = Some(StatusLine::new(status::MSG_PREDICT_ERR));
            }
        }
    }

    // --- accessors ---

    pub fn pending_file(&self) -> Option<&PendingFile> {
        self.pending_file.as_ref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn prediction_input(&self) -> &BTreeMap<String, String> {
        &self.prediction_input
    }

    pub fn train_report(&self) -> Option<&TrainReport> {
        self.train_report.as_ref()
    }

    pub fn prediction(&self) -> Option<&Value> {
        self.prediction.as_ref()
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Severity;

    fn receipt(columns: &[&str], session: &str) -> UploadReceipt {
        UploadReceipt {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            session_id: SessionId(session.to_string()),
        }
    }

    fn server_error() -> ClientError {
        ClientError::Server {
            status: 500,
            code: "internal".into(),
            message: "boom".into(),
        }
    }

    /// State after one successful upload of columns `a`, `b`, `y`.
    fn uploaded() -> WorkflowState {
        let mut state = WorkflowState::default();
        state.select_file("data.csv", b"a,b,y\n".to_vec());
        let Some(Effect::Upload { seq, .. }) = state.begin_upload() else {
            panic!("expected an upload effect");
        };
        state.apply_upload_outcome(seq, Ok(receipt(&["a", "b", "y"], "s1")));
        state
    }

    #[test]
    fn initialize_probes_exactly_once() {
        let mut state = WorkflowState::default();
        assert_eq!(state.initialize(), Some(Effect::Probe));
        assert_eq!(state.initialize(), None);
    }

    #[test]
    fn upload_without_file_is_refused() {
        let mut state = WorkflowState::default();
        assert_eq!(state.begin_upload(), None);
        let status = state.status().unwrap();
        assert_eq!(status.text(), "Please select a file first.");
        assert_eq!(status.severity(), Severity::Success);
    }

    #[test]
    fn upload_effect_carries_the_pending_file() {
        let mut state = WorkflowState::default();
        state.select_file("data.csv", vec![1, 2, 3]);
        let effect = state.begin_upload().unwrap();
        assert_eq!(
            effect,
            Effect::Upload {
                seq: 1,
                file_name: "data.csv".into(),
                bytes: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn upload_success_installs_catalog_and_session() {
        let state = uploaded();
        assert_eq!(state.columns(), ["a", "b", "y"]);
        assert_eq!(state.session(), Some(&SessionId("s1".into())));
        assert!(state.pending_file().is_none());
        assert_eq!(state.status().unwrap().text(), "File uploaded successfully.");
    }

    #[test]
    fn upload_failure_leaves_prior_state_untouched() {
        let mut state = uploaded();
        state.select_file("other.csv", vec![9]);
        let Some(Effect::Upload { seq, .. }) = state.begin_upload() else {
            panic!("expected an upload effect");
        };
        state.apply_upload_outcome(seq, Err(server_error()));
        assert_eq!(state.columns(), ["a", "b", "y"]);
        assert_eq!(state.session(), Some(&SessionId("s1".into())));
        // The pending file survives so the upload can be retried.
        assert_eq!(state.pending_file().unwrap().name, "other.csv");
        let status = state.status().unwrap();
        assert_eq!(status.text(), "Error uploading file.");
        assert_eq!(status.severity(), Severity::Error);
    }

    #[test]
    fn replacing_the_catalog_prunes_dead_selections() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        state.toggle_feature("b").unwrap();
        state.set_target("y").unwrap();
        state.update_prediction_input("a", "1");
        state.update_prediction_input("b", "2");

        state.select_file("next.csv", vec![0]);
        let Some(Effect::Upload { seq, .. }) = state.begin_upload() else {
            panic!("expected an upload effect");
        };
        state.apply_upload_outcome(seq, Ok(receipt(&["b", "d"], "s2")));

        assert_eq!(state.features(), ["b"]);
        assert_eq!(state.target(), None);
        assert_eq!(state.prediction_input().len(), 1);
        assert_eq!(state.prediction_input().get("b"), Some(&"2".to_string()));
        assert_eq!(state.session(), Some(&SessionId("s2".into())));
    }

    #[test]
    fn selecting_a_new_file_keeps_the_displayed_report() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        state.set_target("y").unwrap();
        let Some(Effect::Train { seq, .. }) = state.begin_train() else {
            panic!("expected a train effect");
        };
        state.apply_train_outcome(seq, Ok(TrainReport::default()));
        assert!(state.train_report().is_some());

        state.select_file("next.csv", vec![0]);
        assert!(state.train_report().is_some());
        assert_eq!(state.session(), Some(&SessionId("s1".into())));
    }

    #[test]
    fn feature_and_target_selections_are_disjoint() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        assert_eq!(
            state.set_target("a"),
            Err(SelectionError::FeatureConflict("a".into()))
        );
        state.set_target("y").unwrap();
        assert_eq!(
            state.toggle_feature("y"),
            Err(SelectionError::TargetConflict("y".into()))
        );
        assert_eq!(
            state.toggle_feature("nope"),
            Err(SelectionError::UnknownColumn("nope".into()))
        );
    }

    #[test]
    fn toggling_a_feature_twice_deselects_it() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        state.toggle_feature("b").unwrap();
        state.toggle_feature("a").unwrap();
        assert_eq!(state.features(), ["b"]);
    }

    #[test]
    fn train_without_selection_is_refused() {
        let mut state = uploaded();
        assert_eq!(state.begin_train(), None);
        assert_eq!(
            state.status().unwrap().text(),
            "Please select features and target variable."
        );
        assert!(!state.is_busy());

        // A target alone is not enough either.
        state.set_target("y").unwrap();
        assert_eq!(state.begin_train(), None);
        assert_eq!(
            state.status().unwrap().text(),
            "Please select features and target variable."
        );
    }

    #[test]
    fn train_effect_carries_session_and_selection_order() {
        let mut state = uploaded();
        state.toggle_feature("b").unwrap();
        state.toggle_feature("a").unwrap();
        state.set_target("y").unwrap();
        state.set_model_type(ModelType::Classification);

        let effect = state.begin_train().unwrap();
        let Effect::Train { seq, request } = effect else {
            panic!("expected a train effect");
        };
        assert_eq!(seq, 1);
        assert_eq!(request.session_id, SessionId("s1".into()));
        assert_eq!(request.features, ["b", "a"]);
        assert_eq!(request.target, "y");
        assert_eq!(request.model_type, ModelType::Classification);
        assert!(state.is_busy());
    }

    #[test]
    fn train_failure_clears_busy_and_reports_error() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        state.set_target("y").unwrap();
        let Some(Effect::Train { seq, .. }) = state.begin_train() else {
            panic!("expected a train effect");
        };
        state.apply_train_outcome(seq, Err(server_error()));
        assert!(!state.is_busy());
        assert!(state.train_report().is_none());
        let status = state.status().unwrap();
        assert_eq!(status.text(), "Error training model.");
        assert_eq!(status.severity(), Severity::Error);
    }

    #[test]
    fn stale_train_outcome_is_discarded() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        state.set_target("y").unwrap();

        let Some(Effect::Train { seq: first, .. }) = state.begin_train() else {
            panic!("expected a train effect");
        };
        let Some(Effect::Train { seq: second, .. }) = state.begin_train() else {
            panic!("expected a train effect");
        };

        let stale = TrainReport {
            mse: Some(1.0),
            ..TrainReport::default()
        };
        state.apply_train_outcome(first, Ok(stale));
        assert!(state.train_report().is_none());
        assert!(state.is_busy());

        let fresh = TrainReport {
            mse: Some(2.0),
            ..TrainReport::default()
        };
        state.apply_train_outcome(second, Ok(fresh));
        assert_eq!(state.train_report().unwrap().mse, Some(2.0));
        assert!(!state.is_busy());
    }

    #[test]
    fn prediction_inputs_merge_without_clearing() {
        let mut state = uploaded();
        state.update_prediction_input("a", "1");
        state.update_prediction_input("b", "2");
        state.update_prediction_input("a", "3");
        assert_eq!(state.prediction_input().get("a"), Some(&"3".to_string()));
        assert_eq!(state.prediction_input().get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn predict_without_input_is_refused() {
        let mut state = uploaded();
        assert_eq!(state.begin_predict(), None);
        assert_eq!(
            state.status().unwrap().text(),
            "Please enter data for prediction."
        );
        assert!(!state.is_busy());
    }

    #[test]
    fn predict_without_session_is_refused() {
        let mut state = WorkflowState::default();
        state.update_prediction_input("a", "1");
        assert_eq!(state.begin_predict(), None);
        assert_eq!(
            state.status().unwrap().text(),
            "Please upload a dataset first."
        );
    }

    #[test]
    fn predict_effect_carries_session_and_input() {
        let mut state = uploaded();
        state.toggle_feature("a").unwrap();
        state.update_prediction_input("a", "1.5");

        let effect = state.begin_predict().unwrap();
        let Effect::Predict { seq, request } = effect else {
            panic!("expected a predict effect");
        };
        assert_eq!(seq, 1);
        assert_eq!(request.session_id, SessionId("s1".into()));
        assert_eq!(request.features, ["a"]);
        assert_eq!(request.data.get("a"), Some(&"1.5".to_string()));
        assert!(state.is_busy());
    }

    #[test]
    fn stale_predict_outcome_is_discarded() {
        let mut state = uploaded();
        state.update_prediction_input("a", "1");

        let Some(Effect::Predict { seq: first, .. }) = state.begin_predict() else {
            panic!("expected a predict effect");
        };
        let Some(Effect::Predict { seq: second, .. }) = state.begin_predict() else {
            panic!("expected a predict effect");
        };

        state.apply_predict_outcome(first, Ok(serde_json::json!({"prediction": 1})));
        assert!(state.prediction().is_none());

        state.apply_predict_outcome(second, Ok(serde_json::json!({"prediction": 2})));
        assert_eq!(
            state.prediction(),
            Some(&serde_json::json!({"prediction": 2}))
        );
        assert!(!state.is_busy());
    }

    #[test]
    fn predict_failure_clears_busy_and_reports_error() {
        let mut state = uploaded();
        state.update_prediction_input("a", "1");
        let Some(Effect::Predict { seq, .. }) = state.begin_predict() else {
            panic!("expected a predict effect");
        };
        state.apply_predict_outcome(seq, Err(server_error()));
        assert!(!state.is_busy());
        assert!(state.prediction().is_none());
        assert_eq!(state.status().unwrap().text(), "Error making prediction.");
    }
}
