use trainbench_client::{PredictRequest, TrainRequest};

/// A request the surface should issue on behalf of the controller.
///
/// Each variant except [`Effect::Probe`] carries the sequence number that
/// must be echoed back through the matching `apply_*_outcome` call. The
/// controller uses it to discard responses a newer request has superseded.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// One-time liveness probe of the service root; outcome is logged only.
    Probe,
    /// Multipart dataset upload.
    Upload {
        seq: u64,
        file_name: String,
        bytes: Vec<u8>,
    },
    /// Training request.
    Train { seq: u64, request: TrainRequest },
    /// Prediction request.
    Predict { seq: u64, request: PredictRequest },
}
