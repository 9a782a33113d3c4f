//! HTTP client for a remote tabular-model training service.
//!
//! The service owns all heavy lifting: dataset parsing, model fitting,
//! hyperparameter search, and prediction. This crate only speaks its wire
//! contract: a multipart `POST upload`, JSON `POST train` / `POST predict`,
//! and a `GET /` liveness probe.

mod error;

pub use crate::error::ClientError;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Service endpoint used when no `--server` override is given.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000/";

/// Identifier handed out by the service after an upload. Correlates every
/// later train/predict call with the server-side parsed dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model family the service should fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    #[default]
    Regression,
    Classification,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Regression, ModelType::Classification];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Regression => "Regression",
            ModelType::Classification => "Classification",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column catalog and session returned by a successful upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub columns: Vec<String>,
    pub session_id: SessionId,
}

/// Payload for `POST train`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub session_id: SessionId,
    /// Feature columns, in the order importance scores are reported back.
    pub features: Vec<String>,
    pub target: String,
    pub model_type: ModelType,
}

/// Evaluation artifacts returned by `POST train`. Which fields come back
/// depends on the model family and the server-side search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub mse: Option<f64>,
    pub best_params: Option<serde_json::Map<String, Value>>,
    pub feature_importances: Option<Vec<f64>>,
}

impl TrainReport {
    /// Pair importance scores with the feature order used for training.
    /// Extra scores (or extra features) past the shorter list are dropped.
    pub fn importance_pairs(&self, features: &[String]) -> Vec<(String, f64)> {
        let Some(scores) = &self.feature_importances else {
            return Vec::new();
        };
        features.iter().cloned().zip(scores.iter().copied()).collect()
    }
}

/// Payload for `POST predict`. `data` maps feature name to the raw value
/// string the user entered; the service does its own coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub session_id: SessionId,
    pub features: Vec<String>,
    pub data: BTreeMap<String, String>,
}

/// Typed HTTP client for a trainbench model training service.
#[derive(Clone)]
pub struct TrainerClient {
    base_url: Url,
    http: Client,
}

impl TrainerClient {
    /// Create a new client with the provided base URL (e.g. `http://localhost:8000/`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Self::with_http_client(
            base_url,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    /// Use an existing reqwest client (useful for custom TLS or timeouts).
    pub fn with_http_client(
        base_url: impl AsRef<str>,
        http: Client,
    ) -> Result<Self, ClientError> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
        })
    }

    /// Expose the underlying base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Probe the service root. Returns the raw body for diagnostic logging.
    pub async fn ping(&self) -> Result<String, ClientError> {
        let response = self.http.get(self.base_url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        Ok(response.text().await?)
    }

    /// Upload a dataset; the service parses it and opens a session.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ClientError> {
        let url = self.base_url.join("upload")?;
        let part = Part::bytes(bytes).file_name(file_name.to_owned());
        let form = Form::new().part("file", part);
        let response = self.http.post(url).multipart(form).send().await?;
        Self::map_response(response).await
    }

    /// Fit a model on an uploaded dataset.
    pub async fn train(&self, request: &TrainRequest) -> Result<TrainReport, ClientError> {
        self.post_json("train", request).await
    }

    /// Request a prediction from a trained session. The response shape is
    /// defined by the service, so it is returned verbatim.
    pub async fn predict(&self, request: &PredictRequest) -> Result<Value, ClientError> {
        self.post_json("predict", request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let response = self.http.post(url).json(body).send().await?;
        Self::map_response(response).await
    }

    async fn map_response<T>(response: Response) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn map_api_error(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_slice::<ApiErrorBody>(&bytes) {
            return ClientError::server(
                status,
                api_error.code.unwrap_or_else(|| "unknown".into()),
                api_error.message.unwrap_or_else(|| "request failed".into()),
            );
        }
        let text = String::from_utf8_lossy(&bytes).to_string();
        ClientError::server(status, "http_error", text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}
