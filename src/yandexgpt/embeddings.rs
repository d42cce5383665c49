use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::yandexgpt::provider::{
    Authorization, ClientError, DEFAULT_BASE_URL, Endpoint, embedding_model_uri, non_blank,
    request_headers,
};
use crate::yandexgpt::transport;

pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Embedding model variant; documents and queries use separate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingModel {
    Document,
    Query,
}

impl EmbeddingModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "text-search-doc",
            Self::Query => "text-search-query",
        }
    }
}

/// Body of `POST {base}/textEmbedding`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRequest {
    pub model_uri: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// Anything that turns texts into vectors for similarity search.
pub trait Embeddings {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, ClientError>;

    fn embed_query(&self, text: &str) -> Result<Vec<f64>, ClientError>;
}

/// Construction parameters for [`EmbeddingClient`].
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub folder_id: Option<String>,
    pub api_key: Option<String>,
    pub iam_token: Option<String>,
    /// Pause after each query and between document calls; zero disables it.
    pub sleep_interval: Duration,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            folder_id: None,
            api_key: None,
            iam_token: None,
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
            base_url: None,
            timeout: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn with_api_key(folder_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            folder_id: Some(folder_id.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_iam_token(folder_id: impl Into<String>, iam_token: impl Into<String>) -> Self {
        Self {
            folder_id: Some(folder_id.into()),
            iam_token: Some(iam_token.into()),
            ..Self::default()
        }
    }

    pub fn sleep_interval(mut self, interval: Duration) -> Self {
        self.sleep_interval = interval;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn fallback_to(mut self, defaults: &Settings) -> Self {
        self.folder_id = non_blank(self.folder_id).or_else(|| defaults.folder_id.clone());
        self.api_key = non_blank(self.api_key).or_else(|| defaults.api_key.clone());
        self.iam_token = non_blank(self.iam_token).or_else(|| defaults.iam_token.clone());
        self
    }
}

/// Text embedding client.
///
/// Calls are paced with a blocking sleep on the calling thread so that bulk
/// indexing stays under the provider's request rate.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    folder_id: String,
    endpoint: String,
    headers: HeaderMap,
    sleep_interval: Duration,
    http: Client,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, ClientError> {
        let folder_id = non_blank(config.folder_id)
            .ok_or(ClientError::MissingCredentials("Yandex Cloud folder_id"))?;
        let auth = Authorization::resolve(config.iam_token.as_deref(), config.api_key.as_deref())
            .ok_or(ClientError::MissingCredentials("an IAM token or api_key"))?;

        let headers = request_headers(Some(&folder_id), &auth)?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let http = transport::http_client(config.timeout)?;

        debug!(
            folder_id = %folder_id,
            auth = auth.scheme(),
            sleep_ms = config.sleep_interval.as_millis() as u64,
            "embedding client initialized"
        );
        Ok(Self {
            folder_id,
            endpoint: Endpoint::TextEmbedding.url(base_url),
            headers,
            sleep_interval: config.sleep_interval,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request(&self, model: EmbeddingModel, text: &str) -> EmbeddingRequest {
        EmbeddingRequest {
            model_uri: embedding_model_uri(&self.folder_id, model.as_str()),
            text: text.to_string(),
        }
    }

    pub fn embed(&self, model: EmbeddingModel, text: &str) -> Result<Vec<f64>, ClientError> {
        let payload = self.request(model, text);
        let response =
            transport::post_json(&self.http, &self.endpoint, self.headers.clone(), &payload)?;
        let body: EmbeddingResponse = transport::read_json(response)?;
        debug!(model = model.as_str(), dim = body.embedding.len(), "embedding computed");
        Ok(body.embedding)
    }

    pub fn embed_document(&self, text: &str) -> Result<Vec<f64>, ClientError> {
        self.embed(EmbeddingModel::Document, text)
    }

    /// Embeds a search query, then pauses for the configured interval.
    pub fn embed_query(&self, text: &str) -> Result<Vec<f64>, ClientError> {
        let vector = self.embed(EmbeddingModel::Query, text)?;
        self.pause();
        Ok(vector)
    }

    /// Embeds every text as a document, in order, pausing between calls.
    ///
    /// Stops at the first failure; no partial result is returned.
    pub fn embed_many<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f64>>, ClientError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            if index > 0 {
                self.pause();
            }
            vectors.push(self.embed_document(text.as_ref())?);
        }
        Ok(vectors)
    }

    fn pause(&self) {
        if !self.sleep_interval.is_zero() {
            thread::sleep(self.sleep_interval);
        }
    }
}

impl Embeddings for EmbeddingClient {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, ClientError> {
        self.embed_many(texts)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f64>, ClientError> {
        EmbeddingClient::embed_query(self, text)
    }
}
