use std::fmt;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://llm.api.cloud.yandex.net/foundationModels/v1";

const FOLDER_HEADER: &str = "x-folder-id";

/// Endpoint paths under the Foundation Models base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Completion,
    TextEmbedding,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::TextEmbedding => "textEmbedding",
        }
    }

    /// Joins the endpoint path onto `base_url`, tolerating a trailing slash.
    pub fn url(self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.path())
    }
}

/// Credential sent in the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    ApiKey(String),
    Bearer(String),
}

impl Authorization {
    /// Picks the IAM token over the API key when both are configured.
    pub fn resolve(iam_token: Option<&str>, api_key: Option<&str>) -> Option<Self> {
        fn usable(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|value| !value.is_empty())
        }
        usable(iam_token)
            .map(|token| Self::Bearer(token.to_string()))
            .or_else(|| usable(api_key).map(|key| Self::ApiKey(key.to_string())))
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "Api-key",
            Self::Bearer(_) => "Bearer",
        }
    }

    fn header_value(&self) -> Result<HeaderValue, ClientError> {
        let secret = match self {
            Self::ApiKey(value) | Self::Bearer(value) => value,
        };
        let mut value = HeaderValue::from_str(&format!("{} {secret}", self.scheme()))
            .map_err(|_| ClientError::InvalidHeader("Authorization"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

// Keeps secrets out of `{:?}` output and therefore out of logs.
impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authorization({} <redacted>)", self.scheme())
    }
}

/// Builds the header set shared by every Foundation Models request.
pub fn request_headers(
    folder_id: Option<&str>,
    auth: &Authorization,
) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    if let Some(folder_id) = folder_id {
        let value = HeaderValue::from_str(folder_id)
            .map_err(|_| ClientError::InvalidHeader("x-folder-id"))?;
        headers.insert(HeaderName::from_static(FOLDER_HEADER), value);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, auth.header_value()?);
    Ok(headers)
}

/// `gpt://{folder}/{model}/latest`
pub fn completion_model_uri(folder_id: &str, model: &str) -> String {
    format!("gpt://{folder_id}/{model}/latest")
}

/// `emb://{folder}/{model}/latest`
pub fn embedding_model_uri(folder_id: &str, model: &str) -> String {
    format!("emb://{folder_id}/{model}/latest")
}

/// Returns the trimmed value when it carries any text.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Role-tagged message text as sent in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Failure of any Foundation Models client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} must be provided")]
    MissingCredentials(&'static str),

    #[error("{0} header value contains invalid characters")]
    InvalidHeader(&'static str),

    #[error("stop sequences are not supported by this integration")]
    StopNotSupported,

    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("unexpected response structure: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout(source)
        } else {
            Self::Request(source)
        }
    }
}
