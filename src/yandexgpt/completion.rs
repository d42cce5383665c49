use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::yandexgpt::provider::{
    Authorization, ClientError, DEFAULT_BASE_URL, Endpoint, Message, completion_model_uri,
    non_blank, request_headers,
};
use crate::yandexgpt::transport;

pub const DEFAULT_MODEL: &str = "yandexgpt";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request-level generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// `completionOptions` object of the request envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub stream: bool,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Body of `POST {base}/completion`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model_uri: String,
    pub completion_options: CompletionOptions,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// Builds the two-message envelope: the instruction, then the prompt.
    pub fn new(
        folder_id: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        instruction: &str,
        prompt: &str,
    ) -> Self {
        Self {
            model_uri: completion_model_uri(folder_id, model),
            completion_options: CompletionOptions {
                stream: false,
                temperature,
                max_tokens,
            },
            messages: vec![Message::system(instruction), Message::user(prompt)],
        }
    }
}

/// Completion response, decoded leniently so a missing shape is not a decode error.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    result: Option<CompletionResult>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    message: Option<Map<String, Value>>,
}

impl CompletionResponse {
    /// Text of the first alternative, `None` when there is no first message
    /// or it is an empty object.
    pub(crate) fn into_first_text(self) -> Option<String> {
        let first = self.result?.alternatives.into_iter().next()?;
        let message = first.message.filter(|message| !message.is_empty())?;
        let text = message.get("text").and_then(Value::as_str).unwrap_or_default();
        Some(text.to_string())
    }
}

/// Outcome of a completion exchange that reached a 2xx JSON response.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// Text of the first alternative; may be empty.
    Text(String),
    /// Parseable body without `result.alternatives[0].message`.
    Unexpected(Value),
}

/// Construction parameters for [`CompletionClient`].
#[derive(Debug, Clone, Default)]
pub struct CompletionConfig {
    pub folder_id: Option<String>,
    pub api_key: Option<String>,
    pub instruction: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl CompletionConfig {
    pub fn new(folder_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            folder_id: Some(folder_id.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fills a missing folder id or API key from `defaults`.
    pub fn fallback_to(mut self, defaults: &Settings) -> Self {
        self.folder_id = non_blank(self.folder_id).or_else(|| defaults.folder_id.clone());
        self.api_key = non_blank(self.api_key).or_else(|| defaults.api_key.clone());
        self
    }
}

/// Chat completion client that never raises on transport or API failures.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    folder_id: String,
    instruction: String,
    endpoint: String,
    headers: HeaderMap,
    http: Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, ClientError> {
        let (Some(folder_id), Some(api_key)) =
            (non_blank(config.folder_id), non_blank(config.api_key))
        else {
            return Err(ClientError::MissingCredentials(
                "Yandex Cloud folder_id and api_key",
            ));
        };

        let headers = request_headers(Some(&folder_id), &Authorization::ApiKey(api_key))?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let http = transport::http_client(Some(config.timeout.unwrap_or(DEFAULT_TIMEOUT)))?;

        debug!(folder_id = %folder_id, "completion client initialized");
        Ok(Self {
            folder_id,
            instruction: config.instruction.unwrap_or_default(),
            endpoint: Endpoint::Completion.url(base_url),
            headers,
            http,
        })
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Envelope that [`Self::complete`] would send for `prompt`.
    pub fn request(&self, prompt: &str, options: &GenerationOptions) -> CompletionRequest {
        CompletionRequest::new(
            &self.folder_id,
            &options.model,
            options.temperature,
            options.max_tokens,
            &self.instruction,
            prompt,
        )
    }

    /// Performs one completion call, reporting every failure as an error.
    pub fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, ClientError> {
        let payload = self.request(prompt, options);
        let response =
            transport::post_json(&self.http, &self.endpoint, self.headers.clone(), &payload)?;
        let body: Value = transport::read_json(response)?;

        let parsed = CompletionResponse::deserialize(&body).unwrap_or_default();
        Ok(match parsed.into_first_text() {
            Some(text) => Generation::Text(text),
            None => Generation::Unexpected(body),
        })
    }

    /// Returns the generated text, `Some("")` for an unexpected response shape,
    /// or `None` when the call itself failed. Failures are logged, not raised.
    pub fn generate(
        &self,
        prompt: &str,
        model_name: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Option<String> {
        let options = GenerationOptions {
            model: model_name.to_string(),
            max_tokens,
            temperature,
        };
        self.generate_with(prompt, &options)
    }

    pub fn generate_with(&self, prompt: &str, options: &GenerationOptions) -> Option<String> {
        match self.complete(prompt, options) {
            Ok(Generation::Text(text)) => Some(text),
            Ok(Generation::Unexpected(body)) => {
                warn!(%body, "LLM response structure unexpected");
                Some(String::new())
            }
            Err(err @ ClientError::Timeout(_)) => {
                warn!(error = %err, "YandexGPT API call timed out");
                None
            }
            Err(err) => {
                warn!(error = %err, "YandexGPT API call failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use mockito::{Matcher, Server};
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    fn client_for(server: &Server) -> CompletionClient {
        CompletionClient::new(
            CompletionConfig::new("b1g-folder", "AQVN-key")
                .with_instruction("You are a helpful assistant.")
                .with_base_url(server.url()),
        )
        .unwrap()
    }

    #[test]
    fn returns_text_of_first_alternative() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/completion")
            .match_header("x-folder-id", "b1g-folder")
            .match_header("authorization", "Api-key AQVN-key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "modelUri": "gpt://b1g-folder/yandexgpt/latest",
                "completionOptions": {"stream": false, "temperature": 0.1, "maxTokens": 1000},
                "messages": [
                    {"role": "system", "text": "You are a helpful assistant."},
                    {"role": "user", "text": "Hello"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":{"alternatives":[{"message":{"text":"Hi there!"}}]}}"#)
            .create();

        let client = client_for(&server);
        let text = client.generate("Hello", DEFAULT_MODEL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE);

        assert_eq!(text.as_deref(), Some("Hi there!"));
        mock.assert();
    }

    #[test]
    fn model_name_and_options_shape_the_envelope() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/completion")
            .match_body(Matcher::PartialJson(json!({
                "modelUri": "gpt://b1g-folder/yandexgpt-lite/latest",
                "completionOptions": {"temperature": 0.6, "maxTokens": 42}
            })))
            .with_status(200)
            .with_body(r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"ok"}}]}}"#)
            .create();

        let text = client_for(&server).generate("x", "yandexgpt-lite", 42, 0.6);
        assert_eq!(text.as_deref(), Some("ok"));
        mock.assert();
    }

    #[test]
    #[traced_test]
    fn empty_alternatives_yield_empty_string() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body(r#"{"result":{"alternatives":[]}}"#)
            .create();

        let text = client_for(&server).generate_with("Hello", &GenerationOptions::default());
        assert_eq!(text, Some(String::new()));
        assert!(logs_contain("LLM response structure unexpected"));
    }

    #[test]
    #[traced_test]
    fn missing_result_yields_empty_string() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body(r#"{"error":{"message":"quota"}}"#)
            .create();

        let client = client_for(&server);
        let outcome = client.complete("Hello", &GenerationOptions::default()).unwrap();
        assert!(matches!(outcome, Generation::Unexpected(_)));
        assert_eq!(
            client.generate_with("Hello", &GenerationOptions::default()),
            Some(String::new())
        );
        assert!(logs_contain("quota"));
    }

    #[test]
    fn message_without_text_yields_empty_string() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body(r#"{"result":{"alternatives":[{"message":{"role":"assistant"}}]}}"#)
            .create();

        let outcome = client_for(&server)
            .complete("Hello", &GenerationOptions::default())
            .unwrap();
        assert_eq!(outcome, Generation::Text(String::new()));
    }

    #[test]
    #[traced_test]
    fn empty_message_object_is_unexpected() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body(r#"{"result":{"alternatives":[{"message":{}}]}}"#)
            .expect(2)
            .create();

        let client = client_for(&server);
        let outcome = client.complete("Hello", &GenerationOptions::default()).unwrap();
        assert!(matches!(outcome, Generation::Unexpected(_)));
        assert_eq!(
            client.generate_with("Hello", &GenerationOptions::default()),
            Some(String::new())
        );
        assert!(logs_contain("LLM response structure unexpected"));
    }

    #[test]
    #[traced_test]
    fn timeout_yields_none() {
        // Accepted by the kernel backlog but never answered.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let client = CompletionClient::new(
            CompletionConfig::new("b1g-folder", "AQVN-key")
                .with_base_url(base_url)
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let err = client
            .complete("Hello", &GenerationOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        assert_eq!(client.generate_with("Hello", &GenerationOptions::default()), None);
        assert!(logs_contain("timed out"));
        drop(listener);
    }

    #[test]
    #[traced_test]
    fn http_error_yields_none() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(401)
            .with_body(r#"{"error":"unauthorized"}"#)
            .create();

        let client = client_for(&server);
        assert_eq!(client.generate("Hello", DEFAULT_MODEL, 10, 0.1), None);
        assert!(logs_contain("YandexGPT API call failed"));
        assert!(logs_contain("401"));
    }

    #[test]
    fn non_json_body_yields_none() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body("<html>bad gateway</html>")
            .create();

        let client = client_for(&server);
        let err = client
            .complete("Hello", &GenerationOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
        assert_eq!(client.generate_with("Hello", &GenerationOptions::default()), None);
    }

    #[test]
    fn missing_credentials_fail_before_any_request() {
        let err = CompletionClient::new(CompletionConfig::default().fallback_to(&Settings::default()))
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingCredentials(_)));
        assert!(err.to_string().contains("folder_id and api_key"));

        let config = CompletionConfig {
            folder_id: Some("b1g".into()),
            api_key: Some("   ".into()),
            ..CompletionConfig::default()
        };
        assert!(CompletionClient::new(config).is_err());
    }

    #[test]
    fn defaults_fill_missing_credentials_only() {
        let defaults = Settings {
            folder_id: Some("b1g-default".into()),
            api_key: Some("AQVN-default".into()),
            iam_token: None,
        };
        let config = CompletionConfig {
            folder_id: Some("b1g-explicit".into()),
            ..CompletionConfig::default()
        }
        .fallback_to(&defaults);

        assert_eq!(config.folder_id.as_deref(), Some("b1g-explicit"));
        assert_eq!(config.api_key.as_deref(), Some("AQVN-default"));
        let client = CompletionClient::new(config).unwrap();
        assert_eq!(client.folder_id(), "b1g-explicit");
    }

    #[test]
    fn envelope_has_system_then_user_message() {
        let request = CompletionRequest::new("b1g", "yandexgpt", 0.3, 200, "", "Hi");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "modelUri": "gpt://b1g/yandexgpt/latest",
                "completionOptions": {"stream": false, "temperature": 0.3, "maxTokens": 200},
                "messages": [
                    {"role": "system", "text": ""},
                    {"role": "user", "text": "Hi"}
                ]
            })
        );
    }
}
