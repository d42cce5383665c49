use std::collections::BTreeMap;

use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::yandexgpt::completion::{CompletionRequest, CompletionResponse};
use crate::yandexgpt::provider::{
    Authorization, ClientError, DEFAULT_BASE_URL, Endpoint, request_headers,
};
use crate::yandexgpt::transport;

/// Synchronous "prompt in, text out" backend for generation pipelines.
pub trait TextGenerator {
    /// Short identifier of the backend family.
    fn llm_type(&self) -> &'static str;

    /// Generates text for `prompt`. Backends that cannot honour stop
    /// sequences must reject a `Some` value instead of ignoring it.
    fn call(&self, prompt: &str, stop: Option<&[String]>) -> Result<String, ClientError>;

    /// Parameters that distinguish this instance, e.g. for caching keys.
    fn identifying_params(&self) -> BTreeMap<String, Value>;
}

/// YandexGPT backend for [`TextGenerator`] pipelines.
///
/// Settings are plain fields so the instance can be configured the way a
/// pipeline definition would. Requests carry no timeout.
#[derive(Debug, Clone)]
pub struct YandexLlm {
    pub api_key: Option<String>,
    pub iam_token: Option<String>,
    pub folder_id: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub instruction: Option<String>,
    pub base_url: String,
    http: Client,
}

impl YandexLlm {
    pub const MODEL: &'static str = "yandexgpt";

    pub fn new(folder_id: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            api_key: None,
            iam_token: None,
            folder_id: folder_id.into(),
            max_tokens: 1500,
            temperature: 1.0,
            instruction: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: transport::http_client(None)?,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_iam_token(mut self, iam_token: impl Into<String>) -> Self {
        self.iam_token = Some(iam_token.into());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl TextGenerator for YandexLlm {
    fn llm_type(&self) -> &'static str {
        "yagpt"
    }

    fn call(&self, prompt: &str, stop: Option<&[String]>) -> Result<String, ClientError> {
        if stop.is_some() {
            return Err(ClientError::StopNotSupported);
        }

        let auth = Authorization::resolve(self.iam_token.as_deref(), self.api_key.as_deref())
            .ok_or(ClientError::MissingCredentials("an IAM token or api_key"))?;
        let headers = request_headers(Some(&self.folder_id), &auth)?;
        let payload = CompletionRequest::new(
            &self.folder_id,
            Self::MODEL,
            self.temperature,
            self.max_tokens,
            self.instruction.as_deref().unwrap_or_default(),
            prompt,
        );

        debug!(auth = auth.scheme(), max_tokens = self.max_tokens, "calling YandexGPT");
        let url = Endpoint::Completion.url(&self.base_url);
        let response = transport::post_json(&self.http, &url, headers, &payload)?;
        let body: CompletionResponse = transport::read_json(response)?;
        body.into_first_text().ok_or_else(|| {
            ClientError::MalformedResponse("missing result.alternatives[0].message".to_string())
        })
    }

    fn identifying_params(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("max_tokens".to_string(), json!(self.max_tokens)),
            ("temperature".to_string(), json!(self.temperature)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    #[test]
    fn stop_sequences_are_rejected_without_a_request() {
        let mut server = Server::new();
        let mock = server.mock("POST", "/completion").expect(0).create();

        let llm = YandexLlm::new("b1g-folder")
            .unwrap()
            .with_api_key("AQVN-key")
            .with_base_url(server.url());
        let stop = vec!["\n".to_string()];
        let err = llm.call("Hello", Some(stop.as_slice())).unwrap_err();

        assert!(matches!(err, ClientError::StopNotSupported));
        mock.assert();
    }

    #[test]
    fn call_uses_fixed_model_and_instance_settings() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/completion")
            .match_header("authorization", "Bearer t1.iam")
            .match_header("x-folder-id", "b1g-folder")
            .match_body(Matcher::Json(json!({
                "modelUri": "gpt://b1g-folder/yandexgpt/latest",
                "completionOptions": {"stream": false, "temperature": 0.4, "maxTokens": 64},
                "messages": [
                    {"role": "system", "text": "Answer in one word."},
                    {"role": "user", "text": "Capital of France?"}
                ]
            })))
            .with_body(r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"Paris"}}]}}"#)
            .create();

        let mut llm = YandexLlm::new("b1g-folder")
            .unwrap()
            .with_api_key("AQVN-key")
            .with_iam_token("t1.iam")
            .with_instruction("Answer in one word.")
            .with_base_url(server.url());
        llm.temperature = 0.4;
        llm.max_tokens = 64;

        assert_eq!(llm.call("Capital of France?", None).unwrap(), "Paris");
        mock.assert();
    }

    #[test]
    fn http_failure_propagates() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_status(500)
            .with_body("internal")
            .create();

        let llm = YandexLlm::new("b1g-folder")
            .unwrap()
            .with_api_key("AQVN-key")
            .with_base_url(server.url());
        let err = llm.call("Hello", None).unwrap_err();
        assert!(matches!(err, ClientError::Api { .. }));
    }

    #[test]
    fn missing_alternatives_propagate() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/completion")
            .with_body(r#"{"result":{"alternatives":[]}}"#)
            .create();

        let llm = YandexLlm::new("b1g-folder")
            .unwrap()
            .with_api_key("AQVN-key")
            .with_base_url(server.url());
        let err = llm.call("Hello", None).unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
    }

    #[test]
    fn missing_credentials_fail_before_a_request() {
        let mut server = Server::new();
        let mock = server.mock("POST", "/completion").expect(0).create();

        let llm = YandexLlm::new("b1g-folder").unwrap().with_base_url(server.url());
        let err = llm.call("Hello", None).unwrap_err();
        assert!(matches!(err, ClientError::MissingCredentials(_)));
        mock.assert();
    }

    #[test]
    fn identifying_params_and_type() {
        let llm = YandexLlm::new("b1g-folder").unwrap();
        let generator: &dyn TextGenerator = &llm;

        assert_eq!(generator.llm_type(), "yagpt");
        let params = generator.identifying_params();
        assert_eq!(params["max_tokens"], json!(1500));
        assert_eq!(params["temperature"], json!(1.0));
        assert_eq!(params.len(), 2);
    }
}
