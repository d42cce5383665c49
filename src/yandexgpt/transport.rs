use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::yandexgpt::provider::ClientError;

const BODY_PREVIEW_CHARS: usize = 512;

/// Builds a blocking client; `None` disables the whole-request deadline.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<Client, ClientError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Sends one JSON POST and turns non-2xx statuses into [`ClientError::Api`].
pub(crate) fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    payload: &T,
) -> Result<Response, ClientError> {
    debug!(url, "sending request");
    let response = client.post(url).headers(headers).json(payload).send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ClientError::Api {
            status,
            body: preview(&body),
        });
    }
    Ok(response)
}

/// Reads the body and decodes it, keeping a preview of the text on failure.
pub(crate) fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.text()?;
    serde_json::from_str(&body)
        .map_err(|err| ClientError::MalformedResponse(format!("{err}: {}", preview(&body))))
}

fn preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn preview_keeps_short_bodies() {
        assert_eq!(preview("{\"error\":1}"), "{\"error\":1}");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let body = "я".repeat(600);
        let cut = preview(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 512 + 3);
    }
}
