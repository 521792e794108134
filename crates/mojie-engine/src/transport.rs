use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use serde_json::{Map, Value};

use crate::{non_empty_env, truncate_text};

const DEFAULT_API_BASE: &str = "http://127.0.0.1:9152";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Outbound calls to the image backend. Paths are relative to the API base.
pub trait Transport: Send + Sync {
    /// Form-urlencoded POST, used by the editing workflows.
    fn post_form(&self, path: &str, form: &Map<String, Value>) -> Result<Value>;
    /// JSON POST, used by generation, retry and translation.
    fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
}

pub struct HttpTransport {
    api_base: String,
    token: Option<String>,
    http: HttpClient,
}

impl HttpTransport {
    /// Reads `MOJIE_API_BASE` and `MOJIE_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let api_base = non_empty_env("MOJIE_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(api_base, non_empty_env("MOJIE_API_TOKEN"))
    }

    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, path: &str, form: &Map<String, Value>) -> Result<Value> {
        let endpoint = self.url(path);
        let fields: Vec<(String, String)> = form
            .iter()
            .map(|(key, value)| (key.clone(), json_value_to_form_text(value)))
            .collect();
        let response = self
            .authorize(self.http.post(&endpoint))
            .form(&fields)
            .send()
            .with_context(|| format!("request failed ({endpoint})"))?;
        response_json_or_error(path, response)
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let endpoint = self.url(path);
        let response = self
            .authorize(self.http.post(&endpoint))
            .json(body)
            .send()
            .with_context(|| format!("request failed ({endpoint})"))?;
        response_json_or_error(path, response)
    }
}

pub(crate) fn json_value_to_form_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(raw) => raw.to_string(),
        Value::Number(raw) => raw.to_string(),
        Value::String(raw) => raw.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn response_json_or_error(path: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{path} response body read failed"))?;
    if !status.is_success() {
        bail!("{path} request failed ({code}): {}", truncate_text(&body, 512));
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{path} returned invalid JSON payload"))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::{json, Map, Value};

    use super::{json_value_to_form_text, HttpTransport, Transport};

    #[test]
    fn post_form_encodes_fields_and_bearer_token() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/image/image_fine_detail_product")
            .match_header("authorization", "Bearer tok-1")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("level".into(), "50".into()),
                Matcher::UrlEncoded("description".into(), "refine".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"data": {"conversation_id": 5}}"#)
            .create();

        let transport = HttpTransport::new(format!("{}/", server.url()), Some("tok-1".into()))?;
        let mut form = Map::new();
        form.insert("level".to_string(), json!(50));
        form.insert("description".to_string(), json!("refine"));
        let body = transport.post_form("/api/image/image_fine_detail_product", &form)?;

        assert_eq!(body["data"]["conversation_id"], json!(5));
        mock.assert();
        Ok(())
    }

    #[test]
    fn post_json_sends_body() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/image/translate")
            .match_body(Matcher::Json(json!({"text": "红色"})))
            .with_status(200)
            .with_body(r#"{"data": {"translated_text": "red"}}"#)
            .create();

        let transport = HttpTransport::new(server.url(), None)?;
        let body = transport.post_json("api/image/translate", &json!({"text": "红色"}))?;

        assert_eq!(body["data"]["translated_text"], json!("red"));
        mock.assert();
        Ok(())
    }

    #[test]
    fn non_success_status_is_an_error_with_body() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/image/tasks/7/retry")
            .with_status(500)
            .with_body("upstream exploded")
            .create();

        let transport = HttpTransport::new(server.url(), None)?;
        let err = transport
            .post_json("/api/image/tasks/7/retry", &Value::Null)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(
            err,
            "/api/image/tasks/7/retry request failed (500): upstream exploded"
        );
        Ok(())
    }

    #[test]
    fn invalid_json_is_reported() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/image/color_adjustment")
            .with_status(200)
            .with_body("<html>")
            .create();

        let transport = HttpTransport::new(server.url(), None)?;
        let err = transport
            .post_form("/api/image/color_adjustment", &Map::new())
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("invalid JSON payload"));
        Ok(())
    }

    #[test]
    fn form_text_flattens_json_values() {
        assert_eq!(json_value_to_form_text(&json!("a b")), "a b");
        assert_eq!(json_value_to_form_text(&json!(3)), "3");
        assert_eq!(json_value_to_form_text(&Value::Null), "");
        assert_eq!(
            json_value_to_form_text(&json!({"type": "refine"})),
            r#"{"type":"refine"}"#
        );
    }
}
