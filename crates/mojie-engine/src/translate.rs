use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error_chain_text;
use crate::transport::Transport;

pub const TRANSLATE_PATH: &str = "/api/image/translate";

/// Text → English translation used before prompts reach the providers.
pub trait Translator: Send + Sync {
    fn to_english(&self, text: &str) -> Result<String>;
}

/// Calls the backend's translate endpoint.
pub struct RemoteTranslator {
    transport: Arc<dyn Transport>,
}

impl RemoteTranslator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Translator for RemoteTranslator {
    fn to_english(&self, text: &str) -> Result<String> {
        let response = self
            .transport
            .post_json(TRANSLATE_PATH, &json!({ "text": text }))
            .context("translation request failed")?;
        response
            .get("data")
            .and_then(|data| data.get("translated_text"))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .context("translation response carried no translated_text")
    }
}

/// English text for `text`, or `None` when translation failed. Failures are
/// logged and never surface to the caller.
pub fn translate_or_none(translator: &dyn Translator, text: &str) -> Option<String> {
    match translator.to_english(text) {
        Ok(english) => {
            debug!(chars = text.chars().count(), "translated prompt text");
            Some(english)
        }
        Err(err) => {
            warn!(error = %error_chain_text(&err, 256), "translation failed; keeping original text");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::bail;
    use serde_json::json;

    use super::{translate_or_none, RemoteTranslator, Translator};
    use crate::testing::FakeTransport;

    struct BrokenTranslator;

    impl Translator for BrokenTranslator {
        fn to_english(&self, _text: &str) -> anyhow::Result<String> {
            bail!("translator offline")
        }
    }

    #[test]
    fn remote_translator_reads_translated_text() -> anyhow::Result<()> {
        let transport = Arc::new(FakeTransport::replying(
            json!({"data": {"translated_text": "red cup"}}),
        ));
        let translator = RemoteTranslator::new(transport.clone());

        assert_eq!(translator.to_english("红色杯子")?, "red cup");
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/api/image/translate");
        assert_eq!(calls[0].body, json!({"text": "红色杯子"}));
        Ok(())
    }

    #[test]
    fn empty_translation_is_an_error() {
        let transport = Arc::new(FakeTransport::replying(
            json!({"data": {"translated_text": "  "}}),
        ));
        let translator = RemoteTranslator::new(transport);
        assert!(translator.to_english("红色").is_err());
    }

    #[test]
    fn failures_fall_back_to_none() {
        assert_eq!(translate_or_none(&BrokenTranslator, "红色"), None);
        let transport = Arc::new(FakeTransport::failing("gateway timeout"));
        assert_eq!(
            translate_or_none(&RemoteTranslator::new(transport), "红色"),
            None
        );
    }
}
