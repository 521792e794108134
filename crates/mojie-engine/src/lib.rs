use std::env;

pub mod loading;
pub mod payload;
pub mod submit;
pub mod translate;
pub mod transport;

pub use loading::{LoadingGate, DEFAULT_UNLOCK_DELAY};
pub use payload::{
    ColorAdjustRequest, ExpandRequest, Intent, IntentRequest, InternalSupplementRequest,
    JobPayload, RefineRequest, RemovalRequest, ReplaceRequest,
};
pub use submit::{GenerationTarget, JobSubmitter, SubmissionReceipt, ELIMINATE_EVENT};
pub use translate::{RemoteTranslator, Translator};
pub use transport::{HttpTransport, Transport};

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Flattens an error chain into one log-friendly line.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use anyhow::{anyhow, bail, Result};
    use serde_json::{Map, Value};

    use crate::translate::Translator;
    use crate::transport::Transport;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub kind: &'static str,
        pub path: String,
        pub body: Value,
    }

    /// Records every call and answers with one canned reply.
    pub struct FakeTransport {
        reply: std::result::Result<Value, String>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl FakeTransport {
        pub fn replying(reply: Value) -> Self {
            Self {
                reply: Ok(reply),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }

        fn record(&self, kind: &'static str, path: &str, body: Value) -> Result<Value> {
            self.calls
                .lock()
                .map_err(|_| anyhow!("fake transport lock poisoned"))?
                .push(RecordedCall {
                    kind,
                    path: path.to_string(),
                    body,
                });
            match &self.reply {
                Ok(value) => Ok(value.clone()),
                Err(message) => bail!("{message}"),
            }
        }
    }

    impl Transport for FakeTransport {
        fn post_form(&self, path: &str, form: &Map<String, Value>) -> Result<Value> {
            self.record("form", path, Value::Object(form.clone()))
        }

        fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
            self.record("json", path, body.clone())
        }
    }

    pub struct FakeTranslator {
        answer: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTranslator {
        pub fn answering(answer: &str) -> Self {
            Self {
                answer: Some(answer.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                answer: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    impl Translator for FakeTranslator {
        fn to_english(&self, text: &str) -> Result<String> {
            self.calls
                .lock()
                .map_err(|_| anyhow!("fake translator lock poisoned"))?
                .push(text.to_string());
            self.answer
                .clone()
                .ok_or_else(|| anyhow!("translation service unavailable"))
        }
    }
}
