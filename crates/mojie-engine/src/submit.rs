use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use mojie_contracts::events::{EventPayload, EventSink};
use mojie_contracts::providers::ProviderFamily;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::loading::{LoadingGate, DEFAULT_UNLOCK_DELAY};
use crate::payload::{self, Intent, IntentRequest, JobPayload};
use crate::transport::Transport;
use crate::translate::{translate_or_none, Translator};
use crate::{error_chain_text, non_empty_env};

pub const ELIMINATE_EVENT: &str = "eliminate_submitted";

/// Generation backends a new job can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationTarget {
    Gpt,
    Gemini,
    Flex,
    /// Flux-Kontext served through the Qihua pipeline.
    QihuaKontext,
    Volcengine,
}

impl GenerationTarget {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Gpt => "/api/image/image_ChatGPT_OPENAI_API_product",
            Self::Gemini => "/api/image/image_Gemini_API_product",
            Self::Flex => "/api/image/flux-kontext-pro/image/flux/generation/",
            Self::QihuaKontext => "/api/image/flux-kontext-pro/image/generation/",
            Self::Volcengine => "/api/image/image_Volcengine_SDK_API_product",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gpt" | "gpt-4o-image" => Some(Self::Gpt),
            "gemini" => Some(Self::Gemini),
            "flex" => Some(Self::Flex),
            "qihua-kontext" | "flux_kontext_pro_1" => Some(Self::QihuaKontext),
            "volcengine" | "qihua" => Some(Self::Volcengine),
            _ => None,
        }
    }

    pub fn family(self) -> ProviderFamily {
        match self {
            Self::Gpt => ProviderFamily::Gpt,
            Self::Gemini => ProviderFamily::Gemini,
            Self::Flex => ProviderFamily::Flex,
            Self::QihuaKontext | Self::Volcengine => ProviderFamily::Qihua,
        }
    }
}

/// What an accepted submission sent and got back.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub payload: JobPayload,
    pub response: Value,
    pub conversation_id: Option<String>,
}

impl SubmissionReceipt {
    pub fn intent(&self) -> Intent {
        self.payload.intent
    }
}

/// Dispatches editing jobs. Completion is discovered by polling elsewhere;
/// nothing here tracks job state after the backend accepts a submission.
pub struct JobSubmitter {
    transport: Arc<dyn Transport>,
    translator: Arc<dyn Translator>,
    events: Option<Arc<dyn EventSink>>,
    loading: LoadingGate,
    unlock_delay: Duration,
}

impl JobSubmitter {
    pub fn new(transport: Arc<dyn Transport>, translator: Arc<dyn Translator>) -> Self {
        Self {
            transport,
            translator,
            events: None,
            loading: LoadingGate::new(),
            unlock_delay: unlock_delay_from_env(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_loading_gate(mut self, loading: LoadingGate) -> Self {
        self.loading = loading;
        self
    }

    pub fn with_unlock_delay(mut self, delay: Duration) -> Self {
        self.unlock_delay = delay;
        self
    }

    pub fn loading(&self) -> &LoadingGate {
        &self.loading
    }

    /// Fire-and-forget submission. Failures are logged and absorbed; the
    /// loading flag unlocks after the fixed delay either way.
    pub fn submit(&self, request: &IntentRequest) -> (Option<SubmissionReceipt>, JoinHandle<()>) {
        self.loading.engage();
        let receipt = match self.try_submit(request) {
            Ok(receipt) => Some(receipt),
            Err(err) => {
                warn!(
                    intent = %request.intent(),
                    error = %error_chain_text(&err, 512),
                    "job submission failed"
                );
                None
            }
        };
        let unlock = self.loading.arm_unlock(self.unlock_delay);
        (receipt, unlock)
    }

    /// Translate, build and send `request`, propagating transport errors.
    pub fn try_submit(&self, request: &IntentRequest) -> Result<SubmissionReceipt> {
        let english = request
            .translation_source()
            .and_then(|text| translate_or_none(self.translator.as_ref(), text));
        let payload = payload::build(request, english.as_deref());
        let response = self
            .transport
            .post_form(payload.path, &payload.form)
            .with_context(|| format!("{} submission rejected", payload.intent))?;
        let conversation_id = response_conversation_id(&response);
        info!(
            intent = %payload.intent,
            conversation_id = conversation_id.as_deref().unwrap_or(""),
            "job submitted"
        );

        let receipt = SubmissionReceipt {
            payload,
            response,
            conversation_id,
        };
        if receipt.intent() == Intent::Removal {
            self.emit_eliminate(&receipt);
        }
        Ok(receipt)
    }

    /// Sends an opaque generation payload to the target's endpoint.
    pub fn submit_generation(&self, target: GenerationTarget, body: &Value) -> Result<Value> {
        let response = self
            .transport
            .post_json(target.endpoint(), body)
            .with_context(|| format!("{} generation rejected", target.family()))?;
        info!(family = %target.family(), "generation submitted");
        Ok(response)
    }

    /// Asks the backend to re-run a task. Only ever user-triggered.
    pub fn retry(&self, task_id: &str) -> Result<Value> {
        let path = format!("/api/image/tasks/{}/retry", task_id.trim());
        let response = self
            .transport
            .post_json(&path, &Value::Null)
            .with_context(|| format!("retry of task {task_id} rejected"))?;
        info!(task_id, "task retry requested");
        Ok(response)
    }

    fn emit_eliminate(&self, receipt: &SubmissionReceipt) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let form = &receipt.payload.form;
        let mut payload = EventPayload::new();
        payload.insert("intent".to_string(), json!("eliminate"));
        payload.insert(
            "send_info".to_string(),
            json!({
                "description": form.get("description").cloned().unwrap_or(Value::Null),
                "url": form.get("url").cloned().unwrap_or(Value::Null),
                "mask_url": form.get("mask_url").cloned().unwrap_or(Value::Null),
            }),
        );
        payload.insert(
            "response".to_string(),
            receipt
                .response
                .get("data")
                .cloned()
                .unwrap_or(Value::Null),
        );
        payload.insert(
            "conversation_id".to_string(),
            receipt
                .conversation_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        if let Err(err) = events.emit(ELIMINATE_EVENT, payload) {
            warn!(error = %error_chain_text(&err, 256), "failed to emit eliminate event");
        }
    }
}

fn response_conversation_id(response: &Value) -> Option<String> {
    match response.get("data")?.get("conversation_id")? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn unlock_delay_from_env() -> Duration {
    non_empty_env("MOJIE_LOADING_UNLOCK_SECS")
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_UNLOCK_DELAY)
}
