use std::fmt;

use mojie_contracts::jobs::is_no_conversation;
use mojie_contracts::providers::COLOR_ADJUSTMENT_MODEL;
use serde_json::{json, Map, Value};

/// Prefix the replacement workflow expects in front of any user text.
pub const COLLAGE_INSTRUCTION: &str =
    "This is a collage picture，in the left Objects replaces the Objects in the right picture,";
pub const REMOVAL_DESCRIPTION: &str = "Remove here";
pub const REFINE_DEFAULT_DESCRIPTION: &str = "refine";
pub const REFINE_DEFAULT_TEXT: &str = "精修";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Replace,
    Refine,
    InternalSupplement,
    Removal,
    Expand,
    ColorAdjust,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Refine => "refine",
            Self::InternalSupplement => "internal_supplement",
            Self::Removal => "removal",
            Self::Expand => "expand",
            Self::ColorAdjust => "color_adjust",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Replace => "/api/image/image_workflow_product",
            Self::Refine => "/api/image/image_fine_detail_product",
            Self::InternalSupplement => "/api/image/image_internal_supplement",
            Self::Removal => "/api/image/image_internal_supplement_removal",
            Self::Expand => "/api/image/image_wide_picture",
            Self::ColorAdjust => "/api/image/color_adjustment",
        }
    }

    /// `model_used` the backend records for jobs of this intent.
    pub fn model_key(self) -> &'static str {
        match self {
            Self::Replace => "ai_product",
            Self::Refine => "fine_detail",
            Self::InternalSupplement => "internal_supplementation",
            Self::Removal => "internal_supplementation_and_removal",
            Self::Expand => "wide_picture",
            Self::ColorAdjust => COLOR_ADJUSTMENT_MODEL,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplaceRequest {
    pub conversation_id: Option<String>,
    pub text: Option<String>,
    pub template_text: Option<String>,
    pub product_url: String,
    pub white_url: String,
    pub template_url: String,
    pub mask_url: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefineRequest {
    pub conversation_id: Option<String>,
    pub text: Option<String>,
    pub level: u32,
    pub url: String,
    pub mask_url: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InternalSupplementRequest {
    pub conversation_id: Option<String>,
    pub text: Option<String>,
    /// Only the free-text tab sends its prompt through translation.
    pub text_tab_active: bool,
    pub url: String,
    pub mask_url: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemovalRequest {
    pub conversation_id: Option<String>,
    pub url: String,
    pub mask_url: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpandRequest {
    pub conversation_id: Option<String>,
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Canvas placement fields, forwarded untouched.
    pub placement: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorAdjustRequest {
    pub conversation_id: Option<String>,
    pub url: String,
    pub brightness: i32,
    pub contrast: u32,
    pub saturate: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntentRequest {
    Replace(ReplaceRequest),
    Refine(RefineRequest),
    InternalSupplement(InternalSupplementRequest),
    Removal(RemovalRequest),
    Expand(ExpandRequest),
    ColorAdjust(ColorAdjustRequest),
}

impl IntentRequest {
    pub fn intent(&self) -> Intent {
        match self {
            Self::Replace(_) => Intent::Replace,
            Self::Refine(_) => Intent::Refine,
            Self::InternalSupplement(_) => Intent::InternalSupplement,
            Self::Removal(_) => Intent::Removal,
            Self::Expand(_) => Intent::Expand,
            Self::ColorAdjust(_) => Intent::ColorAdjust,
        }
    }

    /// Text that must go through translation before the payload is built.
    pub fn translation_source(&self) -> Option<&str> {
        let text = match self {
            Self::Replace(request) => request.text.as_deref(),
            Self::Refine(request) => request.text.as_deref(),
            Self::InternalSupplement(request) if request.text_tab_active => {
                request.text.as_deref()
            }
            _ => None,
        };
        text.filter(|value| !value.trim().is_empty())
    }
}

/// A ready-to-send submission: target path plus form fields.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPayload {
    pub intent: Intent,
    pub path: &'static str,
    pub form: Map<String, Value>,
}

impl JobPayload {
    fn new(intent: Intent) -> Self {
        Self {
            intent,
            path: intent.endpoint(),
            form: Map::new(),
        }
    }

    fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.form.insert(key.to_string(), value.into());
        self
    }

    /// Decoded `add_new_data` blob, when the payload carries one.
    pub fn add_new_data(&self) -> Option<Value> {
        self.form
            .get("add_new_data")
            .and_then(Value::as_str)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Builds the form for `request`. `english` is the translated prompt, if the
/// translation step produced one.
pub fn build(request: &IntentRequest, english: Option<&str>) -> JobPayload {
    match request {
        IntentRequest::Replace(request) => build_replace(request, english),
        IntentRequest::Refine(request) => build_refine(request, english),
        IntentRequest::InternalSupplement(request) => build_internal_supplement(request, english),
        IntentRequest::Removal(request) => build_removal(request),
        IntentRequest::Expand(request) => build_expand(request),
        IntentRequest::ColorAdjust(request) => build_color_adjust(request),
    }
}

/// Wire value for `conversation_id`; the "no conversation" sentinels become
/// an empty string.
pub fn conversation_field(conversation_id: Option<&str>) -> String {
    match conversation_id {
        Some(value) if !is_no_conversation(value) => value.trim().to_string(),
        _ => String::new(),
    }
}

fn build_replace(request: &ReplaceRequest, english: Option<&str>) -> JobPayload {
    let text = non_empty(request.text.as_deref());
    let mut description = COLLAGE_INSTRUCTION.to_string();
    if let Some(text) = text {
        description.push_str(english.unwrap_or(text));
    }
    let add_new_data = json!({
        "text": text.unwrap_or_default(),
        "templateText": request.template_text.as_deref().unwrap_or_default(),
        "url": request.product_url,
        "type": "product_replacement",
    });
    JobPayload::new(Intent::Replace)
        .field(
            "conversation_id",
            conversation_field(request.conversation_id.as_deref()),
        )
        .field("add_new_data", add_new_data.to_string())
        .field("description", description)
        .field("level", request.level)
        .field("white_url", request.white_url.clone())
        .field("template_url", request.template_url.clone())
        .field("mask_url", request.mask_url.clone())
}

fn build_refine(request: &RefineRequest, english: Option<&str>) -> JobPayload {
    let text = non_empty(request.text.as_deref());
    let description = english
        .or(text)
        .unwrap_or(REFINE_DEFAULT_DESCRIPTION)
        .to_string();
    let add_new_data = json!({
        "text": text.unwrap_or(REFINE_DEFAULT_TEXT),
        "type": "refine",
    });
    JobPayload::new(Intent::Refine)
        .field(
            "conversation_id",
            conversation_field(request.conversation_id.as_deref()),
        )
        .field("description", description)
        .field("add_new_data", add_new_data.to_string())
        .field("level", request.level)
        .field("url", request.url.clone())
        .field("mask_url", request.mask_url.clone())
}

fn build_internal_supplement(
    request: &InternalSupplementRequest,
    english: Option<&str>,
) -> JobPayload {
    let text = non_empty(request.text.as_deref());
    let description = english.or(text).unwrap_or_default().to_string();
    let add_new_data = json!({
        "text": text.unwrap_or_default(),
        "type": "eliminate",
    });
    JobPayload::new(Intent::InternalSupplement)
        .field(
            "conversation_id",
            conversation_field(request.conversation_id.as_deref()),
        )
        .field("description", description)
        .field("add_new_data", add_new_data.to_string())
        .field("url", request.url.clone())
        .field("mask_url", request.mask_url.clone())
}

fn build_removal(request: &RemovalRequest) -> JobPayload {
    let add_new_data = json!({"text": "", "type": "eliminate"});
    JobPayload::new(Intent::Removal)
        .field(
            "conversation_id",
            conversation_field(request.conversation_id.as_deref()),
        )
        .field("description", REMOVAL_DESCRIPTION)
        .field("add_new_data", add_new_data.to_string())
        .field("url", request.url.clone())
        .field("mask_url", request.mask_url.clone())
}

fn build_expand(request: &ExpandRequest) -> JobPayload {
    let mut payload = JobPayload::new(Intent::Expand)
        .field(
            "conversation_id",
            conversation_field(request.conversation_id.as_deref()),
        )
        .field("url", request.url.clone())
        .field("width", request.width)
        .field("height", request.height);
    for (key, value) in &request.placement {
        payload.form.entry(key.clone()).or_insert_with(|| value.clone());
    }
    payload
}

fn build_color_adjust(request: &ColorAdjustRequest) -> JobPayload {
    JobPayload::new(Intent::ColorAdjust)
        .field(
            "conversation_id",
            conversation_field(request.conversation_id.as_deref()),
        )
        .field("url", request.url.clone())
        .field("brightness", request.brightness)
        .field("contrast", request.contrast)
        .field("saturate", request.saturate)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
