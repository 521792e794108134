use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::providers::COLOR_ADJUSTMENT_MODEL;

/// One job row as the polling endpoint returns it.
///
/// Providers disagree on which fields they fill; everything beyond
/// `model_used` is optional and unknown fields are kept in `extra`. A field
/// with an unexpected shape decodes as absent instead of failing the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobRecord {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub model_used: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub task_info: Option<TaskInfo>,
    #[serde(default)]
    pub image_list: Option<ImageListField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskInfo {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub input_data: Option<InputData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InputData {
    #[serde(default)]
    pub batch_size: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The three encodings seen in `image_list`, plus a catch-all so a malformed
/// value never fails the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageListField {
    Text(String),
    List(Vec<String>),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// `model_used` keys that carry behavior of their own. Anything else is a
/// provider generation key and only matters through substring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKey<'a> {
    AiProduct,
    WidePicture,
    FineDetail,
    InternalSupplementation,
    InternalSupplementationAndRemoval,
    ColorAdjustment,
    Generation(&'a str),
}

impl<'a> ModelKey<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw {
            "ai_product" => Self::AiProduct,
            "wide_picture" => Self::WidePicture,
            "fine_detail" => Self::FineDetail,
            "internal_supplementation" => Self::InternalSupplementation,
            "internal_supplementation_and_removal" => Self::InternalSupplementationAndRemoval,
            COLOR_ADJUSTMENT_MODEL => Self::ColorAdjustment,
            other => Self::Generation(other),
        }
    }

    /// Whether the result can be sent back into the editor.
    pub fn allows_follow_up_edit(self) -> bool {
        !matches!(
            self,
            Self::WidePicture | Self::ColorAdjustment | Self::InternalSupplementationAndRemoval
        )
    }
}

impl JobRecord {
    pub fn model_key(&self) -> ModelKey<'_> {
        ModelKey::parse(&self.model_used)
    }

    pub fn input_data(&self) -> Option<&InputData> {
        self.task_info.as_ref()?.input_data.as_ref()
    }

    /// Conversation id with the empty and `-1` sentinels folded to `None`.
    pub fn conversation(&self) -> Option<&str> {
        self.conversation_id
            .as_deref()
            .filter(|value| !is_no_conversation(value))
    }
}

pub fn is_no_conversation(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "-1"
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
}

/// Decodes `T` when the value has the right shape, `None` otherwise.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ImageListField, JobRecord, JobStatus, ModelKey};

    #[test]
    fn decodes_numeric_ids_and_sentinel_conversation() -> anyhow::Result<()> {
        let record: JobRecord = serde_json::from_value(json!({
            "id": 42,
            "conversation_id": -1,
            "model_used": "flex",
            "status": "pending",
            "created_at": "2025-06-01T10:00:00Z"
        }))?;
        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.conversation_id.as_deref(), Some("-1"));
        assert_eq!(record.conversation(), None);
        assert_eq!(record.extra["created_at"], json!("2025-06-01T10:00:00Z"));
        Ok(())
    }

    #[test]
    fn image_list_keeps_each_encoding() -> anyhow::Result<()> {
        let text: JobRecord = serde_json::from_value(json!({"image_list": "pending"}))?;
        assert_eq!(
            text.image_list,
            Some(ImageListField::Text("pending".to_string()))
        );
        let list: JobRecord =
            serde_json::from_value(json!({"image_list": ["https://cdn/a.png"]}))?;
        assert_eq!(
            list.image_list,
            Some(ImageListField::List(vec!["https://cdn/a.png".to_string()]))
        );
        let odd: JobRecord = serde_json::from_value(json!({"image_list": {"url": 1}}))?;
        assert!(matches!(odd.image_list, Some(ImageListField::Other(_))));
        let null: JobRecord = serde_json::from_value(json!({"image_list": null}))?;
        assert_eq!(null.image_list, None);
        Ok(())
    }

    #[test]
    fn misshapen_fields_decode_as_absent() -> anyhow::Result<()> {
        let stringified_metadata: JobRecord = serde_json::from_value(json!({
            "model_used": "ai_product",
            "image_list": "https://cdn/out.png",
            "task_info": {"status": "completed", "input_data": {"batch_size": 2, "metadata": "{\"foo\":1}"}}
        }))?;
        let input = stringified_metadata.input_data();
        assert_eq!(input.and_then(|input| input.metadata.as_ref()), None);
        assert_eq!(input.and_then(|input| input.batch_size.clone()), Some(json!(2)));
        assert_eq!(stringified_metadata.status(), JobStatus::Completed);

        let numeric_status: JobRecord =
            serde_json::from_value(json!({"model_used": "flex", "status": 2}))?;
        assert_eq!(numeric_status.status.as_deref(), Some("2"));

        let scalar_task_info: JobRecord = serde_json::from_value(json!({
            "model_used": "flex",
            "status": "pending",
            "task_info": ""
        }))?;
        assert_eq!(scalar_task_info.task_info, None);
        assert_eq!(scalar_task_info.status(), JobStatus::Pending);

        let scalar_input: JobRecord = serde_json::from_value(json!({
            "model_used": null,
            "task_info": {"status": "failed", "input_data": [1, 2]}
        }))?;
        assert_eq!(scalar_input.model_used, "");
        assert_eq!(scalar_input.input_data(), None);
        assert_eq!(scalar_input.status(), JobStatus::Failed);
        Ok(())
    }

    #[test]
    fn status_parse_round_trips_known_values() {
        assert_eq!(JobStatus::parse("failed"), JobStatus::Failed);
        assert_eq!(JobStatus::parse("queued").as_str(), "queued");
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn model_key_edit_gate() {
        assert!(!ModelKey::parse("wide_picture").allows_follow_up_edit());
        assert!(!ModelKey::parse("internal_supplementation_and_removal").allows_follow_up_edit());
        assert!(ModelKey::parse("internal_supplementation").allows_follow_up_edit());
        assert_eq!(
            ModelKey::parse("gpt-4o-image"),
            ModelKey::Generation("gpt-4o-image")
        );
    }
}
