use serde_json::Value;

use super::record::{ImageListField, JobRecord, JobStatus, ModelKey};

const PENDING_IMAGE_LIST: &str = "pending";

/// Resolved lifecycle state. A non-empty `task_info.status` always wins over
/// the top-level field.
pub fn status(job: &JobRecord) -> JobStatus {
    let nested = job
        .task_info
        .as_ref()
        .and_then(|info| info.status.as_deref())
        .filter(|value| !value.is_empty());
    match nested.or(job.status.as_deref()) {
        Some(raw) => JobStatus::parse(raw),
        None => JobStatus::Other(String::new()),
    }
}

/// Result image URLs in display order.
///
/// Replacement jobs are seeded with the product image recorded in their
/// submission metadata. A malformed `image_list` drops everything, seed
/// included. Array entries without an http(s) URL are skipped.
pub fn images(job: &JobRecord) -> Vec<String> {
    let mut list = replacement_seed(job).into_iter().collect::<Vec<String>>();

    let raw = match job.image_list.as_ref() {
        None => return list,
        Some(ImageListField::Text(text)) if text.is_empty() || text == PENDING_IMAGE_LIST => {
            return list
        }
        Some(raw) => raw,
    };

    match raw {
        ImageListField::Text(text) if is_http(text) => {
            list.extend(text.split(',').map(str::to_string));
            list
        }
        ImageListField::List(items) if items.iter().any(|item| is_http(item)) => {
            list.extend(items.iter().filter(|item| is_http(item)).cloned());
            list
        }
        _ => Vec::new(),
    }
}

/// Whether the UI offers "continue editing" on this job.
pub fn has_end_btn(job: &JobRecord) -> bool {
    if status(job) == JobStatus::Failed {
        return false;
    }
    job.model_key().allows_follow_up_edit()
}

fn replacement_seed(job: &JobRecord) -> Option<String> {
    if job.model_key() != ModelKey::AiProduct {
        return None;
    }
    let raw = job.input_data()?.metadata.as_ref()?.get("add_new_data")?;
    let parsed = match raw {
        Value::String(text) => serde_json::from_str::<Value>(text).ok()?,
        Value::Object(_) => raw.clone(),
        _ => return None,
    };
    parsed
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn is_http(value: &str) -> bool {
    value.contains("http://") || value.contains("https://")
}
