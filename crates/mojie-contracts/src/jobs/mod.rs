mod record;
mod status;

pub use record::{
    is_no_conversation, ImageListField, InputData, JobRecord, JobStatus, ModelKey, TaskInfo,
};
pub use status::{has_end_btn, images, status};

use serde::Serialize;

use crate::credits::{self, Cost, DeductionRules, Membership};
use crate::providers::{self, DisplayLabel};

/// Everything the UI derives from a job row. Built fresh on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub id: Option<String>,
    pub conversation_id: Option<String>,
    pub model_used: String,
    pub label: String,
    pub family: String,
    pub status: JobStatus,
    pub images: Vec<String>,
    pub cost: String,
    pub has_end_btn: bool,
}

impl JobRecord {
    pub fn status(&self) -> JobStatus {
        status(self)
    }

    pub fn images(&self) -> Vec<String> {
        images(self)
    }

    pub fn has_end_btn(&self) -> bool {
        has_end_btn(self)
    }

    pub fn label(&self) -> DisplayLabel {
        providers::resolve(&self.model_used)
    }

    pub fn cost(&self, rules: &DeductionRules, membership: &Membership) -> Cost {
        credits::cost(self, rules.for_membership(membership), membership)
    }

    pub fn view(&self, rules: &DeductionRules, membership: &Membership) -> JobView {
        let label = self.label();
        JobView {
            id: self.id.clone(),
            conversation_id: self.conversation().map(str::to_string),
            model_used: self.model_used.clone(),
            label: label.to_string(),
            family: label.family().to_string(),
            status: self.status(),
            images: self.images(),
            cost: self.cost(rules, membership).to_string(),
            has_end_btn: self.has_end_btn(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::JobRecord;
    use crate::credits::{DeductionRules, Membership};

    #[test]
    fn view_combines_label_status_images_and_cost() -> anyhow::Result<()> {
        let rules = DeductionRules::builtin()?;
        let job: JobRecord = serde_json::from_value(json!({
            "id": 9,
            "conversation_id": "c-7",
            "model_used": "flex",
            "status": "pending",
            "task_info": {"status": "completed", "input_data": {"batch_size": 2}},
            "image_list": "pending"
        }))?;

        let view = job.view(&rules, &Membership::none());
        assert_eq!(view.id.as_deref(), Some("9"));
        assert_eq!(view.conversation_id.as_deref(), Some("c-7"));
        assert_eq!(view.label, "Flux-kontext Composite");
        assert_eq!(view.family, "flex");
        assert_eq!(view.status.as_str(), "completed");
        assert!(view.images.is_empty());
        assert_eq!(view.cost, "6credits");
        assert!(view.has_end_btn);

        let member_view = job.view(&rules, &Membership::active());
        assert_eq!(member_view.cost, "member free");
        Ok(())
    }

    #[test]
    fn view_serializes_status_as_plain_string() -> anyhow::Result<()> {
        let rules = DeductionRules::builtin()?;
        let job: JobRecord =
            serde_json::from_value(json!({"model_used": "gpt-4o-image", "status": "failed"}))?;
        let encoded = serde_json::to_value(job.view(&rules, &Membership::none()))?;
        assert_eq!(encoded["status"], json!("failed"));
        assert_eq!(encoded["cost"], json!("20credits"));
        assert_eq!(encoded["has_end_btn"], json!(false));
        Ok(())
    }
}
