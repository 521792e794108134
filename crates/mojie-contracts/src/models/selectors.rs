use super::registry::{ModelRegistry, ModelSpec, DEFAULT_MODEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

/// Maps a historical `model_used` key back to the generation model that
/// should handle an edit of that job.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(&self, requested: Option<&str>) -> Result<ModelSelection, String> {
        let Some(requested_value) = requested.filter(|value| !value.is_empty()) else {
            let model = self.default_model()?;
            return Ok(ModelSelection {
                model,
                requested: None,
                fallback_reason: Some("No model specified; using default.".to_string()),
            });
        };

        if let Some(model) = self.registry.get(requested_value) {
            return Ok(ModelSelection {
                model: model.clone(),
                requested: Some(requested_value.to_string()),
                fallback_reason: None,
            });
        }

        let target = family_model_key(requested_value).ok_or_else(|| {
            format!("Model '{requested_value}' is not offered for new generations.")
        })?;
        let model = self
            .registry
            .get(target)
            .cloned()
            .map(Ok)
            .unwrap_or_else(|| self.default_model())?;
        let fallback_reason = Some(format!(
            "Model '{requested_value}' mapped to '{}'.",
            model.key
        ));
        Ok(ModelSelection {
            model,
            requested: Some(requested_value.to_string()),
            fallback_reason,
        })
    }

    fn default_model(&self) -> Result<ModelSpec, String> {
        self.registry
            .get(DEFAULT_MODEL)
            .or_else(|| self.registry.list().next())
            .cloned()
            .ok_or_else(|| "No generation models registered.".to_string())
    }
}

/// Later matches override earlier ones: a volcengine key that also mentions
/// gpt still routes to qiHua.
fn family_model_key(raw: &str) -> Option<&'static str> {
    let mut target = Some(DEFAULT_MODEL);
    if raw.contains("gpt") || raw.contains("GPT") {
        target = Some("gpt-4o-image");
    }
    if raw.contains("gemini") {
        target = None;
    }
    if raw.contains("volcengine") || raw.contains("dou") {
        target = Some("qiHua");
    }
    target
}
