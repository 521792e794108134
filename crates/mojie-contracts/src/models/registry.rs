use indexmap::IndexMap;
use serde::Serialize;

use crate::credits::RuleKey;

pub const DEFAULT_MODEL: &str = "flex";

/// Number of images a generation may request.
pub const BATCH_CHOICES: [u32; 4] = [1, 2, 3, 4];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub key: String,
    pub label: String,
    pub tip: String,
    #[serde(skip)]
    pub rule_key: RuleKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionPreset {
    pub ratio: &'static str,
    pub width: u32,
    pub height: u32,
    pub gpt_size: &'static str,
    pub models: &'static [&'static str],
}

impl ResolutionPreset {
    pub fn supports(&self, model: &str) -> bool {
        self.models.iter().any(|item| *item == model)
    }
}

const RESOLUTION_PRESETS: [ResolutionPreset; 6] = [
    ResolutionPreset {
        ratio: "16:9",
        width: 1920,
        height: 1080,
        gpt_size: "1024x576",
        models: &["flex", "qiHua"],
    },
    ResolutionPreset {
        ratio: "3:2",
        width: 1536,
        height: 1024,
        gpt_size: "1536x1024",
        models: &["gpt-4o-image"],
    },
    ResolutionPreset {
        ratio: "1:1",
        width: 1024,
        height: 1024,
        gpt_size: "1024x1024",
        models: &["gpt-4o-image", "flex", "qiHua"],
    },
    ResolutionPreset {
        ratio: "2:3",
        width: 1024,
        height: 1536,
        gpt_size: "1024x1536",
        models: &["gpt-4o-image"],
    },
    ResolutionPreset {
        ratio: "3:4",
        width: 900,
        height: 1200,
        gpt_size: "1024x1280",
        models: &["flex", "qiHua"],
    },
    ResolutionPreset {
        ratio: "9:16",
        width: 1080,
        height: 1920,
        gpt_size: "576x1024",
        models: &["flex", "qiHua"],
    },
];

/// Generation models offered for new jobs, in menu order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ModelSpec> {
        self.models.get(key)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn presets_for(&self, key: &str) -> Vec<ResolutionPreset> {
        RESOLUTION_PRESETS
            .iter()
            .filter(|preset| preset.supports(key))
            .cloned()
            .collect()
    }

    pub fn preset(&self, key: &str, ratio: &str) -> Option<ResolutionPreset> {
        self.presets_for(key)
            .into_iter()
            .find(|preset| preset.ratio == ratio)
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |key: &str, label: &str, tip: &str, rule_key: RuleKey| {
        map.insert(
            key.to_string(),
            ModelSpec {
                key: key.to_string(),
                label: label.to_string(),
                tip: tip.to_string(),
                rule_key,
            },
        );
    };

    insert(
        "gpt-4o-image",
        "Native GPT-4o image generation",
        "Strongest drawing model, supports image editing",
        RuleKey::Gpt4oImage,
    );
    insert(
        "flex",
        "Flux-kontext Composite",
        "MJ-grade results across styles",
        RuleKey::Flex,
    );
    insert(
        "qiHua",
        "Qihua T2I & F-kontext",
        "Accepts Chinese prompts",
        RuleKey::QiHua,
    );

    map
}

#[cfg(test)]
mod tests {
    use super::{ModelRegistry, BATCH_CHOICES};

    #[test]
    fn default_registry_keeps_menu_order() {
        let registry = ModelRegistry::new(None);
        let keys: Vec<&str> = registry.list().map(|model| model.key.as_str()).collect();
        assert_eq!(keys, vec!["gpt-4o-image", "flex", "qiHua"]);
        assert_eq!(BATCH_CHOICES.len(), 4);
    }

    #[test]
    fn presets_filter_by_model() {
        let registry = ModelRegistry::new(None);
        let gpt: Vec<&str> = registry
            .presets_for("gpt-4o-image")
            .iter()
            .map(|preset| preset.ratio)
            .collect();
        assert_eq!(gpt, vec!["3:2", "1:1", "2:3"]);

        let wide = registry.preset("flex", "16:9");
        assert_eq!(wide.map(|preset| (preset.width, preset.height)), Some((1920, 1080)));
        assert!(registry.preset("gpt-4o-image", "16:9").is_none());
    }
}
