use std::fmt;

/// Model key used by the color adjustment workflow. The backend records it verbatim.
pub const COLOR_ADJUSTMENT_MODEL: &str = "色彩调节模型";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    Gpt,
    Gemini,
    Flex,
    Qihua,
    Unknown,
}

impl ProviderFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpt => "gpt",
            Self::Gemini => "gemini",
            Self::Flex => "flex",
            Self::Qihua => "qihua",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayLabel {
    Replacement,
    FlexComposite,
    Qihua,
    SmartExpand,
    LocalInpaint,
    InpaintRemoval,
    ColorAdjustment,
    Gpt,
    Gemini,
    Unknown,
}

impl DisplayLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replacement => "Replacement",
            Self::FlexComposite => "Flux-kontext Composite",
            Self::Qihua => "Qihua T2I & F-kontext",
            Self::SmartExpand => "Smart Expand",
            Self::LocalInpaint => "Local Inpaint",
            Self::InpaintRemoval => "Inpaint-Removal",
            Self::ColorAdjustment => "Color Adjustment",
            Self::Gpt => "GPT4o-image",
            Self::Gemini => "Gemini-image",
            Self::Unknown => "Unknown",
        }
    }

    /// Generation family behind the label. Editing workflows that run on the
    /// composite backend report `Flex`; the rest have no family of their own.
    pub fn family(self) -> ProviderFamily {
        match self {
            Self::Gpt => ProviderFamily::Gpt,
            Self::Gemini => ProviderFamily::Gemini,
            Self::FlexComposite => ProviderFamily::Flex,
            Self::Qihua => ProviderFamily::Qihua,
            _ => ProviderFamily::Unknown,
        }
    }
}

impl fmt::Display for DisplayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn exact_label(key: &str) -> Option<DisplayLabel> {
    let label = match key {
        "ai_product" => DisplayLabel::Replacement,
        "multi_image" | "clue_image" | "ai_image" | "ai_text" | "white" | "clue"
        | "flux_kontext_pro_2" | "complete_redrawing" => DisplayLabel::FlexComposite,
        "flux_kontext_pro_1" => DisplayLabel::Qihua,
        "wide_picture" => DisplayLabel::SmartExpand,
        "fine_detail" => DisplayLabel::LocalInpaint,
        "internal_supplementation" | "internal_supplementation_and_removal" => {
            DisplayLabel::InpaintRemoval
        }
        COLOR_ADJUSTMENT_MODEL => DisplayLabel::ColorAdjustment,
        _ => return None,
    };
    Some(label)
}

/// Resolves a raw `model_used` key to its display label.
///
/// Exact intent keys are checked before the substring rules: `ai_product`
/// would otherwise land in the composite bucket through the `ai_` prefix.
pub fn resolve(key: &str) -> DisplayLabel {
    if let Some(label) = exact_label(key) {
        return label;
    }
    if key.contains("gpt") || key.contains("GPT") {
        return DisplayLabel::Gpt;
    }
    if key.contains("gemini") {
        return DisplayLabel::Gemini;
    }
    if key.contains("flex") || key.contains("ai_") {
        return DisplayLabel::FlexComposite;
    }
    if key.contains("volcengine") {
        return DisplayLabel::Qihua;
    }
    DisplayLabel::Unknown
}

pub fn family_of(key: &str) -> ProviderFamily {
    resolve(key).family()
}
