use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use super::Membership;

const DEFAULT_DEDUCTION_RULES_JSON: &str =
    include_str!("../../resources/default_deduction_rules.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKey {
    Flex,
    FluxKontextPro2,
    FluxKontextPro1,
    AiProduct,
    Gpt4oImage,
    QiHua,
    Video,
}

impl RuleKey {
    pub const ALL: [RuleKey; 7] = [
        RuleKey::Flex,
        RuleKey::FluxKontextPro2,
        RuleKey::FluxKontextPro1,
        RuleKey::AiProduct,
        RuleKey::Gpt4oImage,
        RuleKey::QiHua,
        RuleKey::Video,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flex => "flex",
            Self::FluxKontextPro2 => "flux_kontext_pro_2",
            Self::FluxKontextPro1 => "flux_kontext_pro_1",
            Self::AiProduct => "ai_product",
            Self::Gpt4oImage => "gpt-4o-image",
            Self::QiHua => "qiHua",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleVariant {
    Default,
    Vip,
}

impl RuleVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Vip => "vip",
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleTableError {
    #[error("deduction rules from {origin} are not valid JSON")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("deduction rules from {origin} must be a JSON object of variants")]
    NotAnObject { origin: String },
    #[error("deduction rules are missing the '{variant}' variant")]
    MissingVariant { variant: &'static str },
    #[error("deduction rule '{key}' is missing from the '{variant}' variant")]
    MissingKey {
        variant: &'static str,
        key: &'static str,
    },
    #[error("deduction rule '{key}' in '{variant}' must be a non-negative integer, got {value}")]
    InvalidPoints {
        variant: &'static str,
        key: &'static str,
        value: String,
    },
    #[error("failed to read deduction rule override {}", path.display())]
    Override {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Point costs for one membership tier. Every [`RuleKey`] has a value, so
/// lookups cannot miss once a table exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleTable {
    flex: u32,
    flux_kontext_pro_2: u32,
    flux_kontext_pro_1: u32,
    ai_product: u32,
    gpt_4o_image: u32,
    qi_hua: u32,
    video: u32,
}

impl RuleTable {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: RuleKey, points: u32) -> Self {
        *self.slot_mut(key) = points;
        self
    }

    pub fn points(&self, key: RuleKey) -> u32 {
        match key {
            RuleKey::Flex => self.flex,
            RuleKey::FluxKontextPro2 => self.flux_kontext_pro_2,
            RuleKey::FluxKontextPro1 => self.flux_kontext_pro_1,
            RuleKey::AiProduct => self.ai_product,
            RuleKey::Gpt4oImage => self.gpt_4o_image,
            RuleKey::QiHua => self.qi_hua,
            RuleKey::Video => self.video,
        }
    }

    fn slot_mut(&mut self, key: RuleKey) -> &mut u32 {
        match key {
            RuleKey::Flex => &mut self.flex,
            RuleKey::FluxKontextPro2 => &mut self.flux_kontext_pro_2,
            RuleKey::FluxKontextPro1 => &mut self.flux_kontext_pro_1,
            RuleKey::AiProduct => &mut self.ai_product,
            RuleKey::Gpt4oImage => &mut self.gpt_4o_image,
            RuleKey::QiHua => &mut self.qi_hua,
            RuleKey::Video => &mut self.video,
        }
    }

    fn from_row(variant: RuleVariant, row: &Map<String, Value>) -> Result<Self, RuleTableError> {
        let mut table = Self::zeroed();
        for key in RuleKey::ALL {
            let Some(raw) = row.get(key.as_str()) else {
                return Err(RuleTableError::MissingKey {
                    variant: variant.as_str(),
                    key: key.as_str(),
                });
            };
            let Some(points) = parse_points(raw) else {
                return Err(RuleTableError::InvalidPoints {
                    variant: variant.as_str(),
                    key: key.as_str(),
                    value: raw.to_string(),
                });
            };
            *table.slot_mut(key) = points;
        }
        Ok(table)
    }

    pub fn to_row(&self) -> Map<String, Value> {
        RuleKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), Value::from(self.points(*key))))
            .collect()
    }
}

/// The `default` and `vip` deduction tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionRules {
    pub default: RuleTable,
    pub vip: RuleTable,
}

impl DeductionRules {
    pub fn new(default: RuleTable, vip: RuleTable) -> Self {
        Self { default, vip }
    }

    /// Tables shipped with the crate.
    pub fn builtin() -> Result<Self, RuleTableError> {
        Self::from_json_str(DEFAULT_DEDUCTION_RULES_JSON)
    }

    /// Built-in tables merged with `MOJIE_DEDUCTION_RULES`, or with
    /// `~/.mojie/deduction_rules.json` when that file exists.
    pub fn load() -> Result<Self, RuleTableError> {
        if let Some(explicit) = explicit_override_path() {
            return Self::load_with_override(Some(&explicit));
        }
        let home = home_override_path().filter(|path| path.exists());
        Self::load_with_override(home.as_deref())
    }

    /// A given path must be readable; a missing file is an error.
    pub fn load_with_override(path: Option<&Path>) -> Result<Self, RuleTableError> {
        let mut rows = parse_rule_rows(DEFAULT_DEDUCTION_RULES_JSON, "built-in defaults")?;
        if let Some(path) = path {
            let raw = fs::read_to_string(path).map_err(|source| RuleTableError::Override {
                path: path.to_path_buf(),
                source,
            })?;
            merge_rule_rows(&mut rows, &raw, &path.display().to_string())?;
        }
        Self::from_rows(&rows)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, RuleTableError> {
        let rows = parse_rule_rows(raw, "inline JSON")?;
        Self::from_rows(&rows)
    }

    fn from_rows(rows: &BTreeMap<String, Map<String, Value>>) -> Result<Self, RuleTableError> {
        let table = |variant: RuleVariant| -> Result<RuleTable, RuleTableError> {
            let row = rows
                .get(variant.as_str())
                .ok_or(RuleTableError::MissingVariant {
                    variant: variant.as_str(),
                })?;
            RuleTable::from_row(variant, row)
        };
        Ok(Self {
            default: table(RuleVariant::Default)?,
            vip: table(RuleVariant::Vip)?,
        })
    }

    pub fn variant(&self, variant: RuleVariant) -> &RuleTable {
        match variant {
            RuleVariant::Default => &self.default,
            RuleVariant::Vip => &self.vip,
        }
    }

    pub fn for_membership(&self, membership: &Membership) -> &RuleTable {
        if membership.is_active() {
            &self.vip
        } else {
            &self.default
        }
    }

    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert("default".to_string(), Value::Object(self.default.to_row()));
        root.insert("vip".to_string(), Value::Object(self.vip.to_row()));
        Value::Object(root)
    }
}

fn explicit_override_path() -> Option<PathBuf> {
    env::var_os("MOJIE_DEDUCTION_RULES")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn home_override_path() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".mojie").join("deduction_rules.json"))
}

fn parse_rule_rows(
    raw: &str,
    origin: &str,
) -> Result<BTreeMap<String, Map<String, Value>>, RuleTableError> {
    let mut rows = BTreeMap::new();
    merge_rule_rows(&mut rows, raw, origin)?;
    Ok(rows)
}

fn merge_rule_rows(
    rows: &mut BTreeMap<String, Map<String, Value>>,
    raw: &str,
    origin: &str,
) -> Result<(), RuleTableError> {
    let payload: Value = serde_json::from_str(raw).map_err(|source| RuleTableError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    let Some(variants) = payload.as_object() else {
        return Err(RuleTableError::NotAnObject {
            origin: origin.to_string(),
        });
    };
    for (variant, row_value) in variants {
        let Some(row) = row_value.as_object() else {
            continue;
        };
        let entry = rows.entry(variant.to_string()).or_default();
        for (key, points) in row {
            entry.insert(key.to_string(), points.clone());
        }
    }
    Ok(())
}

fn parse_points(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{DeductionRules, RuleKey, RuleTable, RuleTableError, RuleVariant};
    use crate::credits::Membership;

    #[test]
    fn builtin_tables_match_published_prices() -> anyhow::Result<()> {
        let rules = DeductionRules::builtin()?;
        assert_eq!(rules.default.points(RuleKey::Flex), 3);
        assert_eq!(rules.default.points(RuleKey::AiProduct), 15);
        assert_eq!(rules.default.points(RuleKey::Gpt4oImage), 20);
        assert_eq!(rules.default.points(RuleKey::QiHua), 5);
        assert_eq!(rules.vip.points(RuleKey::Flex), 0);
        assert_eq!(rules.vip.points(RuleKey::AiProduct), 0);
        assert_eq!(rules.vip.points(RuleKey::FluxKontextPro2), 3);
        Ok(())
    }

    #[test]
    fn missing_key_fails_at_load() {
        let raw = r#"{
            "default": {"flex": 3, "flux_kontext_pro_2": 3, "flux_kontext_pro_1": 3,
                        "ai_product": 15, "gpt-4o-image": 20, "qiHua": 5, "video": 0},
            "vip": {"flex": 0}
        }"#;
        let err = DeductionRules::from_json_str(raw).err();
        assert!(matches!(
            err,
            Some(RuleTableError::MissingKey {
                variant: "vip",
                key: "flux_kontext_pro_2"
            })
        ));
    }

    #[test]
    fn missing_variant_and_bad_values_are_rejected() {
        let err = DeductionRules::from_json_str(r#"{"default": {}}"#).err();
        assert!(matches!(err, Some(RuleTableError::MissingKey { .. })));

        let err = DeductionRules::from_json_str("[]").err();
        assert!(matches!(err, Some(RuleTableError::NotAnObject { .. })));

        let mut rows = DeductionRules::builtin()
            .map(|rules| rules.to_json())
            .unwrap_or_default();
        rows["vip"]["qiHua"] = serde_json::json!(-1);
        let err = DeductionRules::from_json_str(&rows.to_string()).err();
        assert_eq!(
            err.map(|err| err.to_string()).unwrap_or_default(),
            "deduction rule 'qiHua' in 'vip' must be a non-negative integer, got -1"
        );

        let only_default = serde_json::json!({"default": rows["default"].clone()});
        let err = DeductionRules::from_json_str(&only_default.to_string()).err();
        assert!(matches!(
            err,
            Some(RuleTableError::MissingVariant { variant: "vip" })
        ));
    }

    #[test]
    fn override_file_merges_per_key() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("deduction_rules.json");
        fs::write(&path, r#"{"vip": {"gpt-4o-image": 12}, "default": {"flex": "4"}}"#)?;

        let rules = DeductionRules::load_with_override(Some(&path))?;
        assert_eq!(rules.vip.points(RuleKey::Gpt4oImage), 12);
        assert_eq!(rules.default.points(RuleKey::Flex), 4);
        assert_eq!(rules.default.points(RuleKey::AiProduct), 15);
        Ok(())
    }

    #[test]
    fn no_override_uses_builtin() -> anyhow::Result<()> {
        let rules = DeductionRules::load_with_override(None)?;
        assert_eq!(rules, DeductionRules::builtin()?);
        Ok(())
    }

    #[test]
    fn missing_override_file_is_a_hard_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nope.json");
        let err = DeductionRules::load_with_override(Some(&path)).err();
        assert!(matches!(
            err,
            Some(RuleTableError::Override { path: ref failed, .. }) if failed == &path
        ));
        Ok(())
    }

    #[test]
    fn broken_override_is_a_hard_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("deduction_rules.json");
        fs::write(&path, "{not json")?;
        let err = DeductionRules::load_with_override(Some(&path)).err();
        assert!(matches!(err, Some(RuleTableError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn membership_selects_variant() -> anyhow::Result<()> {
        let rules = DeductionRules::builtin()?;
        assert_eq!(rules.for_membership(&Membership::active()), &rules.vip);
        assert_eq!(rules.for_membership(&Membership::none()), &rules.default);
        assert_eq!(rules.variant(RuleVariant::Vip), &rules.vip);
        Ok(())
    }

    #[test]
    fn builder_sets_single_keys() {
        let table = RuleTable::zeroed()
            .with(RuleKey::Flex, 3)
            .with(RuleKey::Video, 1);
        assert_eq!(table.points(RuleKey::Flex), 3);
        assert_eq!(table.points(RuleKey::Video), 1);
        assert_eq!(table.points(RuleKey::QiHua), 0);
        assert_eq!(table.to_row()["flex"], serde_json::json!(3));
    }
}
