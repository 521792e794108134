mod rules;

pub use rules::{DeductionRules, RuleKey, RuleTable, RuleTableError, RuleVariant};

use std::fmt;

use serde_json::Value;

use crate::jobs::{self, JobRecord, ModelKey};

/// Membership snapshot supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Membership {
    active: bool,
}

impl Membership {
    pub fn active() -> Self {
        Self { active: true }
    }

    pub fn none() -> Self {
        Self { active: false }
    }

    /// Reads the account's VIP info object; any truthy `level` counts as an
    /// active tier.
    pub fn from_vip_info(info: &Value) -> Self {
        let active = info.get("level").map(is_truthy).unwrap_or(false);
        Self { active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    MemberFree,
    Points(u32),
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemberFree => f.write_str("member free"),
            Self::Points(points) => write!(f, "{points}credits"),
        }
    }
}

/// Pricing bucket a `model_used` key falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFamily {
    Gpt,
    QiHua,
    Flex,
}

impl RuleFamily {
    /// Volcengine/"dou" keys win over a GPT match.
    pub fn of(model_used: &str) -> Self {
        if model_used.contains("volcengine") || model_used.contains("dou") {
            return Self::QiHua;
        }
        if model_used.contains("gpt") || model_used.contains("GPT") {
            return Self::Gpt;
        }
        Self::Flex
    }
}

/// Points a re-run of `job` would cost under `rules`.
pub fn points(job: &JobRecord, rules: &RuleTable) -> u32 {
    let family = RuleFamily::of(&job.model_used);
    let has_images = !jobs::images(job).is_empty();

    let mut points = match family {
        RuleFamily::Gpt => rules.points(RuleKey::Gpt4oImage),
        RuleFamily::Flex | RuleFamily::QiHua => rules.points(RuleKey::Flex),
    };
    match family {
        RuleFamily::Flex if has_images => points = rules.points(RuleKey::FluxKontextPro2),
        RuleFamily::Flex => points = points.saturating_mul(batch_size(job)),
        RuleFamily::QiHua if has_images => points = rules.points(RuleKey::FluxKontextPro1),
        RuleFamily::QiHua => points = rules.points(RuleKey::QiHua),
        RuleFamily::Gpt => {}
    }
    if job.model_key() == ModelKey::AiProduct {
        points = rules.points(RuleKey::AiProduct);
    }
    points
}

pub fn cost(job: &JobRecord, rules: &RuleTable, membership: &Membership) -> Cost {
    let points = points(job, rules);
    if membership.is_active() && points == 0 {
        return Cost::MemberFree;
    }
    Cost::Points(points)
}

/// `input_data.batch_size`, accepting numbers or numeric strings. Missing,
/// zero or unparseable values count as a single image.
pub fn batch_size(job: &JobRecord) -> u32 {
    job.input_data()
        .and_then(|input| input.batch_size.as_ref())
        .and_then(parse_leading_int)
        .filter(|value| *value > 0)
        .unwrap_or(1)
}

fn parse_leading_int(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => {
            let digits: String = text
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<u32>().ok()
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
