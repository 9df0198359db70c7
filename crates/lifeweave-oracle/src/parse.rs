//! Reply parsing into a [`StrategyPlan`].
//!
//! Models rarely return clean JSON every time. Candidates are tried in
//! order until one deserializes:
//!
//! 1. the trimmed reply as-is
//! 2. the body of the first code fence
//! 3. the span from the first `{` to the last `}`
//!
//! each also retried with trailing commas removed. There is no safe default
//! plan, so a reply that never parses is an error and the factory drops the
//! trigger.

use lifeweave_types::StrategyPlan;
use serde::Deserialize;

use crate::error::LlmOracleError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// The reply shape, with the spellings models tend to drift into.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(alias = "goal", alias = "summary")]
    description: String,
    #[serde(default, alias = "motivations", alias = "reasons")]
    motivation: Option<OneOrMany>,
    #[serde(alias = "steps", alias = "strategy")]
    strategies: OneOrMany,
    #[serde(alias = "success")]
    success_condition: String,
    #[serde(default, alias = "failure")]
    failure_condition: Option<String>,
}

impl RawPlan {
    fn into_plan(self) -> StrategyPlan {
        let motivation = self
            .motivation
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .collect();
        let strategies = self
            .strategies
            .into_vec()
            .iter()
            .map(|s| strip_step_marker(s).to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        let failure_condition = self
            .failure_condition
            .map(|f| f.trim().to_owned())
            .filter(|f| {
                !f.is_empty() && !f.eq_ignore_ascii_case("null") && !f.eq_ignore_ascii_case("none")
            });

        StrategyPlan {
            description: self.description.trim().to_owned(),
            motivation,
            strategies,
            success_condition: self.success_condition.trim().to_owned(),
            failure_condition,
        }
    }
}

/// Parse an LLM reply into a plan.
///
/// # Errors
///
/// Returns [`LlmOracleError::Parse`] if no candidate deserializes.
pub fn parse_plan(raw: &str) -> Result<StrategyPlan, LlmOracleError> {
    let trimmed = raw.trim();
    let candidates = [
        Some(trimmed),
        extract_json_from_codeblock(trimmed),
        outermost_object(trimmed),
    ];

    let mut last_error = None;
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<RawPlan>(candidate) {
            Ok(plan) => return Ok(plan.into_plan()),
            Err(e) => last_error = Some(e),
        }
        match serde_json::from_str::<RawPlan>(&strip_trailing_commas(candidate)) {
            Ok(plan) => return Ok(plan.into_plan()),
            Err(e) => last_error = Some(e),
        }
    }

    Err(LlmOracleError::Parse(match last_error {
        Some(e) => format!("no plan in reply ({e})"),
        None => String::from("empty reply"),
    }))
}

/// The body of the first fenced code block, with or without a language tag.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let (_, after_open) = text.split_once("```")?;
    let body = match after_open.split_once('\n') {
        Some((tag, rest)) if !tag.trim_start().starts_with('{') => rest,
        _ => after_open,
    };
    let (inner, _) = body.split_once("```")?;
    Some(inner.trim())
}

/// From the first `{` to the last `}`, inclusive.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Drop commas directly followed (past whitespace) by `}` or `]`, leaving
/// string contents alone.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' => {
                let rest = text.get(i.saturating_add(1)..).unwrap_or("");
                if matches!(rest.trim_start().chars().next(), Some('}' | ']')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

/// Remove list markers such as `1.`, `2)` or `-` from a step.
fn strip_step_marker(step: &str) -> &str {
    let s = step.trim();
    let s = s
        .strip_prefix("- ")
        .or_else(|| s.strip_prefix("* "))
        .unwrap_or(s);
    let digits = s.chars().take_while(char::is_ascii_digit).count();
    if digits > 0
        && let Some(rest) = s.get(digits..)
        && let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
    {
        return rest.trim();
    }
    s
}
