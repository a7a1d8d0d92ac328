//! Tolerant parsing of element boxes returned by the vision model.
//!
//! Replies are tried against a ladder of increasingly aggressive repairs:
//!
//! 1. direct parse after stripping markdown fences,
//! 2. trailing-comma repair, then trailing-comma plus decimal-comma repair,
//! 3. regex extraction of well-formed element objects.
//!
//! When every tier fails the result is an empty list. Items that parse but do
//! not carry a label and a four-value box are dropped, as are inverted boxes.

use crate::domain::{FlatComponent, HeuristicElement};
use crate::processors::geometry::Box2D;
use crate::utils::strip_code_fences;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([\]}])").expect("Invalid trailing comma regex"));

static DECIMAL_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+),(\d+)").expect("Invalid decimal comma regex"));

static FLAT_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\s*"label"\s*:\s*"[^"]+"\s*,\s*"(?:box_percent|box_2d)"\s*:\s*\[[^\]]+\]\s*\}"#)
        .expect("Invalid flat element regex")
});

static HEURISTIC_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{\s*"bbox"\s*:\s*\[[^\]]+\]\s*,\s*"label"\s*:\s*"[^"]+"\s*,\s*"description"\s*:\s*"[^"]*""#,
    )
    .expect("Invalid heuristic element regex")
});

/// Which tier of the ladder produced a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    /// The reply was valid JSON.
    Direct,
    /// Syntax repairs were needed.
    Repaired,
    /// Objects were extracted individually.
    Extracted,
}

/// Runs the first two tiers of the ladder on fence-stripped text.
fn parse_with_repairs(cleaned: &str) -> Option<(Value, ParseTier)> {
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some((value, ParseTier::Direct));
    }

    let trailing_fixed = TRAILING_COMMA.replace_all(cleaned, "$1");
    if let Ok(value) = serde_json::from_str::<Value>(&trailing_fixed) {
        return Some((value, ParseTier::Repaired));
    }

    let decimal_fixed = DECIMAL_COMMA.replace_all(&trailing_fixed, "$1.$2");
    serde_json::from_str::<Value>(&decimal_fixed)
        .ok()
        .map(|value| (value, ParseTier::Repaired))
}

/// Runs the whole ladder; `extract` supplies the tier-3 object fragments.
fn parse_ladder(text: &str, extract: impl Fn(&str) -> Vec<String>) -> Option<(Value, ParseTier)> {
    if text.trim().is_empty() {
        return None;
    }
    let cleaned = strip_code_fences(text);
    if let Some(parsed) = parse_with_repairs(cleaned) {
        return Some(parsed);
    }

    let fragments = extract(cleaned);
    if fragments.is_empty() {
        warn!("no element objects could be extracted from model reply");
        return None;
    }
    let joined = format!("[{}]", fragments.join(","));
    match serde_json::from_str::<Value>(&joined) {
        Ok(value) => Some((value, ParseTier::Extracted)),
        Err(err) => {
            warn!(error = %err, "extracted element objects are not valid JSON");
            None
        }
    }
}

/// Reads a four-number array.
fn four_numbers(value: Option<&Value>) -> Option<[f64; 4]> {
    let items = value?.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64()?;
    }
    Some(out)
}

fn normalized_box(values: [f64; 4]) -> Box2D {
    let [y_min, x_min, y_max, x_max] = values.map(|v| v as i32);
    Box2D::new(y_min, x_min, y_max, x_max)
}

fn array_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => {
            warn!(kind = ?other, "model reply is not a JSON array");
            Vec::new()
        }
    }
}

/// Parses a non-heuristic reply into flat components.
///
/// Accepts `box_2d` (`[y_min, x_min, y_max, x_max]` in 0-1000) and the legacy
/// `box_percent` (`[x_min, y_min, x_max, y_max]` in 0-100).
pub fn parse_flat_components(text: &str) -> Vec<FlatComponent> {
    let Some((value, tier)) = parse_ladder(text, |cleaned| {
        FLAT_OBJECT
            .find_iter(cleaned)
            .map(|m| m.as_str().to_string())
            .collect()
    }) else {
        return Vec::new();
    };

    let components: Vec<FlatComponent> = array_items(value)
        .iter()
        .filter_map(|item| {
            let label = item.get("label")?.as_str()?;
            let bbox = four_numbers(item.get("box_2d"))
                .map(normalized_box)
                .or_else(|| four_numbers(item.get("box_percent")).map(Box2D::from_percent))?;
            if !bbox.is_valid() {
                warn!(label, ?bbox, "skipping inverted element box");
                return None;
            }
            Some(FlatComponent::new(label, bbox))
        })
        .collect();

    debug!(?tier, components = components.len(), "parsed flat components");
    components
}

/// Parses a heuristic reply into hierarchical-mode elements.
pub fn parse_heuristic_elements(text: &str) -> Vec<HeuristicElement> {
    let Some((value, tier)) = parse_ladder(text, |cleaned| {
        HEURISTIC_OBJECT
            .find_iter(cleaned)
            .map(|m| format!("{}}}", m.as_str()))
            .collect()
    }) else {
        return Vec::new();
    };

    let elements: Vec<HeuristicElement> = array_items(value)
        .iter()
        .filter_map(|item| {
            let label = item.get("label")?.as_str()?;
            let bbox = normalized_box(four_numbers(item.get("bbox"))?);
            if !bbox.is_valid() {
                warn!(label, ?bbox, "skipping inverted element box");
                return None;
            }
            let text_field = |key: &str| {
                item.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Some(HeuristicElement {
                bbox,
                label: label.to_string(),
                description: text_field("description"),
                text: text_field("text"),
            })
        })
        .collect();

    debug!(?tier, elements = elements.len(), "parsed heuristic elements");
    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_parse_with_fences() {
        let reply = "```json\n[{\"label\": \"button\", \"box_2d\": [10, 20, 30, 40]}]\n```";
        let parsed = parse_flat_components(reply);
        assert_eq!(parsed, vec![FlatComponent::new("button", Box2D::new(10, 20, 30, 40))]);
    }

    #[test]
    fn test_trailing_comma_recovers_single_element() {
        let parsed = parse_flat_components(r#"[{"label":"a","box_2d":[1,2,3,4]},]"#);
        assert_eq!(parsed, vec![FlatComponent::new("a", Box2D::new(1, 2, 3, 4))]);
    }

    #[test]
    fn test_trailing_comma_tier_is_repaired() {
        let (_, tier) = parse_with_repairs(r#"[{"label":"a","box_2d":[1,2,3,4]},]"#).unwrap();
        assert_eq!(tier, ParseTier::Repaired);
    }

    #[test]
    fn test_regex_extraction_discards_garbage() {
        let reply = r#"Sure! {"label": "nav", "box_2d": [0, 0, 100, 1000]} and then
            {"label": "broken", "box_2d": null ... {"label": "logo", "box_2d": [5, 5, 50, 50]}"#;
        let parsed = parse_flat_components(reply);
        let labels: Vec<&str> = parsed.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["nav", "logo"]);
    }

    #[test]
    fn test_unrecoverable_reply_is_empty() {
        assert!(parse_flat_components("I could not find any elements.").is_empty());
        assert!(parse_flat_components("").is_empty());
        assert!(parse_flat_components(r#"{"label": "x"}"#).is_empty());
    }

    #[test]
    fn test_box_percent_and_bad_items() {
        let reply = r#"[
            {"label": "hero", "box_percent": [0, 10, 100, 50]},
            {"label": "short", "box_2d": [1, 2, 3]},
            {"box_2d": [1, 2, 3, 4]},
            {"label": "inverted", "box_2d": [500, 0, 100, 1000]}
        ]"#;
        let parsed = parse_flat_components(reply);
        assert_eq!(parsed, vec![FlatComponent::new("hero", Box2D::new(100, 0, 500, 1000))]);
    }

    #[test]
    fn test_heuristic_parse_and_extraction() {
        let reply = r#"[{"bbox": [0, 0, 100, 1000], "label": "header", "description": "top bar", "text": "Home"}]"#;
        let parsed = parse_heuristic_elements(reply);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "Home");

        let broken = r#"[{"bbox": [0, 0, 100, 1000], "label": "header", "description": "top bar", "text": "Ho
            {"bbox": [100, 0, 400, 1000], "label": "hero", "description": "banner""#;
        let extracted = parse_heuristic_elements(broken);
        let labels: Vec<&str> = extracted.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["header", "hero"]);
        assert!(extracted.iter().all(|e| e.text.is_empty()));
    }
}
