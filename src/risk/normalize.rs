//! Canonical interpretation of classifier responses.
//!
//! The classifier endpoint is schema-free from our point of view: deployed
//! models have answered with scored lists, `[label, score]` pairs, bare
//! numbers, and several generations of field names inside objects. All call
//! sites go through this single normalizer so probability semantics never
//! diverge between them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized risk judgment. A `None` probability means "no decision" and
/// must never be read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskResponse {
    pub bot_probability: Option<f64>,
    pub label: Option<String>,
    pub confidence_raw: Option<f64>,
}

impl RiskResponse {
    pub fn no_decision() -> Self {
        Self::default()
    }
}

/// Labels naming the human class across model generations.
const HUMAN_LABELS: &[&str] = &["human", "benign", "0", "false"];

fn is_human_label(label: Option<&str>) -> bool {
    label
        .map(|l| HUMAN_LABELS.contains(&l.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Known upstream response shapes, resolved in declaration order. `Other`
/// absorbs anything unrecognized, which keeps normalization total.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierOutput {
    Ranked(Vec<RankedGuess>),
    Pair(Value, Value),
    Scalar(f64),
    Fields(Box<ResponseFields>),
    Other(Value),
}

/// One entry of a scored-item list: `[{"label": "bot", "score": 0.9}, ...]`.
#[derive(Debug, Deserialize)]
struct RankedGuess {
    label: Option<Value>,
    prediction: Option<Value>,
    bot_prob: Option<Value>,
    prob: Option<Value>,
    score: Option<Value>,
    confidence: Option<Value>,
}

/// Structured object response. Every field is optional; values stay raw
/// JSON because some models emit numbers as strings.
#[derive(Debug, Default, Deserialize)]
struct ResponseFields {
    #[serde(alias = "botProb", alias = "bot", alias = "botProbability", alias = "prob_bot")]
    bot_prob: Option<Value>,
    #[serde(
        alias = "humanProb",
        alias = "human",
        alias = "humanProbability",
        alias = "prob_human"
    )]
    human_prob: Option<Value>,
    confidence: Option<Value>,
    score: Option<Value>,
    prob: Option<Value>,
    probability: Option<Value>,
    value: Option<Value>,
    pred: Option<Value>,
    label: Option<Value>,
    prediction: Option<Value>,
    result: Option<Value>,
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_label(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn clamp_unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Percentage coercion: a magnitude above 1 is read as a percent.
fn coerce_unit(v: f64) -> f64 {
    if v.abs() > 1.0 {
        clamp_unit(v / 100.0)
    } else {
        clamp_unit(v)
    }
}

fn first_label(candidates: &[&Option<Value>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_ref())
        .find_map(as_label)
}

fn first_number(candidates: &[&Option<Value>]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|c| c.as_ref())
        .find_map(as_number)
}

/// Unwrap the transport envelope (`{"ok": true, "prediction": {...}}`)
/// before normalizing. The collect endpoint nests the judgment under
/// `prediction` or `detection`; bare responses pass straight through.
pub fn normalize_envelope(raw: &Value) -> RiskResponse {
    if let Value::Object(map) = raw {
        for key in ["prediction", "detection"] {
            if let Some(inner) = map.get(key) {
                if inner.is_object() || inner.is_array() {
                    return normalize(inner);
                }
            }
        }
    }
    normalize(raw)
}

/// Map any classifier output to a [`RiskResponse`]. Total: never fails,
/// never panics; unrecognized input yields a null-probability response.
pub fn normalize(raw: &Value) -> RiskResponse {
    let out = ClassifierOutput::deserialize(raw)
        .unwrap_or_else(|_| ClassifierOutput::Other(Value::Null));

    match out {
        ClassifierOutput::Ranked(items) => {
            let Some(first) = items.first() else {
                return RiskResponse::no_decision();
            };
            let label = first_label(&[&first.label, &first.prediction]);
            // An explicit bot-probability wins and is never flipped; only a
            // generic score is directed by the label.
            if let Some(n) = first.bot_prob.as_ref().and_then(as_number) {
                return scored(n, label, false);
            }
            match first_number(&[&first.prob, &first.score, &first.confidence]) {
                Some(n) => scored(n, label, true),
                None => RiskResponse {
                    bot_probability: None,
                    label,
                    confidence_raw: None,
                },
            }
        }
        ClassifierOutput::Pair(l, s) => {
            let label = as_label(&l);
            match as_number(&s) {
                Some(n) => scored(n, label, true),
                None => RiskResponse {
                    bot_probability: None,
                    label,
                    confidence_raw: None,
                },
            }
        }
        ClassifierOutput::Scalar(n) => {
            let p = coerce_unit(n);
            RiskResponse {
                bot_probability: Some(p),
                label: Some(if p >= 0.5 { "bot" } else { "human" }.to_string()),
                confidence_raw: Some(n),
            }
        }
        ClassifierOutput::Fields(f) => normalize_fields(&f),
        ClassifierOutput::Other(_) => RiskResponse::no_decision(),
    }
}

/// Derive a bot probability from a `(label, score)` style judgment: a
/// human-class label means the score backs the human side.
fn scored(num: f64, label: Option<String>, label_directed: bool) -> RiskResponse {
    let bot = if label_directed && is_human_label(label.as_deref()) {
        1.0 - num
    } else {
        num
    };
    RiskResponse {
        bot_probability: Some(clamp_unit(bot)),
        label,
        confidence_raw: Some(num),
    }
}

fn normalize_fields(f: &ResponseFields) -> RiskResponse {
    let label = first_label(&[&f.label, &f.prediction, &f.result]);

    // 1. Explicit bot-probability keys pass through (clamped only).
    if let Some(n) = f.bot_prob.as_ref().and_then(as_number) {
        return RiskResponse {
            bot_probability: Some(clamp_unit(n)),
            label,
            confidence_raw: Some(n),
        };
    }
    // 2. Explicit human-probability keys complement.
    if let Some(n) = f.human_prob.as_ref().and_then(as_number) {
        return RiskResponse {
            bot_probability: Some(clamp_unit(1.0 - n)),
            label,
            confidence_raw: Some(n),
        };
    }
    // 3. Generic confidence/score, direction disambiguated by the label.
    if let Some(n) = first_number(&[&f.confidence, &f.score, &f.prob, &f.probability, &f.value]) {
        let p = coerce_unit(n);
        let bot = if is_human_label(label.as_deref()) {
            1.0 - p
        } else {
            p
        };
        return RiskResponse {
            bot_probability: Some(clamp_unit(bot)),
            label,
            confidence_raw: Some(n),
        };
    }
    // 4. Remaining fallback numeric key.
    if let Some(n) = f.pred.as_ref().and_then(as_number) {
        return RiskResponse {
            bot_probability: Some(coerce_unit(n)),
            label,
            confidence_raw: Some(n),
        };
    }

    RiskResponse {
        bot_probability: None,
        label,
        confidence_raw: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_bot_prob_passes_through() {
        let r = normalize(&json!({"bot_prob": 0.73}));
        assert!((r.bot_probability.unwrap() - 0.73).abs() < 1e-9);
    }

    #[test]
    fn human_prob_complements() {
        let r = normalize(&json!({"human_prob": 0.2}));
        assert!((r.bot_probability.unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn bare_number_percentage_coercion() {
        let r = normalize(&json!(150));
        assert!((r.bot_probability.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(r.label.as_deref(), Some("bot"));
    }

    #[test]
    fn totality_over_arbitrary_input() {
        for v in [
            json!(null),
            json!("garbage"),
            json!(true),
            json!([]),
            json!({}),
            json!({"nested": {"deep": []}}),
            json!([[1, 2], [3]]),
        ] {
            let r = normalize(&v);
            match r.bot_probability {
                None => {}
                Some(p) => assert!((0.0..=1.0).contains(&p)),
            }
        }
    }

    #[test]
    fn ranked_list_with_human_label_flips_score() {
        let r = normalize(&json!([{"label": "human", "score": 0.9}]));
        assert!((r.bot_probability.unwrap() - 0.1).abs() < 1e-9);
        assert_eq!(r.label.as_deref(), Some("human"));
        assert!((r.confidence_raw.unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn label_score_pair() {
        let r = normalize(&json!(["bot", 0.66]));
        assert!((r.bot_probability.unwrap() - 0.66).abs() < 1e-9);
        let r = normalize(&json!(["human", 0.66]));
        assert!((r.bot_probability.unwrap() - 0.34).abs() < 1e-9);
    }

    #[test]
    fn generic_confidence_disambiguated_by_label() {
        let r = normalize(&json!({"label": "human", "confidence": 0.95}));
        assert!((r.bot_probability.unwrap() - 0.05).abs() < 1e-9);
        let r = normalize(&json!({"label": "bot", "confidence": 0.95}));
        assert!((r.bot_probability.unwrap() - 0.95).abs() < 1e-9);
    }

    #[test]
    fn envelope_unwraps_prediction() {
        let r = normalize_envelope(&json!({
            "ok": true,
            "saved": true,
            "prediction": {"label": "bot", "bot_prob": 0.91}
        }));
        assert!((r.bot_probability.unwrap() - 0.91).abs() < 1e-9);
        assert_eq!(r.label.as_deref(), Some("bot"));
    }

    #[test]
    fn null_valued_keys_are_skipped() {
        let r = normalize(&json!({"bot_prob": null, "score": 0.4}));
        assert!((r.bot_probability.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn numeric_strings_parse() {
        let r = normalize(&json!({"bot_prob": "0.25"}));
        assert!((r.bot_probability.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn label_only_response_keeps_label() {
        let r = normalize(&json!({"result": "bot"}));
        assert_eq!(r.bot_probability, None);
        assert_eq!(r.label.as_deref(), Some("bot"));
    }
}
