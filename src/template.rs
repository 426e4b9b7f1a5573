//! Response template evaluation.
//!
//! A template is any JSON value. Mappings and sequences are walked
//! recursively, non-string scalars pass through, and every string leaf runs
//! through a fixed substitution pipeline:
//!
//! 1. `{{request.json.<key>}}` for each top-level key of the request body
//! 2. `{{random_int(MIN,MAX)}}`, a fresh draw per occurrence
//! 3. `{{now()}}` (local ISO-8601, no offset) and `{{timestamp}}` (Unix seconds)
//! 4. `{{random_choice([a, b, ...])}}`, a fresh pick per occurrence
//!
//! When at least one directive was resolved the result is re-parsed as JSON,
//! so a leaf such as `"{{random_int(1,9)}}"` yields a number. Unknown or
//! malformed directives are left verbatim; evaluation never fails.

use chrono::Local;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

static RANDOM_INT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{random_int\((-?\d+),\s*(-?\d+)\)\}\}").expect("random_int pattern")
});

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(now\(\)|timestamp)\}\}").expect("clock pattern"));

static RANDOM_CHOICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{random_choice\(\[(.*?)\]\)\}\}").expect("random_choice pattern")
});

/// The inbound request as seen by templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    /// Parsed body when it is a JSON object, otherwise empty
    pub json: Map<String, JsonValue>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Attach a parsed body; anything other than an object is dropped.
    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.json = match body {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Parse raw body bytes, keeping only a well-formed JSON object.
    pub fn with_body(self, body: &[u8]) -> Self {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(value) => self.with_json(value),
            Err(_) => self,
        }
    }
}

/// A template value with its shape made explicit
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    Text(String),
    Mapping(Vec<(String, Template)>),
    Sequence(Vec<Template>),
    /// Numbers, booleans and null; never inspected for directives
    Scalar(JsonValue),
}

impl From<&JsonValue> for Template {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(text) => Template::Text(text.clone()),
            JsonValue::Object(map) => Template::Mapping(
                map.iter()
                    .map(|(key, value)| (key.clone(), Template::from(value)))
                    .collect(),
            ),
            JsonValue::Array(items) => Template::Sequence(items.iter().map(Template::from).collect()),
            scalar => Template::Scalar(scalar.clone()),
        }
    }
}

impl Template {
    pub fn evaluate(&self, ctx: &RequestContext) -> JsonValue {
        match self {
            Template::Text(text) => render_text(text, ctx),
            Template::Mapping(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.evaluate(ctx)))
                    .collect(),
            ),
            Template::Sequence(items) => {
                JsonValue::Array(items.iter().map(|item| item.evaluate(ctx)).collect())
            }
            Template::Scalar(value) => value.clone(),
        }
    }
}

/// Evaluate a stored template against one request.
pub fn evaluate(template: &JsonValue, ctx: &RequestContext) -> JsonValue {
    Template::from(template).evaluate(ctx)
}

fn render_text(text: &str, ctx: &RequestContext) -> JsonValue {
    let mut rendered = text.to_string();
    let mut substituted = false;

    for (key, value) in &ctx.json {
        let directive = format!("{{{{request.json.{}}}}}", key);
        if rendered.contains(&directive) {
            rendered = rendered.replace(&directive, &field_text(value));
            substituted = true;
        }
    }

    let passes: [fn(&str) -> Option<String>; 3] =
        [replace_random_ints, replace_clock, replace_random_choices];
    for pass in passes {
        if let Some(next) = pass(&rendered) {
            rendered = next;
            substituted = true;
        }
    }

    if !substituted {
        return JsonValue::String(rendered);
    }
    match serde_json::from_str(&rendered) {
        Ok(parsed) => parsed,
        Err(_) => JsonValue::String(rendered),
    }
}

/// String form of a body field: strings raw, everything else as JSON text.
fn field_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn replace_random_ints(text: &str) -> Option<String> {
    let mut resolved = false;
    let replaced = RANDOM_INT.replace_all(text, |caps: &Captures| {
        match (caps[1].parse::<i64>(), caps[2].parse::<i64>()) {
            (Ok(min), Ok(max)) if min <= max => {
                resolved = true;
                rand::thread_rng().gen_range(min..=max).to_string()
            }
            _ => caps[0].to_string(),
        }
    });
    let replaced = replaced.into_owned();
    resolved.then_some(replaced)
}

fn replace_clock(text: &str) -> Option<String> {
    if !CLOCK.is_match(text) {
        return None;
    }
    let replaced = CLOCK.replace_all(text, |caps: &Captures| match &caps[1] {
        "timestamp" => unix_timestamp(),
        _ => local_now(),
    });
    Some(replaced.into_owned())
}

fn replace_random_choices(text: &str) -> Option<String> {
    if !RANDOM_CHOICE.is_match(text) {
        return None;
    }
    let mut rng = rand::thread_rng();
    let replaced = RANDOM_CHOICE.replace_all(text, |caps: &Captures| {
        let options: Vec<&str> = caps[1]
            .split(',')
            .map(|option| option.trim().trim_matches(['"', '\'']))
            .collect();
        options.choose(&mut rng).copied().unwrap_or_default().to_string()
    });
    Some(replaced.into_owned())
}

fn local_now() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn unix_timestamp() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    format!("{:?}", seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::new("POST", "/test")
    }

    fn ctx_with_body(body: JsonValue) -> RequestContext {
        ctx().with_json(body)
    }

    #[test]
    fn test_passthrough_without_directives() {
        let template = json!({
            "name": "plain",
            "count": 3,
            "flag": false,
            "nothing": null,
            "items": ["a", 1, {"nested": "b"}],
            "numeric_text": "123",
            "json_text": "{\"x\": 1}",
            "braces": "{{not_a_directive}}"
        });
        let body_ctx = ctx_with_body(json!({"name": "Ann"}));

        assert_eq!(evaluate(&template, &ctx()), template);
        assert_eq!(evaluate(&template, &body_ctx), template);
    }

    #[test]
    fn test_request_field_interpolation() {
        let ctx = ctx_with_body(json!({"name": "Ann"}));
        assert_eq!(
            evaluate(&json!("Hello {{request.json.name}}"), &ctx),
            json!("Hello Ann")
        );
    }

    #[test]
    fn test_request_field_string_forms() {
        let ctx = ctx_with_body(json!({
            "amount": 12.5,
            "paid": true,
            "note": null,
            "tags": ["a", "b"]
        }));
        assert_eq!(
            evaluate(
                &json!("{{request.json.amount}}|{{request.json.paid}}|{{request.json.note}}|{{request.json.tags}}"),
                &ctx
            ),
            json!("12.5|true|null|[\"a\",\"b\"]")
        );
    }

    #[test]
    fn test_unmatched_request_field_is_left_verbatim() {
        let ctx = ctx_with_body(json!({"name": "Ann"}));
        assert_eq!(
            evaluate(&json!("Hi {{request.json.missing}}"), &ctx),
            json!("Hi {{request.json.missing}}")
        );
        assert_eq!(
            evaluate(&json!("{{request.json.name.first}}"), &ctx),
            json!("{{request.json.name.first}}")
        );
    }

    #[test]
    fn test_interpolated_number_is_promoted() {
        let ctx = ctx_with_body(json!({"amount": 100}));
        assert_eq!(evaluate(&json!("{{request.json.amount}}"), &ctx), json!(100));
    }

    #[test]
    fn test_random_int_bounds() {
        let template = json!("{{random_int(100000,999999)}}");
        for _ in 0..200 {
            let value = evaluate(&template, &ctx()).as_i64().expect("promoted to a number");
            assert!((100000..=999999).contains(&value));
        }
    }

    #[test]
    fn test_random_int_custom_bounds_and_fresh_draws() {
        let template = json!("{{random_int(1, 3)}}-{{random_int(7,7)}}");
        for _ in 0..50 {
            let text = evaluate(&template, &ctx());
            let text = text.as_str().unwrap();
            let (left, right) = text.split_once('-').unwrap();
            assert!(["1", "2", "3"].contains(&left));
            assert_eq!(right, "7");
        }
    }

    #[test]
    fn test_random_int_inverted_bounds_left_verbatim() {
        let template = json!("{{random_int(9,1)}}");
        assert_eq!(evaluate(&template, &ctx()), template);
    }

    #[test]
    fn test_random_choice_membership() {
        let template = json!("{{random_choice([A, B, C])}}");
        for _ in 0..100 {
            let value = evaluate(&template, &ctx());
            assert!(["A", "B", "C"].contains(&value.as_str().unwrap()), "got {}", value);
        }
    }

    #[test]
    fn test_random_choice_strips_quotes() {
        let template = json!("{{random_choice(['ok', \"fail\"])}}");
        for _ in 0..50 {
            let value = evaluate(&template, &ctx());
            assert!(["ok", "fail"].contains(&value.as_str().unwrap()), "got {}", value);
        }
    }

    #[test]
    fn test_random_choice_resolves_every_occurrence() {
        let template = json!("{{random_choice([x])}}/{{random_choice([y, y])}}");
        assert_eq!(evaluate(&template, &ctx()), json!("x/y"));
    }

    #[test]
    fn test_malformed_choice_left_verbatim() {
        let template = json!({
            "broken": "{{random_choice(A, B)}}",
            "fine": "{{random_choice([Z])}}"
        });
        let result = evaluate(&template, &ctx());
        assert_eq!(result["broken"], json!("{{random_choice(A, B)}}"));
        assert_eq!(result["fine"], json!("Z"));
    }

    #[test]
    fn test_now_is_local_iso_without_offset() {
        let value = evaluate(&json!("{{now()}}"), &ctx());
        let text = value.as_str().expect("timestamp stays a string");
        assert!(NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok(), "got {}", text);
        assert!(!text.ends_with('Z') && !text.contains('+'));
    }

    #[test]
    fn test_timestamp_is_unix_seconds() {
        let value = evaluate(&json!("{{timestamp}}"), &ctx());
        let seconds = value.as_f64().expect("timestamp promotes to a number");
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs_f64();
        assert!((now - seconds).abs() < 60.0);
    }

    #[test]
    fn test_structured_promotion() {
        let value = evaluate(&json!(r#"{"status": "{{now()}}"}"#), &ctx());
        assert!(value.is_object(), "got {}", value);
        assert!(value["status"].is_string());

        let raw = evaluate(&json!("at {{now()}}"), &ctx());
        assert!(raw.as_str().unwrap().starts_with("at "));
    }

    #[test]
    fn test_recursion_preserves_keys_and_order() {
        let ctx = ctx_with_body(json!({"id": "42"}));
        let template = json!({
            "z": "{{request.json.id}}",
            "a": ["{{random_choice([only])}}", 7],
            "m": {"inner": "id={{request.json.id}}"}
        });

        let result = evaluate(&template, &ctx);
        let keys: Vec<&String> = result.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(result["z"], json!(42));
        assert_eq!(result["a"], json!(["only", 7]));
        assert_eq!(result["m"]["inner"], json!("id=42"));
    }

    #[test]
    fn test_template_shape_is_explicit() {
        let template = Template::from(&json!({"a": ["x", 1]}));
        assert_eq!(
            template,
            Template::Mapping(vec![(
                "a".to_string(),
                Template::Sequence(vec![
                    Template::Text("x".to_string()),
                    Template::Scalar(json!(1))
                ])
            )])
        );
    }

    #[test]
    fn test_body_parsing_keeps_objects_only() {
        let parsed = ctx().with_body(br#"{"a": 1}"#);
        assert_eq!(parsed.json.get("a"), Some(&json!(1)));

        assert!(ctx().with_body(b"[1, 2]").json.is_empty());
        assert!(ctx().with_body(b"name=Ann").json.is_empty());
        assert!(ctx().with_body(b"").json.is_empty());
    }
}
