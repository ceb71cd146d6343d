//! One recorded interaction event, normalized for dispatch.

use crate::errors::ReplayError;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const KEYBOARD_EVENTS: [&str; 3] = ["keydown", "keyup", "keypress"];

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionStep {
    /// 1-based position among the log's records.
    pub index: usize,
    /// 1-based physical line in the source file.
    pub line: usize,
    pub seq: Option<i64>,
    pub page: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub event: String,
    pub action: String,
    pub key: Option<String>,
    pub test_id: Option<String>,
    pub selector: Option<String>,
    pub tag: Option<String>,
    pub element_id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub text: Option<String>,
    pub value: Option<String>,
    pub query_key: Option<String>,
    pub connection_name: Option<String>,
    pub query_name: Option<String>,
    pub raw: Map<String, Value>,
}

impl InteractionStep {
    pub fn parse(raw: &Value, index: usize, line: usize) -> Result<Self, ReplayError> {
        let map = raw.as_object().ok_or_else(|| ReplayError::MalformedRecord {
            line,
            message: "JSON line must be an object".to_string(),
        })?;
        Ok(Self::from_map(map.clone(), index, line))
    }

    pub fn parse_line(text: &str, index: usize, line: usize) -> Result<Self, ReplayError> {
        let text = text.trim_start_matches('\u{feff}').trim();
        let value: Value =
            serde_json::from_str(text).map_err(|e| ReplayError::MalformedRecord {
                line,
                message: format!("invalid JSON: {e}"),
            })?;
        Self::parse(&value, index, line)
    }

    fn from_map(raw: Map<String, Value>, index: usize, line: usize) -> Self {
        let text_field = |key: &str| raw.get(key).and_then(scalar_text);
        Self {
            index,
            line,
            seq: raw.get("seq").and_then(scalar_int),
            page: text_field("page"),
            url: text_field("url"),
            path: text_field("path"),
            event: normalize_kind(text_field("event").as_deref()),
            action: normalize_kind(text_field("action").as_deref()),
            key: text_field("key"),
            test_id: text_field("testId"),
            selector: text_field("selector"),
            tag: text_field("tag"),
            element_id: text_field("id"),
            name: text_field("name"),
            role: text_field("role"),
            text: text_field("text"),
            value: text_field("value"),
            query_key: text_field("queryKey"),
            connection_name: text_field("connectionName"),
            query_name: text_field("queryName"),
            raw,
        }
    }

    pub fn action_key(&self) -> (&str, &str) {
        (self.event.as_str(), self.action.as_str())
    }

    pub fn is_keyboard_event(&self) -> bool {
        KEYBOARD_EVENTS.contains(&self.event.as_str())
    }

    /// Content hash of the raw record; identical records share a key.
    pub fn identity_key(&self) -> String {
        // serde_json::Map is key-sorted, so this rendering is canonical.
        let canonical = Value::Object(self.raw.clone()).to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// Generic field lookup by typed name, wire alias, or `raw.<key>`.
    pub fn field(&self, name: &str) -> Option<String> {
        if let Some(raw_key) = name.strip_prefix("raw.") {
            return self.raw.get(raw_key).and_then(scalar_text);
        }
        match name {
            "index" => Some(self.index.to_string()),
            "line" => Some(self.line.to_string()),
            "seq" => self.seq.map(|v| v.to_string()),
            "event" => Some(self.event.clone()),
            "action" => Some(self.action.clone()),
            "page" => self.page.clone(),
            "url" => self.url.clone(),
            "path" => self.path.clone(),
            "key" => self.key.clone(),
            "testId" | "test_id" => self.test_id.clone(),
            "selector" => self.selector.clone(),
            "tag" => self.tag.clone(),
            "id" | "elementId" | "element_id" => self.element_id.clone(),
            "name" => self.name.clone(),
            "role" => self.role.clone(),
            "text" => self.text.clone(),
            "value" => self.value.clone(),
            "queryKey" | "query_key" => self.query_key.clone(),
            "connectionName" | "connection_name" => self.connection_name.clone(),
            "queryName" | "query_name" => self.query_name.clone(),
            _ => self.raw.get(name).and_then(scalar_text),
        }
    }
}

fn normalize_kind(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_lowercase()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::InteractionStep;
    use crate::errors::ReplayError;
    use serde_json::json;

    #[test]
    fn event_and_action_are_trimmed_and_lowercased() {
        let step = InteractionStep::parse(
            &json!({"event": "  Click ", "action": "ACTIVATE\t", "testId": "main-sql-mode"}),
            1,
            1,
        )
        .expect("parse");
        assert_eq!(step.action_key(), ("click", "activate"));
        assert_eq!(step.test_id.as_deref(), Some("main-sql-mode"));
    }

    #[test]
    fn missing_kinds_normalize_to_empty_but_options_stay_absent() {
        let step = InteractionStep::parse(&json!({"value": "x"}), 4, 7).expect("parse");
        assert_eq!(step.event, "");
        assert_eq!(step.action, "");
        assert_eq!(step.text, None);
        assert_eq!(step.index, 4);
        assert_eq!(step.line, 7);
    }

    #[test]
    fn unknown_fields_are_preserved_and_reachable() {
        let step = InteractionStep::parse(
            &json!({"event": "click", "frame": "plugin", "seq": "17", "value": 42}),
            1,
            1,
        )
        .expect("parse");
        assert_eq!(step.field("frame").as_deref(), Some("plugin"));
        assert_eq!(step.field("raw.frame").as_deref(), Some("plugin"));
        assert_eq!(step.seq, Some(17));
        assert_eq!(step.value.as_deref(), Some("42"));
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let err = InteractionStep::parse(&json!([1, 2]), 1, 9).expect_err("array");
        assert!(matches!(err, ReplayError::MalformedRecord { line: 9, .. }));
    }

    #[test]
    fn invalid_json_names_the_line() {
        let err = InteractionStep::parse_line("{\"event\":", 2, 5).expect_err("broken");
        assert!(matches!(err, ReplayError::MalformedRecord { line: 5, .. }));
    }

    #[test]
    fn bom_prefix_is_ignored() {
        let step = InteractionStep::parse_line("\u{feff}{\"event\":\"click\"}", 1, 1)
            .expect("parse");
        assert_eq!(step.event, "click");
    }

    #[test]
    fn identity_key_ignores_field_order_but_not_content() {
        let a = InteractionStep::parse_line(r#"{"event":"click","testId":"a"}"#, 1, 1)
            .expect("a");
        let b = InteractionStep::parse_line(r#"{"testId":"a","event":"click"}"#, 2, 2)
            .expect("b");
        let c = InteractionStep::parse_line(r#"{"testId":"b","event":"click"}"#, 3, 3)
            .expect("c");
        assert_eq!(a.identity_key(), b.identity_key());
        assert_ne!(a.identity_key(), c.identity_key());
        assert_eq!(a.identity_key().len(), 64);
    }
}
