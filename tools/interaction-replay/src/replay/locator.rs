//! Element lookup descriptors derived from a step's recorded hints.

use crate::replay::step::InteractionStep;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocatorDescriptor {
    /// CSS selector, either recorded verbatim or built from an opaque id.
    Css(String),
    /// Raw DOM `id` attribute.
    Id(String),
}

impl LocatorDescriptor {
    pub fn test_id(id: &str) -> Self {
        Self::Css(format!("[data-testid='{}']", id.replace('\'', "\\'")))
    }
}

impl fmt::Display for LocatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css={selector}"),
            Self::Id(id) => write!(f, "id={id}"),
        }
    }
}

/// Selector first, then opaque id, then DOM id.
pub fn resolve(step: &InteractionStep) -> Option<LocatorDescriptor> {
    resolve_with(step, true)
}

pub fn resolve_with(step: &InteractionStep, allow_dom_id: bool) -> Option<LocatorDescriptor> {
    if let Some(selector) = non_empty(step.selector.as_deref()) {
        return Some(LocatorDescriptor::Css(selector.to_string()));
    }
    if let Some(test_id) = non_empty(step.test_id.as_deref()) {
        return Some(LocatorDescriptor::test_id(test_id));
    }
    if allow_dom_id {
        if let Some(id) = non_empty(step.element_id.as_deref()) {
            return Some(LocatorDescriptor::Id(id.to_string()));
        }
    }
    None
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{resolve, resolve_with, LocatorDescriptor};
    use crate::replay::step::InteractionStep;
    use serde_json::json;

    fn step(raw: serde_json::Value) -> InteractionStep {
        InteractionStep::parse(&raw, 1, 1).expect("step")
    }

    #[test]
    fn selector_wins_over_test_id_and_dom_id() {
        let s = step(json!({"selector": "#run", "testId": "run-btn", "id": "run"}));
        assert_eq!(resolve(&s), Some(LocatorDescriptor::Css("#run".to_string())));
    }

    #[test]
    fn test_id_is_escaped_into_attribute_selector() {
        let s = step(json!({"testId": "it's-here", "id": "x"}));
        assert_eq!(
            resolve(&s),
            Some(LocatorDescriptor::Css("[data-testid='it\\'s-here']".to_string()))
        );
    }

    #[test]
    fn dom_id_is_last_resort() {
        let s = step(json!({"id": "dialog-menu-name-sqlreq"}));
        assert_eq!(
            resolve(&s),
            Some(LocatorDescriptor::Id("dialog-menu-name-sqlreq".to_string()))
        );
        assert_eq!(resolve_with(&s, false), None);
    }

    #[test]
    fn empty_hints_resolve_to_nothing() {
        let s = step(json!({"event": "click", "selector": "", "testId": ""}));
        assert_eq!(resolve(&s), None);
    }
}
