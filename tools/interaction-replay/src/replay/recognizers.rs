//! Pure predicates that classify a step by its recorded ids.

use crate::replay::step::InteractionStep;

pub const CONNECTION_ITEM_PREFIX: &str = "cm-tree-connection-";
pub const QUERY_DELETE_PREFIX: &str = "sql-manager-query-delete-";
pub const EXPORT_OPTION_PREFIX: &str = "custom-select-item-sql_manager_export_destination-";
pub const CODE_EDITOR_PREFIXES: [&str; 2] = ["sql-codemirror-", "sql-manager-query-editor-"];

/// Child ids probed inside a card when activating its code editor.
pub const CODE_EDITOR_CHILD_IDS: [&str; 2] = ["sql-codemirror", "sql-manager-query-editor"];

const QUERY_NAME_DOM_ID: &str = "dialog-menu-name-sqlreq";
const QUERY_NAME_FAMILIES: [&str; 2] = ["dialog-menu-name-sqlreq", "sql-manager-add-query-name"];
const EXPORT_SELECT_DOM_ID: &str = "export-destination-select";
const EXPORT_SELECT_FAMILIES: [&str; 2] =
    ["export-destination-select", "sql-manager-export-destination"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickIntent {
    ConnectionItem,
    DeleteButton,
    ExportOption,
    CodeEditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDestination {
    File,
    Document,
}

impl ExportDestination {
    pub fn value(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Document => "document",
        }
    }

    /// Visible text of the matching option in the export dialog.
    pub fn label(self) -> &'static str {
        match self {
            Self::File => "В новый файл",
            Self::Document => "В текущий документ",
        }
    }
}

/// `id == prefix` or `id` starts with `prefix-`.
fn in_family(test_id: Option<&str>, prefix: &str) -> bool {
    test_id.is_some_and(|id| {
        id == prefix
            || id
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}

fn has_prefix(test_id: Option<&str>, prefix: &str) -> bool {
    test_id.is_some_and(|id| id.starts_with(prefix))
}

pub fn is_query_name_input(step: &InteractionStep) -> bool {
    step.element_id.as_deref() == Some(QUERY_NAME_DOM_ID)
        || QUERY_NAME_FAMILIES
            .iter()
            .any(|family| in_family(step.test_id.as_deref(), family))
}

pub fn is_export_destination_select(step: &InteractionStep) -> bool {
    step.element_id.as_deref() == Some(EXPORT_SELECT_DOM_ID)
        || EXPORT_SELECT_FAMILIES
            .iter()
            .any(|family| in_family(step.test_id.as_deref(), family))
}

pub fn is_export_destination_option(step: &InteractionStep) -> bool {
    has_prefix(step.test_id.as_deref(), EXPORT_OPTION_PREFIX)
}

pub fn is_connection_item(step: &InteractionStep) -> bool {
    has_prefix(step.test_id.as_deref(), CONNECTION_ITEM_PREFIX)
}

pub fn is_query_delete_button(step: &InteractionStep) -> bool {
    has_prefix(step.test_id.as_deref(), QUERY_DELETE_PREFIX)
}

pub fn is_code_editor_target(step: &InteractionStep) -> bool {
    CODE_EDITOR_PREFIXES
        .iter()
        .any(|prefix| has_prefix(step.test_id.as_deref(), prefix))
}

/// First click recognizer that matches, in fixed priority order.
pub fn classify_click(step: &InteractionStep) -> Option<ClickIntent> {
    if is_connection_item(step) {
        Some(ClickIntent::ConnectionItem)
    } else if is_query_delete_button(step) {
        Some(ClickIntent::DeleteButton)
    } else if is_export_destination_option(step) {
        Some(ClickIntent::ExportOption)
    } else if is_code_editor_target(step) {
        Some(ClickIntent::CodeEditor)
    } else {
        None
    }
}

/// Strip zero-width spaces and tree-expander glyphs from a connection label.
pub fn clean_connection_title(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .replace('\u{200b}', "")
        .trim_start_matches(|c: char| matches!(c, '▶' | '▸' | '►') || c.is_whitespace())
        .trim_end()
        .to_string()
}

/// Keyword heuristic mapping free text to a destination.
///
/// Matches Cyrillic fragments first, then their transliterations.
pub fn infer_destination_value(text: Option<&str>) -> Option<ExportDestination> {
    let normalized = text.unwrap_or_default().to_lowercase();
    if normalized.contains("нов") {
        Some(ExportDestination::File)
    } else if normalized.contains("текущ") {
        Some(ExportDestination::Document)
    } else if normalized.contains("new") || normalized.contains("nov") {
        Some(ExportDestination::File)
    } else if normalized.contains("current") || normalized.contains("tekusch") {
        Some(ExportDestination::Document)
    } else {
        None
    }
}

pub fn infer_destination_label(step: &InteractionStep) -> Option<String> {
    let text = step.text.as_deref().unwrap_or_default().trim();
    if !text.is_empty() {
        return Some(text.to_string());
    }
    let test_id = step.test_id.as_deref().unwrap_or_default();
    if test_id.ends_with("-file") {
        return Some(ExportDestination::File.label().to_string());
    }
    if test_id.ends_with("-document") {
        return Some(ExportDestination::Document.label().to_string());
    }
    infer_destination_value(step.value.as_deref()).map(|dest| dest.label().to_string())
}
