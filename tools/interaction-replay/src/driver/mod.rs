//! Collaborator ports: the automation driver and the target application.
//!
//! Replay never talks to a browser directly. Everything it does goes through
//! `UiDriver` (element primitives) or `TargetApp` (named page operations).

pub mod fake;

use crate::errors::ReplayError;
use crate::replay::locator::LocatorDescriptor;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Opaque handle to a live element owned by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectBy {
    Value,
    VisibleText,
}

/// Fixed page scripts the replay engine is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScript {
    /// Force `element.value = arg`.
    AssignValue,
    /// Force `element.value = arg`, then fire `input` and `change`.
    AssignValueAndNotify,
    /// Fire a bubbling `change` event.
    NotifyChange,
    /// Set the value through the rich editor's own API. Returns `true` when applied.
    RichEditorApi,
    /// Set the rich editor's nested textarea. Returns `true` when applied.
    RichEditorTextarea,
}

impl PageScript {
    pub fn name(self) -> &'static str {
        match self {
            Self::AssignValue => "assign-value",
            Self::AssignValueAndNotify => "assign-value-and-notify",
            Self::NotifyChange => "notify-change",
            Self::RichEditorApi => "rich-editor-api",
            Self::RichEditorTextarea => "rich-editor-textarea",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Self::AssignValue => "arguments[0].value = arguments[1];",
            Self::AssignValueAndNotify => concat!(
                "arguments[0].value = arguments[1];",
                "arguments[0].dispatchEvent(new Event('input', {bubbles:true}));",
                "arguments[0].dispatchEvent(new Event('change', {bubbles:true}));"
            ),
            Self::NotifyChange => {
                "arguments[0].dispatchEvent(new Event('change', {bubbles:true}));"
            }
            Self::RichEditorApi => concat!(
                "const host = arguments[0];",
                "const nodes = [host, host.querySelector && host.querySelector('.CodeMirror'),",
                " host.closest && host.closest('.CodeMirror')];",
                "for (const node of nodes) {",
                " if (node && node.CodeMirror) { node.CodeMirror.setValue(arguments[1]); return true; }",
                "}",
                "return false;"
            ),
            Self::RichEditorTextarea => concat!(
                "const ta = arguments[0].querySelector && arguments[0].querySelector('textarea');",
                "if (!ta) { return false; }",
                "ta.value = arguments[1];",
                "ta.dispatchEvent(new Event('input', {bubbles:true}));",
                "return true;"
            ),
        }
    }
}

/// Opaque-id prefix whose suffix names an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationFamily {
    MainNavigation,
    HomeManager,
}

impl OperationFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::MainNavigation => "main-",
            Self::HomeManager => "sql-home-open-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Expiry is logged and ignored.
    Advisory,
    /// Expiry fails the step.
    Required,
}

/// Condition polled after an operation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostWait {
    /// Busy overlay gone.
    Idle(WaitKind),
    /// Every connection reached a terminal status.
    ConnectionsReady(WaitKind),
}

/// No-argument operations the target application exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AppOperation {
    SqlMode,
    OlapMode,
    FileMode,
    Smartdocs,
    ConnectionManager,
    Settings,
    About,
    ClosePlugin,
    SqlManager,
    ReportManager,
    QueryHistory,
    Log,
    AddQueryOpen,
    AddQueryConfirm,
    ExportConfirm,
    SuccessAcknowledge,
    Minimize,
    ToggleLeftPanel,
}

impl AppOperation {
    pub const ALL: [AppOperation; 18] = [
        Self::SqlMode,
        Self::OlapMode,
        Self::FileMode,
        Self::Smartdocs,
        Self::ConnectionManager,
        Self::Settings,
        Self::About,
        Self::ClosePlugin,
        Self::SqlManager,
        Self::ReportManager,
        Self::QueryHistory,
        Self::Log,
        Self::AddQueryOpen,
        Self::AddQueryConfirm,
        Self::ExportConfirm,
        Self::SuccessAcknowledge,
        Self::Minimize,
        Self::ToggleLeftPanel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlMode => "sql-mode",
            Self::OlapMode => "olap-mode",
            Self::FileMode => "file-mode",
            Self::Smartdocs => "smartdocs",
            Self::ConnectionManager => "connection-manager",
            Self::Settings => "settings",
            Self::About => "about",
            Self::ClosePlugin => "close-plugin",
            Self::SqlManager => "sql-manager",
            Self::ReportManager => "report-manager",
            Self::QueryHistory => "query-history",
            Self::Log => "log",
            Self::AddQueryOpen => "add-query-open",
            Self::AddQueryConfirm => "add-query-confirm",
            Self::ExportConfirm => "export-confirm",
            Self::SuccessAcknowledge => "success-acknowledge",
            Self::Minimize => "minimize",
            Self::ToggleLeftPanel => "toggle-left-panel",
        }
    }

    /// Family membership and the id suffix the family derives for this operation.
    pub fn family(self) -> Option<(OperationFamily, &'static str)> {
        match self {
            Self::SqlMode
            | Self::OlapMode
            | Self::FileMode
            | Self::Smartdocs
            | Self::ConnectionManager
            | Self::Settings
            | Self::About
            | Self::ClosePlugin => Some((OperationFamily::MainNavigation, self.as_str())),
            Self::SqlManager | Self::ReportManager | Self::QueryHistory | Self::Log => {
                Some((OperationFamily::HomeManager, self.as_str()))
            }
            _ => None,
        }
    }

    pub fn post_wait(self) -> Option<PostWait> {
        match self {
            Self::SqlManager => Some(PostWait::ConnectionsReady(WaitKind::Required)),
            Self::ExportConfirm => Some(PostWait::Idle(WaitKind::Advisory)),
            _ => None,
        }
    }
}

pub trait UiDriver: Send + Sync {
    fn find(&self, locator: &LocatorDescriptor) -> Result<Option<ElementRef>, ReplayError>;
    fn find_within(
        &self,
        parent: &ElementRef,
        locator: &LocatorDescriptor,
    ) -> Result<Option<ElementRef>, ReplayError>;
    fn click(&self, element: &ElementRef) -> Result<(), ReplayError>;
    fn tag_name(&self, element: &ElementRef) -> Result<String, ReplayError>;
    fn clear_and_type(&self, element: &ElementRef, text: &str) -> Result<(), ReplayError>;
    fn select_option(
        &self,
        element: &ElementRef,
        by: SelectBy,
        choice: &str,
    ) -> Result<(), ReplayError>;
    fn run_script(
        &self,
        script: PageScript,
        element: &ElementRef,
        arg: Option<&str>,
    ) -> Result<Value, ReplayError>;
    /// Nearest ancestor (or self) matching `css`.
    fn closest(&self, element: &ElementRef, css: &str) -> Result<Option<ElementRef>, ReplayError>;
    fn quit(&self) -> Result<(), ReplayError>;
}

pub trait TargetApp: Send + Sync {
    fn supported_operations(&self) -> Vec<AppOperation> {
        AppOperation::ALL.to_vec()
    }
    fn invoke(&self, op: AppOperation, timeout: Option<Duration>) -> Result<(), ReplayError>;
    fn active_composite(&self) -> Option<ElementRef>;
    fn set_active_composite(&self, element: Option<ElementRef>);
    fn expand_composite(
        &self,
        query_name: Option<&str>,
        connection_name: Option<&str>,
    ) -> Result<Option<ElementRef>, ReplayError>;
    fn select_connection(&self, title: &str) -> Result<(), ReplayError>;
    fn delete_active(&self) -> Result<(), ReplayError>;
    fn preview_active(&self, timeout: Duration) -> Result<(), ReplayError>;
    fn export_active(&self) -> Result<(), ReplayError>;
    fn set_query_text(&self, text: &str) -> Result<(), ReplayError>;
    fn enter_query_name(&self, name: &str) -> Result<(), ReplayError>;
    fn select_export_destination(&self, visible_text: &str) -> Result<(), ReplayError>;
    fn prepare_home(&self) -> Result<(), ReplayError>;
    fn busy(&self) -> Result<bool, ReplayError> {
        Ok(false)
    }
    fn connections_ready(&self) -> Result<bool, ReplayError> {
        Ok(true)
    }
}

#[derive(Clone)]
pub struct ReplaySession {
    pub driver: Arc<dyn UiDriver>,
    pub app: Arc<dyn TargetApp>,
}

pub trait SessionConnector: Send + Sync {
    fn connect(&self, debugger_address: &str) -> Result<ReplaySession, ReplayError>;
}

/// Connector used when no browser backend is compiled in.
pub struct UnlinkedConnector;

impl SessionConnector for UnlinkedConnector {
    fn connect(&self, debugger_address: &str) -> Result<ReplaySession, ReplayError> {
        Err(ReplayError::Driver(format!(
            "no browser backend linked; cannot attach to {debugger_address}"
        )))
    }
}
