use super::{
    AppOperation, ElementRef, PageScript, ReplaySession, SelectBy, SessionConnector, TargetApp,
    UiDriver,
};
use crate::errors::ReplayError;
use crate::replay::context::COMPOSITE_SELECTOR;
use crate::replay::locator::LocatorDescriptor;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    tag: String,
    selectors: Vec<String>,
    dom_id: Option<String>,
    parent: Option<ElementRef>,
    options: Vec<(String, String)>,
    rich_editor: bool,
    nested_textarea: bool,
    value: Option<String>,
    alive: bool,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn composite() -> Self {
        Self::new("div").selector(COMPOSITE_SELECTOR)
    }

    pub fn selector(mut self, css: &str) -> Self {
        self.selectors.push(css.to_string());
        self
    }

    pub fn test_id(self, id: &str) -> Self {
        match LocatorDescriptor::test_id(id) {
            LocatorDescriptor::Css(css) => self.selector(&css),
            LocatorDescriptor::Id(_) => self,
        }
    }

    pub fn dom_id(mut self, id: &str) -> Self {
        self.dom_id = Some(id.to_string());
        self
    }

    pub fn inside(mut self, parent: &ElementRef) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn option(mut self, value: &str, text: &str) -> Self {
        self.options.push((value.to_string(), text.to_string()));
        self
    }

    pub fn rich_editor(mut self) -> Self {
        self.rich_editor = true;
        self
    }

    pub fn nested_textarea(mut self) -> Self {
        self.nested_textarea = true;
        self
    }

    fn matches(&self, locator: &LocatorDescriptor) -> bool {
        match locator {
            LocatorDescriptor::Css(css) => self.selectors.iter().any(|s| s == css),
            LocatorDescriptor::Id(id) => self.dom_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct FakeComposite {
    query_name: Option<String>,
    connection_name: Option<String>,
    element: ElementRef,
}

#[derive(Default)]
struct FakeState {
    elements: BTreeMap<ElementRef, FakeElement>,
    next_id: usize,
    composites: Vec<FakeComposite>,
    connections: BTreeSet<String>,
    active: Option<ElementRef>,
    activate_on_invoke: BTreeMap<AppOperation, ElementRef>,
    calls: Vec<String>,
    busy_polls: u32,
    pending_connection_polls: u32,
    connections_never_ready: bool,
    failing: BTreeSet<String>,
    unsupported: BTreeSet<AppOperation>,
    quit_fails: bool,
}

impl FakeState {
    fn check(&self, key: &str) -> Result<(), ReplayError> {
        if self.failing.contains(key) {
            return Err(ReplayError::Driver(format!("{key} failed")));
        }
        Ok(())
    }

    fn live(&self, element: &ElementRef) -> Result<&FakeElement, ReplayError> {
        self.elements
            .get(element)
            .filter(|el| el.alive)
            .ok_or_else(|| ReplayError::Driver(format!("stale element reference {}", element.0)))
    }

    fn live_mut(&mut self, element: &ElementRef) -> Result<&mut FakeElement, ReplayError> {
        self.elements
            .get_mut(element)
            .filter(|el| el.alive)
            .ok_or_else(|| ReplayError::Driver(format!("stale element reference {}", element.0)))
    }

    fn is_descendant(&self, element: &ElementRef, ancestor: &ElementRef) -> bool {
        let mut cursor = self.elements.get(element).and_then(|el| el.parent.clone());
        while let Some(current) = cursor {
            if &current == ancestor {
                return true;
            }
            cursor = self.elements.get(&current).and_then(|el| el.parent.clone());
        }
        false
    }

    fn active_or_err(&self) -> Result<ElementRef, ReplayError> {
        self.active
            .clone()
            .ok_or_else(|| ReplayError::Driver("no active query card".to_string()))
    }
}

/// In-memory driver and application used by tests and dry runs.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> ReplaySession {
        ReplaySession {
            driver: Arc::new(self.clone()),
            app: Arc::new(self.clone()),
        }
    }

    pub fn add_element(&self, mut element: FakeElement) -> ElementRef {
        let mut state = self.state.lock().expect("fake browser lock");
        state.next_id += 1;
        let handle = ElementRef(format!("el-{}", state.next_id));
        element.alive = true;
        state.elements.insert(handle.clone(), element);
        handle
    }

    /// Register a card the application can expand by query and connection name.
    pub fn add_composite(
        &self,
        query_name: Option<&str>,
        connection_name: Option<&str>,
    ) -> ElementRef {
        let element = self.add_element(FakeElement::composite());
        self.state
            .lock()
            .expect("fake browser lock")
            .composites
            .push(FakeComposite {
                query_name: query_name.map(str::to_string),
                connection_name: connection_name.map(str::to_string),
                element: element.clone(),
            });
        element
    }

    pub fn add_connection(&self, title: &str) {
        self.state
            .lock()
            .expect("fake browser lock")
            .connections
            .insert(title.to_string());
    }

    pub fn kill(&self, element: &ElementRef) {
        if let Some(el) = self
            .state
            .lock()
            .expect("fake browser lock")
            .elements
            .get_mut(element)
        {
            el.alive = false;
        }
    }

    pub fn set_active(&self, element: Option<ElementRef>) {
        self.state.lock().expect("fake browser lock").active = element;
    }

    pub fn active(&self) -> Option<ElementRef> {
        self.state.lock().expect("fake browser lock").active.clone()
    }

    /// Make `op` adopt `element` as the active card when invoked.
    pub fn activate_on_invoke(&self, op: AppOperation, element: &ElementRef) {
        self.state
            .lock()
            .expect("fake browser lock")
            .activate_on_invoke
            .insert(op, element.clone());
    }

    pub fn busy_for(&self, polls: u32) {
        self.state.lock().expect("fake browser lock").busy_polls = polls;
    }

    pub fn connections_pending_for(&self, polls: u32) {
        self.state
            .lock()
            .expect("fake browser lock")
            .pending_connection_polls = polls;
    }

    pub fn connections_never_ready(&self) {
        self.state
            .lock()
            .expect("fake browser lock")
            .connections_never_ready = true;
    }

    /// Fail the named call (`invoke` operation name, or `preview`, `export`, ...).
    pub fn fail_on(&self, key: &str) {
        self.state
            .lock()
            .expect("fake browser lock")
            .failing
            .insert(key.to_string());
    }

    pub fn unsupported(&self, op: AppOperation) {
        self.state
            .lock()
            .expect("fake browser lock")
            .unsupported
            .insert(op);
    }

    pub fn quit_fails(&self) {
        self.state.lock().expect("fake browser lock").quit_fails = true;
    }

    pub fn value_of(&self, element: &ElementRef) -> Option<String> {
        self.state
            .lock()
            .expect("fake browser lock")
            .elements
            .get(element)
            .and_then(|el| el.value.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("fake browser lock").calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().expect("fake browser lock").calls.push(call);
    }
}

impl UiDriver for FakeBrowser {
    fn find(&self, locator: &LocatorDescriptor) -> Result<Option<ElementRef>, ReplayError> {
        let state = self.state.lock().expect("fake browser lock");
        Ok(state
            .elements
            .iter()
            .find(|(_, el)| el.alive && el.matches(locator))
            .map(|(handle, _)| handle.clone()))
    }

    fn find_within(
        &self,
        parent: &ElementRef,
        locator: &LocatorDescriptor,
    ) -> Result<Option<ElementRef>, ReplayError> {
        let state = self.state.lock().expect("fake browser lock");
        state.live(parent)?;
        Ok(state
            .elements
            .iter()
            .find(|(handle, el)| {
                el.alive && el.matches(locator) && state.is_descendant(handle, parent)
            })
            .map(|(handle, _)| handle.clone()))
    }

    fn click(&self, element: &ElementRef) -> Result<(), ReplayError> {
        self.state.lock().expect("fake browser lock").live(element)?;
        self.record(format!("click:{}", element.0));
        Ok(())
    }

    fn tag_name(&self, element: &ElementRef) -> Result<String, ReplayError> {
        let state = self.state.lock().expect("fake browser lock");
        Ok(state.live(element)?.tag.clone())
    }

    fn clear_and_type(&self, element: &ElementRef, text: &str) -> Result<(), ReplayError> {
        self.state
            .lock()
            .expect("fake browser lock")
            .live_mut(element)?
            .value = Some(text.to_string());
        self.record(format!("type:{}:{text}", element.0));
        Ok(())
    }

    fn select_option(
        &self,
        element: &ElementRef,
        by: SelectBy,
        choice: &str,
    ) -> Result<(), ReplayError> {
        let mode = match by {
            SelectBy::Value => "value",
            SelectBy::VisibleText => "text",
        };
        {
            let mut state = self.state.lock().expect("fake browser lock");
            let el = state.live_mut(element)?;
            let selected = el
                .options
                .iter()
                .find(|(value, text)| match by {
                    SelectBy::Value => value == choice,
                    SelectBy::VisibleText => text == choice,
                })
                .map(|(value, _)| value.clone())
                .ok_or_else(|| {
                    ReplayError::NoSuchElement(format!("option {mode}={choice}"))
                })?;
            el.value = Some(selected);
        }
        self.record(format!("select:{}:{mode}:{choice}", element.0));
        Ok(())
    }

    fn run_script(
        &self,
        script: PageScript,
        element: &ElementRef,
        arg: Option<&str>,
    ) -> Result<Value, ReplayError> {
        let result = {
            let mut state = self.state.lock().expect("fake browser lock");
            let el = state.live_mut(element)?;
            match script {
                PageScript::AssignValue | PageScript::AssignValueAndNotify => {
                    el.value = arg.map(str::to_string);
                    Value::Null
                }
                PageScript::NotifyChange => Value::Null,
                PageScript::RichEditorApi => {
                    if el.rich_editor {
                        el.value = arg.map(str::to_string);
                    }
                    Value::Bool(el.rich_editor)
                }
                PageScript::RichEditorTextarea => {
                    if el.nested_textarea {
                        el.value = arg.map(str::to_string);
                    }
                    Value::Bool(el.nested_textarea)
                }
            }
        };
        self.record(format!("script:{}:{}", script.name(), element.0));
        Ok(result)
    }

    fn closest(&self, element: &ElementRef, css: &str) -> Result<Option<ElementRef>, ReplayError> {
        let state = self.state.lock().expect("fake browser lock");
        state.live(element)?;
        let mut cursor = Some(element.clone());
        while let Some(current) = cursor {
            let Some(el) = state.elements.get(&current) else {
                break;
            };
            if el.alive && el.selectors.iter().any(|s| s == css) {
                return Ok(Some(current));
            }
            cursor = el.parent.clone();
        }
        Ok(None)
    }

    fn quit(&self) -> Result<(), ReplayError> {
        self.record("quit".to_string());
        if self.state.lock().expect("fake browser lock").quit_fails {
            return Err(ReplayError::Driver("quit failed".to_string()));
        }
        Ok(())
    }
}

impl TargetApp for FakeBrowser {
    fn supported_operations(&self) -> Vec<AppOperation> {
        let state = self.state.lock().expect("fake browser lock");
        AppOperation::ALL
            .iter()
            .copied()
            .filter(|op| !state.unsupported.contains(op))
            .collect()
    }

    fn invoke(&self, op: AppOperation, timeout: Option<Duration>) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check(op.as_str())?;
        let call = match timeout {
            Some(t) => format!("invoke:{}:{}s", op.as_str(), t.as_secs()),
            None => format!("invoke:{}", op.as_str()),
        };
        state.calls.push(call);
        if let Some(element) = state.activate_on_invoke.get(&op).cloned() {
            state.active = Some(element);
        }
        Ok(())
    }

    fn active_composite(&self) -> Option<ElementRef> {
        self.state.lock().expect("fake browser lock").active.clone()
    }

    fn set_active_composite(&self, element: Option<ElementRef>) {
        self.state.lock().expect("fake browser lock").active = element;
    }

    fn expand_composite(
        &self,
        query_name: Option<&str>,
        connection_name: Option<&str>,
    ) -> Result<Option<ElementRef>, ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.calls.push(format!(
            "expand:{}:{}",
            query_name.unwrap_or_default(),
            connection_name.unwrap_or_default()
        ));
        state.check("expand")?;
        let found = state
            .composites
            .iter()
            .filter(|c| query_name.is_none() || c.query_name.as_deref() == query_name)
            .filter(|c| connection_name.is_none() || c.connection_name.as_deref() == connection_name)
            .map(|c| c.element.clone())
            .find(|el| state.elements.get(el).is_some_and(|e| e.alive));
        if let Some(element) = &found {
            state.active = Some(element.clone());
        }
        Ok(found)
    }

    fn select_connection(&self, title: &str) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("select-connection")?;
        if !state.connections.contains(title) {
            return Err(ReplayError::NoSuchElement(format!("connection {title}")));
        }
        state.calls.push(format!("select-connection:{title}"));
        Ok(())
    }

    fn delete_active(&self) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("delete")?;
        let active = state.active_or_err()?;
        state.calls.push(format!("delete:{}", active.0));
        if let Some(el) = state.elements.get_mut(&active) {
            el.alive = false;
        }
        state.active = None;
        Ok(())
    }

    fn preview_active(&self, timeout: Duration) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("preview")?;
        let active = state.active_or_err()?;
        state
            .calls
            .push(format!("preview:{}:{}s", active.0, timeout.as_secs()));
        Ok(())
    }

    fn export_active(&self) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("export")?;
        let active = state.active_or_err()?;
        state.calls.push(format!("export:{}", active.0));
        Ok(())
    }

    fn set_query_text(&self, text: &str) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("set-query-text")?;
        let active = state.active_or_err()?;
        state
            .calls
            .push(format!("set-query-text:{}:{text}", active.0));
        Ok(())
    }

    fn enter_query_name(&self, name: &str) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("enter-query-name")?;
        state.calls.push(format!("enter-query-name:{name}"));
        Ok(())
    }

    fn select_export_destination(&self, visible_text: &str) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("export-destination")?;
        state
            .calls
            .push(format!("export-destination:{visible_text}"));
        Ok(())
    }

    fn prepare_home(&self) -> Result<(), ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        state.check("prepare-home")?;
        state.calls.push("prepare-home".to_string());
        Ok(())
    }

    fn busy(&self) -> Result<bool, ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        if state.busy_polls > 0 {
            state.busy_polls -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn connections_ready(&self) -> Result<bool, ReplayError> {
        let mut state = self.state.lock().expect("fake browser lock");
        if state.connections_never_ready {
            return Ok(false);
        }
        if state.pending_connection_polls > 0 {
            state.pending_connection_polls -= 1;
            return Ok(false);
        }
        Ok(true)
    }
}

/// Connector that hands out sessions over one shared `FakeBrowser`.
#[derive(Clone, Default)]
pub struct FakeConnector {
    browser: FakeBrowser,
    addresses: Arc<Mutex<Vec<String>>>,
    refuse: bool,
}

impl FakeConnector {
    pub fn new(browser: FakeBrowser) -> Self {
        Self {
            browser,
            addresses: Arc::new(Mutex::new(Vec::new())),
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn addresses(&self) -> Vec<String> {
        self.addresses.lock().expect("connector lock").clone()
    }
}

impl SessionConnector for FakeConnector {
    fn connect(&self, debugger_address: &str) -> Result<ReplaySession, ReplayError> {
        self.addresses
            .lock()
            .expect("connector lock")
            .push(debugger_address.to_string());
        if self.refuse {
            return Err(ReplayError::Driver(format!(
                "cannot reach debugger at {debugger_address}"
            )));
        }
        Ok(self.browser.session())
    }
}
