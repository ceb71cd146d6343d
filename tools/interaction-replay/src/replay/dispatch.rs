//! Turns one step into concrete driver and application calls.

use crate::driver::{
    AppOperation, ElementRef, PageScript, PostWait, ReplaySession, SelectBy, TargetApp, UiDriver,
    WaitKind,
};
use crate::errors::ReplayError;
use crate::replay::context::ContextTracker;
use crate::replay::locator::{self, LocatorDescriptor};
use crate::replay::recognizers::{
    self, ClickIntent, CODE_EDITOR_CHILD_IDS,
};
use crate::replay::routes::{RouteAction, RouteMatch, RouteTable, StepAction};
use crate::replay::step::InteractionStep;
use crate::runtime::Clock;
use crate::types::{ReplayProfile, ReplayTimeouts};
use crate::wait::poll_until;
use std::sync::Arc;
use std::time::Duration;

const EXPORT_DESTINATION_TEST_ID: &str = "sql-manager-export-destination";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    Routed { route: String },
    Skipped { reason: String },
}

type Handler = fn(&mut Dispatcher, &InteractionStep) -> Result<StepOutcome, ReplayError>;

pub struct Dispatcher {
    driver: Arc<dyn UiDriver>,
    app: Arc<dyn TargetApp>,
    clock: Arc<dyn Clock>,
    context: ContextTracker,
    routes: RouteTable,
    profile: ReplayProfile,
    timeouts: ReplayTimeouts,
}

impl Dispatcher {
    pub fn new(
        session: &ReplaySession,
        clock: Arc<dyn Clock>,
        profile: ReplayProfile,
        timeouts: ReplayTimeouts,
    ) -> Self {
        let supported = session.app.supported_operations();
        Self {
            driver: Arc::clone(&session.driver),
            app: Arc::clone(&session.app),
            clock,
            context: ContextTracker::new(session),
            routes: RouteTable::for_profile(profile, &timeouts, &supported),
            profile,
            timeouts,
        }
    }

    pub fn profile(&self) -> ReplayProfile {
        self.profile
    }

    pub fn context(&self) -> &ContextTracker {
        &self.context
    }

    pub fn app(&self) -> &Arc<dyn TargetApp> {
        &self.app
    }

    pub fn driver(&self) -> &Arc<dyn UiDriver> {
        &self.driver
    }

    pub fn dispatch(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        match self.profile {
            ReplayProfile::Full => match handler_for(step.action_key()) {
                Some(handler) => handler(self, step),
                None => self.unmapped(step),
            },
            ReplayProfile::Simple => self.dispatch_simple(step),
        }
    }

    fn dispatch_simple(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        if let Some(matched) = self.route(step) {
            return self.run_route(matched, step);
        }
        if step.event == "click" {
            self.generic_click(step)?;
            return Ok(StepOutcome::Executed);
        }
        Ok(StepOutcome::Skipped {
            reason: format!("no route for {}/{}", step.event, step.action),
        })
    }

    fn route(&self, step: &InteractionStep) -> Option<RouteMatch> {
        self.routes.resolve(step.test_id.as_deref()?)
    }

    fn run_route(
        &mut self,
        matched: RouteMatch,
        step: &InteractionStep,
    ) -> Result<StepOutcome, ReplayError> {
        match matched.action {
            RouteAction::Invoke(op, timeout) => {
                self.app.invoke(op, timeout)?;
                self.after_operation(op)?;
            }
            RouteAction::Step(action) => self.run_step_action(action, step)?,
        }
        Ok(StepOutcome::Routed {
            route: matched.route,
        })
    }

    fn run_step_action(
        &mut self,
        action: StepAction,
        step: &InteractionStep,
    ) -> Result<(), ReplayError> {
        match action {
            StepAction::EnterQueryName => {
                if let Some(name) = trimmed(step.value.as_deref()) {
                    self.app.enter_query_name(name)?;
                }
            }
            StepAction::SelectExportDestination => {
                if let Some(text) = text_or_value(step) {
                    self.app.select_export_destination(text)?;
                }
            }
            StepAction::ActivateConnection => match trimmed(step.connection_name.as_deref()) {
                Some(name) => self.app.select_connection(name)?,
                None => self.generic_click(step)?,
            },
            StepAction::PreviewActive => self.preview_active()?,
            StepAction::ExportActive => self.app.export_active()?,
            StepAction::DeleteActive => {
                self.app.delete_active()?;
                self.context.clear();
            }
            StepAction::SetQueryText => {
                let value = step.value.as_deref().ok_or_else(|| {
                    ReplayError::Script(format!(
                        "rich-editor change has no value at step {}",
                        step.index
                    ))
                })?;
                self.app.set_query_text(value)?;
            }
            StepAction::SelectExportOption => match text_or_value(step) {
                Some(text) => self.app.select_export_destination(text)?,
                None => self.generic_click(step)?,
            },
        }
        Ok(())
    }

    fn after_operation(&mut self, op: AppOperation) -> Result<(), ReplayError> {
        match op.post_wait() {
            Some(PostWait::ConnectionsReady(kind)) => self.wait_connections_ready(kind),
            Some(PostWait::Idle(kind)) => self.wait_idle(kind, self.timeouts.export),
            None => Ok(()),
        }
    }

    fn wait_connections_ready(&self, kind: WaitKind) -> Result<(), ReplayError> {
        let app = Arc::clone(&self.app);
        poll_until(
            self.clock.as_ref(),
            self.timeouts.connections,
            self.timeouts.poll_interval,
            kind,
            "connections ready",
            || Ok(app.connections_ready()?.then_some(())),
        )?;
        Ok(())
    }

    fn wait_idle(&self, kind: WaitKind, timeout: Duration) -> Result<(), ReplayError> {
        let app = Arc::clone(&self.app);
        poll_until(
            self.clock.as_ref(),
            timeout,
            self.timeouts.poll_interval,
            kind,
            "busy overlay cleared",
            || Ok((!app.busy()?).then_some(())),
        )?;
        Ok(())
    }

    fn preview_active(&self) -> Result<(), ReplayError> {
        self.app.preview_active(self.timeouts.preview)?;
        self.wait_idle(WaitKind::Advisory, self.timeouts.preview)
    }

    fn click_activate(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        if let Some(matched) = self.route(step) {
            let outcome = self.run_route(matched, step)?;
            self.context.sync_from_app();
            return Ok(outcome);
        }

        match recognizers::classify_click(step) {
            Some(ClickIntent::ConnectionItem) => {
                self.activate_connection(step)?;
                return Ok(StepOutcome::Executed);
            }
            Some(ClickIntent::DeleteButton) => return self.click_delete(step),
            Some(ClickIntent::ExportOption) => {
                self.activate_export_option(step)?;
                return Ok(StepOutcome::Executed);
            }
            Some(ClickIntent::CodeEditor) => {
                if self.activate_code_editor(step)? {
                    return Ok(StepOutcome::Executed);
                }
            }
            None => {}
        }

        self.generic_click(step)?;
        self.context.remember(step);
        Ok(StepOutcome::Executed)
    }

    fn click_preview(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        self.context.resolve(step, true)?;
        self.preview_active()?;
        Ok(StepOutcome::Executed)
    }

    fn click_export(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        self.context.resolve(step, true)?;
        self.app.export_active()?;
        Ok(StepOutcome::Executed)
    }

    fn click_delete(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        self.context.resolve(step, true)?;
        self.app.delete_active()?;
        self.context.clear();
        Ok(StepOutcome::Executed)
    }

    fn set_value(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        if recognizers::is_query_name_input(step) {
            self.app
                .enter_query_name(step.value.as_deref().unwrap_or_default())?;
        } else if recognizers::is_export_destination_select(step) {
            self.set_export_destination(step)?;
        } else {
            self.generic_value_set(step)?;
        }
        Ok(StepOutcome::Executed)
    }

    fn set_rich_editor_value(
        &mut self,
        step: &InteractionStep,
    ) -> Result<StepOutcome, ReplayError> {
        if self.context.resolve(step, false)?.is_some() {
            self.app
                .set_query_text(step.value.as_deref().unwrap_or_default())?;
        } else {
            self.inject_rich_editor_value(step)?;
        }
        Ok(StepOutcome::Executed)
    }

    fn unmapped(&mut self, step: &InteractionStep) -> Result<StepOutcome, ReplayError> {
        if step.is_keyboard_event() {
            return Ok(StepOutcome::Skipped {
                reason: "keyboard event".to_string(),
            });
        }
        match step.event.as_str() {
            "click" => {
                self.generic_click(step)?;
                self.context.remember(step);
            }
            "input" | "change" if step.value.is_some() => self.generic_value_set(step)?,
            "codemirror-change" if step.value.is_some() => self.inject_rich_editor_value(step)?,
            _ => {
                return Err(ReplayError::NoHandler {
                    index: step.index,
                    event: step.event.clone(),
                    action: step.action.clone(),
                })
            }
        }
        Ok(StepOutcome::Executed)
    }

    fn activate_connection(&mut self, step: &InteractionStep) -> Result<(), ReplayError> {
        let name = match trimmed(step.connection_name.as_deref()) {
            Some(name) => name.to_string(),
            None => recognizers::clean_connection_title(step.text.as_deref()),
        };
        if name.is_empty() {
            return self.generic_click(step);
        }
        self.app.select_connection(&name)
    }

    fn activate_export_option(&mut self, step: &InteractionStep) -> Result<(), ReplayError> {
        match recognizers::infer_destination_label(step) {
            Some(label) => self.app.select_export_destination(&label),
            None => self.generic_click(step),
        }
    }

    /// Click the editor inside the active card. `false` when there is none.
    fn activate_code_editor(&mut self, step: &InteractionStep) -> Result<bool, ReplayError> {
        let Some(card) = self.context.resolve(step, false)? else {
            return Ok(false);
        };
        let editor = CODE_EDITOR_CHILD_IDS.iter().find_map(|id| {
            self.driver
                .find_within(&card, &LocatorDescriptor::test_id(id))
                .ok()
                .flatten()
        });
        let Some(editor) = editor else {
            return Ok(false);
        };
        self.driver.click(&editor)?;
        self.context.set_active(card);
        Ok(true)
    }

    fn locator(&self, step: &InteractionStep) -> Option<LocatorDescriptor> {
        locator::resolve_with(step, self.profile == ReplayProfile::Full)
    }

    fn find_element(&self, step: &InteractionStep) -> Result<Option<ElementRef>, ReplayError> {
        match self.locator(step) {
            Some(descriptor) => self.driver.find(&descriptor),
            None => Ok(None),
        }
    }

    fn generic_click(&self, step: &InteractionStep) -> Result<(), ReplayError> {
        let descriptor = self.locator(step).ok_or_else(|| {
            ReplayError::NoSuchElement(format!("cannot build click locator for step {}", step.index))
        })?;
        let driver = Arc::clone(&self.driver);
        let element = poll_until(
            self.clock.as_ref(),
            self.timeouts.locate,
            self.timeouts.poll_interval,
            WaitKind::Required,
            &format!("locate {descriptor}"),
            || driver.find(&descriptor),
        )
        .map_err(|err| match err {
            ReplayError::Timeout(_) => ReplayError::NoSuchElement(descriptor.to_string()),
            other => other,
        })?
        .ok_or_else(|| ReplayError::NoSuchElement(descriptor.to_string()))?;
        self.driver.click(&element)
    }

    fn generic_value_set(&self, step: &InteractionStep) -> Result<(), ReplayError> {
        let element = self.find_element(step)?.ok_or_else(|| {
            ReplayError::NoSuchElement(format!("cannot locate input element for step {}", step.index))
        })?;
        let value = step.value.as_deref().unwrap_or_default();
        let tag = self.driver.tag_name(&element)?.to_lowercase();
        match tag.as_str() {
            "input" | "textarea" => self.driver.clear_and_type(&element, value),
            "select" => self.set_select_value(&element, value),
            _ => self
                .driver
                .run_script(PageScript::AssignValueAndNotify, &element, Some(value))
                .map(|_| ()),
        }
    }

    /// By value, then by visible text, then forced; a change event always follows.
    fn set_select_value(&self, element: &ElementRef, value: &str) -> Result<(), ReplayError> {
        if self
            .driver
            .select_option(element, SelectBy::Value, value)
            .is_err()
            && self
                .driver
                .select_option(element, SelectBy::VisibleText, value)
                .is_err()
        {
            self.driver
                .run_script(PageScript::AssignValue, element, Some(value))?;
        }
        self.driver
            .run_script(PageScript::NotifyChange, element, None)?;
        Ok(())
    }

    fn set_export_destination(&self, step: &InteractionStep) -> Result<(), ReplayError> {
        let value = match trimmed(step.value.as_deref()) {
            Some(value) => value.to_string(),
            None => match recognizers::infer_destination_value(step.text.as_deref()) {
                Some(destination) => destination.value().to_string(),
                None => return self.generic_value_set(step),
            },
        };
        let element = match self.find_element(step)? {
            Some(element) => element,
            None => self
                .driver
                .find(&LocatorDescriptor::test_id(EXPORT_DESTINATION_TEST_ID))?
                .ok_or_else(|| {
                    ReplayError::NoSuchElement("export destination select not found".to_string())
                })?,
        };
        self.set_select_value(&element, &value)
    }

    fn inject_rich_editor_value(&self, step: &InteractionStep) -> Result<(), ReplayError> {
        let element = self.find_element(step)?.ok_or_else(|| {
            ReplayError::NoSuchElement(format!("cannot locate rich editor for step {}", step.index))
        })?;
        let value = step.value.as_deref().unwrap_or_default();
        for script in [PageScript::RichEditorApi, PageScript::RichEditorTextarea] {
            let applied = self.driver.run_script(script, &element, Some(value))?;
            if applied.as_bool() == Some(true) {
                return Ok(());
            }
        }
        Err(ReplayError::Script(format!(
            "cannot apply rich-editor value at step {}",
            step.index
        )))
    }
}

fn handler_for(key: (&str, &str)) -> Option<Handler> {
    let handler: Handler = match key {
        ("click", "activate") => Dispatcher::click_activate,
        ("click", "preview") => Dispatcher::click_preview,
        ("click", "export") => Dispatcher::click_export,
        ("click", "delete") => Dispatcher::click_delete,
        ("input", "set-value") | ("change", "set-value") => Dispatcher::set_value,
        ("codemirror-change", "set-value") => Dispatcher::set_rich_editor_value,
        _ => return None,
    };
    Some(handler)
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn text_or_value(step: &InteractionStep) -> Option<&str> {
    trimmed(step.text.as_deref()).or_else(|| trimmed(step.value.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::{Dispatcher, StepOutcome};
    use crate::driver::fake::{FakeBrowser, FakeElement};
    use crate::driver::AppOperation;
    use crate::errors::ReplayError;
    use crate::replay::step::InteractionStep;
    use crate::runtime::FakeClock;
    use crate::types::{ReplayProfile, ReplayTimeouts};
    use serde_json::json;
    use std::sync::Arc;

    fn step(raw: serde_json::Value) -> InteractionStep {
        InteractionStep::parse(&raw, 1, 1).expect("step")
    }

    fn dispatcher(browser: &FakeBrowser, profile: ReplayProfile) -> Dispatcher {
        Dispatcher::new(
            &browser.session(),
            Arc::new(FakeClock::default()),
            profile,
            ReplayTimeouts::default(),
        )
    }

    #[test]
    fn exact_route_invokes_operation_without_touching_the_driver() {
        let browser = FakeBrowser::new();
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        let outcome = d
            .dispatch(&step(json!({"event": "click", "action": "activate", "testId": "main-sql-mode"})))
            .expect("dispatch");
        assert_eq!(
            outcome,
            StepOutcome::Routed {
                route: "main-sql-mode".to_string()
            }
        );
        assert_eq!(browser.calls(), vec!["invoke:sql-mode".to_string()]);
    }

    #[test]
    fn route_then_sync_adopts_the_card_the_app_opened() {
        let browser = FakeBrowser::new();
        let card = browser.add_element(FakeElement::composite());
        browser.activate_on_invoke(AppOperation::AddQueryConfirm, &card);
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({
            "event": "click", "action": "activate", "testId": "sql-manager-add-query-confirm"
        })))
        .expect("dispatch");
        assert_eq!(d.context().current(), Some(&card));
    }

    #[test]
    fn connection_item_uses_cleaned_text_when_name_is_missing() {
        let browser = FakeBrowser::new();
        browser.add_connection("Prod");
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({
            "event": "click", "action": "activate", "testId": "cm-tree-connection-7", "text": "▶ Prod"
        })))
        .expect("dispatch");
        assert_eq!(browser.calls(), vec!["select-connection:Prod".to_string()]);
    }

    #[test]
    fn export_option_without_label_falls_back_to_generic_click() {
        let browser = FakeBrowser::new();
        let option = browser.add_element(
            FakeElement::new("li").test_id("custom-select-item-sql_manager_export_destination-x"),
        );
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({
            "event": "click", "action": "activate",
            "testId": "custom-select-item-sql_manager_export_destination-x"
        })))
        .expect("dispatch");
        assert_eq!(browser.calls(), vec![format!("click:{}", option.0)]);
    }

    #[test]
    fn code_editor_without_card_falls_through_to_generic_click() {
        let browser = FakeBrowser::new();
        let editor = browser.add_element(FakeElement::new("div").test_id("sql-codemirror-2"));
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({"event": "click", "action": "activate", "testId": "sql-codemirror-2"})))
            .expect("dispatch");
        assert_eq!(browser.calls(), vec![format!("click:{}", editor.0)]);
    }

    #[test]
    fn code_editor_inside_active_card_is_clicked_directly() {
        let browser = FakeBrowser::new();
        let card = browser.add_element(FakeElement::composite());
        let editor =
            browser.add_element(FakeElement::new("div").test_id("sql-codemirror").inside(&card));
        browser.set_active(Some(card.clone()));
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({"event": "click", "action": "activate", "testId": "sql-codemirror-9"})))
            .expect("dispatch");
        assert_eq!(browser.calls(), vec![format!("click:{}", editor.0)]);
        assert_eq!(d.context().current(), Some(&card));
    }

    #[test]
    fn generic_click_times_out_as_no_such_element() {
        let browser = FakeBrowser::new();
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        let err = d
            .dispatch(&step(json!({"event": "click", "action": "activate", "testId": "missing"})))
            .expect_err("missing");
        assert!(matches!(err, ReplayError::NoSuchElement(ref m) if m.contains("missing")));
    }

    #[test]
    fn select_falls_back_from_value_to_text_then_notifies() {
        let browser = FakeBrowser::new();
        let select = browser.add_element(
            FakeElement::new("select")
                .dom_id("region")
                .option("eu", "Europe"),
        );
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({"event": "change", "action": "set-value", "id": "region", "value": "Europe"})))
            .expect("dispatch");
        assert_eq!(browser.value_of(&select).as_deref(), Some("eu"));
        assert_eq!(
            browser.calls(),
            vec![
                format!("select:{}:text:Europe", select.0),
                format!("script:notify-change:{}", select.0),
            ]
        );
    }

    #[test]
    fn select_without_matching_option_is_forced() {
        let browser = FakeBrowser::new();
        let select = browser.add_element(FakeElement::new("select").dom_id("region"));
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({"event": "input", "action": "set-value", "id": "region", "value": "xx"})))
            .expect("dispatch");
        assert_eq!(browser.value_of(&select).as_deref(), Some("xx"));
        assert_eq!(
            browser.calls(),
            vec![
                format!("script:assign-value:{}", select.0),
                format!("script:notify-change:{}", select.0),
            ]
        );
    }

    #[test]
    fn export_destination_select_uses_inferred_value_and_fallback_element() {
        let browser = FakeBrowser::new();
        let select = browser.add_element(
            FakeElement::new("select")
                .test_id("sql-manager-export-destination")
                .option("file", "В новый файл")
                .option("document", "В текущий документ"),
        );
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({
            "event": "change", "action": "set-value",
            "id": "export-destination-select", "text": "В текущий документ"
        })))
        .expect("dispatch");
        assert_eq!(browser.value_of(&select).as_deref(), Some("document"));
    }

    #[test]
    fn rich_editor_injection_tries_api_then_textarea() {
        let browser = FakeBrowser::new();
        let host = browser.add_element(FakeElement::new("div").dom_id("ed").nested_textarea());
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({"event": "codemirror-change", "action": "set-value", "id": "ed", "value": "select 1"})))
            .expect("dispatch");
        assert_eq!(browser.value_of(&host).as_deref(), Some("select 1"));

        let bare = browser.add_element(FakeElement::new("div").dom_id("bare"));
        let err = d
            .dispatch(&step(json!({"event": "codemirror-change", "action": "set-value", "id": "bare", "value": "x"})))
            .expect_err("no editor");
        assert!(matches!(err, ReplayError::Script(_)));
        assert_eq!(browser.value_of(&bare), None);
    }

    #[test]
    fn rich_editor_with_native_api_is_set_in_one_script() {
        let browser = FakeBrowser::new();
        let editor = browser.add_element(FakeElement::new("div").dom_id("ed").rich_editor());
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({"event": "codemirror-change", "action": "set-value", "id": "ed", "value": "select 1"})))
            .expect("dispatch");
        assert_eq!(browser.value_of(&editor).as_deref(), Some("select 1"));
        assert_eq!(
            browser.calls(),
            vec![format!("script:rich-editor-api:{}", editor.0)]
        );
    }

    #[test]
    fn rich_editor_inside_active_card_goes_through_the_app() {
        let browser = FakeBrowser::new();
        let card = browser.add_element(FakeElement::composite());
        browser.set_active(Some(card.clone()));
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        let outcome = d
            .dispatch(&step(json!({"event": "codemirror-change", "action": "set-value", "value": "select 1"})))
            .expect("dispatch");
        assert_eq!(outcome, StepOutcome::Executed);
        assert_eq!(
            browser.calls(),
            vec![format!("set-query-text:{}:select 1", card.0)]
        );
    }

    #[test]
    fn query_name_input_is_entered_through_the_app() {
        let browser = FakeBrowser::new();
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        let outcome = d
            .dispatch(&step(json!({
                "event": "input", "action": "set-value",
                "testId": "sql-manager-add-query-name", "value": "Q1"
            })))
            .expect("dispatch");
        assert_eq!(outcome, StepOutcome::Executed);
        assert_eq!(browser.calls(), vec!["enter-query-name:Q1".to_string()]);
    }

    #[test]
    fn unmapped_keyboard_events_are_skipped_and_unknown_events_fail() {
        let browser = FakeBrowser::new();
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        let outcome = d
            .dispatch(&step(json!({"event": "keydown", "action": "press", "key": "Enter"})))
            .expect("skip");
        assert!(matches!(outcome, StepOutcome::Skipped { .. }));

        let err = d
            .dispatch(&step(json!({"event": "scroll", "action": "wheel"})))
            .expect_err("no handler");
        assert!(matches!(err, ReplayError::NoHandler { ref event, .. } if event == "scroll"));
    }

    #[test]
    fn opening_sql_manager_requires_connections_to_settle() {
        let browser = FakeBrowser::new();
        browser.connections_never_ready();
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        let err = d
            .dispatch(&step(json!({
                "event": "click", "action": "activate", "testId": "sql-home-open-sql-manager"
            })))
            .expect_err("timeout");
        assert!(matches!(err, ReplayError::Timeout(_)));
    }

    #[test]
    fn export_confirm_waits_for_idle_only_advisorily() {
        let browser = FakeBrowser::new();
        browser.busy_for(u32::MAX);
        let mut d = dispatcher(&browser, ReplayProfile::Full);
        d.dispatch(&step(json!({
            "event": "click", "action": "activate", "testId": "sql-manager-export-confirm"
        })))
        .expect("advisory");
        assert_eq!(browser.calls(), vec!["invoke:export-confirm:60s".to_string()]);
    }

    #[test]
    fn simple_profile_skips_unrouted_non_clicks_and_ignores_dom_ids() {
        let browser = FakeBrowser::new();
        browser.add_element(FakeElement::new("button").dom_id("only-dom"));
        let mut d = dispatcher(&browser, ReplayProfile::Simple);
        let outcome = d
            .dispatch(&step(json!({"event": "input", "action": "set-value", "testId": "whatever", "value": "x"})))
            .expect("skip");
        assert!(matches!(outcome, StepOutcome::Skipped { .. }));

        let err = d
            .dispatch(&step(json!({"event": "click", "action": "activate", "id": "only-dom"})))
            .expect_err("no locator");
        assert!(matches!(err, ReplayError::NoSuchElement(_)));
    }

    #[test]
    fn simple_profile_editor_route_requires_a_value() {
        let browser = FakeBrowser::new();
        let mut d = dispatcher(&browser, ReplayProfile::Simple);
        let err = d
            .dispatch(&step(json!({"event": "codemirror-change", "action": "set-value", "testId": "sql-manager-query-editor-1"})))
            .expect_err("no value");
        assert!(matches!(err, ReplayError::Script(_)));
    }
}
