//! Tracks the active query card across steps that do not name it.

use crate::driver::{ElementRef, ReplaySession, TargetApp, UiDriver};
use crate::errors::ReplayError;
use crate::replay::locator;
use crate::replay::step::InteractionStep;
use std::sync::Arc;

pub const COMPOSITE_SELECTOR: &str = ".query-card";

pub struct ContextTracker {
    driver: Arc<dyn UiDriver>,
    app: Arc<dyn TargetApp>,
    current: Option<ElementRef>,
}

impl ContextTracker {
    pub fn new(session: &ReplaySession) -> Self {
        Self {
            driver: Arc::clone(&session.driver),
            app: Arc::clone(&session.app),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&ElementRef> {
        self.current.as_ref()
    }

    fn is_alive(&self, element: &ElementRef) -> bool {
        self.driver.tag_name(element).is_ok()
    }

    /// Resolve the card a step acts on.
    ///
    /// Tries the app's card, the remembered card, the step element's ancestor
    /// card, and finally an app-side expand by query and connection name.
    pub fn resolve(
        &mut self,
        step: &InteractionStep,
        required: bool,
    ) -> Result<Option<ElementRef>, ReplayError> {
        if let Some(card) = self.app.active_composite() {
            if self.is_alive(&card) {
                self.current = Some(card.clone());
                return Ok(Some(card));
            }
        }

        if let Some(card) = self.current.clone() {
            if self.is_alive(&card) {
                self.app.set_active_composite(Some(card.clone()));
                return Ok(Some(card));
            }
        }

        if let Some(card) = self.card_around(step) {
            self.set_active(card.clone());
            return Ok(Some(card));
        }

        let query_name = trimmed(step.query_name.as_deref());
        let connection_name = trimmed(step.connection_name.as_deref());
        if query_name.is_some() || connection_name.is_some() {
            if let Ok(Some(card)) = self.app.expand_composite(query_name, connection_name) {
                self.set_active(card.clone());
                return Ok(Some(card));
            }
        }

        if required {
            return Err(ReplayError::ContextNotFound { index: step.index });
        }
        Ok(None)
    }

    /// Best-effort: adopt the app's card, else the card around the step element.
    pub fn remember(&mut self, step: &InteractionStep) {
        self.sync_from_app();
        if self.current.as_ref().is_some_and(|card| self.is_alive(card)) {
            return;
        }
        if let Some(card) = self.card_around(step) {
            self.set_active(card);
        }
    }

    pub fn set_active(&mut self, card: ElementRef) {
        self.app.set_active_composite(Some(card.clone()));
        self.current = Some(card);
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.app.set_active_composite(None);
    }

    pub fn sync_from_app(&mut self) {
        if let Some(card) = self.app.active_composite() {
            if self.is_alive(&card) {
                self.current = Some(card);
            }
        }
    }

    fn card_around(&self, step: &InteractionStep) -> Option<ElementRef> {
        let descriptor = locator::resolve(step)?;
        let element = self.driver.find(&descriptor).ok().flatten()?;
        self.driver
            .closest(&element, COMPOSITE_SELECTOR)
            .ok()
            .flatten()
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
