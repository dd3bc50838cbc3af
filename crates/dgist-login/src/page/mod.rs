//! Document-model capabilities the flows need from a loaded portal page.

pub mod chrome;
pub mod observer;

#[cfg(test)]
pub(crate) mod fake;

use serde::Deserialize;

pub use chrome::ChromePage;
pub use observer::{PageEvent, PageObserver};

/// Rendered state of an element, as far as clickability is concerned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    pub width: f64,
    pub height: f64,
    pub visibility: String,
    pub display: String,
    pub pointer_events: String,
    pub disabled: bool,
}

impl ElementState {
    /// A visible, enabled element with the given size.
    pub fn shown(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            visibility: "visible".to_string(),
            display: "block".to_string(),
            pointer_events: "auto".to_string(),
            disabled: false,
        }
    }

    /// True when a click on the element would have an effect.
    pub fn is_interactable(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.visibility != "hidden"
            && self.display != "none"
            && self.pointer_events != "none"
            && !self.disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
}

impl DomEvent {
    pub fn name(self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
        }
    }
}

/// Element lookups and mutations by CSS selector.
///
/// Operations on a missing element are no-ops unless stated otherwise.
pub trait Page {
    fn url(&self) -> anyhow::Result<String>;

    /// `None` when no element matches.
    fn element_state(&self, selector: &str) -> anyhow::Result<Option<ElementState>>;

    fn exists(&self, selector: &str) -> anyhow::Result<bool> {
        Ok(self.element_state(selector)?.is_some())
    }

    /// Trimmed text content, `None` when absent or blank.
    fn text(&self, selector: &str) -> anyhow::Result<Option<String>>;

    fn is_checked(&self, selector: &str) -> anyhow::Result<bool>;
    fn set_checked(&self, selector: &str, checked: bool) -> anyhow::Result<()>;

    /// Assigns through the prototype's `value` setter so frameworks that shadow
    /// the instance property still see the change. Returns `false` when the
    /// prototype exposes no setter.
    fn set_native_value(&self, selector: &str, value: &str) -> anyhow::Result<bool>;

    /// Plain `el.value = value`.
    fn assign_value(&self, selector: &str, value: &str) -> anyhow::Result<()>;

    /// Dispatches a bubbling event of the given kind.
    fn dispatch(&self, selector: &str, event: DomEvent) -> anyhow::Result<()>;

    fn focus(&self, selector: &str) -> anyhow::Result<()>;
    fn scroll_into_view(&self, selector: &str) -> anyhow::Result<()>;
    fn click(&self, selector: &str) -> anyhow::Result<()>;

    /// Submits the form enclosing `selector` (or `fallback_form`), preferring
    /// `requestSubmit` so validation handlers run. Returns `false` when no form
    /// was found.
    fn submit_form(&self, selector: &str, fallback_form: Option<&str>) -> anyhow::Result<bool>;

    /// Simulates an Enter keypress on the element.
    fn press_enter(&self, selector: &str) -> anyhow::Result<()>;

    /// Monotonic count of DOM mutations since the document loaded.
    fn mutation_count(&self) -> anyhow::Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_disabled_or_zero_sized_elements_are_not_interactable() {
        assert!(ElementState::shown(80.0, 30.0).is_interactable());
        assert!(!ElementState::shown(0.0, 30.0).is_interactable());

        let mut state = ElementState::shown(80.0, 30.0);
        state.visibility = "hidden".into();
        assert!(!state.is_interactable());

        let mut state = ElementState::shown(80.0, 30.0);
        state.display = "none".into();
        assert!(!state.is_interactable());

        let mut state = ElementState::shown(80.0, 30.0);
        state.pointer_events = "none".into();
        assert!(!state.is_interactable());

        let mut state = ElementState::shown(80.0, 30.0);
        state.disabled = true;
        assert!(!state.is_interactable());
    }

    #[test]
    fn parses_state_json_from_the_page() {
        let state: ElementState = serde_json::from_str(
            r#"{"width":120.5,"height":40,"visibility":"visible","display":"inline-block","pointerEvents":"auto","disabled":false}"#,
        )
        .unwrap();
        assert!(state.is_interactable());
    }
}
