use crate::error::FlowError;
use crate::page::{DomEvent, Page};

/// A failed DOM call is retried on the next wake-up like a network hiccup.
fn page_error(err: anyhow::Error) -> FlowError {
    FlowError::transient(format!("page script failed: {}", err))
}

/// How a form ended up being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMethod {
    ButtonClick,
    FormSubmit,
    EnterKey,
}

/// DOM mutation primitives shared by the login and two-factor flows.
pub struct FormDriver<'a> {
    page: &'a dyn Page,
}

impl<'a> FormDriver<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    /// True iff the element exists, has a rendered size, is not hidden and is
    /// not disabled. Lookup failures count as "not interactable".
    pub fn is_interactable(&self, selector: &str) -> bool {
        match self.page.element_state(selector) {
            Ok(Some(state)) => state.is_interactable(),
            Ok(None) => false,
            Err(e) => {
                log::debug!("[!] Could not inspect {}: {}", selector, e);
                false
            }
        }
    }

    /// Sets the value through the native setter (falling back to plain
    /// assignment) and fires `input` and `change`.
    pub fn set_value_and_notify(&self, selector: &str, value: &str) -> Result<(), FlowError> {
        if !self.page.exists(selector).map_err(page_error)? {
            return Err(FlowError::ElementNotFound {
                selector: selector.to_string(),
            });
        }

        self.page.focus(selector).ok();

        match self.page.set_native_value(selector, value) {
            Ok(true) => {}
            Ok(false) => self.page.assign_value(selector, value).map_err(page_error)?,
            Err(e) => {
                log::debug!("[!] Native value setter failed on {}: {}", selector, e);
                self.page.assign_value(selector, value).map_err(page_error)?;
            }
        }

        self.page.dispatch(selector, DomEvent::Input).map_err(page_error)?;
        self.page.dispatch(selector, DomEvent::Change).map_err(page_error)?;
        Ok(())
    }

    /// Makes sure a checkbox ends up checked, clicking it first so page
    /// handlers run and forcing the property if the click throws.
    pub fn ensure_checked(&self, selector: &str) -> Result<(), FlowError> {
        if self.page.is_checked(selector).map_err(page_error)? {
            return Ok(());
        }
        if let Err(e) = self.page.click(selector) {
            log::debug!("[!] Click on {} failed ({}), setting it directly", selector, e);
            self.page.set_checked(selector, true).map_err(page_error)?;
        }
        Ok(())
    }

    /// Submits via, in order: a click on `button` if interactable, the
    /// enclosing (or `fallback_form`) form, or an Enter key on `last_field`.
    /// Each fallback runs only if the previous method was unavailable or threw.
    pub fn submit(
        &self,
        button: &str,
        fallback_form: Option<&str>,
        last_field: Option<&str>,
    ) -> Result<SubmitMethod, FlowError> {
        self.page.scroll_into_view(button).ok();

        if self.is_interactable(button) {
            match self.page.click(button) {
                Ok(()) => return Ok(SubmitMethod::ButtonClick),
                Err(e) => log::warn!("[!] Submit button click failed: {}", e),
            }
        } else {
            log::info!("[*] Submit button not clickable; attempting form submit");
        }

        match self.page.submit_form(button, fallback_form) {
            Ok(true) => return Ok(SubmitMethod::FormSubmit),
            Ok(false) => log::debug!("[!] No form found around {}", button),
            Err(e) => log::warn!("[!] Form submit failed, trying Enter key: {}", e),
        }

        match last_field {
            Some(field) => {
                self.page.press_enter(field).map_err(page_error)?;
                Ok(SubmitMethod::EnterKey)
            }
            None => Err(FlowError::ElementNotFound {
                selector: button.to_string(),
            }),
        }
    }
}
