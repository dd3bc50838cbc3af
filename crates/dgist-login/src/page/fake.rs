//! Scripted in-memory page for flow tests.

use super::{DomEvent, ElementState, Page};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

type Hook = Rc<dyn Fn(&FakePage)>;

#[derive(Debug, Clone)]
pub(crate) struct FakeElement {
    pub(crate) state: ElementState,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) text: Option<String>,
    pub(crate) in_form: bool,
    pub(crate) click_fails: bool,
    pub(crate) submit_fails: bool,
    pub(crate) native_setter: bool,
}

impl FakeElement {
    pub(crate) fn shown() -> Self {
        Self {
            state: ElementState::shown(100.0, 30.0),
            value: String::new(),
            checked: false,
            text: None,
            in_form: true,
            click_fails: false,
            submit_fails: false,
            native_setter: true,
        }
    }

    pub(crate) fn hidden() -> Self {
        let mut el = Self::shown();
        el.state.display = "none".into();
        el
    }
}

pub(crate) struct FakePage {
    url: RefCell<String>,
    elements: RefCell<HashMap<String, FakeElement>>,
    actions: RefCell<Vec<String>>,
    mutations: Cell<u64>,
    read_failures: Cell<u32>,
    hooks: RefCell<Vec<(String, Hook)>>,
}

impl FakePage {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: RefCell::new(url.to_string()),
            elements: RefCell::new(HashMap::new()),
            actions: RefCell::new(Vec::new()),
            mutations: Cell::new(0),
            read_failures: Cell::new(0),
            hooks: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with(self, selector: &str, element: FakeElement) -> Self {
        self.put(selector, element);
        self
    }

    pub(crate) fn put(&self, selector: &str, element: FakeElement) {
        self.elements
            .borrow_mut()
            .insert(selector.to_string(), element);
        self.mutate();
    }

    pub(crate) fn remove(&self, selector: &str) {
        self.elements.borrow_mut().remove(selector);
        self.mutate();
    }

    pub(crate) fn edit(&self, selector: &str, f: impl FnOnce(&mut FakeElement)) {
        if let Some(el) = self.elements.borrow_mut().get_mut(selector) {
            f(el);
        }
        self.mutate();
    }

    pub(crate) fn navigate(&self, url: &str) {
        *self.url.borrow_mut() = url.to_string();
        self.elements.borrow_mut().clear();
        self.mutations.set(0);
    }

    pub(crate) fn mutate(&self) {
        self.mutations.set(self.mutations.get() + 1);
    }

    /// Makes the next `n` mutation-counter reads fail the way an evaluation
    /// does while a document is being torn down.
    pub(crate) fn fail_reads(&self, n: u32) {
        self.read_failures.set(n);
    }

    pub(crate) fn value(&self, selector: &str) -> Option<String> {
        self.elements.borrow().get(selector).map(|e| e.value.clone())
    }

    pub(crate) fn checked(&self, selector: &str) -> bool {
        self.elements
            .borrow()
            .get(selector)
            .is_some_and(|e| e.checked)
    }

    pub(crate) fn actions(&self) -> Vec<String> {
        self.actions.borrow().clone()
    }

    pub(crate) fn count(&self, action: &str) -> usize {
        self.actions.borrow().iter().filter(|a| *a == action).count()
    }

    /// Runs `hook` every time `action` is recorded, e.g. to navigate on submit.
    pub(crate) fn on(&self, action: &str, hook: impl Fn(&FakePage) + 'static) {
        self.hooks
            .borrow_mut()
            .push((action.to_string(), Rc::new(hook)));
    }

    fn record(&self, action: String) {
        let hooks: Vec<Hook> = self
            .hooks
            .borrow()
            .iter()
            .filter(|(a, _)| *a == action)
            .map(|(_, h)| Rc::clone(h))
            .collect();
        self.actions.borrow_mut().push(action);
        for hook in hooks {
            hook(self);
        }
    }
}

impl Page for FakePage {
    fn url(&self) -> anyhow::Result<String> {
        Ok(self.url.borrow().clone())
    }

    fn element_state(&self, selector: &str) -> anyhow::Result<Option<ElementState>> {
        Ok(self.elements.borrow().get(selector).map(|e| e.state.clone()))
    }

    fn text(&self, selector: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .elements
            .borrow()
            .get(selector)
            .and_then(|e| e.text.clone()))
    }

    fn is_checked(&self, selector: &str) -> anyhow::Result<bool> {
        Ok(self.checked(selector))
    }

    fn set_checked(&self, selector: &str, checked: bool) -> anyhow::Result<()> {
        if let Some(el) = self.elements.borrow_mut().get_mut(selector) {
            el.checked = checked;
        }
        self.record(format!("check {selector}"));
        Ok(())
    }

    fn set_native_value(&self, selector: &str, value: &str) -> anyhow::Result<bool> {
        let applied = match self.elements.borrow_mut().get_mut(selector) {
            Some(el) if el.native_setter => {
                el.value = value.to_string();
                true
            }
            _ => false,
        };
        if applied {
            self.record(format!("native {selector}={value}"));
        }
        Ok(applied)
    }

    fn assign_value(&self, selector: &str, value: &str) -> anyhow::Result<()> {
        if let Some(el) = self.elements.borrow_mut().get_mut(selector) {
            el.value = value.to_string();
        }
        self.record(format!("assign {selector}={value}"));
        Ok(())
    }

    fn dispatch(&self, selector: &str, event: DomEvent) -> anyhow::Result<()> {
        self.record(format!("{} {selector}", event.name()));
        Ok(())
    }

    fn focus(&self, selector: &str) -> anyhow::Result<()> {
        self.record(format!("focus {selector}"));
        Ok(())
    }

    fn scroll_into_view(&self, _selector: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn click(&self, selector: &str) -> anyhow::Result<()> {
        let (fails, exists) = match self.elements.borrow().get(selector) {
            Some(el) => (el.click_fails, true),
            None => (false, false),
        };
        if fails {
            anyhow::bail!("click on {selector} threw");
        }
        if exists {
            if let Some(el) = self.elements.borrow_mut().get_mut(selector) {
                el.checked = !el.checked;
            }
        }
        self.record(format!("click {selector}"));
        Ok(())
    }

    fn submit_form(&self, selector: &str, fallback_form: Option<&str>) -> anyhow::Result<bool> {
        let elements = self.elements.borrow();
        let in_form = elements.get(selector).is_some_and(|e| e.in_form)
            || fallback_form.is_some_and(|f| elements.contains_key(f));
        if !in_form {
            return Ok(false);
        }
        if elements.get(selector).is_some_and(|e| e.submit_fails) {
            anyhow::bail!("requestSubmit threw");
        }
        drop(elements);
        self.record(format!("submit {selector}"));
        Ok(true)
    }

    fn press_enter(&self, selector: &str) -> anyhow::Result<()> {
        if !self.elements.borrow().contains_key(selector) {
            anyhow::bail!("Cannot read properties of null (reading 'dispatchEvent')");
        }
        self.record(format!("enter {selector}"));
        Ok(())
    }

    fn mutation_count(&self) -> anyhow::Result<u64> {
        let failures = self.read_failures.get();
        if failures > 0 {
            self.read_failures.set(failures - 1);
            anyhow::bail!("Execution context was destroyed.");
        }
        Ok(self.mutations.get())
    }
}
