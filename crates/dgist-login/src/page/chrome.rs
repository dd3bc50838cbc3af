use super::{DomEvent, ElementState, Page};
use crate::utils::js_escape;
use headless_chrome::Tab;
use std::sync::Arc;

/// [`Page`] over a Chrome tab, implemented as small injected JS snippets.
pub struct ChromePage(Arc<Tab>);

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self(tab)
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.0
    }

    pub fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.0.navigate_to(url)?;
        if let Err(e) = self.0.wait_until_navigated() {
            log::warn!("[!] Navigation wait timed out: {}, continuing...", e);
        }
        Ok(())
    }

    // ── Low-level JS evaluation helpers ──────────────────────────────────

    /// Evaluates JS and returns the boolean result.
    /// Returns `false` if the script returns null/undefined.
    fn eval_bool(&self, js: &str) -> anyhow::Result<bool> {
        Ok(self
            .0
            .evaluate(js, false)?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Evaluates JS and returns the string result, or `None` if null/undefined.
    fn eval_string(&self, js: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .0
            .evaluate(js, false)?
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    /// Evaluates JS for its side effects; propagates errors, discards the return value.
    fn eval(&self, js: &str) -> anyhow::Result<()> {
        self.0.evaluate(js, false)?;
        Ok(())
    }

    /// Runs `body` with `el` bound to the first match of `selector`, if any.
    fn with_element(&self, selector: &str, body: &str) -> anyhow::Result<()> {
        let sel = js_escape(selector);
        self.eval(&format!(
            "(function(){{ var el = document.querySelector('{sel}'); if (!el) return; {body} }})()"
        ))
    }
}

impl Page for ChromePage {
    fn url(&self) -> anyhow::Result<String> {
        Ok(self.0.get_url())
    }

    fn element_state(&self, selector: &str) -> anyhow::Result<Option<ElementState>> {
        let sel = js_escape(selector);
        let js = format!(
            r#"(function() {{
    var el = document.querySelector('{sel}');
    if (!el) return null;
    var rect = el.getBoundingClientRect();
    var style = window.getComputedStyle(el);
    return JSON.stringify({{
        width: rect.width,
        height: rect.height,
        visibility: style.visibility,
        display: style.display,
        pointerEvents: style.pointerEvents,
        disabled: !!el.disabled
    }});
}})()"#
        );
        match self.eval_string(&js)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn text(&self, selector: &str) -> anyhow::Result<Option<String>> {
        let sel = js_escape(selector);
        let text = self.eval_string(&format!(
            "(function(){{ var el = document.querySelector('{sel}'); return el ? el.textContent.trim() : null; }})()"
        ))?;
        Ok(text.filter(|t| !t.is_empty()))
    }

    fn is_checked(&self, selector: &str) -> anyhow::Result<bool> {
        let sel = js_escape(selector);
        self.eval_bool(&format!(
            "!!(document.querySelector('{sel}') && document.querySelector('{sel}').checked)"
        ))
    }

    fn set_checked(&self, selector: &str, checked: bool) -> anyhow::Result<()> {
        self.with_element(
            selector,
            &format!(
                "el.checked = {checked}; el.dispatchEvent(new Event('change', {{ bubbles: true }}));"
            ),
        )
    }

    fn set_native_value(&self, selector: &str, value: &str) -> anyhow::Result<bool> {
        let sel = js_escape(selector);
        let val = js_escape(value);
        self.eval_bool(&format!(
            r#"(function() {{
    var el = document.querySelector('{sel}');
    if (!el) return false;
    var desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
    if (!desc || typeof desc.set !== 'function') return false;
    desc.set.call(el, '{val}');
    return true;
}})()"#
        ))
    }

    fn assign_value(&self, selector: &str, value: &str) -> anyhow::Result<()> {
        let val = js_escape(value);
        self.with_element(selector, &format!("el.value = '{val}';"))
    }

    fn dispatch(&self, selector: &str, event: DomEvent) -> anyhow::Result<()> {
        self.with_element(
            selector,
            &format!(
                "el.dispatchEvent(new Event('{}', {{ bubbles: true }}));",
                event.name()
            ),
        )
    }

    fn focus(&self, selector: &str) -> anyhow::Result<()> {
        self.with_element(selector, "el.focus();")
    }

    fn scroll_into_view(&self, selector: &str) -> anyhow::Result<()> {
        self.with_element(
            selector,
            "el.scrollIntoView({ block: 'center', behavior: 'instant' });",
        )
    }

    fn click(&self, selector: &str) -> anyhow::Result<()> {
        self.with_element(selector, "el.focus(); el.click();")
    }

    fn submit_form(&self, selector: &str, fallback_form: Option<&str>) -> anyhow::Result<bool> {
        let sel = js_escape(selector);
        let fallback = fallback_form
            .map(|f| format!("document.querySelector('{}')", js_escape(f)))
            .unwrap_or_else(|| "null".to_string());
        self.eval_bool(&format!(
            r#"(function() {{
    var btn = document.querySelector('{sel}');
    var form = (btn && btn.closest('form')) || {fallback};
    if (!form) return false;
    if (typeof form.requestSubmit === 'function') {{
        if (btn && btn.form === form) {{ form.requestSubmit(btn); }} else {{ form.requestSubmit(); }}
    }} else {{
        form.submit();
    }}
    return true;
}})()"#
        ))
    }

    fn press_enter(&self, selector: &str) -> anyhow::Result<()> {
        self.with_element(
            selector,
            "['keydown', 'keypress', 'keyup'].forEach(function(type) { \
                el.dispatchEvent(new KeyboardEvent(type, { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true })); \
            });",
        )
    }

    fn mutation_count(&self) -> anyhow::Result<u64> {
        let count = self
            .0
            .evaluate(
                r#"(function() {
    if (!window.__dgist_observer) {
        window.__dgist_mutations = 0;
        window.__dgist_observer = new MutationObserver(function() { window.__dgist_mutations++; });
        window.__dgist_observer.observe(document.documentElement, {
            childList: true, subtree: true, characterData: true, attributes: true
        });
    }
    return window.__dgist_mutations;
})()"#,
                false,
            )?
            .value
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok(count)
    }
}
