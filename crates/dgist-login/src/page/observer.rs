use super::Page;

/// Something changed on the page that may warrant re-running classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A new document (address) was loaded.
    Loaded(String),
    /// The current document's DOM changed.
    Mutated,
}

/// Turns address and DOM-mutation counter changes into [`PageEvent`]s.
#[derive(Debug, Default)]
pub struct PageObserver {
    last_url: Option<String>,
    last_mutations: u64,
}

impl PageObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the current address so the next poll reports a fresh load.
    pub fn reset(&mut self) {
        self.last_url = None;
        self.last_mutations = 0;
    }

    pub fn poll(&mut self, page: &dyn Page) -> anyhow::Result<Option<PageEvent>> {
        let url = page.url()?;
        let mutations = page.mutation_count()?;

        if self.last_url.as_deref() != Some(url.as_str()) {
            self.last_url = Some(url.clone());
            self.last_mutations = mutations;
            return Ok(Some(PageEvent::Loaded(url)));
        }

        // A counter that went backwards means the document was replaced in place.
        if mutations != self.last_mutations {
            self.last_mutations = mutations;
            return Ok(Some(PageEvent::Mutated));
        }

        Ok(None)
    }
}
