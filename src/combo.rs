use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::trace;

use crate::inputter::Inputter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboOption<V> {
    pub value: V,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsState {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboEvent {
    None,
    Committed { changed: bool },
    Canceled,
}

/// Searchable dropdown. Typing filters the options, Enter commits the highlighted one.
#[derive(Debug, Clone)]
pub struct ComboField<V> {
    options: Vec<ComboOption<V>>,
    state: OptionsState,
    value: Option<V>,
    filter: Inputter,
    highlight: usize,
    editing: bool,
}

impl<V: Clone + PartialEq + std::fmt::Debug> ComboField<V> {
    pub fn loading() -> Self {
        Self {
            options: Vec::new(),
            state: OptionsState::Loading,
            value: None,
            filter: Inputter::default(),
            highlight: 0,
            editing: false,
        }
    }

    pub fn with_options(options: Vec<ComboOption<V>>) -> Self {
        let mut combo = Self::loading();
        combo.set_options(options);
        combo
    }

    pub fn set_options(&mut self, options: Vec<ComboOption<V>>) {
        self.options = options;
        self.state = OptionsState::Ready;
        self.highlight = 0;
        if let Some(v) = &self.value
            && !self.options.iter().any(|o| &o.value == v)
        {
            trace!("Committed value {v:?} is no longer offered, clearing");
            self.value = None;
        }
    }

    pub fn set_failed(&mut self, reason: impl Into<String>) {
        self.state = OptionsState::Failed(reason.into());
    }

    pub fn state(&self) -> &OptionsState {
        &self.state
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<V>) {
        self.value = value;
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn label_of(&self, value: &V) -> Option<&str> {
        self.options
            .iter()
            .find(|o| &o.value == value)
            .map(|o| o.label.as_str())
    }

    /// Label of the committed value, empty when nothing is selected.
    pub fn committed_text(&self) -> &str {
        self.value
            .as_ref()
            .and_then(|v| self.label_of(v))
            .unwrap_or("")
    }

    /// What the field currently shows, including an unfinished filter.
    pub fn text(&self) -> &str {
        if self.editing {
            self.filter.value()
        } else {
            self.committed_text()
        }
    }

    pub fn filter_cursor(&self) -> usize {
        self.filter.get().curser_pos
    }

    pub fn filtered(&self) -> Vec<&ComboOption<V>> {
        let needle = self.filter.value().to_lowercase();
        self.options
            .iter()
            .filter(|o| o.label.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn highlighted(&self) -> usize {
        self.highlight
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
        self.filter.clear();
        self.highlight = self
            .value
            .as_ref()
            .and_then(|v| self.options.iter().position(|o| &o.value == v))
            .unwrap_or(0);
    }

    pub fn read(&mut self, key: KeyEvent) -> ComboEvent {
        match key.code {
            KeyCode::Up => {
                self.highlight = self.highlight.saturating_sub(1);
                ComboEvent::None
            }
            KeyCode::Down => {
                let n = self.filtered().len();
                if self.highlight + 1 < n {
                    self.highlight += 1;
                }
                ComboEvent::None
            }
            KeyCode::Enter => self.commit(),
            KeyCode::Esc => {
                self.editing = false;
                self.filter.clear();
                ComboEvent::Canceled
            }
            _ => {
                self.filter.read(key);
                self.highlight = 0;
                ComboEvent::None
            }
        }
    }

    fn commit(&mut self) -> ComboEvent {
        let picked = self
            .filtered()
            .get(self.highlight)
            .map(|o| o.value.clone());
        self.editing = false;
        self.filter.clear();
        match picked {
            Some(v) => {
                let changed = self.value.as_ref() != Some(&v);
                self.value = Some(v);
                ComboEvent::Committed { changed }
            }
            None => ComboEvent::Canceled,
        }
    }

    /// Returns true when a value was actually removed.
    pub fn clear(&mut self) -> bool {
        self.editing = false;
        self.filter.clear();
        self.value.take().is_some()
    }
}
