//! The search form: field layout, editing and validation.
//!
//! The user selector is not spliced into a widget tree. Its presence is derived
//! from the committed group every time `fields()` is asked for, and the selector
//! state itself is replaced wholesale whenever a concrete group is chosen.

use chrono::NaiveDate;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, trace};

use crate::api::{Group, User};
use crate::combo::{ComboEvent, ComboField, ComboOption};
use crate::domain::{ALL_GROUPS_ID, ASError, MSG_BAD_DATE, MSG_FROM_EMPTY, MSG_GROUP_EMPTY, MSG_TO_EMPTY};
use crate::fetcher::Request;
use crate::inputter::Inputter;
use crate::query::{SearchCriteria, StatusCode, UserChoice};

pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    Group,
    User,
    From,
    To,
    Status,
    Submit,
}

impl FieldId {
    pub fn label(&self) -> &'static str {
        match self {
            FieldId::Group => "Группа:",
            FieldId::User => "Пользователь:",
            FieldId::From => "От",
            FieldId::To => "До",
            FieldId::Status => "Сообщение",
            FieldId::Submit => "Поиск",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            FieldId::Group => "Выберите \"ВСЕ\" для поиска по всем группам",
            FieldId::User => "Оставьте пустым для получения статистики по всей группе",
            FieldId::From | FieldId::To => "ГГГГ-ММ-ДД",
            FieldId::Status | FieldId::Submit => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: FieldId,
    pub message: &'static str,
}

#[derive(Debug, Clone)]
pub struct DateField {
    input: Inputter,
    committed: String,
    empty_message: &'static str,
    pub error: Option<&'static str>,
    editing: bool,
}

impl DateField {
    fn new(empty_message: &'static str) -> Self {
        Self {
            input: Inputter::default(),
            committed: String::new(),
            empty_message,
            error: None,
            editing: false,
        }
    }

    pub fn text(&self) -> &str {
        if self.editing {
            self.input.value()
        } else {
            &self.committed
        }
    }

    pub fn cursor(&self) -> usize {
        self.input.get().curser_pos
    }

    #[cfg(test)]
    pub fn set(&mut self, value: &str) {
        self.committed = value.trim().to_string();
        self.input.set(&self.committed);
    }

    fn begin_edit(&mut self) {
        self.editing = true;
        self.input.set(&self.committed);
    }

    /// Returns true once the edit is over.
    fn read(&mut self, key: KeyEvent) -> bool {
        let res = self.input.read(key);
        if !res.finished {
            return false;
        }
        self.editing = false;
        if !res.canceled {
            self.committed = res.input.trim().to_string();
            self.error = self.check().err();
        }
        true
    }

    fn clear(&mut self) {
        self.editing = false;
        self.committed.clear();
        self.input.clear();
        self.error = self.check().err();
    }

    fn check(&self) -> Result<NaiveDate, &'static str> {
        if self.committed.is_empty() {
            Err(self.empty_message)
        } else {
            NaiveDate::parse_from_str(&self.committed, DATE_INPUT_FORMAT).map_err(|_| MSG_BAD_DATE)
        }
    }

    pub fn validate(&mut self) -> Result<NaiveDate, &'static str> {
        let res = self.check();
        self.error = res.err();
        res
    }
}

#[derive(Debug, Clone)]
pub struct UserSelector {
    pub generation: u64,
    pub group: i64,
    pub combo: ComboField<i64>,
}

pub struct SearchForm {
    pub group: ComboField<i64>,
    user: Option<UserSelector>,
    next_generation: u64,
    pub from: DateField,
    pub to: DateField,
    pub status: ComboField<StatusCode>,
    pub group_error: Option<&'static str>,
    focus: FieldId,
}

impl SearchForm {
    pub fn new() -> Self {
        let status = ComboField::with_options(
            StatusCode::ALL
                .iter()
                .map(|s| ComboOption {
                    value: *s,
                    label: s.label().to_string(),
                })
                .collect(),
        );
        Self {
            group: ComboField::loading(),
            user: None,
            next_generation: 0,
            from: DateField::new(MSG_FROM_EMPTY),
            to: DateField::new(MSG_TO_EMPTY),
            status,
            group_error: None,
            focus: FieldId::Group,
        }
    }

    pub fn is_concrete_group(group: Option<i64>) -> bool {
        matches!(group, Some(g) if g != ALL_GROUPS_ID)
    }

    /// Field layout for the current group selection.
    pub fn fields(&self) -> Vec<FieldId> {
        let mut fields = vec![FieldId::Group];
        if self.user.is_some() {
            fields.push(FieldId::User);
        }
        fields.extend([FieldId::From, FieldId::To, FieldId::Status, FieldId::Submit]);
        fields
    }

    pub fn user_selector(&self) -> Option<&UserSelector> {
        self.user.as_ref()
    }

    pub fn focus(&self) -> FieldId {
        self.focus
    }

    pub fn is_editing(&self) -> bool {
        match self.focus {
            FieldId::Group => self.group.is_editing(),
            FieldId::User => self.user.as_ref().is_some_and(|u| u.combo.is_editing()),
            FieldId::From => self.from.editing,
            FieldId::To => self.to.editing,
            FieldId::Status => self.status.is_editing(),
            FieldId::Submit => false,
        }
    }

    pub fn focus_next(&mut self) {
        let fields = self.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + 1) % fields.len()];
    }

    pub fn focus_prev(&mut self) {
        let fields = self.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + fields.len() - 1) % fields.len()];
    }

    pub fn set_groups(&mut self, result: Result<Vec<Group>, ASError>) {
        match result {
            Ok(groups) => {
                debug!("Loaded {} groups", groups.len());
                self.group.set_options(
                    groups
                        .into_iter()
                        .map(|g| ComboOption {
                            value: g.id,
                            label: g.name,
                        })
                        .collect(),
                );
            }
            Err(e) => self.group.set_failed(e.to_string()),
        }
    }

    /// Returns false when the list belongs to a selector that was replaced meanwhile.
    pub fn set_users(&mut self, generation: u64, group: i64, result: Result<Vec<User>, ASError>) -> bool {
        let Some(selector) = self.user.as_mut().filter(|u| u.generation == generation && u.group == group) else {
            debug!("Dropping user list for group {group}, generation {generation} is stale");
            return false;
        };
        match result {
            Ok(users) => selector.combo.set_options(
                users
                    .into_iter()
                    .map(|u| ComboOption {
                        value: u.id,
                        label: u.username,
                    })
                    .collect(),
            ),
            Err(e) => selector.combo.set_failed(e.to_string()),
        }
        true
    }

    /// Mounts a fresh user selector for a concrete group or removes it otherwise.
    fn on_group_change(&mut self) -> Option<Request> {
        let group = self.group.value().copied();
        if Self::is_concrete_group(group) {
            let group = group?;
            self.next_generation += 1;
            let generation = self.next_generation;
            trace!("Mounting user selector for group {group} (generation {generation})");
            self.user = Some(UserSelector {
                generation,
                group,
                combo: ComboField::loading(),
            });
            Some(Request::Users { generation, group })
        } else {
            trace!("Removing user selector");
            self.user = None;
            if self.focus == FieldId::User {
                self.focus = FieldId::Group;
            }
            None
        }
    }

    /// Starts editing the focused field. Returns false for the submit button.
    pub fn begin_edit(&mut self) -> bool {
        match self.focus {
            FieldId::Group => self.group.begin_edit(),
            FieldId::User => match self.user.as_mut() {
                Some(u) => u.combo.begin_edit(),
                None => return false,
            },
            FieldId::From => self.from.begin_edit(),
            FieldId::To => self.to.begin_edit(),
            FieldId::Status => self.status.begin_edit(),
            FieldId::Submit => return false,
        }
        true
    }

    /// Feeds a key to the field being edited. May ask for a user list.
    pub fn read(&mut self, key: KeyEvent) -> Option<Request> {
        match self.focus {
            FieldId::Group => {
                if let ComboEvent::Committed { changed } = self.group.read(key) {
                    self.group_error = None;
                    if changed {
                        return self.on_group_change();
                    }
                }
            }
            FieldId::User => {
                if let Some(u) = self.user.as_mut() {
                    u.combo.read(key);
                }
            }
            FieldId::From => {
                self.from.read(key);
            }
            FieldId::To => {
                self.to.read(key);
            }
            FieldId::Status => {
                self.status.read(key);
            }
            FieldId::Submit => {}
        }
        None
    }

    pub fn clear_focused(&mut self) -> Option<Request> {
        match self.focus {
            FieldId::Group => {
                if self.group.clear() {
                    return self.on_group_change();
                }
            }
            FieldId::User => {
                if let Some(u) = self.user.as_mut() {
                    u.combo.clear();
                }
            }
            FieldId::From => self.from.clear(),
            FieldId::To => self.to.clear(),
            FieldId::Status => {
                self.status.clear();
            }
            FieldId::Submit => {}
        }
        None
    }

    /// Validates every field, leaving the inline messages in place.
    pub fn validate(&mut self) -> Result<SearchCriteria, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let group = self.group.value().copied();
        self.group_error = group.is_none().then_some(MSG_GROUP_EMPTY);
        if let Some(message) = self.group_error {
            errors.push(ValidationError { field: FieldId::Group, message });
        }
        let from = self.from.validate();
        if let Err(message) = from {
            errors.push(ValidationError { field: FieldId::From, message });
        }
        let to = self.to.validate();
        if let Err(message) = to {
            errors.push(ValidationError { field: FieldId::To, message });
        }

        match (group, from, to) {
            (Some(group), Ok(from), Ok(to)) if errors.is_empty() => {
                let user = match (&self.user, Self::is_concrete_group(Some(group))) {
                    (Some(u), true) => u.combo.value().map_or(UserChoice::Unset, |id| UserChoice::User(*id)),
                    _ => UserChoice::Unset,
                };
                Ok(SearchCriteria {
                    group,
                    user,
                    from,
                    to,
                    status: self.status.value().copied(),
                })
            }
            _ => Err(errors),
        }
    }

    /// Clears user and status after a search was issued.
    pub fn reset_for_next_search(&mut self) {
        if let Some(u) = self.user.as_mut() {
            u.combo.set_value(None);
        }
        self.status.set_value(None);
    }
}

#[cfg(test)]
mod tests {
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn groups() -> Vec<Group> {
        vec![
            Group { id: 1, name: "ВСЕ".into() },
            Group { id: 7, name: "Support".into() },
            Group { id: 9, name: "Sales".into() },
        ]
    }

    fn form() -> SearchForm {
        let mut form = SearchForm::new();
        form.set_groups(Ok(groups()));
        form
    }

    // Selects a group by typing its name into the filter.
    fn pick_group(form: &mut SearchForm, name: &str) -> Option<Request> {
        form.focus = FieldId::Group;
        form.begin_edit();
        for c in name.chars() {
            form.read(key(KeyCode::Char(c)));
        }
        form.read(key(KeyCode::Enter))
    }

    fn fill_dates(form: &mut SearchForm, from: &str, to: &str) {
        form.from.set(from);
        form.to.set(to);
    }

    #[test]
    fn concrete_group_mounts_user_selector_after_group() {
        let mut form = form();
        assert_eq!(form.fields()[1], FieldId::From);

        let req = pick_group(&mut form, "Support");
        assert_eq!(req, Some(Request::Users { generation: 1, group: 7 }));
        assert_eq!(form.fields()[..2], [FieldId::Group, FieldId::User]);
    }

    #[test]
    fn all_or_cleared_group_removes_user_selector() {
        let mut form = form();
        pick_group(&mut form, "Support");
        assert_eq!(pick_group(&mut form, "ВСЕ"), None);
        assert!(!form.fields().contains(&FieldId::User));

        pick_group(&mut form, "Sales");
        form.focus = FieldId::Group;
        assert_eq!(form.clear_focused(), None);
        assert!(form.user_selector().is_none());
    }

    #[test]
    fn switching_back_and_forth_keeps_one_fresh_selector() {
        let mut form = form();
        pick_group(&mut form, "Support");
        pick_group(&mut form, "Sales");
        let req = pick_group(&mut form, "Support");
        assert_eq!(req, Some(Request::Users { generation: 3, group: 7 }));

        let count = form.fields().iter().filter(|f| **f == FieldId::User).count();
        assert_eq!(count, 1);

        // A late answer for the Sales selector must not land in the Support one.
        assert!(!form.set_users(2, 9, Ok(vec![User { id: 90, username: "sale".into() }])));
        assert!(form.set_users(3, 7, Ok(vec![User { id: 70, username: "ivanov".into() }])));
        let selector = form.user_selector().unwrap();
        assert_eq!(selector.group, 7);
        assert_eq!(selector.combo.label_of(&70), Some("ivanov"));
        assert_eq!(selector.combo.label_of(&90), None);
    }

    #[test]
    fn empty_dates_are_rejected_with_field_messages() {
        let mut form = form();
        pick_group(&mut form, "ВСЕ");
        let errors = form.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![FieldId::From, FieldId::To]);
        assert_eq!(form.from.error, Some(MSG_FROM_EMPTY));
        assert_eq!(form.to.error, Some(MSG_TO_EMPTY));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let mut form = form();
        pick_group(&mut form, "ВСЕ");
        fill_dates(&mut form, "2024-13-01", "2024-01-31");
        let errors = form.validate().unwrap_err();
        assert_eq!(errors, vec![ValidationError { field: FieldId::From, message: MSG_BAD_DATE }]);
    }

    #[test]
    fn missing_group_is_rejected() {
        let mut form = form();
        fill_dates(&mut form, "2024-01-01", "2024-01-31");
        let errors = form.validate().unwrap_err();
        assert_eq!(errors[0].field, FieldId::Group);
    }

    #[test]
    fn date_edit_validates_on_commit() {
        let mut form = form();
        form.focus = FieldId::From;
        form.begin_edit();
        assert!(form.is_editing());
        form.read(key(KeyCode::Enter));
        assert!(!form.is_editing());
        assert_eq!(form.from.error, Some(MSG_FROM_EMPTY));

        form.begin_edit();
        for c in "2024-03-05".chars() {
            form.read(key(KeyCode::Char(c)));
        }
        form.read(key(KeyCode::Enter));
        assert_eq!(form.from.error, None);
        assert_eq!(form.from.text(), "2024-03-05");

        // Clearing the date brings the message back.
        form.clear_focused();
        assert_eq!(form.from.text(), "");
        assert_eq!(form.from.error, Some(MSG_FROM_EMPTY));
    }

    #[test]
    fn valid_form_builds_criteria_and_resets_afterwards() {
        let mut form = form();
        pick_group(&mut form, "Support");
        form.set_users(1, 7, Ok(vec![User { id: 70, username: "ivanov".into() }]));
        form.focus = FieldId::User;
        form.begin_edit();
        form.read(key(KeyCode::Enter));
        form.status.set_value(Some(StatusCode::InProgress));
        fill_dates(&mut form, "2024-02-01", "2024-02-02");

        let criteria = form.validate().unwrap();
        assert_eq!(criteria.group, 7);
        assert_eq!(criteria.user, UserChoice::User(70));
        assert_eq!(criteria.status, Some(StatusCode::InProgress));

        form.reset_for_next_search();
        assert_eq!(form.user_selector().unwrap().combo.value(), None);
        assert_eq!(form.status.value(), None);
        let next = form.validate().unwrap();
        assert_eq!(next.user, UserChoice::Unset);
        assert_eq!(next.status, None);
    }

    #[test]
    fn focus_skips_unmounted_user_selector() {
        let mut form = form();
        form.focus_next();
        assert_eq!(form.focus(), FieldId::From);
        form.focus_prev();
        form.focus_prev();
        assert_eq!(form.focus(), FieldId::Submit);
    }
}
