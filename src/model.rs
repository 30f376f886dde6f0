use std::time::{Duration, Instant};

use arboard::Clipboard;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{ASConfig, ASError, MSG_LOAD_FAILED, MSG_SUBMIT_FAILED, Message};
use crate::fetcher::{Request, Response};
use crate::form::SearchForm;
use crate::results::{ResultView, ResultViewFactory};

const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modus {
    FORM,
    EDIT,
    RESULTS,
    POPUP,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
    pub is_error: bool,
    pub created: Instant,
}

impl Notification {
    pub fn is_expired(&self) -> bool {
        self.created.elapsed() > NOTIFICATION_TTL
    }
}

/// Owns the whole session: the form, the result views and the work queued for the fetcher.
pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    form: SearchForm,
    results: ResultViewFactory,
    requests: Vec<Request>,
    notification: Option<Notification>,
    clipboard: Option<Clipboard>,
}

impl Model {
    pub fn init(config: &ASConfig) -> Self {
        Self {
            status: Status::READY,
            modus: Modus::FORM,
            previous_modus: Modus::FORM,
            form: SearchForm::new(),
            results: ResultViewFactory::new(config),
            requests: vec![Request::Groups],
            notification: None,
            clipboard: None,
        }
    }

    pub fn form(&self) -> &SearchForm {
        &self.form
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn result_view(&self) -> Option<&ResultView> {
        self.results.current()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref().filter(|n| !n.is_expired())
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::EDIT
    }

    /// Hands the queued requests over to the fetcher.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn notify(&mut self, text: impl Into<String>, is_error: bool) {
        let text = text.into();
        trace!("Notification: {text}");
        self.notification = Some(Notification {
            text,
            is_error,
            created: Instant::now(),
        });
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), ASError> {
        if let Some(msg) = message {
            match (self.modus, msg) {
                (_, Message::Fetched(response)) => self.handle_response(response),
                (_, Message::Resize(width, height)) => trace!("UI was resized to {width}x{height}"),
                (Modus::EDIT, Message::RawKey(key)) => {
                    if let Some(request) = self.form.read(key) {
                        self.requests.push(request);
                    }
                    if !self.form.is_editing() {
                        self.modus = Modus::FORM;
                    }
                }
                (Modus::EDIT, _) => (),
                (Modus::POPUP, Message::Quit) => self.quit(),
                (Modus::POPUP, Message::Exit | Message::Help) => self.modus = self.previous_modus,
                (Modus::POPUP, _) => (),
                (_, Message::Quit) => self.quit(),
                (modus, Message::Help) => {
                    self.previous_modus = modus;
                    self.modus = Modus::POPUP;
                }
                (_, Message::Submit) => self.submit(),
                (Modus::FORM, msg) => self.update_form(msg),
                (Modus::RESULTS, msg) => self.update_results(msg),
            }
        }
        Ok(())
    }

    fn update_form(&mut self, msg: Message) {
        match msg {
            Message::MoveUp => self.form.focus_prev(),
            Message::MoveDown => self.form.focus_next(),
            Message::Enter => {
                if self.form.begin_edit() {
                    self.modus = Modus::EDIT;
                } else {
                    self.submit();
                }
            }
            Message::ClearField => {
                if let Some(request) = self.form.clear_focused() {
                    self.requests.push(request);
                }
            }
            Message::SwitchPane => {
                if self.results.current().is_some() {
                    self.modus = Modus::RESULTS;
                }
            }
            Message::Exit => self.notification = None,
            _ => (),
        }
    }

    fn update_results(&mut self, msg: Message) {
        let Some(view) = self.results.current_mut() else {
            self.modus = Modus::FORM;
            return;
        };
        let requests = match msg {
            Message::MoveUp => {
                view.cursor_up();
                Vec::new()
            }
            Message::MoveDown => {
                view.cursor_down();
                Vec::new()
            }
            Message::MoveLeft => view.navigate(|p, _| p.prev()),
            Message::MoveRight => view.navigate(|p, total| p.next(total)),
            Message::MoveBeginning => view.navigate(|p, _| p.first()),
            Message::MoveEnd => view.navigate(|p, total| p.last(total)),
            Message::SelectPageLink(link) => view.navigate(|p, total| {
                p.select_link(link, total);
            }),
            Message::CopyRow => {
                self.copy_selected_row();
                Vec::new()
            }
            Message::SwitchPane | Message::Exit => {
                self.modus = Modus::FORM;
                Vec::new()
            }
            _ => Vec::new(),
        };
        self.requests.extend(requests);
    }

    fn submit(&mut self) {
        match self.form.validate() {
            Err(errors) => {
                warn!("Search rejected: {errors:?}");
                self.notify(MSG_SUBMIT_FAILED, true);
            }
            Ok(criteria) => {
                info!(
                    "Searching {} (status {})",
                    criteria.path(),
                    criteria.status.map(|s| s.id()).unwrap_or("-")
                );
                match self.results.create(&criteria) {
                    Ok(requests) => {
                        debug!("{} earlier result views retired", self.results.retired());
                        self.requests.extend(requests);
                        self.form.reset_for_next_search();
                        self.notification = None;
                        self.modus = Modus::RESULTS;
                    }
                    Err(e) => {
                        error!("Could not build search: {e}");
                        self.notify(e.to_string(), true);
                    }
                }
            }
        }
    }

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::Groups(result) => {
                if let Err(e) = &result {
                    self.notify(format!("{MSG_LOAD_FAILED}: {e}"), true);
                }
                self.form.set_groups(result);
            }
            Response::Users {
                generation,
                group,
                result,
            } => {
                let failed = result.as_ref().err().map(|e| e.to_string());
                if self.form.set_users(generation, group, result)
                    && let Some(e) = failed
                {
                    self.notify(format!("{MSG_LOAD_FAILED}: {e}"), true);
                }
            }
            Response::Batch {
                session,
                batch,
                result,
            } => {
                let failed = result.is_err();
                if self.results.apply_batch(session, batch, result) && failed {
                    self.notify(MSG_LOAD_FAILED, true);
                }
            }
            Response::Total { session, result } => {
                self.results.apply_total(session, result);
            }
        }
    }

    fn copy_selected_row(&mut self) {
        let Some(row) = self.results.current().and_then(|v| v.selected_row()) else {
            return;
        };
        let content = format!("{},{}", row.username, row.count);
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    debug!("Clipboard unavailable: {e:?}");
                    self.notify("Буфер обмена недоступен", true);
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => self.notify("Строка скопирована", false),
                Err(e) => {
                    debug!("Error copying to clipboard: {e:?}");
                    self.notify("Буфер обмена недоступен", true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;
    use crate::api::{Group, ResultPage, ResultRow, User};
    use crate::domain::{ALL_GROUPS_ID, MSG_FROM_EMPTY};
    use crate::fetcher::execute;
    use crate::fetcher::tests::FakeBackend;
    use crate::form::FieldId;
    use crate::results::SessionId;

    fn backend() -> FakeBackend {
        let mut backend = FakeBackend {
            groups: vec![
                Group { id: ALL_GROUPS_ID, name: "ВСЕ".into() },
                Group { id: 7, name: "Support".into() },
                Group { id: 9, name: "Sales".into() },
            ],
            ..Default::default()
        };
        backend.users.insert(7, vec![User { id: 70, username: "ivanov".into() }]);
        backend.users.insert(9, vec![User { id: 90, username: "petrov".into() }]);
        backend
    }

    // Runs everything the model queued against the backend, like the fetcher would.
    fn pump(model: &mut Model, backend: &FakeBackend) {
        loop {
            let requests = model.take_requests();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                model.update(Some(Message::Fetched(execute(backend, request)))).unwrap();
            }
        }
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            send(model, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
        send(model, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
    }

    fn focus(model: &mut Model, field: FieldId) {
        for _ in 0..10 {
            if model.form().focus() == field {
                return;
            }
            send(model, Message::MoveDown);
        }
        panic!("field {field:?} not reachable");
    }

    fn edit(model: &mut Model, field: FieldId, text: &str) {
        focus(model, field);
        send(model, Message::Enter);
        assert_eq!(model.modus(), Modus::EDIT);
        type_text(model, text);
        assert_eq!(model.modus(), Modus::FORM);
    }

    fn ready_model(backend: &FakeBackend) -> Model {
        let mut model = Model::init(&ASConfig::default());
        pump(&mut model, backend);
        model
    }

    #[test]
    fn loads_groups_on_start() {
        let backend = backend();
        let model = ready_model(&backend);
        assert_eq!(model.form().group.label_of(&7), Some("Support"));
        assert_eq!(backend.calls.lock().unwrap().as_slice(), ["groups"]);
    }

    #[test]
    fn empty_dates_block_the_search() {
        let backend = backend();
        let mut model = ready_model(&backend);
        edit(&mut model, FieldId::Group, "ВСЕ");
        send(&mut model, Message::Submit);

        assert!(model.result_view().is_none());
        assert!(model.take_requests().is_empty());
        assert!(model.notification().unwrap().is_error);
        assert_eq!(model.form().from.error, Some(MSG_FROM_EMPTY));
    }

    #[test]
    fn all_groups_search_loads_rows() {
        let mut backend = backend();
        backend.rows = vec![
            ResultRow { username: "ivanov".into(), count: 3 },
            ResultRow { username: "petrov".into(), count: 1 },
        ];
        let mut model = ready_model(&backend);
        edit(&mut model, FieldId::Group, "ВСЕ");
        edit(&mut model, FieldId::From, "2024-01-01");
        edit(&mut model, FieldId::To, "2024-01-31");
        focus(&mut model, FieldId::Submit);
        send(&mut model, Message::Enter);
        pump(&mut model, &backend);

        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(
            calls.last().unwrap(),
            "http://localhost:8080/api/archive/search/all/2024-01-01 00:00:00/2024-01-31 00:00:00/?page=0&size=100"
        );
        let view = model.result_view().unwrap();
        assert_eq!(view.count(), Some(2));
        assert!(!view.is_loading());
        assert_eq!(model.modus(), Modus::RESULTS);
    }

    #[test]
    fn group_search_resets_user_and_status_afterwards() {
        let backend = backend();
        let mut model = ready_model(&backend);
        edit(&mut model, FieldId::Group, "Support");
        pump(&mut model, &backend);
        edit(&mut model, FieldId::User, "ivanov");
        edit(&mut model, FieldId::From, "2024-02-01");
        edit(&mut model, FieldId::To, "2024-02-02");
        edit(&mut model, FieldId::Status, "в работе");
        send(&mut model, Message::Submit);

        let requests = model.take_requests();
        assert!(matches!(&requests[0], Request::Batch { url, .. }
            if url.ends_with("/search/7/70/2024-02-01 00:00:00/2024-02-02 00:00:00/ЗАЯВКА В РАБОТЕ")));
        assert!(matches!(&requests[1], Request::Total { .. }));

        let form = model.form();
        assert_eq!(form.user_selector().unwrap().combo.value(), None);
        assert_eq!(form.status.value(), None);
    }

    #[test]
    fn empty_result_shows_no_data() {
        let backend = backend();
        let mut model = ready_model(&backend);
        edit(&mut model, FieldId::Group, "Sales");
        edit(&mut model, FieldId::From, "2024-02-01");
        edit(&mut model, FieldId::To, "2024-02-02");
        send(&mut model, Message::Submit);
        pump(&mut model, &backend);

        let view = model.result_view().unwrap();
        assert_eq!(view.count(), Some(0));
        assert!(view.is_empty_result());
        assert_eq!(view.total_count, Some(0));
    }

    #[test]
    fn double_submit_leaves_one_visible_view() {
        let mut backend = backend();
        backend.rows = vec![ResultRow { username: "a".into(), count: 1 }];
        let mut model = ready_model(&backend);
        edit(&mut model, FieldId::Group, "ВСЕ");
        edit(&mut model, FieldId::From, "2024-02-01");
        edit(&mut model, FieldId::To, "2024-02-02");
        send(&mut model, Message::Submit);
        let first = model.take_requests();
        send(&mut model, Message::SwitchPane);
        send(&mut model, Message::Submit);
        let second = model.take_requests();

        // Answer the second search first, then the stale first one.
        for request in second.into_iter().chain(first) {
            send(&mut model, Message::Fetched(execute(&backend, request)));
        }
        let view = model.result_view().unwrap();
        assert_eq!(view.session, SessionId(2));
        assert_eq!(view.count(), Some(1));
    }

    #[test]
    fn load_failure_is_reported() {
        let mut backend = backend();
        backend.fail_search = true;
        let mut model = ready_model(&backend);
        edit(&mut model, FieldId::Group, "ВСЕ");
        edit(&mut model, FieldId::From, "2024-02-01");
        edit(&mut model, FieldId::To, "2024-02-02");
        send(&mut model, Message::Submit);
        pump(&mut model, &backend);

        let view = model.result_view().unwrap();
        assert!(!view.is_loading());
        assert!(view.error().is_some());
        assert_eq!(model.notification().unwrap().text, MSG_LOAD_FAILED);
        // The form is still usable.
        send(&mut model, Message::SwitchPane);
        assert_eq!(model.modus(), Modus::FORM);
    }

    #[test]
    fn paging_requests_following_batches() {
        let mut backend = backend();
        backend.rows = (0..12)
            .map(|i| ResultRow { username: format!("u{i}"), count: i })
            .collect();
        let cfg = ASConfig::default().fetch_size(5usize);
        let mut model = Model::init(&cfg);
        pump(&mut model, &backend);
        edit(&mut model, FieldId::Group, "ВСЕ");
        edit(&mut model, FieldId::From, "2024-02-01");
        edit(&mut model, FieldId::To, "2024-02-02");
        send(&mut model, Message::Submit);
        pump(&mut model, &backend);

        send(&mut model, Message::MoveEnd);
        let requests = model.take_requests();
        assert!(matches!(requests.as_slice(), [Request::Batch { batch: 2, size: 5, .. }]));
        for request in requests {
            send(&mut model, Message::Fetched(execute(&backend, request)));
        }
        let rows: Vec<_> = model
            .result_view()
            .unwrap()
            .page_rows()
            .iter()
            .map(|r| r.username.clone())
            .collect();
        assert_eq!(rows, vec!["u10", "u11"]);

        send(&mut model, Message::SelectPageLink(1));
        assert_eq!(model.result_view().unwrap().pager.page, 0);
    }

    #[test]
    fn help_popup_returns_to_previous_mode() {
        let backend = backend();
        let mut model = ready_model(&backend);
        send(&mut model, Message::Help);
        assert_eq!(model.modus(), Modus::POPUP);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::Exit);
        assert_eq!(model.modus(), Modus::FORM);
        assert_eq!(model.form().focus(), FieldId::Group);
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn stale_page_is_ignored() {
        let backend = backend();
        let mut model = ready_model(&backend);
        send(
            &mut model,
            Message::Fetched(Response::Batch {
                session: SessionId(99),
                batch: 0,
                result: Ok(ResultPage { rows: Vec::new(), total: 0, unpaged: false }),
            }),
        );
        assert!(model.result_view().is_none());
        assert!(model.notification().is_none());
    }
}
