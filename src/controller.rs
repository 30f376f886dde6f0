use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::trace;

use crate::domain::{ASConfig, ASError, Message};
use crate::model::{Model, Modus};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
    inbox: Receiver<Message>,
}

impl Controller {
    pub fn new(cfg: &ASConfig, inbox: Receiver<Message>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            inbox,
        }
    }

    /// Fetch answers take precedence over terminal input.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, ASError> {
        match self.inbox.try_recv() {
            Ok(msg) => return Ok(Some(msg)),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => trace!("Fetch inbox disconnected"),
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(key, model));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent, model: &Model) -> Option<Message> {
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('?'), _) | (KeyCode::F(1), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Tab, _) | (KeyCode::BackTab, _) => Some(Message::SwitchPane),
            (KeyCode::Char('s'), _) | (KeyCode::F(5), _) => Some(Message::Submit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::Home, _) | (KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End, _) | (KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Delete, _) | (KeyCode::Backspace, _) => Some(Message::ClearField),
            (KeyCode::Char('y'), _) => Some(Message::CopyRow),
            (KeyCode::Char(c), _) if model.modus() == Modus::RESULTS && c.is_ascii_digit() && c != '0' => {
                c.to_digit(10).map(|d| Message::SelectPageLink(d as usize))
            }
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::fetcher::Response;

    fn controller() -> (Controller, mpsc::Sender<Message>) {
        let (tx, rx) = mpsc::channel();
        (Controller::new(&ASConfig::default(), rx), tx)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_navigation_keys() {
        let (controller, _tx) = controller();
        let model = Model::init(&ASConfig::default());
        assert!(matches!(controller.handle_key(key(KeyCode::Char('q')), &model), Some(Message::Quit)));
        assert!(matches!(controller.handle_key(key(KeyCode::Down), &model), Some(Message::MoveDown)));
        assert!(matches!(controller.handle_key(key(KeyCode::Char('s')), &model), Some(Message::Submit)));
        // Page links only exist on the result pane.
        assert!(controller.handle_key(key(KeyCode::Char('3')), &model).is_none());
    }

    #[test]
    fn edit_mode_passes_raw_keys() {
        let (controller, _tx) = controller();
        let mut model = Model::init(&ASConfig::default());
        model.update(Some(Message::Enter)).unwrap();
        assert!(model.raw_keyevents());
        assert!(matches!(
            controller.handle_key(key(KeyCode::Char('q')), &model),
            Some(Message::RawKey(_))
        ));
    }

    #[test]
    fn inbox_messages_come_first() {
        let (controller, tx) = controller();
        let model = Model::init(&ASConfig::default());
        tx.send(Message::Fetched(Response::Groups(Ok(Vec::new())))).unwrap();
        let msg = controller.handle_event(&model).unwrap();
        assert!(matches!(msg, Some(Message::Fetched(Response::Groups(Ok(_))))));
    }
}
