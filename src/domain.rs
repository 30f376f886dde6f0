use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::fetcher::Response;

/// Group id the backend uses for "all groups".
pub const ALL_GROUPS_ID: i64 = 1;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";
pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const DEFAULT_PAGE_GROUP: usize = 5;
pub const DEFAULT_FETCH_SIZE: usize = 100;

pub const MSG_FROM_EMPTY: &str = "Поле 'От' не может быть пустым";
pub const MSG_TO_EMPTY: &str = "Поле 'До' не может быть пустым";
pub const MSG_GROUP_EMPTY: &str = "Поле 'Группа' не может быть пустым";
pub const MSG_BAD_DATE: &str = "Неверный формат даты (ГГГГ-ММ-ДД)";
pub const MSG_SUBMIT_FAILED: &str = "Произошла ошибка при вводе данных";
pub const MSG_LOADING: &str = "Загрузка...";
pub const MSG_NO_DATA: &str = "Данные не найдены";
pub const MSG_LOAD_FAILED: &str = "Ошибка загрузки данных";

pub const HELP_TEXT: &str = "\
Форма поиска
  ↑/↓            Перейти к полю
  Enter          Изменить поле / выбрать значение
  Del            Очистить поле
  s              Поиск
  Tab            Переключиться между формой и результатами

Результаты
  ↑/↓            Выбрать строку
  ←/→            Предыдущая / следующая страница
  Home/End       Первая / последняя страница
  1-9            Перейти к странице из списка
  y              Скопировать строку

  ?              Помощь
  Esc            Закрыть
  q              Выход";

#[derive(Debug, Error)]
pub enum ASError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("backend answered {0}: {1}")]
    StatusError(u16, String),
    #[error("unexpected response body: {0}")]
    DecodeError(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("logging setup failed: {0}")]
    LoggingError(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct ASConfig {
    pub base_url: String,
    pub page_size: usize,
    pub page_group: usize,
    pub fetch_size: usize,
    pub timeout_ms: u64,
    pub event_poll_time: u64,
}

impl Default for ASConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            page_group: DEFAULT_PAGE_GROUP,
            fetch_size: DEFAULT_FETCH_SIZE,
            timeout_ms: 10_000,
            event_poll_time: 100,
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Help,
    Exit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveBeginning,
    MoveEnd,
    SelectPageLink(usize),
    SwitchPane,
    Enter,
    Submit,
    ClearField,
    CopyRow,
    RawKey(KeyEvent),
    Resize(usize, usize),
    Fetched(Response),
}
