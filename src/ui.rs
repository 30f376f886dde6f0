use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
};

use crate::combo::{ComboField, OptionsState};
use crate::domain::{HELP_TEXT, MSG_LOAD_FAILED, MSG_LOADING, MSG_NO_DATA};
use crate::form::{FieldId, SearchForm};
use crate::model::{Model, Modus};
use crate::results::ResultView;

pub const LABEL_WIDTH: u16 = 16;
pub const STATUSLINE_HEIGHT: u16 = 1;
pub const DROPDOWN_MAX_ITEMS: usize = 8;
pub const USERNAME_WIDTH: u16 = 30;
pub const COUNT_WIDTH: u16 = 12;

#[derive(Debug, Default)]
pub struct SearchUI {
    dropdown: ListState,
}

// One rendered form line and the field it belongs to.
struct FormLine<'a> {
    field: FieldId,
    line: Line<'a>,
}

impl SearchUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let form = model.form();
        let lines = Self::form_lines(form);
        let form_height = lines.len() as u16 + 2;

        let [title_area, form_area, results_area, status_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(form_height),
            Constraint::Min(3),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());

        frame.render_widget(Line::from(" Поиск ".bold()).style(Style::new().reversed()), title_area);
        self.draw_form(model, lines, form_area, frame);
        Self::draw_results(model, results_area, frame);
        Self::draw_statusline(model, status_area, frame);

        if model.modus() == Modus::POPUP {
            Self::draw_help(frame);
        }
    }

    fn combo_text<'a, V>(combo: &'a ComboField<V>, field: FieldId) -> Span<'a>
    where
        V: Clone + PartialEq + std::fmt::Debug,
    {
        match combo.state() {
            OptionsState::Loading => Span::from("загрузка...").italic().dark_gray(),
            OptionsState::Failed(_) => Span::from(MSG_LOAD_FAILED).red(),
            OptionsState::Ready if combo.text().is_empty() && !combo.is_editing() => {
                Span::from(field.placeholder()).dark_gray()
            }
            OptionsState::Ready => Span::from(combo.text()),
        }
    }

    fn form_lines(form: &SearchForm) -> Vec<FormLine<'_>> {
        let mut lines = Vec::new();
        for field in form.fields() {
            let focused = form.focus() == field;
            let value = match field {
                FieldId::Group => Self::combo_text(&form.group, field),
                FieldId::User => match form.user_selector() {
                    Some(selector) => Self::combo_text(&selector.combo, field),
                    None => continue,
                },
                FieldId::From | FieldId::To => {
                    let date = if field == FieldId::From { &form.from } else { &form.to };
                    if date.text().is_empty() && !(focused && form.is_editing()) {
                        Span::from(field.placeholder()).dark_gray()
                    } else {
                        Span::from(date.text())
                    }
                }
                FieldId::Status => Self::combo_text(&form.status, field),
                FieldId::Submit => Span::from("[ Поиск ]").bold(),
            };
            let label = format!("{:<width$}", field.label(), width = LABEL_WIDTH as usize);
            let mut label = Span::from(label);
            if focused {
                label = label.bold().fg(Color::Yellow);
            }
            lines.push(FormLine {
                field,
                line: Line::from(vec![label, value]),
            });

            let error = match field {
                FieldId::Group => form.group_error,
                FieldId::From => form.from.error,
                FieldId::To => form.to.error,
                _ => None,
            };
            if let Some(message) = error {
                lines.push(FormLine {
                    field,
                    line: Line::from(vec![Span::from(" ".repeat(LABEL_WIDTH as usize)), message.red()]),
                });
            }
        }
        lines
    }

    fn draw_form(&mut self, model: &Model, lines: Vec<FormLine>, area: Rect, frame: &mut Frame) {
        let form = model.form();
        let focused_row = lines.iter().position(|l| l.field == form.focus()).unwrap_or(0) as u16;
        let block = Block::bordered().border_set(border::ROUNDED).title(" Форма ");
        let inner = block.inner(area);
        let text = Text::from(lines.into_iter().map(|l| l.line).collect::<Vec<_>>());
        frame.render_widget(Paragraph::new(text).block(block), area);

        if model.modus() != Modus::EDIT {
            return;
        }
        let row_y = inner.y + focused_row;
        let value_x = inner.x + LABEL_WIDTH;
        let cursor = match form.focus() {
            FieldId::Group => Some(form.group.filter_cursor()),
            FieldId::User => form.user_selector().map(|s| s.combo.filter_cursor()),
            FieldId::From => Some(form.from.cursor()),
            FieldId::To => Some(form.to.cursor()),
            FieldId::Status => Some(form.status.filter_cursor()),
            FieldId::Submit => None,
        };
        if let Some(cursor) = cursor {
            frame.set_cursor_position(Position::new(value_x + cursor as u16, row_y));
        }

        let items_and_highlight = match form.focus() {
            FieldId::Group => Some(Self::dropdown_items(&form.group)),
            FieldId::User => form.user_selector().map(|s| Self::dropdown_items(&s.combo)),
            FieldId::Status => Some(Self::dropdown_items(&form.status)),
            _ => None,
        };
        if let Some((items, highlight)) = items_and_highlight {
            let height = items.len().clamp(1, DROPDOWN_MAX_ITEMS) as u16 + 2;
            let frame_area = frame.area();
            let dropdown = Rect {
                x: value_x.saturating_sub(1),
                y: row_y + 1,
                width: 40u16.min(frame_area.width.saturating_sub(value_x)),
                height: height.min(frame_area.height.saturating_sub(row_y + 1)),
            };
            self.dropdown.select(Some(highlight));
            let list = List::new(items)
                .block(Block::bordered().border_set(border::PLAIN))
                .highlight_style(Style::new().add_modifier(Modifier::REVERSED));
            frame.render_widget(Clear, dropdown);
            frame.render_stateful_widget(list, dropdown, &mut self.dropdown);
        }
    }

    fn dropdown_items<V>(combo: &ComboField<V>) -> (Vec<ListItem<'_>>, usize)
    where
        V: Clone + PartialEq + std::fmt::Debug,
    {
        let items = combo
            .filtered()
            .into_iter()
            .map(|o| ListItem::new(o.label.as_str()))
            .collect();
        (items, combo.highlighted())
    }

    fn draw_results(model: &Model, area: Rect, frame: &mut Frame) {
        let Some(view) = model.result_view() else {
            let hint = Paragraph::new("Заполните форму и нажмите «Поиск»".dark_gray())
                .centered()
                .block(Block::bordered().border_set(border::ROUNDED));
            frame.render_widget(hint, area);
            return;
        };

        let mut block = Block::bordered()
            .border_set(if model.modus() == Modus::RESULTS { border::THICK } else { border::ROUNDED })
            .title(format!(" {} ", view.title))
            .title_bottom(Self::pager_line(view).centered());
        if let Some(total) = view.total_count {
            block = block.title_bottom(Line::from(format!(" ВСЕГО: {total} ")).right_aligned());
        }
        let inner = block.inner(area);

        let header = Row::new(vec![Cell::from("Имя пользователя"), Cell::from("Количество")])
            .style(Style::new().bold().underlined());
        let rows = view
            .page_rows()
            .into_iter()
            .map(|r| Row::new(vec![Cell::from(r.username.clone()), Cell::from(r.count.to_string())]));
        let table = Table::new(rows, [Constraint::Length(USERNAME_WIDTH), Constraint::Length(COUNT_WIDTH)])
            .header(header)
            .block(block)
            .row_highlight_style(Style::new().reversed());
        let mut state = TableState::default().with_selected(
            (model.modus() == Modus::RESULTS && !view.page_rows().is_empty()).then_some(view.cursor),
        );
        frame.render_stateful_widget(table, area, &mut state);

        let overlay = if view.is_loading() {
            Some(MSG_LOADING.to_string())
        } else if view.error().is_some() {
            Some(MSG_LOAD_FAILED.to_string())
        } else if view.is_empty_result() {
            Some(MSG_NO_DATA.to_string())
        } else {
            None
        };
        if let Some(text) = overlay {
            Self::draw_overlay(&text, inner, frame);
        }
    }

    pub fn pager_line(view: &ResultView) -> Line<'static> {
        let total = view.total();
        let pager = &view.pager;
        let mut spans: Vec<Span> = vec![" « ‹ ".into()];
        for page in pager.window(total) {
            let label = format!(" {} ", page + 1);
            if page == pager.page {
                spans.push(Span::from(label).reversed());
            } else {
                spans.push(Span::from(label));
            }
        }
        spans.push(" › » ".into());
        if let Some(count) = view.count() {
            spans.push(Span::from(format!("· записей: {count} ")).dark_gray());
        }
        Line::from(spans)
    }

    fn draw_overlay(text: &str, area: Rect, frame: &mut Frame) {
        let width = (text.chars().count() as u16 + 4).min(area.width);
        let popup = popup_area(area, width, 3u16.min(area.height));
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(text.to_string()).centered().block(Block::bordered()),
            popup,
        );
    }

    fn draw_statusline(model: &Model, area: Rect, frame: &mut Frame) {
        let line = match model.notification() {
            Some(n) if n.is_error => Line::from(Span::from(n.text.clone()).white().on_red()),
            Some(n) => Line::from(Span::from(n.text.clone()).black().on_green()),
            None => {
                let hint = match model.modus() {
                    Modus::FORM => " ↑↓ поле  Enter изменить  Del очистить  s поиск  Tab результаты  ? помощь  q выход",
                    Modus::EDIT => " Enter выбрать  Esc отмена",
                    Modus::RESULTS => " ↑↓ строка  ←→ страница  1-9 страница  y копировать  Tab форма  q выход",
                    Modus::POPUP => " Esc закрыть",
                };
                Line::from(hint.dark_gray())
            }
        };
        frame.render_widget(line, area);
    }

    fn draw_help(frame: &mut Frame) {
        let text = Text::from(HELP_TEXT);
        let area = popup_area(frame.area(), 64, text.height() as u16 + 2);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text).block(Block::bordered().title(" Помощь ").border_set(border::DOUBLE)),
            area,
        );
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    area
}
