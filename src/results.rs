use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

use tracing::{debug, info, warn};

use crate::api::{ResultPage, ResultRow};
use crate::domain::{ASConfig, ASError};
use crate::fetcher::Request;
use crate::query::SearchCriteria;

/// Tags every result view so late answers for a replaced view can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    pub page: usize,
    pub page_size: usize,
    pub group: usize,
}

impl Pager {
    pub fn new(page_size: usize, group: usize) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
            group: group.max(1),
        }
    }

    pub fn pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    /// Page links shown around the current page.
    pub fn window(&self, total: usize) -> Range<usize> {
        let pages = self.pages(total);
        let start = self.page.saturating_sub(self.group / 2);
        let end = (start + self.group).min(pages);
        end.saturating_sub(self.group).min(start)..end
    }

    pub fn rows(&self, total: usize) -> Range<usize> {
        let start = self.page * self.page_size;
        start.min(total)..(start + self.page_size).min(total)
    }

    pub fn first(&mut self) {
        self.page = 0;
    }

    pub fn prev(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn next(&mut self, total: usize) {
        if self.page + 1 < self.pages(total) {
            self.page += 1;
        }
    }

    pub fn last(&mut self, total: usize) {
        self.page = self.pages(total).saturating_sub(1);
    }

    /// `link` is 1-based within the current window.
    pub fn select_link(&mut self, link: usize, total: usize) -> bool {
        let window = self.window(total);
        match link.checked_sub(1).map(|l| window.start + l) {
            Some(page) if window.contains(&page) => {
                self.page = page;
                true
            }
            _ => false,
        }
    }
}

/// One result table with its pager, bound to a single search url.
pub struct ResultView {
    pub session: SessionId,
    pub url: String,
    pub title: String,
    pub pager: Pager,
    pub cursor: usize,
    pub total_count: Option<i64>,
    batches: BTreeMap<usize, Vec<ResultRow>>,
    in_flight: BTreeSet<usize>,
    total: Option<usize>,
    error: Option<String>,
    fetch_size: usize,
    visible: bool,
}

impl ResultView {
    fn new(session: SessionId, url: String, title: String, cfg: &ASConfig) -> Self {
        Self {
            session,
            url,
            title,
            pager: Pager::new(cfg.page_size, cfg.page_group),
            cursor: 0,
            total_count: None,
            batches: BTreeMap::new(),
            in_flight: BTreeSet::new(),
            total: None,
            error: None,
            fetch_size: cfg.fetch_size.max(1),
            visible: true,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn total(&self) -> usize {
        self.total.unwrap_or(0)
    }

    /// Loaded and nothing found. Stays true until the view is replaced.
    pub fn is_empty_result(&self) -> bool {
        self.total == Some(0)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Row count of the whole result set, `None` before the first answer.
    pub fn count(&self) -> Option<usize> {
        self.total
    }

    fn row(&self, idx: usize) -> Option<&ResultRow> {
        self.batches
            .get(&(idx / self.fetch_size))
            .and_then(|b| b.get(idx % self.fetch_size))
    }

    pub fn page_rows(&self) -> Vec<&ResultRow> {
        self.pager
            .rows(self.total())
            .filter_map(|idx| self.row(idx))
            .collect()
    }

    pub fn selected_row(&self) -> Option<&ResultRow> {
        self.page_rows().get(self.cursor).copied()
    }

    /// Requests for batches the current page needs that are neither loaded nor pending.
    /// Nothing is requested after a failure, a new search starts over.
    pub fn ensure_loaded(&mut self) -> Vec<Request> {
        if self.error.is_some() {
            return Vec::new();
        }
        let needed: Vec<usize> = match self.total {
            None => vec![0],
            Some(total) => {
                let rows = self.pager.rows(total);
                if rows.is_empty() {
                    Vec::new()
                } else {
                    (rows.start / self.fetch_size..=(rows.end - 1) / self.fetch_size).collect()
                }
            }
        };
        needed
            .into_iter()
            .filter(|b| !self.batches.contains_key(b) && self.in_flight.insert(*b))
            .map(|batch| Request::Batch {
                session: self.session,
                url: self.url.clone(),
                batch,
                size: self.fetch_size,
            })
            .collect()
    }

    pub fn apply_batch(&mut self, batch: usize, result: Result<ResultPage, ASError>) {
        self.in_flight.remove(&batch);
        match result {
            Ok(page) => {
                debug!(
                    "View {}: batch {batch} with {} rows, total {}",
                    self.session,
                    page.rows.len(),
                    page.total
                );
                self.total = Some(page.total);
                if page.unpaged {
                    self.batches = page
                        .rows
                        .chunks(self.fetch_size)
                        .map(<[ResultRow]>::to_vec)
                        .enumerate()
                        .collect();
                } else {
                    self.batches.insert(batch, page.rows);
                }
                self.error = None;
                self.clamp_cursor();
            }
            Err(e) => {
                warn!("View {}: batch {batch} failed: {e}", self.session);
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn apply_total(&mut self, result: Result<Option<i64>, ASError>) {
        match result {
            Ok(count) => self.total_count = count,
            Err(e) => warn!("View {}: total count failed: {e}", self.session),
        }
    }

    fn clamp_cursor(&mut self) {
        let n = self.page_rows().len();
        self.cursor = self.cursor.min(n.saturating_sub(1));
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        self.cursor += 1;
        self.clamp_cursor();
    }

    /// Moves the pager and returns whatever has to be fetched for the new page.
    pub fn navigate(&mut self, nav: impl FnOnce(&mut Pager, usize)) -> Vec<Request> {
        let before = self.pager.page;
        let total = self.total();
        nav(&mut self.pager, total);
        if self.pager.page != before {
            self.cursor = 0;
        }
        self.ensure_loaded()
    }
}

/// Creates result views and keeps track of the one on screen.
pub struct ResultViewFactory {
    cfg: ASConfig,
    next_session: u64,
    current: Option<ResultView>,
    retired: u64,
}

impl ResultViewFactory {
    pub fn new(cfg: &ASConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            next_session: 0,
            current: None,
            retired: 0,
        }
    }

    /// Hides the current view, builds a new one for `criteria` and returns its first fetches.
    pub fn create(&mut self, criteria: &SearchCriteria) -> Result<Vec<Request>, ASError> {
        let url = criteria.url(&self.cfg.base_url)?;
        let total_url = criteria.total_count_url(&self.cfg.base_url)?;

        self.next_session += 1;
        let session = SessionId(self.next_session);
        if let Some(mut previous) = self.current.take() {
            previous.hide();
            debug!("Hiding view {} in favour of {session}", previous.session);
            self.retired += 1;
        }

        info!("New result view {session} for {url}");
        let mut view = ResultView::new(session, url, criteria.path(), &self.cfg);
        let mut requests = view.ensure_loaded();
        if let Some(url) = total_url {
            requests.push(Request::Total { session, url });
        }
        self.current = Some(view);
        Ok(requests)
    }

    pub fn current(&self) -> Option<&ResultView> {
        self.current.as_ref().filter(|v| v.is_visible())
    }

    pub fn current_mut(&mut self) -> Option<&mut ResultView> {
        self.current.as_mut().filter(|v| v.is_visible())
    }

    /// Number of views replaced by a later search.
    pub fn retired(&self) -> u64 {
        self.retired
    }

    fn view_for(&mut self, session: SessionId) -> Option<&mut ResultView> {
        match self.current.as_mut() {
            Some(view) if view.session == session => Some(view),
            _ => {
                debug!("Discarding answer for replaced view {session}");
                None
            }
        }
    }

    /// Returns false when the answer belongs to a replaced view.
    pub fn apply_batch(&mut self, session: SessionId, batch: usize, result: Result<ResultPage, ASError>) -> bool {
        match self.view_for(session) {
            Some(view) => {
                view.apply_batch(batch, result);
                true
            }
            None => false,
        }
    }

    pub fn apply_total(&mut self, session: SessionId, result: Result<Option<i64>, ASError>) -> bool {
        match self.view_for(session) {
            Some(view) => {
                view.apply_total(result);
                true
            }
            None => false,
        }
    }
}
