//! Wire types and the blocking HTTP client for the archive backend.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::domain::{ASConfig, ASError};
use crate::query::normalize_base_url;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultRow {
    pub username: String,
    pub count: i64,
}

/// One batch of result rows. `total` is the size of the whole result set.
/// `unpaged` means the backend ignored paging and `rows` is the whole result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    pub rows: Vec<ResultRow>,
    pub total: usize,
    pub unpaged: bool,
}

// The archive endpoints answer with a Spring `Page`, older deployments with a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody {
    Rows(Vec<ResultRow>),
    Spring {
        content: Vec<ResultRow>,
        #[serde(rename = "totalElements")]
        total_elements: Option<u64>,
    },
}

pub trait Backend: Send + Sync {
    fn groups(&self) -> Result<Vec<Group>, ASError>;
    fn users(&self, group: i64) -> Result<Vec<User>, ASError>;
    /// Fetch batch number `batch` of `size` rows from a search url.
    fn search(&self, url: &str, batch: usize, size: usize) -> Result<ResultPage, ASError>;
    fn total_count(&self, url: &str) -> Result<Option<i64>, ASError>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(cfg: &ASConfig) -> Result<Self, ASError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(&cfg.base_url)?,
        })
    }

    fn get_body(&self, url: &str, query: &[(&str, String)]) -> Result<String, ASError> {
        let url = Url::parse(url).map_err(|e| ASError::InvalidUrl(format!("{url}: {e}")))?;
        debug!("GET {url} {query:?}");
        let response = self.client.get(url).query(query).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ASError::StatusError(status.as_u16(), body));
        }
        trace!("Response body: {} bytes", body.len());
        Ok(body)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ASError> {
        let body = self.get_body(url, &[])?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Backend for HttpBackend {
    fn groups(&self) -> Result<Vec<Group>, ASError> {
        self.get_json(&format!("{}api/groups", self.base_url))
    }

    fn users(&self, group: i64) -> Result<Vec<User>, ASError> {
        self.get_json(&format!("{}api/users/{group}", self.base_url))
    }

    fn search(&self, url: &str, batch: usize, size: usize) -> Result<ResultPage, ASError> {
        let query = [("page", batch.to_string()), ("size", size.to_string())];
        let body = self.get_body(url, &query)?;
        decode_page(&body, batch, size)
    }

    fn total_count(&self, url: &str) -> Result<Option<i64>, ASError> {
        let body = self.get_body(url, &[])?;
        decode_total(&body)
    }
}

/// A bare list carries no total. Up to `size` rows it is the complete tail of the
/// result set, a longer one is the whole result set with paging ignored.
pub fn decode_page(body: &str, batch: usize, size: usize) -> Result<ResultPage, ASError> {
    let page = match serde_json::from_str::<PageBody>(body)? {
        PageBody::Rows(rows) if rows.len() > size => ResultPage {
            total: rows.len(),
            rows,
            unpaged: true,
        },
        PageBody::Rows(rows) => ResultPage {
            total: batch * size + rows.len(),
            rows,
            unpaged: false,
        },
        PageBody::Spring {
            content,
            total_elements,
        } => ResultPage {
            total: total_elements
                .map(|t| t as usize)
                .unwrap_or(batch * size + content.len()),
            rows: content,
            unpaged: false,
        },
    };
    Ok(page)
}

pub fn decode_total(body: &str) -> Result<Option<i64>, ASError> {
    let rows = match serde_json::from_str::<PageBody>(body)? {
        PageBody::Rows(rows) => rows,
        PageBody::Spring { content, .. } => content,
    };
    Ok(rows.first().map(|r| r.count))
}
