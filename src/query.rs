//! Maps submitted search criteria onto archive search paths.

use chrono::NaiveDate;

use crate::domain::{ALL_GROUPS_ID, ASError};

const ARCHIVE_PREFIX: &str = "api/archive/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InProgress,
    Rejected,
    Close,
}

impl StatusCode {
    pub const ALL: [StatusCode; 3] = [StatusCode::InProgress, StatusCode::Rejected, StatusCode::Close];

    pub fn id(&self) -> &'static str {
        match self {
            StatusCode::InProgress => "in_progress",
            StatusCode::Rejected => "rejected",
            StatusCode::Close => "close",
        }
    }

    // Labels are what the backend matches against, keep them verbatim.
    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::InProgress => "ЗАЯВКА В РАБОТЕ",
            StatusCode::Rejected => "ЗАКРЫТА ЗАЯВКА",
            StatusCode::Close => "ЗАЯВКА ОТКЛОНЕНА",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserChoice {
    #[default]
    Unset,
    User(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub group: i64,
    pub user: UserChoice,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub status: Option<StatusCode>,
}

impl SearchCriteria {
    pub fn is_all_groups(&self) -> bool {
        self.group == ALL_GROUPS_ID
    }

    /// Path below `api/archive/`, starting with `search/`.
    pub fn path(&self) -> String {
        let from = format_date(self.from);
        let to = format_date(self.to);
        let status = self.status.map(|s| s.label()).unwrap_or("");
        if self.is_all_groups() {
            format!("search/all/{from}/{to}/{status}")
        } else {
            match self.user {
                UserChoice::Unset => format!("search/{}/-1/{from}/{to}/{status}", self.group),
                UserChoice::User(uid) => {
                    format!("search/{}/{uid}/{from}/{to}/{status}", self.group)
                }
            }
        }
    }

    pub fn url(&self, base_url: &str) -> Result<String, ASError> {
        Ok(format!("{}{ARCHIVE_PREFIX}{}", normalize_base_url(base_url)?, self.path()))
    }

    /// The backend only offers totals for the group/user form of the query.
    pub fn total_count_url(&self, base_url: &str) -> Result<Option<String>, ASError> {
        if self.is_all_groups() {
            return Ok(None);
        }
        Ok(Some(format!("{}/totalCount", self.url(base_url)?)))
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d 00:00:00").to_string()
}

pub fn normalize_base_url(base_url: &str) -> Result<String, ASError> {
    let trimmed = base_url.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ASError::InvalidUrl(base_url.to_string()));
    }
    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/"))
    }
}
