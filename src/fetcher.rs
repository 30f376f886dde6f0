use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::{debug, error, trace};

use crate::api::{Backend, Group, ResultPage, User};
use crate::domain::{ASError, Message};
use crate::results::SessionId;

/// Work the model asks for. Every request is answered by exactly one `Response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Groups,
    Users {
        generation: u64,
        group: i64,
    },
    Batch {
        session: SessionId,
        url: String,
        batch: usize,
        size: usize,
    },
    Total {
        session: SessionId,
        url: String,
    },
}

#[derive(Debug)]
pub enum Response {
    Groups(Result<Vec<Group>, ASError>),
    Users {
        generation: u64,
        group: i64,
        result: Result<Vec<User>, ASError>,
    },
    Batch {
        session: SessionId,
        batch: usize,
        result: Result<ResultPage, ASError>,
    },
    Total {
        session: SessionId,
        result: Result<Option<i64>, ASError>,
    },
}

/// Runs requests on the rayon pool and posts the answers back to the event loop.
pub struct Fetcher {
    backend: Arc<dyn Backend>,
    inbox: Sender<Message>,
}

impl Fetcher {
    pub fn new(backend: Arc<dyn Backend>, inbox: Sender<Message>) -> Self {
        Self { backend, inbox }
    }

    pub fn submit(&self, request: Request) {
        let backend = Arc::clone(&self.backend);
        let inbox = self.inbox.clone();
        debug!("Dispatching {request:?}");
        rayon::spawn(move || {
            let response = execute(backend.as_ref(), request);
            if inbox.send(Message::Fetched(response)).is_err() {
                trace!("Event loop is gone, dropping response");
            }
        });
    }
}

pub fn execute(backend: &dyn Backend, request: Request) -> Response {
    let response = match request {
        Request::Groups => Response::Groups(backend.groups()),
        Request::Users { generation, group } => Response::Users {
            generation,
            group,
            result: backend.users(group),
        },
        Request::Batch {
            session,
            url,
            batch,
            size,
        } => Response::Batch {
            session,
            batch,
            result: backend.search(&url, batch, size),
        },
        Request::Total { session, url } => Response::Total {
            session,
            result: backend.total_count(&url),
        },
    };
    if let Some(e) = response.error() {
        error!("Request failed: {e}");
    }
    response
}

impl Response {
    pub fn error(&self) -> Option<&ASError> {
        match self {
            Response::Groups(r) => r.as_ref().err(),
            Response::Users { result, .. } => result.as_ref().err(),
            Response::Batch { result, .. } => result.as_ref().err(),
            Response::Total { result, .. } => result.as_ref().err(),
        }
    }
}
