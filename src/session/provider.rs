use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_std::sync::Mutex;
use async_trait::async_trait;

use crate::error::{ Error, Result };
use crate::session::{ archive, Schedule, Session };

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub year: i32,
    pub event: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(year: i32, event: &str, session: &str) -> SessionKey {
        SessionKey { year, event: event.to_string(), session: session.to_string() }
    }
}

/// Source of schedules and session data.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn schedule(&self, year: i32) -> Result<Schedule>;

    /// Fails when the session does not exist or recorded no laps.
    async fn load_session(&self, key: &SessionKey) -> Result<Arc<Session>>;
}

/// Reads recorded sessions from a directory tree, see `archive`.
/// Decoded sessions are kept in memory for later requests.
pub struct ArchiveProvider {
    root: PathBuf,
    sessions: Mutex<HashMap<SessionKey, Arc<Session>>>,
}

impl ArchiveProvider {
    pub fn new(root: PathBuf) -> ArchiveProvider {
        ArchiveProvider { root, sessions: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl SessionProvider for ArchiveProvider {
    async fn schedule(&self, year: i32) -> Result<Schedule> {
        archive::load_schedule(&self.root, year).await
    }

    async fn load_session(&self, key: &SessionKey) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.lock().await.get(key) {
            debug!["Session {:?} served from cache", key];
            return Ok(session.clone());
        }

        let session = archive::load_session(&self.root, key.year, &key.event, &key.session).await?;
        if session.laps.is_empty() {
            return Err(Error::Session(format!["no laps found for {} - {}", key.event, key.session]));
        }

        let session = Arc::new(session);
        self.sessions.lock().await.insert(key.clone(), session.clone());
        Ok(session)
    }
}
