//! In-memory reference store.
//!
//! Backs the CLI demo and the test suite. A single mutex guards all
//! tables, which makes `approve_and_advance` naturally atomic with
//! respect to every other mutation.

use crate::document::{ChatMessage, DocName, Document};
use crate::session::{Session, SessionId, Stage};
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    docs: HashMap<(SessionId, DocName), Document>,
    chat: Vec<ChatMessage>,
}

/// Mutex-guarded in-memory implementation of [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-mutation; the in-memory
        // tables are test/demo state, so recover the guard.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_session(&self) -> Result<Session, StoreError> {
        let session = Session::new();
        let mut inner = self.lock();
        inner.sessions.insert(session.session_id, session.clone());
        debug!(session = %session.session_id, "created session");
        Ok(session)
    }

    async fn get_session(&self, session: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.lock().sessions.get(&session).cloned())
    }

    async fn read_doc(
        &self,
        session: SessionId,
        name: DocName,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.lock().docs.get(&(session, name)).cloned())
    }

    async fn write_doc(
        &self,
        session: SessionId,
        name: DocName,
        content: String,
    ) -> Result<Document, StoreError> {
        let mut inner = self.lock();
        if !inner.sessions.contains_key(&session) {
            return Err(StoreError::SessionNotFound(session));
        }
        if let Some(existing) = inner.docs.get(&(session, name)) {
            if existing.approved {
                return Err(StoreError::DocumentApproved { session, doc: name });
            }
        }
        let doc = Document {
            session_id: session,
            name,
            content,
            approved: false,
            updated_at: Utc::now(),
        };
        inner.docs.insert((session, name), doc.clone());
        debug!(session = %session, doc = %name, bytes = doc.byte_size(), "wrote document");
        Ok(doc)
    }

    async fn approve_doc(&self, session: SessionId, name: DocName) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let doc = inner
            .docs
            .get_mut(&(session, name))
            .ok_or(StoreError::DocumentNotFound { session, doc: name })?;
        doc.approved = true;
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn approve_and_advance(
        &self,
        session: SessionId,
        stage: Stage,
    ) -> Result<Session, StoreError> {
        let mut inner = self.lock();

        let doc_name = stage.doc();
        {
            let doc = inner
                .docs
                .get_mut(&(session, doc_name))
                .ok_or(StoreError::DocumentNotFound {
                    session,
                    doc: doc_name,
                })?;
            doc.approved = true;
            doc.updated_at = Utc::now();
        }

        let record = inner
            .sessions
            .get_mut(&session)
            .ok_or(StoreError::SessionNotFound(session))?;
        record.approved.insert(stage);
        if let Some(next) = stage.next() {
            record.current_stage = next;
        }
        record.updated_at = Utc::now();
        debug!(
            session = %session,
            approved = %stage,
            now_at = %record.current_stage,
            "approved stage"
        );
        Ok(record.clone())
    }

    async fn list_docs(&self, session: SessionId) -> Result<Vec<DocName>, StoreError> {
        let inner = self.lock();
        let mut names: Vec<DocName> = inner
            .docs
            .keys()
            .filter(|(s, _)| *s == session)
            .map(|(_, name)| *name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn append_chat(&self, message: ChatMessage) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.sessions.contains_key(&message.session_id) {
            return Err(StoreError::SessionNotFound(message.session_id));
        }
        inner.chat.push(message);
        Ok(())
    }

    async fn chat_history(
        &self,
        session: SessionId,
        stage: Option<Stage>,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .chat
            .iter()
            .filter(|m| m.session_id == session)
            .filter(|m| stage.is_none() || m.stage == stage)
            .cloned()
            .collect())
    }
}
