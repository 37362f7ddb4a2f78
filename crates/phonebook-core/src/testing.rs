//! In-memory collaborators for exercising the engine without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::directory::{DirectoryConnector, DirectoryError, DirectorySession};
use crate::models::{DirectoryConfig, DirectoryId, MailSettings, RemoteRecord};
use crate::notify::{MailError, MailMessage, Mailer};

#[derive(Default)]
struct DirectoryState {
    records: Vec<RemoteRecord>,
    per_directory: HashMap<DirectoryId, Vec<RemoteRecord>>,
    connect_error: Option<DirectoryError>,
    failing: HashMap<DirectoryId, DirectoryError>,
    search_error: Option<String>,
    connects: usize,
    open_sessions: usize,
    fetch_delay: Option<Duration>,
    last_fetch_started: Option<DateTime<Utc>>,
}

/// Directory double serving fixed records
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl FakeDirectory {
    /// Serve `records` for every directory
    pub fn new(records: Vec<RemoteRecord>) -> Self {
        let directory = Self::default();
        directory.lock().records = records;
        directory
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap()
    }

    /// Replace the records served for every directory
    pub fn set_records(&self, records: Vec<RemoteRecord>) {
        self.lock().records = records;
    }

    /// Serve `records` for one directory only
    pub fn set_directory_records(&self, directory_id: DirectoryId, records: Vec<RemoteRecord>) {
        self.lock().per_directory.insert(directory_id, records);
    }

    /// Make every connect attempt fail
    pub fn fail_connect(&self, error: DirectoryError) {
        self.lock().connect_error = Some(error);
    }

    /// Make connect attempts for one directory fail
    pub fn fail_directory(&self, directory_id: DirectoryId, error: DirectoryError) {
        self.lock().failing.insert(directory_id, error);
    }

    /// Make searches fail after a successful bind
    pub fn fail_search(&self, message: &str) {
        self.lock().search_error = Some(message.to_string());
    }

    /// Hold every snapshot fetch open for `delay`
    pub fn delay_fetch(&self, delay: Duration) {
        self.lock().fetch_delay = Some(delay);
    }

    /// When the most recent snapshot fetch began
    pub fn last_fetch_started(&self) -> Option<DateTime<Utc>> {
        self.lock().last_fetch_started
    }

    /// Number of successful connects so far
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Sessions connected but not yet disconnected
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn connect(
        &self,
        config: &DirectoryConfig,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let mut state = self.lock();
        if let Some(error) = state.connect_error.clone() {
            return Err(error);
        }
        if let Some(error) = state.failing.get(&config.id).cloned() {
            return Err(error);
        }

        state.connects += 1;
        state.open_sessions += 1;
        let records = state
            .per_directory
            .get(&config.id)
            .unwrap_or(&state.records)
            .clone();
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            records,
            search_error: state.search_error.clone(),
            open: true,
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<DirectoryState>>,
    records: Vec<RemoteRecord>,
    search_error: Option<String>,
    open: bool,
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn fetch_all(
        &mut self,
        _search_filter: &str,
        _attributes: &[&str],
    ) -> Result<Vec<RemoteRecord>, DirectoryError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.last_fetch_started = Some(Utc::now());
            state.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match &self.search_error {
            Some(message) => Err(DirectoryError::Search(message.clone())),
            None => Ok(self.records.clone()),
        }
    }

    async fn disconnect(&mut self) {
        if self.open {
            self.open = false;
            self.state.lock().unwrap().open_sessions -= 1;
        }
    }
}

/// Mailer double recording every message it is asked to send
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send with an error (messages are still recorded)
    pub fn fail_sends(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Messages handed to the mailer so far
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, _settings: &MailSettings, message: &MailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        if *self.fail.lock().unwrap() {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}
