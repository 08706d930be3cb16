//! In-memory push server and status source for consumer tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vguard_models::{
    ClientMessage, FrameAnalysis, JobId, ProgressEvent, SensitivityStatus, SensitivityVerdict, Stage,
};

use crate::error::{ClientError, ClientResult};
use crate::transport::{PushConnection, PushTransport, StatusSource};
use crate::wire::{IncomingMessage, PushEvent, StatusSnapshot};

/// Poll `condition` on a 10 ms cadence for up to 5 s of (possibly paused) time.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

struct Link {
    subscribed: Vec<JobId>,
    tx: mpsc::UnboundedSender<ClientResult<IncomingMessage>>,
}

/// Progress endpoint and status API in one.
///
/// Pushes reach only live connections subscribed to the job at push time.
#[derive(Default)]
pub struct FakeServer {
    statuses: Mutex<HashMap<JobId, StatusSnapshot>>,
    links: Mutex<HashMap<usize, Link>>,
    received: Mutex<Vec<ClientMessage>>,
    next_link: AtomicUsize,
    connects: AtomicUsize,
    refusals: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, job_id: &JobId, stage: Stage, progress: u8) {
        let mut statuses = self.statuses.lock().unwrap();
        let entry = statuses.entry(job_id.clone()).or_insert_with(|| StatusSnapshot {
            job_id: job_id.clone(),
            stage: None,
            overall_progress: None,
            sensitivity_verdict: None,
            derived_path: None,
        });
        entry.stage = Some(stage.as_str().to_string());
        entry.overall_progress = Some(progress as f64);
    }

    /// Persist the terminal state of a job, verdict and rendition included.
    pub fn finish(&self, job_id: &JobId, status: SensitivityStatus) {
        self.set_status(job_id, Stage::terminal_for(status), 100);
        let mut statuses = self.statuses.lock().unwrap();
        if let Some(entry) = statuses.get_mut(job_id) {
            entry.sensitivity_verdict = Some(SensitivityVerdict {
                status,
                confidence: 0.85,
                reasons: vec!["No sensitive content detected".to_string()],
                frame_analysis: FrameAnalysis::default(),
            });
            entry.derived_path = Some(format!("/derived/{}.mp4", job_id));
        }
    }

    /// Publish to subscribed connections. Returns how many received it.
    pub fn push(&self, event: &ProgressEvent) -> usize {
        self.deliver(event, true)
    }

    /// Deliver to every live connection, subscribed or not.
    pub fn deliver_to_all(&self, event: &ProgressEvent) -> usize {
        self.deliver(event, false)
    }

    fn deliver(&self, event: &ProgressEvent, subscribed_only: bool) -> usize {
        let links = self.links.lock().unwrap();
        links
            .values()
            .filter(|link| !subscribed_only || link.subscribed.contains(&event.job_id))
            .filter(|link| {
                let message = IncomingMessage::Progress { event: to_push_event(event) };
                link.tx.send(Ok(message)).is_ok()
            })
            .count()
    }

    /// Close every connection without a close frame.
    pub fn drop_connections(&self) {
        self.links.lock().unwrap().clear();
    }

    pub fn refuse_next_connects(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    /// Successful connections so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self, job_id: &JobId) -> usize {
        self.count_received(|m| matches!(m, ClientMessage::Subscribe { job_id: id } if id == job_id))
    }

    pub fn unsubscribe_count(&self, job_id: &JobId) -> usize {
        self.count_received(|m| matches!(m, ClientMessage::Unsubscribe { job_id: id } if id == job_id))
    }

    fn count_received(&self, predicate: impl Fn(&ClientMessage) -> bool) -> usize {
        self.received.lock().unwrap().iter().filter(|m| predicate(m)).count()
    }

    fn open_link(&self) -> (usize, mpsc::UnboundedReceiver<ClientResult<IncomingMessage>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_link.fetch_add(1, Ordering::SeqCst);
        self.links.lock().unwrap().insert(
            id,
            Link {
                subscribed: Vec::new(),
                tx,
            },
        );
        self.connects.fetch_add(1, Ordering::SeqCst);
        (id, rx)
    }

    fn receive(&self, link_id: usize, message: &ClientMessage) -> ClientResult<()> {
        let mut links = self.links.lock().unwrap();
        let Some(link) = links.get_mut(&link_id) else {
            return Err(ClientError::connect("connection dropped"));
        };
        match message {
            ClientMessage::Subscribe { job_id } => {
                if !link.subscribed.contains(job_id) {
                    link.subscribed.push(job_id.clone());
                }
            }
            ClientMessage::Unsubscribe { job_id } => link.subscribed.retain(|id| id != job_id),
        }
        self.received.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn to_push_event(event: &ProgressEvent) -> PushEvent {
    serde_json::from_value(serde_json::to_value(event).unwrap()).unwrap()
}

#[async_trait]
impl StatusSource for FakeServer {
    async fn fetch(&self, job_id: &JobId) -> ClientResult<Option<StatusSnapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses.lock().unwrap().get(job_id).cloned())
    }
}

pub struct FakeTransport {
    server: Arc<FakeServer>,
}

impl FakeTransport {
    pub fn new(server: Arc<FakeServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self) -> ClientResult<Box<dyn PushConnection>> {
        let refused = self
            .server
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ClientError::connect("connection refused"));
        }

        let (link_id, rx) = self.server.open_link();
        Ok(Box::new(FakeConnection {
            server: self.server.clone(),
            link_id,
            rx,
        }))
    }
}

struct FakeConnection {
    server: Arc<FakeServer>,
    link_id: usize,
    rx: mpsc::UnboundedReceiver<ClientResult<IncomingMessage>>,
}

#[async_trait]
impl PushConnection for FakeConnection {
    async fn send(&mut self, message: &ClientMessage) -> ClientResult<()> {
        self.server.receive(self.link_id, message)
    }

    async fn recv(&mut self) -> Option<ClientResult<IncomingMessage>> {
        self.rx.recv().await
    }
}

