//! Remote progress consumer.
//!
//! Push delivery is at-most-once and connections drop without notice, so
//! the consumer never trusts the push channel alone:
//!
//! - subscription intents live outside the connection and are replayed on
//!   every (re)connect,
//! - every watched job also has a status poll that runs until a terminal
//!   phase is seen through either channel,
//! - both channels feed the same pure [`merge`], under one lock, so each
//!   job's terminal view is emitted exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use vguard_models::{ClientMessage, JobId};

use crate::config::ConsumerConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::HttpStatusSource;
use crate::intents::SubscriptionIntents;
use crate::reducer::{merge, JobView, Update};
use crate::transport::{PushConnection, PushTransport, StatusSource};
use crate::wire::IncomingMessage;
use crate::ws::WsTransport;

const TERMINAL_BUFFER: usize = 64;

enum Command {
    Subscribe(JobId),
    Unsubscribe(JobId),
}

enum Step {
    Command(Option<Command>),
    Incoming(Option<ClientResult<IncomingMessage>>),
    Shutdown,
}

#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Disconnected,
    Shutdown,
}

struct Watched {
    view: watch::Sender<JobView>,
    poller: JoinHandle<()>,
}

struct Shared {
    config: ConsumerConfig,
    source: Arc<dyn StatusSource>,
    intents: SubscriptionIntents,
    jobs: Mutex<HashMap<JobId, Watched>>,
    commands: mpsc::UnboundedSender<Command>,
    terminal: broadcast::Sender<JobView>,
    shutdown: watch::Sender<bool>,
}

/// Follows jobs over the push channel with polling reconciliation.
pub struct ProgressConsumer {
    shared: Arc<Shared>,
    connection: Option<JoinHandle<()>>,
}

impl ProgressConsumer {
    /// Start the connection loop. Must be called inside a tokio runtime.
    pub fn start(
        config: ConsumerConfig,
        transport: Arc<dyn PushTransport>,
        source: Arc<dyn StatusSource>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (terminal, _) = broadcast::channel(TERMINAL_BUFFER);
        let (shutdown, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            config,
            source,
            intents: SubscriptionIntents::new(),
            jobs: Mutex::new(HashMap::new()),
            commands,
            terminal,
            shutdown,
        });

        let connection = tokio::spawn(run_connection(shared.clone(), transport, command_rx));

        Self {
            shared,
            connection: Some(connection),
        }
    }

    /// WebSocket push plus HTTP polling against the configured API.
    pub fn from_config(config: ConsumerConfig) -> ClientResult<Self> {
        let transport = Arc::new(WsTransport::from_config(&config)?);
        let source = Arc::new(HttpStatusSource::new(&config)?);
        Ok(Self::start(config, transport, source))
    }

    /// Start following a job. Safe to call before any connection exists.
    ///
    /// Watching a job twice returns another handle on the same view. A job
    /// is forgotten once it turns terminal, so watching it again starts over.
    pub async fn watch(&self, job_id: JobId) -> JobWatch {
        let mut jobs = self.shared.jobs.lock().await;
        if let Some(watched) = jobs.get(&job_id) {
            return JobWatch {
                job_id,
                view: watched.view.subscribe(),
            };
        }

        // Intent goes in before the poller can possibly observe a terminal
        self.shared.intents.add(job_id.clone()).await;

        let (tx, rx) = watch::channel(JobView::new(job_id.clone()));
        let poller = tokio::spawn(poll_job(self.shared.clone(), job_id.clone(), tx.subscribe()));
        jobs.insert(job_id.clone(), Watched { view: tx, poller });
        drop(jobs);

        let _ = self.shared.commands.send(Command::Subscribe(job_id.clone()));
        debug!(job_id = %job_id, "Watching job");

        JobWatch { job_id, view: rx }
    }

    /// Stop following a job. Open [`JobWatch`] handles report [`ClientError::Closed`].
    pub async fn unwatch(&self, job_id: &JobId) {
        if let Some(watched) = self.shared.jobs.lock().await.remove(job_id) {
            watched.poller.abort();
        }
        if self.shared.intents.remove(job_id).await {
            let _ = self.shared.commands.send(Command::Unsubscribe(job_id.clone()));
        }
    }

    /// Terminal views, one per job.
    pub fn terminal_events(&self) -> broadcast::Receiver<JobView> {
        self.shared.terminal.subscribe()
    }

    /// Latest view of a job still being followed.
    pub async fn view(&self, job_id: &JobId) -> Option<JobView> {
        let jobs = self.shared.jobs.lock().await;
        jobs.get(job_id).map(|w| w.view.borrow().clone())
    }

    pub async fn shutdown(mut self) {
        self.shared.shutdown.send_replace(true);
        if let Some(connection) = self.connection.take() {
            let _ = connection.await;
        }
    }
}

impl Drop for ProgressConsumer {
    fn drop(&mut self) {
        self.shared.shutdown.send_replace(true);
    }
}

/// Handle on the reconciled view of one job.
pub struct JobWatch {
    job_id: JobId,
    view: watch::Receiver<JobView>,
}

impl JobWatch {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn current(&self) -> JobView {
        self.view.borrow().clone()
    }

    /// Wait for the next change of the view.
    pub async fn changed(&mut self) -> ClientResult<JobView> {
        self.view.changed().await.map_err(|_| ClientError::Closed)?;
        Ok(self.view.borrow_and_update().clone())
    }

    /// Wait until the job reaches a terminal phase.
    pub async fn wait_terminal(&mut self) -> ClientResult<JobView> {
        let view = self
            .view
            .wait_for(JobView::is_terminal)
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(JobView::clone(&view))
    }
}

impl Shared {
    async fn apply(&self, job_id: &JobId, update: Update) {
        let terminal = {
            let mut jobs = self.jobs.lock().await;
            let Some(watched) = jobs.get(job_id) else {
                return;
            };

            let prior = watched.view.borrow().clone();
            let next = merge(&prior, &update);
            if next == prior {
                return;
            }

            let reached_terminal = !prior.is_terminal() && next.is_terminal();
            watched.view.send_replace(next.clone());
            if reached_terminal {
                // Open handles keep the final value after the sender is gone
                jobs.remove(job_id);
            }
            reached_terminal.then_some(next)
        };

        if let Some(view) = terminal {
            info!(job_id = %job_id, phase = %view.phase, "Job reached terminal phase");
            let _ = self.terminal.send(view);
            self.intents.remove(job_id).await;
            let _ = self.commands.send(Command::Unsubscribe(job_id.clone()));
        }
    }

    async fn poll_once(&self, job_id: &JobId) {
        match self.source.fetch(job_id).await {
            Ok(Some(snapshot)) => self.apply(job_id, Update::from(snapshot)).await,
            Ok(None) => {
                warn!(job_id = %job_id, "Watched job is unknown to the server");
                self.apply(job_id, Update::not_found()).await;
            }
            Err(e) => warn!(job_id = %job_id, "Status poll failed: {}", e),
        }
    }

    async fn handle_incoming(&self, message: IncomingMessage) {
        match message {
            IncomingMessage::Progress { event } => {
                let job_id = event.job_id.clone();
                self.apply(&job_id, Update::from(event)).await;
            }
            IncomingMessage::Subscribed { job_id } => debug!(job_id = %job_id, "Subscribed"),
            IncomingMessage::Unsubscribed { job_id } => debug!(job_id = %job_id, "Unsubscribed"),
            IncomingMessage::Error { message, job_id } => {
                warn!(job_id = ?job_id, "Server rejected request: {}", message)
            }
            IncomingMessage::Unknown => {}
        }
    }

    async fn serve_connection(
        &self,
        mut conn: Box<dyn PushConnection>,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        // Anything queued while offline is covered by the replay
        while commands.try_recv().is_ok() {}

        for job_id in self.intents.pending().await {
            if let Err(e) = conn.send(&ClientMessage::Subscribe { job_id: job_id.clone() }).await {
                warn!(job_id = %job_id, "Subscription replay failed: {}", e);
                return Exit::Disconnected;
            }
        }

        loop {
            let step = tokio::select! {
                command = commands.recv() => Step::Command(command),
                incoming = conn.recv() => Step::Incoming(incoming),
                _ = shutdown.changed() => Step::Shutdown,
            };

            match step {
                Step::Command(Some(command)) => {
                    let message = match command {
                        Command::Subscribe(job_id) => ClientMessage::Subscribe { job_id },
                        Command::Unsubscribe(job_id) => ClientMessage::Unsubscribe { job_id },
                    };
                    if let Err(e) = conn.send(&message).await {
                        warn!("Progress connection send failed: {}", e);
                        return Exit::Disconnected;
                    }
                }
                Step::Command(None) | Step::Shutdown => return Exit::Shutdown,
                Step::Incoming(Some(Ok(message))) => self.handle_incoming(message).await,
                Step::Incoming(Some(Err(e))) => {
                    warn!("Progress connection error: {}", e);
                    return Exit::Disconnected;
                }
                Step::Incoming(None) => return Exit::Disconnected,
            }
        }
    }
}

async fn run_connection(
    shared: Arc<Shared>,
    transport: Arc<dyn PushTransport>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut attempt: u64 = 0;

    while !*shutdown.borrow() {
        attempt += 1;
        let connected = tokio::select! {
            result = transport.connect() => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok(conn) => {
                info!(attempt, "Progress connection established");
                if shared.serve_connection(conn, &mut commands, &mut shutdown).await == Exit::Shutdown {
                    break;
                }
                warn!("Progress connection lost, reconnecting");
            }
            Err(e) => warn!(attempt, "Progress connection failed: {}", e),
        }

        tokio::select! {
            _ = sleep(shared.config.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    debug!("Progress connection loop stopped");
}

/// Poll one job until its view turns terminal. The first query is immediate.
async fn poll_job(shared: Arc<Shared>, job_id: JobId, mut view: watch::Receiver<JobView>) {
    let mut ticker = interval(shared.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = shared.shutdown.subscribe();

    loop {
        if view.borrow().is_terminal() || *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => shared.poll_once(&job_id).await,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!(job_id = %job_id, "Status poll stopped");
}
