//! Host process runtime.
//!
//! Owns the transport, the session registry and the outbound queue. The
//! transport is read in a dedicated task that feeds an mpsc channel, so
//! the main `select!` loop only ever waits on cancel-safe futures.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use minigames_core::config::HostConfig;

use crate::broadcast::{QueueBroadcaster, QueueRoleAssigner};
use crate::config::ConfigLimits;
use crate::error::{MinigamesError, TransportError};
use crate::game::CompletionReason;
use crate::observability::{Event, EventEmitter, metrics};
use crate::transport::{Inbound, Outbound, Transport};

use super::registry::SessionRegistry;
use super::router::{EventRouter, RouterOptions};

/// Inbound messages buffered between the reader task and the router.
const INBOUND_QUEUE: usize = 256;

/// How long shutdown waits for the outbound queue to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything needed to build a [`Host`].
pub struct HostOptions {
    /// Validated configuration.
    pub config: Arc<HostConfig>,
    /// Directory relative question files resolve against.
    pub base_dir: PathBuf,
    /// Platform boundary.
    pub transport: Arc<dyn Transport>,
    /// Structured event stream.
    pub event_emitter: Arc<EventEmitter>,
    /// Size limits applied to games started at runtime.
    pub limits: ConfigLimits,
    /// Token for cooperative shutdown.
    pub cancel: CancellationToken,
}

/// Why [`Host::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Inbound stream reached EOF.
    Eof,
    /// The cancellation token fired.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("eof"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// The minigames host.
pub struct Host {
    config: Arc<HostConfig>,
    base_dir: PathBuf,
    transport: Arc<dyn Transport>,
    events: Arc<EventEmitter>,
    limits: ConfigLimits,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
}

impl Host {
    /// Creates a host from the given options.
    #[must_use]
    pub fn new(opts: HostOptions) -> Self {
        Self {
            config: opts.config,
            base_dir: opts.base_dir,
            transport: opts.transport,
            events: opts.event_emitter,
            limits: opts.limits,
            registry: Arc::new(SessionRegistry::new()),
            cancel: opts.cancel,
        }
    }

    /// Active sessions.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Runs until the inbound stream ends or the token is cancelled.
    ///
    /// Every open session is completed with `Terminated` before returning,
    /// and queued outbound messages are flushed.
    ///
    /// # Errors
    ///
    /// Returns a transport error if reading the inbound stream failed.
    pub async fn run(&self) -> Result<StopReason, MinigamesError> {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();
        let drain = CancellationToken::new();
        let writer = spawn_writer(Arc::clone(&self.transport), out_rx, drain.clone());

        let (in_tx, mut in_rx) = mpsc::channel::<Inbound>(INBOUND_QUEUE);
        let reader = spawn_reader(Arc::clone(&self.transport), in_tx);

        let router = EventRouter::new(RouterOptions {
            settings: self.config.host.clone(),
            registry: Arc::clone(&self.registry),
            broadcaster: Arc::new(QueueBroadcaster::new(out_tx.clone())),
            role_assigner: Arc::new(QueueRoleAssigner::new(out_tx)),
            events: Arc::clone(&self.events),
            base_dir: self.base_dir.clone(),
            limits: self.limits.clone(),
        });

        let boot_sessions = self.start_boot_sessions(&router);
        info!(
            moderators = self.config.host.moderators.len(),
            boot_sessions,
            "host started"
        );
        self.events.emit(Event::HostStarted {
            timestamp: Utc::now(),
            moderators: self.config.host.moderators.len(),
            boot_sessions,
        });

        let period = self.config.host.afk_sweep_interval;
        let mut sweep = tokio::time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stop = loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("host cancelled");
                    break StopReason::Cancelled;
                }
                _ = sweep.tick() => {
                    debug!(sessions = self.registry.len(), "afk sweep");
                    router.sweep(Utc::now());
                }
                inbound = in_rx.recv() => match inbound {
                    Some(inbound) => router.route(inbound),
                    None => {
                        info!("inbound stream closed");
                        break StopReason::Eof;
                    }
                },
            }
        };

        router.shutdown(&CompletionReason::Terminated);
        let tasks = router.tasks().clone();
        drop(router);
        reader.abort();
        let read_result = match reader.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => {
                error!(error = %e, "reader task panicked");
                Ok(())
            }
        };

        tasks.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, tasks.wait()).await.is_err() {
            warn!("role requests still pending at shutdown");
        }
        drain.cancel();
        match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "writer task panicked"),
            Err(_) => warn!("outbound queue did not drain within {DRAIN_TIMEOUT:?}"),
        }
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "failed to close transport");
        }
        metrics::set_sessions_active(0);

        let reason = match &read_result {
            Ok(()) => stop.to_string(),
            Err(e) => format!("error: {e}"),
        };
        self.events.emit(Event::HostStopped {
            timestamp: Utc::now(),
            reason,
        });
        read_result?;
        Ok(stop)
    }

    /// Starts the games listed in the configuration.
    ///
    /// A game that fails to start is logged and skipped.
    fn start_boot_sessions(&self, router: &EventRouter) -> usize {
        let mut started = 0;
        for spec in &self.config.games {
            match router.start_session(spec.clone()) {
                Ok(id) => {
                    debug!(session_id = %id, channel = %spec.channel, "boot session started");
                    started += 1;
                }
                Err(e) => {
                    error!(channel = %spec.channel, error = %e, "failed to start configured game");
                    metrics::record_error("config");
                }
            }
        }
        started
    }
}

/// Forwards inbound messages until EOF or the router goes away.
fn spawn_reader(
    transport: Arc<dyn Transport>,
    tx: mpsc::Sender<Inbound>,
) -> JoinHandle<Result<(), TransportError>> {
    tokio::spawn(async move {
        loop {
            match transport.receive_message().await {
                Ok(Some(inbound)) => {
                    if tx.send(inbound).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "transport read failed");
                    metrics::record_error("transport");
                    return Err(e);
                }
            }
        }
    })
}

/// Drains the outbound queue into the transport.
///
/// Once `drain` is cancelled, whatever is already queued is written and
/// the task exits; producers may still hold senders at that point.
fn spawn_writer(
    transport: Arc<dyn Transport>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    drain: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                biased;
                message = rx.recv() => message,
                () = drain.cancelled() => break,
            };
            let Some(message) = message else {
                return;
            };
            send(transport.as_ref(), &message).await;
        }
        while let Ok(message) = rx.try_recv() {
            send(transport.as_ref(), &message).await;
        }
    })
}

async fn send(transport: &dyn Transport, message: &Outbound) {
    if let Err(e) = transport.send_message(message).await {
        warn!(channel = %message.channel(), error = %e, "failed to send outbound message");
        metrics::record_error("transport");
    }
}
