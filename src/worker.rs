//! # Client Worker
//!
//! One simulated client. A worker sleeps for a random start-up jitter,
//! opens a single connection, performs a fixed number of strictly sequential
//! request/response round trips over it, and reports every measurement to
//! the shared [`MeasurementCollector`].
//!
//! ## State machine
//!
//! ```text
//! Idle -> Jittering -> Connecting -> Messaging(0..n) -> Done
//!                          |              |
//!                          +--- failure --+----------> Done
//! ```
//!
//! Failures are contained: they are logged with the client id and cause and
//! end this worker's participation. Nothing is retried.

use crate::benchmark::BenchmarkConfig;
use crate::metrics::MeasurementCollector;
use crate::transport::{Connection, Transport, TransportError};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace, warn};

/// Lifecycle states of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Jittering,
    Connecting,
    /// Exchanging the message with the given index
    Messaging(usize),
    Done,
}

/// How a worker reached `Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Every message completed its round trip
    Completed,
    /// The connection could never be opened
    ConnectFailed,
    /// Sending the message with this index failed
    SendFailed { message_id: usize },
    /// Waiting for the response to the message with this index failed
    ReceiveFailed { message_id: usize },
}

/// What one worker contributed to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub client_id: usize,
    pub messages_completed: usize,
    pub exit: WorkerExit,
}

/// Build the request body for one message.
///
/// The body names the client and the message index, followed by `filler`.
pub fn build_payload(client_id: usize, message_id: usize, filler: &str) -> Vec<u8> {
    format!(
        "Client: {} message_id: {} payload: {}",
        client_id, message_id, filler
    )
    .into_bytes()
}

/// One simulated client
pub struct ClientWorker {
    client_id: usize,
    config: Arc<BenchmarkConfig>,
    transport: Arc<dyn Transport>,
    collector: Arc<MeasurementCollector>,
    filler: Arc<str>,
    state: WorkerState,
}

impl ClientWorker {
    pub fn new(
        client_id: usize,
        config: Arc<BenchmarkConfig>,
        transport: Arc<dyn Transport>,
        collector: Arc<MeasurementCollector>,
        filler: Arc<str>,
    ) -> Self {
        Self {
            client_id,
            config,
            transport,
            collector,
            filler,
            state: WorkerState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Drive the worker from `Idle` to `Done`.
    pub async fn run(mut self) -> WorkerOutcome {
        self.transition(WorkerState::Jittering);
        let delay = self.jitter_delay();
        sleep(delay).await;

        self.transition(WorkerState::Connecting);
        let connect_start = Instant::now();
        let connected = with_deadline(
            self.config.op_timeout,
            self.transport.connect(&self.config.server_address),
        )
        .await;

        let mut connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Client {}: could not connect to server: {}", self.client_id, e);
                return self.finish(0, WorkerExit::ConnectFailed);
            }
        };
        self.collector.record_connection(connect_start.elapsed());
        debug!(
            "Client {}: connected via {} after {:?} jitter",
            self.client_id,
            self.transport.name(),
            delay
        );

        let (completed, exit) = self.exchange_messages(connection.as_mut()).await;

        self.release(connection.as_mut()).await;
        self.finish(completed, exit)
    }

    /// Close the connection, bounded by the operation deadline when one is set.
    ///
    /// A peer that stopped reading can stall the close handshake as well.
    async fn release(&self, connection: &mut dyn Connection) {
        match self.config.op_timeout {
            Some(limit) => {
                if timeout(limit, connection.close()).await.is_err() {
                    debug!(
                        "Client {}: close did not finish within {:?}, dropping connection",
                        self.client_id, limit
                    );
                }
            }
            None => connection.close().await,
        }
    }

    /// Run the message loop; returns the number of completed round trips.
    async fn exchange_messages(&mut self, connection: &mut dyn Connection) -> (usize, WorkerExit) {
        let deadline = self.config.op_timeout;

        for message_id in 0..self.config.num_messages {
            self.transition(WorkerState::Messaging(message_id));
            let payload = build_payload(self.client_id, message_id, &self.filler);

            let start = Instant::now();
            if let Err(e) = with_deadline(deadline, connection.send(&payload)).await {
                warn!("Client {}: error writing message: {}", self.client_id, e);
                return (message_id, WorkerExit::SendFailed { message_id });
            }

            let response = match with_deadline(deadline, connection.receive()).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Client {}: error reading message: {}", self.client_id, e);
                    return (message_id, WorkerExit::ReceiveFailed { message_id });
                }
            };
            let elapsed = start.elapsed();

            self.collector
                .record_message(elapsed, payload.len(), response.len());
        }

        (self.config.num_messages, WorkerExit::Completed)
    }

    fn jitter_delay(&self) -> Duration {
        let (min, max) = (self.config.jitter_min, self.config.jitter_max);
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..max)
    }

    fn transition(&mut self, next: WorkerState) {
        trace!("Client {}: {:?} -> {:?}", self.client_id, self.state, next);
        self.state = next;
    }

    fn finish(mut self, messages_completed: usize, exit: WorkerExit) -> WorkerOutcome {
        self.transition(WorkerState::Done);
        WorkerOutcome {
            client_id: self.client_id,
            messages_completed,
            exit,
        }
    }
}

/// Await `operation`, bounded by `deadline` when one is configured.
async fn with_deadline<T, F>(deadline: Option<Duration>, operation: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match deadline {
        Some(limit) => match timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(limit)),
        },
        None => operation.await,
    }
}
