//! Single-flight command channel to one controller.
//!
//! ```text
//! callers ──execute()──▶ request queue ──▶ ChannelDriver ──frame──▶ controller
//!    ▲                                          │
//!    └────────────── oneshot reply ◀── next inbound frame
//! ```
//!
//! The driver owns both transport halves. It only pulls the next request off
//! the queue once the previous one has been answered, so replies can be
//! correlated purely by order. A closed transport or an expired deadline fails
//! the in-flight command and tears the driver down; queued commands then fail
//! as their reply senders are dropped.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use warehouse_core::{ConnectionId, DomainError, SystemName};

/// Close code: the first frame named no known system.
pub const CLOSE_UNKNOWN_SYSTEM: u16 = 4001;
/// Close code: the named system already has a controller.
pub const CLOSE_ALREADY_BOUND: u16 = 4002;
/// Close code: a command went unanswered past its deadline.
pub const CLOSE_COMMAND_TIMEOUT: u16 = 4003;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The transport closed before (or while) the command was answered.
    #[error("controller connection lost")]
    ConnectionLost,

    /// No reply within the deadline. The connection is dropped as well, since a
    /// late reply could no longer be matched to its command.
    #[error("controller did not reply within {0:?}; connection dropped")]
    TimedOut(Duration),
}

impl From<ChannelError> for DomainError {
    fn from(value: ChannelError) -> Self {
        DomainError::protocol(value.to_string())
    }
}

/// Why a binding attempt was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("invalid system name {0:?}")]
    UnknownSystem(String),

    #[error("system {0} already has a controller")]
    AlreadyBound(SystemName),
}

impl BindError {
    pub fn close_code(&self) -> u16 {
        match self {
            BindError::UnknownSystem(_) => CLOSE_UNKNOWN_SYSTEM,
            BindError::AlreadyBound(_) => CLOSE_ALREADY_BOUND,
        }
    }
}

impl From<BindError> for DomainError {
    fn from(value: BindError) -> Self {
        match value {
            BindError::UnknownSystem(_) => DomainError::not_found(value.to_string()),
            BindError::AlreadyBound(_) => DomainError::conflict(value.to_string()),
        }
    }
}

/// Frames the core wants written to the controller socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// The core's view of one controller socket.
///
/// The socket task forwards every inbound text frame into `inbound` and drops
/// the sender when the socket closes; it writes whatever arrives on
/// `outbound`.
#[derive(Debug)]
pub struct ControllerTransport {
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::Sender<OutboundFrame>,
}

impl ControllerTransport {
    /// Reject the connection with the close code matching `err`.
    pub async fn reject(self, err: &BindError) {
        let _ = self
            .outbound
            .send(OutboundFrame::Close {
                code: err.close_code(),
                reason: err.to_string(),
            })
            .await;
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Deadline for one reply.
    pub command_timeout: Duration,
    /// Commands that may wait behind the one in flight.
    pub queue_depth: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            queue_depth: 64,
        }
    }
}

#[derive(Debug)]
struct PendingCommand {
    expression: String,
    reply: oneshot::Sender<Result<String, ChannelError>>,
}

/// Cloneable handle for issuing commands to one bound controller.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    connection_id: ConnectionId,
    system: SystemName,
    requests: mpsc::Sender<PendingCommand>,
}

/// How a driver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// The controller socket closed.
    TransportClosed,
    /// A command timed out and the socket was told to close.
    TimedOut,
    /// Every `CommandChannel` handle was dropped.
    Released,
}

/// The task half of a [`CommandChannel`]. Must be spawned.
#[derive(Debug)]
pub struct ChannelDriver {
    connection_id: ConnectionId,
    system: SystemName,
    command_timeout: Duration,
    requests: mpsc::Receiver<PendingCommand>,
    transport: ControllerTransport,
}

impl CommandChannel {
    pub fn open(
        system: SystemName,
        transport: ControllerTransport,
        config: &ChannelConfig,
    ) -> (CommandChannel, ChannelDriver) {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let channel = CommandChannel {
            connection_id,
            system: system.clone(),
            requests: tx,
        };
        let driver = ChannelDriver {
            connection_id,
            system,
            command_timeout: config.command_timeout,
            requests: rx,
            transport,
        };
        (channel, driver)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn system(&self) -> &SystemName {
        &self.system
    }

    /// True once the driver has stopped; every further `execute` fails.
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    /// Run `expression` on the controller and wait for its reply.
    ///
    /// Calls from concurrent tasks queue up; each is sent only after the
    /// previous reply arrived.
    pub async fn execute(&self, expression: impl Into<String>) -> Result<String, ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(PendingCommand {
                expression: expression.into(),
                reply,
            })
            .await
            .map_err(|_| ChannelError::ConnectionLost)?;
        rx.await.map_err(|_| ChannelError::ConnectionLost)?
    }
}

#[async_trait::async_trait]
impl super::Controller for CommandChannel {
    async fn execute(&self, expression: String) -> Result<String, ChannelError> {
        CommandChannel::execute(self, expression).await
    }
}

impl ChannelDriver {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub async fn run(mut self) -> DriverExit {
        info!(system = %self.system, connection_id = %self.connection_id, "controller channel open");
        let exit = self.run_loop().await;
        info!(system = %self.system, connection_id = %self.connection_id, ?exit, "controller channel closed");
        exit
    }

    async fn run_loop(&mut self) -> DriverExit {
        loop {
            // Idle: wait for work, watching the socket for close or stray frames.
            let command = tokio::select! {
                request = self.requests.recv() => match request {
                    Some(command) => command,
                    None => return DriverExit::Released,
                },
                frame = self.transport.inbound.recv() => match frame {
                    Some(text) => {
                        warn!(system = %self.system, frame = %text, "discarding frame with no command in flight");
                        continue;
                    }
                    None => return DriverExit::TransportClosed,
                },
            };

            if command.reply.is_closed() {
                debug!(system = %self.system, "caller went away before its command was sent");
                continue;
            }

            debug!(system = %self.system, expression = %command.expression, "sending command");
            if self
                .transport
                .outbound
                .send(OutboundFrame::Text(command.expression))
                .await
                .is_err()
            {
                let _ = command.reply.send(Err(ChannelError::ConnectionLost));
                return DriverExit::TransportClosed;
            }

            // In flight: the next inbound frame is this command's reply.
            let deadline = Instant::now() + self.command_timeout;
            tokio::select! {
                frame = self.transport.inbound.recv() => match frame {
                    Some(text) => {
                        let _ = command.reply.send(Ok(text));
                    }
                    None => {
                        let _ = command.reply.send(Err(ChannelError::ConnectionLost));
                        return DriverExit::TransportClosed;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        system = %self.system,
                        timeout_ms = self.command_timeout.as_millis() as u64,
                        "controller did not reply in time; dropping connection"
                    );
                    let _ = command.reply.send(Err(ChannelError::TimedOut(self.command_timeout)));
                    let _ = self
                        .transport
                        .outbound
                        .send(OutboundFrame::Close {
                            code: CLOSE_COMMAND_TIMEOUT,
                            reason: "command timed out".to_string(),
                        })
                        .await;
                    return DriverExit::TimedOut;
                },
            }
        }
    }
}
