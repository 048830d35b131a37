//! Connection lifecycle state machine.
//!
//! [`Connection::apply`] is a pure transition function: it takes one
//! [`Input`], updates the connection, and returns the [`Effect`]s the driver
//! must carry out, in order. It performs no I/O, so every lifecycle rule can
//! be tested without a network or timers.
//!
//! ```text
//!            connect (no credential)
//!   ┌──────────────────────────────────────┐
//!   ▼                                      │
//! Idle ──connect──► Connecting ──opened──► Open
//!   ▲                   ▲   │                │
//!   │          retry    │   └──failed──┐     │ failed
//!   │                   │              ▼     ▼
//!   │         ReconnectScheduled ◄──── Errored
//!   │                   │
//!   └──────teardown─────┘ (from any state; terminal)
//! ```

use std::fmt;
use std::time::Duration;

use crate::credentials::Credential;
use crate::error::{ChannelError, DecodeError};
use crate::event::Event;

use super::backoff::ReconnectBackoff;

/// Lifecycle state of the single event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No credential, or torn down. No channel, no timer.
    #[default]
    Idle,
    /// Channel open requested, not yet established.
    Connecting,
    /// Channel established and delivering frames.
    Open,
    /// Channel reported a failure. Transient: immediately followed by
    /// `ReconnectScheduled`.
    Errored,
    /// Waiting for the backoff timer before the next connect.
    ReconnectScheduled,
}

impl ConnectionState {
    /// Whether a physical channel exists in this state.
    pub fn has_live_channel(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Errored => "errored",
            ConnectionState::ReconnectScheduled => "reconnect_scheduled",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one physical channel. Bumped on every open so notifications
/// from a channel that was already closed can be recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChannelGeneration(pub u64);

/// Identifies one armed reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryToken(pub u64);

/// Something that happened to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Explicit connect: application start or a credential change.
    /// Carries the credential read from the store right now.
    Connect { credential: Option<Credential> },
    /// The channel of `generation` is established.
    Opened { generation: ChannelGeneration },
    /// The channel of `generation` delivered a frame body.
    Frame {
        generation: ChannelGeneration,
        data: String,
    },
    /// The channel of `generation` failed or ended.
    ChannelFailed {
        generation: ChannelGeneration,
        error: ChannelError,
    },
    /// The reconnect timer `token` fired.
    RetryElapsed {
        token: RetryToken,
        credential: Option<Credential>,
    },
    /// Application shutdown.
    Teardown,
}

/// Work the driver must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new channel with `credential`, tagged `generation`.
    OpenChannel {
        generation: ChannelGeneration,
        credential: Credential,
    },
    /// Close the current channel.
    CloseChannel,
    /// Arm the reconnect timer.
    ArmRetry {
        token: RetryToken,
        delay: Duration,
        attempt: u32,
    },
    /// Cancel the pending reconnect timer.
    CancelRetry,
    /// Hand a decoded event to the bus.
    Publish(Event),
    /// A frame could not be decoded and was dropped.
    DropFrame(DecodeError),
}

/// The process-wide connection record.
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    attempt_count: u32,
    pending_retry: Option<RetryToken>,
    generation: ChannelGeneration,
    next_token: u64,
    backoff: ReconnectBackoff,
    torn_down: bool,
}

impl Connection {
    pub fn new(backoff: ReconnectBackoff) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempt_count: 0,
            pending_retry: None,
            generation: ChannelGeneration::default(),
            next_token: 0,
            backoff,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failures since the last successful open.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn pending_retry(&self) -> Option<RetryToken> {
        self.pending_retry
    }

    /// Generation of the current (or most recent) channel.
    pub fn generation(&self) -> ChannelGeneration {
        self.generation
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Whether a notification tagged `generation` concerns the live channel.
    pub fn is_current(&self, generation: ChannelGeneration) -> bool {
        !self.torn_down && generation == self.generation && self.state.has_live_channel()
    }

    /// Apply one input and return the effects to perform, in order.
    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }

        let mut effects = Vec::new();
        match input {
            Input::Connect { credential } => {
                if self.pending_retry.take().is_some() {
                    effects.push(Effect::CancelRetry);
                }
                self.connect(credential, &mut effects);
            }
            Input::Opened { generation } => {
                if self.is_current(generation) && self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                    self.attempt_count = 0;
                }
            }
            Input::Frame { generation, data } => {
                if self.is_current(generation) {
                    effects.push(match Event::decode(&data) {
                        Ok(event) => Effect::Publish(event),
                        Err(e) => Effect::DropFrame(e),
                    });
                }
            }
            Input::ChannelFailed { generation, .. } => {
                if self.is_current(generation) {
                    effects.push(Effect::CloseChannel);
                    self.state = ConnectionState::Errored;
                    self.schedule_retry(&mut effects);
                }
            }
            Input::RetryElapsed { token, credential } => {
                if self.pending_retry == Some(token) {
                    self.pending_retry = None;
                    self.connect(credential, &mut effects);
                }
            }
            Input::Teardown => {
                if self.pending_retry.take().is_some() {
                    effects.push(Effect::CancelRetry);
                }
                if self.state.has_live_channel() {
                    effects.push(Effect::CloseChannel);
                }
                self.state = ConnectionState::Idle;
                self.torn_down = true;
            }
        }
        effects
    }

    fn connect(&mut self, credential: Option<Credential>, effects: &mut Vec<Effect>) {
        // Close before reopen: at most one live channel
        if self.state.has_live_channel() {
            effects.push(Effect::CloseChannel);
        }

        match credential {
            None => {
                self.state = ConnectionState::Idle;
            }
            Some(credential) => {
                self.generation = ChannelGeneration(self.generation.0 + 1);
                self.state = ConnectionState::Connecting;
                effects.push(Effect::OpenChannel {
                    generation: self.generation,
                    credential,
                });
            }
        }
    }

    fn schedule_retry(&mut self, effects: &mut Vec<Effect>) {
        // Cancel before rearm: at most one pending timer
        if self.pending_retry.take().is_some() {
            effects.push(Effect::CancelRetry);
        }

        let delay = self.backoff.delay_for(self.attempt_count);
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.next_token += 1;
        let token = RetryToken(self.next_token);

        self.pending_retry = Some(token);
        self.state = ConnectionState::ReconnectScheduled;
        effects.push(Effect::ArmRetry {
            token,
            delay,
            attempt: self.attempt_count,
        });
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ReconnectBackoff::default())
    }
}
