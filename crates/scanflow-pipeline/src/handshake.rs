//! The valid/ready flow-control contract between adjacent stages.
//!
//! A transfer happens on a tick where the producer's token is valid and the
//! consumer is ready. While the consumer is not ready, the producer holds
//! its token unchanged. Every stage in this crate is always ready when its
//! consumer is, so backpressure propagates upstream on the same tick.

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Whether `token` is transferred on a tick where the consumer drives
/// `ready`.
#[must_use]
pub const fn transfers(token: Token, ready: bool) -> bool {
    token.valid && ready
}

/// Consumer-side readiness pattern, evaluated once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backpressure {
    /// Ready on every tick.
    #[default]
    Always,
    /// Not ready on every `period`-th tick (ticks `period - 1`,
    /// `2 * period - 1`, ...). A period of 0 or 1 is treated as never
    /// ready on odd ticks, i.e. ready every other tick.
    StallEvery {
        /// Stall period in ticks.
        period: u64,
    },
    /// Repeat an explicit ready/not-ready pattern. An empty pattern means
    /// always ready.
    Pattern {
        /// Per-tick readiness, repeated.
        ready: Vec<bool>,
    },
}

impl Backpressure {
    /// Whether the pattern is ready on at least one tick.
    #[must_use]
    pub fn ever_ready(&self) -> bool {
        match self {
            Self::Always | Self::StallEvery { .. } => true,
            Self::Pattern { ready } => ready.is_empty() || ready.contains(&true),
        }
    }

    /// Readiness on the given tick.
    #[must_use]
    pub fn ready(&self, tick: u64) -> bool {
        match self {
            Self::Always => true,
            Self::StallEvery { period } => {
                let period = (*period).max(2);
                tick % period != period - 1
            }
            Self::Pattern { ready } => {
                if ready.is_empty() {
                    return true;
                }
                let len = ready.len() as u64;
                ready[usize::try_from(tick % len).unwrap_or(0)]
            }
        }
    }
}

/// Upstream source of a token stream that honors the handshake contract.
///
/// The current token stays presented until it is transferred. Invalid
/// tokens in the source sequence are bubbles: they occupy one tick and are
/// replaced on the next tick whether or not the consumer was ready.
#[derive(Debug)]
pub struct Producer<I: Iterator<Item = Token>> {
    source: I,
    current: Token,
    sent: u64,
    exhausted: bool,
}

impl<I: Iterator<Item = Token>> Producer<I> {
    /// Create a producer over a token sequence.
    pub fn new(source: impl IntoIterator<IntoIter = I>) -> Self {
        let mut source = source.into_iter();
        let (current, exhausted) = source
            .next()
            .map_or((Token::BUBBLE, true), |token| (token, false));
        Self {
            source,
            current,
            sent: 0,
            exhausted,
        }
    }

    /// The token presented downstream on this tick.
    #[must_use]
    pub const fn output(&self) -> Token {
        self.current
    }

    /// Number of valid tokens transferred so far.
    #[must_use]
    pub const fn sent(&self) -> u64 {
        self.sent
    }

    /// Whether the source is drained and nothing is left to present.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.exhausted && !self.current.valid
    }

    /// Advance one tick given the consumer's readiness.
    pub fn tick(&mut self, ready: bool) {
        if transfers(self.current, ready) {
            self.sent += 1;
        } else if self.current.valid {
            return;
        }
        if self.exhausted {
            self.current = Token::BUBBLE;
            return;
        }
        match self.source.next() {
            Some(token) => self.current = token,
            None => {
                self.current = Token::BUBBLE;
                self.exhausted = true;
            }
        }
    }
}

/// Downstream end of a stream: records every transferred token.
#[derive(Debug, Default, Clone)]
pub struct Sink {
    received: Vec<Token>,
}

impl Sink {
    /// Create an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            received: Vec::new(),
        }
    }

    /// Observe the token presented on this tick; keep it if it transfers.
    pub fn tick(&mut self, token: Token, ready: bool) {
        if transfers(token, ready) {
            self.received.push(token);
        }
    }

    /// All tokens received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> &[Token] {
        &self.received
    }

    /// Consume the sink, returning the received tokens.
    #[must_use]
    pub fn into_tokens(self) -> Vec<Token> {
        self.received
    }
}
