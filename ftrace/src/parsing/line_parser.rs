//! # Trace Line Parser
//!
//! Rebuilds one logical event from a live, append-only line stream.
//!
//! The kernel may split one event over several physical lines when argument
//! text is long, so every line is appended to a private accumulator until the
//! matched descriptor's strategy yields exactly the expected number of tokens.
//!
//! ## Outcomes per line
//!
//! - fewer tokens than expected → [`Ingested::Incomplete`], keep accumulating
//! - unknown probe handle → [`Anomaly::UnknownEvent`], accumulator discarded
//! - more tokens than expected → [`Anomaly::Overflow`], accumulator discarded
//! - text that can no longer match its grammar → [`Anomaly::Malformed`],
//!   accumulator discarded up to the next line header
//! - exact count → [`Ingested::Event`], accumulator cleared
//!
//! A parser is not meant to be shared between readers; give every stream its
//! own instance. The registry behind it is read-only and can be shared.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use super::grammar;
use crate::domain::DecodeError;
use crate::event::ParsedEvent;
use crate::probes::EventRegistry;

/// Non-fatal stream conditions; the accumulator is discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    UnknownEvent { handle: String },
    Overflow { handle: String, expected: usize, found: usize },
    Malformed { handle: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UnknownEvent { handle } => write!(f, "unknown event {handle}"),
            Anomaly::Overflow { handle, expected, found } => {
                write!(f, "{handle}: expected {expected} tokens, found {found}")
            }
            Anomaly::Malformed { handle } => write!(f, "{handle}: line does not match its grammar"),
        }
    }
}

/// Result of feeding one physical line
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Event(ParsedEvent),
    Incomplete,
    Discarded(Anomaly),
}

/// Per-parser counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub lines: usize,
    pub events: usize,
    pub unknown_events: usize,
    pub overflows: usize,
    pub malformed: usize,
    pub decode_errors: usize,
}

pub struct LineParser {
    registry: Arc<EventRegistry>,
    buffer: String,
    pub stats: ParserStats,
}

impl LineParser {
    #[must_use]
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self { registry, buffer: String::new(), stats: ParserStats::default() }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Text accumulated so far that has not formed an event yet
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feed one physical line (its line terminator is ignored)
    ///
    /// # Errors
    /// Returns [`DecodeError`] when a complete line holds a token that does not
    /// match its declared kind. The accumulator is cleared first, so the next
    /// line starts fresh.
    pub fn ingest(&mut self, raw: impl AsRef<[u8]>) -> Result<Ingested, DecodeError> {
        let line = String::from_utf8_lossy(raw.as_ref());
        let line = line.trim_end_matches(['\n', '\r']);
        debug!("ingesting line: {line}");

        self.stats.lines += 1;
        self.buffer.push_str(line);
        self.decode_pending()
    }

    fn decode_pending(&mut self) -> Result<Ingested, DecodeError> {
        let Some(handle) = grammar::probe_handle(&self.buffer) else {
            return Ok(Ingested::Incomplete);
        };

        let Some(event) = self.registry.lookup(handle) else {
            let anomaly = Anomaly::UnknownEvent { handle: handle.to_string() };
            return Ok(self.discard(anomaly));
        };

        let strategy = event.strategy();
        let Some(tokens) = strategy.tokenize(event, &self.buffer) else {
            let anomaly = Anomaly::Malformed { handle: event.handle().to_string() };
            if strategy.is_single_line() {
                return Ok(self.discard(anomaly));
            }
            // a later header means the earlier line will never complete
            let Some(start) = grammar::next_line_start(&self.buffer) else {
                return Ok(Ingested::Incomplete);
            };
            let rest = self.buffer.split_off(start);
            self.discard(anomaly);
            self.buffer = rest;
            return self.decode_pending();
        };

        let expected = event.expected_token_count();
        match tokens.len().cmp(&expected) {
            Ordering::Less => Ok(Ingested::Incomplete),
            Ordering::Greater => {
                let anomaly = Anomaly::Overflow {
                    handle: event.handle().to_string(),
                    expected,
                    found: tokens.len(),
                };
                Ok(self.discard(anomaly))
            }
            Ordering::Equal if !strategy.is_complete(event, &tokens) => Ok(Ingested::Incomplete),
            Ordering::Equal => {
                let decoded = strategy.assemble(event, tokens);
                self.buffer.clear();
                match decoded {
                    Ok(parsed) => {
                        self.stats.events += 1;
                        Ok(Ingested::Event(parsed))
                    }
                    Err(e) => {
                        self.stats.decode_errors += 1;
                        Err(e)
                    }
                }
            }
        }
    }

    fn discard(&mut self, anomaly: Anomaly) -> Ingested {
        warn!("Discarding trace data ({anomaly}): {}", self.buffer);
        match anomaly {
            Anomaly::UnknownEvent { .. } => self.stats.unknown_events += 1,
            Anomaly::Overflow { .. } => self.stats.overflows += 1,
            Anomaly::Malformed { .. } => self.stats.malformed += 1,
        }
        self.buffer.clear();
        Ingested::Discarded(anomaly)
    }
}
