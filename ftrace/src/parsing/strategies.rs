//! # Parsing Strategies
//!
//! Each descriptor names the strategy that turns its accumulated text into
//! positional tokens and then into a [`ParsedEvent`]. The line parser owns the
//! token-count bookkeeping; strategies only know their grammar.
//!
//! - [`StandardStrategy`]: `(symbol) argN=value` lines of ordinary kprobes
//! - [`ForkStrategy`]: the `sched_process_fork` tracepoint format
//! - [`SocketAddressStrategy`]: kprobes whose raw integers decode to one address

use std::fmt;

use ftrace_common::FIELD_ADDRESS;

use super::grammar;
use crate::domain::DecodeError;
use crate::event::{ParsedEvent, Value};
use crate::probes::param_kind::parse_integer;
use crate::probes::{EventDescriptor, STANDARD_FIELDS};
use crate::sockaddr::{self, AddressInfo};

pub static STANDARD: StandardStrategy = StandardStrategy;
pub static FORK: ForkStrategy = ForkStrategy;
pub static SOCKET_ADDRESS: SocketAddressStrategy = SocketAddressStrategy;

/// Turns the accumulated text of one event into a decoded event
pub trait LineStrategy: fmt::Debug + Send + Sync {
    /// Split the text into standard-field tokens followed by parameter tokens
    ///
    /// Returns `None` while the text does not match the grammar yet.
    fn tokenize(&self, event: &EventDescriptor, text: &str) -> Option<Vec<String>>;

    /// Whether a token list of exactly the expected length is ready to decode
    fn is_complete(&self, _event: &EventDescriptor, _tokens: &[String]) -> bool {
        true
    }

    /// Whether the grammar always fits on one physical line
    ///
    /// Text that fails to tokenize is then malformed rather than incomplete.
    fn is_single_line(&self) -> bool {
        false
    }

    /// Convert accepted tokens into typed fields
    ///
    /// # Errors
    /// Returns [`DecodeError`] when a token does not match its declared kind.
    fn assemble(&self, event: &EventDescriptor, tokens: Vec<String>)
        -> Result<ParsedEvent, DecodeError>;
}

/// Decode the standard fields from the front of `tokens`
fn push_standard_fields(
    parsed: &mut ParsedEvent,
    tokens: &mut impl Iterator<Item = String>,
) -> Result<(), DecodeError> {
    for (name, kind) in STANDARD_FIELDS {
        let token = tokens.next().unwrap_or_default();
        parsed.push(name, kind.decode(&token)?);
    }
    Ok(())
}

/// Decode standard fields then every traced parameter in declaration order
///
/// List parameters consume `list_len` consecutive tokens.
fn decode_declared(event: &EventDescriptor, tokens: Vec<String>) -> Result<ParsedEvent, DecodeError> {
    let mut tokens = tokens.into_iter();
    let mut parsed = ParsedEvent::new();
    push_standard_fields(&mut parsed, &mut tokens)?;

    for (name, kind) in event.traced_params() {
        let value = if kind.is_list() {
            let items = tokens
                .by_ref()
                .take(event.list_len())
                .map(|token| kind.decode(&token))
                .collect::<Result<Vec<_>, _>>()?;
            Value::List(items)
        } else {
            kind.decode(&tokens.next().unwrap_or_default())?
        };
        parsed.push(name, value);
    }

    Ok(parsed)
}

fn standard_tokens(text: &str) -> Option<Vec<String>> {
    let (fields, args_start) = grammar::standard_fields(text)?;
    let mut tokens = fields.into_tokens();
    tokens.extend(grammar::arg_values(&text[args_start..]).into_iter().map(str::to_string));
    Some(tokens)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStrategy;

impl LineStrategy for StandardStrategy {
    fn tokenize(&self, _event: &EventDescriptor, text: &str) -> Option<Vec<String>> {
        standard_tokens(text)
    }

    /// A trailing string argument must have its closing delimiter
    fn is_complete(&self, event: &EventDescriptor, tokens: &[String]) -> bool {
        let last_is_string = event.traced_params().last().is_some_and(|(_, kind)| kind.is_string_like());
        if !last_is_string {
            return true;
        }
        tokens
            .get(STANDARD_FIELDS.len()..)
            .and_then(<[String]>::last)
            .is_some_and(|last| grammar::is_delimited(last))
    }

    fn assemble(
        &self,
        event: &EventDescriptor,
        mut tokens: Vec<String>,
    ) -> Result<ParsedEvent, DecodeError> {
        for token in tokens.iter_mut().skip(STANDARD_FIELDS.len()) {
            *token = grammar::unquote(token).to_string();
        }
        decode_declared(event, tokens)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForkStrategy;

impl LineStrategy for ForkStrategy {
    fn tokenize(&self, _event: &EventDescriptor, text: &str) -> Option<Vec<String>> {
        let fields = grammar::fork_fields(text)?;
        Some(vec![
            fields.comm.to_string(),
            fields.pid.to_string(),
            fields.timestamp.to_string(),
            fields.handle.to_string(),
            // the tracepoint has no separate symbol
            fields.handle.to_string(),
            fields.child_comm.to_string(),
            fields.child_pid.to_string(),
        ])
    }

    fn is_single_line(&self) -> bool {
        true
    }

    fn assemble(&self, event: &EventDescriptor, tokens: Vec<String>) -> Result<ParsedEvent, DecodeError> {
        decode_declared(event, tokens)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SocketAddressStrategy;

impl LineStrategy for SocketAddressStrategy {
    fn tokenize(&self, _event: &EventDescriptor, text: &str) -> Option<Vec<String>> {
        standard_tokens(text)
    }

    fn assemble(&self, event: &EventDescriptor, tokens: Vec<String>) -> Result<ParsedEvent, DecodeError> {
        let mut tokens = tokens.into_iter();
        let mut parsed = ParsedEvent::new();
        push_standard_fields(&mut parsed, &mut tokens)?;

        let mut raw = Vec::new();
        for ((name, kind), token) in event.traced_params().zip(tokens) {
            let value = parse_integer(&token).ok_or_else(|| DecodeError::new(kind, token.as_str()))?;
            raw.push((name, kind, value));
        }

        let info = AddressInfo::from_named(raw)?;
        parsed.push(FIELD_ADDRESS, Value::Address(sockaddr::resolve(&info)));
        Ok(parsed)
    }
}
