//! # Event Descriptors
//!
//! One [`EventDescriptor`] per traceable kernel event. A descriptor declares the
//! ordered parameter list, the repetition count used by list parameters, the
//! way its probe is defined and the strategy that turns its trace lines into
//! tokens.
//!
//! ## Probe Layouts
//!
//! - [`ProbeLayout::PerRegister`]: parameter `n` reads register `n`, rendered
//!   through the parameter catalog
//! - [`ProbeLayout::Literal`]: hand-written fetch arguments, for events that read
//!   many differently-typed values out of one register's memory block
//! - [`ProbeLayout::Tracepoint`]: a static kernel tracepoint; nothing to register

use ftrace_common::{
    Register, FIELD_CALLER_NAME, FIELD_CALLER_PID, FIELD_PROBE_HANDLE, FIELD_SYMBOL,
    FIELD_TIMESTAMP, KPROBE_GROUP, PROBE_HANDLE_SUFFIX,
};

use super::ParameterKind;
use crate::domain::{ConfigError, PointerWidth};
use crate::parsing::strategies::{LineStrategy, STANDARD};

/// Standard fields with the kind each one decodes as
pub const STANDARD_FIELDS: [(&str, ParameterKind); 5] = [
    (FIELD_CALLER_NAME, ParameterKind::String),
    (FIELD_CALLER_PID, ParameterKind::Pid),
    (FIELD_TIMESTAMP, ParameterKind::Float),
    (FIELD_PROBE_HANDLE, ParameterKind::String),
    (FIELD_SYMBOL, ParameterKind::String),
];

/// Repetition count used when a descriptor does not set one
pub const DEFAULT_LIST_LEN: usize = 3;

/// One declared parameter; `kind == None` marks an untraced argument
///
/// Untraced arguments still occupy their register position, so the arguments
/// after them bind to the right register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: Option<ParameterKind>,
}

/// How an event's probe definition is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeLayout {
    PerRegister,
    Literal(String),
    Tracepoint { subsystem: String },
}

#[derive(Debug, Clone)]
pub struct EventDescriptor {
    name: String,
    handle: String,
    params: Vec<Param>,
    list_len: usize,
    layout: ProbeLayout,
    strategy: &'static dyn LineStrategy,
}

impl EventDescriptor {
    /// Kprobe on the kernel symbol `name`, handle `<name>_kprobe`
    #[must_use]
    pub fn kprobe(name: &str) -> Self {
        Self {
            name: name.to_string(),
            handle: format!("{name}{PROBE_HANDLE_SUFFIX}"),
            params: Vec::new(),
            list_len: DEFAULT_LIST_LEN,
            layout: ProbeLayout::PerRegister,
            strategy: &STANDARD,
        }
    }

    /// Static tracepoint `subsystem/name`; the handle is the tracepoint name
    #[must_use]
    pub fn tracepoint(subsystem: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            handle: name.to_string(),
            params: Vec::new(),
            list_len: DEFAULT_LIST_LEN,
            layout: ProbeLayout::Tracepoint { subsystem: subsystem.to_string() },
            strategy: &STANDARD,
        }
    }

    #[must_use]
    pub fn param(mut self, name: &str, kind: ParameterKind) -> Self {
        self.params.push(Param { name: name.to_string(), kind: Some(kind) });
        self
    }

    #[must_use]
    pub fn untraced(mut self, name: &str) -> Self {
        self.params.push(Param { name: name.to_string(), kind: None });
        self
    }

    #[must_use]
    pub fn with_list_len(mut self, list_len: usize) -> Self {
        self.list_len = list_len;
        self
    }

    /// Replace the per-register mapping with hand-written fetch arguments
    #[must_use]
    pub fn with_literal_probe(mut self, args: &str) -> Self {
        self.layout = ProbeLayout::Literal(args.to_string());
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: &'static dyn LineStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Parameters that produce a token, in declaration order
    pub fn traced_params(&self) -> impl Iterator<Item = (&str, ParameterKind)> {
        self.params.iter().filter_map(|p| p.kind.map(|kind| (p.name.as_str(), kind)))
    }

    #[must_use]
    pub fn list_len(&self) -> usize {
        self.list_len
    }

    #[must_use]
    pub fn layout(&self) -> &ProbeLayout {
        &self.layout
    }

    #[must_use]
    pub fn strategy(&self) -> &'static dyn LineStrategy {
        self.strategy
    }

    #[must_use]
    pub fn has_list_params(&self) -> bool {
        self.traced_params().any(|(_, kind)| kind.is_list())
    }

    #[must_use]
    pub fn is_tracepoint(&self) -> bool {
        matches!(self.layout, ProbeLayout::Tracepoint { .. })
    }

    /// Number of tokens a complete trace line of this event yields
    ///
    /// Standard fields, plus one per scalar parameter, plus `list_len` per
    /// list parameter. Untraced parameters yield nothing.
    #[must_use]
    pub fn expected_token_count(&self) -> usize {
        STANDARD_FIELDS.len()
            + self
                .traced_params()
                .map(|(_, kind)| if kind.is_list() { self.list_len } else { 1 })
                .sum::<usize>()
    }

    /// Probe definition to append to `kprobe_events`
    ///
    /// Returns `None` for tracepoints, which need no registration.
    ///
    /// # Errors
    /// - [`ConfigError::TooManyParameters`] when the parameters outnumber the registers
    /// - [`ConfigError::ZeroListLength`] when list parameters would render nothing
    /// - [`ConfigError::NotProbeable`] when a parameter kind has no fetch template
    pub fn build_probe_definition(
        &self,
        width: PointerWidth,
    ) -> Result<Option<String>, ConfigError> {
        let args = match &self.layout {
            ProbeLayout::Tracepoint { .. } => return Ok(None),
            ProbeLayout::Literal(args) => args.clone(),
            ProbeLayout::PerRegister => self.render_register_args(width)?,
        };

        let mut definition = format!("p:{KPROBE_GROUP}/{} {}", self.handle, self.name);
        if !args.is_empty() {
            definition.push(' ');
            definition.push_str(&args);
        }
        Ok(Some(definition))
    }

    fn render_register_args(&self, width: PointerWidth) -> Result<String, ConfigError> {
        if self.params.len() > Register::ALL.len() {
            return Err(ConfigError::TooManyParameters {
                event: self.name.clone(),
                params: self.params.len(),
                registers: Register::ALL.len(),
            });
        }
        if self.list_len == 0 && self.has_list_params() {
            return Err(ConfigError::ZeroListLength(self.name.clone()));
        }

        let mut args = Vec::with_capacity(self.params.len());
        for (param, register) in self.params.iter().zip(Register::ALL) {
            if let Some(kind) = param.kind {
                args.push(kind.render_probe_arguments(register, self.list_len, width)?);
            }
        }
        Ok(args.join(" "))
    }
}
