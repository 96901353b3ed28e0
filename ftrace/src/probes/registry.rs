//! Read-only lookup from probe handle to descriptor
//!
//! The registry is validated when it is built, so every probe definition it
//! hands out is known to render. After construction it never changes and can be
//! shared between parser instances behind an `Arc`.

use std::collections::HashMap;

use super::{builtin_events, EventDescriptor};
use crate::domain::{ConfigError, PointerWidth};

#[derive(Debug)]
pub struct EventRegistry {
    events: Vec<EventDescriptor>,
    by_handle: HashMap<String, usize>,
    pointer_width: PointerWidth,
}

impl EventRegistry {
    /// Validate and index a set of descriptors
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found: a duplicate handle, or a
    /// descriptor whose probe definition cannot be rendered.
    pub fn new(events: Vec<EventDescriptor>, pointer_width: PointerWidth) -> Result<Self, ConfigError> {
        let mut by_handle = HashMap::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            event.build_probe_definition(pointer_width)?;
            if by_handle.insert(event.handle().to_string(), index).is_some() {
                return Err(ConfigError::DuplicateHandle(event.handle().to_string()));
            }
        }

        Ok(Self { events, by_handle, pointer_width })
    }

    /// Registry of every built-in event
    ///
    /// `list_len` overrides the repetition count of events with list parameters.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if an override makes a descriptor invalid.
    pub fn builtin(pointer_width: PointerWidth, list_len: Option<usize>) -> Result<Self, ConfigError> {
        let events = builtin_events()
            .into_iter()
            .map(|event| match list_len {
                Some(len) if event.has_list_params() => event.with_list_len(len),
                _ => event,
            })
            .collect();
        Self::new(events, pointer_width)
    }

    #[must_use]
    pub fn lookup(&self, handle: &str) -> Option<&EventDescriptor> {
        self.by_handle.get(handle).map(|&index| &self.events[index])
    }

    /// Find an event by symbolic name or by handle
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&EventDescriptor> {
        self.events
            .iter()
            .find(|e| e.name() == name)
            .or_else(|| self.lookup(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.events.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer_width
    }

    /// Probe definition of one event (`None` for tracepoints)
    ///
    /// # Errors
    /// Unreachable for descriptors that passed [`EventRegistry::new`]; kept as a
    /// `Result` so callers never have to unwrap.
    pub fn probe_definition(&self, event: &EventDescriptor) -> Result<Option<String>, ConfigError> {
        event.build_probe_definition(self.pointer_width)
    }
}
