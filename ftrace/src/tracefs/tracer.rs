//! Tracer session over the `nop` tracer
//!
//! Owns the registry and the set of selected events. Probes are registered for
//! every descriptor, but only the selected ones are enabled.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};

use super::TraceFs;
use crate::domain::{ConfigError, ControlError};
use crate::probes::{EventDescriptor, EventRegistry};

#[derive(Debug)]
pub struct NopTracer {
    registry: Arc<EventRegistry>,
    selected: BTreeSet<String>,
    set_up: bool,
}

impl NopTracer {
    pub const NAME: &'static str = "nop";

    /// New session with every registry event selected
    #[must_use]
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        let selected = registry.iter().map(|e| e.handle().to_string()).collect();
        Self { registry, selected, set_up: false }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    /// Handles of the selected events
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_selected(&self, event: &EventDescriptor) -> bool {
        self.selected.contains(event.handle())
    }

    /// Replace the selection; an empty list selects everything
    ///
    /// When already set up, enablement is re-applied at once.
    ///
    /// # Errors
    /// - [`ConfigError::UnknownEvent`] if a name matches no event; the
    ///   selection is left unchanged
    /// - [`ControlError`] if re-applying enablement fails
    pub fn select<S: AsRef<str>>(&mut self, fs: &TraceFs, names: &[S]) -> Result<(), ControlError> {
        let selected = if names.is_empty() {
            self.registry.iter().map(|e| e.handle().to_string()).collect()
        } else {
            names
                .iter()
                .map(|name| {
                    let name = name.as_ref();
                    self.registry
                        .find(name)
                        .map(|e| e.handle().to_string())
                        .ok_or_else(|| ConfigError::UnknownEvent(name.to_string()))
                })
                .collect::<Result<BTreeSet<_>, _>>()?
        };

        self.selected = selected;
        debug!("selected events: {:?}", self.selected);
        if self.set_up {
            self.apply_selection(fs)?;
        }
        Ok(())
    }

    /// Register every probe, then enable exactly the selected events
    ///
    /// # Errors
    /// Returns [`ControlError`] on the first failing control-file access.
    pub fn setup(&mut self, fs: &TraceFs) -> Result<(), ControlError> {
        info!("Setting up {} tracer with {} events", Self::NAME, self.registry.len());
        for event in self.registry.iter() {
            self.register(fs, event)?;
        }
        self.apply_selection(fs)?;
        self.set_up = true;
        Ok(())
    }

    /// Disable every event, then unregister every probe
    ///
    /// # Errors
    /// Returns [`ControlError`] on the first failing control-file access.
    pub fn reset(&mut self, fs: &TraceFs) -> Result<(), ControlError> {
        info!("Resetting {} tracer", Self::NAME);
        for event in self.registry.iter() {
            if self.is_registered(fs, event)? && self.is_enabled(fs, event)? {
                self.set_enabled(fs, event, false)?;
            }
        }
        for event in self.registry.iter() {
            if !event.is_tracepoint() && self.is_registered(fs, event)? {
                self.unregister(fs, event)?;
            }
        }
        self.set_up = false;
        Ok(())
    }

    fn apply_selection(&self, fs: &TraceFs) -> Result<(), ControlError> {
        for event in self.registry.iter() {
            self.set_enabled(fs, event, self.is_selected(event))?;
        }
        Ok(())
    }

    /// Tracepoints always count as registered
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] if `kprobe_events` cannot be read.
    pub fn is_registered(&self, fs: &TraceFs, event: &EventDescriptor) -> Result<bool, ControlError> {
        if event.is_tracepoint() {
            return Ok(true);
        }
        fs.is_probe_registered(event.handle())
    }

    /// A missing enable file reads as disabled
    ///
    /// # Errors
    /// Returns [`ControlError`] if the enable file exists but cannot be read.
    pub fn is_enabled(&self, fs: &TraceFs, event: &EventDescriptor) -> Result<bool, ControlError> {
        fs.read_flag_or_false(&fs.enable_path(event))
    }

    /// Register the probe unless it already is
    ///
    /// # Errors
    /// Returns [`ControlError`] on control-file failure.
    pub fn register(&self, fs: &TraceFs, event: &EventDescriptor) -> Result<(), ControlError> {
        let Some(definition) = self.registry.probe_definition(event)? else {
            return Ok(());
        };
        if fs.is_probe_registered(event.handle())? {
            debug!("{} already registered", event.handle());
            return Ok(());
        }
        fs.register_probe(&definition)
    }

    /// # Errors
    /// [`ControlError::StillEnabled`] if the event is still enabled.
    pub fn unregister(&self, fs: &TraceFs, event: &EventDescriptor) -> Result<(), ControlError> {
        if event.is_tracepoint() {
            return Ok(());
        }
        if self.is_enabled(fs, event)? {
            return Err(ControlError::StillEnabled(event.handle().to_string()));
        }
        fs.unregister_probe(event.handle())
    }

    /// # Errors
    /// [`ControlError::NotRegistered`] if the probe has not been registered.
    pub fn set_enabled(&self, fs: &TraceFs, event: &EventDescriptor, on: bool) -> Result<(), ControlError> {
        if !self.is_registered(fs, event)? {
            return Err(ControlError::NotRegistered(event.handle().to_string()));
        }
        fs.write_flag(&fs.enable_path(event), on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PointerWidth;
    use crate::probes::ParameterKind;
    use crate::tracefs::ControlPaths;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, TraceFs, NopTracer) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("kprobe_events"), "").unwrap();
        for enable_dir in ["events/kprobes/sys_close_kprobe", "events/kprobes/sys_umask_kprobe", "events/sched/sched_process_fork"] {
            fs::create_dir_all(root.join(enable_dir)).unwrap();
        }

        let events = vec![
            EventDescriptor::kprobe("sys_close").param("fd", ParameterKind::UnsignedInt),
            EventDescriptor::kprobe("sys_umask").param("mask", ParameterKind::Int),
            EventDescriptor::tracepoint("sched", "sched_process_fork"),
        ];
        let registry = Arc::new(EventRegistry::new(events, PointerWidth::Eight).unwrap());
        let paths = ControlPaths { tracing_root: root.to_path_buf(), ftrace_enabled: root.join("ftrace_enabled") };
        (dir, TraceFs::new(paths), NopTracer::new(registry))
    }

    fn enabled(dir: &tempfile::TempDir, relative: &str) -> String {
        fs::read_to_string(dir.path().join(relative).join("enable")).unwrap()
    }

    #[test]
    fn test_setup_enables_only_selection() {
        let (dir, fs, mut tracer) = fixture();
        tracer.select(&fs, &["sys_close"]).unwrap();
        tracer.setup(&fs).unwrap();

        assert!(tracer.is_set_up());
        let listing = std::fs::read_to_string(dir.path().join("kprobe_events")).unwrap();
        assert_eq!(listing.lines().count(), 2);
        assert_eq!(enabled(&dir, "events/kprobes/sys_close_kprobe"), "1");
        assert_eq!(enabled(&dir, "events/kprobes/sys_umask_kprobe"), "0");
        assert_eq!(enabled(&dir, "events/sched/sched_process_fork"), "0");
    }

    #[test]
    fn test_setup_twice_registers_once() {
        let (dir, fs, mut tracer) = fixture();
        tracer.setup(&fs).unwrap();
        tracer.setup(&fs).unwrap();
        let listing = std::fs::read_to_string(dir.path().join("kprobe_events")).unwrap();
        assert_eq!(listing.lines().count(), 2);
    }

    #[test]
    fn test_reselect_while_set_up() {
        let (dir, fs, mut tracer) = fixture();
        tracer.setup(&fs).unwrap();
        tracer.select(&fs, &["sched_process_fork"]).unwrap();
        assert_eq!(enabled(&dir, "events/kprobes/sys_close_kprobe"), "0");
        assert_eq!(enabled(&dir, "events/sched/sched_process_fork"), "1");
    }

    #[test]
    fn test_unknown_selection_keeps_previous() {
        let (_dir, fs, mut tracer) = fixture();
        tracer.select(&fs, &["sys_close"]).unwrap();
        let err = tracer.select(&fs, &["sys_close", "sys_bogus"]).unwrap_err();
        assert!(matches!(err, ControlError::Config(ConfigError::UnknownEvent(ref name)) if name == "sys_bogus"));
        assert_eq!(tracer.selected().collect::<Vec<_>>(), ["sys_close_kprobe"]);
    }

    #[test]
    fn test_enable_requires_registration() {
        let (_dir, fs, tracer) = fixture();
        let close = tracer.registry().find("sys_close").unwrap();
        let err = tracer.set_enabled(&fs, &close, true).unwrap_err();
        assert!(matches!(err, ControlError::NotRegistered(_)));
    }

    #[test]
    fn test_unregister_requires_disabled() {
        let (_dir, fs, mut tracer) = fixture();
        tracer.setup(&fs).unwrap();
        let close = tracer.registry().find("sys_close").unwrap();
        let err = tracer.unregister(&fs, &close).unwrap_err();
        assert!(matches!(err, ControlError::StillEnabled(_)));
    }

    #[test]
    fn test_reset_disables_then_unregisters() {
        let (dir, fs, mut tracer) = fixture();
        tracer.setup(&fs).unwrap();
        tracer.reset(&fs).unwrap();

        assert!(!tracer.is_set_up());
        assert_eq!(enabled(&dir, "events/kprobes/sys_close_kprobe"), "0");
        let listing = std::fs::read_to_string(dir.path().join("kprobe_events")).unwrap();
        let removals: Vec<_> = listing.lines().filter(|l| l.starts_with("-:")).collect();
        assert_eq!(removals, ["-:kprobes/sys_close_kprobe", "-:kprobes/sys_umask_kprobe"]);
    }
}
