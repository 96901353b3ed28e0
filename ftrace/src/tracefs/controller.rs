//! Global ftrace controller
//!
//! Brings the tracing subsystem to a known state around a tracer session.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use log::{info, warn};

use super::{ControlPaths, NopTracer, TraceFs};
use crate::domain::ControlError;
use crate::parsing::LineParser;
use crate::probes::EventRegistry;
use crate::stream::EventStream;

#[derive(Debug)]
pub struct Ftrace {
    fs: TraceFs,
    tracer: NopTracer,
}

impl Ftrace {
    #[must_use]
    pub fn new(paths: ControlPaths, registry: Arc<EventRegistry>) -> Self {
        Self { fs: TraceFs::new(paths), tracer: NopTracer::new(registry) }
    }

    #[must_use]
    pub fn fs(&self) -> &TraceFs {
        &self.fs
    }

    #[must_use]
    pub fn tracer(&self) -> &NopTracer {
        &self.tracer
    }

    /// Choose the events to enable; see [`NopTracer::select`]
    ///
    /// # Errors
    /// Returns [`ControlError`] for unknown names or control-file failures.
    pub fn select<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ControlError> {
        self.tracer.select(&self.fs, names)
    }

    /// Tear everything down: tracer, switches, buffer and every kprobe
    ///
    /// # Errors
    /// Returns [`ControlError`] on the first failing control-file access.
    pub fn reset(&mut self) -> Result<(), ControlError> {
        info!("Resetting ftrace");
        self.tracer.reset(&self.fs)?;
        self.fs.set_tracing_on(false)?;
        self.fs.set_ftrace_enabled(false)?;
        self.fs.clear_trace()?;
        self.fs.set_kprobe_group_enabled(false)?;
        self.fs.clear_kprobes()?;
        self.fs.set_kprobe_group_enabled(true)?;
        Ok(())
    }

    /// Switch tracing on and set up the tracer session
    ///
    /// # Errors
    /// Returns [`ControlError`] on the first failing control-file access.
    pub fn setup(&mut self) -> Result<(), ControlError> {
        info!("Setting up ftrace");
        self.fs.set_current_tracer(NopTracer::NAME)?;
        self.fs.set_ftrace_enabled(true)?;
        self.fs.set_tracing_on(true)?;
        self.tracer.setup(&self.fs)
    }

    /// Reset after a session, whatever its outcome
    ///
    /// A failing reset is only logged when the session already failed.
    ///
    /// # Errors
    /// The session's error, otherwise the reset's [`ControlError`].
    pub fn conclude<T, E: From<ControlError>>(&mut self, outcome: Result<T, E>) -> Result<T, E> {
        info!("Restoring tracefs");
        let reset = self.reset();
        match outcome {
            Ok(value) => reset.map(|()| value).map_err(E::from),
            Err(e) => {
                if let Err(reset_err) = reset {
                    warn!("Failed to reset ftrace: {reset_err}");
                }
                Err(e)
            }
        }
    }

    /// Decoded events from `trace_pipe`
    ///
    /// # Errors
    /// - [`ControlError::NotSetUp`] before [`Ftrace::setup`]
    /// - [`ControlError::Io`] if the pipe cannot be opened
    pub fn event_stream(&self) -> Result<EventStream<BufReader<File>>, ControlError> {
        if !self.tracer.is_set_up() {
            return Err(ControlError::NotSetUp);
        }
        let parser = LineParser::new(Arc::clone(self.tracer.registry()));
        Ok(EventStream::new(self.fs.open_pipe()?, parser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PointerWidth;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, Ftrace) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("kprobe_events"), "").unwrap();
        fs::create_dir_all(root.join("events/kprobes")).unwrap();
        fs::write(root.join("events/kprobes/enable"), "1").unwrap();

        let registry = Arc::new(EventRegistry::builtin(PointerWidth::Eight, None).unwrap());
        for event in registry.iter() {
            fs::create_dir_all(TraceFs::new(paths(root)).enable_path(event).parent().unwrap()).unwrap();
        }
        let ftrace = Ftrace::new(paths(root), registry);
        (dir, ftrace)
    }

    fn paths(root: &std::path::Path) -> ControlPaths {
        ControlPaths { tracing_root: root.to_path_buf(), ftrace_enabled: root.join("ftrace_enabled") }
    }

    fn read(dir: &tempfile::TempDir, relative: &str) -> String {
        fs::read_to_string(dir.path().join(relative)).unwrap()
    }

    #[test]
    fn test_setup_switches_on() {
        let (dir, mut ftrace) = fixture();
        ftrace.select(&["sys_kill"]).unwrap();
        ftrace.setup().unwrap();

        assert_eq!(read(&dir, "current_tracer"), "nop");
        assert_eq!(read(&dir, "tracing_on"), "1");
        assert_eq!(read(&dir, "ftrace_enabled"), "1");
        assert_eq!(read(&dir, "events/kprobes/sys_kill_kprobe/enable"), "1");
        assert_eq!(read(&dir, "events/kprobes/sys_close_kprobe/enable"), "0");
        assert!(read(&dir, "kprobe_events").contains("p:kprobes/sys_kill_kprobe sys_kill %di:u32 %si:s32"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let (dir, mut ftrace) = fixture();
        ftrace.setup().unwrap();
        ftrace.reset().unwrap();

        assert_eq!(read(&dir, "tracing_on"), "0");
        assert_eq!(read(&dir, "ftrace_enabled"), "0");
        assert_eq!(read(&dir, "trace"), "");
        assert_eq!(read(&dir, "kprobe_events"), "");
        assert_eq!(read(&dir, "events/kprobes/enable"), "1");
        assert!(!ftrace.tracer().is_set_up());
    }

    #[test]
    fn test_failed_setup_is_rolled_back() {
        let (dir, mut ftrace) = fixture();
        fs::remove_dir_all(dir.path().join("events/kprobes/sys_kill_kprobe")).unwrap();

        let outcome = ftrace.setup();
        assert_eq!(read(&dir, "tracing_on"), "1");
        let err = ftrace.conclude(outcome).unwrap_err();
        assert!(matches!(err, ControlError::Io { ref path, .. } if path.ends_with("sys_kill_kprobe/enable")));

        assert_eq!(read(&dir, "tracing_on"), "0");
        assert_eq!(read(&dir, "ftrace_enabled"), "0");
        assert_eq!(read(&dir, "kprobe_events"), "");
        assert!(!ftrace.tracer().is_set_up());
    }

    #[test]
    fn test_failed_session_keeps_its_error() {
        let (dir, mut ftrace) = fixture();
        ftrace.setup().unwrap();

        let outcome: anyhow::Result<u64> = Err(anyhow::anyhow!("stdout closed"));
        let err = ftrace.conclude(outcome).unwrap_err();
        assert_eq!(err.to_string(), "stdout closed");
        assert_eq!(read(&dir, "tracing_on"), "0");
        assert_eq!(read(&dir, "kprobe_events"), "");

        ftrace.setup().unwrap();
        assert_eq!(ftrace.conclude(Ok::<_, ControlError>(7)).unwrap(), 7);
        assert_eq!(read(&dir, "tracing_on"), "0");
    }

    #[test]
    fn test_stream_requires_setup() {
        let (dir, mut ftrace) = fixture();
        assert!(matches!(ftrace.event_stream(), Err(ControlError::NotSetUp)));

        fs::write(
            dir.path().join("trace_pipe"),
            "  bash-7 [000] .... 5.5: sys_kill_kprobe: (sys_kill+0x0/0x20) arg1=8 arg2=15\n",
        )
        .unwrap();
        ftrace.setup().unwrap();
        let events: Vec<_> = ftrace.event_stream().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].probe_handle(), Some("sys_kill_kprobe"));
    }
}
