//! # Tracefs Control Files
//!
//! Thin typed layer over the ftrace control files. Every write is logged at
//! debug level so a failing setup sequence can be replayed by hand.
//!
//! ## Files
//!
//! - `<root>/tracing_on`, `<root>/current_tracer`, `<root>/trace`
//! - `<root>/kprobe_events` - probe registration (append-only commands)
//! - `<root>/events/kprobes/enable` - enable flag of the whole kprobe group
//! - `<root>/events/<group>/<handle>/enable` - per-event enable flag
//! - `<root>/trace_pipe` - the live, consuming event stream
//! - `/proc/sys/kernel/ftrace_enabled` - global function tracer switch

pub mod controller;
pub mod tracer;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use ftrace_common::KPROBE_GROUP;
use log::debug;

use crate::domain::ControlError;
use crate::probes::{EventDescriptor, ProbeLayout};

pub use controller::Ftrace;
pub use tracer::NopTracer;

pub const DEFAULT_TRACING_ROOT: &str = "/sys/kernel/debug/tracing";
pub const DEFAULT_FTRACE_ENABLED: &str = "/proc/sys/kernel/ftrace_enabled";

/// Locations of the control files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPaths {
    pub tracing_root: PathBuf,
    pub ftrace_enabled: PathBuf,
}

impl Default for ControlPaths {
    fn default() -> Self {
        Self {
            tracing_root: PathBuf::from(DEFAULT_TRACING_ROOT),
            ftrace_enabled: PathBuf::from(DEFAULT_FTRACE_ENABLED),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TraceFs {
    paths: ControlPaths,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ControlError + '_ {
    move |source| ControlError::Io { path: path.to_path_buf(), source }
}

impl TraceFs {
    #[must_use]
    pub fn new(paths: ControlPaths) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn paths(&self) -> &ControlPaths {
        &self.paths
    }

    #[must_use]
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.paths.tracing_root.join(relative)
    }

    #[must_use]
    pub fn kprobe_events_path(&self) -> PathBuf {
        self.path("kprobe_events")
    }

    #[must_use]
    pub fn kprobe_group_enable_path(&self) -> PathBuf {
        self.path(Path::new("events").join(KPROBE_GROUP).join("enable"))
    }

    /// Enable file of one event: kprobes live in the kprobe group,
    /// tracepoints in their own subsystem
    #[must_use]
    pub fn enable_path(&self, event: &EventDescriptor) -> PathBuf {
        let group = match event.layout() {
            ProbeLayout::Tracepoint { subsystem } => subsystem.as_str(),
            ProbeLayout::PerRegister | ProbeLayout::Literal(_) => KPROBE_GROUP,
        };
        self.path(Path::new("events").join(group).join(event.handle()).join("enable"))
    }

    /// Replace the contents of a control file
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] if the file cannot be written.
    pub fn write_text(&self, path: &Path, text: &str) -> Result<(), ControlError> {
        debug!("writing {} <- {text:?}", path.display());
        fs::write(path, text).map_err(io_error(path))
    }

    /// Append one command to a control file
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] if the file cannot be opened or written.
    pub fn append_text(&self, path: &Path, text: &str) -> Result<(), ControlError> {
        debug!("appending {} <- {text:?}", path.display());
        let mut file = OpenOptions::new().append(true).open(path).map_err(io_error(path))?;
        writeln!(file, "{text}").map_err(io_error(path))
    }

    /// # Errors
    /// Returns [`ControlError::Io`] if the file cannot be read.
    pub fn read_text(&self, path: &Path) -> Result<String, ControlError> {
        fs::read_to_string(path).map_err(io_error(path))
    }

    /// # Errors
    /// Returns [`ControlError::Io`] if the file cannot be written.
    pub fn write_flag(&self, path: &Path, on: bool) -> Result<(), ControlError> {
        self.write_text(path, if on { "1" } else { "0" })
    }

    /// Read a boolean flag; accepts `1/0`, `true/false` and `yes/no`
    ///
    /// # Errors
    /// - [`ControlError::Io`] if the file cannot be read
    /// - [`ControlError::InvalidFlag`] if it holds anything else
    pub fn read_flag(&self, path: &Path) -> Result<bool, ControlError> {
        let value = self.read_text(path)?.trim().to_lowercase();
        match value.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ControlError::InvalidFlag { path: path.to_path_buf(), value }),
        }
    }

    /// Like [`TraceFs::read_flag`], but a missing file reads as `false`
    ///
    /// # Errors
    /// Same as [`TraceFs::read_flag`] for any failure other than a missing file.
    pub fn read_flag_or_false(&self, path: &Path) -> Result<bool, ControlError> {
        match self.read_flag(path) {
            Err(ControlError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(false),
            other => other,
        }
    }

    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn set_tracing_on(&self, on: bool) -> Result<(), ControlError> {
        self.write_flag(&self.path("tracing_on"), on)
    }

    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn set_ftrace_enabled(&self, on: bool) -> Result<(), ControlError> {
        self.write_flag(&self.paths.ftrace_enabled, on)
    }

    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn set_current_tracer(&self, name: &str) -> Result<(), ControlError> {
        self.write_text(&self.path("current_tracer"), name)
    }

    /// Empty the trace ring buffer
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn clear_trace(&self) -> Result<(), ControlError> {
        self.write_text(&self.path("trace"), "")
    }

    /// Toggle the whole kprobe group; no-op when the group does not exist yet
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn set_kprobe_group_enabled(&self, on: bool) -> Result<(), ControlError> {
        let path = self.kprobe_group_enable_path();
        if path.is_file() {
            self.write_flag(&path, on)?;
        }
        Ok(())
    }

    /// Remove every dynamic probe
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn clear_kprobes(&self) -> Result<(), ControlError> {
        self.write_text(&self.kprobe_events_path(), "")
    }

    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn register_probe(&self, definition: &str) -> Result<(), ControlError> {
        self.append_text(&self.kprobe_events_path(), definition)
    }

    /// # Errors
    /// Returns [`ControlError::Io`] on write failure.
    pub fn unregister_probe(&self, handle: &str) -> Result<(), ControlError> {
        self.append_text(&self.kprobe_events_path(), &format!("-:{KPROBE_GROUP}/{handle}"))
    }

    /// Whether `kprobe_events` lists a probe with this handle
    ///
    /// The listing is replayed in order, so a later `-:` removal cancels an
    /// earlier definition.
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] if `kprobe_events` cannot be read.
    pub fn is_probe_registered(&self, handle: &str) -> Result<bool, ControlError> {
        let listing = self.read_text(&self.kprobe_events_path())?;
        let suffix = format!("/{handle}");
        let mut registered = false;
        for head in listing.lines().filter_map(|line| line.split_whitespace().next()) {
            if !head.ends_with(&suffix) {
                continue;
            }
            registered = !head.starts_with('-');
        }
        Ok(registered)
    }

    /// Open the live trace stream
    ///
    /// # Errors
    /// Returns [`ControlError::Io`] if `trace_pipe` cannot be opened.
    pub fn open_pipe(&self) -> Result<BufReader<File>, ControlError> {
        let path = self.path("trace_pipe");
        let file = File::open(&path).map_err(io_error(&path))?;
        Ok(BufReader::new(file))
    }
}
