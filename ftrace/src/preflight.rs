//! Pre-flight checks for ftrace
//!
//! Validates system requirements before touching any control file.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Result};
use std::path::Path;

use crate::tracefs::ControlPaths;

/// Run all pre-flight checks before writing to tracefs
pub fn run_preflight_checks(paths: &ControlPaths) -> Result<()> {
    check_privileges()?;
    check_tracefs(&paths.tracing_root)?;
    check_ftrace_switch(&paths.ftrace_enabled)?;
    Ok(())
}

/// Check if running with sufficient privileges to write tracefs
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: ftrace requires root privileges to register kprobes.\n\n\
         Run with: sudo ftrace ..."
    );
}

/// Check that the tracing root is mounted and supports dynamic probes
fn check_tracefs(root: &Path) -> Result<()> {
    if !root.is_dir() {
        bail!(
            "Tracing directory not found: {}\n\n\
             Mount debugfs with: mount -t debugfs nodev /sys/kernel/debug\n\
             or point --tracefs at a mounted tracefs.",
            root.display()
        );
    }
    if !root.join("kprobe_events").is_file() {
        bail!(
            "{} has no kprobe_events file.\n\n\
             The kernel must be built with CONFIG_KPROBE_EVENTS.",
            root.display()
        );
    }
    Ok(())
}

fn check_ftrace_switch(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!(
            "ftrace switch not found: {}\n\n\
             The kernel must be built with CONFIG_FUNCTION_TRACER.",
            path.display()
        );
    }
    Ok(())
}
