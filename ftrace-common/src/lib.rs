//! # Shared Probe Vocabulary
//!
//! Declarative constants and types shared by the probe-definition builder and the
//! trace line parser. Nothing in here performs I/O; every item describes either
//! the text the kernel expects in `kprobe_events` or the text it emits on
//! `trace_pipe`.
//!
//! ## Key Types
//!
//! - [`Register`] - CPU argument registers, in the order parameters bind to them
//! - [`FetchType`] - kprobe fetch-argument type codes (`u32`, `string`, ...)
//!
//! ## Probe Definition Grammar
//!
//! ```text
//! p:kprobes/<name>_kprobe <name> <arg-expr>*
//!
//! <arg-expr> := <register>:<typecode>
//!             | +<offset>(<register>):<typecode>
//!             | +0(<register>):string
//!             | +0(+<offset>(<register>)):string
//! ```

#![no_std]

use core::fmt;

// ============================================================================
// Probe Naming
// ============================================================================

/// Event group every dynamic probe is registered under
///
/// Determines both the `p:<group>/<handle>` prefix in `kprobe_events` and the
/// `events/<group>/<handle>/enable` control file.
pub const KPROBE_GROUP: &str = "kprobes";

/// Suffix appended to an event's symbolic name to form its probe handle
///
/// `sys_execve` → `sys_execve_kprobe`
pub const PROBE_HANDLE_SUFFIX: &str = "_kprobe";

// ============================================================================
// Standard Fields
// ============================================================================

/// Process name of the task that hit the probe
pub const FIELD_CALLER_NAME: &str = "caller_name";

/// Process ID of the task that hit the probe
pub const FIELD_CALLER_PID: &str = "caller_pid";

/// Trace clock timestamp in seconds
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Probe handle as printed by the kernel
pub const FIELD_PROBE_HANDLE: &str = "kname";

/// Underlying kernel symbol, with the `+0x../0x..` offset suffix removed
pub const FIELD_SYMBOL: &str = "syscall";

/// The five fields every trace line carries, in emission order
///
/// They precede the declared parameters in every decoded event.
pub const STANDARD_FIELDS: [&str; 5] = [
    FIELD_CALLER_NAME,
    FIELD_CALLER_PID,
    FIELD_TIMESTAMP,
    FIELD_PROBE_HANDLE,
    FIELD_SYMBOL,
];

/// Field holding the decoded `(address, port)` pair of socket events
pub const FIELD_ADDRESS: &str = "address";

// ============================================================================
// Register Allocation
// ============================================================================

/// CPU argument register usable in a probe expression
///
/// Variants are listed in x86-64 function-argument order. The n-th declared
/// parameter of an event reads the n-th register of [`Register::ALL`], so this
/// order must match the calling convention of the probed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Di,
    Si,
    Dx,
    Cx,
    R8,
    R9,
}

impl Register {
    /// Every allocatable register, in binding order
    pub const ALL: [Register; 6] = [
        Register::Di,
        Register::Si,
        Register::Dx,
        Register::Cx,
        Register::R8,
        Register::R9,
    ];

    /// Register operand as written in a fetch argument (`%di`)
    #[must_use]
    pub const fn operand(self) -> &'static str {
        match self {
            Register::Di => "%di",
            Register::Si => "%si",
            Register::Dx => "%dx",
            Register::Cx => "%cx",
            Register::R8 => "%r8",
            Register::R9 => "%r9",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operand())
    }
}

// ============================================================================
// Fetch Types
// ============================================================================

/// Type code suffix of a kprobe fetch argument
///
/// The kernel prints numeric fetch types in decimal; `string` is printed
/// wrapped in double quotes, or as `(fault)` when the pointer is unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchType {
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    String,
}

impl FetchType {
    /// Type code as written after the `:` of a fetch argument
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            FetchType::S16 => "s16",
            FetchType::U16 => "u16",
            FetchType::S32 => "s32",
            FetchType::U32 => "u32",
            FetchType::S64 => "s64",
            FetchType::U64 => "u64",
            FetchType::String => "string",
        }
    }

    /// Width of the fetched value in bytes (`None` for strings)
    #[must_use]
    pub const fn width(self) -> Option<usize> {
        match self {
            FetchType::S16 | FetchType::U16 => Some(2),
            FetchType::S32 | FetchType::U32 => Some(4),
            FetchType::S64 | FetchType::U64 => Some(8),
            FetchType::String => None,
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
