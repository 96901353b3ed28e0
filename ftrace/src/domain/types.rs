//! Domain types providing compile-time safety and self-documentation

use std::fmt;

use super::errors::ConfigError;

/// Process ID as printed on a trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

/// Pointer width of the probed kernel, in bytes
///
/// List-typed parameters walk an array of pointers, so consecutive elements
/// sit `width` bytes apart. This is configuration: the controlling process may
/// be built for a different width than the kernel it instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerWidth {
    Four,
    #[default]
    Eight,
}

impl PointerWidth {
    /// Width in bytes
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }
}

impl TryFrom<u8> for PointerWidth {
    type Error = ConfigError;

    fn try_from(bytes: u8) -> Result<Self, Self::Error> {
        match bytes {
            4 => Ok(PointerWidth::Four),
            8 => Ok(PointerWidth::Eight),
            other => Err(ConfigError::InvalidPointerWidth(other)),
        }
    }
}

impl fmt::Display for PointerWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.bytes())
    }
}
