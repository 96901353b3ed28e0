//! # Parameter Type Catalog
//!
//! Maps each semantic parameter kind to the way its value is fetched by a
//! kprobe and the way the printed value is decoded back.
//!
//! Every kind resolves to one [`KindSpec`] row: a decode function, an optional
//! fetch template and a list flag. The fetch type in the template and the
//! integer width used by the decoder always agree, so a `u32` fetch is
//! decoded as `u32` and never silently widened or truncated.
//!
//! List kinds walk an array of pointers: element `i` lives at
//! `i * pointer_width` bytes from the register, so the pointer width is
//! passed in explicitly by the caller.

use std::fmt;

use ftrace_common::{FetchType, Register};

use crate::domain::{ConfigError, DecodeError, PointerWidth};
use crate::event::Value;

/// Semantic type of one declared argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Uid,
    UidList,
    Pid,
    Gid,
    GidList,
    Int,
    IntPointer,
    UnsignedInt,
    Float,
    String,
    StringList,
    Long,
    UnsignedLong,
    CapUserHeader,
    Short,
    UnsignedShort,
}

/// How a kind's value is reached from its register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// `%reg:type` - the register value itself
    Direct(FetchType),
    /// `+0(%reg):type` - the value the register points at
    Pointer(FetchType),
    /// `+off(%reg):type` - the i-th element of an inline array
    Element(FetchType),
    /// `+0(+off(%reg)):type` - the value the i-th array element points at
    ElementPointer(FetchType),
}

/// One row of the catalog
#[derive(Clone, Copy)]
pub struct KindSpec {
    pub decode: fn(&str) -> Option<Value>,
    pub fetch: Option<Fetch>,
    pub is_list: bool,
}

impl ParameterKind {
    /// Catalog row for this kind
    #[must_use]
    pub fn spec(self) -> KindSpec {
        use Fetch::{Direct, Element, ElementPointer, Pointer};
        use ParameterKind as K;

        let (decode, fetch, is_list): (fn(&str) -> Option<Value>, _, _) = match self {
            K::Uid | K::Pid | K::Gid | K::UnsignedInt => {
                (decode_u32, Some(Direct(FetchType::U32)), false)
            }
            K::UidList | K::GidList => (decode_u32, Some(Element(FetchType::U32)), true),
            K::Int => (decode_i32, Some(Direct(FetchType::S32)), false),
            K::IntPointer => (decode_u32, Some(Pointer(FetchType::U32)), false),
            K::Float => (decode_f64, None, false),
            K::String => (decode_string, Some(Pointer(FetchType::String)), false),
            K::StringList => (decode_string, Some(ElementPointer(FetchType::String)), true),
            K::Long => (decode_i64, Some(Direct(FetchType::S64)), false),
            K::UnsignedLong | K::CapUserHeader => (decode_u64, Some(Direct(FetchType::U64)), false),
            K::Short => (decode_i16, Some(Direct(FetchType::S16)), false),
            K::UnsignedShort => (decode_u16, Some(Direct(FetchType::U16)), false),
        };

        KindSpec { decode, fetch, is_list }
    }

    #[must_use]
    pub fn is_list(self) -> bool {
        self.spec().is_list
    }

    /// Whether values of this kind are printed as (quoted) strings
    #[must_use]
    pub fn is_string_like(self) -> bool {
        matches!(self, ParameterKind::String | ParameterKind::StringList)
    }

    /// Convert one printed value (one list element for list kinds)
    ///
    /// # Errors
    /// Returns [`DecodeError`] when the text is not a valid value of this kind.
    pub fn decode(self, raw: &str) -> Result<Value, DecodeError> {
        (self.spec().decode)(raw).ok_or_else(|| DecodeError::new(self, raw))
    }

    /// Render the fetch argument for list element `index` (always 0 for scalars)
    ///
    /// # Errors
    /// Returns [`ConfigError::NotProbeable`] for kinds without a fetch template.
    pub fn render_probe_argument(
        self,
        register: Register,
        index: usize,
        width: PointerWidth,
    ) -> Result<String, ConfigError> {
        let fetch = self.spec().fetch.ok_or(ConfigError::NotProbeable(self))?;
        let offset = index * width.bytes();

        Ok(match fetch {
            Fetch::Direct(ty) => format!("{register}:{ty}"),
            Fetch::Pointer(ty) => format!("+0({register}):{ty}"),
            Fetch::Element(ty) => format!("+{offset}({register}):{ty}"),
            Fetch::ElementPointer(ty) => format!("+0(+{offset}({register})):{ty}"),
        })
    }

    /// Render every fetch argument for this kind, space-joined
    ///
    /// List kinds produce `count` arguments; scalars always produce one.
    ///
    /// # Errors
    /// Returns [`ConfigError::NotProbeable`] for kinds without a fetch template.
    pub fn render_probe_arguments(
        self,
        register: Register,
        count: usize,
        width: PointerWidth,
    ) -> Result<String, ConfigError> {
        let count = if self.is_list() { count } else { 1 };
        let args = (0..count)
            .map(|index| self.render_probe_argument(register, index, width))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(args.join(" "))
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::Uid => "uid",
            ParameterKind::UidList => "uid[]",
            ParameterKind::Pid => "pid",
            ParameterKind::Gid => "gid",
            ParameterKind::GidList => "gid[]",
            ParameterKind::Int => "int",
            ParameterKind::IntPointer => "int*",
            ParameterKind::UnsignedInt => "unsigned int",
            ParameterKind::Float => "float",
            ParameterKind::String => "string",
            ParameterKind::StringList => "string[]",
            ParameterKind::Long => "long",
            ParameterKind::UnsignedLong => "unsigned long",
            ParameterKind::CapUserHeader => "cap_user_header",
            ParameterKind::Short => "short",
            ParameterKind::UnsignedShort => "unsigned short",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Decoders
// ============================================================================

/// Parse a printed integer; accepts decimal or `0x` hex, optionally signed
pub(crate) fn parse_integer(raw: &str) -> Option<i128> {
    let text = raw.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn decode_i16(raw: &str) -> Option<Value> {
    parse_integer(raw).and_then(|v| i16::try_from(v).ok()).map(|v| Value::Int(v.into()))
}

fn decode_u16(raw: &str) -> Option<Value> {
    parse_integer(raw).and_then(|v| u16::try_from(v).ok()).map(|v| Value::UInt(v.into()))
}

fn decode_i32(raw: &str) -> Option<Value> {
    parse_integer(raw).and_then(|v| i32::try_from(v).ok()).map(|v| Value::Int(v.into()))
}

fn decode_u32(raw: &str) -> Option<Value> {
    parse_integer(raw).and_then(|v| u32::try_from(v).ok()).map(|v| Value::UInt(v.into()))
}

fn decode_i64(raw: &str) -> Option<Value> {
    parse_integer(raw).and_then(|v| i64::try_from(v).ok()).map(Value::Int)
}

fn decode_u64(raw: &str) -> Option<Value> {
    parse_integer(raw).and_then(|v| u64::try_from(v).ok()).map(Value::UInt)
}

fn decode_f64(raw: &str) -> Option<Value> {
    raw.trim().parse::<f64>().ok().map(Value::Float)
}

#[allow(clippy::unnecessary_wraps)]
fn decode_string(raw: &str) -> Option<Value> {
    Some(Value::Str(raw.to_owned()))
}
