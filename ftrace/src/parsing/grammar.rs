//! Textual grammars of `trace_pipe` lines
//!
//! ```text
//! <comm>-<pid> [<cpu>] <flags> <timestamp>: <handle>: (<symbol>+<off>/<size>) arg1=<v> arg2=<v> ...
//! <comm>-<pid> [<cpu>] <flags> <timestamp>: sched_process_fork: comm=<c> pid=<n> child_comm=<c> child_pid=<n>
//! ```

use std::sync::OnceLock;

use regex::Regex;

fn handle_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\S.*?-\d+\s*\[\d*\].*?\s[0-9.]+:\s*(?P<handle>\w+):")
            .expect("probe handle grammar is valid")
    })
}

fn standard_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<comm>\S.*?)-(?P<pid>\d+)\s*\[(?P<cpu>\d*)\].*?\s(?P<ts>[0-9.]+):\s*(?P<handle>\w+):\s*\((?P<symbol>[^)]*)\)",
        )
        .expect("standard field grammar is valid")
    })
}

fn fork_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<comm>\S.*?)-(?P<pid>\d+)\s*\[(?P<cpu>\d*)\].*?\s(?P<ts>[0-9.]+):\s*(?P<handle>sched_process_fork):\s*comm=(?P<parent_comm>.*?)\s*pid=(?P<parent_pid>\d+)\s*child_comm=(?P<child_comm>.*?)\s*child_pid=(?P<child_pid>\d+)\s*$",
        )
        .expect("fork grammar is valid")
    })
}

fn line_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\S+-\d+\s*\[\d*\]\s.*?\s[0-9.]+:\s*\w+:").expect("line header grammar is valid")
    })
}

fn arg_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\sarg\d+=").expect("argument marker grammar is valid"))
}

/// The five fields every line carries, as raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFields<'a> {
    pub comm: &'a str,
    pub pid: &'a str,
    pub timestamp: &'a str,
    pub handle: &'a str,
    pub symbol: &'a str,
}

impl StandardFields<'_> {
    /// Tokens in standard field order
    #[must_use]
    pub fn into_tokens(self) -> Vec<String> {
        vec![
            self.comm.to_string(),
            self.pid.to_string(),
            self.timestamp.to_string(),
            self.handle.to_string(),
            self.symbol.to_string(),
        ]
    }
}

/// Fork notification fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkFields<'a> {
    pub comm: &'a str,
    pub pid: &'a str,
    pub timestamp: &'a str,
    pub handle: &'a str,
    pub child_comm: &'a str,
    pub child_pid: &'a str,
}

/// Probe handle of the (possibly partial) line
#[must_use]
pub fn probe_handle(text: &str) -> Option<&str> {
    handle_regex()
        .captures(text)
        .and_then(|caps| caps.name("handle"))
        .map(|m| m.as_str())
}

/// Byte offset of a second line header after the first line's probe handle
///
/// Accumulated text only holds one header unless a line that never matched its
/// grammar was followed by the next event.
#[must_use]
pub fn next_line_start(text: &str) -> Option<usize> {
    let handle_end = handle_regex().find(text)?.end();
    line_header_regex()
        .find(&text[handle_end..])
        .map(|m| handle_end + m.start())
}

/// Standard fields and the byte offset where the argument list starts
///
/// The symbol loses its `+0x../0x..` offset suffix.
#[must_use]
pub fn standard_fields(text: &str) -> Option<(StandardFields<'_>, usize)> {
    let caps = standard_regex().captures(text)?;
    let symbol = caps.name("symbol")?.as_str();
    let symbol = symbol.split('+').next().unwrap_or(symbol);

    let fields = StandardFields {
        comm: caps.name("comm")?.as_str(),
        pid: caps.name("pid")?.as_str(),
        timestamp: caps.name("ts")?.as_str(),
        handle: caps.name("handle")?.as_str(),
        symbol,
    };
    Some((fields, caps.get(0)?.end()))
}

#[must_use]
pub fn fork_fields(text: &str) -> Option<ForkFields<'_>> {
    let caps = fork_regex().captures(text)?;
    Some(ForkFields {
        comm: caps.name("comm")?.as_str(),
        pid: caps.name("pid")?.as_str(),
        timestamp: caps.name("ts")?.as_str(),
        handle: caps.name("handle")?.as_str(),
        child_comm: caps.name("child_comm")?.as_str(),
        child_pid: caps.name("child_pid")?.as_str(),
    })
}

/// Values of every `argN=` marker, in order
///
/// A value runs from its marker to the next marker or the end of the text.
#[must_use]
pub fn arg_values(text: &str) -> Vec<&str> {
    let markers: Vec<_> = arg_marker_regex().find_iter(text).collect();
    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(text.len(), regex::Match::start);
            text[marker.end()..end].trim_end()
        })
        .collect()
}

/// Whether the token is wrapped in a matching `"…"` or `(…)` pair
#[must_use]
pub fn is_delimited(token: &str) -> bool {
    token.len() >= 2
        && ((token.starts_with('"') && token.ends_with('"'))
            || (token.starts_with('(') && token.ends_with(')')))
}

/// Strip one layer of matching outer quotes or parentheses
#[must_use]
pub fn unquote(token: &str) -> &str {
    if is_delimited(token) {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXECVE: &str = r#"            bash-5010  [001] d... 12345.678901: sys_execve_kprobe: (SyS_execve+0x0/0x30) arg1="/bin/ls" arg2="ls" arg3="-l""#;

    #[test]
    fn test_probe_handle() {
        assert_eq!(probe_handle(EXECVE), Some("sys_execve_kprobe"));
        assert_eq!(probe_handle("            bash-5010  [001] d..."), None);
    }

    #[test]
    fn test_probe_handle_comm_with_dashes() {
        let line = "  kworker/u8:2-foo-12-345 [002] .... 1.5: sys_close_kprobe: (sys_close+0x0/0x10) arg1=3";
        let (fields, _) = standard_fields(line).unwrap();
        assert_eq!(fields.comm, "kworker/u8:2-foo-12");
        assert_eq!(fields.pid, "345");
        assert_eq!(probe_handle(line), Some("sys_close_kprobe"));
    }

    #[test]
    fn test_standard_fields_strip_offset() {
        let (fields, end) = standard_fields(EXECVE).unwrap();
        assert_eq!(fields.comm, "bash");
        assert_eq!(fields.pid, "5010");
        assert_eq!(fields.timestamp, "12345.678901");
        assert_eq!(fields.handle, "sys_execve_kprobe");
        assert_eq!(fields.symbol, "SyS_execve");
        assert!(EXECVE[end..].starts_with(" arg1="));
    }

    #[test]
    fn test_arg_values_keep_spaces() {
        let values = arg_values(r#" arg1="git merge dev" arg2=17  "#);
        assert_eq!(values, vec![r#""git merge dev""#, "17"]);
    }

    #[test]
    fn test_fork_fields() {
        let line = "            bash-5010  [000] d... 99.000001: sched_process_fork: comm=bash pid=5010 child_comm=bash child_pid=5011";
        let fields = fork_fields(line).unwrap();
        assert_eq!(fields.comm, "bash");
        assert_eq!(fields.child_comm, "bash");
        assert_eq!(fields.child_pid, "5011");
    }

    #[test]
    fn test_next_line_start() {
        let first = "  bash-1 [000] .... 1.0: sys_close_kprobe: garbage";
        let second = "            sh-77  [003] d... 2.0: sys_umask_kprobe: (sys_umask+0x0/0x10) arg1=18";
        let joined = format!("{first}{second}");
        let start = next_line_start(&joined).unwrap();
        assert_eq!(&joined[start..], second.trim_start());
        assert_eq!(next_line_start(first), None);
        assert_eq!(next_line_start(EXECVE), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""/bin/ls""#), "/bin/ls");
        assert_eq!(unquote("(fault)"), "fault");
        assert_eq!(unquote(r#""half"#), r#""half"#);
        assert_eq!(unquote(r#"""#), r#"""#);
        assert_eq!(unquote("42"), "42");
    }
}
