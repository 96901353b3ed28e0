use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use ftrace::domain::{PointerWidth, StreamError};
use ftrace::event::{Endpoint, ParsedEvent, Value};
use ftrace::parsing::{Anomaly, Ingested, LineParser};
use ftrace::probes::EventRegistry;
use ftrace::stream::EventStream;

const EXECVE: &str = r#"            bash-5010  [001] d... 12345.678901: sys_execve_kprobe: (SyS_execve+0x0/0x30) arg1="/bin/ls" arg2="ls" arg3="-l" arg4="--color=auto" arg5="/tmp" arg6="x""#;

fn parser() -> LineParser {
    let registry = EventRegistry::builtin(PointerWidth::Eight, None).expect("built-in registry is valid");
    LineParser::new(Arc::new(registry))
}

fn expect_event(outcome: Ingested) -> ParsedEvent {
    match outcome {
        Ingested::Event(event) => event,
        other => panic!("expected an event, got {other:?}"),
    }
}

fn connect_line(family: i64, ipv4: u64, ipv6: (u64, u64), port: i64) -> String {
    format!(
        "            curl-6000  [002] d... 200.000000: sys_connect_kprobe: (SyS_connect+0x0/0x10) \
         arg1=0 arg2=0 arg3=0 arg4=0 arg5=0 arg6=0 arg7={ipv4} arg8={} arg9={} arg10={family} arg11={port}",
        ipv6.0, ipv6.1
    )
}

#[test]
fn test_fixture_replay() {
    let file = File::open(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/trace_pipe.txt"))
        .expect("fixture exists");
    let mut events = EventStream::new(BufReader::new(file), parser());

    let decoded: Vec<ParsedEvent> = events.by_ref().collect::<Result<_, StreamError>>().expect("fixture decodes");
    let handles: Vec<_> = decoded.iter().filter_map(ParsedEvent::probe_handle).collect();
    assert_eq!(handles, ["sys_execve_kprobe", "sched_process_fork", "sys_connect_kprobe", "sys_kill_kprobe"]);

    let stats = events.stats();
    assert_eq!(stats.lines, 6);
    assert_eq!(stats.events, 4);
    assert_eq!(stats.unknown_events, 1);
    assert_eq!(stats.overflows, 0);
    assert_eq!(stats.malformed, 0);
}

#[test]
fn test_execve_fields() {
    let event = expect_event(parser().ingest(EXECVE).unwrap());

    let names: Vec<_> = event.names().collect();
    assert_eq!(names, ["caller_name", "caller_pid", "timestamp", "kname", "syscall", "filename", "argv"]);
    assert_eq!(event.caller_name(), Some("bash"));
    assert_eq!(event.timestamp(), Some(12_345.678_901));
    assert_eq!(event.get("syscall"), Some(&Value::Str("SyS_execve".into())));
    assert_eq!(event.get("filename"), Some(&Value::Str("/bin/ls".into())));
    let argv = ["ls", "-l", "--color=auto", "/tmp", "x"].map(|s| Value::Str(s.into())).to_vec();
    assert_eq!(event.get("argv"), Some(&Value::List(argv)));
}

#[test]
fn test_split_anywhere_matches_whole_line() {
    let whole = expect_event(parser().ingest(EXECVE).unwrap());

    for split in 1..EXECVE.len() {
        let mut parser = parser();
        let (head, tail) = EXECVE.split_at(split);
        assert_eq!(parser.ingest(head).unwrap(), Ingested::Incomplete, "split at {split}");
        assert_eq!(expect_event(parser.ingest(tail).unwrap()), whole, "split at {split}");
    }
}

#[test]
fn test_unknown_event_then_valid() {
    let mut parser = parser();
    let unknown = "  bash-1 [000] .... 1.0: sys_nope_kprobe: (sys_nope+0x0/0x10) arg1=1";
    assert!(matches!(
        parser.ingest(unknown).unwrap(),
        Ingested::Discarded(Anomaly::UnknownEvent { .. })
    ));

    let close = "  bash-1 [000] .... 1.1: sys_close_kprobe: (sys_close+0x0/0x10) arg1=3";
    let event = expect_event(parser.ingest(close).unwrap());
    assert_eq!(event.get("fd"), Some(&Value::UInt(3)));
}

#[test]
fn test_overflow_discards_then_recovers() {
    let mut parser = parser();
    let line = "  bash-1 [000] .... 1.0: sys_close_kprobe: (sys_close+0x0/0x10) arg1=3 arg2=4";
    assert_eq!(
        parser.ingest(line).unwrap(),
        Ingested::Discarded(Anomaly::Overflow { handle: "sys_close_kprobe".into(), expected: 6, found: 7 })
    );
    assert!(parser.pending().is_empty());
    assert_eq!(parser.stats.overflows, 1);

    let line = "  bash-1 [000] .... 1.1: sys_umask_kprobe: (sys_umask+0x0/0x10) arg1=18";
    let event = expect_event(parser.ingest(line).unwrap());
    assert_eq!(event.get("mask"), Some(&Value::Int(18)));
}

#[test]
fn test_bad_fork_line_does_not_block_stream() {
    let mut parser = parser();
    let fork = "            bash-1  [000] d... 1.0: sched_process_fork: comm=bash pid=1 child_comm=bash child_pid=";
    assert!(matches!(
        parser.ingest(fork).unwrap(),
        Ingested::Discarded(Anomaly::Malformed { .. })
    ));

    for n in 0..100u64 {
        let line = format!("  bash-1 [000] .... 2.{n}: sys_kill_kprobe: (sys_kill+0x0/0x20) arg1={n} arg2=9");
        let event = expect_event(parser.ingest(line).unwrap());
        assert_eq!(event.get("pid"), Some(&Value::UInt(n)));
    }
    assert!(parser.pending().is_empty());
    assert_eq!(parser.stats.malformed, 1);
    assert_eq!(parser.stats.events, 100);
}

#[test]
fn test_unmatched_line_dropped_at_next_header() {
    let mut parser = parser();
    let bad = "  bash-1 [000] .... 1.0: sys_umask_kprobe: [garbled]";
    assert_eq!(parser.ingest(bad).unwrap(), Ingested::Incomplete);

    let fork = "            bash-5010  [000] d... 99.000001: sched_process_fork: comm=bash pid=5010 child_comm=bash child_pid=5011";
    let event = expect_event(parser.ingest(fork).unwrap());
    assert_eq!(event.caller_pid().map(|pid| pid.0), Some(5010));
    assert_eq!(parser.stats.malformed, 1);
}

#[test]
fn test_missing_argument_waits() {
    let mut parser = parser();
    let head = "  bash-1 [000] .... 1.0: sys_kill_kprobe: (sys_kill+0x0/0x20) arg1=4242";
    assert_eq!(parser.ingest(head).unwrap(), Ingested::Incomplete);
    let event = expect_event(parser.ingest(" arg2=9").unwrap());
    assert_eq!(event.get("pid"), Some(&Value::UInt(4242)));
    assert_eq!(event.get("sig"), Some(&Value::Int(9)));
}

#[test]
fn test_fork_notification() {
    let line = "            bash-5010  [000] d... 99.000001: sched_process_fork: comm=bash pid=5010 child_comm=bash child_pid=5011";
    let event = expect_event(parser().ingest(line).unwrap());

    let names: Vec<_> = event.names().collect();
    assert_eq!(names, ["caller_name", "caller_pid", "timestamp", "kname", "syscall", "called_name", "called_pid"]);
    assert_eq!(event.probe_handle(), Some("sched_process_fork"));
    assert_eq!(event.get("called_pid"), Some(&Value::UInt(5011)));
}

#[test]
fn test_connect_ipv4() {
    let event = expect_event(parser().ingest(connect_line(2, 0x0100_007F, (0, 0), 0x3905)).unwrap());

    let names: Vec<_> = event.names().collect();
    assert_eq!(names, ["caller_name", "caller_pid", "timestamp", "kname", "syscall", "address"]);
    assert_eq!(
        event.get("address"),
        Some(&Value::Address(Endpoint { address: Some("127.0.0.1".into()), port: Some(1337) }))
    );
}

#[test]
fn test_connect_ipv6() {
    let line = connect_line(10, 0, (0, 0x0100_0000_0000_0000), 0x5000);
    let event = expect_event(parser().ingest(line).unwrap());
    assert_eq!(
        event.get("address"),
        Some(&Value::Address(Endpoint { address: Some("::1".into()), port: Some(80) }))
    );
}

#[test]
fn test_connect_port_overflow_keeps_address() {
    let event = expect_event(parser().ingest(connect_line(2, 0x0100_007F, (0, 0), 70_000)).unwrap());
    assert_eq!(
        event.get("address"),
        Some(&Value::Address(Endpoint { address: Some("127.0.0.1".into()), port: None }))
    );
}

#[test]
fn test_connect_without_inet_family() {
    let event = expect_event(parser().ingest(connect_line(1, 0, (0, 0), 0)).unwrap());
    assert_eq!(event.get("address"), Some(&Value::Address(Endpoint::default())));
}
