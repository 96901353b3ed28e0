//! Built-in event catalog
//!
//! The closed set of events this crate knows how to probe and decode. Built
//! once at start-up and handed to [`EventRegistry`](super::EventRegistry).

use super::{EventDescriptor, ParameterKind as K};
use crate::parsing::strategies::{FORK, SOCKET_ADDRESS};
use crate::sockaddr::fields;

/// Repetition count for `sys_execve` argv
pub const EXECVE_ARGV_LEN: usize = 5;

/// Fetch arguments shared by `sys_connect` and `sys_accept`
///
/// `%si` points either at a `struct addrinfo` (pre-connect resolution) or at a
/// `struct sockaddr_in`/`sockaddr_in6`; both layouts are read and the decoder
/// picks whichever one holds an inet family.
const SOCKADDR_FETCH_ARGS: &str = "+4(%si):s32 +8(%si):s32 +24(%si):u32 +28(%si):u64 \
    +36(%si):u64 +22(%si):u16 +4(%si):u32 +8(%si):u64 +16(%si):u64 +0(%si):s16 +2(%si):u16";

fn socket_event(name: &str) -> EventDescriptor {
    EventDescriptor::kprobe(name)
        .param(fields::INFO_FAMILY, K::Int)
        .param(fields::INFO_SOCKTYPE, K::Int)
        .param(fields::INFO_IPV4, K::UnsignedInt)
        .param(fields::INFO_IPV6_HIGH, K::UnsignedLong)
        .param(fields::INFO_IPV6_LOW, K::UnsignedLong)
        .param(fields::INFO_PORT, K::UnsignedShort)
        .param(fields::SOCK_IPV4, K::UnsignedInt)
        .param(fields::SOCK_IPV6_HIGH, K::UnsignedLong)
        .param(fields::SOCK_IPV6_LOW, K::UnsignedLong)
        .param(fields::SOCK_FAMILY, K::Short)
        .param(fields::SOCK_PORT, K::UnsignedShort)
        .with_literal_probe(SOCKADDR_FETCH_ARGS)
        .with_strategy(&SOCKET_ADDRESS)
}

/// Every built-in event, in registration order
#[must_use]
pub fn builtin_events() -> Vec<EventDescriptor> {
    vec![
        EventDescriptor::kprobe("sys_execve")
            .param("filename", K::String)
            .param("argv", K::StringList)
            .with_list_len(EXECVE_ARGV_LEN),
        EventDescriptor::tracepoint("sched", "sched_process_fork")
            .param("called_name", K::String)
            .param("called_pid", K::Pid)
            .with_strategy(&FORK),
        EventDescriptor::kprobe("sys_setuid").param("uid", K::Uid),
        EventDescriptor::kprobe("sys_exit").param("error_code", K::Int),
        EventDescriptor::kprobe("sys_exit_group").param("error_code", K::Int),
        EventDescriptor::kprobe("sys_kill").param("pid", K::Pid).param("sig", K::Int),
        EventDescriptor::kprobe("sys_ptrace")
            .untraced("request")
            .param("pid", K::Long)
            .untraced("addr"),
        EventDescriptor::kprobe("sys_setreuid").param("ruid", K::Uid).param("euid", K::Uid),
        socket_event("sys_connect"),
        socket_event("sys_accept"),
        EventDescriptor::kprobe("sys_setgid").param("gid", K::Gid),
        EventDescriptor::kprobe("sys_personality").param("personality", K::UnsignedInt),
        EventDescriptor::kprobe("sys_open")
            .param("filename", K::String)
            .param("flags", K::Int)
            .param("mode", K::Int),
        EventDescriptor::kprobe("sys_close").param("fd", K::UnsignedInt),
        EventDescriptor::kprobe("sys_umask").param("mask", K::Int),
        EventDescriptor::kprobe("sys_tkill").param("pid", K::Pid).param("sig", K::Int),
    ]
}
