// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform Abstraction
//!
//! Host queries (core count, memory) and the platform-specific half of the
//! terminate-then-kill subprocess escalation. Worker-count defaults and the
//! analyzer's walk concurrency derive from [`logical_cores`].

/// Logical core count; never less than 1.
pub fn logical_cores() -> usize {
    // available_parallelism respects cgroup/affinity limits but can fail
    // in restricted sandboxes; num_cpus reads the raw topology.
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or_else(|_| num_cpus::get())
        .max(1)
}

/// Total physical memory in bytes, when the platform exposes it.
pub fn total_memory_bytes() -> Option<u64> {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions; negative results signal
        // an unsupported configuration variable.
        let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };
        if pages > 0 && page_size > 0 {
            return Some(pages as u64 * page_size as u64);
        }
        None
    }
    #[cfg(not(unix))]
    {
        None
    }
}

/// Sends a polite terminate request to a child process.
///
/// Returns `true` when the request was delivered; the caller escalates to a
/// forced kill after the grace period either way. On platforms without a
/// terminate signal this returns `false` and the caller kills directly.
pub fn send_terminate(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: kill with a valid signal only fails for bad pids, which
        // the boolean result reports.
        unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}
