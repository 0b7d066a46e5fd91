//! Real-time scheduling and memory locking for the edge delivery thread.
//!
//! The interrupt context must preempt everything else the process does, so
//! its thread is promoted to `SCHED_FIFO` and the address space is locked to
//! keep page faults out of the handler. Both steps degrade to a warning when
//! the process lacks the privileges.

use tracing::{debug, info, warn};
use wind_common::config::RealtimeConfig;
use wind_common::error::{WsError, WsResult};

/// Result of real-time initialization.
#[derive(Debug, Clone, Default)]
pub struct RealtimeStatus {
    /// Whether memory was locked successfully.
    pub memory_locked: bool,
    /// Applied `SCHED_FIFO` priority, if any.
    pub scheduler_priority: Option<u8>,
}

/// Promote the calling thread according to `config`.
///
/// # Errors
///
/// Returns an error if a system call fails for a reason other than
/// missing privileges.
pub fn init_realtime(config: &RealtimeConfig) -> WsResult<RealtimeStatus> {
    if !config.enabled {
        debug!("Real-time scheduling disabled in configuration");
        return Ok(RealtimeStatus::default());
    }

    let caps = check_rt_capabilities();
    if !caps.preempt_rt {
        debug!("PREEMPT_RT kernel not detected, edge latency may vary");
    }

    let memory_locked = if config.lock_memory {
        lock_memory()?
    } else {
        false
    };

    let scheduler_priority = set_fifo_priority(config.priority)?;

    let status = RealtimeStatus {
        memory_locked,
        scheduler_priority,
    };
    info!(?status, "Real-time initialization complete");
    Ok(status)
}

/// Lock all current and future memory pages.
#[cfg(target_os = "linux")]
fn lock_memory() -> WsResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => {
            debug!("Memory locked");
            Ok(true)
        }
        Err(nix::errno::Errno::EPERM) => {
            warn!("mlockall failed with EPERM - running without CAP_IPC_LOCK capability");
            Ok(false)
        }
        Err(e) => Err(WsError::Config(format!("mlockall failed: {e}"))),
    }
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> WsResult<bool> {
    warn!("mlockall not available on this platform");
    Ok(false)
}

/// Switch the calling thread to `SCHED_FIFO` at `priority`.
#[cfg(target_os = "linux")]
fn set_fifo_priority(priority: u8) -> WsResult<Option<u8>> {
    let priority = priority.clamp(1, 99);
    let param = libc::sched_param {
        sched_priority: i32::from(priority),
    };

    // SAFETY: `param` is a valid sched_param; pid 0 names the calling thread.
    let result = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if result == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            warn!(
                "sched_setscheduler failed with EPERM - consider CAP_SYS_NICE or running as root"
            );
            return Ok(None);
        }
        return Err(WsError::Config(format!("sched_setscheduler failed: {err}")));
    }

    debug!(priority, "SCHED_FIFO configured");
    Ok(Some(priority))
}

#[cfg(not(target_os = "linux"))]
fn set_fifo_priority(priority: u8) -> WsResult<Option<u8>> {
    warn!(priority, "Real-time scheduling not available on this platform");
    Ok(None)
}

/// Real-time capabilities of the running process.
#[derive(Debug, Clone, Default)]
pub struct RtCapabilities {
    /// Whether running as root.
    pub is_root: bool,
    /// RLIMIT_RTPRIO value.
    pub rtprio_limit: Option<u64>,
    /// Whether running on a PREEMPT_RT kernel.
    pub preempt_rt: bool,
}

impl RtCapabilities {
    /// Whether RT scheduling is likely to succeed.
    pub fn can_use_rt_scheduling(&self) -> bool {
        self.is_root || self.rtprio_limit.is_some_and(|l| l > 0)
    }
}

/// Probe the process for real-time capabilities.
#[cfg(target_os = "linux")]
pub fn check_rt_capabilities() -> RtCapabilities {
    // SAFETY: geteuid has no preconditions.
    let is_root = unsafe { libc::geteuid() } == 0;

    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `rlim` is a valid out-pointer.
    let rtprio_limit = (unsafe { libc::getrlimit(libc::RLIMIT_RTPRIO, &mut rlim) } == 0)
        .then_some(rlim.rlim_cur);

    let preempt_rt = std::fs::read_to_string("/proc/version")
        .map(|v| v.contains("PREEMPT_RT") || v.contains("PREEMPT RT"))
        .unwrap_or(false);

    RtCapabilities {
        is_root,
        rtprio_limit,
        preempt_rt,
    }
}

/// Probe the process for real-time capabilities.
#[cfg(not(target_os = "linux"))]
pub fn check_rt_capabilities() -> RtCapabilities {
    RtCapabilities::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_rt() {
        let status = init_realtime(&RealtimeConfig::default()).unwrap();
        assert!(!status.memory_locked);
        assert!(status.scheduler_priority.is_none());
    }

    #[test]
    fn test_rt_capabilities() {
        let caps = check_rt_capabilities();
        if caps.is_root {
            assert!(caps.can_use_rt_scheduling());
        }
    }
}
