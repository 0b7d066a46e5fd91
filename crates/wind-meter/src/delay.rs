//! Timed suspension of the sampling controller.
//!
//! The controller has nothing to interleave with the window, so it simply
//! blocks for the whole window. There is no early wake-up and no
//! cancellation: signals that interrupt the sleep only resume it.

use std::time::Duration;

/// Blocking suspension for a fixed duration.
pub trait Delay {
    /// Block the calling thread for `duration`.
    fn suspend(&mut self, duration: Duration);
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn suspend(&mut self, duration: Duration) {
        (**self).suspend(duration);
    }
}

/// Suspension on the monotonic clock of the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    #[cfg(target_os = "linux")]
    fn suspend(&mut self, duration: Duration) {
        let mut request = libc::timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };
        let mut remaining = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        loop {
            // SAFETY: both timespecs are valid for the duration of the call.
            let rc = unsafe {
                libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &request, &mut remaining)
            };
            if rc != libc::EINTR {
                break;
            }
            request = remaining;
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn suspend(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_thread_delay_waits_full_duration() {
        let start = Instant::now();
        ThreadDelay.suspend(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_duration_returns() {
        ThreadDelay.suspend(Duration::ZERO);
    }
}
