//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT request shutdown; the sampling loop honours the
//! request after the current window completes. SIGHUP is recorded as a
//! reload request, which the daemon reports as unsupported.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Interval at which the poll thread forwards raw signal flags.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
    /// SIGHUP - Hangup, conventionally a config reload.
    Hangup,
}

impl SignalKind {
    #[cfg(unix)]
    fn from_raw(signum: i32) -> Option<Self> {
        match signum {
            libc::SIGTERM => Some(Self::Terminate),
            libc::SIGINT => Some(Self::Interrupt),
            libc::SIGHUP => Some(Self::Hangup),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Shared state between the signal poll thread and the main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    reload_requested: AtomicBool,
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create a new signal state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Check if reload has been requested (and clear the flag).
    #[inline]
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request reload (can be called from any thread).
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::Relaxed);
    }

    /// Apply a received signal.
    fn handle(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        match kind {
            SignalKind::Terminate | SignalKind::Interrupt => {
                info!(signal = %kind, "Shutdown requested, finishing current window");
                self.request_shutdown();
            }
            SignalKind::Hangup => {
                info!(signal = %kind, "Reload requested");
                self.request_reload();
            }
        }
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Last shutdown signal number, written from the async signal handler.
static SHUTDOWN_SIGNAL: AtomicI32 = AtomicI32::new(0);
/// Raised by the SIGHUP handler.
static RELOAD_FLAG: AtomicBool = AtomicBool::new(false);

/// Handle for signal management.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a new signal handler and register signal handlers.
    ///
    /// On Unix systems, this registers handlers for SIGTERM, SIGINT, and SIGHUP.
    /// On other platforms only manual shutdown is available.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    /// Register Unix signal handlers.
    ///
    /// The handlers only touch atomics; a poll thread forwards them into
    /// the shared state.
    #[cfg(unix)]
    #[allow(unsafe_code)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        extern "C" fn shutdown_handler(signum: c_int) {
            SHUTDOWN_SIGNAL.store(signum, Ordering::Relaxed);
        }

        extern "C" fn reload_handler(_: c_int) {
            RELOAD_FLAG.store(true, Ordering::Relaxed);
        }

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("wind-signals".into())
            .spawn(move || loop {
                let signum = SHUTDOWN_SIGNAL.swap(0, Ordering::Relaxed);
                if let Some(kind) = SignalKind::from_raw(signum) {
                    state.handle(kind);
                }
                if RELOAD_FLAG.swap(false, Ordering::Relaxed) {
                    state.handle(SignalKind::Hangup);
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(POLL_INTERVAL);
            })?;

        // SAFETY: the handlers are async-signal-safe (atomic stores only).
        unsafe {
            libc::signal(libc::SIGTERM, shutdown_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, shutdown_handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, reload_handler as libc::sighandler_t);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if reload has been requested (clears the flag).
    #[inline]
    pub fn take_reload_request(&self) -> bool {
        self.state.take_reload_request()
    }

    /// Manually request shutdown.
    pub fn request_shutdown(&self) {
        info!("Manual shutdown requested");
        self.state.request_shutdown();
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}
