//! Break (Ctrl+C / Ctrl+\) notification
//!
//! While registered, SIGINT and SIGQUIT no longer terminate the process;
//! they set a flag the application polls with [`BreakSignal::take`].
//! Dropping the handle unregisters the flag but does not restore the
//! default disposition.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::signal::{SIGINT, SIGQUIT};
use signal_hook::SigId;

pub struct BreakSignal {
    flag: Arc<AtomicBool>,
    ids: Vec<SigId>,
}

impl BreakSignal {
    pub fn register() -> io::Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        let ids = [SIGINT, SIGQUIT]
            .into_iter()
            .map(|sig| signal_hook::flag::register(sig, Arc::clone(&flag)))
            .collect::<io::Result<Vec<_>>>()?;
        tracing::debug!("Break handler registered");
        Ok(Self { flag, ids })
    }

    /// Whether a break arrived since the last call; clears the flag
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for BreakSignal {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_sets_flag() {
        let breaks = BreakSignal::register().unwrap();
        assert!(!breaks.is_pending());
        signal_hook::low_level::raise(SIGINT).unwrap();
        assert!(breaks.take());
        assert!(!breaks.take());
    }
}
