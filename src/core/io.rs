//! Raw terminal I/O
//!
//! [`TerminalIo`] is the byte-level seam between the console layer and the
//! process's standard descriptors. [`StdTerminal`] implements it over fds 0
//! and 1 with unbuffered `read(2)`/`write(2)`; terminal mode switching, tty
//! detection and window size go through crossterm.

use std::io;
#[cfg(unix)]
use std::sync::{Mutex, PoisonError};

/// Terminal window dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub columns: u16,
    pub rows: u16,
}

/// Byte-level access to the attached terminal
pub trait TerminalIo: Send + Sync {
    /// Read available input bytes, blocking until at least one arrives.
    /// `Ok(0)` means end of input.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write some of `buf`, returning how many bytes were accepted
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    fn is_input_terminal(&self) -> bool;

    fn is_output_terminal(&self) -> bool;

    fn window_size(&self) -> io::Result<WindowSize>;

    /// Whether a read would return without blocking
    fn input_ready(&self) -> io::Result<bool>;

    /// Block until a write after `WouldBlock` can make progress
    fn wait_writable(&self) -> io::Result<()>;

    /// Disable echo and line buffering
    fn enable_raw_mode(&self) -> io::Result<()>;

    fn disable_raw_mode(&self) -> io::Result<()>;
}

/// Keeps the terminal in raw mode for the guard's lifetime
pub struct RawModeGuard<'a> {
    io: &'a dyn TerminalIo,
}

impl<'a> RawModeGuard<'a> {
    pub fn enable(io: &'a dyn TerminalIo) -> io::Result<Self> {
        io.enable_raw_mode()?;
        Ok(Self { io })
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.io.disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Standard input/output of the current process
///
/// Raw mode nests: only the outermost enable/disable pair switches modes.
#[cfg(unix)]
pub struct StdTerminal {
    input_tty: bool,
    output_tty: bool,
    raw_depth: Mutex<usize>,
}

#[cfg(unix)]
impl StdTerminal {
    pub fn new() -> Self {
        use crossterm::tty::IsTty;

        Self {
            input_tty: io::stdin().is_tty(),
            output_tty: io::stdout().is_tty(),
            raw_depth: Mutex::new(0),
        }
    }
}

#[cfg(unix)]
impl Default for StdTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl TerminalIo for StdTerminal {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        // Safety: buf is a valid writable region of buf.len() bytes
        let n = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        // Safety: buf is a valid readable region of buf.len() bytes
        let n = unsafe {
            libc::write(
                libc::STDOUT_FILENO,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn is_input_terminal(&self) -> bool {
        self.input_tty
    }

    fn is_output_terminal(&self) -> bool {
        self.output_tty
    }

    fn window_size(&self) -> io::Result<WindowSize> {
        let (columns, rows) = crossterm::terminal::size()?;
        Ok(WindowSize { columns, rows })
    }

    fn input_ready(&self) -> io::Result<bool> {
        poll_fd(libc::STDIN_FILENO, libc::POLLIN, 0)
    }

    fn wait_writable(&self) -> io::Result<()> {
        // POLLERR/POLLHUP also end the wait; the next write reports them
        poll_fd(libc::STDOUT_FILENO, libc::POLLOUT, -1).map(|_| ())
    }

    fn enable_raw_mode(&self) -> io::Result<()> {
        let mut depth = self.raw_depth.lock().unwrap_or_else(PoisonError::into_inner);
        if *depth == 0 {
            crossterm::terminal::enable_raw_mode()?;
        }
        *depth += 1;
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        let mut depth = self.raw_depth.lock().unwrap_or_else(PoisonError::into_inner);
        match *depth {
            0 => Ok(()),
            1 => {
                crossterm::terminal::disable_raw_mode()?;
                *depth = 0;
                Ok(())
            }
            _ => {
                *depth -= 1;
                Ok(())
            }
        }
    }
}

/// Poll one descriptor, retrying on EINTR. A negative timeout waits forever.
#[cfg(unix)]
fn poll_fd(fd: libc::c_int, events: libc::c_short, timeout: libc::c_int) -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    loop {
        // Safety: fds points to exactly one initialized pollfd
        let rc = unsafe { libc::poll(&mut fds, 1, timeout) };
        if rc >= 0 {
            return Ok(rc > 0 && fds.revents & events != 0);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex};

    use super::{TerminalIo, WindowSize};

    /// Scripted terminal: each queued chunk is returned by one `read` call.
    ///
    /// By default an empty queue reads as end of input. A [`blocking`]
    /// terminal instead waits for more input until [`close_input`].
    ///
    /// [`blocking`]: MockTerminal::blocking
    /// [`close_input`]: MockTerminal::close_input
    pub(crate) struct MockTerminal {
        input: Mutex<VecDeque<Vec<u8>>>,
        input_arrived: Condvar,
        blocking: bool,
        closed: Mutex<bool>,
        output: Mutex<Vec<u8>>,
        input_tty: bool,
        output_tty: bool,
        size: Option<WindowSize>,
        write_error: Mutex<Option<io::ErrorKind>>,
        would_block: AtomicUsize,
        write_waits: AtomicUsize,
        raw_depth: AtomicUsize,
        raw_entries: AtomicUsize,
    }

    impl MockTerminal {
        pub(crate) fn new() -> Self {
            Self::with_tty(true, true)
        }

        pub(crate) fn with_tty(input_tty: bool, output_tty: bool) -> Self {
            Self {
                input: Mutex::new(VecDeque::new()),
                input_arrived: Condvar::new(),
                blocking: false,
                closed: Mutex::new(false),
                output: Mutex::new(Vec::new()),
                input_tty,
                output_tty,
                size: Some(WindowSize {
                    columns: 120,
                    rows: 40,
                }),
                write_error: Mutex::new(None),
                would_block: AtomicUsize::new(0),
                write_waits: AtomicUsize::new(0),
                raw_depth: AtomicUsize::new(0),
                raw_entries: AtomicUsize::new(0),
            }
        }

        pub(crate) fn without_size(mut self) -> Self {
            self.size = None;
            self
        }

        pub(crate) fn blocking(mut self) -> Self {
            self.blocking = true;
            self
        }

        pub(crate) fn push_input(&self, bytes: &[u8]) {
            self.input.lock().unwrap().push_back(bytes.to_vec());
            self.input_arrived.notify_all();
        }

        /// End of input for a blocking terminal once the queue drains
        pub(crate) fn close_input(&self) {
            *self.closed.lock().unwrap() = true;
            let _input = self.input.lock().unwrap();
            self.input_arrived.notify_all();
        }

        pub(crate) fn output(&self) -> Vec<u8> {
            self.output.lock().unwrap().clone()
        }

        pub(crate) fn output_string(&self) -> String {
            String::from_utf8_lossy(&self.output()).into_owned()
        }

        pub(crate) fn clear_output(&self) {
            self.output.lock().unwrap().clear();
        }

        pub(crate) fn fail_writes(&self, kind: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(kind);
        }

        /// Fail the next `count` writes with `WouldBlock`
        pub(crate) fn would_block(&self, count: usize) {
            self.would_block.store(count, Ordering::SeqCst);
        }

        pub(crate) fn write_waits(&self) -> usize {
            self.write_waits.load(Ordering::SeqCst)
        }

        pub(crate) fn is_raw(&self) -> bool {
            self.raw_depth.load(Ordering::SeqCst) > 0
        }

        pub(crate) fn raw_entries(&self) -> usize {
            self.raw_entries.load(Ordering::SeqCst)
        }
    }

    impl TerminalIo for MockTerminal {
        fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            let mut input = self.input.lock().unwrap();
            while self.blocking && input.is_empty() && !*self.closed.lock().unwrap() {
                input = self.input_arrived.wait(input).unwrap();
            }
            let Some(mut chunk) = input.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                input.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn write(&self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = *self.write_error.lock().unwrap() {
                return Err(io::Error::from(kind));
            }
            let blocked = self
                .would_block
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if blocked.is_ok() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            // Accept at most 7 bytes per call to exercise partial writes
            let n = buf.len().min(7);
            self.output.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn is_input_terminal(&self) -> bool {
            self.input_tty
        }

        fn is_output_terminal(&self) -> bool {
            self.output_tty
        }

        fn window_size(&self) -> io::Result<WindowSize> {
            self.size
                .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no window size"))
        }

        fn input_ready(&self) -> io::Result<bool> {
            Ok(!self.input.lock().unwrap().is_empty())
        }

        fn wait_writable(&self) -> io::Result<()> {
            self.write_waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn enable_raw_mode(&self) -> io::Result<()> {
            self.raw_depth.fetch_add(1, Ordering::SeqCst);
            self.raw_entries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn disable_raw_mode(&self) -> io::Result<()> {
            let _ = self
                .raw_depth
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
            Ok(())
        }
    }
}
