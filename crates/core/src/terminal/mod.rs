use std::io;

/// Guard holding a terminal in raw keyboard mode.
///
/// Line buffering and echo are off so single keypresses arrive at once.
/// Signal generation and output processing stay on, so Ctrl-C still
/// interrupts and log lines still render. The saved settings come back on
/// drop, and from the handlers of terminating signals while the guard lives.
#[derive(Debug)]
pub struct RawMode {
    #[cfg(unix)]
    inner: unix::Saved,
}

impl RawMode {
    /// Enters raw mode on standard input.
    #[cfg(unix)]
    pub fn acquire_stdin() -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;
        Self::acquire(io::stdin().as_raw_fd())
    }

    #[cfg(not(unix))]
    pub fn acquire_stdin() -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "raw keyboard mode is only available on unix terminals",
        ))
    }

    /// Enters raw mode on `fd`, which must refer to a terminal.
    #[cfg(unix)]
    pub fn acquire(fd: std::os::unix::io::RawFd) -> io::Result<Self> {
        Ok(Self {
            inner: unix::Saved::make_raw(fd)?,
        })
    }

    /// Restores the terminal settings captured at acquisition.
    #[cfg(unix)]
    pub fn restore(&self) -> io::Result<()> {
        self.inner.restore()
    }

    #[cfg(not(unix))]
    pub fn restore(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(%err, "unable to restore terminal settings");
        }
    }
}

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::unix::io::RawFd;
    use std::sync::OnceLock;

    const RESTORE_ON: [libc::c_int; 4] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP, libc::SIGQUIT];

    /// Settings the signal handlers put back before the process dies.
    static SIGNAL_RESTORE: OnceLock<(RawFd, libc::termios)> = OnceLock::new();

    pub(super) struct Saved {
        fd: RawFd,
        original: libc::termios,
    }

    impl std::fmt::Debug for Saved {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Saved").field("fd", &self.fd).finish()
        }
    }

    impl Saved {
        pub(super) fn make_raw(fd: RawFd) -> io::Result<Self> {
            if unsafe { libc::isatty(fd) } == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "input is not a terminal",
                ));
            }

            let mut termios: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
                return Err(io::Error::last_os_error());
            }
            let original = termios;

            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
                return Err(io::Error::last_os_error());
            }

            if SIGNAL_RESTORE.set((fd, original)).is_ok() {
                for signum in RESTORE_ON {
                    let handler = restore_and_reraise as extern "C" fn(libc::c_int);
                    unsafe {
                        libc::signal(signum, handler as libc::sighandler_t);
                    }
                }
            }

            Ok(Self { fd, original })
        }

        pub(super) fn restore(&self) -> io::Result<()> {
            if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.original) } != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }

    // tcsetattr, signal and raise are async-signal-safe.
    extern "C" fn restore_and_reraise(signum: libc::c_int) {
        if let Some((fd, original)) = SIGNAL_RESTORE.get() {
            unsafe {
                libc::tcsetattr(*fd, libc::TCSANOW, original);
            }
        }
        unsafe {
            libc::signal(signum, libc::SIG_DFL);
            libc::raise(signum);
        }
    }
}
