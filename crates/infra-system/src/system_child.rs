// ChildProcess adapter over tokio::process::Child
// reason: tokio owns SIGCHLD handling and reaping; nix only delivers SIGTERM
use async_trait::async_trait;
use std::io;
use std::process::ExitStatus;
use tokio::process::Child;
use tracing::debug;

use procwarden_core::application::supervisor::constants::SIGNAL_EXIT_BASE;
use procwarden_core::port::ChildProcess;

/// A real OS process spawned through tokio
pub struct SystemChild {
    inner: Child,
    pid: Option<u32>,
}

impl SystemChild {
    pub fn new(inner: Child) -> Self {
        // tokio forgets the id once the child is reaped; keep the spawn-time value
        let pid = inner.id();
        Self { inner, pid }
    }
}

#[async_trait]
impl ChildProcess for SystemChild {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> io::Result<i32> {
        let status = self.inner.wait().await?;
        Ok(exit_code(status))
    }

    fn terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            // inner.id() is None once reaped, so a recycled pid is never signalled
            let Some(pid) = self.inner.id() else {
                return Ok(());
            };
            debug!(pid = pid, "Sending SIGTERM");
            kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
        }

        #[cfg(windows)]
        {
            // No SIGTERM on Windows: TerminateProcess
            self.inner.start_kill()
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        debug!(pid = ?self.pid, "Sending SIGKILL");
        self.inner.start_kill()
    }
}

/// Map an exit status to a single code; signal deaths become 128 + signal
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }

    -1
}
