//! Signals that end a run early.
//!
//! Handlers are installed before any hook fires, so a signal arriving while
//! a script runs takes the normal shutdown path instead of killing the
//! process with the context file still on disk.

/// A termination request from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
    Hangup,
}

impl Termination {
    pub fn name(self) -> &'static str {
        match self {
            Termination::Interrupt => "SIGINT",
            Termination::Terminate => "SIGTERM",
            Termination::Hangup => "SIGHUP",
        }
    }

    /// Exit status reported for the signal, `128 + signo` as shells do.
    pub fn exit_code(self) -> u8 {
        match self {
            Termination::Interrupt => 130,
            Termination::Terminate => 143,
            Termination::Hangup => 129,
        }
    }
}

#[cfg(unix)]
pub struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::SignalKind;
        use tokio::signal::unix::signal;

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> Termination {
        tokio::select! {
            _ = self.interrupt.recv() => Termination::Interrupt,
            _ = self.terminate.recv() => Termination::Terminate,
            _ = self.hangup.recv() => Termination::Hangup,
        }
    }
}

#[cfg(windows)]
pub struct TerminationSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
    ctrl_break: tokio::signal::windows::CtrlBreak,
    ctrl_close: tokio::signal::windows::CtrlClose,
}

#[cfg(windows)]
impl TerminationSignals {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
            ctrl_break: tokio::signal::windows::ctrl_break()?,
            ctrl_close: tokio::signal::windows::ctrl_close()?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> Termination {
        tokio::select! {
            _ = self.ctrl_c.recv() => Termination::Interrupt,
            _ = self.ctrl_break.recv() => Termination::Interrupt,
            _ = self.ctrl_close.recv() => Termination::Hangup,
        }
    }
}
