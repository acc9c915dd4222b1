//! Process inspection helpers.

use sysinfo::{Pid, ProcessRefreshKind, System};

/// Answers "does this process still exist?" for the sweep.
pub trait ProcessProbe {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probes with a zero signal, which checks existence without delivering anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }
}

pub fn is_pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    #[cfg(unix)]
    {
        // SAFETY: kill with signal 0 performs only the existence and
        // permission checks; no signal is sent.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid, 0) };
        // EPERM: the process exists but belongs to someone else.
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Parent of the current process.
pub fn parent_pid() -> u32 {
    #[cfg(unix)]
    {
        // SAFETY: getppid() is a simple syscall with no failure modes.
        #[allow(unsafe_code)]
        let ppid = unsafe { libc::getppid() };
        ppid as u32
    }
    #[cfg(not(unix))]
    {
        std::process::id()
    }
}

/// Parent of an arbitrary process, or `None` if it can't be inspected.
/// Refreshes only the one PID rather than scanning the process table.
pub fn parent_of(pid: u32) -> Option<u32> {
    let mut sys = System::new();
    let sys_pid = Pid::from_u32(pid);
    sys.refresh_process_specifics(sys_pid, ProcessRefreshKind::new());
    sys.process(sys_pid)
        .and_then(|process| process.parent())
        .map(|parent| parent.as_u32())
}
