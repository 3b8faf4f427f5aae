//! Child process control
//!
//! The dashboard only ever needs four things from a game process: its pid,
//! whether it has exited, a polite termination request and a hard kill.
//! [`Launcher`] / [`ChildProcess`] put those behind traits so the state
//! machine in `dashboard` can be driven by a fake in tests.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crate::protocol::LaunchParams;

/// Observed state of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    /// Exit code, `None` when the platform reported none (killed by signal)
    Exited(Option<i32>),
}

/// A launched game process
pub trait ChildProcess: Send {
    fn id(&self) -> u32;
    /// Non-blocking exit check
    fn poll(&mut self) -> io::Result<Liveness>;
    /// Ask the process to exit (SIGTERM on unix)
    fn terminate(&mut self) -> io::Result<()>;
    /// Force the process down and reap it
    fn kill(&mut self) -> io::Result<Option<i32>>;
}

/// Spawns game processes
pub trait Launcher: Send {
    /// Human readable command line, for logs
    fn describe(&self, params: &LaunchParams) -> Vec<String>;
    fn launch(&mut self, params: &LaunchParams) -> io::Result<Box<dyn ChildProcess>>;
}

/// Launches the game binary as a real OS process
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Launcher for CommandLauncher {
    fn describe(&self, params: &LaunchParams) -> Vec<String> {
        let mut args = vec![self.program.display().to_string()];
        args.extend(params.to_args());
        args
    }

    fn launch(&mut self, params: &LaunchParams) -> io::Result<Box<dyn ChildProcess>> {
        if !self.program.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("game binary not found: {}", self.program.display()),
            ));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(params.to_args()).stdin(Stdio::null());
        // Own session/process group: stopping the dashboard leaves the game alone
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        Ok(Box::new(OsChild { child }))
    }
}

/// [`ChildProcess`] over `std::process::Child`
#[derive(Debug)]
pub struct OsChild {
    child: Child,
}

impl ChildProcess for OsChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn poll(&mut self) -> io::Result<Liveness> {
        Ok(match self.child.try_wait()? {
            Some(status) => Liveness::Exited(status.code()),
            None => Liveness::Running,
        })
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let pid = i32::try_from(self.child.id())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        kill(Pid::from_raw(pid), Signal::SIGTERM)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn kill(&mut self) -> io::Result<Option<i32>> {
        // Already exited is fine; wait() below reaps either way
        if let Err(e) = self.child.kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(e);
            }
        }
        Ok(self.child.wait()?.code())
    }
}

/// Graceful-stop budget: poll `attempts` times, `interval` apart, then kill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(150),
        }
    }
}

/// How a stop concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    pub retcode: Option<i32>,
    /// The child ignored the termination request and was killed
    pub forced: bool,
}

/// Terminate, wait a bounded time, kill if still alive
///
/// Blocks for up to `attempts * interval`. Errors from the polite path fall
/// through to the kill.
pub fn stop_child(child: &mut dyn ChildProcess, policy: StopPolicy) -> io::Result<StopOutcome> {
    let graceful = (|| -> io::Result<Option<Option<i32>>> {
        child.terminate()?;
        for _ in 0..policy.attempts {
            if let Liveness::Exited(code) = child.poll()? {
                return Ok(Some(code));
            }
            std::thread::sleep(policy.interval);
        }
        match child.poll()? {
            Liveness::Exited(code) => Ok(Some(code)),
            Liveness::Running => Ok(None),
        }
    })();

    match graceful {
        Ok(Some(retcode)) => Ok(StopOutcome {
            retcode,
            forced: false,
        }),
        Ok(None) => Ok(StopOutcome {
            retcode: child.kill()?,
            forced: true,
        }),
        Err(e) => {
            log::warn!("Graceful stop of pid {} failed: {e}", child.id());
            Ok(StopOutcome {
                retcode: child.kill()?,
                forced: true,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted launcher and child for state machine tests

    use std::sync::{Arc, Mutex, PoisonError};

    use super::*;

    /// Shared view of a fake child, kept by the test after handing the child over
    #[derive(Debug, Default)]
    pub struct FakeState {
        pub exited: Option<Option<i32>>,
        /// `poll` fails instead of answering
        pub poll_fails: bool,
        /// Exit on SIGTERM (otherwise only `kill` works)
        pub obeys_terminate: bool,
        pub terminated: u32,
        pub killed: u32,
    }

    pub type Shared = Arc<Mutex<FakeState>>;

    pub struct FakeChild {
        pub pid: u32,
        pub state: Shared,
    }

    impl FakeChild {
        fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
            f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    impl ChildProcess for FakeChild {
        fn id(&self) -> u32 {
            self.pid
        }

        fn poll(&mut self) -> io::Result<Liveness> {
            self.with(|s| {
                if s.poll_fails {
                    return Err(io::Error::other("waitpid failed"));
                }
                Ok(match s.exited {
                    Some(code) => Liveness::Exited(code),
                    None => Liveness::Running,
                })
            })
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.with(|s| {
                s.terminated += 1;
                if s.obeys_terminate && s.exited.is_none() {
                    s.exited = Some(Some(0));
                }
            });
            Ok(())
        }

        fn kill(&mut self) -> io::Result<Option<i32>> {
            Ok(self.with(|s| {
                s.killed += 1;
                if s.exited.is_none() {
                    s.exited = Some(None);
                }
                s.exited.flatten()
            }))
        }
    }

    /// Hands out fake children; records every launch
    #[derive(Default)]
    pub struct FakeLauncher {
        pub next_pid: u32,
        pub fail_with: Option<String>,
        pub obeys_terminate: bool,
        pub launched: Vec<(LaunchParams, Shared)>,
    }

    impl FakeLauncher {
        pub fn new() -> Self {
            Self {
                next_pid: 4000,
                obeys_terminate: true,
                ..Default::default()
            }
        }

        pub fn last(&self) -> Option<Shared> {
            self.launched.last().map(|(_, s)| s.clone())
        }
    }

    impl Launcher for FakeLauncher {
        fn describe(&self, params: &LaunchParams) -> Vec<String> {
            let mut args = vec!["asphalt-rush".to_string()];
            args.extend(params.to_args());
            args
        }

        fn launch(&mut self, params: &LaunchParams) -> io::Result<Box<dyn ChildProcess>> {
            if let Some(msg) = &self.fail_with {
                return Err(io::Error::new(io::ErrorKind::NotFound, msg.clone()));
            }
            self.next_pid += 1;
            let state = Arc::new(Mutex::new(FakeState {
                obeys_terminate: self.obeys_terminate,
                ..Default::default()
            }));
            self.launched.push((params.clone(), state.clone()));
            Ok(Box::new(FakeChild {
                pid: self.next_pid,
                state,
            }))
        }
    }
}
