// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Remote command transport.
//!
//! Devices are driven by running commands on them over ssh. [`RemoteShell`]
//! is the capability every operation is written against; [`SshShell`] is the
//! real implementation, shelling out to `ssh` (key based) or `sshpass` +
//! `ssh` (password based) depending on its [`Credential`].

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` on {host} failed ({})", describe_exit(.code))]
    Exit {
        host: String,
        command: String,
        code: Option<i32>,
    },

    #[error("I/O error running `{command}` on {host}: {source}")]
    Io {
        host: String,
        command: String,
        #[source]
        source: io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Run commands on a remote host.
///
/// `command` is passed as separate words; the remote side sees them joined
/// by spaces, as ssh does.
pub trait RemoteShell {
    /// Run to completion and return stdout. Stderr goes to our stderr.
    fn output(&self, host: &str, command: &[&str]) -> Result<Vec<u8>, RemoteError>;

    /// Run to completion and return stdout followed by stderr.
    fn combined_output(&self, host: &str, command: &[&str]) -> Result<Vec<u8>, RemoteError>;

    /// Run to completion with `input` fed to the command's stdin.
    fn run_with_input(&self, host: &str, command: &[&str], input: &[u8])
        -> Result<(), RemoteError>;

    /// Start a command in the background. Killing the returned process
    /// must also end the command on the remote side. See [`ProcessGuard`].
    fn spawn(&self, host: &str, command: &[&str]) -> Result<Box<dyn RemoteProcess>, RemoteError>;

    /// Start a command whose stdout is consumed while it runs.
    fn stream(&self, host: &str, command: &[&str]) -> Result<Box<dyn RemoteStream>, RemoteError>;
}

/// A background remote command.
pub trait RemoteProcess {
    fn kill(&mut self) -> io::Result<()>;
}

/// A running remote command with a readable stdout.
pub trait RemoteStream {
    /// Take the stdout pipe. Returns `None` once taken.
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Wait for the command to exit.
    fn wait(self: Box<Self>) -> Result<(), RemoteError>;
}

/// Kills the wrapped process when dropped.
pub struct ProcessGuard {
    process: Box<dyn RemoteProcess>,
}

impl ProcessGuard {
    pub fn new(process: Box<dyn RemoteProcess>) -> Self {
        Self { process }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Err(e) = self.process.kill() {
            warn!("failed to stop background command: {e}");
        }
    }
}

/// How to authenticate to the remote host.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Plain `ssh`; keys come from the agent or `~/.ssh`.
    Agent,
    /// Password handed to `sshpass` through the environment. Host key
    /// checking is disabled since factory devices regenerate their keys.
    Password(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Agent => f.write_str("Agent"),
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// [`RemoteShell`] backed by the system `ssh` client.
#[derive(Clone, Debug)]
pub struct SshShell {
    user: Option<String>,
    credential: Credential,
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new()
    }
}

impl SshShell {
    /// Key based ssh as the current ssh config's default user.
    pub fn new() -> Self {
        Self {
            user: None,
            credential: Credential::Agent,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    fn program(&self) -> &'static str {
        match self.credential {
            Credential::Agent => "ssh",
            Credential::Password(_) => "sshpass",
        }
    }

    /// Build the local command that runs `remote` on `host`.
    pub fn command(&self, host: &str, remote: &[&str]) -> Command {
        self.build(host, remote, false)
    }

    /// Like [`command`](Self::command) but forces a remote tty, so the
    /// remote process gets SIGHUP when the local client is killed.
    pub fn background_command(&self, host: &str, remote: &[&str]) -> Command {
        self.build(host, remote, true)
    }

    fn build(&self, host: &str, remote: &[&str], tty: bool) -> Command {
        let target = match &self.user {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        };

        let mut cmd = Command::new(self.program());
        if let Credential::Password(password) = &self.credential {
            cmd.env("SSHPASS", password)
                .arg("-e")
                .arg("ssh")
                .arg("-oStrictHostKeyChecking=no")
                .arg("-oUserKnownHostsFile=/dev/null");
        }
        if tty {
            cmd.arg("-tt");
        }
        cmd.arg(target).args(remote);
        cmd
    }

    fn spawn_child(
        &self,
        host: &str,
        remote: &[&str],
        cmd: &mut Command,
    ) -> Result<Child, RemoteError> {
        debug!(host, command = %remote.join(" "), "spawning");
        cmd.spawn().map_err(|source| RemoteError::Spawn {
            program: self.program(),
            source,
        })
    }
}

fn check_exit(host: &str, command: &[&str], status: ExitStatus) -> Result<(), RemoteError> {
    if status.success() {
        Ok(())
    } else {
        Err(RemoteError::Exit {
            host: host.to_string(),
            command: command.join(" "),
            code: status.code(),
        })
    }
}

impl RemoteShell for SshShell {
    #[instrument(level = "debug", skip(self), err)]
    fn output(&self, host: &str, command: &[&str]) -> Result<Vec<u8>, RemoteError> {
        let mut cmd = self.command(host, command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let child = self.spawn_child(host, command, &mut cmd)?;
        let out = child.wait_with_output().map_err(|source| RemoteError::Io {
            host: host.to_string(),
            command: command.join(" "),
            source,
        })?;
        check_exit(host, command, out.status)?;
        Ok(out.stdout)
    }

    #[instrument(level = "debug", skip(self), err)]
    fn combined_output(&self, host: &str, command: &[&str]) -> Result<Vec<u8>, RemoteError> {
        let mut cmd = self.command(host, command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let child = self.spawn_child(host, command, &mut cmd)?;
        let out = child.wait_with_output().map_err(|source| RemoteError::Io {
            host: host.to_string(),
            command: command.join(" "),
            source,
        })?;
        check_exit(host, command, out.status)?;
        let mut combined = out.stdout;
        combined.extend_from_slice(&out.stderr);
        Ok(combined)
    }

    #[instrument(level = "debug", skip(self, input), fields(bytes = input.len()), err)]
    fn run_with_input(
        &self,
        host: &str,
        command: &[&str],
        input: &[u8],
    ) -> Result<(), RemoteError> {
        let mut cmd = self.command(host, command);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let mut child = self.spawn_child(host, command, &mut cmd)?;

        // Drop stdin after writing so the remote side sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input).and_then(|_| stdin.flush()),
            None => Ok(()),
        };

        let status = child.wait().map_err(|source| RemoteError::Io {
            host: host.to_string(),
            command: command.join(" "),
            source,
        })?;
        // A failed exit explains a broken pipe better than the pipe error does
        check_exit(host, command, status)?;
        written.map_err(|source| RemoteError::Io {
            host: host.to_string(),
            command: command.join(" "),
            source,
        })
    }

    fn spawn(&self, host: &str, command: &[&str]) -> Result<Box<dyn RemoteProcess>, RemoteError> {
        let mut cmd = self.background_command(host, command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        let child = self.spawn_child(host, command, &mut cmd)?;
        Ok(Box::new(SshProcess { child }))
    }

    fn stream(&self, host: &str, command: &[&str]) -> Result<Box<dyn RemoteStream>, RemoteError> {
        let mut cmd = self.command(host, command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let child = self.spawn_child(host, command, &mut cmd)?;
        Ok(Box::new(SshStream {
            child,
            host: host.to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }))
    }
}

struct SshProcess {
    child: Child,
}

impl RemoteProcess for SshProcess {
    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()?;
        self.child.wait().map(|_| ())
    }
}

struct SshStream {
    child: Child,
    host: String,
    command: Vec<String>,
}

impl RemoteStream for SshStream {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as Box<dyn Read + Send>)
    }

    fn wait(mut self: Box<Self>) -> Result<(), RemoteError> {
        let command: Vec<&str> = self.command.iter().map(String::as_str).collect();
        let status = self.child.wait().map_err(|source| RemoteError::Io {
            host: self.host.clone(),
            command: command.join(" "),
            source,
        })?;
        check_exit(&self.host, &command, status)
    }
}

/// Reachability check for a host.
pub trait Prober {
    fn probe(&self, host: &str) -> bool;
}

/// Single ICMP echo via the system `ping`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PingProber;

impl Prober for PingProber {
    fn probe(&self, host: &str) -> bool {
        Command::new("ping")
            .args(["-c", "1", host])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
