// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory stand-ins for the remote shell, prober and HTTP services.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::rc::Rc;

use airctl_common::firmware::{FirmwareSource, UpdateStatus};
use airctl_common::remote::{RemoteProcess, RemoteStream};
use airctl_common::stats::MetricsSink;
use airctl_common::{Prober, RemoteError, RemoteShell};

/// How a remote command was invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Output,
    Combined,
    Input,
    Spawn,
    Stream,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub host: String,
    pub command: String,
    pub input: Option<Vec<u8>>,
}

/// Scripted remote shell.
///
/// Replies are queued per command line (words joined by spaces) and
/// consumed in order. A command with no reply left fails with exit 255,
/// like ssh does when it cannot connect.
#[derive(Default)]
pub struct FakeShell {
    replies: RefCell<HashMap<String, VecDeque<Result<Vec<u8>, i32>>>>,
    calls: RefCell<Vec<Call>>,
    killed: Rc<Cell<usize>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful run printing `stdout`.
    pub fn reply(self, command: &str, stdout: impl AsRef<[u8]>) -> Self {
        self.push(command, Ok(stdout.as_ref().to_vec()));
        self
    }

    /// Queue a run exiting with `code`.
    pub fn fail(self, command: &str, code: i32) -> Self {
        self.push(command, Err(code));
        self
    }

    fn push(&self, command: &str, reply: Result<Vec<u8>, i32>) {
        self.replies
            .borrow_mut()
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.command.clone()).collect()
    }

    /// Number of background processes killed so far.
    pub fn killed(&self) -> usize {
        self.killed.get()
    }

    fn answer(
        &self,
        kind: CallKind,
        host: &str,
        command: &[&str],
        input: Option<&[u8]>,
    ) -> Result<Vec<u8>, RemoteError> {
        let line = command.join(" ");
        self.calls.borrow_mut().push(Call {
            kind,
            host: host.to_string(),
            command: line.clone(),
            input: input.map(<[u8]>::to_vec),
        });

        let reply = self
            .replies
            .borrow_mut()
            .get_mut(&line)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(255));

        reply.map_err(|code| RemoteError::Exit {
            host: host.to_string(),
            command: line,
            code: Some(code),
        })
    }
}

impl RemoteShell for FakeShell {
    fn output(&self, host: &str, command: &[&str]) -> Result<Vec<u8>, RemoteError> {
        self.answer(CallKind::Output, host, command, None)
    }

    fn combined_output(&self, host: &str, command: &[&str]) -> Result<Vec<u8>, RemoteError> {
        self.answer(CallKind::Combined, host, command, None)
    }

    fn run_with_input(
        &self,
        host: &str,
        command: &[&str],
        input: &[u8],
    ) -> Result<(), RemoteError> {
        self.answer(CallKind::Input, host, command, Some(input))
            .map(|_| ())
    }

    fn spawn(&self, host: &str, command: &[&str]) -> Result<Box<dyn RemoteProcess>, RemoteError> {
        self.answer(CallKind::Spawn, host, command, None)?;
        Ok(Box::new(FakeProcess {
            killed: Rc::clone(&self.killed),
        }))
    }

    /// The queued reply becomes the stream's stdout. A failing reply gives
    /// an empty stdout and fails on wait.
    fn stream(&self, host: &str, command: &[&str]) -> Result<Box<dyn RemoteStream>, RemoteError> {
        let result = self.answer(CallKind::Stream, host, command, None);
        let (stdout, exit) = match result {
            Ok(stdout) => (stdout, Ok(())),
            Err(e) => (Vec::new(), Err(e)),
        };
        Ok(Box::new(FakeStream {
            stdout: Some(Cursor::new(stdout)),
            exit,
        }))
    }
}

struct FakeProcess {
    killed: Rc<Cell<usize>>,
}

impl RemoteProcess for FakeProcess {
    fn kill(&mut self) -> io::Result<()> {
        self.killed.set(self.killed.get() + 1);
        Ok(())
    }
}

struct FakeStream {
    stdout: Option<Cursor<Vec<u8>>>,
    exit: Result<(), RemoteError>,
}

impl RemoteStream for FakeStream {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout
            .take()
            .map(|stdout| Box::new(stdout) as Box<dyn Read + Send>)
    }

    fn wait(self: Box<Self>) -> Result<(), RemoteError> {
        self.exit
    }
}

/// Hosts come up after a set number of probes.
#[derive(Default)]
pub struct FakeProber {
    up_after: HashMap<String, u32>,
    probes: RefCell<Vec<String>>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// `host` answers from its `n`th probe on (1 = immediately).
    pub fn up_after(mut self, host: &str, n: u32) -> Self {
        self.up_after.insert(host.to_string(), n);
        self
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.borrow().clone()
    }

    pub fn probe_count(&self, host: &str) -> usize {
        self.probes.borrow().iter().filter(|h| *h == host).count()
    }
}

impl Prober for FakeProber {
    fn probe(&self, host: &str) -> bool {
        self.probes.borrow_mut().push(host.to_string());
        let seen = self.probe_count(host) as u32;
        self.up_after.get(host).is_some_and(|n| seen >= *n)
    }
}

/// Vendor service returning a fixed status and image.
pub struct FakeSource {
    pub status: UpdateStatus,
    pub image: Vec<u8>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn new(status: UpdateStatus, image: Vec<u8>) -> Self {
        Self {
            status,
            image,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl FirmwareSource for FakeSource {
    type Error = io::Error;

    fn check(&self, board_id: &str, version: &str) -> Result<UpdateStatus, io::Error> {
        self.calls
            .borrow_mut()
            .push(format!("check sysid={board_id} fwver={version}"));
        Ok(self.status.clone())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, io::Error> {
        self.calls.borrow_mut().push(format!("download {url}"));
        Ok(self.image.clone())
    }
}

/// Metrics store keeping every body written to it.
#[derive(Default)]
pub struct FakeSink {
    pub bodies: RefCell<Vec<String>>,
    pub reject: bool,
}

impl MetricsSink for FakeSink {
    type Error = io::Error;

    fn write(&self, body: &str) -> Result<(), io::Error> {
        if self.reject {
            return Err(io::Error::other("influx: 400 Bad Request"));
        }
        self.bodies.borrow_mut().push(body.to_string());
        Ok(())
    }
}
