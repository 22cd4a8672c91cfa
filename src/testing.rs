//! Scripted [`CommandRunner`] for unit tests.
//!
//! Records every run, spawn, terminate, kill and wait in call order. Run
//! outcomes are scripted per keyword: the first rule whose keyword appears in
//! the invocation's arguments answers, popping queued outcomes until only the
//! last one is left, which then repeats.

use crate::error::{BootstrapError, Result};
use crate::process::{CommandRunner, DaemonProcess, Exit, Invocation};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scripted {
    Exit(Exit),
    LaunchFailure,
}

impl Scripted {
    pub(crate) const CLEAN: Scripted = Scripted::Exit(Exit::Clean);
    pub(crate) const FAILED: Scripted = Scripted::Exit(Exit::Failed { code: Some(1) });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    Run,
    Spawn,
    Terminate,
    Kill,
    Wait,
}

#[derive(Debug, Clone)]
pub(crate) struct Event {
    pub kind: EventKind,
    pub invocation: Option<Invocation>,
    /// Whether the watched path existed when the event happened.
    pub path_existed: bool,
}

impl Event {
    /// Docker subcommand (first argument after `--host <endpoint>`), if any.
    pub(crate) fn subcommand(&self) -> Option<&str> {
        let args = self.invocation.as_ref()?.get_args();
        let idx = args.iter().position(|a| a == "--host").map_or(0, |i| i + 2);
        args.get(idx).map(String::as_str)
    }
}

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<Event>>,
    watched: Option<PathBuf>,
}

impl Shared {
    fn record(&self, kind: EventKind, invocation: Option<&Invocation>) {
        let path_existed = self.watched.as_ref().is_some_and(|p| p.exists());
        self.events.lock().unwrap().push(Event {
            kind,
            invocation: invocation.cloned(),
            path_existed,
        });
    }
}

#[derive(Default)]
pub(crate) struct ScriptedRunner {
    shared: Arc<Shared>,
    rules: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    spawn_fails: bool,
    wait_exit: Option<Exit>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Tracks whether `path` exists at every recorded event.
    pub(crate) fn watching(mut self, path: impl Into<PathBuf>) -> Self {
        self.shared = Arc::new(Shared {
            events: Mutex::new(Vec::new()),
            watched: Some(path.into()),
        });
        self
    }

    pub(crate) fn on(self, keyword: &str, outcomes: impl IntoIterator<Item = Scripted>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((keyword.to_string(), outcomes.into_iter().collect()));
        self
    }

    pub(crate) fn failing_spawn(mut self) -> Self {
        self.spawn_fails = true;
        self
    }

    /// Exit reported by the spawned process's `wait`.
    pub(crate) fn daemon_exit(mut self, exit: Exit) -> Self {
        self.wait_exit = Some(exit);
        self
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.shared.events.lock().unwrap().clone()
    }

    pub(crate) fn runs_of(&self, subcommand: &str) -> Vec<Invocation> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == EventKind::Run && e.subcommand() == Some(subcommand))
            .filter_map(|e| e.invocation)
            .collect()
    }

    fn answer(&self, invocation: &Invocation) -> Scripted {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules.iter_mut().find(|(keyword, _)| {
            invocation.get_args().iter().any(|a| a == keyword)
                || invocation.program().ends_with(keyword)
        });
        match rule {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some((_, queue)) => queue.front().copied().unwrap_or(Scripted::CLEAN),
            None => Scripted::CLEAN,
        }
    }
}

fn launch_failure(invocation: &Invocation) -> BootstrapError {
    BootstrapError::Launch {
        program: invocation.display_name(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    }
}

impl CommandRunner for ScriptedRunner {
    type Process = ScriptedProcess;

    async fn run(&self, invocation: &Invocation) -> Result<Exit> {
        self.shared.record(EventKind::Run, Some(invocation));
        match self.answer(invocation) {
            Scripted::Exit(exit) => Ok(exit),
            Scripted::LaunchFailure => Err(launch_failure(invocation)),
        }
    }

    fn spawn(&self, invocation: &Invocation) -> Result<ScriptedProcess> {
        if self.spawn_fails {
            return Err(launch_failure(invocation));
        }
        self.shared.record(EventKind::Spawn, Some(invocation));
        Ok(ScriptedProcess {
            shared: Arc::clone(&self.shared),
            exit: self.wait_exit.unwrap_or(Exit::Clean),
            running: true,
        })
    }
}

pub(crate) struct ScriptedProcess {
    shared: Arc<Shared>,
    exit: Exit,
    running: bool,
}

impl DaemonProcess for ScriptedProcess {
    fn id(&self) -> Option<u32> {
        self.running.then_some(4242)
    }

    fn terminate(&mut self) -> Result<()> {
        self.shared.record(EventKind::Terminate, None);
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        self.shared.record(EventKind::Kill, None);
        self.running = false;
        Ok(())
    }

    async fn wait(&mut self) -> Result<Exit> {
        self.shared.record(EventKind::Wait, None);
        self.running = false;
        Ok(self.exit)
    }
}
