//! In-memory engine used by the integration tests.
//!
//! Models container state, records every call in order and plays back
//! scripted exec sessions.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use stevedore_core::{Host, HostConfig};
use stevedore_engine::{
    encode_frame, CommitOptions, ContainerApi, ContainerCreateRequest, ContainerSummary,
    EngineError, ExecApi, ExecCreateRequest, ExecInspect, ExecStartRequest, IdResponse, ImageApi,
    ImageConfig, OutputStream, Result, StreamKind,
};

/// One engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(String),
    Start(String),
    Stop(String),
    Delete(String),
    Commit { repo: String, tag: String },
    Exec { cmd: Vec<String>, working_dir: String },
}

/// Scripted behaviour of one exec session.
#[derive(Debug, Clone)]
pub struct ExecPlan {
    pub exit_code: i64,
    pub output: Vec<Bytes>,
    pub running_polls: usize,
}

impl Default for ExecPlan {
    fn default() -> Self {
        Self {
            exit_code: 0,
            output: Vec::new(),
            running_polls: 1,
        }
    }
}

impl ExecPlan {
    pub fn exit(code: i64) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    /// Report the session as running for the first `polls` inspections.
    pub fn running_for(mut self, polls: usize) -> Self {
        self.running_polls = polls;
        self
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.output.push(encode_frame(StreamKind::Stdout, text.as_bytes()));
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.output.push(encode_frame(StreamKind::Stderr, text.as_bytes()));
        self
    }

    /// Re-cut the framed output into chunks of `size` bytes, ignoring frame
    /// boundaries, the way a transport may hand it out.
    pub fn rechunk(mut self, size: usize) -> Self {
        let joined: Vec<u8> = self.output.iter().flat_map(|b| b.iter().copied()).collect();
        self.output = joined.chunks(size).map(Bytes::copy_from_slice).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub request: ContainerCreateRequest,
    pub running: bool,
}

#[derive(Debug)]
struct FakeExec {
    plan: ExecPlan,
    polls: usize,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<FakeContainer>,
    calls: Vec<Call>,
    plans: VecDeque<ExecPlan>,
    execs: HashMap<String, FakeExec>,
    commits: Vec<(CommitOptions, ImageConfig)>,
    next_id: usize,
}

#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<State>,
}

fn not_found(what: &str) -> EngineError {
    EngineError::Api {
        status: 404,
        body: format!(r#"{{"message":"No such container: {what}"}}"#),
    }
}

fn conflict(message: String) -> EngineError {
    EngineError::Api {
        status: 409,
        body: format!(r#"{{"message":"{message}"}}"#),
    }
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Host over this engine with its shared root at `shared_root`.
    pub fn host(self: &Arc<Self>, shared_root: &Path) -> Host {
        let config = HostConfig::builder()
            .shared_root(shared_root)
            .build()
            .expect("valid config");
        Host::with_engine(self.clone(), config).expect("host")
    }

    /// Queue the behaviour of the next exec session.
    pub fn plan_exec(&self, plan: ExecPlan) {
        self.state.lock().unwrap().plans.push_back(plan);
    }

    /// Add an existing container, as if created earlier.
    pub fn seed_container(&self, name: &str, image: &str, running: bool) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed{}", state.next_id);
        state.containers.push(FakeContainer {
            id,
            name: name.to_string(),
            request: ContainerCreateRequest {
                image: image.to_string(),
                ..Default::default()
            },
            running,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count()
    }

    /// Commands executed, in order.
    pub fn commands(&self) -> Vec<(Vec<String>, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec { cmd, working_dir } => Some((cmd, working_dir)),
                _ => None,
            })
            .collect()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Total number of exec inspections served.
    pub fn inspections(&self) -> usize {
        self.state.lock().unwrap().execs.values().map(|e| e.polls).sum()
    }

    pub fn commits(&self) -> Vec<(CommitOptions, ImageConfig)> {
        self.state.lock().unwrap().commits.clone()
    }
}

impl State {
    fn find(&mut self, id: &str) -> Option<&mut FakeContainer> {
        self.containers
            .iter_mut()
            .find(|c| c.name == id || c.id == id)
    }
}

#[async_trait]
impl ContainerApi for FakeEngine {
    async fn list_containers(&self, _all: bool) -> Result<Vec<ContainerSummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        Ok(state
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
                image: c.request.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
            })
            .collect())
    }

    async fn create_container(
        &self,
        name: &str,
        config: &ContainerCreateRequest,
    ) -> Result<IdResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(name.to_string()));
        if state.find(name).is_some() {
            return Err(conflict(format!("name {name} is already in use")));
        }
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            request: config.clone(),
            running: false,
        });
        Ok(IdResponse { id, warnings: None })
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Start(id.to_string()));
        let container = state.find(id).ok_or_else(|| not_found(id))?;
        container.running = true;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Stop(id.to_string()));
        let container = state.find(id).ok_or_else(|| not_found(id))?;
        container.running = false;
        Ok(())
    }

    async fn delete_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(id.to_string()));
        let running = state.find(id).ok_or_else(|| not_found(id))?.running;
        if running {
            return Err(conflict(format!("container {id} is running")));
        }
        state.containers.retain(|c| c.name != id && c.id != id);
        Ok(())
    }
}

#[async_trait]
impl ImageApi for FakeEngine {
    async fn commit_container(
        &self,
        options: &CommitOptions,
        config: &ImageConfig,
    ) -> Result<IdResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Commit {
            repo: options.repo.clone(),
            tag: options.tag.clone(),
        });
        state
            .find(&options.container)
            .ok_or_else(|| not_found(&options.container))?;
        state.commits.push((options.clone(), config.clone()));
        Ok(IdResponse {
            id: format!("sha256:{:064}", state.commits.len()),
            warnings: None,
        })
    }
}

#[async_trait]
impl ExecApi for FakeEngine {
    async fn create_exec(
        &self,
        container: &str,
        config: &ExecCreateRequest,
    ) -> Result<IdResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Exec {
            cmd: config.cmd.clone(),
            working_dir: config.working_dir.clone().unwrap_or_default(),
        });
        let running = state.find(container).ok_or_else(|| not_found(container))?.running;
        if !running {
            return Err(conflict(format!("container {container} is not running")));
        }
        let plan = state.plans.pop_front().unwrap_or_default();
        state.next_id += 1;
        let id = format!("exec{}", state.next_id);
        state.execs.insert(id.clone(), FakeExec { plan, polls: 0 });
        Ok(IdResponse { id, warnings: None })
    }

    async fn start_exec(&self, exec_id: &str, _config: &ExecStartRequest) -> Result<OutputStream> {
        let state = self.state.lock().unwrap();
        let exec = state
            .execs
            .get(exec_id)
            .ok_or_else(|| not_found(exec_id))?;
        let chunks: Vec<Result<Bytes>> = exec.plan.output.iter().cloned().map(Ok).collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect> {
        let mut state = self.state.lock().unwrap();
        let exec = state
            .execs
            .get_mut(exec_id)
            .ok_or_else(|| not_found(exec_id))?;
        exec.polls += 1;
        let running = exec.polls <= exec.plan.running_polls;
        Ok(ExecInspect {
            running,
            exit_code: if running { None } else { Some(exec.plan.exit_code) },
        })
    }
}
