use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::AgentError;

use super::traits::Agent;
use super::types::{AgentRole, TaskType};

struct Entry {
    agent: Arc<dyn Agent>,
    available: bool,
    load: Arc<AtomicUsize>,
}

impl Entry {
    fn acquire(&self) -> (Arc<dyn Agent>, LoadGuard) {
        self.load.fetch_add(1, Ordering::SeqCst);
        (
            self.agent.clone(),
            LoadGuard {
                load: self.load.clone(),
            },
        )
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Registration order; replacing an agent keeps its original slot.
    order: Vec<String>,
}

/// Availability and in-flight load of one registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentStatus {
    pub available: bool,
    pub active_tasks: usize,
}

/// Decrements an agent's in-flight count when dropped.
#[derive(Debug)]
pub struct LoadGuard {
    load: Arc<AtomicUsize>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.load.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Agents by id plus their declared capabilities and load state.
///
/// Read-mostly: lookups take a shared lock, registration takes the write lock.
#[derive(Default)]
pub struct AgentRegistry {
    inner: RwLock<Inner>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add or replace an agent. The last registration for an id wins.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<(), AgentError> {
        let id = agent.id().trim().to_string();
        if id.is_empty() {
            return Err(AgentError::InvalidRegistration(
                "agent id must not be empty".into(),
            ));
        }
        if agent.capabilities().task_types.is_empty() {
            return Err(AgentError::InvalidRegistration(format!(
                "agent '{id}' declares no task types"
            )));
        }

        let mut inner = self.write();
        let replaced = inner
            .entries
            .insert(
                id.clone(),
                Entry {
                    agent,
                    available: true,
                    load: Arc::new(AtomicUsize::new(0)),
                },
            )
            .is_some();
        if replaced {
            tracing::debug!(agent_id = %id, "agent re-registered");
        } else {
            inner.order.push(id.clone());
            tracing::debug!(agent_id = %id, "agent registered");
        }
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> Result<Arc<dyn Agent>, AgentError> {
        self.read()
            .entries
            .get(id)
            .map(|e| e.agent.clone())
            .ok_or_else(|| AgentError::NotFound(id.to_string()))
    }

    /// All agents supporting `task_type`, in registration order.
    pub fn find_by_capability(&self, task_type: TaskType) -> Vec<Arc<dyn Agent>> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .filter(|e| e.agent.capabilities().supports(task_type))
            .map(|e| e.agent.clone())
            .collect()
    }

    /// Pick the least-loaded available agent for a task type, optionally
    /// restricted to one role. Ties go to the earliest registration.
    pub fn select(
        &self,
        task_type: TaskType,
        role: Option<AgentRole>,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        let inner = self.read();
        least_loaded(&inner, task_type, role).map(|e| e.agent.clone())
    }

    /// [`select`](Self::select) and count the pick as in flight under one
    /// lock, so concurrent callers see each other's load.
    pub fn acquire_for(
        &self,
        task_type: TaskType,
        role: Option<AgentRole>,
    ) -> Result<(Arc<dyn Agent>, LoadGuard), AgentError> {
        let inner = self.write();
        least_loaded(&inner, task_type, role).map(Entry::acquire)
    }

    /// Mark an agent as (un)available for selection. Returns false for
    /// unknown ids.
    pub fn set_available(&self, id: &str, available: bool) -> bool {
        match self.write().entries.get_mut(id) {
            Some(entry) => {
                entry.available = available;
                true
            }
            None => false,
        }
    }

    pub fn status(&self, id: &str) -> Option<AgentStatus> {
        self.read().entries.get(id).map(|e| AgentStatus {
            available: e.available,
            active_tasks: e.load.load(Ordering::SeqCst),
        })
    }

    /// Fetch an agent and count one in-flight invocation against it until
    /// the returned guard is dropped. Agents marked unavailable are refused.
    pub fn acquire(&self, id: &str) -> Result<(Arc<dyn Agent>, LoadGuard), AgentError> {
        let inner = self.read();
        let entry = inner
            .entries
            .get(id)
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        if !entry.available {
            return Err(AgentError::Unavailable(id.to_string()));
        }
        Ok(entry.acquire())
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn least_loaded(
    inner: &Inner,
    task_type: TaskType,
    role: Option<AgentRole>,
) -> Result<&Entry, AgentError> {
    inner
        .order
        .iter()
        .filter_map(|id| inner.entries.get(id))
        .filter(|e| e.available)
        .filter(|e| e.agent.capabilities().supports(task_type))
        .filter(|e| role.map_or(true, |r| e.agent.role() == r))
        .min_by_key(|e| e.load.load(Ordering::SeqCst))
        .ok_or_else(|| {
            let wanted = match role {
                Some(r) => format!("{r} for {task_type}"),
                None => format!("any agent for {task_type}"),
            };
            AgentError::NotFound(wanted)
        })
}
