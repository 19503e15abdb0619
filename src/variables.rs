//! Variable Store: per-scope variable maps and narrowest-first resolution
//!
//! A [`ScopeChain`] is an owned snapshot: request overrides, then folders
//! (nearest first), then the collection, then the active environment.
//! Environments live in a [`VariableStore`] shared behind a reader-writer lock
//! so any number of executions can snapshot it while edits take it exclusively.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{EnvironmentError, UnresolvedVariable};

/// Names are unique within a scope; setting a name again overwrites it
pub type VariableMap = BTreeMap<String, String>;

/// Where a scope in the chain came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Request,
    Folder(String),
    Collection(String),
    Environment(String),
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Request => write!(f, "request"),
            ScopeKind::Folder(name) => write!(f, "folder {}", name),
            ScopeKind::Collection(name) => write!(f, "collection {}", name),
            ScopeKind::Environment(name) => write!(f, "environment {}", name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub variables: VariableMap,
}

/// Ordered scopes, most specific first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a less specific scope
    pub fn push(&mut self, kind: ScopeKind, variables: VariableMap) {
        self.scopes.push(Scope { kind, variables });
    }

    pub fn with(mut self, kind: ScopeKind, variables: VariableMap) -> Self {
        self.push(kind, variables);
        self
    }

    /// First binding for `name`, walking from narrowest to widest scope
    pub fn lookup(&self, name: &str) -> Option<(&ScopeKind, &str)> {
        self.scopes.iter().find_map(|scope| {
            scope
                .variables
                .get(name)
                .map(|value| (&scope.kind, value.as_str()))
        })
    }

    pub fn resolve(&self, name: &str) -> Result<&str, UnresolvedVariable> {
        self.lookup(name)
            .map(|(_, value)| value)
            .ok_or_else(|| UnresolvedVariable(name.to_string()))
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Named, switchable variable set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub variables: VariableMap,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            name: name.into(),
            variables: VariableMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

/// All environments plus which one (if any) is active
#[derive(Clone, Debug, Default)]
pub struct VariableStore {
    environments: Vec<Environment>,
    active: Option<usize>,
}

pub type SharedVariables = Arc<RwLock<VariableStore>>;

impl VariableStore {
    /// No environment is active until one is explicitly selected
    pub fn new(environments: Vec<Environment>) -> Self {
        let mut store = VariableStore::default();
        for env in environments {
            store.upsert(env);
        }
        store
    }

    pub fn into_shared(self) -> SharedVariables {
        Arc::new(RwLock::new(self))
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    pub fn active(&self) -> Option<&Environment> {
        self.active.and_then(|i| self.environments.get(i))
    }

    pub fn activate(&mut self, name: &str) -> Result<(), EnvironmentError> {
        let index = self
            .environments
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| EnvironmentError::UnknownEnvironment(name.to_string()))?;
        self.active = Some(index);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = None;
    }

    /// Step none -> first -> ... -> last -> none
    pub fn cycle_active(&mut self) -> Option<&Environment> {
        self.active = match self.active {
            None if !self.environments.is_empty() => Some(0),
            Some(i) if i + 1 < self.environments.len() => Some(i + 1),
            _ => None,
        };
        self.active()
    }

    /// Set one variable in a named environment
    pub fn set(
        &mut self,
        environment: &str,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), EnvironmentError> {
        let env = self
            .environments
            .iter_mut()
            .find(|e| e.name == environment)
            .ok_or_else(|| EnvironmentError::UnknownEnvironment(environment.to_string()))?;
        env.set(name, value);
        Ok(())
    }

    /// Insert an environment or replace the one with the same name wholesale
    pub fn upsert(&mut self, environment: Environment) {
        match self
            .environments
            .iter_mut()
            .find(|e| e.name == environment.name)
        {
            Some(existing) => *existing = environment,
            None => self.environments.push(environment),
        }
    }
}

/// Read access that survives a panicked writer
pub fn read_store(store: &SharedVariables) -> RwLockReadGuard<'_, VariableStore> {
    store.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write_store(store: &SharedVariables) -> RwLockWriteGuard<'_, VariableStore> {
    store.write().unwrap_or_else(PoisonError::into_inner)
}
