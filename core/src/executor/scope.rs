//! Run-wide variable store
//!
//! One `Scope` exists per run. It holds every variable, the set of frozen
//! constants, the declared web signatures, and the host hook used for
//! service calls.

use super::errors::RuntimeError;
use super::types::Value;
use crate::services::{NullHost, ServiceHost};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Reserved variable holding the last rendered fault message
pub const EXCEPTION_MESSAGE_KEY: &str = "_ExceptionMessage";

/// A declared web service
#[derive(Debug, Clone, PartialEq)]
pub struct WebSignature {
    pub service: String,
    pub params: Vec<String>,
    pub outputs: Vec<String>,
    pub url: Option<String>,
}

pub struct Scope {
    global: HashMap<String, Value>,
    constants: HashSet<String>,
    web_type: HashMap<String, WebSignature>,
    host: Arc<dyn ServiceHost>,
}

impl Scope {
    pub fn new(host: Arc<dyn ServiceHost>) -> Self {
        Self {
            global: HashMap::new(),
            constants: HashSet::new(),
            web_type: HashMap::new(),
            host,
        }
    }

    /// Scope pre-populated with host inputs
    pub fn with_inputs(host: Arc<dyn ServiceHost>, inputs: HashMap<String, Value>) -> Self {
        let mut scope = Scope::new(host);
        scope.global = inputs;
        scope
    }

    pub fn host(&self) -> &Arc<dyn ServiceHost> {
        &self.host
    }

    pub fn get(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.global
            .get(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    /// Bind `name`; rejected (and the old value kept) for constants
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.constants.contains(name) {
            return Err(RuntimeError::AssignToConstant(name.to_string()));
        }
        self.global.insert(name.to_string(), value);
        Ok(())
    }

    /// Freeze an already-bound name
    pub fn declare_const(&mut self, name: &str) -> Result<(), RuntimeError> {
        if !self.global.contains_key(name) {
            return Err(RuntimeError::UndefinedVariable(name.to_string()));
        }
        self.constants.insert(name.to_string());
        Ok(())
    }

    pub fn declare_web(&mut self, name: &str, signature: WebSignature) {
        self.web_type.insert(name.to_string(), signature);
    }

    pub fn web_signature(&self, name: &str) -> Option<&WebSignature> {
        self.web_type.get(name)
    }

    /// Mutable access for in-place composite updates
    pub fn get_mut_for_update(&mut self, name: &str) -> Result<&mut Value, RuntimeError> {
        if self.constants.contains(name) {
            return Err(RuntimeError::AssignToConstant(name.to_string()));
        }
        self.global
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.global.contains_key(name)
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// Drop a binding; constants stay frozen
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        if self.constants.contains(name) {
            return None;
        }
        self.global.remove(name)
    }

    /// Put back a binding shadowed by a function parameter
    pub(crate) fn restore(&mut self, name: &str, previous: Option<Value>) {
        match previous {
            Some(v) => {
                self.global.insert(name.to_string(), v);
            }
            None => {
                self.global.remove(name);
            }
        }
    }

    /// Snapshot of all variables, sorted by name
    pub fn variables(&self) -> BTreeMap<String, Value> {
        self.global
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn set_exception_message(&mut self, message: String) {
        self.global
            .insert(EXCEPTION_MESSAGE_KEY.to_string(), Value::Str(message));
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new(Arc::new(NullHost))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("global", &self.global)
            .field("constants", &self.constants)
            .field("web_type", &self.web_type)
            .finish_non_exhaustive()
    }
}
