//! Host callbacks for web services and status reports
//!
//! The engine never talks to a transport itself. Calls to declared web
//! services are turned into a `ServiceRequest` and handed to a
//! `ServiceHost`; whatever the host returns becomes the call's value.

use crate::executor::Value;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// One outgoing web service call
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    /// Declared service name
    pub service: String,
    /// Name the script called it by (the alias, or the service name)
    pub alias: String,
    pub url: Option<String>,
    /// Declared parameter names paired with argument values
    pub args: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("no response configured for service '{0}'")]
    NotConfigured(String),

    #[error("{0}")]
    Failed(String),
}

/// Host-side hook invoked by the engine
pub trait ServiceHost: Send + Sync {
    fn invoke(&self, request: &ServiceRequest) -> Result<Value, ServiceError>;

    /// Receives the text of every `Status` statement
    fn report_status(&self, _text: &str) {}
}

/// Host without any services; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl ServiceHost for NullHost {
    fn invoke(&self, request: &ServiceRequest) -> Result<Value, ServiceError> {
        Err(ServiceError::NotConfigured(request.service.clone()))
    }
}

/* ===================== Mock Host ===================== */

#[derive(Debug, Deserialize)]
struct MockFile {
    #[serde(default)]
    services: HashMap<String, MockEntry>,
}

#[derive(Debug, Deserialize)]
struct MockEntry {
    #[serde(default)]
    response: Option<toml::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
enum Canned {
    Response(Value),
    Error(String),
}

/// Canned responses keyed by service (or alias) name
///
/// Every request and status report is recorded so tests and the CLI can
/// inspect what a run did.
#[derive(Debug, Default)]
pub struct MockServiceHost {
    canned: HashMap<String, Canned>,
    requests: Mutex<Vec<ServiceRequest>>,
    statuses: Mutex<Vec<String>>,
}

impl MockServiceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, service: impl Into<String>, response: Value) -> Self {
        self.canned
            .insert(service.into(), Canned::Response(response));
        self
    }

    pub fn with_error(mut self, service: impl Into<String>, message: impl Into<String>) -> Self {
        self.canned
            .insert(service.into(), Canned::Error(message.into()));
        self
    }

    /// Load canned responses from a TOML file
    ///
    /// ```toml
    /// [services.GetOrder]
    /// response = "<Order><Id>7</Id></Order>"
    ///
    /// [services.Broken]
    /// error = "connection refused"
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mock file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid mock file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: MockFile = toml::from_str(text).context("Failed to parse mock TOML")?;
        let mut host = MockServiceHost::new();
        for (name, entry) in file.services {
            let canned = match (entry.error, entry.response) {
                (Some(message), _) => Canned::Error(message),
                (None, Some(response)) => {
                    let json = serde_json::to_value(response)
                        .with_context(|| format!("Unsupported response for service {}", name))?;
                    Canned::Response(Value::from_json(&json))
                }
                (None, None) => Canned::Response(Value::Null),
            };
            host.canned.insert(name, canned);
        }
        Ok(host)
    }

    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl ServiceHost for MockServiceHost {
    fn invoke(&self, request: &ServiceRequest) -> Result<Value, ServiceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let canned = self
            .canned
            .get(&request.alias)
            .or_else(|| self.canned.get(&request.service));

        match canned {
            Some(Canned::Response(v)) => Ok(v.clone()),
            Some(Canned::Error(msg)) => Err(ServiceError::Failed(msg.clone())),
            None => Err(ServiceError::NotConfigured(request.service.clone())),
        }
    }

    fn report_status(&self, text: &str) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(text.to_string());
        }
    }
}
