//! Request-scoped state handed to every component invocation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::application::{Application, ConfigParam};
use crate::model::item::Sequence;

/// Owned by the worker handling one request; never shared.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    application: Option<Arc<Application>>,
    params: Vec<(String, String)>,
    properties: HashMap<String, Sequence>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, application: Arc<Application>) -> Self {
        Self {
            request_id: request_id.into(),
            application: Some(application),
            params: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// A context with no application, for invoking components in isolation.
    pub fn detached(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            application: None,
            params: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn application(&self) -> Option<&Application> {
        self.application.as_deref()
    }

    pub fn config_param(&self, id: &str) -> Option<&ConfigParam> {
        self.application()?.config_param(id)
    }

    /// Value bound to a named path group.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub(crate) fn bind_params(&mut self, params: Vec<(String, String)>) {
        self.params = params;
    }

    pub fn property(&self, key: &str) -> Option<&Sequence> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Sequence) -> Option<Sequence> {
        self.properties.insert(key.into(), value)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Sequence> {
        self.properties.remove(key)
    }
}
