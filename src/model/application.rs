//! A compiled web application.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::handler::AddressHandler;
use crate::model::wrapper::Wrapper;

/// A named configuration value exposed to components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigParam {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Literal value, or the resolved URI when declared with `uri`.
    pub value: String,
}

/// Immutable once compiled; shared read-only across requests.
#[derive(Debug)]
pub struct Application {
    pub(crate) name: String,
    pub(crate) title: Option<String>,
    pub(crate) handlers: Vec<AddressHandler>,
    pub(crate) wrappers: HashMap<String, Arc<Wrapper>>,
    pub(crate) config_params: HashMap<String, ConfigParam>,
    pub(crate) base_dir: Option<PathBuf>,
}

impl Application {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Handlers in declaration order.
    pub fn handlers(&self) -> &[AddressHandler] {
        &self.handlers
    }

    pub fn wrapper(&self, name: &str) -> Option<&Arc<Wrapper>> {
        self.wrappers.get(name)
    }

    pub fn wrapper_names(&self) -> impl Iterator<Item = &str> {
        self.wrappers.keys().map(String::as_str)
    }

    pub fn config_param(&self, id: &str) -> Option<&ConfigParam> {
        self.config_params.get(id)
    }

    pub fn config_params(&self) -> impl Iterator<Item = &ConfigParam> {
        self.config_params.values()
    }

    /// Directory resources and body `src` URIs resolve against.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Emit the compiled structure at debug level.
    pub fn log_structure(&self) {
        tracing::debug!(
            app = %self.name,
            title = self.title.as_deref().unwrap_or(""),
            handlers = self.handlers.len(),
            wrappers = self.wrappers.len(),
            "Application compiled"
        );
        for handler in &self.handlers {
            let plan = crate::model::wrapper::MiddlewarePlan::of(handler.wrapper());
            tracing::debug!(
                app = %self.name,
                kind = handler.kind_label(),
                handler = handler.label(),
                pattern = handler.pattern().source(),
                stages = plan.stages().count(),
                error_handlers = plan.error_handlers().count(),
                "Handler"
            );
        }
    }
}
