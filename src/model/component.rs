//! Components and their binding.
//!
//! # Responsibilities
//! - Define the `Component` capability invoked by connectors
//! - Identify components by `ComponentRef` (kind + URI + optional name)
//! - Bind references to native implementations via `ComponentFactory`
//!
//! # Design Decisions
//! - Execution engines live outside this crate; a component is anything
//!   implementing `invoke`, registered under the reference a descriptor uses
//! - The registry refuses kind mismatches at compile time so that a
//!   transform is never driven through the query calling convention

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CompileError, ComponentError};
use crate::model::item::{Item, Sequence};
use crate::model::qname::QName;
use crate::model::WEB_NS;
use crate::runtime::context::RequestContext;

/// The five invocation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A named query function in a library module.
    QueryFunction,
    /// A main query module evaluated as a whole.
    QueryModule,
    /// A named stylesheet function or template.
    TransformComponent,
    /// A stylesheet applied to the whole input document.
    TransformDocument,
    /// A pipeline, or one named step of it.
    Pipeline,
}

impl ComponentKind {
    /// Stylesheet kinds need a node as their context item.
    pub fn is_stylesheet(self) -> bool {
        matches!(
            self,
            ComponentKind::TransformComponent | ComponentKind::TransformDocument
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ComponentKind::QueryFunction => "query-function",
            ComponentKind::QueryModule => "query-module",
            ComponentKind::TransformComponent => "transform-component",
            ComponentKind::TransformDocument => "transform-document",
            ComponentKind::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error details handed to an error-sourced invocation.
#[derive(Debug, Clone)]
pub struct ErrorInput {
    pub name: QName,
    pub message: String,
    pub data: Sequence,
}

/// What a connector hands to a component.
#[derive(Debug, Clone)]
pub struct ComponentInput {
    pub kind: ComponentKind,
    /// Context item for stylesheet kinds.
    pub context: Option<Item>,
    pub input: Sequence,
    pub error: Option<ErrorInput>,
}

pub trait Component: Send + Sync + fmt::Debug {
    fn kind(&self) -> ComponentKind;

    fn invoke(
        &self,
        input: ComponentInput,
        ctx: &mut RequestContext,
    ) -> Result<Sequence, ComponentError>;
}

type InvokeFn =
    dyn Fn(ComponentInput, &mut RequestContext) -> Result<Sequence, ComponentError> + Send + Sync;

/// A component backed by a closure.
pub struct FnComponent {
    kind: ComponentKind,
    label: String,
    f: Box<InvokeFn>,
}

impl FnComponent {
    pub fn new<F>(kind: ComponentKind, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(ComponentInput, &mut RequestContext) -> Result<Sequence, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            kind,
            label: label.into(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for FnComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish()
    }
}

impl Component for FnComponent {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn invoke(
        &self,
        input: ComponentInput,
        ctx: &mut RequestContext,
    ) -> Result<Sequence, ComponentError> {
        (self.f)(input, ctx)
    }
}

/// Placeholder for a reference nothing is bound to.
/// Raises `web:unbound-component` when invoked.
#[derive(Debug)]
pub struct UnboundComponent {
    reference: ComponentRef,
}

impl Component for UnboundComponent {
    fn kind(&self) -> ComponentKind {
        self.reference.kind
    }

    fn invoke(
        &self,
        _input: ComponentInput,
        _ctx: &mut RequestContext,
    ) -> Result<Sequence, ComponentError> {
        Err(ComponentError::new(
            QName::new(WEB_NS, "unbound-component").with_prefix("web"),
            format!("no implementation bound to {}", self.reference),
        ))
    }
}

/// Identity of a component as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub kind: ComponentKind,
    pub uri: String,
    /// Function, template or step name; `None` for whole-module forms.
    pub name: Option<QName>,
}

impl ComponentRef {
    pub fn query_function(uri: impl Into<String>, name: QName) -> Self {
        Self { kind: ComponentKind::QueryFunction, uri: uri.into(), name: Some(name) }
    }

    pub fn query_module(uri: impl Into<String>) -> Self {
        Self { kind: ComponentKind::QueryModule, uri: uri.into(), name: None }
    }

    pub fn transform_component(uri: impl Into<String>, name: QName) -> Self {
        Self { kind: ComponentKind::TransformComponent, uri: uri.into(), name: Some(name) }
    }

    pub fn transform_document(uri: impl Into<String>) -> Self {
        Self { kind: ComponentKind::TransformDocument, uri: uri.into(), name: None }
    }

    pub fn pipeline(uri: impl Into<String>, step: Option<QName>) -> Self {
        Self { kind: ComponentKind::Pipeline, uri: uri.into(), name: step }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {} in {}", self.kind, name, self.uri),
            None => write!(f, "{} {}", self.kind, self.uri),
        }
    }
}

/// Turns descriptor references into invocable components.
pub trait ComponentFactory: Send + Sync {
    fn create(&self, reference: &ComponentRef) -> Result<Arc<dyn Component>, CompileError>;
}

/// In-process factory keyed by `ComponentRef`.
#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<ComponentRef, Arc<dyn Component>>,
    unbound_fallback: bool,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind unknown references to `UnboundComponent` instead of failing.
    pub fn with_unbound_fallback(mut self) -> Self {
        self.unbound_fallback = true;
        self
    }

    pub fn register(
        &mut self,
        reference: ComponentRef,
        component: Arc<dyn Component>,
    ) -> &mut Self {
        self.components.insert(reference, component);
        self
    }

    pub fn register_fn<F>(&mut self, reference: ComponentRef, f: F) -> &mut Self
    where
        F: Fn(ComponentInput, &mut RequestContext) -> Result<Sequence, ComponentError>
            + Send
            + Sync
            + 'static,
    {
        let component = FnComponent::new(reference.kind, reference.to_string(), f);
        self.register(reference, Arc::new(component))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentFactory for ComponentRegistry {
    fn create(&self, reference: &ComponentRef) -> Result<Arc<dyn Component>, CompileError> {
        match self.components.get(reference) {
            Some(component) if component.kind() == reference.kind => Ok(component.clone()),
            Some(component) => Err(CompileError::Invalid(format!(
                "component bound to {} is a {}",
                reference,
                component.kind()
            ))),
            None if self.unbound_fallback => {
                tracing::warn!(component = %reference, "No implementation bound, using placeholder");
                Ok(Arc::new(UnboundComponent {
                    reference: reference.clone(),
                }))
            }
            None => Err(CompileError::UnknownComponent(reference.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(input: ComponentInput, _ctx: &mut RequestContext) -> Result<Sequence, ComponentError> {
        Ok(input.input)
    }

    #[test]
    fn test_registry_resolves_registered_reference() {
        let mut registry = ComponentRegistry::new();
        let reference = ComponentRef::query_function("lib.xq", QName::new("urn:app", "main"));
        registry.register_fn(reference.clone(), echo);

        let component = registry.create(&reference).unwrap();
        assert_eq!(component.kind(), ComponentKind::QueryFunction);
    }

    #[test]
    fn test_registry_rejects_unknown_reference() {
        let registry = ComponentRegistry::new();
        let err = registry
            .create(&ComponentRef::query_module("main.xq"))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownComponent(_)));
    }

    #[test]
    fn test_registry_rejects_kind_mismatch() {
        let mut registry = ComponentRegistry::new();
        let reference = ComponentRef::transform_document("style.xsl");
        registry.register(
            reference.clone(),
            Arc::new(FnComponent::new(ComponentKind::Pipeline, "p", echo)),
        );
        assert!(matches!(
            registry.create(&reference),
            Err(CompileError::Invalid(_))
        ));
    }

    #[test]
    fn test_unbound_fallback_raises_on_invoke() {
        let registry = ComponentRegistry::new().with_unbound_fallback();
        let component = registry.create(&ComponentRef::pipeline("p.xpl", None)).unwrap();
        let mut ctx = RequestContext::detached("req-1");
        let input = ComponentInput {
            kind: ComponentKind::Pipeline,
            context: None,
            input: Vec::new(),
            error: None,
        };
        let err = component.invoke(input, &mut ctx).unwrap_err();
        assert_eq!(err.name, QName::new(WEB_NS, "unbound-component"));
    }
}
