//! Memoized wrapper resolution.
//!
//! Declarations are registered by name first and turned into `Wrapper`s on
//! demand. Each name resolves at most once; later lookups return the same
//! `Arc`. Names currently being resolved are tracked so that a reference
//! back to one of them is reported as a cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::CompileError;
use crate::model::component::Component;
use crate::model::wrapper::{Chain, ErrorHandler, ErrorMatch, Filter, Wrapper};

#[derive(Debug)]
pub(crate) enum PendingWrapper {
    Filter {
        input: Option<Arc<dyn Component>>,
        output: Option<Arc<dyn Component>>,
    },
    Chain {
        filters: Vec<String>,
    },
    Error {
        catch: ErrorMatch,
        component: Arc<dyn Component>,
        filters: Vec<String>,
        ordinal: usize,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Resolver {
    order: Vec<String>,
    pending: HashMap<String, PendingWrapper>,
    resolved: HashMap<String, Arc<Wrapper>>,
    in_progress: HashSet<String>,
}

impl Resolver {
    pub fn declare(&mut self, name: String, wrapper: PendingWrapper) -> Result<(), CompileError> {
        if self.pending.contains_key(&name) {
            return Err(CompileError::DuplicateName(name));
        }
        self.order.push(name.clone());
        self.pending.insert(name, wrapper);
        Ok(())
    }

    pub fn resolve(&mut self, name: &str) -> Result<Arc<Wrapper>, CompileError> {
        if let Some(wrapper) = self.resolved.get(name) {
            return Ok(wrapper.clone());
        }
        if self.in_progress.contains(name) {
            return Err(CompileError::Cycle(name.to_string()));
        }
        let pending = self
            .pending
            .remove(name)
            .ok_or_else(|| CompileError::UndefinedName(name.to_string()))?;

        self.in_progress.insert(name.to_string());
        let owned_name = Some(name.to_string());
        let wrapper = match pending {
            PendingWrapper::Filter { input, output } => {
                Wrapper::Filter(Filter::new(owned_name, input, output)?)
            }
            PendingWrapper::Chain { filters } => {
                let members = filters
                    .iter()
                    .map(|f| self.resolve(f))
                    .collect::<Result<Vec<_>, _>>()?;
                Wrapper::Chain(Chain {
                    name: owned_name,
                    members,
                })
            }
            PendingWrapper::Error {
                catch,
                component,
                filters,
                ordinal,
            } => Wrapper::ErrorHandler(ErrorHandler {
                name: owned_name,
                catch,
                component,
                wrapper: self.collapse(&filters)?,
                ordinal,
            }),
        };
        self.in_progress.remove(name);

        let wrapper = Arc::new(wrapper);
        self.resolved.insert(name.to_string(), wrapper.clone());
        Ok(wrapper)
    }

    /// Resolve a list of names into none, the single wrapper, or an
    /// anonymous chain.
    pub fn collapse(&mut self, names: &[String]) -> Result<Option<Arc<Wrapper>>, CompileError> {
        let mut members = names
            .iter()
            .map(|n| self.resolve(n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match members.len() {
            0 => None,
            1 => members.pop(),
            _ => Some(Arc::new(Wrapper::Chain(Chain {
                name: None,
                members,
            }))),
        })
    }

    /// Resolve every declared name, in declaration order.
    pub fn resolve_all(&mut self) -> Result<(), CompileError> {
        for name in self.order.clone() {
            self.resolve(&name)?;
        }
        Ok(())
    }

    pub fn into_table(self) -> HashMap<String, Arc<Wrapper>> {
        self.resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::component::{ComponentKind, FnComponent};

    fn filter() -> PendingWrapper {
        PendingWrapper::Filter {
            input: Some(Arc::new(FnComponent::new(ComponentKind::QueryModule, "f", |i, _| {
                Ok(i.input)
            }))),
            output: None,
        }
    }

    fn chain(members: &[&str]) -> PendingWrapper {
        PendingWrapper::Chain {
            filters: members.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_resolution_is_memoized() {
        let mut resolver = Resolver::default();
        resolver.declare("f".into(), filter()).unwrap();
        let a = resolver.resolve("f").unwrap();
        let b = resolver.resolve("f").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_forward_reference() {
        let mut resolver = Resolver::default();
        resolver.declare("c".into(), chain(&["f"])).unwrap();
        resolver.declare("f".into(), filter()).unwrap();
        resolver.resolve_all().unwrap();

        let table = resolver.into_table();
        match table["c"].as_ref() {
            Wrapper::Chain(c) => assert!(Arc::ptr_eq(&c.members[0], &table["f"])),
            other => panic!("expected chain, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut resolver = Resolver::default();
        resolver.declare("a".into(), chain(&["b"])).unwrap();
        resolver.declare("b".into(), chain(&["a"])).unwrap();
        assert!(matches!(resolver.resolve("a"), Err(CompileError::Cycle(n)) if n == "a"));
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut resolver = Resolver::default();
        resolver.declare("f".into(), filter()).unwrap();
        assert!(matches!(
            resolver.declare("f".into(), filter()),
            Err(CompileError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_collapse_shapes() {
        let mut resolver = Resolver::default();
        resolver.declare("a".into(), filter()).unwrap();
        resolver.declare("b".into(), filter()).unwrap();

        assert!(resolver.collapse(&[]).unwrap().is_none());
        let single = resolver.collapse(&["a".into()]).unwrap().unwrap();
        assert!(Arc::ptr_eq(&single, &resolver.resolve("a").unwrap()));
        let both = resolver.collapse(&["a".into(), "b".into()]).unwrap().unwrap();
        assert!(matches!(both.as_ref(), Wrapper::Chain(c) if c.name.is_none() && c.members.len() == 2));
    }
}
