//! Descriptor compilation.
//!
//! # Data Flow
//! ```text
//! Vec<Declaration>
//!     → pass 1: bind namespaces, register wrappers by name, open/close
//!               groups, compile patterns, bind components
//!     → pass 2: resolve wrapper names (memoized, cycle-checked), compose
//!               each handler's effective wrapper
//!     → Application
//! ```
//!
//! # Design Decisions
//! - Any error aborts the whole compilation; no partial application escapes
//! - Effective filters = application ++ group in-scope ++ own
//! - Every declared wrapper is resolved, referenced or not, so a broken
//!   unused declaration still fails the load

pub mod resolver;
pub mod scope;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::descriptor::model::{ComponentDecl, ConfigParamDecl, Declaration};
use crate::descriptor::names::Namespaces;
use crate::error::CompileError;
use crate::model::application::{Application, ConfigParam};
use crate::model::component::{Component, ComponentFactory};
use crate::model::handler::{AddressHandler, Resource, Servlet};
use crate::routing::matcher::PathPattern;
use crate::routing::rewrite::Replacement;
use resolver::{PendingWrapper, Resolver};
use scope::GroupTree;

/// Turns declaration streams into applications.
pub struct GraphCompiler<'f> {
    factory: &'f dyn ComponentFactory,
}

struct PendingHandler {
    group: Option<usize>,
    filters: Vec<String>,
    target: PendingTarget,
}

enum PendingTarget {
    Servlet {
        name: String,
        pattern: PathPattern,
        component: Arc<dyn Component>,
    },
    Resource {
        pattern: PathPattern,
        rewrite: Option<Replacement>,
        media_type: String,
    },
}

/// Pass-1 state.
#[derive(Default)]
struct Registration {
    namespaces: Namespaces,
    title: Option<String>,
    app_filters: Option<Vec<String>>,
    config_params: HashMap<String, ConfigParam>,
    groups: GroupTree,
    open_groups: Vec<usize>,
    resolver: Resolver,
    handlers: Vec<PendingHandler>,
    servlet_names: HashSet<String>,
    error_ordinal: usize,
}

impl<'f> GraphCompiler<'f> {
    pub fn new(factory: &'f dyn ComponentFactory) -> Self {
        Self { factory }
    }

    /// Compile one application.
    ///
    /// `base_dir` is the application directory; relative config-param URIs
    /// and resource paths resolve against it.
    pub fn compile<I>(
        &self,
        name: &str,
        base_dir: Option<&Path>,
        declarations: I,
    ) -> Result<Application, CompileError>
    where
        I: IntoIterator<Item = Declaration>,
    {
        let mut reg = Registration::default();
        for declaration in declarations {
            self.register(&mut reg, declaration, base_dir)?;
        }
        if !reg.open_groups.is_empty() {
            return Err(CompileError::UnbalancedGroup);
        }

        let Registration {
            title,
            app_filters,
            config_params,
            groups,
            mut resolver,
            handlers: pending,
            ..
        } = reg;

        resolver.resolve_all()?;

        let app_filters = app_filters.unwrap_or_default();
        let mut handlers = Vec::with_capacity(pending.len());
        for handler in pending {
            let mut names = app_filters.clone();
            if let Some(group) = handler.group {
                names.extend(groups.in_scope_filters(group).iter().cloned());
            }
            names.extend(handler.filters.iter().cloned());
            let wrapper = resolver.collapse(&names)?;

            handlers.push(match handler.target {
                PendingTarget::Servlet {
                    name,
                    pattern,
                    component,
                } => AddressHandler::Servlet(Servlet {
                    name,
                    pattern,
                    filters: handler.filters,
                    wrapper,
                    component,
                }),
                PendingTarget::Resource {
                    pattern,
                    rewrite,
                    media_type,
                } => AddressHandler::Resource(Resource {
                    pattern,
                    filters: handler.filters,
                    wrapper,
                    rewrite,
                    media_type,
                }),
            });
        }

        let app = Application {
            name: name.to_string(),
            title,
            handlers,
            wrappers: resolver.into_table(),
            config_params,
            base_dir: base_dir.map(Path::to_path_buf),
        };
        app.log_structure();
        Ok(app)
    }

    fn component(
        &self,
        decl: &ComponentDecl,
        namespaces: &Namespaces,
    ) -> Result<Arc<dyn Component>, CompileError> {
        let reference = decl.to_ref(namespaces)?;
        self.factory.create(&reference)
    }

    fn register(
        &self,
        reg: &mut Registration,
        declaration: Declaration,
        base_dir: Option<&Path>,
    ) -> Result<(), CompileError> {
        match declaration {
            Declaration::Namespace { prefix, uri } => reg.namespaces.bind(&prefix, &uri)?,
            Declaration::Title(title) => {
                if reg.title.replace(title).is_some() {
                    return Err(CompileError::Invalid("title declared twice".to_string()));
                }
            }
            Declaration::ApplicationFilters(filters) => {
                if reg.app_filters.replace(filters).is_some() {
                    return Err(CompileError::Invalid(
                        "application filters declared twice".to_string(),
                    ));
                }
            }
            Declaration::ConfigParam(param) => {
                let param = config_param(param, base_dir)?;
                if reg.config_params.contains_key(&param.id) {
                    return Err(CompileError::DuplicateName(param.id));
                }
                reg.config_params.insert(param.id.clone(), param);
            }
            Declaration::GroupOpen { filters } => {
                let parent = reg.open_groups.last().copied();
                let group = reg.groups.open(parent, filters);
                reg.open_groups.push(group);
            }
            Declaration::GroupClose => {
                reg.open_groups.pop().ok_or(CompileError::UnbalancedGroup)?;
            }
            Declaration::Filter {
                name,
                input,
                output,
            } => {
                check_wrapper_name(&name)?;
                if input.is_none() && output.is_none() {
                    return Err(CompileError::EmptyFilter(name));
                }
                let input = input
                    .map(|d| self.component(&d, &reg.namespaces))
                    .transpose()?;
                let output = output
                    .map(|d| self.component(&d, &reg.namespaces))
                    .transpose()?;
                reg.resolver
                    .declare(name, PendingWrapper::Filter { input, output })?;
            }
            Declaration::Chain { name, filters } => {
                check_wrapper_name(&name)?;
                reg.resolver.declare(name, PendingWrapper::Chain { filters })?;
            }
            Declaration::Error {
                name,
                catch,
                component,
                filters,
            } => {
                check_wrapper_name(&name)?;
                let catch = reg.namespaces.parse_catch(&catch)?;
                let component = self.component(&component, &reg.namespaces)?;
                let ordinal = reg.error_ordinal;
                reg.error_ordinal += 1;
                reg.resolver.declare(
                    name,
                    PendingWrapper::Error {
                        catch,
                        component,
                        filters,
                        ordinal,
                    },
                )?;
            }
            Declaration::Servlet {
                name,
                filters,
                component,
                pattern,
                groups,
            } => {
                if !reg.servlet_names.insert(name.clone()) {
                    return Err(CompileError::DuplicateName(name));
                }
                let named: Vec<(usize, String)> =
                    groups.into_iter().map(|g| (g.number, g.name)).collect();
                let pattern = PathPattern::with_groups(&pattern, &named)?;
                let component = self.component(&component, &reg.namespaces)?;
                reg.handlers.push(PendingHandler {
                    group: reg.open_groups.last().copied(),
                    filters,
                    target: PendingTarget::Servlet {
                        name,
                        pattern,
                        component,
                    },
                });
            }
            Declaration::Resource {
                pattern,
                rewrite,
                media_type,
                filters,
            } => {
                let pattern = PathPattern::new(&pattern)?;
                let rewrite = rewrite
                    .map(|r| Replacement::compile(&r, pattern.group_count()))
                    .transpose()?;
                reg.handlers.push(PendingHandler {
                    group: reg.open_groups.last().copied(),
                    filters,
                    target: PendingTarget::Resource {
                        pattern,
                        rewrite,
                        media_type,
                    },
                });
            }
            Declaration::Unknown(element) => return Err(CompileError::UnknownElement(element)),
        }
        Ok(())
    }
}

fn check_wrapper_name(name: &str) -> Result<(), CompileError> {
    if name.trim().is_empty() {
        return Err(CompileError::Invalid(
            "top-level wrappers must be named".to_string(),
        ));
    }
    Ok(())
}

fn config_param(decl: ConfigParamDecl, base_dir: Option<&Path>) -> Result<ConfigParam, CompileError> {
    let value = match (decl.value, decl.uri) {
        (Some(value), None) => value,
        (None, Some(uri)) => resolve_uri(&uri, base_dir),
        _ => {
            return Err(CompileError::Invalid(format!(
                "config-param '{}' needs exactly one of value or uri",
                decl.id
            )))
        }
    };
    Ok(ConfigParam {
        id: decl.id,
        name: decl.name,
        description: decl.description,
        value,
    })
}

fn resolve_uri(uri: &str, base_dir: Option<&Path>) -> String {
    if Url::parse(uri).is_ok() {
        return uri.to_string();
    }
    match base_dir {
        Some(base) => {
            let joined = base.join(uri);
            Url::from_file_path(&joined)
                .map(String::from)
                .unwrap_or_else(|_| joined.display().to_string())
        }
        None => uri.to_string(),
    }
}
