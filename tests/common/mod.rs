//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use webapp_router::descriptor::{ComponentDecl, Declaration};
use webapp_router::model::{
    Application, ComponentRef, ComponentRegistry, Element, Item, QName, Sequence, WEB_NS,
};
use webapp_router::response::HttpResponse;
use webapp_router::GraphCompiler;

/// Records component invocations in order.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::default()
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub const MODULE: &str = "app.xq";

pub fn web(local: &str) -> Element {
    Element::new(QName::new(WEB_NS, local).with_prefix("web"))
}

/// `web:response` with one text/plain body taken from a trailing item.
pub fn text_response(status: u16, body: &str) -> Sequence {
    let response = web("response")
        .with_attr("status", status.to_string())
        .with_child(web("body").with_attr("content-type", "text/plain"));
    vec![Item::element(response), Item::text(body)]
}

/// Descriptor reference to `function` in the shared test module.
pub fn function(name: &str) -> ComponentDecl {
    ComponentDecl::new("xquery", MODULE).function(name)
}

pub fn function_ref(name: &str) -> ComponentRef {
    ComponentRef::query_function(MODULE, QName::local(name))
}

/// A pass-through component that logs `tag`.
pub fn register_tap(registry: &mut ComponentRegistry, log: &Log, tag: &str) {
    let log = log.clone();
    let label = tag.to_string();
    registry.register_fn(function_ref(tag), move |input, _| {
        log.lock().unwrap().push(label.clone());
        Ok(input.input)
    });
}

/// A servlet component that logs `tag` and answers 200 with `body`.
pub fn register_responder(registry: &mut ComponentRegistry, log: &Log, tag: &str, body: &str) {
    let log = log.clone();
    let label = tag.to_string();
    let body = body.to_string();
    registry.register_fn(function_ref(tag), move |_, _| {
        log.lock().unwrap().push(label.clone());
        Ok(text_response(200, &body))
    });
}

pub fn servlet(name: &str, pattern: &str, filters: &[&str]) -> Declaration {
    Declaration::Servlet {
        name: name.to_string(),
        filters: filters.iter().map(|f| f.to_string()).collect(),
        component: function(name),
        pattern: pattern.to_string(),
        groups: Vec::new(),
    }
}

pub fn filter(name: &str, input: Option<&str>, output: Option<&str>) -> Declaration {
    Declaration::Filter {
        name: name.to_string(),
        input: input.map(function),
        output: output.map(function),
    }
}

pub fn compile(
    registry: &ComponentRegistry,
    base_dir: Option<&Path>,
    declarations: Vec<Declaration>,
) -> Arc<Application> {
    let app = GraphCompiler::new(registry)
        .compile("test", base_dir, declarations)
        .expect("test application compiles");
    Arc::new(app)
}

pub fn body_text(response: &HttpResponse) -> String {
    String::from_utf8_lossy(&response.body).into_owned()
}
