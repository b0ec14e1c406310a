//! End-to-end dispatch scenarios against compiled applications.

use std::fs;
use std::sync::Arc;

use webapp_router::descriptor::{Declaration, MatchGroup};
use webapp_router::error::ComponentError;
use webapp_router::model::{ComponentRegistry, Item, QName};
use webapp_router::runtime::HttpRequest;
use webapp_router::Dispatcher;

mod common;
use common::*;

fn get(path: &str) -> HttpRequest {
    HttpRequest::new("GET", path)
}

#[test]
fn test_onion_order_around_servlet() {
    let log = new_log();
    let mut registry = ComponentRegistry::new();
    for tag in ["a-in", "a-out", "b-in", "b-out"] {
        register_tap(&mut registry, &log, tag);
    }
    register_responder(&mut registry, &log, "hello", "hi");

    let app = compile(
        &registry,
        None,
        vec![
            Declaration::ApplicationFilters(vec!["a".into()]),
            filter("a", Some("a-in"), Some("a-out")),
            filter("b", Some("b-in"), Some("b-out")),
            servlet("hello", "/hello", &["b"]),
        ],
    );

    let response = Dispatcher::new().dispatch(app, get("/hello"), "r1");
    assert_eq!(response.status, 200);
    assert_eq!(body_text(&response), "hi");
    assert_eq!(entries(&log), vec!["a-in", "b-in", "hello", "b-out", "a-out"]);
}

#[test]
fn test_group_filters_sit_between_application_and_own() {
    let log = new_log();
    let mut registry = ComponentRegistry::new();
    for tag in ["app-f", "group-f", "own-f"] {
        register_tap(&mut registry, &log, tag);
    }
    register_responder(&mut registry, &log, "inner", "ok");

    let app = compile(
        &registry,
        None,
        vec![
            Declaration::ApplicationFilters(vec!["app-f".into()]),
            filter("app-f", Some("app-f"), None),
            filter("group-f", Some("group-f"), None),
            filter("own-f", Some("own-f"), None),
            Declaration::GroupOpen {
                filters: vec!["group-f".into()],
            },
            servlet("inner", "/inner", &["own-f"]),
            Declaration::GroupClose,
        ],
    );

    let response = Dispatcher::new().dispatch(app, get("/inner"), "r1");
    assert_eq!(response.status, 200);
    assert_eq!(entries(&log), vec!["app-f", "group-f", "own-f", "inner"]);
}

#[test]
fn test_first_declared_match_wins_and_no_match_is_404() {
    let log = new_log();
    let mut registry = ComponentRegistry::new();
    register_responder(&mut registry, &log, "specific", "specific");
    register_responder(&mut registry, &log, "general", "general");

    let app = compile(
        &registry,
        None,
        vec![
            servlet("specific", "/items/special", &[]),
            servlet("general", "/items/.*", &[]),
        ],
    );
    let dispatcher = Dispatcher::new();

    let response = dispatcher.dispatch(app.clone(), get("/items/special"), "r1");
    assert_eq!(body_text(&response), "specific");
    let response = dispatcher.dispatch(app.clone(), get("/items/other"), "r2");
    assert_eq!(body_text(&response), "general");

    // Patterns are anchored: a prefix is not a match.
    let response = dispatcher.dispatch(app, get("/items"), "r3");
    assert_eq!(response.status, 404);
}

#[test]
fn test_named_groups_reach_component() {
    let mut registry = ComponentRegistry::new();
    registry.register_fn(function_ref("item"), |input, ctx| {
        let request = input.input[0].as_element().expect("web:request").clone();
        let id = ctx.param("id").unwrap_or("none").to_string();
        Ok(text_response(
            200,
            &format!("{} {} {}", request.attr("method").unwrap_or(""), request.attr("servlet").unwrap_or(""), id),
        ))
    });

    let app = compile(
        &registry,
        None,
        vec![Declaration::Servlet {
            name: "item".into(),
            filters: Vec::new(),
            component: function("item"),
            pattern: "/items/([0-9]+)".into(),
            groups: vec![MatchGroup {
                number: 1,
                name: "id".into(),
            }],
        }],
    );

    let response = Dispatcher::new().dispatch(app, get("/items/42"), "r1");
    assert_eq!(body_text(&response), "get item 42");
}

fn error_app(expose: bool) -> (Dispatcher, Arc<webapp_router::Application>) {
    let mut registry = ComponentRegistry::new();
    registry.register_fn(function_ref("broken"), |_, _| {
        Err(ComponentError::new(QName::new("urn:app", "missing"), "no such item")
            .with_data(vec![Item::text("42")]))
    });
    registry.register_fn(function_ref("other"), |_, _| {
        Err(ComponentError::new(QName::new("urn:elsewhere", "oops"), "elsewhere"))
    });
    for (tag, status) in [("on-exact", 404u16), ("on-namespace", 409), ("on-any", 503)] {
        registry.register_fn(function_ref(tag), move |input, _| {
            let error = input.error.expect("error-sourced input");
            Ok(text_response(
                status,
                &format!("{}:{}:{}", tag, error.name.local, error.message),
            ))
        });
    }

    let error = |name: &str, catch: &str| Declaration::Error {
        name: name.to_string(),
        catch: catch.to_string(),
        component: function(name),
        filters: Vec::new(),
    };
    let app = compile(
        &registry,
        None,
        vec![
            Declaration::Namespace {
                prefix: "app".into(),
                uri: "urn:app".into(),
            },
            error("on-any", "*"),
            error("on-namespace", "app:*"),
            error("on-exact", "app:missing"),
            Declaration::Chain {
                name: "errors".into(),
                filters: vec!["on-any".into(), "on-namespace".into(), "on-exact".into()],
            },
            servlet("broken", "/broken", &["errors"]),
            servlet("other", "/other", &["errors"]),
        ],
    );
    (Dispatcher::new().expose_error_details(expose), app)
}

#[test]
fn test_most_specific_error_handler_wins() {
    let (dispatcher, app) = error_app(false);

    let response = dispatcher.dispatch(app.clone(), get("/broken"), "r1");
    assert_eq!(response.status, 404);
    assert_eq!(body_text(&response), "on-exact:missing:no such item");

    let response = dispatcher.dispatch(app, get("/other"), "r2");
    assert_eq!(response.status, 503);
    assert_eq!(body_text(&response), "on-any:oops:elsewhere");
}

#[test]
fn test_unhandled_error_detail_hidden_unless_exposed() {
    let mut registry = ComponentRegistry::new();
    registry.register_fn(function_ref("bare"), |_, _| {
        Err(ComponentError::new(QName::new("urn:app", "secret"), "password=hunter2"))
    });
    let decls = || vec![servlet("bare", "/bare", &[])];

    let app = compile(&registry, None, decls());
    let response = Dispatcher::new().dispatch(app, get("/bare"), "r1");
    assert_eq!(response.status, 500);
    assert!(!body_text(&response).contains("hunter2"));

    let app = compile(&registry, None, decls());
    let response = Dispatcher::new()
        .expose_error_details(true)
        .dispatch(app, get("/bare"), "r2");
    assert_eq!(response.status, 500);
    assert!(body_text(&response).contains("password=hunter2"));
}

#[test]
fn test_failing_error_handler_is_internal_error() {
    let mut registry = ComponentRegistry::new();
    registry.register_fn(function_ref("broken"), |_, _| {
        Err(ComponentError::new(QName::local("first"), "first failure"))
    });
    registry.register_fn(function_ref("handler"), |_, _| {
        Err(ComponentError::new(QName::local("second"), "second failure"))
    });

    let app = compile(
        &registry,
        None,
        vec![
            Declaration::Error {
                name: "handler".into(),
                catch: "*".into(),
                component: function("handler"),
                filters: Vec::new(),
            },
            servlet("broken", "/broken", &["handler"]),
        ],
    );
    let response = Dispatcher::new().dispatch(app, get("/broken"), "r1");
    assert_eq!(response.status, 500);
    assert_eq!(response.message.as_deref(), Some("error in an error handler"));
}

#[test]
fn test_unbound_component_raises_typed_error() {
    let mut registry = ComponentRegistry::new().with_unbound_fallback();
    registry.register_fn(function_ref("unbound-handler"), |input, _| {
        let error = input.error.expect("error input");
        Ok(text_response(501, &error.name.local))
    });

    let app = compile(
        &registry,
        None,
        vec![
            Declaration::Error {
                name: "unbound-handler".into(),
                catch: "web:unbound-component".into(),
                component: function("unbound-handler"),
                filters: Vec::new(),
            },
            servlet("nowhere", "/nowhere", &["unbound-handler"]),
        ],
    );
    let response = Dispatcher::new().dispatch(app, get("/nowhere"), "r1");
    assert_eq!(response.status, 501);
    assert_eq!(body_text(&response), "unbound-component");
}

fn resource(pattern: &str, rewrite: Option<&str>, filters: &[&str]) -> Declaration {
    Declaration::Resource {
        pattern: pattern.into(),
        rewrite: rewrite.map(String::from),
        media_type: "text/css".into(),
        filters: filters.iter().map(|f| f.to_string()).collect(),
    }
}

#[test]
fn test_resource_served_from_rewritten_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("static/css")).unwrap();
    fs::write(dir.path().join("static/css/site.css"), "body{}").unwrap();

    let registry = ComponentRegistry::new();
    let app = compile(
        &registry,
        Some(dir.path()),
        vec![resource("/style/(.+)\\.css", Some("static/css/$1.css"), &[])],
    );
    let dispatcher = Dispatcher::new();

    let response = dispatcher.dispatch(app.clone(), get("/style/site.css"), "r1");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/css"));
    assert_eq!(body_text(&response), "body{}");

    let response = dispatcher.dispatch(app.clone(), get("/style/missing.css"), "r2");
    assert_eq!(response.status, 404);

    let response = dispatcher.dispatch(app, HttpRequest::new("POST", "/style/site.css"), "r3");
    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("GET"));
}

#[test]
fn test_resource_cannot_escape_application_directory() {
    let root = tempfile::tempdir().unwrap();
    let app_dir = root.path().join("app");
    fs::create_dir(&app_dir).unwrap();
    fs::write(root.path().join("secret.txt"), "secret").unwrap();

    let registry = ComponentRegistry::new();
    let app = compile(&registry, Some(&app_dir), vec![resource("/files/(.*)", Some("$1"), &[])]);

    let response = Dispatcher::new().dispatch(app, get("/files/../secret.txt"), "r1");
    assert_eq!(response.status, 404);
}

#[test]
fn test_resource_filters() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.css"), "a{}").unwrap();
    let log = new_log();
    let mut registry = ComponentRegistry::new();
    register_tap(&mut registry, &log, "audit");
    register_tap(&mut registry, &log, "post");

    let app = compile(
        &registry,
        Some(dir.path()),
        vec![
            filter("audit", Some("audit"), None),
            filter("post", None, Some("post")),
            resource("/in/(.*)", Some("$1"), &["audit"]),
            resource("/out/(.*)", Some("$1"), &["post"]),
        ],
    );
    let dispatcher = Dispatcher::new();

    let response = dispatcher.dispatch(app.clone(), get("/in/a.css"), "r1");
    assert_eq!(response.status, 200);
    assert_eq!(body_text(&response), "a{}");
    assert_eq!(entries(&log), vec!["audit"]);

    let response = dispatcher.dispatch(app, get("/out/a.css"), "r2");
    assert_eq!(response.status, 500);
    assert_eq!(entries(&log), vec!["audit"]);
}

#[test]
fn test_request_cannot_be_connected_to_response() {
    // Echoing the request yields no web:response.
    let mut registry = ComponentRegistry::new();
    registry.register_fn(function_ref("echo"), |input, _| Ok(input.input));
    let app = compile(&registry, None, vec![servlet("echo", "/echo", &[])]);

    let response = Dispatcher::new().dispatch(app, get("/echo"), "r1");
    assert_eq!(response.status, 500);
}

#[test]
fn test_filters_outside_error_handler_run_after_recovery() {
    let log = new_log();
    let mut registry = ComponentRegistry::new();
    register_tap(&mut registry, &log, "outer-out");
    register_tap(&mut registry, &log, "inner-out");
    registry.register_fn(function_ref("broken"), |_, _| {
        Err(ComponentError::new(QName::local("boom"), "broken"))
    });
    registry.register_fn(function_ref("recover"), |input, _| {
        let error = input.error.expect("error input");
        Ok(text_response(418, &error.name.local))
    });

    let app = compile(
        &registry,
        None,
        vec![
            filter("outer", None, Some("outer-out")),
            filter("inner", None, Some("inner-out")),
            Declaration::Error {
                name: "recover".into(),
                catch: "*".into(),
                component: function("recover"),
                filters: Vec::new(),
            },
            Declaration::Chain {
                name: "guarded".into(),
                filters: vec!["outer".into(), "recover".into(), "inner".into()],
            },
            servlet("broken", "/broken", &["guarded"]),
        ],
    );

    let response = Dispatcher::new().dispatch(app, get("/broken"), "r1");
    assert_eq!(response.status, 418);
    assert_eq!(body_text(&response), "boom");
    assert_eq!(entries(&log), vec!["outer-out"]);
}

#[test]
fn test_error_handler_filters_wrap_the_normal_path() {
    let log = new_log();
    let mut registry = ComponentRegistry::new();
    register_tap(&mut registry, &log, "audit");
    register_responder(&mut registry, &log, "hello", "hi");
    registry.register_fn(function_ref("recover"), |_, _| Ok(text_response(500, "recovered")));

    let app = compile(
        &registry,
        None,
        vec![
            filter("audit", Some("audit"), None),
            Declaration::Error {
                name: "recover".into(),
                catch: "*".into(),
                component: function("recover"),
                filters: vec!["audit".into()],
            },
            servlet("hello", "/hello", &["recover"]),
        ],
    );

    let response = Dispatcher::new().dispatch(app, get("/hello"), "r1");
    assert_eq!(response.status, 200);
    assert_eq!(body_text(&response), "hi");
    assert_eq!(entries(&log), vec!["audit", "hello"]);
}
