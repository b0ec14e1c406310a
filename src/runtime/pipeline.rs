//! Onion execution of a flattened middleware plan.
//!
//! ```text
//! pre(L1) → pre(L2) → ... → pre(Ln) → target → post(Ln) → ... → post(L1)
//! ```
//!
//! Each stage consumes the previous stage's connector. A component error
//! raised below one or more guards is handed to `recover` with the guards
//! enclosing the failure point; the recovered output then resumes the
//! unwinding at the selected guard, so only the post stages outside it
//! run. Other failures stop the run and are returned unchanged.

use crate::error::{ComponentError, DispatchError, TechnicalError};
use crate::model::wrapper::{ErrorHandler, Layer};
use crate::runtime::connector::Connector;
use crate::runtime::context::RequestContext;

enum Outcome {
    Done(Connector),
    /// Layer index the error was raised at (`layers.len()` for the target).
    Failed(usize, ComponentError),
}

pub fn run_layers<'a, F, R>(
    layers: &[Layer<'a>],
    source: Connector,
    ctx: &mut RequestContext,
    target: F,
    mut recover: R,
) -> Result<Connector, DispatchError>
where
    F: FnOnce(Connector, &mut RequestContext) -> Result<Connector, DispatchError>,
    R: FnMut(
        &[&'a ErrorHandler],
        ComponentError,
        &mut RequestContext,
    ) -> Result<(&'a ErrorHandler, Connector), DispatchError>,
{
    let mut outcome = descend(layers, source, ctx, target)?;
    loop {
        let (current, resume) = match outcome {
            Outcome::Done(current) => (current, layers.len()),
            Outcome::Failed(boundary, error) => {
                let enclosing = &layers[..boundary];
                let candidates: Vec<&'a ErrorHandler> = enclosing
                    .iter()
                    .filter_map(|layer| match layer {
                        Layer::Guard(handler) => Some(*handler),
                        Layer::Stage(_) => None,
                    })
                    .collect();
                let (handler, recovered) = recover(&candidates, error, ctx)?;
                // Innermost occurrence when a handler is referenced twice.
                let position = enclosing
                    .iter()
                    .rposition(|layer| {
                        matches!(layer, Layer::Guard(h) if std::ptr::eq(*h, handler))
                    })
                    .ok_or_else(|| {
                        TechnicalError::Invariant("recovering handler is outside the plan".into())
                    })?;
                (recovered, position)
            }
        };
        // The guard at `resume` is strictly inside every earlier one, so
        // this terminates.
        match ascend(&layers[..resume], current, ctx)? {
            Outcome::Done(done) => return Ok(done),
            failed => outcome = failed,
        }
    }
}

fn descend<F>(
    layers: &[Layer<'_>],
    source: Connector,
    ctx: &mut RequestContext,
    target: F,
) -> Result<Outcome, DispatchError>
where
    F: FnOnce(Connector, &mut RequestContext) -> Result<Connector, DispatchError>,
{
    let mut current = source;
    for (index, layer) in layers.iter().enumerate() {
        let Layer::Stage(stage) = layer else { continue };
        if let Some(input) = &stage.filter.input {
            tracing::trace!(request_id = ctx.request_id(), filter = stage.label(), "in stage");
            current = match caught(index, current.invoke(input.as_ref(), ctx))? {
                Outcome::Done(next) => next,
                failed => return Ok(failed),
            };
        }
    }
    caught(layers.len(), target(current, ctx))
}

fn ascend(
    layers: &[Layer<'_>],
    mut current: Connector,
    ctx: &mut RequestContext,
) -> Result<Outcome, DispatchError> {
    for (index, layer) in layers.iter().enumerate().rev() {
        let Layer::Stage(stage) = layer else { continue };
        if let Some(output) = &stage.filter.output {
            tracing::trace!(request_id = ctx.request_id(), filter = stage.label(), "out stage");
            current = match caught(index, current.invoke(output.as_ref(), ctx))? {
                Outcome::Done(next) => next,
                failed => return Ok(failed),
            };
        }
    }
    Ok(Outcome::Done(current))
}

fn caught(index: usize, result: Result<Connector, DispatchError>) -> Result<Outcome, DispatchError> {
    match result {
        Ok(next) => Ok(Outcome::Done(next)),
        Err(DispatchError::Component(error)) => Ok(Outcome::Failed(index, error)),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::component::{Component, ComponentKind, FnComponent};
    use crate::model::item::Item;
    use crate::model::qname::QName;
    use crate::model::wrapper::{Chain, ErrorMatch, Filter, MiddlewarePlan, Wrapper};
    use crate::runtime::error_router::ErrorRouter;
    use crate::runtime::request::{HttpRequest, RequestView};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Run without error handlers: component errors propagate as-is.
    fn run_stages<F>(
        layers: &[Layer<'_>],
        source: Connector,
        ctx: &mut RequestContext,
        target: F,
    ) -> Result<Connector, DispatchError>
    where
        F: FnOnce(Connector, &mut RequestContext) -> Result<Connector, DispatchError>,
    {
        run_layers(layers, source, ctx, target, |_, error, _| Err(error.into()))
    }

    fn tagger(log: &Log, tag: &'static str) -> Arc<dyn Component> {
        let log = log.clone();
        Arc::new(FnComponent::new(ComponentKind::QueryFunction, tag, move |input, _| {
            let seen: Vec<String> = input.input.iter().map(|i| i.string_value()).collect();
            log.lock().unwrap().push(format!("{}({})", tag, seen.join(",")));
            Ok(vec![Item::text(tag)])
        }))
    }

    fn failing(local: &'static str) -> Arc<dyn Component> {
        Arc::new(FnComponent::new(ComponentKind::QueryFunction, local, move |_, _| {
            Err(ComponentError::new(QName::local(local), "failed"))
        }))
    }

    fn filter(name: &str, input: Option<Arc<dyn Component>>, output: Option<Arc<dyn Component>>) -> Arc<Wrapper> {
        Arc::new(Wrapper::Filter(Filter::new(Some(name.into()), input, output).unwrap()))
    }

    fn guard(name: &str, catch: ErrorMatch, own: Option<Arc<Wrapper>>, ordinal: usize) -> Arc<Wrapper> {
        let tag = name.to_string();
        Arc::new(Wrapper::ErrorHandler(ErrorHandler {
            name: Some(name.into()),
            catch,
            component: Arc::new(FnComponent::new(ComponentKind::QueryFunction, "h", move |input, _| {
                let error = input.error.expect("error input");
                Ok(vec![Item::text(format!("{}:{}", tag, error.name.local))])
            })),
            wrapper: own,
            ordinal,
        }))
    }

    fn chain(members: Vec<Arc<Wrapper>>) -> Wrapper {
        Wrapper::Chain(Chain { name: None, members })
    }

    fn run_guarded(
        wrapper: &Wrapper,
        target: Arc<dyn Component>,
    ) -> Result<Connector, DispatchError> {
        let plan = MiddlewarePlan::of(Some(wrapper));
        let view = Rc::new(RequestView::new(HttpRequest::new("GET", "/"), None, Vec::new()));
        let mut ctx = RequestContext::detached("r");
        run_layers(
            &plan.layers,
            Connector::from_request(view.clone()),
            &mut ctx,
            |conn, ctx| conn.invoke(target.as_ref(), ctx),
            |candidates, error, ctx| ErrorRouter::recover(candidates, error, view.clone(), ctx),
        )
    }

    fn output_text(connector: Connector) -> String {
        let input = connector.connect(ComponentKind::QueryFunction).unwrap();
        input.input.iter().map(|i| i.string_value()).collect()
    }

    #[test]
    fn test_onion_order() {
        let log: Log = Arc::default();
        let chain = chain(vec![
            filter("w1", Some(tagger(&log, "pre1")), Some(tagger(&log, "post1"))),
            filter("w2", Some(tagger(&log, "pre2")), Some(tagger(&log, "post2"))),
        ]);
        let plan = MiddlewarePlan::of(Some(&chain));
        let target = tagger(&log, "target");
        let mut ctx = RequestContext::detached("r");

        let out = run_stages(
            &plan.layers,
            Connector::from_sequence(vec![Item::text("req")]),
            &mut ctx,
            |conn, ctx| conn.invoke(target.as_ref(), ctx),
        )
        .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre1(req)", "pre2(pre1)", "target(pre2)", "post2(target)", "post1(post2)"]
        );
        assert_eq!(out.source_label(), "sequence");
    }

    #[test]
    fn test_failure_stops_the_run() {
        let log: Log = Arc::default();
        let filter = Wrapper::Filter(
            Filter::new(None, Some(failing("x")), Some(tagger(&log, "post"))).unwrap(),
        );
        let plan = filter.plan();
        let mut ctx = RequestContext::detached("r");

        let result = run_stages(
            &plan.layers,
            Connector::from_sequence(Vec::new()),
            &mut ctx,
            |conn, _| Ok(conn),
        );
        assert!(matches!(result, Err(DispatchError::Component(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_post_stages_outside_guard_run_after_recovery() {
        let log: Log = Arc::default();
        let wrapper = chain(vec![
            filter("outer", None, Some(tagger(&log, "outer-out"))),
            guard("catch-all", ErrorMatch::Any, None, 0),
            filter("inner", None, Some(tagger(&log, "inner-out"))),
        ]);

        let out = run_guarded(&wrapper, failing("boom")).unwrap();
        // inner-out sits inside the guard and is skipped.
        assert_eq!(*log.lock().unwrap(), vec!["outer-out(catch-all:boom)"]);
        assert_eq!(output_text(out), "outer-out");
    }

    #[test]
    fn test_guard_own_filters_run_on_normal_path() {
        let log: Log = Arc::default();
        let audit: Arc<dyn Component> = {
            let log = log.clone();
            Arc::new(FnComponent::new(ComponentKind::QueryFunction, "audit", move |input, _| {
                let request = input.input.first().and_then(|i| i.as_element()).map(|e| e.name.local.clone());
                log.lock().unwrap().push(format!(
                    "audit({},error={})",
                    request.unwrap_or_default(),
                    input.error.is_some()
                ));
                Ok(input.input)
            }))
        };
        let own = filter("audit", Some(audit), None);
        let wrapper = chain(vec![guard("handler", ErrorMatch::Any, Some(own), 0)]);

        let out = run_guarded(&wrapper, tagger(&log, "target")).unwrap();
        assert_eq!(output_text(out), "target");
        assert_eq!(log.lock().unwrap()[0], "audit(request,error=false)");
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_error_in_outer_post_stage_reaches_outer_guard() {
        let log: Log = Arc::default();
        let wrapper = chain(vec![
            guard("outer", ErrorMatch::Local("late".into()), None, 0),
            filter("late", None, Some(failing("late"))),
            guard("inner", ErrorMatch::Local("boom".into()), None, 1),
        ]);

        let out = run_guarded(&wrapper, failing("boom")).unwrap();
        assert_eq!(output_text(out), "outer:late");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_guard_does_not_catch_errors_raised_outside_it() {
        let wrapper = chain(vec![
            filter("early", Some(failing("early")), None),
            guard("handler", ErrorMatch::Any, None, 0),
        ]);

        let result = run_guarded(&wrapper, failing("never"));
        assert!(matches!(result, Err(DispatchError::Component(e)) if e.name.local == "early"));
    }
}
