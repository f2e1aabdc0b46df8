#![allow(missing_docs)]

#[macro_use]
mod common;

use common::{TEST_WALL_SECONDS, field, init_test_logging, path};
use fieldtrace::config::{ENV_ERRORS, ENV_EXTENSION_KEY};
use fieldtrace::encode::decode_trace_base64;
use fieldtrace::inline::{INCLUDE_TRACE_FTV1, INCLUDE_TRACE_HEADER};
use fieldtrace::rewrite::{MASKED_BY, MASKED_BY_KEY, MASKED_MESSAGE};
use fieldtrace::wire::node::Id;
use fieldtrace::{
    ErrorPolicy, ExecutionError, ExecutionResult, FieldInfo, InlineTracer, ManualClock,
    RequestContext, TraceConfig, TraceError,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn federated_request() -> RequestContext {
    RequestContext::new().with_header(INCLUDE_TRACE_HEADER, INCLUDE_TRACE_FTV1)
}

fn manual_tracer(config: TraceConfig) -> (Arc<ManualClock>, InlineTracer) {
    let clock = Arc::new(ManualClock::with_wall_seconds(TEST_WALL_SECONDS));
    let tracer = InlineTracer::new(config).with_clock(clock.clone());
    (clock, tracer)
}

fn encoded_trace(response: &ExecutionResult, key: &str) -> fieldtrace::wire::Trace {
    let Some(Value::String(text)) = response.extensions.get(key) else {
        panic!("no trace under {key}");
    };
    decode_trace_base64(text).expect("valid trace envelope")
}

#[test]
fn federated_request_round_trip() {
    init_test_logging();
    test_phase!("federated_request_round_trip");
    let (clock, tracer) = manual_tracer(TraceConfig::default());
    let trace = tracer.start(&federated_request()).expect("header asks for trace");

    clock.advance_nanos(10);
    let me = trace.will_resolve_field(&FieldInfo::new(path(&["me"]), "user", "User", "Query"));
    clock.advance_nanos(20);
    let posts = trace.will_resolve_field(&field(&["me", "posts"], "[Post!]!", "User"));
    let title = trace.will_resolve_field(&field(&["me", "posts", "0", "title"], "String", "Post"));
    clock.advance_nanos(5);
    trace.field_resolved(title);
    trace.field_resolved(posts);
    trace.field_resolved(me);

    let mut response = ExecutionResult::new(Some(json!({"me": {"posts": [{"title": null}]}})));
    response.errors = vec![
        ExecutionError::new("title unavailable")
            .with_path(path(&["me", "posts", "0", "title"]))
            .with_location(3, 7),
        ExecutionError::new("already traced upstream")
            .with_path(path(&["me"]))
            .with_extension("serviceName", "posts"),
        ExecutionError::new("partial result"),
    ];
    clock.advance_nanos(65);
    let finalized = trace
        .will_send_response(&mut response)
        .expect("attached")
        .expect("complete result");
    assert_eq!(finalized.duration_nanos, 100);
    assert_eq!(finalized.error_count(), 2);
    assert_eq!(response.errors.len(), 3);

    let wire = encoded_trace(&response, "ftv1");
    assert_eq!(wire.duration_ns, 100);
    let start = wire.start_time.expect("start");
    let end = wire.end_time.expect("end");
    assert_eq!((start.seconds, start.nanos), (TEST_WALL_SECONDS, 0));
    assert_eq!((end.seconds, end.nanos), (TEST_WALL_SECONDS, 100));

    let root = wire.root.expect("root");
    assert_eq!(root.error.len(), 1);
    assert_eq!(root.error[0].message, "partial result");
    let me = &root.child[0];
    assert_eq!(me.id, Some(Id::ResponseName("me".into())));
    assert_eq!(me.original_field_name, "user");
    assert_eq!(me.parent_type, "Query");
    assert_eq!((me.start_time, me.end_time), (10, 35));
    assert!(me.error.is_empty());

    let posts = &me.child[0];
    assert_eq!(posts.r#type, "[Post!]!");
    let item = &posts.child[0];
    assert_eq!(item.id, Some(Id::Index(0)));
    assert_eq!(item.r#type, "");
    let title = &item.child[0];
    assert_eq!(title.error.len(), 1);
    assert_eq!(title.error[0].message, "title unavailable");
    assert_eq!(title.error[0].location[0].line, 3);
    assert_eq!(title.error[0].location[0].column, 7);

    let json: Value = serde_json::from_str(&title.error[0].json).expect("error json");
    assert_eq!(json["message"], "title unavailable");
    assert_eq!(json["path"], json!(["me", "posts", 0, "title"]));
    test_complete!("federated_request_round_trip");
}

#[test]
fn untraced_request_leaves_response_alone() {
    init_test_logging();
    let (_, tracer) = manual_tracer(TraceConfig::default());
    assert!(tracer.start(&RequestContext::new()).is_none());
    assert!(
        tracer
            .start(&RequestContext::new().with_header(INCLUDE_TRACE_HEADER, "ftv2"))
            .is_none()
    );
}

#[test]
fn env_overrides_configure_masking_and_key() {
    init_test_logging();
    let mut config = TraceConfig::default().require_header(false);
    config
        .apply_overrides(|name| match name {
            ENV_ERRORS => Some("masked".to_owned()),
            ENV_EXTENSION_KEY => Some("fieldTrace".to_owned()),
            _ => None,
        })
        .expect("valid overrides");
    let (_, tracer) = manual_tracer(config);
    let trace = tracer.start(&RequestContext::new()).expect("traced");

    let handle = trace.will_resolve_field(&field(&["secret"], "String", "Query"));
    trace.field_resolved(handle);

    let mut response = ExecutionResult::new(None);
    response.errors = vec![
        ExecutionError::new("db password is hunter2")
            .with_path(path(&["secret"]))
            .with_extension("code", "INTERNAL"),
    ];
    trace.will_send_response(&mut response).expect("attached");
    assert_eq!(response.errors[0].message(), "db password is hunter2");
    assert!(!response.extensions.contains_key("ftv1"));

    let wire = encoded_trace(&response, "fieldTrace");
    let secret = &wire.root.expect("root").child[0];
    let error = &secret.error[0];
    assert_eq!(error.message, MASKED_MESSAGE);
    assert!(!error.json.contains("hunter2"));
    let json: Value = serde_json::from_str(&error.json).expect("error json");
    assert_eq!(json["extensions"], json!({ MASKED_BY_KEY: MASKED_BY }));
}

#[test]
fn custom_hook_overrides_configured_mode() {
    init_test_logging();
    let (_, tracer) = manual_tracer(TraceConfig::default().require_header(false));
    let tracer = tracer.with_error_policy(ErrorPolicy::transform(|error| {
        let redacted = error.message().replace(char::is_numeric, "#");
        Some(error.with_message(redacted))
    }));
    let trace = tracer.start(&RequestContext::new()).expect("traced");

    let mut response = ExecutionResult::new(None);
    response.errors = vec![ExecutionError::new("card 4242 declined")];
    trace.will_send_response(&mut response).expect("attached");
    let root = encoded_trace(&response, "ftv1").root.expect("root");
    assert_eq!(root.error[0].message, "card #### declined");
}

#[test]
fn second_tracer_on_same_response_is_rejected() {
    init_test_logging();
    let (_, tracer) = manual_tracer(TraceConfig::default());
    let first = tracer.start(&federated_request()).expect("traced");
    let second = tracer.start(&federated_request()).expect("traced");

    let mut response = ExecutionResult::new(None);
    first.will_send_response(&mut response).expect("first attaches");
    let before = response.extensions.clone();

    let err = second
        .will_send_response(&mut response)
        .expect_err("slot taken");
    assert!(err.is_protocol_violation());
    assert!(matches!(err, TraceError::SideChannelOccupied { .. }));
    assert_eq!(response.extensions, before);
}

#[test]
fn result_errors_reach_the_trace_without_extra_calls() {
    init_test_logging();
    let (_, tracer) = manual_tracer(TraceConfig::default().require_header(false));
    let trace = tracer.start(&RequestContext::new()).expect("traced");
    let handle = trace.will_resolve_field(&field(&["x"], "Int", "Query"));
    trace.field_resolved(handle);

    let mut response = ExecutionResult::new(Some(json!({ "x": null })));
    response.errors = vec![ExecutionError::new("boom").with_path(path(&["x"]))];
    let finalized = trace
        .will_send_response(&mut response)
        .expect("attached")
        .expect("complete result");
    assert_eq!(finalized.error_count(), response.errors.len());

    let root = encoded_trace(&response, "ftv1").root.expect("root");
    assert!(root.error.is_empty());
    assert_eq!(root.child[0].id, Some(Id::ResponseName("x".into())));
    assert_eq!(root.child[0].error.len(), 1);
    assert_eq!(root.child[0].error[0].message, "boom");
}
