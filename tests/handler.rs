//! End-to-end invocation handling through `handle_event`

mod common;

use common::*;
use cos_select::{Error, FailurePolicy, HostContext, ObjectLocation, TransportError, handle_event};
use serde_json::json;

fn context(remaining_time_ms: u64) -> HostContext {
    HostContext {
        remaining_time_ms,
        request_id: Some("req-0001".to_string()),
    }
}

#[tokio::test]
async fn two_objects_succeed_and_digest_is_returned() {
    let storage = seeded_storage(&["a.csv", "b.csv"]);

    let digest = handle_event(
        storage.clone(),
        event_for(&["a.csv", "b.csv"]),
        context(60_000),
        &fast_config(),
    )
    .await
    .unwrap();

    assert!(digest.starts_with("Result: select success\nsuccess: 2\ntotal: 2\n"));
    assert!(block_for(&digest, "a.csv").starts_with("TaskStatus: success"));
    assert!(block_for(&digest, "b.csv").starts_with("TaskStatus: success"));
    assert!(digest.find("a.csv").unwrap() < digest.find("b.csv").unwrap());
}

#[tokio::test]
async fn one_transport_failure_raises_aggregate_failure() {
    let storage = seeded_storage(&["a.csv", "b.csv"]);
    storage.fail_select(
        "b.csv",
        TransportError::Service {
            status: 403,
            message: "AccessDenied".into(),
        },
    );

    let err = handle_event(
        storage.clone(),
        event_for(&["a.csv", "b.csv"]),
        context(60_000),
        &fast_config(),
    )
    .await
    .unwrap_err();

    let Error::AggregateFailure {
        digest,
        failed,
        total,
    } = &err
    else {
        panic!("expected AggregateFailure, got {err:?}");
    };
    assert_eq!((*failed, *total), (1, 2));
    assert!(digest.starts_with("Result: select fail\nsuccess: 1\ntotal: 2\n"));
    assert!(block_for(digest, "a.csv").starts_with("TaskStatus: success"));
    let b = block_for(digest, "b.csv");
    assert!(b.starts_with("TaskStatus: fail"));
    assert!(b.contains("service error (status 403)"), "got: {b}");
    assert_eq!(err.to_string(), *digest);
}

#[tokio::test]
async fn all_failed_policy_tolerates_partial_failure() {
    let storage = seeded_storage(&["a.csv", "b.csv"]);
    storage.fail_select("b.csv", TransportError::AccessDenied("denied".into()));
    let mut config = fast_config();
    config.failure_policy = FailurePolicy::AllFailed;

    let digest = handle_event(
        storage.clone(),
        event_for(&["a.csv", "b.csv"]),
        context(60_000),
        &config,
    )
    .await
    .unwrap();

    assert!(digest.starts_with("Result: select fail\nsuccess: 1\ntotal: 2"));
}

#[tokio::test]
async fn all_failed_policy_still_raises_when_nothing_succeeds() {
    let storage = seeded_storage(&[]);
    let mut config = fast_config();
    config.failure_policy = FailurePolicy::AllFailed;

    let err = handle_event(
        storage.clone(),
        event_for(&["missing.csv"]),
        context(60_000),
        &config,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::AggregateFailure { failed: 1, total: 1, .. }));
}

#[tokio::test]
async fn no_remaining_time_reports_every_object_as_timed_out() {
    let storage = seeded_storage(&["a.csv", "b.csv"]);

    let err = handle_event(
        storage.clone(),
        event_for(&["a.csv", "b.csv"]),
        context(0),
        &fast_config(),
    )
    .await
    .unwrap_err();

    let digest = err.to_string();
    assert_eq!(digest.matches(TIMEOUT_LINE).count(), 2);
    assert_eq!(storage.select_calls(), 0);
}

#[tokio::test]
async fn invalid_event_fails_before_any_storage_call() {
    let storage = seeded_storage(&["a.csv"]);

    let err = handle_event(
        storage.clone(),
        json!({"targetBucket": "out-1250000000"}),
        context(60_000),
        &fast_config(),
    )
    .await
    .unwrap_err();

    match err {
        Error::InvalidEvent(message) => assert_eq!(
            message,
            "params parsed error, missing params: objects, cosSelectConfig, targetRegion"
        ),
        other => panic!("expected InvalidEvent, got {other:?}"),
    }
    assert_eq!(storage.select_calls(), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let storage = seeded_storage(&["a.csv"]);
    let mut config = fast_config();
    config.summary_detail_limit = Some(0);

    let err = handle_event(storage, event_for(&["a.csv"]), context(60_000), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "summary_detail_limit"));
}

#[tokio::test]
async fn empty_object_list_is_a_successful_empty_batch() {
    let storage = seeded_storage(&[]);

    let digest = handle_event(storage, event_for(&[]), context(60_000), &fast_config())
        .await
        .unwrap();

    assert_eq!(digest, "Result: select success\nsuccess: 0\ntotal: 0");
}

#[tokio::test]
async fn gateway_body_with_target_writes_rendered_keys() {
    let storage = seeded_storage(&["logs/a.csv"]);
    let mut params = event_for(&["logs/a.csv"]);
    params["targetBucket"] = json!(TARGET_BUCKET);
    params["targetRegion"] = json!(REGION);
    params["targetPrefix"] = json!("out/");
    params["targetNameFormat"] = json!("${Name}.json");
    let event = json!({"body": params.to_string()});

    let digest = handle_event(storage.clone(), event, context(60_000), &fast_config())
        .await
        .unwrap();

    let target = ObjectLocation::new(TARGET_BUCKET, REGION, "out/a.json");
    assert_eq!(storage.object(&target).as_deref(), Some(CSV_BODY));
    assert!(digest.contains("\"key\":\"out/a.json\""));
}
