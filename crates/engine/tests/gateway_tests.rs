// End-to-end tests of the gateway facade against a recording memory store.

mod common;

use bytes::Bytes;
use common::*;
use gatehouse_core::descriptor::StatementKind;
use gatehouse_core::{DataType, Parameter, Record};
use gatehouse_engine::{EngineError, Gateway, PatchError};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Barrier;
use tokio::time::Duration;

fn s(value: &str) -> Parameter {
    Parameter::Str(value.to_string())
}

async fn seeded(gateway: &Gateway) -> u32 {
    let category_id = gateway
        .register_category(HOST_INFO, host_info().data_type.clone(), host_info())
        .await
        .unwrap()
        .id;
    let add = gateway.prepare(category_id, ADD_HOST).unwrap();
    for (agent, vm, host, ts) in [
        ("a1", "v1", "alpha", 100),
        ("a1", "v1", "alpha-renamed", 200),
        ("a2", "v2", "beta", 150),
    ] {
        let count = gateway
            .write(add.id, &[s(agent), s(vm), s(host), Parameter::Long(ts)])
            .await
            .unwrap()
            .count;
        assert_eq!(count, 1);
    }
    category_id
}

fn hostnames(records: &[Record]) -> Vec<&str> {
    records
        .iter()
        .filter_map(|r| r.get("hostname").and_then(|v| v.as_str()))
        .collect()
}

#[tokio::test]
async fn test_host_info_latest_for_agent() {
    let (storage, calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;

    let prepared = gateway.prepare(category_id, QUERY_BY_AGENT).unwrap();
    assert_eq!(prepared.free_param_count, 1);

    let client = principal("client", &["read", "agents-read-a1"]);
    let output = gateway
        .query(&client, prepared.id, &[s("a1")])
        .await
        .unwrap();
    assert_eq!(output.filter_outcome, "all");
    assert_eq!(hostnames(&output.records), vec!["alpha-renamed"]);
    assert_eq!(calls.query.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_denied_agent_never_reaches_storage() {
    let (storage, calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;
    let prepared = gateway.prepare(category_id, QUERY_BY_AGENT).unwrap();
    let before = calls.data_calls();

    let client = principal("client", &["read", "agents-read-a1"]);
    let output = gateway
        .query(&client, prepared.id, &[s("a2")])
        .await
        .unwrap();

    assert!(output.records.is_empty());
    assert_eq!(output.filter_outcome, "empty");
    assert_eq!(calls.data_calls(), before);
}

#[tokio::test]
async fn test_unparameterized_read_restricted_to_grants() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;
    let prepared = gateway.prepare(category_id, QUERY_ALL).unwrap();

    let limited = principal("client", &["read", "agents-read-a2"]);
    let output = gateway.query(&limited, prepared.id, &[]).await.unwrap();
    assert_eq!(output.filter_outcome, "expression");
    assert_eq!(hostnames(&output.records), vec!["beta"]);

    let admin = principal("admin", &["read", "agents-read-ALL"]);
    let output = gateway.query(&admin, prepared.id, &[]).await.unwrap();
    assert_eq!(
        hostnames(&output.records),
        vec!["alpha", "beta", "alpha-renamed"]
    );
}

#[tokio::test]
async fn test_aggregate_count() {
    let (storage, calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    seeded(&gateway).await;

    let aggregate_id = gateway
        .register_category(HOST_INFO, DataType::AggregateCount, host_info())
        .await
        .unwrap()
        .id;
    assert_eq!(aggregate_id, 1);
    // aggregates are adapted in memory only
    assert_eq!(calls.register.load(Ordering::SeqCst), 1);

    let prepared = gateway.prepare(aggregate_id, COUNT_ALL).unwrap();
    let admin = principal("admin", &["read", "agents-read-ALL"]);
    let output = gateway.query(&admin, prepared.id, &[]).await.unwrap();
    assert_eq!(output.kind, StatementKind::Count);
    assert_eq!(output.records, vec![json!({"count": 3}).as_object().cloned().unwrap()]);

    let limited = principal("client", &["read", "agents-read-a1"]);
    let output = gateway.query(&limited, prepared.id, &[]).await.unwrap();
    assert_eq!(output.records[0]["count"], json!(2));

    let nobody = principal("nobody", &["read"]);
    let output = gateway.query(&nobody, prepared.id, &[]).await.unwrap();
    assert_eq!(output.records[0]["count"], json!(0));
}

#[tokio::test]
async fn test_aggregate_before_original_is_rejected() {
    let (storage, calls) = RecordingStorage::new();
    let gateway = gateway(storage);

    let result = gateway
        .register_category(HOST_INFO, DataType::AggregateCount, host_info())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::OriginalCategoryNotRegistered(_))
    ));
    assert_eq!(calls.register.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_illegal_patch_never_reaches_storage() {
    let (storage, calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;
    let prepared = gateway.prepare(category_id, QUERY_BY_AGENT).unwrap();
    let before = calls.data_calls();

    let client = principal("client", &["read", "agents-read-ALL"]);
    let arity = gateway.query(&client, prepared.id, &[]).await;
    assert!(matches!(
        arity,
        Err(EngineError::IllegalPatch(PatchError::Arity {
            expected: 1,
            actual: 0
        }))
    ));

    let wrong_type = gateway
        .query(&client, prepared.id, &[Parameter::Int(7)])
        .await;
    assert!(matches!(
        wrong_type,
        Err(EngineError::IllegalPatch(PatchError::TypeMismatch { index: 0, .. }))
    ));
    assert_eq!(calls.data_calls(), before);
}

#[tokio::test]
async fn test_statement_kind_must_match_operation() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;
    let query = gateway.prepare(category_id, QUERY_BY_AGENT).unwrap();
    let add = gateway.prepare(category_id, ADD_HOST).unwrap();

    assert!(matches!(
        gateway.write(query.id, &[s("a1")]).await,
        Err(EngineError::WrongStatementKind { kind: "read", .. })
    ));

    let client = principal("client", &["read", "agents-read-ALL"]);
    let params = [s("a1"), s("v1"), s("h"), Parameter::Long(1)];
    assert!(matches!(
        gateway.query(&client, add.id, &params).await,
        Err(EngineError::WrongStatementKind { kind: "write", .. })
    ));
}

#[tokio::test]
async fn test_unknown_statement() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let client = principal("client", &["read"]);

    assert!(matches!(
        gateway.query(&client, 42, &[]).await,
        Err(EngineError::UnknownStatement(42))
    ));
    assert!(matches!(
        gateway.write(42, &[]).await,
        Err(EngineError::UnknownStatement(42))
    ));
}

#[tokio::test]
async fn test_update_counts_matched_records() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;
    let rename = gateway.prepare(category_id, RENAME_HOST).unwrap();

    let renamed = gateway
        .write(rename.id, &[s("gamma"), s("a1")])
        .await
        .unwrap();
    assert_eq!(renamed.count, 2);
    assert_eq!(renamed.kind, StatementKind::Update);

    let missed = gateway
        .write(rename.id, &[s("gamma"), s("a9")])
        .await
        .unwrap();
    assert_eq!(missed.count, 0);
}

#[tokio::test]
async fn test_storage_failure_is_not_retried() {
    let (storage, calls) = RecordingStorage::failing_writes();
    let gateway = gateway(storage);
    let category_id = gateway
        .register_category(HOST_INFO, host_info().data_type.clone(), host_info())
        .await
        .unwrap()
        .id;
    let add = gateway.prepare(category_id, ADD_HOST).unwrap();

    let result = gateway
        .write(add.id, &[s("a1"), s("v1"), s("h"), Parameter::Long(1)])
        .await;
    assert!(matches!(result, Err(EngineError::Storage(_))));
    assert_eq!(calls.execute.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prepare_rejections() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;

    assert!(matches!(
        gateway.prepare(category_id, "QUERY host-info"),
        Err(EngineError::UntrustedDescriptor)
    ));
    assert!(matches!(
        gateway.prepare(category_id, BROKEN),
        Err(EngineError::ParseFailed(_))
    ));
    assert!(matches!(
        gateway.prepare(99, QUERY_ALL),
        Err(EngineError::UnknownCategoryId(99))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_prepare_compiles_once() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = Arc::new(gateway(storage));
    let category_id = seeded(&gateway).await;

    let tasks = 16;
    let barrier = Arc::new(Barrier::new(tasks));
    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let gateway = gateway.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                gateway.prepare(category_id, QUERY_BY_AGENT)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in futures::future::join_all(handles).await {
        ids.push(handle.unwrap().unwrap().id);
    }
    assert!(ids.iter().all(|id| *id == ids[0]));
    // the ADD prepared by `seeded` plus this one
    assert_eq!(gateway.statements().compile_count(), 2);
}

#[tokio::test]
async fn test_concurrent_registration_reaches_storage_once() {
    let (storage, calls) = RecordingStorage::with_register_delay(Duration::from_millis(20));
    let gateway = Arc::new(gateway(storage));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .register_category(HOST_INFO, host_info().data_type.clone(), host_info())
                    .await
            })
        })
        .collect();

    let mut fresh = 0;
    for handle in futures::future::join_all(handles).await {
        let registered = handle.unwrap().unwrap();
        assert_eq!(registered.id, 0);
        if !registered.cached {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(calls.register.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.categories().len(), 1);
}

#[tokio::test]
async fn test_untrusted_category_rejected() {
    let (storage, calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let mut category = host_info();
    category.name = "vm-info".to_string();

    let result = gateway
        .register_category("vm-info", category.data_type.clone(), category)
        .await;
    assert!(matches!(result, Err(EngineError::UnknownCategory(_))));
    assert_eq!(calls.register.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_file_grants() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let writer = principal("writer", &["save-file", "files-write-report.txt"]);
    let reader = principal("reader", &["load-file", "files-read-ALL"]);

    gateway
        .save_file(&writer, "report.txt", Bytes::from_static(b"contents"))
        .await
        .unwrap();
    assert!(matches!(
        gateway
            .save_file(&writer, "other.txt", Bytes::from_static(b"x"))
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let loaded = gateway.load_file(&reader, "report.txt").await.unwrap();
    assert_eq!(loaded, Some(Bytes::from_static(b"contents")));
    assert_eq!(gateway.load_file(&reader, "missing.txt").await.unwrap(), None);
    assert!(matches!(
        gateway.load_file(&writer, "report.txt").await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_purge_removes_agent_records() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let category_id = seeded(&gateway).await;

    assert_eq!(gateway.purge("a1").await.unwrap(), 2);
    assert_eq!(gateway.purge("a1").await.unwrap(), 0);
    assert!(matches!(
        gateway.purge("").await,
        Err(EngineError::InvalidRequest(_))
    ));

    let prepared = gateway.prepare(category_id, QUERY_ALL).unwrap();
    let admin = principal("admin", &["read", "agents-read-ALL"]);
    let output = gateway.query(&admin, prepared.id, &[]).await.unwrap();
    assert_eq!(hostnames(&output.records), vec!["beta"]);
}

#[tokio::test]
async fn test_token_delegation() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let client = principal("client", &["cmd-channel-generate", "cmd-channel-grant-ping"]);

    let token = gateway.generate_token(&client, b"session", "ping").unwrap();
    assert!(matches!(
        gateway.generate_token(&client, b"session", "kill"),
        Err(EngineError::Forbidden(_))
    ));

    assert!(!gateway.verify_token(b"session", "kill", &token));
    assert!(gateway.verify_token(b"session", "ping", &token));
    assert!(!gateway.verify_token(b"session", "ping", &token));
}

#[tokio::test(start_paused = true)]
async fn test_token_expires_and_is_swept() {
    let (storage, _calls) = RecordingStorage::new();
    let gateway = gateway(storage);
    let client = principal("client", &["cmd-channel-grant-ping"]);

    let sweeper = gateway.tokens().clone().spawn_sweeper(Duration::from_secs(10));
    let expired = gateway.generate_token(&client, b"old", "ping").unwrap();
    tokio::time::advance(Duration::from_secs(25)).await;
    let fresh = gateway.generate_token(&client, b"new", "ping").unwrap();

    tokio::time::advance(Duration::from_secs(10)).await;
    // let the sweeper observe the advanced clock
    tokio::task::yield_now().await;

    assert!(!gateway.verify_token(b"old", "ping", &expired));
    assert!(gateway.verify_token(b"new", "ping", &fresh));
    sweeper.abort();
}
