//! Integration tests for membership convergence
//!
//! Covers first-time initialization, repeated runs against an already
//! converged set, transport failures, failed status commands, deadlines and
//! the final liveness check.

use replset::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const HOST: &str = "localhost:27017";

fn primary_status(set: &str, host: &str) -> serde_json::Value {
    json!({
        "set": set,
        "myState": 1,
        "members": [{"_id": 0, "name": host, "health": 1, "state": 1, "stateStr": "PRIMARY", "self": true}],
        "ok": 1,
    })
}

#[tokio::test]
async fn test_first_run_initializes_empty_set() {
    let node = Arc::new(SimulatedNode::new(HOST));
    let converger = Converger::new(node.clone());
    let target = MembershipConfig::single("rs0", HOST);

    let converged = converger.converge(&target).await.unwrap();

    assert_eq!(converged.primary.as_deref(), Some(HOST));
    let status = converged.status.unwrap();
    assert_eq!(status.set, "rs0");
    assert_eq!(status.members.len(), 1);
    assert_eq!(node.current_config(), Some(target.initial_config()));
    assert_eq!(
        node.received(),
        vec!["replSetInitiate", "replSetReconfig", "replSetGetStatus", "ping"]
    );
}

#[tokio::test]
async fn test_second_run_takes_benign_paths() {
    let node = Arc::new(SimulatedNode::new(HOST));
    let converger = Converger::new(node.clone());
    let target = MembershipConfig::single("rs0", HOST);

    let first = converger.converge(&target).await.unwrap();
    let second = converger.converge(&target).await.unwrap();

    // Version 1 is already current, so neither run's reconfigure applied
    assert!(!first.reconfigured);
    assert!(!second.reconfigured);
    assert_eq!(second.primary.as_deref(), Some(HOST));
    assert_eq!(node.current_config().map(|c| c.version), Some(1));
}

#[tokio::test]
async fn test_already_configured_set_converges_without_error() {
    let channel = ScriptedChannel::new()
        .fail(ChannelError::with_code(23, "AlreadyInitialized", "already initialized"))
        .fail(ChannelError::command(
            "New config is rejected :: caused by :: New replica set configuration version must be greater than old, but 1 is not greater than 1 for replica set rs0",
        ))
        .reply(primary_status("rs0", HOST))
        .reply(json!({"ok": 1}));
    let converger = Converger::new(channel);

    let converged = converger.converge(&MembershipConfig::single("rs0", HOST)).await.unwrap();

    assert!(!converged.reconfigured);
    assert_eq!(converged.primary.as_deref(), Some(HOST));
    assert_eq!(
        converger.channel().sent_names(),
        vec!["replSetInitiate", "replSetReconfig", "replSetGetStatus", "ping"]
    );
}

#[tokio::test]
async fn test_transport_failure_is_not_benign() {
    let converger = Converger::new(ScriptedChannel::unreachable("connection refused"));

    let err = converger
        .converge(&MembershipConfig::single("rs0", HOST))
        .await
        .unwrap_err();

    let report = match err {
        ReplSetError::NotConverged(report) => report,
        other => panic!("expected NotConverged, got {:?}", other),
    };
    assert!(report.initiate.failure().map_or(false, |e| e.is_transport()));
    assert!(report.reconfigure.failure().map_or(false, |e| e.is_transport()));
    assert!(report.status.is_err());
    assert!(report.cause().map_or(false, |e| e.is_transport()));
    // No ping after a failed verdict
    assert_eq!(
        converger.channel().sent_names(),
        vec!["replSetInitiate", "replSetReconfig", "replSetGetStatus"]
    );
}

#[tokio::test]
async fn test_failed_status_and_reconfigure_fail_convergence() {
    let not_initialized = json!({
        "ok": 0,
        "errmsg": "no replset config has been received",
        "code": 94,
        "codeName": "NotYetInitialized",
    });
    let channel = ScriptedChannel::new()
        .fail(ChannelError::with_code(93, "InvalidReplicaSetConfig", "No host described in new configuration maps to this node"))
        .reply(not_initialized.clone())
        .reply(not_initialized);
    let converger = Converger::new(channel);

    let err = converger
        .converge(&MembershipConfig::single("rs0", HOST))
        .await
        .unwrap_err();

    let ReplSetError::NotConverged(report) = err else {
        panic!("expected NotConverged");
    };
    let status = report.status.as_ref().unwrap();
    assert!(!status.is_ok());
    assert!(status.primary().is_none());
    assert_eq!(report.cause().and_then(|e| e.code()), Some(94));
    assert!(report.to_string().contains("no replset config has been received"));
}

#[tokio::test]
async fn test_reconfigure_ok_carries_verdict_without_primary() {
    let node = Arc::new(SimulatedNode::new(HOST));
    node.set_election_pending(true);
    let converger = Converger::new(node.clone());
    let target = MembershipConfig::single("rs0", HOST).with_version(2);

    let converged = converger.converge(&target).await.unwrap();

    assert!(converged.reconfigured);
    assert!(converged.primary.is_none());
    assert_eq!(node.current_config().map(|c| c.version), Some(2));
}

#[tokio::test]
async fn test_no_primary_and_benign_reconfigure_fails() {
    let node = Arc::new(SimulatedNode::new(HOST));
    node.set_election_pending(true);
    let converger = Converger::new(node.clone());
    let target = MembershipConfig::single("rs0", HOST);

    let err = converger.converge(&target).await.unwrap_err();
    let ReplSetError::NotConverged(report) = err else {
        panic!("expected NotConverged");
    };
    assert!(report.initiate.is_success());
    assert!(report.reconfigure.is_benign());
    assert!(report.cause().is_none());

    // Once the election completes the same call succeeds
    node.elect();
    assert!(converger.converge(&target).await.is_ok());
}

#[tokio::test]
async fn test_genuine_reconfigure_failure_tolerated_when_primary_exists() {
    let node = Arc::new(SimulatedNode::new(HOST));
    let converger = Converger::new(node.clone());
    converger.converge(&MembershipConfig::single("rs0", HOST)).await.unwrap();

    // Different set name: initiate is benign, reconfigure genuinely fails,
    // but the existing primary still satisfies the verdict
    let renamed = MembershipConfig::single("rs1", HOST).with_version(2);
    let converged = converger.converge(&renamed).await.unwrap();
    assert!(!converged.reconfigured);
    assert_eq!(converged.status.map(|s| s.set), Some("rs0".to_string()));
}

#[tokio::test]
async fn test_member_verification_catches_unapplied_members() {
    let node = Arc::new(SimulatedNode::new(HOST));
    let options = ConvergenceOptions {
        verify_members: true,
        ..ConvergenceOptions::default()
    };
    let converger = Converger::with_options(node.clone(), options);
    converger.converge(&MembershipConfig::single("rs0", HOST)).await.unwrap();

    // Same version: reconfigure is refused, so the new member never lands
    let grown = MembershipConfig::single("rs0", HOST).with_member(1, "localhost:27018");
    let err = converger.converge(&grown).await.unwrap_err();
    let ReplSetError::NotConverged(report) = err else {
        panic!("expected NotConverged");
    };
    assert_eq!(report.missing_hosts, vec!["localhost:27018"]);
    assert_eq!(report.primary(), Some(HOST));

    // Bumping the version applies it
    let converged = converger.converge(&grown.with_version(2)).await.unwrap();
    assert!(converged.reconfigured);
    assert!(converged.status.unwrap().has_member("localhost:27018"));
}

#[tokio::test]
async fn test_malformed_status_is_a_decode_error() {
    let channel = ScriptedChannel::new()
        .reply(json!({"ok": 1}))
        .reply(json!({"ok": 1}))
        .reply(json!({"ok": 1, "members": "none"}));
    let converger = Converger::new(channel);

    let err = converger
        .converge(&MembershipConfig::single("rs0", HOST))
        .await
        .unwrap_err();
    assert!(matches!(err, ReplSetError::Decode(_)));
}

#[tokio::test]
async fn test_failed_ping_is_a_liveness_error() {
    let channel = ScriptedChannel::new()
        .reply(json!({"ok": 1}))
        .fail(ChannelError::command("configuration version must be greater than old"))
        .reply(primary_status("rs0", HOST))
        .fail(ChannelError::transport("connection reset"));
    let converger = Converger::new(channel);

    let err = converger
        .converge(&MembershipConfig::single("rs0", HOST))
        .await
        .unwrap_err();
    match err {
        ReplSetError::Liveness { target, database, source } => {
            assert_eq!(target, "scripted channel");
            assert_eq!(database, "admin");
            assert!(source.is_transport());
        }
        other => panic!("expected Liveness, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deadline_bounds_first_command() {
    let node = SimulatedNode::new(HOST).with_latency(Duration::from_millis(300));
    let options = ConvergenceOptions {
        timeout: Duration::from_millis(50),
        ..ConvergenceOptions::default()
    };
    let converger = Converger::with_options(node, options);

    let err = converger
        .converge(&MembershipConfig::single("rs0", HOST))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(
        err,
        ReplSetError::Timeout { phase: ConvergencePhase::Initiating, .. }
    ));
}

#[tokio::test]
async fn test_deadline_spans_whole_sequence() {
    // Each command alone fits the budget; three in a row do not
    let node = SimulatedNode::new(HOST).with_latency(Duration::from_millis(100));
    let options = ConvergenceOptions {
        timeout: Duration::from_millis(250),
        ..ConvergenceOptions::default()
    };
    let converger = Converger::with_options(node, options);

    let err = converger
        .converge(&MembershipConfig::single("rs0", HOST))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReplSetError::Timeout { phase: ConvergencePhase::Verifying, .. }
    ));
}

#[tokio::test]
async fn test_oversized_budget_still_converges() {
    let options = ConvergenceOptions {
        timeout: Duration::from_secs(u64::MAX),
        ..ConvergenceOptions::default()
    };
    let converger = Converger::with_options(SimulatedNode::new(HOST), options);

    let converged = converger.converge(&MembershipConfig::single("rs0", HOST)).await.unwrap();
    assert_eq!(converged.primary.as_deref(), Some(HOST));
}

#[tokio::test]
async fn test_unreachable_node_after_convergence() {
    let node = Arc::new(SimulatedNode::new(HOST));
    let converger = Converger::new(node.clone());
    let target = MembershipConfig::single("rs0", HOST);
    converger.converge(&target).await.unwrap();

    node.set_unreachable(true);
    let err = converger.converge(&target).await.unwrap_err();
    let ReplSetError::NotConverged(report) = err else {
        panic!("expected NotConverged");
    };
    assert!(report.cause().map_or(false, |e| e.is_transport()));
}
