//! Decoding and querying a captured replSetGetStatus reply

use replset::*;

const FIXTURE: &str = include_str!("fixtures/status_three_members.json");

fn fixture() -> Status {
    Status::from_slice(FIXTURE.as_bytes()).unwrap()
}

#[test]
fn test_decodes_top_level_fields() {
    let status = fixture();

    assert!(status.is_ok());
    assert_eq!(status.set, "rs0");
    assert_eq!(status.my_state, Some(MemberState::Secondary));
    assert_eq!(status.term, Some(7));
    assert_eq!(status.heartbeat_interval_millis, Some(2000));
    assert_eq!(
        status.date.map(|d| d.to_rfc3339()),
        Some("2024-05-14T09:30:12.481+00:00".to_string())
    );

    let optimes = status.optimes.as_ref().unwrap();
    let committed = optimes.last_committed.unwrap();
    assert_eq!(committed.timestamp, Timestamp::new(1715679010, 1));
    assert_eq!(committed.term, 7);
    assert_eq!(optimes.applied, optimes.durable);
}

#[test]
fn test_member_order_is_preserved() {
    let status = fixture();
    let ids: Vec<i64> = status.members.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[test]
fn test_roles_and_self() {
    let status = fixture();

    let primary = status.primary().unwrap();
    assert_eq!(primary.name, "db0.example.net:27017");
    assert_eq!(primary.election_time, Some(Timestamp::new(1715593001, 1)));

    let me = status.get_self().unwrap();
    assert_eq!(me.id, 1);
    assert_eq!(me.syncing_to.as_deref(), Some("db0.example.net:27017"));

    assert_eq!(status.secondaries().len(), 1);
    assert_eq!(status.arbiters().iter().map(|m| m.id).collect::<Vec<_>>(), vec![2]);
    assert!(status.get_members_by_state(MemberState::Rollback, 0).is_empty());
}

#[test]
fn test_unreachable_member() {
    let status = fixture();
    let down = status.get_member_by_id(3).unwrap();

    assert_eq!(down.state, MemberState::Down);
    assert!(!down.is_healthy());
    assert_eq!(down.config_version, -1);
    assert!(down.info_message.contains("Connection refused"));
    // stateStr is kept exactly as sent
    assert_eq!(down.state_str, "(not reachable/healthy)");
    assert!(down.state_str_diverges());
}

#[test]
fn test_optimes_order_members_by_progress() {
    let status = fixture();
    let primary = status.primary().unwrap().optime.unwrap();
    let me = status.get_self().unwrap().optime.unwrap();
    let down = status.get_member_by_id(3).unwrap().optime.unwrap();

    assert!(down < me);
    assert!(me < primary);
    assert!(status.get_member_by_id(2).unwrap().optime.is_none());
    assert_eq!(
        status.replication_lag("db1.example.net:27017"),
        Some(chrono::Duration::seconds(2))
    );
}

#[test]
fn test_lookups_by_name_are_exact() {
    let status = fixture();

    assert!(status.has_member("db2.example.net:27017"));
    assert!(!status.has_member("db2.example.net"));
    assert!(!status.has_member("DB2.EXAMPLE.NET:27017"));
    assert!(status.get_member_by_name("").is_none());
}

#[test]
fn test_canonical_text_round_trips() {
    let status = fixture();
    let text = status.to_text();

    let reparsed = Status::from_slice(text.as_bytes()).unwrap();
    assert_eq!(reparsed, status);
    assert_eq!(reparsed.to_text(), text);
    assert!(text.contains("\"stateStr\": \"(not reachable/healthy)\""));
    assert!(text.contains("\"ts\": {\n"));
}

#[test]
fn test_unknown_state_code_decodes() {
    let raw = FIXTURE.replacen("\"state\": 7", "\"state\": 4", 1);
    let status = Status::from_slice(raw.as_bytes()).unwrap();
    let member = status.get_member_by_id(2).unwrap();

    assert_eq!(member.state, MemberState::Unrecognized(4));
    assert_eq!(member.state.to_string(), "");
    assert!(status.arbiters().is_empty());
}
