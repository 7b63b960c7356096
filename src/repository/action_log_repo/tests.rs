use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::apply_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn ts(h: u32, m: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 10)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[test]
fn test_insert_and_list_by_entity() {
    let repo = ActionLogRepository::new(setup_test_db());

    let first = ActionLog::new(ActionType::Enroll, "E1", ts(9, 0))
        .with_section("S1")
        .with_payload(&serde_json::json!({"status": "ENROLLED"}));
    let second = ActionLog::new(ActionType::Drop, "E1", ts(10, 0))
        .with_section("S1")
        .with_detail("退课");
    let other = ActionLog::new(ActionType::Enroll, "E2", ts(9, 30)).with_section("S1");

    repo.insert(&second).unwrap();
    repo.insert(&first).unwrap();
    repo.insert(&other).unwrap();

    let logs = repo.list_by_entity("E1").unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action_type, ActionType::Enroll);
    assert_eq!(logs[1].action_type, ActionType::Drop);
    assert_eq!(
        logs[0].payload_json.as_ref().and_then(|v| v.get("status")).and_then(|v| v.as_str()),
        Some("ENROLLED")
    );
    assert_eq!(logs[1].detail.as_deref(), Some("退课"));

    assert_eq!(repo.list_by_section("S1").unwrap().len(), 3);
    assert_eq!(repo.count_by_type(ActionType::Enroll).unwrap(), 2);
}

#[test]
fn test_find_recent_limits_and_orders() {
    let repo = ActionLogRepository::new(setup_test_db());
    for (i, h) in [8u32, 9, 10, 11].iter().enumerate() {
        let log = ActionLog::new(ActionType::RecordScores, format!("E{}", i), ts(*h, 0));
        repo.insert(&log).unwrap();
    }

    let recent = repo.find_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].entity_id, "E3");
    assert_eq!(recent[1].entity_id, "E2");
}
