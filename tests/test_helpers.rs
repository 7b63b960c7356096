// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试环境装配、基础数据生成等功能
// ==========================================

#![allow(dead_code)]

use academic_scheduler::app::AppState;
use academic_scheduler::config::ConfigManager;
use academic_scheduler::db::{apply_schema, open_sqlite_connection};
use academic_scheduler::domain::{DayOfWeek, Room, Section, TermDeadlines, TimeSlot};
use academic_scheduler::engine::{
    AcademicEvent, AcademicEventPublisher, AcademicEventType, FixedClock, OptionalEventPublisher,
};
use academic_scheduler::repository::{
    RoomRepository, SectionRepository, TermCalendarRepository, TimeSlotRepository,
};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    apply_schema(&conn)?;

    Ok((temp_file, db_path))
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// ==========================================
// 事件收集器
// ==========================================

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<AcademicEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<AcademicEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, event_type: AcademicEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl AcademicEventPublisher for RecordingPublisher {
    fn publish(&self, event: AcademicEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event);
        Ok(String::new())
    }
}

// ==========================================
// 测试环境
// ==========================================

pub struct TestEnv {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub clock: Arc<FixedClock>,
    pub events: Arc<RecordingPublisher>,
    pub state: AppState,
}

/// 默认配置的测试环境，"今天"固定为 `today`
pub fn setup_env(today: NaiveDate) -> TestEnv {
    setup_env_with_config(today, &[])
}

/// 先写入配置覆写，再装配 AppState
pub fn setup_env_with_config(today: NaiveDate, overrides: &[(&str, &str)]) -> TestEnv {
    academic_scheduler::logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();
    let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path).unwrap()));

    let config_manager = ConfigManager::from_connection(conn.clone()).unwrap();
    for (key, value) in overrides {
        config_manager.set_config_value(key, value).unwrap();
    }

    let clock = Arc::new(FixedClock::on_date(today));
    let events = Arc::new(RecordingPublisher::default());
    let state = AppState::from_connection(
        db_path.clone(),
        conn.clone(),
        clock.clone(),
        OptionalEventPublisher::with_publisher(events.clone()),
    )
    .unwrap();

    TestEnv {
        _temp_file: temp_file,
        db_path,
        conn,
        clock,
        events,
        state,
    }
}

impl TestEnv {
    pub fn seed_room(&self, room_id: &str, capacity: i32) {
        let conn = self.conn.lock().unwrap();
        RoomRepository::insert_tx(&conn, &Room::new(room_id, "Main", capacity).unwrap()).unwrap();
    }

    pub fn seed_slot(&self, slot_id: &str, day: DayOfWeek, start: NaiveTime, end: NaiveTime) {
        let conn = self.conn.lock().unwrap();
        TimeSlotRepository::insert_tx(&conn, &TimeSlot::new(slot_id, day, start, end).unwrap()).unwrap();
    }

    pub fn seed_section(&self, section: Section) {
        let conn = self.conn.lock().unwrap();
        SectionRepository::insert_tx(&conn, &section).unwrap();
    }

    pub fn seed_term(&self, term_id: &str, add_drop: NaiveDate, withdrawal: NaiveDate, term_end: NaiveDate) {
        let conn = self.conn.lock().unwrap();
        TermCalendarRepository::upsert_tx(
            &conn,
            &TermDeadlines::new(term_id, add_drop, withdrawal, term_end).unwrap(),
        )
        .unwrap();
    }

    /// 标准学期 2025S: 加退选截止 01-31，退出截止 03-31，学期结束 05-20
    pub fn seed_standard_term(&self) {
        self.seed_term("2025S", d(2025, 1, 31), d(2025, 3, 31), d(2025, 5, 20));
    }

    pub fn count_rows(&self, sql: &str) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}
