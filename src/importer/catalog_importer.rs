// ==========================================
// 课程排课与选课核心 - 学期准备数据导入器
// ==========================================
// 支持: CSV (.csv)，文件类型: 教室 / 时段 / 班级 / 学期日历
// 红线: 一个文件一个事务；文件级错误整体回滚
// 规则: 行级校验失败（解析失败、约束冲突）记入报告并跳过，行号为 CSV 物理行号
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::calendar::TermDeadlines;
use crate::domain::catalog::{Room, TimeSlot};
use crate::domain::section::Section;
use crate::domain::types::DayOfWeek;
use crate::engine::clock::Clock;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::catalog_repo::{RoomRepository, TimeSlotRepository};
use crate::repository::error::RepositoryError;
use crate::repository::section_repo::SectionRepository;
use crate::repository::sql_codec::{parse_date, parse_time};
use crate::repository::term_calendar_repo::TermCalendarRepository;
use crate::repository::tx::{with_write_tx, RetryPolicy};
use csv::{ReaderBuilder, StringRecord, Trim};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ==========================================
// CatalogKind - 导入文件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Rooms,
    TimeSlots,
    Sections,
    TermCalendar,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Rooms => "rooms",
            CatalogKind::TimeSlots => "time_slots",
            CatalogKind::Sections => "sections",
            CatalogKind::TermCalendar => "term_calendar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rooms" | "room" => Some(CatalogKind::Rooms),
            "time_slots" | "time_slot" | "timeslots" => Some(CatalogKind::TimeSlots),
            "sections" | "section" => Some(CatalogKind::Sections),
            "term_calendar" | "terms" | "calendar" => Some(CatalogKind::TermCalendar),
            _ => None,
        }
    }

    /// 必需列
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            CatalogKind::Rooms => &["room_id", "building", "capacity"],
            CatalogKind::TimeSlots => &["time_slot_id", "day_of_week", "start_time", "end_time"],
            CatalogKind::Sections => &["section_id", "course_id", "term_id", "max_enrollment"],
            CatalogKind::TermCalendar => &[
                "term_id",
                "add_drop_deadline",
                "withdrawal_deadline",
                "term_end_date",
            ],
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 导入报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub kind: CatalogKind,
    pub source: String,
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<RowRejection>,
}

// ==========================================
// CSV 行结构
// ==========================================
#[derive(Debug, Deserialize)]
struct RoomRow {
    room_id: String,
    building: String,
    capacity: i32,
    bookable: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSlotRow {
    time_slot_id: String,
    day_of_week: String,
    start_time: String,
    end_time: String,
}

#[derive(Debug, Deserialize)]
struct SectionRow {
    section_id: String,
    course_id: String,
    term_id: String,
    instructor_id: Option<String>,
    credit_hours: Option<i32>,
    max_enrollment: i32,
    waitlist_enabled: Option<String>,
    waitlist_capacity: Option<i32>,
    prerequisites_enforced: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TermCalendarRow {
    term_id: String,
    add_drop_deadline: String,
    withdrawal_deadline: String,
    term_end_date: String,
}

/// 已解析的一行（转换失败时为错误信息）
type ParsedRow<T> = (u64, Result<T, String>);

// ==========================================
// CatalogImporter - 导入器
// ==========================================
pub struct CatalogImporter {
    conn: Arc<Mutex<Connection>>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl CatalogImporter {
    pub fn new(conn: Arc<Mutex<Connection>>, retry_policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn,
            retry_policy,
            clock,
        }
    }

    /// 导入 CSV 文件
    pub fn import_file(&self, kind: CatalogKind, path: &Path) -> ImportResult<ImportReport> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }
        let file = File::open(path)?;
        self.import_reader(kind, file, &path.display().to_string())
    }

    /// 从任意读取源导入（source 仅用于日志与报告）
    pub fn import_reader<R: Read>(&self, kind: CatalogKind, reader: R, source: &str) -> ImportResult<ImportReport> {
        let report = match kind {
            CatalogKind::Rooms => {
                let rows = parse_rows(reader, kind, room_from_row)?;
                self.write_rows(kind, source, rows, |conn, room| RoomRepository::insert_tx(conn, room))?
            }
            CatalogKind::TimeSlots => {
                let rows = parse_rows(reader, kind, time_slot_from_row)?;
                self.write_rows(kind, source, rows, |conn, slot| TimeSlotRepository::insert_tx(conn, slot))?
            }
            CatalogKind::Sections => {
                let rows = parse_rows(reader, kind, section_from_row)?;
                self.write_rows(kind, source, rows, |conn, section| {
                    SectionRepository::insert_tx(conn, section)
                })?
            }
            CatalogKind::TermCalendar => {
                let rows = parse_rows(reader, kind, term_from_row)?;
                self.write_rows(kind, source, rows, |conn, deadlines| {
                    TermCalendarRepository::upsert_tx(conn, deadlines)
                })?
            }
        };

        info!(
            kind = %kind,
            source,
            total = report.total_rows,
            imported = report.imported,
            rejected = report.rejected.len(),
            "导入完成"
        );
        Ok(report)
    }

    fn write_rows<T, F>(
        &self,
        kind: CatalogKind,
        source: &str,
        rows: Vec<ParsedRow<T>>,
        insert: F,
    ) -> ImportResult<ImportReport>
    where
        F: Fn(&Connection, &T) -> Result<(), RepositoryError>,
    {
        let now = self.clock.now();
        let report = with_write_tx(&self.conn, &self.retry_policy, |tx| {
            let mut report = ImportReport {
                kind,
                source: source.to_string(),
                total_rows: rows.len(),
                imported: 0,
                rejected: Vec::new(),
            };
            for (line, parsed) in &rows {
                let outcome = match parsed {
                    Ok(item) => insert(&**tx, item).map_err(|e| e.to_string()),
                    Err(msg) => Err(msg.clone()),
                };
                match outcome {
                    Ok(()) => report.imported += 1,
                    Err(message) => {
                        warn!(kind = %kind, line, %message, "导入行被拒绝");
                        report.rejected.push(RowRejection { line: *line, message });
                    }
                }
            }
            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(ActionType::CatalogImport, source, now).with_payload(&json!({
                    "kind": kind,
                    "imported": report.imported,
                    "rejected": report.rejected.len(),
                })),
            )?;
            Ok::<_, RepositoryError>(report)
        })?;
        Ok(report)
    }
}

// ==========================================
// CSV 解析
// ==========================================

fn parse_rows<R, Raw, T, F>(reader: R, kind: CatalogKind, convert: F) -> ImportResult<Vec<ParsedRow<T>>>
where
    R: Read,
    Raw: DeserializeOwned,
    F: Fn(Raw) -> Result<T, String>,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers: StringRecord = rdr.headers()?.clone();

    for column in kind.required_columns() {
        if !headers.iter().any(|h| h == *column) {
            return Err(ImportError::MissingColumn(column.to_string()));
        }
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                rows.push((line, Err(e.to_string())));
                continue;
            }
        };
        // 跳过完全空白的行
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parsed = record
            .deserialize::<Raw>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(&convert);
        rows.push((line, parsed));
    }
    Ok(rows)
}

fn parse_flag(value: Option<&str>, default: bool) -> Result<bool, String> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "y" => Ok(true),
            "0" | "false" | "no" | "n" => Ok(false),
            _ => Err(format!("无法识别的布尔值: {}", v)),
        },
    }
}

fn required_date(field: &str, value: &str) -> Result<chrono::NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("{} 日期格式错误 (期望 YYYY-MM-DD): {}", field, value))
}

fn room_from_row(row: RoomRow) -> Result<Room, String> {
    let mut room = Room::new(row.room_id, row.building, row.capacity)?;
    room.bookable = parse_flag(row.bookable.as_deref(), true)?;
    Ok(room)
}

fn time_slot_from_row(row: TimeSlotRow) -> Result<TimeSlot, String> {
    let day = DayOfWeek::from_db_str(&row.day_of_week)
        .ok_or_else(|| format!("无法识别的星期: {}", row.day_of_week))?;
    let start = parse_time(&row.start_time)
        .ok_or_else(|| format!("start_time 格式错误 (期望 HH:MM): {}", row.start_time))?;
    let end = parse_time(&row.end_time)
        .ok_or_else(|| format!("end_time 格式错误 (期望 HH:MM): {}", row.end_time))?;
    TimeSlot::new(row.time_slot_id, day, start, end)
}

fn section_from_row(row: SectionRow) -> Result<Section, String> {
    if row.max_enrollment <= 0 {
        return Err(format!("max_enrollment 必须大于 0: {}", row.max_enrollment));
    }
    let waitlist_capacity = row.waitlist_capacity.unwrap_or(10);
    if waitlist_capacity < 0 {
        return Err(format!("waitlist_capacity 不能为负: {}", waitlist_capacity));
    }
    let credit_hours = row.credit_hours.unwrap_or(3);
    if credit_hours <= 0 {
        return Err(format!("credit_hours 必须大于 0: {}", credit_hours));
    }

    let mut section = Section::new(row.section_id, row.course_id, row.term_id, row.max_enrollment)
        .with_credit_hours(credit_hours)
        .with_waitlist(parse_flag(row.waitlist_enabled.as_deref(), true)?, waitlist_capacity)
        .with_prerequisites_enforced(parse_flag(row.prerequisites_enforced.as_deref(), false)?);
    if let Some(instructor) = row.instructor_id.filter(|s| !s.trim().is_empty()) {
        section = section.with_instructor(instructor);
    }
    Ok(section)
}

fn term_from_row(row: TermCalendarRow) -> Result<TermDeadlines, String> {
    let add_drop = required_date("add_drop_deadline", &row.add_drop_deadline)?;
    let withdrawal = required_date("withdrawal_deadline", &row.withdrawal_deadline)?;
    let term_end = required_date("term_end_date", &row.term_end_date)?;
    TermDeadlines::new(row.term_id, add_drop, withdrawal, term_end)
}
