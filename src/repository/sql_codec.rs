// ==========================================
// 课程排课与选课核心 - 列值编解码
// ==========================================
// 约定: 日期/时间/时间戳以 TEXT 存储（见 v0.1_academic_core.sql 头部）
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::Row;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIME_FMT: &str = "%H:%M:%S";
pub const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn fmt_opt_date(d: Option<NaiveDate>) -> Option<String> {
    d.map(fmt_date)
}

pub fn fmt_time(t: NaiveTime) -> String {
    t.format(TIME_FMT).to_string()
}

pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

/// 接受 HH:MM:SS 与 HH:MM
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT).ok()
}

fn conversion_error(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("无法解析的存储值: '{}'", raw).into(),
    )
}

/// 读取 TEXT 列并用 `parse` 转换；失败时报告列号与原值
pub fn parsed_col<T>(row: &Row, idx: usize, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, &raw))
}

pub fn opt_parsed_col<T>(
    row: &Row,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse(&raw).map(Some).ok_or_else(|| conversion_error(idx, &raw)),
        None => Ok(None),
    }
}

pub fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    parsed_col(row, idx, parse_date)
}

pub fn opt_date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    opt_parsed_col(row, idx, parse_date)
}

pub fn time_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    parsed_col(row, idx, parse_time)
}

pub fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    parsed_col(row, idx, |s| NaiveDateTime::parse_from_str(s.trim(), TS_FMT).ok())
}
