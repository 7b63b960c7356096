// ==========================================
// 课程排课与选课核心 - 考勤领域模型
// ==========================================
// 红线: (enrollment_id, assignment_id, session_date) 唯一，只追加
// ==========================================

use crate::domain::types::{AttendanceStanding, AttendanceStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 单次课考勤记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub record_id: String,
    pub enrollment_id: String,
    pub assignment_id: String,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub recorded_at: NaiveDateTime,
}

/// 考勤计数（选课记录上的聚合字段）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceTally {
    pub total_classes: i32,
    pub attended_classes: i32,
}

/// 考勤汇总（对外返回）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub tally: AttendanceTally,
    pub attendance_percentage: f64,
    pub standing: AttendanceStanding,
}
