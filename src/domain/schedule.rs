// ==========================================
// 课程排课与选课核心 - 排课领域模型
// ==========================================
// 红线: 同教室同时段的有效排课日期区间不得重叠
// 红线: 同教师同时段的有效排课日期区间不得重叠
// ==========================================

use crate::domain::catalog::TimeSlot;
use crate::domain::types::{AssignmentKind, ConflictDimension};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// DateRange - 生效日期区间（闭区间，结束日缺省为 +∞）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self, String> {
        if let Some(end) = to {
            if end < from {
                return Err(format!("生效结束日期早于开始日期: from={}, to={}", from, end));
            }
        }
        Ok(Self { from, to })
    }

    pub fn open_ended(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    /// 区间重叠判定: a1 <= b2 AND b1 <= a2（闭区间，按自然日粒度）
    ///
    /// 同一天结束与开始视为冲突。
    pub fn overlaps(&self, other: &DateRange) -> bool {
        let self_starts_before_other_ends = match other.to {
            Some(b2) => self.from <= b2,
            None => true,
        };
        let other_starts_before_self_ends = match self.to {
            Some(a2) => other.from <= a2,
            None => true,
        };
        self_starts_before_other_ends && other_starts_before_self_ends
    }

    /// 日期是否落在区间内
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.map_or(true, |end| date <= end)
    }

    /// 两区间的交集（用于冲突说明）
    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        if !self.overlaps(other) {
            return None;
        }
        let from = self.from.max(other.from);
        let to = match (self.to, other.to) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        Some(DateRange { from, to })
    }
}

// ==========================================
// ScheduleAssignment - 排课（班级 × 时段 × 教室 × 日期区间）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleAssignment {
    pub assignment_id: String,
    pub section_id: String,
    pub time_slot_id: String,
    pub room_id: String,
    pub effective: DateRange,
    pub kind: AssignmentKind,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// BookedAssignment - 冲突检查视图（排课 + 班级教师 + 时段）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedAssignment {
    pub assignment_id: String,
    pub section_id: String,
    pub instructor_id: Option<String>,
    pub room_id: String,
    pub time_slot: TimeSlot,
    pub effective: DateRange,
}

// ==========================================
// ScheduleConflict - 冲突说明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    /// 与之冲突的既有（或同批次待提交）排课
    pub conflicting_assignment_id: String,
    pub conflicting_section_id: String,
    pub dimension: ConflictDimension,
    /// 被检查的候选排课
    pub candidate_assignment_id: String,
    /// 重叠的日期区间
    pub overlap: DateRange,
}

// ==========================================
// ScheduleChange - 批量排课变更
// ==========================================
impl fmt::Display for ScheduleConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to = self
            .overlap
            .to
            .map(|d| d.to_string())
            .unwrap_or_else(|| "open".to_string());
        write!(
            f,
            "{} 与排课 {} (班级 {}) 在 {} ~ {} 重叠",
            self.dimension, self.conflicting_assignment_id, self.conflicting_section_id, self.overlap.from, to
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleChange {
    Create {
        section_id: String,
        time_slot_id: String,
        room_id: String,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
        kind: AssignmentKind,
    },
    UpdateRange {
        assignment_id: String,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    },
    Deactivate {
        assignment_id: String,
    },
}

/// 批量变更结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleChangeOutcome {
    pub created_ids: Vec<String>,
    pub updated_ids: Vec<String>,
    pub deactivated_ids: Vec<String>,
}
