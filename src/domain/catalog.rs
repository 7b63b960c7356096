// ==========================================
// 课程排课与选课核心 - 时间与空间目录
// ==========================================
// 职责: 每周时段 (TimeSlot) 与教室 (Room)
// 红线: 被有效排课引用的时段不可修改
// ==========================================

use crate::domain::types::DayOfWeek;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ==========================================
// TimeSlot - 每周时段
// ==========================================
// 与具体日期无关的周期性时间窗口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time_slot_id: String,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime, // start_time < end_time
}

impl TimeSlot {
    /// 创建时段，校验 start < end
    pub fn new(
        time_slot_id: impl Into<String>,
        day_of_week: DayOfWeek,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self, String> {
        if start_time >= end_time {
            return Err(format!(
                "时段开始时间必须早于结束时间: start={}, end={}",
                start_time, end_time
            ));
        }
        Ok(Self {
            time_slot_id: time_slot_id.into(),
            day_of_week,
            start_time,
            end_time,
        })
    }

    /// 是否与另一时段在同一天内时间重叠（首尾相接不算重叠）
    pub fn overlaps_with(&self, other: &TimeSlot) -> bool {
        if self.day_of_week != other.day_of_week {
            return false;
        }
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    /// 时长（分钟）
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

// ==========================================
// Room - 教室
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub building: String,
    pub capacity: i32, // > 0
    pub bookable: bool,
}

impl Room {
    pub fn new(room_id: impl Into<String>, building: impl Into<String>, capacity: i32) -> Result<Self, String> {
        if capacity <= 0 {
            return Err(format!("教室容量必须大于0: capacity={}", capacity));
        }
        Ok(Self {
            room_id: room_id.into(),
            building: building.into(),
            capacity,
            bookable: true,
        })
    }
}
