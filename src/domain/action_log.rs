// ==========================================
// 课程排课与选课核心 - 操作日志领域模型
// ==========================================
// 红线: 每个已提交的写操作必须在同一事务内追加一条日志
// 用途: 审计追踪
// 对齐: v0.1_academic_core.sql action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: ActionType,
    pub entity_id: String,          // 被操作实体 (排课/选课/时段/课程 ID)
    pub section_id: Option<String>, // 关联班级
    pub action_ts: NaiveDateTime,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    // ===== 排课 =====
    ScheduleCreate,
    ScheduleUpdateRange,
    ScheduleDeactivate,
    TimeSlotUpdate,
    // ===== 选课 =====
    Enroll,
    Waitlist,
    WaitlistPromote,
    Drop,
    Withdraw,
    Complete,
    // ===== 成绩 / 考勤 =====
    RecordScores,
    RecordAttendance,
    // ===== 课程定义 =====
    DefinePrerequisite,
    RemovePrerequisite,
    // ===== 目录导入 =====
    CatalogImport,
    // ===== 配置 =====
    ConfigUpdate,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ScheduleCreate => "ScheduleCreate",
            ActionType::ScheduleUpdateRange => "ScheduleUpdateRange",
            ActionType::ScheduleDeactivate => "ScheduleDeactivate",
            ActionType::TimeSlotUpdate => "TimeSlotUpdate",
            ActionType::Enroll => "Enroll",
            ActionType::Waitlist => "Waitlist",
            ActionType::WaitlistPromote => "WaitlistPromote",
            ActionType::Drop => "Drop",
            ActionType::Withdraw => "Withdraw",
            ActionType::Complete => "Complete",
            ActionType::RecordScores => "RecordScores",
            ActionType::RecordAttendance => "RecordAttendance",
            ActionType::DefinePrerequisite => "DefinePrerequisite",
            ActionType::RemovePrerequisite => "RemovePrerequisite",
            ActionType::CatalogImport => "CatalogImport",
            ActionType::ConfigUpdate => "ConfigUpdate",
        }
    }

    /// 从字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        let all = [
            ActionType::ScheduleCreate,
            ActionType::ScheduleUpdateRange,
            ActionType::ScheduleDeactivate,
            ActionType::TimeSlotUpdate,
            ActionType::Enroll,
            ActionType::Waitlist,
            ActionType::WaitlistPromote,
            ActionType::Drop,
            ActionType::Withdraw,
            ActionType::Complete,
            ActionType::RecordScores,
            ActionType::RecordAttendance,
            ActionType::DefinePrerequisite,
            ActionType::RemovePrerequisite,
            ActionType::CatalogImport,
            ActionType::ConfigUpdate,
        ];
        all.into_iter().find(|t| t.as_str() == s)
    }
}

impl ActionLog {
    pub fn new(
        action_type: ActionType,
        entity_id: impl Into<String>,
        action_ts: NaiveDateTime,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type,
            entity_id: entity_id.into(),
            section_id: None,
            action_ts,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_section(mut self, section_id: impl Into<String>) -> Self {
        self.section_id = Some(section_id.into());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
