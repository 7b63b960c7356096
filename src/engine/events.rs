// ==========================================
// 课程排课与选课核心 - 引擎层事件发布
// ==========================================
// 职责: 定义教务事件发布 trait，外部协作方（计费/通知/报表）实现适配器
// 红线: 事件在事务提交之后发布；发布失败只记日志，不回滚
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 教务事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicEventType {
    /// 选课状态变更（选上/候补/退课/中途退出/结课）
    EnrollmentChanged,
    /// 候补转正
    WaitlistPromoted,
    /// 排课变更（新建/改期/停用）
    ScheduleChanged,
    /// 成绩录入
    GradeRecorded,
    /// 出勤率跌破预警线
    AttendanceWarning,
}

impl AcademicEventType {
    pub fn as_str(&self) -> &str {
        match self {
            AcademicEventType::EnrollmentChanged => "EnrollmentChanged",
            AcademicEventType::WaitlistPromoted => "WaitlistPromoted",
            AcademicEventType::ScheduleChanged => "ScheduleChanged",
            AcademicEventType::GradeRecorded => "GradeRecorded",
            AcademicEventType::AttendanceWarning => "AttendanceWarning",
        }
    }
}

/// 教务事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicEvent {
    pub event_type: AcademicEventType,
    /// 事件主体（选课 ID / 排课 ID）
    pub entity_id: String,
    pub section_id: Option<String>,
    pub student_id: Option<String>,
    pub payload: Option<JsonValue>,
}

impl AcademicEvent {
    pub fn new(event_type: AcademicEventType, entity_id: impl Into<String>) -> Self {
        Self {
            event_type,
            entity_id: entity_id.into(),
            section_id: None,
            student_id: None,
            payload: None,
        }
    }

    pub fn with_section(mut self, section_id: impl Into<String>) -> Self {
        self.section_id = Some(section_id.into());
        self
    }

    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 教务事件发布者
///
/// # 实现说明
/// - 计费、通知、报表等外部协作方各自实现
/// - 实现必须是非阻塞或快速返回的；调用方不会重试
pub trait AcademicEventPublisher: Send + Sync {
    /// # 返回
    /// - `Ok(id)`: 外部消息 ID（如果支持）或空字符串
    /// - `Err`: 发布失败
    fn publish(&self, event: AcademicEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl AcademicEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: AcademicEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - entity_id={}, event_type={}",
            event.entity_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn AcademicEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn AcademicEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, event: AcademicEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - entity_id={}, event_type={}",
                    event.entity_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 发布事件，失败只记录警告（提交后调用）
    pub fn publish_after_commit(&self, event: AcademicEvent) {
        let event_type = event.event_type;
        let entity_id = event.entity_id.clone();
        if let Err(e) = self.publish(event) {
            tracing::warn!(
                event_type = event_type.as_str(),
                entity_id = %entity_id,
                error = %e,
                "事件发布失败（已提交的写入不回滚）"
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
