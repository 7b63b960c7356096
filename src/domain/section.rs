// ==========================================
// 课程排课与选课核心 - 开课班级领域模型
// ==========================================
// 红线: current_enrollment 只能由选课生命周期在同一事务内维护
// 红线: current_enrollment == ENROLLED + COMPLETED 的选课数
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Section - 开课班级（某学期某课程的一个教学班）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    // ===== 标识 =====
    pub section_id: String,
    pub course_id: String, // 外部课程注册表
    pub term_id: String,   // 外部学期注册表
    pub instructor_id: Option<String>,
    pub credit_hours: i32,

    // ===== 容量 =====
    pub max_enrollment: i32,     // > 0
    pub current_enrollment: i32, // 只读投影，由生命周期维护

    // ===== 候补 =====
    pub waitlist_enabled: bool,
    pub waitlist_capacity: i32,

    // ===== 规则开关 =====
    pub prerequisites_enforced: bool,
    pub is_cancelled: bool,
}

impl Section {
    /// 创建新班级（current_enrollment 固定从 0 开始）
    pub fn new(
        section_id: impl Into<String>,
        course_id: impl Into<String>,
        term_id: impl Into<String>,
        max_enrollment: i32,
    ) -> Self {
        Self {
            section_id: section_id.into(),
            course_id: course_id.into(),
            term_id: term_id.into(),
            instructor_id: None,
            credit_hours: 3,
            max_enrollment,
            current_enrollment: 0,
            waitlist_enabled: true,
            waitlist_capacity: 10,
            prerequisites_enforced: false,
            is_cancelled: false,
        }
    }

    pub fn with_instructor(mut self, instructor_id: impl Into<String>) -> Self {
        self.instructor_id = Some(instructor_id.into());
        self
    }

    pub fn with_waitlist(mut self, enabled: bool, capacity: i32) -> Self {
        self.waitlist_enabled = enabled;
        self.waitlist_capacity = capacity;
        self
    }

    pub fn with_credit_hours(mut self, credit_hours: i32) -> Self {
        self.credit_hours = credit_hours;
        self
    }

    pub fn with_prerequisites_enforced(mut self, enforced: bool) -> Self {
        self.prerequisites_enforced = enforced;
        self
    }

    /// 剩余座位
    pub fn available_seats(&self) -> i32 {
        (self.max_enrollment - self.current_enrollment).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.current_enrollment >= self.max_enrollment
    }
}

// ==========================================
// SectionOccupancy - 班级占用情况（只读投影）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionOccupancy {
    pub section_id: String,
    pub max_enrollment: i32,
    pub current_enrollment: i32,
    pub waitlisted: i32,
    pub available: i32,
}

// ==========================================
// EnrollmentCounterAudit - 计数器核对结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentCounterAudit {
    pub section_id: String,
    pub stored: i32,
    pub derived: i32,
}

impl EnrollmentCounterAudit {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.derived
    }
}
