// ==========================================
// 课程排课与选课核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为调用方可处理的错误
// 红线: 客户端输入错误携带足够细节（冲突的排课ID等），无需重试即可定位
// 红线: 瞬时冲突内部重试，耗尽后以 RetryExhausted 报告，调用方可重试
// ==========================================

use crate::domain::course::MissingPrerequisite;
use crate::domain::schedule::ScheduleConflict;
use crate::domain::types::EnrollmentStatus;
use crate::engine::enrollment_lifecycle::LifecycleAction;
use crate::repository::error::RepositoryError;
use crate::repository::tx::TransientError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 排课与选课规则错误
    // ==========================================
    /// 教室或教师时间冲突
    #[error("排课冲突: {0}")]
    ScheduleConflict(ScheduleConflict),

    #[error("班级已满且无法候补: section_id={section_id}, max={max_enrollment}")]
    CapacityExceeded {
        section_id: String,
        max_enrollment: i32,
    },

    #[error("重复选课: student_id={student_id}, section_id={section_id}")]
    DuplicateEnrollment {
        student_id: String,
        section_id: String,
    },

    #[error("无效的选课状态转换: {from} --{action}--> ({reason})")]
    InvalidTransition {
        from: EnrollmentStatus,
        action: LifecycleAction,
        reason: String,
    },

    #[error("成绩超出范围 [0,100]: {component}={value}")]
    InvalidGradeRange { component: String, value: f64 },

    #[error("重复考勤记录: enrollment_id={enrollment_id}, assignment_id={assignment_id}, date={session_date}")]
    DuplicateAttendanceRecord {
        enrollment_id: String,
        assignment_id: String,
        session_date: String,
    },

    #[error("班级已取消: {0}")]
    SectionCancelled(String),

    #[error("教室不可预订: {0}")]
    RoomNotBookable(String),

    #[error("先修课程未满足: {}", .missing.iter().map(|m| m.prerequisite_course_id.as_str()).collect::<Vec<_>>().join(","))]
    PrerequisitesNotMet { missing: Vec<MissingPrerequisite> },

    #[error("先修关系成环: {}", .cycle.join(" -> "))]
    PrerequisiteCycle { cycle: Vec<String> },

    #[error("选课登记已截止: term_id={term_id}, add_drop_deadline={add_drop_deadline}")]
    RegistrationClosed {
        term_id: String,
        add_drop_deadline: String,
    },

    #[error("选课记录不在有效状态: enrollment_id={enrollment_id}, status={status}")]
    EnrollmentNotActive {
        enrollment_id: String,
        status: EnrollmentStatus,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("事务瞬时冲突: {0}")]
    TransientConflict(String),

    #[error("事务重试耗尽（可稍后重试）: attempts={attempts}, last_error={last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 调用方是否可以原样重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::TransientConflict(_) | ApiError::RetryExhausted { .. }
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为调用方可处理的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::TransientConflict(msg) => ApiError::TransientConflict(msg),
            RepositoryError::RetryExhausted {
                attempts,
                last_error,
            } => ApiError::RetryExhausted {
                attempts,
                last_error,
            },

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::InvalidStoredValue { column, message } => {
                ApiError::DatabaseError(format!("存储值无法解析 (column={}): {}", column, message))
            }

            // 纵深防御约束: 并发下漏过校验时由唯一索引兜底
            RepositoryError::UniqueConstraintViolation(msg) => {
                if msg.contains("enrollment.student_id") {
                    ApiError::DuplicateEnrollment {
                        student_id: String::new(),
                        section_id: String::new(),
                    }
                } else if msg.contains("attendance_record.") {
                    ApiError::DuplicateAttendanceRecord {
                        enrollment_id: String::new(),
                        assignment_id: String::new(),
                        session_date: String::new(),
                    }
                } else {
                    ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
                }
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("引用的记录不存在: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("检查约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl TransientError for ApiError {
    fn is_transient(&self) -> bool {
        matches!(self, ApiError::TransientConflict(_))
    }

    fn retry_exhausted(attempts: u32, last_error: String) -> Self {
        ApiError::RetryExhausted {
            attempts,
            last_error,
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
