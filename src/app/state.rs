// ==========================================
// 课程排课与选课核心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 规则: 所有 API 共享同一个连接；配置在启动时一次性读取
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{AttendanceApi, ApiContext, CourseApi, EnrollmentApi, GradeApi, ScheduleApi};
use crate::config::{ConfigManager, CoreConfig};
use crate::db::{apply_schema, open_sqlite_connection};
use crate::engine::calendar::TermCalendarProvider;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::events::OptionalEventPublisher;
use crate::importer::CatalogImporter;
use crate::repository::{
    action_log_repo::ActionLogRepository,
    attendance_repo::AttendanceRepository,
    course_repo::PrerequisiteRepository,
    enrollment_repo::EnrollmentRepository,
    schedule_repo::ScheduleAssignmentRepository,
    section_repo::SectionRepository,
    term_calendar_repo::TermCalendarRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    /// 启动时加载的配置快照
    pub config: CoreConfig,

    pub config_manager: Arc<ConfigManager>,

    /// 排课API
    pub schedule_api: Arc<ScheduleApi>,

    /// 选课生命周期API
    pub enrollment_api: Arc<EnrollmentApi>,

    /// 成绩API
    pub grade_api: Arc<GradeApi>,

    /// 考勤API
    pub attendance_api: Arc<AttendanceApi>,

    /// 课程先修API
    pub course_api: Arc<CourseApi>,

    /// 学期准备数据导入
    pub catalog_importer: Arc<CatalogImporter>,

    /// 班级仓储（计数审计）
    pub section_repo: Arc<SectionRepository>,

    /// 学期日历仓储
    pub term_calendar_repo: Arc<TermCalendarRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 打开（必要时创建）数据库并初始化全部 API
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并应用 schema（幂等）
    /// 2. 读取配置
    /// 3. 创建所有API实例（系统时钟，无事件订阅者）
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        apply_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;

        Self::from_connection(
            db_path,
            Arc::new(Mutex::new(conn)),
            Arc::new(SystemClock),
            OptionalEventPublisher::none(),
        )
    }

    /// 基于已打开的连接装配（测试注入固定时钟与事件订阅者）
    pub fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
        events: OptionalEventPublisher,
    ) -> Result<Self, String> {
        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_core_config()
            .map_err(|e| format!("无法加载配置: {}", e))?;
        tracing::debug!(config = ?config, "配置已加载");

        // ==========================================
        // Repository层
        // ==========================================
        let section_repo = Arc::new(SectionRepository::from_connection(conn.clone()));
        let schedule_repo = Arc::new(ScheduleAssignmentRepository::from_connection(conn.clone()));
        let enrollment_repo = Arc::new(EnrollmentRepository::from_connection(conn.clone()));
        let attendance_repo = Arc::new(AttendanceRepository::from_connection(conn.clone()));
        let prerequisite_repo = Arc::new(PrerequisiteRepository::from_connection(conn.clone()));
        let term_calendar_repo = Arc::new(TermCalendarRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // ==========================================
        // API层
        // ==========================================
        let ctx = ApiContext::new(conn.clone(), config.retry_policy(), clock.clone(), events);
        let calendar: Arc<dyn TermCalendarProvider> = term_calendar_repo.clone();

        let schedule_api = Arc::new(ScheduleApi::new(
            ctx.clone(),
            schedule_repo,
            config.conflict_options(),
            config.enforce_room_capacity,
        ));
        let enrollment_api = Arc::new(EnrollmentApi::new(
            ctx.clone(),
            section_repo.clone(),
            enrollment_repo.clone(),
            calendar,
            config.conflict_options(),
            config.enforce_student_timetable,
        ));
        let grade_api = Arc::new(GradeApi::new(ctx.clone(), enrollment_repo.clone()));
        let attendance_api = Arc::new(AttendanceApi::new(
            ctx.clone(),
            attendance_repo,
            enrollment_repo,
            config.attendance_policy(),
        ));
        let course_api = Arc::new(CourseApi::new(ctx, prerequisite_repo));
        let catalog_importer = Arc::new(CatalogImporter::new(conn, config.retry_policy(), clock));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            config,
            config_manager,
            schedule_api,
            enrollment_api,
            grade_api,
            attendance_api,
            course_api,
            catalog_importer,
            section_repo,
            term_calendar_repo,
            action_log_repo,
        })
    }
}

/// 默认数据库路径
///
/// 优先读取环境变量 ACADEMIC_SCHEDULER_DB_PATH，否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("ACADEMIC_SCHEDULER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./academic_scheduler.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("academic-scheduler");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("academic_scheduler.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_on_memory_db() {
        let state = AppState::new(":memory:".to_string()).unwrap();
        assert_eq!(state.config, CoreConfig::default());
        assert!(state.action_log_repo.find_recent(10).unwrap().is_empty());
    }
}
