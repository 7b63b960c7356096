// ==========================================
// 课程排课与选课核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 规则: 缺失或格式错误的配置项回退到默认值，并打 warn 日志
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::attendance_tracker::AttendancePolicy;
use crate::engine::conflict_checker::ConflictCheckOptions;
use crate::repository::tx::RetryPolicy;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// CoreConfig - 核心配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub tx_max_retries: u32,
    pub tx_retry_backoff_ms: u64,
    pub attendance_warning_threshold_pct: f64,
    pub attendance_warning_min_sessions: i32,
    pub check_overlapping_time_slots: bool,
    pub enforce_room_capacity: bool,
    pub enforce_student_timetable: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tx_max_retries: 3,
            tx_retry_backoff_ms: 20,
            attendance_warning_threshold_pct: 75.0,
            attendance_warning_min_sessions: 5,
            check_overlapping_time_slots: true,
            enforce_room_capacity: false,
            enforce_student_timetable: false,
        }
    }
}

impl CoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.tx_max_retries, self.tx_retry_backoff_ms)
    }

    pub fn attendance_policy(&self) -> AttendancePolicy {
        AttendancePolicy {
            warning_threshold_pct: self.attendance_warning_threshold_pct,
            min_sessions: self.attendance_warning_min_sessions,
        }
    }

    pub fn conflict_options(&self) -> ConflictCheckOptions {
        ConflictCheckOptions {
            check_overlapping_time_slots: self.check_overlapping_time_slots,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 读取并解析配置值；缺失或解析失败时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Debug,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = ?default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 布尔配置: 接受 true/false/1/0（大小写不敏感）
    fn get_bool_or_default(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => {
                tracing::warn!(config_key = key, raw_value = %raw, default, "布尔配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    // ===== 事务重试 =====

    pub fn get_tx_max_retries(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::TX_MAX_RETRIES, CoreConfig::default().tx_max_retries)
    }

    pub fn get_tx_retry_backoff_ms(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::TX_RETRY_BACKOFF_MS,
            CoreConfig::default().tx_retry_backoff_ms,
        )
    }

    // ===== 考勤预警 =====

    pub fn get_attendance_warning_threshold_pct(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_parsed_or_default(
            config_keys::ATTENDANCE_WARNING_THRESHOLD_PCT,
            CoreConfig::default().attendance_warning_threshold_pct,
        )?;
        if !(0.0..=100.0).contains(&value) {
            tracing::warn!(value, "考勤预警阈值超出 [0,100]，使用默认值");
            return Ok(CoreConfig::default().attendance_warning_threshold_pct);
        }
        Ok(value)
    }

    pub fn get_attendance_warning_min_sessions(&self) -> Result<i32, Box<dyn Error>> {
        let value = self.get_parsed_or_default(
            config_keys::ATTENDANCE_WARNING_MIN_SESSIONS,
            CoreConfig::default().attendance_warning_min_sessions,
        )?;
        Ok(value.max(0))
    }

    // ===== 排课与选课校验开关 =====

    pub fn get_check_overlapping_time_slots(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool_or_default(
            config_keys::CHECK_OVERLAPPING_TIME_SLOTS,
            CoreConfig::default().check_overlapping_time_slots,
        )
    }

    pub fn get_enforce_room_capacity(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool_or_default(
            config_keys::ENFORCE_ROOM_CAPACITY,
            CoreConfig::default().enforce_room_capacity,
        )
    }

    pub fn get_enforce_student_timetable(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool_or_default(
            config_keys::ENFORCE_STUDENT_TIMETABLE,
            CoreConfig::default().enforce_student_timetable,
        )
    }

    /// 一次性加载核心配置
    pub fn load_core_config(&self) -> Result<CoreConfig, Box<dyn Error>> {
        Ok(CoreConfig {
            tx_max_retries: self.get_tx_max_retries()?,
            tx_retry_backoff_ms: self.get_tx_retry_backoff_ms()?,
            attendance_warning_threshold_pct: self.get_attendance_warning_threshold_pct()?,
            attendance_warning_min_sessions: self.get_attendance_warning_min_sessions()?,
            check_overlapping_time_slots: self.get_check_overlapping_time_slots()?,
            enforce_room_capacity: self.get_enforce_room_capacity()?,
            enforce_student_timetable: self.get_enforce_student_timetable()?,
        })
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 返回
    /// - Ok(String): 配置快照的JSON字符串
    /// - Err: 获取失败
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    /// - `__meta_` 前缀的键不回写
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            if key.starts_with("__meta_") {
                continue;
            }
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value, updated_at)
                 VALUES ('global', ?1, ?2, datetime('now'))
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;

        Ok(count)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 事务重试
    pub const TX_MAX_RETRIES: &str = "tx_max_retries";
    pub const TX_RETRY_BACKOFF_MS: &str = "tx_retry_backoff_ms";

    // 考勤预警
    pub const ATTENDANCE_WARNING_THRESHOLD_PCT: &str = "attendance_warning_threshold_pct";
    pub const ATTENDANCE_WARNING_MIN_SESSIONS: &str = "attendance_warning_min_sessions";

    // 排课冲突
    pub const CHECK_OVERLAPPING_TIME_SLOTS: &str = "check_overlapping_time_slots";
    pub const ENFORCE_ROOM_CAPACITY: &str = "enforce_room_capacity";

    // 选课
    pub const ENFORCE_STUDENT_TIMETABLE: &str = "enforce_student_timetable";
}
