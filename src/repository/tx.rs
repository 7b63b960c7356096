// ==========================================
// 课程排课与选课核心 - 写事务与重试
// ==========================================
// 红线: 读取-校验-写入 必须在同一个 BEGIN IMMEDIATE 事务内完成
// 红线: 瞬时冲突 (BUSY/LOCKED) 有界重试，耗尽后报告 RetryExhausted
// ==========================================

use crate::repository::error::RepositoryError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

// ==========================================
// RetryPolicy - 重试策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次失败后的额外尝试次数
    pub max_retries: u32,
    /// 线性退避单位: 第 n 次重试前等待 backoff_ms * n
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_ms,
        }
    }

    /// 不重试（测试用）
    pub fn no_retry() -> Self {
        Self::new(0, 0)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 20)
    }
}

// ==========================================
// TransientError - 可重试错误识别
// ==========================================
pub trait TransientError: Sized {
    fn is_transient(&self) -> bool;

    fn retry_exhausted(attempts: u32, last_error: String) -> Self;
}

impl TransientError for RepositoryError {
    fn is_transient(&self) -> bool {
        RepositoryError::is_transient(self)
    }

    fn retry_exhausted(attempts: u32, last_error: String) -> Self {
        RepositoryError::RetryExhausted {
            attempts,
            last_error,
        }
    }
}

/// 在 IMMEDIATE 写事务中执行 `op`，瞬时冲突时按策略重试
///
/// - `op` 返回 Err 时事务回滚（Transaction drop 即回滚），无任何部分写入可见
/// - 等待退避期间不持有进程内连接锁
pub fn with_write_tx<T, E, F>(
    conn: &Arc<Mutex<Connection>>,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, E>
where
    E: From<RepositoryError> + TransientError + Display,
    F: FnMut(&Transaction) -> Result<T, E>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let result = {
            let mut guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            run_once(&mut guard, &mut op)
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt > policy.max_retries {
                    warn!(attempts = attempt, error = %err, "写事务重试耗尽");
                    return Err(E::retry_exhausted(attempt, err.to_string()));
                }
                let delay = policy.backoff_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "写事务瞬时冲突，准备重试");
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}

fn run_once<T, E, F>(conn: &mut Connection, op: &mut F) -> Result<T, E>
where
    E: From<RepositoryError>,
    F: FnMut(&Transaction) -> Result<T, E>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(RepositoryError::from)?;
    let value = op(&tx)?;
    tx.commit().map_err(RepositoryError::from)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE counter (n INTEGER NOT NULL); INSERT INTO counter VALUES (0);")
            .unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn read_n(conn: &Arc<Mutex<Connection>>) -> i64 {
        conn.lock()
            .unwrap()
            .query_row("SELECT n FROM counter", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_on_success() {
        let conn = setup();
        let out: Result<i32, RepositoryError> =
            with_write_tx(&conn, &RetryPolicy::default(), |tx| {
                tx.execute("UPDATE counter SET n = n + 1", [])?;
                Ok(7)
            });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(read_n(&conn), 1);
    }

    #[test]
    fn test_rollback_on_error() {
        let conn = setup();
        let out: Result<(), RepositoryError> =
            with_write_tx(&conn, &RetryPolicy::default(), |tx| {
                tx.execute("UPDATE counter SET n = n + 1", [])?;
                Err(RepositoryError::BusinessRuleViolation("拒绝".to_string()))
            });
        assert!(matches!(out, Err(RepositoryError::BusinessRuleViolation(_))));
        assert_eq!(read_n(&conn), 0);
    }

    #[test]
    fn test_transient_error_retried_then_exhausted() {
        let conn = setup();
        let calls = Cell::new(0u32);
        let out: Result<(), RepositoryError> =
            with_write_tx(&conn, &RetryPolicy::new(2, 0), |tx| {
                calls.set(calls.get() + 1);
                tx.execute("UPDATE counter SET n = n + 1", [])?;
                Err(RepositoryError::TransientConflict("database is locked".to_string()))
            });

        assert_eq!(calls.get(), 3);
        match out {
            Err(RepositoryError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(read_n(&conn), 0);
    }

    #[test]
    fn test_transient_error_recovers() {
        let conn = setup();
        let calls = Cell::new(0u32);
        let out: Result<u32, RepositoryError> =
            with_write_tx(&conn, &RetryPolicy::new(3, 0), |tx| {
                calls.set(calls.get() + 1);
                if calls.get() < 2 {
                    return Err(RepositoryError::TransientConflict("busy".to_string()));
                }
                tx.execute("UPDATE counter SET n = n + 1", [])?;
                Ok(calls.get())
            });
        assert_eq!(out.unwrap(), 2);
        assert_eq!(read_n(&conn), 1);
    }
}
