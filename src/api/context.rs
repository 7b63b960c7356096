// ==========================================
// 课程排课与选课核心 - API 写上下文
// ==========================================
// 各 API 共享: 同一连接、重试策略、注入时钟、事件发布器
// 红线: 写操作统一走 run_write_tx（BEGIN IMMEDIATE + 有界重试）
// 红线: 事务闭包内只能使用 *_tx 仓储函数，不能再锁同一连接
// ==========================================

use crate::api::error::ApiResult;
use crate::engine::clock::Clock;
use crate::engine::events::OptionalEventPublisher;
use crate::repository::tx::{with_write_tx, RetryPolicy};
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct ApiContext {
    conn: Arc<Mutex<Connection>>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    events: OptionalEventPublisher,
}

impl ApiContext {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        retry_policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            conn,
            retry_policy,
            clock,
            events,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn events(&self) -> &OptionalEventPublisher {
        &self.events
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// 在写事务中执行 op；Err 时整体回滚
    pub fn run_write_tx<T, F>(&self, op: F) -> ApiResult<T>
    where
        F: FnMut(&Transaction) -> ApiResult<T>,
    {
        with_write_tx(&self.conn, &self.retry_policy, op)
    }
}
