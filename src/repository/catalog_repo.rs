// ==========================================
// 课程排课与选课核心 - 时间与空间目录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 被有效排课引用的时段不可修改（守卫在同一条 UPDATE 内完成）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::{Room, TimeSlot};
use crate::domain::types::DayOfWeek;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{fmt_time, parsed_col, time_col};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// TimeSlotRepository - 时段仓储
// ==========================================
pub struct TimeSlotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimeSlotRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, slot: &TimeSlot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, slot)
    }

    pub fn insert_tx(conn: &Connection, slot: &TimeSlot) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO time_slot (time_slot_id, day_of_week, start_time, end_time)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                slot.time_slot_id,
                slot.day_of_week.to_db_str(),
                fmt_time(slot.start_time),
                fmt_time(slot.end_time),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, time_slot_id: &str) -> RepositoryResult<Option<TimeSlot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, time_slot_id)
    }

    pub fn find_by_id_tx(conn: &Connection, time_slot_id: &str) -> RepositoryResult<Option<TimeSlot>> {
        let slot = conn
            .query_row(
                r#"
                SELECT time_slot_id, day_of_week, start_time, end_time
                FROM time_slot
                WHERE time_slot_id = ?1
                "#,
                params![time_slot_id],
                map_time_slot_row,
            )
            .optional()?;
        Ok(slot)
    }

    /// 被有效排课引用的次数
    pub fn count_active_references_tx(conn: &Connection, time_slot_id: &str) -> RepositoryResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM schedule_assignment WHERE time_slot_id = ?1 AND is_active = 1",
            params![time_slot_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 修改时段起止时间
    ///
    /// 仅当没有任何有效排课引用该时段时生效；守卫条件与更新在同一条语句内。
    ///
    /// # 返回
    /// - Ok(()): 已修改
    /// - Err(NotFound): 时段不存在
    /// - Err(BusinessRuleViolation): 时段被有效排课引用
    pub fn update_times_tx(
        conn: &Connection,
        time_slot_id: &str,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE time_slot
            SET start_time = ?2, end_time = ?3
            WHERE time_slot_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM schedule_assignment
                  WHERE time_slot_id = ?1 AND is_active = 1
              )
            "#,
            params![time_slot_id, fmt_time(start_time), fmt_time(end_time)],
        )?;

        if rows == 1 {
            return Ok(());
        }
        if Self::find_by_id_tx(conn, time_slot_id)?.is_none() {
            return Err(RepositoryError::not_found("TimeSlot", time_slot_id));
        }
        let refs = Self::count_active_references_tx(conn, time_slot_id)?;
        Err(RepositoryError::BusinessRuleViolation(format!(
            "时段 {} 被 {} 条有效排课引用，不可修改",
            time_slot_id, refs
        )))
    }

    pub fn update_times(
        &self,
        time_slot_id: &str,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::update_times_tx(&conn, time_slot_id, start_time, end_time)
    }
}

pub(crate) fn map_time_slot_row(row: &Row) -> SqliteResult<TimeSlot> {
    Ok(TimeSlot {
        time_slot_id: row.get(0)?,
        day_of_week: parsed_col(row, 1, DayOfWeek::from_db_str)?,
        start_time: time_col(row, 2)?,
        end_time: time_col(row, 3)?,
    })
}

// ==========================================
// RoomRepository - 教室仓储
// ==========================================
pub struct RoomRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoomRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, room: &Room) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, room)
    }

    pub fn insert_tx(conn: &Connection, room: &Room) -> RepositoryResult<()> {
        conn.execute(
            "INSERT INTO room (room_id, building, capacity, bookable) VALUES (?1, ?2, ?3, ?4)",
            params![room.room_id, room.building, room.capacity, room.bookable],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, room_id: &str) -> RepositoryResult<Option<Room>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, room_id)
    }

    pub fn find_by_id_tx(conn: &Connection, room_id: &str) -> RepositoryResult<Option<Room>> {
        let room = conn
            .query_row(
                "SELECT room_id, building, capacity, bookable FROM room WHERE room_id = ?1",
                params![room_id],
                |row| {
                    Ok(Room {
                        room_id: row.get(0)?,
                        building: row.get(1)?,
                        capacity: row.get(2)?,
                        bookable: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(room)
    }

    /// 设置教室可预订标记（学期准备流程使用）
    pub fn set_bookable(&self, room_id: &str, bookable: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE room SET bookable = ?2 WHERE room_id = ?1",
            params![room_id, bookable],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Room", room_id));
        }
        Ok(())
    }
}
