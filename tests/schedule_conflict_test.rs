// ==========================================
// 排课冲突检查测试
// ==========================================
// 职责: 验证教室/教师维度的冲突判定、批量修改的原子性、多连接并发排课与冲突配置开关
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod schedule_conflict_test {
    use academic_scheduler::api::ApiError;
    use academic_scheduler::app::AppState;
    use academic_scheduler::config::config_keys;
    use academic_scheduler::db::open_sqlite_connection;
    use academic_scheduler::domain::{
        AssignmentKind, ConflictDimension, DayOfWeek, ScheduleChange, Section,
    };
    use academic_scheduler::engine::{AcademicEventType, FixedClock, OptionalEventPublisher};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use crate::test_helpers::{d, setup_env, setup_env_with_config, t, TestEnv};

    /// R101 周日 08:00-09:30，班级 A / B 由不同教师任课
    fn sunday_env() -> TestEnv {
        let env = setup_env(d(2025, 1, 1));
        env.seed_room("R101", 40);
        env.seed_slot("SUN-0800", DayOfWeek::Sunday, t(8, 0), t(9, 30));
        env.seed_section(Section::new("A", "CS101", "2025S", 30).with_instructor("T1"));
        env.seed_section(Section::new("B", "CS102", "2025S", 30).with_instructor("T2"));
        env
    }

    #[test]
    fn test_room_conflict_respects_effective_dates() {
        let env = sunday_env();
        let api = &env.state.schedule_api;

        let a = api
            .create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), Some(d(2025, 5, 1)), AssignmentKind::Lecture)
            .unwrap();

        let err = api
            .create_assignment("B", "SUN-0800", "R101", d(2025, 4, 1), None, AssignmentKind::Lecture)
            .unwrap_err();
        match err {
            ApiError::ScheduleConflict(conflict) => {
                assert_eq!(conflict.conflicting_assignment_id, a);
                assert_eq!(conflict.conflicting_section_id, "A");
                assert_eq!(conflict.dimension, ConflictDimension::Room);
                assert_eq!(conflict.overlap.from, d(2025, 4, 1));
                assert_eq!(conflict.overlap.to, Some(d(2025, 5, 1)));
            }
            other => panic!("期望排课冲突，实际: {:?}", other),
        }

        let b = api
            .create_assignment("B", "SUN-0800", "R101", d(2025, 5, 2), None, AssignmentKind::Lecture)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(env.events.count_of(AcademicEventType::ScheduleChanged), 2);
        assert_eq!(env.count_rows("SELECT COUNT(*) FROM schedule_assignment"), 2);
    }

    #[test]
    fn test_rejected_create_leaves_no_rows_or_logs() {
        let env = sunday_env();
        let api = &env.state.schedule_api;
        api.create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
        let logs_before = env.count_rows("SELECT COUNT(*) FROM action_log");

        assert!(api
            .create_assignment("B", "SUN-0800", "R101", d(2025, 9, 1), None, AssignmentKind::Lecture)
            .is_err());

        assert_eq!(env.count_rows("SELECT COUNT(*) FROM schedule_assignment"), 1);
        assert_eq!(env.count_rows("SELECT COUNT(*) FROM action_log"), logs_before);
    }

    #[test]
    fn test_instructor_conflict_across_rooms() {
        let env = sunday_env();
        env.seed_room("R102", 40);
        env.seed_section(Section::new("C", "CS201", "2025S", 30).with_instructor("T1"));
        let api = &env.state.schedule_api;

        api.create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
        let err = api
            .create_assignment("C", "SUN-0800", "R102", d(2025, 2, 1), None, AssignmentKind::Lecture)
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::ScheduleConflict(ref c) if c.dimension == ConflictDimension::Instructor
        ));

        // 不同教师、不同教室可以并行
        api.create_assignment("B", "SUN-0800", "R102", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
    }

    #[test]
    fn test_overlapping_time_slots_follow_config() {
        for (enabled, expect_conflict) in [("true", true), ("false", false)] {
            let env = setup_env_with_config(
                d(2025, 1, 1),
                &[(config_keys::CHECK_OVERLAPPING_TIME_SLOTS, enabled)],
            );
            env.seed_room("R101", 40);
            env.seed_slot("MON-0800", DayOfWeek::Monday, t(8, 0), t(9, 30));
            env.seed_slot("MON-0900", DayOfWeek::Monday, t(9, 0), t(10, 30));
            env.seed_section(Section::new("A", "CS101", "2025S", 30));
            env.seed_section(Section::new("B", "CS102", "2025S", 30));
            let api = &env.state.schedule_api;

            api.create_assignment("A", "MON-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
                .unwrap();
            let result =
                api.create_assignment("B", "MON-0900", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture);
            assert_eq!(result.is_err(), expect_conflict, "check_overlapping_time_slots={}", enabled);
        }
    }

    #[test]
    fn test_batch_shorten_then_create_is_atomic() {
        let env = sunday_env();
        let api = &env.state.schedule_api;
        let a = api
            .create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();

        // 缩短 A 后在同一批次中为 B 排入空出来的日期
        let outcome = api
            .apply_changes(&[
                ScheduleChange::UpdateRange {
                    assignment_id: a.clone(),
                    effective_from: d(2025, 1, 1),
                    effective_to: Some(d(2025, 3, 31)),
                },
                ScheduleChange::Create {
                    section_id: "B".to_string(),
                    time_slot_id: "SUN-0800".to_string(),
                    room_id: "R101".to_string(),
                    effective_from: d(2025, 4, 1),
                    effective_to: None,
                    kind: AssignmentKind::Lecture,
                },
            ])
            .unwrap();
        assert_eq!(outcome.updated_ids, vec![a.clone()]);
        assert_eq!(outcome.created_ids.len(), 1);

        // 批次内有一项冲突则整体不生效
        let err = api
            .apply_changes(&[
                ScheduleChange::UpdateRange {
                    assignment_id: a.clone(),
                    effective_from: d(2025, 1, 1),
                    effective_to: Some(d(2025, 2, 28)),
                },
                ScheduleChange::Create {
                    section_id: "A".to_string(),
                    time_slot_id: "SUN-0800".to_string(),
                    room_id: "R101".to_string(),
                    effective_from: d(2025, 6, 1),
                    effective_to: None,
                    kind: AssignmentKind::Tutorial,
                },
            ])
            .unwrap_err();
        assert!(matches!(err, ApiError::ScheduleConflict(_)));
        let stored = api.get_assignment(&a).unwrap();
        assert_eq!(stored.effective.to, Some(d(2025, 3, 31)));
    }

    #[test]
    fn test_deactivate_frees_room() {
        let env = sunday_env();
        let api = &env.state.schedule_api;
        let a = api
            .create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
        api.deactivate_assignment(&a).unwrap();

        api.create_assignment("B", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
        assert!(!api.get_assignment(&a).unwrap().is_active);

        // 已停用的排课不能再次停用或改期
        assert!(matches!(api.deactivate_assignment(&a), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_invalid_references_are_rejected() {
        let env = sunday_env();
        let api = &env.state.schedule_api;

        assert!(matches!(
            api.create_assignment("A", "SUN-0800", "R404", d(2025, 1, 1), None, AssignmentKind::Lecture),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.create_assignment("A", "SUN-0800", "R101", d(2025, 5, 1), Some(d(2025, 1, 1)), AssignmentKind::Lecture),
            Err(ApiError::InvalidInput(_))
        ));

        env.conn
            .lock()
            .unwrap()
            .execute("UPDATE room SET bookable = 0 WHERE room_id = 'R101'", [])
            .unwrap();
        assert!(matches!(
            api.create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture),
            Err(ApiError::RoomNotBookable(_))
        ));
    }

    #[test]
    fn test_room_capacity_enforcement() {
        let env = setup_env_with_config(d(2025, 1, 1), &[(config_keys::ENFORCE_ROOM_CAPACITY, "true")]);
        env.seed_room("SMALL", 10);
        env.seed_slot("SUN-0800", DayOfWeek::Sunday, t(8, 0), t(9, 30));
        env.seed_section(Section::new("BIG", "CS101", "2025S", 30));

        let err = env
            .state
            .schedule_api
            .create_assignment("BIG", "SUN-0800", "SMALL", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap_err();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

        // 默认配置只告警
        let env = sunday_env();
        env.seed_room("SMALL", 10);
        env.state
            .schedule_api
            .create_assignment("A", "SUN-0800", "SMALL", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();
    }

    #[test]
    fn test_time_slot_update_blocked_while_referenced() {
        let env = sunday_env();
        let api = &env.state.schedule_api;
        let a = api
            .create_assignment("A", "SUN-0800", "R101", d(2025, 1, 1), None, AssignmentKind::Lecture)
            .unwrap();

        assert!(matches!(
            api.update_time_slot("SUN-0800", t(8, 30), t(10, 0)),
            Err(ApiError::BusinessRuleViolation(_))
        ));
        assert!(matches!(
            api.update_time_slot("SUN-0800", t(10, 0), t(8, 0)),
            Err(ApiError::InvalidInput(_))
        ));

        api.deactivate_assignment(&a).unwrap();
        api.update_time_slot("SUN-0800", t(8, 30), t(10, 0)).unwrap();
    }

    /// 随机排课序列: 每次写入结果须与朴素两两比较一致，且最终没有任何冲突对
    #[test]
    fn test_random_assignments_match_pairwise_oracle() {
        let env = setup_env(d(2025, 1, 1));
        let rooms = ["R1", "R2"];
        let instructors = ["T1", "T2", "T3"];
        for room in rooms {
            env.seed_room(room, 50);
        }
        env.seed_slot("S1", DayOfWeek::Monday, t(8, 0), t(9, 0));
        env.seed_slot("S2", DayOfWeek::Monday, t(8, 30), t(9, 30));
        env.seed_slot("S3", DayOfWeek::Monday, t(10, 0), t(11, 0));
        let slots = [("S1", t(8, 0), t(9, 0)), ("S2", t(8, 30), t(9, 30)), ("S3", t(10, 0), t(11, 0))];
        for i in 0..6 {
            env.seed_section(
                Section::new(format!("SEC{}", i), format!("C{}", i), "2025S", 30)
                    .with_instructor(instructors[i % instructors.len()]),
            );
        }

        struct Placed {
            section: usize,
            slot: usize,
            room: usize,
            from: chrono::NaiveDate,
            to: chrono::NaiveDate,
        }
        let clash = |a: &Placed, b: &Placed| {
            let (_, a_start, a_end) = slots[a.slot];
            let (_, b_start, b_end) = slots[b.slot];
            let time = a_start < b_end && b_start < a_end;
            let dates = a.from <= b.to && b.from <= a.to;
            let same_room = a.room == b.room;
            let same_instructor = a.section % instructors.len() == b.section % instructors.len();
            time && dates && (same_room || same_instructor)
        };

        let mut rng = SmallRng::seed_from_u64(20250101);
        let mut placed: Vec<Placed> = Vec::new();
        for _ in 0..60 {
            let start = d(2025, 1, 1) + chrono::Duration::days(rng.random_range(0..120));
            let candidate = Placed {
                section: rng.random_range(0..6),
                slot: rng.random_range(0..slots.len()),
                room: rng.random_range(0..rooms.len()),
                from: start,
                to: start + chrono::Duration::days(rng.random_range(0..60)),
            };
            let expected_ok = !placed.iter().any(|p| clash(p, &candidate));
            let result = env.state.schedule_api.create_assignment(
                &format!("SEC{}", candidate.section),
                slots[candidate.slot].0,
                rooms[candidate.room],
                candidate.from,
                Some(candidate.to),
                AssignmentKind::Lecture,
            );
            match result {
                Ok(_) => {
                    assert!(expected_ok, "写入成功但存在冲突对");
                    placed.push(candidate);
                }
                Err(ApiError::ScheduleConflict(_)) => assert!(!expected_ok, "无冲突却被拒绝"),
                Err(other) => panic!("意外错误: {:?}", other),
            }
        }

        for (i, a) in placed.iter().enumerate() {
            for b in placed.iter().skip(i + 1) {
                assert!(!clash(a, b));
            }
        }
        assert!(!placed.is_empty());
    }

    #[test]
    fn test_concurrent_requests_for_same_room_and_slot() {
        let env = setup_env(d(2025, 1, 1));
        env.seed_standard_term();
        env.seed_room("R101", 40);
        env.seed_slot("SUN-0800", DayOfWeek::Sunday, t(8, 0), t(9, 30));

        let threads = 8;
        for i in 0..threads {
            env.seed_section(Section::new(format!("S{}", i), format!("CS1{:02}", i), "2025S", 30));
        }

        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let db_path = env.db_path.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    // 每个线程独立连接
                    let conn = open_sqlite_connection(&db_path).unwrap();
                    let state = AppState::from_connection(
                        db_path.clone(),
                        Arc::new(Mutex::new(conn)),
                        Arc::new(FixedClock::on_date(d(2025, 1, 1))),
                        OptionalEventPublisher::none(),
                    )
                    .unwrap();
                    barrier.wait();
                    // 起始日各不相同且不设结束日，唯一索引无法兜底
                    state.schedule_api.create_assignment(
                        &format!("S{}", i),
                        "SUN-0800",
                        "R101",
                        d(2025, 1, 1 + i as u32),
                        None,
                        AssignmentKind::Lecture,
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ApiError::ScheduleConflict(_))))
            .count();
        assert_eq!(created, 1, "results={:?}", results);
        assert_eq!(conflicts, threads - 1, "results={:?}", results);
        assert_eq!(
            env.count_rows("SELECT COUNT(*) FROM schedule_assignment WHERE is_active = 1"),
            1
        );
    }
}
