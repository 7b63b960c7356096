// ==========================================
// 课程排课与选课核心 - 课程先修 API
// ==========================================
// 红线: 先修图无环；定义时校验，而不是选课时
// ==========================================

use crate::api::context::ApiContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::course::CoursePrerequisite;
use crate::engine::prerequisite_graph::PrerequisiteGraph;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::course_repo::PrerequisiteRepository;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CourseApi {
    ctx: ApiContext,
    prerequisite_repo: Arc<PrerequisiteRepository>,
}

impl CourseApi {
    pub fn new(ctx: ApiContext, prerequisite_repo: Arc<PrerequisiteRepository>) -> Self {
        Self {
            ctx,
            prerequisite_repo,
        }
    }

    /// 整组替换课程的先修规则；替换后成环则拒绝
    ///
    /// 传入空列表即清除该课程的全部先修。
    pub fn define_prerequisites(&self, course_id: &str, rules: &[CoursePrerequisite]) -> ApiResult<()> {
        let course_id = course_id.trim();
        if course_id.is_empty() {
            return Err(ApiError::InvalidInput("课程ID不能为空".to_string()));
        }
        let mut seen = HashSet::new();
        for rule in rules {
            if rule.course_id != course_id {
                return Err(ApiError::InvalidInput(format!(
                    "先修规则的课程 {} 与目标课程 {} 不一致",
                    rule.course_id, course_id
                )));
            }
            if rule.prerequisite_course_id == course_id {
                return Err(ApiError::PrerequisiteCycle {
                    cycle: vec![course_id.to_string(), course_id.to_string()],
                });
            }
            if !(0.0..=100.0).contains(&rule.min_total_score) {
                return Err(ApiError::InvalidGradeRange {
                    component: "min_total_score".to_string(),
                    value: rule.min_total_score,
                });
            }
            if !seen.insert(rule.prerequisite_course_id.as_str()) {
                return Err(ApiError::InvalidInput(format!(
                    "先修课程 {} 重复",
                    rule.prerequisite_course_id
                )));
            }
        }
        let now = self.ctx.clock().now();

        self.ctx.run_write_tx(|tx| {
            let existing = PrerequisiteRepository::list_all_tx(tx)?;
            let mut graph = PrerequisiteGraph::from_rules(&existing);
            graph.replace_course(course_id, rules);
            if let Err(cycle) = graph.topological_order() {
                warn!(course_id, cycle = ?cycle, "先修关系成环，拒绝定义");
                return Err(ApiError::PrerequisiteCycle { cycle });
            }

            PrerequisiteRepository::replace_for_course_tx(tx, course_id, rules)?;
            let action_type = if rules.is_empty() {
                ActionType::RemovePrerequisite
            } else {
                ActionType::DefinePrerequisite
            };
            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(action_type, course_id, now).with_payload(&rules),
            )?;
            Ok(())
        })?;

        info!(course_id, count = rules.len(), "先修规则已更新");
        Ok(())
    }

    pub fn list_prerequisites(&self, course_id: &str) -> ApiResult<Vec<CoursePrerequisite>> {
        if course_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("课程ID不能为空".to_string()));
        }
        Ok(self.prerequisite_repo.list_for_course(course_id.trim())?)
    }
}
