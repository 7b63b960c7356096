// ==========================================
// 课程排课与选课核心 - 先修关系图引擎
// ==========================================
// 红线: 先修图必须无环，在定义课程先修时校验（拓扑排序）
// 规则: 有向边 course -> prerequisite
// ==========================================

use crate::domain::course::{CoursePrerequisite, MissingPrerequisite};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::instrument;

/// 先修图
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    // course_id -> 先修课程集合（BTree 保证输出稳定）
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl PrerequisiteGraph {
    pub fn from_rules(rules: &[CoursePrerequisite]) -> Self {
        let mut graph = Self::default();
        for rule in rules {
            graph.add_edge(&rule.course_id, &rule.prerequisite_course_id);
        }
        graph
    }

    fn add_edge(&mut self, course_id: &str, prerequisite_course_id: &str) {
        self.edges
            .entry(course_id.to_string())
            .or_default()
            .insert(prerequisite_course_id.to_string());
        self.edges.entry(prerequisite_course_id.to_string()).or_default();
    }

    /// 用新的规则组替换某课程的全部出边
    pub fn replace_course(&mut self, course_id: &str, rules: &[CoursePrerequisite]) {
        self.edges.insert(course_id.to_string(), BTreeSet::new());
        for rule in rules {
            self.add_edge(course_id, &rule.prerequisite_course_id);
        }
    }

    /// 拓扑序（先修在前）；存在环时返回一条环路径
    #[instrument(skip(self), fields(courses = self.edges.len()))]
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        // 每门课剩余未排出的先修数
        let mut remaining: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(course, prereqs)| (course.as_str(), prereqs.len()))
            .collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (course, prereqs) in &self.edges {
            for p in prereqs {
                dependents.entry(p.as_str()).or_default().push(course.as_str());
            }
        }

        let mut ready: VecDeque<&str> = remaining
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(c, _)| *c)
            .collect();
        let mut order = Vec::with_capacity(self.edges.len());

        while let Some(course) = ready.pop_front() {
            order.push(course.to_string());
            if let Some(next) = dependents.get(course) {
                for dependent in next {
                    if let Some(n) = remaining.get_mut(dependent) {
                        *n -= 1;
                        if *n == 0 {
                            ready.push_back(*dependent);
                        }
                    }
                }
            }
        }

        if order.len() == self.edges.len() {
            Ok(order)
        } else {
            Err(self.find_cycle().unwrap_or_default())
        }
    }

    /// 深度优先找出一条环: [c1, c2, ..., c1]
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            node: &'a str,
            edges: &'a BTreeMap<String, BTreeSet<String>>,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            marks.insert(node, Mark::Visiting);
            stack.push(node);
            if let Some(next) = edges.get(node) {
                for n in next {
                    match marks.get(n.as_str()) {
                        Some(Mark::Visiting) => {
                            let start = stack.iter().position(|s| *s == n.as_str()).unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|s| s.to_string()).collect();
                            cycle.push(n.clone());
                            return Some(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            if let Some(cycle) = visit(n.as_str(), edges, marks, stack) {
                                return Some(cycle);
                            }
                        }
                    }
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        for course in self.edges.keys() {
            if !marks.contains_key(course.as_str()) {
                let mut stack = Vec::new();
                if let Some(cycle) = visit(course.as_str(), &self.edges, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

/// 对照学生已结课成绩找出未满足的先修
///
/// `best_score` 返回学生在某课程上最好的已结课总评
pub fn missing_prerequisites<F>(rules: &[CoursePrerequisite], mut best_score: F) -> Vec<MissingPrerequisite>
where
    F: FnMut(&str) -> Option<f64>,
{
    rules
        .iter()
        .filter_map(|rule| {
            let best = best_score(&rule.prerequisite_course_id);
            let satisfied = best.map_or(false, |score| score >= rule.min_total_score);
            if satisfied {
                None
            } else {
                Some(MissingPrerequisite {
                    prerequisite_course_id: rule.prerequisite_course_id.clone(),
                    min_total_score: rule.min_total_score,
                    best_total_score: best,
                })
            }
        })
        .collect()
}
