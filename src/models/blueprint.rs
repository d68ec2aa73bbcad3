//! 试卷蓝图：各分段及各阶段的题位定义

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::task::{Section, Stage, TaskType};

/// 题位：在某分段中取至多 `count` 道指定题型、ID 以 `prefix` 开头的题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub section: Section,
    pub task_type: TaskType,
    pub count: usize,
    pub prefix: String,
}

impl Slot {
    pub fn new(section: Section, task_type: TaskType, count: usize, prefix: impl Into<String>) -> Self {
        Self {
            section,
            task_type,
            count,
            prefix: prefix.into(),
        }
    }
}

/// 蓝图文件中的题位（分段由所在分段决定）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub task_type: TaskType,
    pub count: usize,
    #[serde(default)]
    pub prefix: String,
}

/// 单个分段的定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub section: Section,
    /// 分段限时（秒），不设则不计时
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    /// 是否允许分段内回看
    #[serde(default)]
    pub reviewable: bool,
    #[serde(default)]
    pub linear: Vec<SlotSpec>,
    #[serde(default)]
    pub router: Vec<SlotSpec>,
    #[serde(default)]
    pub lower: Vec<SlotSpec>,
    #[serde(default)]
    pub upper: Vec<SlotSpec>,
}

impl SectionPlan {
    /// 有分流题位即为自适应分段
    pub fn is_adaptive(&self) -> bool {
        !self.router.is_empty()
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }

    /// 指定阶段的题位列表
    pub fn slots(&self, stage: Stage) -> Vec<Slot> {
        let specs = match stage {
            Stage::Linear => &self.linear,
            Stage::Router => &self.router,
            Stage::Lower => &self.lower,
            Stage::Upper => &self.upper,
        };
        specs
            .iter()
            .map(|s| Slot::new(self.section, s.task_type, s.count, s.prefix.clone()))
            .collect()
    }
}

/// 整份试卷的蓝图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub name: String,
    pub sections: Vec<SectionPlan>,
}

impl Blueprint {
    pub fn section(&self, section: Section) -> Option<&SectionPlan> {
        self.sections.iter().find(|p| p.section == section)
    }

    /// 初始加载的题位：按分段顺序，先线性题位再分流题位
    pub fn initial_slots(&self) -> Vec<(Stage, Vec<Slot>)> {
        let mut batches = Vec::new();
        for plan in &self.sections {
            let linear = plan.slots(Stage::Linear);
            if !linear.is_empty() {
                batches.push((Stage::Linear, linear));
            }
            let router = plan.slots(Stage::Router);
            if !router.is_empty() {
                batches.push((Stage::Router, router));
            }
        }
        batches
    }

    /// 校验蓝图
    pub fn validate(&self) -> AppResult<()> {
        if self.sections.is_empty() {
            return Err(AppError::invalid_blueprint("至少需要一个分段"));
        }

        let mut seen = HashSet::new();
        for plan in &self.sections {
            if !seen.insert(plan.section) {
                return Err(AppError::invalid_blueprint(format!(
                    "分段 {} 重复定义",
                    plan.section
                )));
            }

            if plan.is_adaptive() && (plan.lower.is_empty() || plan.upper.is_empty()) {
                return Err(AppError::invalid_blueprint(format!(
                    "自适应分段 {} 必须同时定义 lower 和 upper 题位",
                    plan.section
                )));
            }

            if !plan.is_adaptive() && (!plan.lower.is_empty() || !plan.upper.is_empty()) {
                return Err(AppError::invalid_blueprint(format!(
                    "分段 {} 没有分流题位，不能定义第二阶段题位",
                    plan.section
                )));
            }

            let all_specs = plan
                .linear
                .iter()
                .chain(&plan.router)
                .chain(&plan.lower)
                .chain(&plan.upper);
            for spec in all_specs {
                if spec.count == 0 {
                    return Err(AppError::invalid_blueprint(format!(
                        "分段 {} 的题位 {} 数量必须大于 0",
                        plan.section, spec.task_type
                    )));
                }
            }
        }

        Ok(())
    }
}
