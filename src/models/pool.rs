//! 题池：会话内的有序题目列表与排除集合

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AppError, AppResult, SessionError};
use crate::models::item::{BankQuestion, ItemContent};
use crate::models::task::{Section, Stage, TaskType};

/// 会话内的答题单元
///
/// 一个题库题目可能被拆成多个条目（每小题一个），
/// 此时 `id` 为 `{bank_id}-{小题下标}`，`bank_id` 仍指向原题。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub id: String,
    pub bank_id: String,
    pub section: Section,
    pub task_type: TaskType,
    pub content: ItemContent,
    pub questions: Vec<BankQuestion>,
    pub stage: Stage,
}

/// 已放入题池的题库 ID 集合，只增不减
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    ids: HashSet<String>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一个题库 ID，返回是否为新加入
    pub fn insert(&mut self, bank_id: impl Into<String>) -> bool {
        self.ids.insert(bank_id.into())
    }

    pub fn contains(&self, bank_id: &str) -> bool {
        self.ids.contains(bank_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// 有序题池
///
/// 除初始加载时的追加外，唯一的修改方式是 `insert_stage_two_after`，
/// 每个分段至多插入一次第二阶段题目。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemPool {
    entries: Vec<PoolEntry>,
}

impl ItemPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PoolEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    /// 初始加载阶段追加条目
    pub fn append(&mut self, entries: Vec<PoolEntry>) {
        self.entries.extend(entries);
    }

    /// 分段中是否已有第二阶段题目
    pub fn has_stage_two(&self, section: Section) -> bool {
        self.entries
            .iter()
            .any(|e| e.section == section && e.stage.is_stage_two())
    }

    /// 分段中指定阶段的条目
    pub fn stage_entries(&self, section: Section, stage: Stage) -> Vec<PoolEntry> {
        self.entries
            .iter()
            .filter(|e| e.section == section && e.stage == stage)
            .cloned()
            .collect()
    }

    /// 分段中最后一个分流题的位置
    pub fn last_router_index(&self, section: Section) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|e| e.section == section && e.stage == Stage::Router)
    }

    /// 分段第二阶段第一个条目的位置
    pub fn stage_two_start(&self, section: Section) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.section == section && e.stage.is_stage_two())
    }

    /// 在 `position` 之后插入一个分段的第二阶段题目块
    ///
    /// 返回插入块的起始位置。块内顺序保持不变。
    pub fn insert_stage_two_after(
        &mut self,
        position: usize,
        entries: Vec<PoolEntry>,
    ) -> AppResult<usize> {
        let anchor = self.entries.get(position).ok_or_else(|| {
            AppError::Other(format!(
                "插入位置 {} 超出题池范围 (共 {} 个)",
                position,
                self.entries.len()
            ))
        })?;
        let section = anchor.section;

        if self.has_stage_two(section) {
            return Err(SessionError::AlreadyRouted {
                section: section.to_string(),
            }
            .into());
        }

        let stage = entries.first().map(|e| e.stage);
        let consistent = entries
            .iter()
            .all(|e| e.section == section && e.stage.is_stage_two() && Some(e.stage) == stage);
        if !consistent {
            return Err(AppError::Other(format!(
                "第二阶段题目块必须属于分段 {} 且阶段一致",
                section
            )));
        }

        let start = position + 1;
        self.entries.splice(start..start, entries);
        Ok(start)
    }
}
