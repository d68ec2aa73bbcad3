//! 题池拉取服务 - 业务能力层
//!
//! 只负责"按题位取题"能力，不关心流程

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ItemBank;
use crate::error::SessionError;
use crate::models::blueprint::Slot;
use crate::models::item::{BankItem, ItemContent};
use crate::models::pool::{ExclusionSet, PoolEntry};
use crate::models::task::{Stage, TaskType};

/// 题池拉取服务
///
/// 职责：
/// - 按题位依次请求题库
/// - 按题型过滤、去重、截断
/// - 阅读类多小题题目拆成每小题一个条目
/// - 不持有题池，不推进位置
pub struct ItemPoolFetcher {
    bank: Arc<dyn ItemBank>,
}

impl ItemPoolFetcher {
    /// 创建新的拉取服务
    pub fn new(bank: Arc<dyn ItemBank>) -> Self {
        Self { bank }
    }

    /// 题库服务（会话注册、提交等也走同一个服务）
    pub fn bank(&self) -> &Arc<dyn ItemBank> {
        &self.bank
    }

    /// 按题位列表取题
    ///
    /// 题位严格按顺序串行处理：前一个题位加入排除集合的题目，
    /// 后一个题位一定看得到。单个题位请求失败只贡献 0 道题。
    pub async fn fetch_slots(
        &self,
        slots: &[Slot],
        stage: Stage,
        exclusion: &mut ExclusionSet,
    ) -> Vec<PoolEntry> {
        let mut entries = Vec::new();

        for slot in slots {
            let slot_entries = self.fetch_slot(slot, stage, exclusion).await;
            debug!(
                "[{}] 题位 {}/{} ({}) 取得 {} 个条目",
                slot.section,
                slot.task_type,
                slot.prefix,
                stage,
                slot_entries.len()
            );
            entries.extend(slot_entries);
        }

        info!(
            "✓ {} 阶段取题完成: {} 个题位, {} 个条目, 排除集合 {} 个",
            stage,
            slots.len(),
            entries.len(),
            exclusion.len()
        );

        entries
    }

    /// 处理单个题位
    async fn fetch_slot(
        &self,
        slot: &Slot,
        stage: Stage,
        exclusion: &mut ExclusionSet,
    ) -> Vec<PoolEntry> {
        let items = match self.bank.fetch_items(slot.section, &slot.prefix).await {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    "[{}] ⚠️ 题位 {} (前缀 {}) 请求失败，跳过: {}",
                    slot.section, slot.task_type, slot.prefix, e
                );
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        let mut taken = 0;

        for item in &items {
            if taken >= slot.count {
                break;
            }
            if TaskType::from_code(&item.task_type) != Some(slot.task_type) {
                continue;
            }
            if exclusion.contains(&item.id) {
                continue;
            }

            let content = match ItemContent::decode(slot.task_type, &item.prompt_content) {
                Ok(content) => content,
                Err(e) => {
                    let err = SessionError::MalformedContent {
                        item_id: item.id.clone(),
                        task_type: slot.task_type.to_string(),
                        reason: e.to_string(),
                    };
                    warn!("[{}] ⚠️ {}，跳过", slot.section, err);
                    continue;
                }
            };

            exclusion.insert(item.id.clone());
            taken += 1;
            entries.extend(Self::expand(item, slot, content, stage));
        }

        if taken < slot.count {
            debug!(
                "[{}] 题位 {} 需要 {} 道，实际 {} 道",
                slot.section, slot.task_type, slot.count, taken
            );
        }

        entries
    }

    /// 把题库题目展开成题池条目
    fn expand(item: &BankItem, slot: &Slot, content: ItemContent, stage: Stage) -> Vec<PoolEntry> {
        if slot.task_type.splits_per_question() && item.questions.len() > 1 {
            return item
                .questions
                .iter()
                .enumerate()
                .map(|(index, question)| PoolEntry {
                    id: format!("{}-{}", item.id, index),
                    bank_id: item.id.clone(),
                    section: slot.section,
                    task_type: slot.task_type,
                    content: content.question_slice(index),
                    questions: vec![question.clone()],
                    stage,
                })
                .collect();
        }

        vec![PoolEntry {
            id: item.id.clone(),
            bank_id: item.id.clone(),
            section: slot.section,
            task_type: slot.task_type,
            content,
            questions: item.questions.clone(),
            stage,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockItemBank;
    use crate::models::item::{AnswerKey, BankQuestion};
    use crate::models::task::Section;
    use std::collections::HashSet;

    fn word_item(id: &str) -> BankItem {
        BankItem {
            id: id.to_string(),
            task_type: "complete_the_words".into(),
            section: "reading".into(),
            prompt_content: r#"{"passage": "The app__ is red."}"#.into(),
            questions: vec![BankQuestion::new(format!("{}-q", id), Some(AnswerKey::Text("apple".into())))],
        }
    }

    fn passage_item(id: &str, questions: usize) -> BankItem {
        let prompts: Vec<String> = (0..questions)
            .map(|i| format!(r#"{{"stem": "Q{}", "options": ["a", "b"]}}"#, i))
            .collect();
        BankItem {
            id: id.to_string(),
            task_type: "read_academic_passage".into(),
            section: "reading".into(),
            prompt_content: format!(r#"{{"passage": "Text", "questions": [{}]}}"#, prompts.join(",")),
            questions: (0..questions)
                .map(|i| BankQuestion::new(format!("{}-bq{}", id, i), Some(AnswerKey::Index(1))))
                .collect(),
        }
    }

    fn fetcher(items: Vec<BankItem>) -> (ItemPoolFetcher, Arc<MockItemBank>) {
        let bank = Arc::new(MockItemBank::new(items));
        (ItemPoolFetcher::new(bank.clone()), bank)
    }

    #[tokio::test]
    async fn test_slot_filters_task_type_and_truncates() {
        let mut items = vec![word_item("RD-1"), word_item("RD-2"), word_item("RD-3")];
        items.insert(1, passage_item("RD-P", 1));
        let (fetcher, _) = fetcher(items);
        let mut exclusion = ExclusionSet::new();

        let entries = fetcher
            .fetch_slots(
                &[Slot::new(Section::Reading, TaskType::CompleteTheWords, 2, "RD")],
                Stage::Router,
                &mut exclusion,
            )
            .await;

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["RD-1", "RD-2"]);
        assert!(entries.iter().all(|e| e.stage == Stage::Router));
        assert_eq!(exclusion.len(), 2);
        assert!(!exclusion.contains("RD-P"));
    }

    #[tokio::test]
    async fn test_earlier_slot_exclusions_visible_to_later_slot() {
        let (fetcher, _) = fetcher(vec![word_item("RD-1"), word_item("RD-2"), word_item("RD-3")]);
        let mut exclusion = ExclusionSet::new();

        let slots = vec![
            Slot::new(Section::Reading, TaskType::CompleteTheWords, 1, "RD"),
            Slot::new(Section::Reading, TaskType::CompleteTheWords, 5, "RD"),
        ];
        let entries = fetcher.fetch_slots(&slots, Stage::Linear, &mut exclusion).await;

        let ids: Vec<&str> = entries.iter().map(|e| e.bank_id.as_str()).collect();
        assert_eq!(ids, vec!["RD-1", "RD-2", "RD-3"]);
    }

    #[tokio::test]
    async fn test_no_bank_item_fetched_twice_across_calls() {
        let (fetcher, _) = fetcher(vec![
            word_item("RD-1"),
            word_item("RD-2"),
            passage_item("RD-P1", 3),
            passage_item("RD-P2", 2),
        ]);
        let mut exclusion = ExclusionSet::new();

        let mut all = fetcher
            .fetch_slots(
                &[Slot::new(Section::Reading, TaskType::CompleteTheWords, 1, "RD")],
                Stage::Router,
                &mut exclusion,
            )
            .await;
        all.extend(
            fetcher
                .fetch_slots(
                    &[
                        Slot::new(Section::Reading, TaskType::CompleteTheWords, 3, "RD"),
                        Slot::new(Section::Reading, TaskType::ReadAcademicPassage, 1, "RD-P"),
                    ],
                    Stage::Upper,
                    &mut exclusion,
                )
                .await,
        );
        all.extend(
            fetcher
                .fetch_slots(
                    &[Slot::new(Section::Reading, TaskType::ReadAcademicPassage, 2, "RD-P")],
                    Stage::Lower,
                    &mut exclusion,
                )
                .await,
        );

        let bank_ids: HashSet<&str> = all.iter().map(|e| e.bank_id.as_str()).collect();
        let mut seen_sources = HashSet::new();
        for entry in &all {
            // 同一题库题目拆出的条目共享 bank_id，但绝不会来自两次取题
            seen_sources.insert((entry.bank_id.as_str(), entry.stage));
        }
        for id in &bank_ids {
            let stages: Vec<_> = seen_sources.iter().filter(|(b, _)| b == id).collect();
            assert_eq!(stages.len(), 1, "bank item {} fetched more than once", id);
            assert!(exclusion.contains(id));
        }
        assert_eq!(bank_ids.len(), 4);
    }

    #[tokio::test]
    async fn test_reading_passage_splits_per_question() {
        let (fetcher, _) = fetcher(vec![passage_item("RD-P", 3)]);
        let mut exclusion = ExclusionSet::new();

        let entries = fetcher
            .fetch_slots(
                &[Slot::new(Section::Reading, TaskType::ReadAcademicPassage, 1, "RD")],
                Stage::Upper,
                &mut exclusion,
            )
            .await;

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].id, "RD-P-1");
        assert_eq!(entries[1].bank_id, "RD-P");
        assert_eq!(entries[1].questions.len(), 1);
        assert_eq!(entries[1].questions[0].id, "RD-P-bq1");
        assert_eq!(entries[1].content.question_count(), 1);
        match &entries[2].content {
            ItemContent::Reading(c) => assert_eq!(c.questions[0].stem, "Q2"),
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(exclusion.len(), 1);
    }

    #[tokio::test]
    async fn test_single_question_passage_is_not_split() {
        let (fetcher, _) = fetcher(vec![passage_item("RD-P", 1)]);
        let mut exclusion = ExclusionSet::new();

        let entries = fetcher
            .fetch_slots(
                &[Slot::new(Section::Reading, TaskType::ReadAcademicPassage, 1, "RD")],
                Stage::Linear,
                &mut exclusion,
            )
            .await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "RD-P");
    }

    #[tokio::test]
    async fn test_failed_slot_contributes_nothing() {
        let bank = Arc::new(
            MockItemBank::new(vec![word_item("RD-1"), word_item("XX-1")]).with_failing_prefix("XX"),
        );
        let fetcher = ItemPoolFetcher::new(bank.clone());
        let mut exclusion = ExclusionSet::new();

        let entries = fetcher
            .fetch_slots(
                &[
                    Slot::new(Section::Reading, TaskType::CompleteTheWords, 1, "XX"),
                    Slot::new(Section::Reading, TaskType::CompleteTheWords, 1, "RD"),
                ],
                Stage::Linear,
                &mut exclusion,
            )
            .await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "RD-1");
        assert_eq!(bank.fetch_log().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_content_is_skipped_without_exclusion() {
        let mut broken = word_item("RD-0");
        broken.prompt_content = "not json".into();
        let (fetcher, _) = fetcher(vec![broken, word_item("RD-1")]);
        let mut exclusion = ExclusionSet::new();

        let entries = fetcher
            .fetch_slots(
                &[Slot::new(Section::Reading, TaskType::CompleteTheWords, 1, "RD")],
                Stage::Linear,
                &mut exclusion,
            )
            .await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "RD-1");
        assert!(!exclusion.contains("RD-0"));
    }
}
