//! 分流服务 - 业务能力层
//!
//! 对一个自适应分段的路由阶段判分，选出第二阶段分支并取题。
//! 不修改题池，插入由流程层完成。

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::models::answers::AnswerMap;
use crate::models::blueprint::SectionPlan;
use crate::models::pool::{ExclusionSet, PoolEntry};
use crate::models::task::{Branch, Stage};
use crate::services::item_pool_fetcher::ItemPoolFetcher;
use crate::services::scoring::{Score, ScoringEngine};

/// 进入高难度分支的最低正确率（含）
pub const ROUTING_THRESHOLD: f64 = 0.6;

/// 分流结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoutingOutcome {
    pub score: Score,
    pub ratio: f64,
    pub branch: Branch,
}

/// 按正确率选分支
pub fn branch_for(score: Score) -> Branch {
    if score.ratio() >= ROUTING_THRESHOLD {
        Branch::Upper
    } else {
        Branch::Lower
    }
}

/// 分流服务
pub struct RoutingDecision {
    fetcher: Arc<ItemPoolFetcher>,
    scoring: ScoringEngine,
}

impl RoutingDecision {
    pub fn new(fetcher: Arc<ItemPoolFetcher>) -> Self {
        Self {
            fetcher,
            scoring: ScoringEngine::new(),
        }
    }

    /// 只对路由阶段条目判分并选出分支
    pub fn decide(&self, items: &[PoolEntry], answers: &AnswerMap) -> RoutingOutcome {
        let router: Vec<PoolEntry> = items
            .iter()
            .filter(|e| e.stage == Stage::Router)
            .cloned()
            .collect();
        let score = self.scoring.score_items(&router, answers);

        RoutingOutcome {
            score,
            ratio: score.ratio(),
            branch: branch_for(score),
        }
    }

    /// 判分并拉取所选分支的题目
    ///
    /// 返回的条目保持拉取顺序，阶段为 lower / upper。
    pub async fn route(
        &self,
        plan: &SectionPlan,
        router_items: &[PoolEntry],
        answers: &AnswerMap,
        exclusion: &mut ExclusionSet,
    ) -> (RoutingOutcome, Vec<PoolEntry>) {
        let outcome = self.decide(router_items, answers);
        info!(
            "[{}] 🔀 路由阶段 {}/{} (正确率 {:.2})，进入 {} 分支",
            plan.section, outcome.score.correct, outcome.score.total, outcome.ratio, outcome.branch
        );

        let stage = outcome.branch.stage();
        let slots = plan.slots(stage);
        let entries = self.fetcher.fetch_slots(&slots, stage, exclusion).await;

        (outcome, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockItemBank;
    use crate::models::blueprint::SlotSpec;
    use crate::models::item::{AnswerKey, BankItem, BankQuestion, ItemContent, WordCompletionContent};
    use crate::models::task::{Section, TaskType};

    fn gap_fill(id: &str) -> PoolEntry {
        PoolEntry {
            id: id.to_string(),
            bank_id: id.to_string(),
            section: Section::Reading,
            task_type: TaskType::CompleteTheWords,
            content: ItemContent::WordCompletion(WordCompletionContent {
                passage: "The ca__ sat.".into(),
                blanks: Vec::new(),
            }),
            questions: vec![BankQuestion::new(
                format!("{}-b0", id),
                Some(AnswerKey::Text("cat".into())),
            )],
            stage: Stage::Router,
        }
    }

    fn router_with_correct(total: usize, correct: usize) -> (Vec<PoolEntry>, AnswerMap) {
        let items: Vec<PoolEntry> = (0..total).map(|i| gap_fill(&format!("r{}", i))).collect();
        let mut answers = AnswerMap::new();
        for (i, item) in items.iter().enumerate() {
            let response = if i < correct { "t" } else { "x" };
            answers.record(format!("{}-b0", item.id), response);
        }
        (items, answers)
    }

    fn bank_item(id: &str, task_type: &str) -> BankItem {
        let content = match task_type {
            "read_in_daily_life" | "read_academic_passage" => {
                r#"{"passage": "p", "questions": [{"stem": "s", "options": ["a", "b"]}]}"#
            }
            _ => r#"{"passage": "The ca__ sat."}"#,
        };
        BankItem {
            id: id.to_string(),
            task_type: task_type.to_string(),
            section: "reading".into(),
            prompt_content: content.to_string(),
            questions: vec![BankQuestion::new(format!("{}-q", id), Some(AnswerKey::Index(0)))],
        }
    }

    fn plan() -> SectionPlan {
        SectionPlan {
            section: Section::Reading,
            time_limit_secs: None,
            reviewable: false,
            linear: Vec::new(),
            router: vec![SlotSpec {
                task_type: TaskType::CompleteTheWords,
                count: 10,
                prefix: "RD-R".into(),
            }],
            lower: vec![SlotSpec {
                task_type: TaskType::ReadInDailyLife,
                count: 2,
                prefix: "RD-L".into(),
            }],
            upper: vec![SlotSpec {
                task_type: TaskType::ReadAcademicPassage,
                count: 2,
                prefix: "RD-U".into(),
            }],
        }
    }

    fn routing(items: Vec<BankItem>) -> (RoutingDecision, Arc<MockItemBank>) {
        let bank = Arc::new(MockItemBank::new(items));
        let fetcher = Arc::new(ItemPoolFetcher::new(bank.clone()));
        (RoutingDecision::new(fetcher), bank)
    }

    #[test]
    fn test_threshold_tie_goes_upper() {
        assert_eq!(branch_for(Score::new(6, 10)), Branch::Upper);
        assert_eq!(branch_for(Score::new(5, 10)), Branch::Lower);
        assert_eq!(branch_for(Score::new(0, 0)), Branch::Lower);
    }

    #[test]
    fn test_decide_scores_router_entries_only() {
        let (routing, _) = routing(Vec::new());
        let (mut items, answers) = router_with_correct(10, 6);
        let mut extra = gap_fill("u0");
        extra.stage = Stage::Upper;
        items.push(extra);

        let outcome = routing.decide(&items, &answers);
        assert_eq!(outcome.score, Score::new(6, 10));
        assert_eq!(outcome.branch, Branch::Upper);

        let (items, answers) = router_with_correct(10, 5);
        assert_eq!(routing.decide(&items, &answers).branch, Branch::Lower);
    }

    #[tokio::test]
    async fn test_seven_of_ten_fetches_upper_slots_only() {
        let (routing, bank) = routing(vec![
            bank_item("RD-L1", "read_in_daily_life"),
            bank_item("RD-U1", "read_academic_passage"),
            bank_item("RD-U2", "read_academic_passage"),
        ]);
        let (items, answers) = router_with_correct(10, 7);
        let mut exclusion = ExclusionSet::new();

        let (outcome, entries) = routing.route(&plan(), &items, &answers, &mut exclusion).await;

        assert!((outcome.ratio - 0.7).abs() < 1e-9);
        assert_eq!(outcome.branch, Branch::Upper);
        assert!(bank.was_fetched("RD-U"));
        assert!(!bank.was_fetched("RD-L"));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.stage == Stage::Upper));
        assert!(exclusion.contains("RD-U1") && exclusion.contains("RD-U2"));
    }

    #[tokio::test]
    async fn test_low_score_fetches_lower_slots() {
        let (routing, bank) = routing(vec![
            bank_item("RD-L1", "read_in_daily_life"),
            bank_item("RD-U1", "read_academic_passage"),
        ]);
        let (items, answers) = router_with_correct(10, 2);
        let mut exclusion = ExclusionSet::new();
        exclusion.insert("RD-L1");

        let (outcome, entries) = routing.route(&plan(), &items, &answers, &mut exclusion).await;

        assert_eq!(outcome.branch, Branch::Lower);
        assert_eq!(bank.fetch_log(), vec![(Section::Reading, "RD-L".to_string())]);
        // 已在排除集合中的题目不会再次取到
        assert!(entries.is_empty());
    }
}
