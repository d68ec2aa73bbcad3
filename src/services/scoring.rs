//! 计分服务 - 业务能力层
//!
//! 只负责"按题型判分"能力：给定条目和作答快照，返回 对/总 计数。
//!
//! ## 判分规则
//! - 补全单词：每个空 1 分；忽略大小写，允许只填中间缺失的字母
//! - 连词成句：整题 1 分，顺序完全一致才得分
//! - 其余选择题：每个带正确选项的小题 1 分；没有正确选项的小题不计入
//! - 没有小题的条目：计入总分但永远不得分

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::ops::AddAssign;
use std::sync::OnceLock;

use crate::models::answers::AnswerMap;
use crate::models::item::{ItemContent, SentenceBuildContent, WordBlank, WordCompletionContent};
use crate::models::pool::{ItemPool, PoolEntry};
use crate::models::task::{Branch, ScoringRule, Section, Stage};

/// 对/总 计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    pub fn new(correct: usize, total: usize) -> Self {
        Self { correct, total }
    }

    /// 正确率，总数为 0 时按 1 计算分母
    pub fn ratio(&self) -> f64 {
        self.correct as f64 / self.total.max(1) as f64
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, other: Self) {
        self.correct += other.correct;
        self.total += other.total;
    }
}

/// 分段成绩
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionScore {
    pub section: Section,
    pub score: Score,
    /// 自适应分段的分流结果（未分流或线性分段为 None）
    pub branch: Option<Branch>,
}

/// 原文中的填空标记：前缀字母 + 两个以上下划线 + 后缀字母
fn blank_marker() -> &'static Regex {
    static BLANK_MARKER: OnceLock<Regex> = OnceLock::new();
    BLANK_MARKER.get_or_init(|| {
        Regex::new(r"([A-Za-z]*)(_{2,})([A-Za-z]*)").expect("填空标记正则必须合法")
    })
}

/// 从原文中解析每个空的前后缀
pub fn blank_contexts(passage: &str) -> Vec<WordBlank> {
    blank_marker()
        .captures_iter(passage)
        .map(|cap| WordBlank {
            prefix: cap.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            suffix: cap.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
            answer: None,
        })
        .collect()
}

/// 判断补全单词的作答是否正确
///
/// 依次尝试：整词比较、前缀+作答+后缀拼接比较、只保留字母比较。
pub fn word_matches(candidate: &str, expected: &str, prefix: &str, suffix: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return false;
    }

    let expected_norm = expected.trim().to_lowercase();
    if candidate.to_lowercase() == expected_norm {
        return true;
    }

    let rebuilt = format!("{}{}{}", prefix.trim(), candidate, suffix.trim()).to_lowercase();
    if rebuilt == expected_norm {
        return true;
    }

    let letters = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase()
    };
    let candidate_letters = letters(candidate);
    !candidate_letters.is_empty() && candidate_letters == letters(expected)
}

/// 计分服务
///
/// 无状态，只读作答快照
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// 对一组条目判分
    pub fn score_items(&self, items: &[PoolEntry], responses: &AnswerMap) -> Score {
        let mut score = Score::default();
        for entry in items {
            score += self.score_entry(entry, responses);
        }
        score
    }

    /// 对单个条目判分
    pub fn score_entry(&self, entry: &PoolEntry, responses: &AnswerMap) -> Score {
        match entry.task_type.scoring_rule() {
            ScoringRule::WordCompletion => match &entry.content {
                ItemContent::WordCompletion(content) => {
                    self.score_word_completion(entry, content, responses)
                }
                _ => {
                    let empty = WordCompletionContent {
                        passage: String::new(),
                        blanks: Vec::new(),
                    };
                    self.score_word_completion(entry, &empty, responses)
                }
            },
            ScoringRule::SentenceOrder => match &entry.content {
                ItemContent::SentenceBuild(content) => {
                    self.score_sentence_order(entry, content, responses)
                }
                _ => Score::new(0, 1),
            },
            ScoringRule::OptionSelection => self.score_option_selection(entry, responses),
        }
    }

    /// 补全单词
    fn score_word_completion(
        &self,
        entry: &PoolEntry,
        content: &WordCompletionContent,
        responses: &AnswerMap,
    ) -> Score {
        let passage_blanks = blank_contexts(&content.passage);
        let context_for = |index: usize| -> WordBlank {
            content
                .blanks
                .get(index)
                .or_else(|| passage_blanks.get(index))
                .cloned()
                .unwrap_or_default()
        };

        let keyed: Vec<(&str, &str)> = entry
            .questions
            .iter()
            .filter_map(|q| q.correct_text().map(|text| (q.id.as_str(), text)))
            .collect();

        let mut score = Score::default();

        if !keyed.is_empty() {
            for (index, (question_id, expected)) in keyed.into_iter().enumerate() {
                score.total += 1;
                let blank = context_for(index);
                let answer = text_response(responses, Some(question_id), &entry.id, index);
                if answer.is_some_and(|a| word_matches(&a, expected, &blank.prefix, &blank.suffix)) {
                    score.correct += 1;
                }
            }
            return score;
        }

        // 没有可判分的小题时，按原文中的填空标记数量计分
        for index in 0..passage_blanks.len() {
            score.total += 1;
            let blank = context_for(index);
            let Some(expected) = blank.answer.as_deref() else {
                continue;
            };
            let answer = text_response(responses, None, &entry.id, index);
            if answer.is_some_and(|a| word_matches(&a, expected, &blank.prefix, &blank.suffix)) {
                score.correct += 1;
            }
        }

        // 一个空都没有：按无小题条目处理
        if score.total == 0 {
            score.total = 1;
        }
        score
    }

    /// 连词成句
    fn score_sentence_order(
        &self,
        entry: &PoolEntry,
        content: &SentenceBuildContent,
        responses: &AnswerMap,
    ) -> Score {
        let canonical = normalize_sentence(&content.correct_order.join(" "));

        let submitted = responses
            .decoded(&entry.id)
            .or_else(|| entry.questions.first().and_then(|q| responses.decoded(&q.id)))
            .and_then(|value| match value {
                JsonValue::Array(parts) => Some(
                    parts
                        .iter()
                        .filter_map(value_as_text)
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                JsonValue::String(s) => Some(s),
                _ => None,
            })
            .map(|s| normalize_sentence(&s));

        let correct = matches!(submitted, Some(s) if !canonical.is_empty() && s == canonical);
        Score::new(usize::from(correct), 1)
    }

    /// 选择题
    fn score_option_selection(&self, entry: &PoolEntry, responses: &AnswerMap) -> Score {
        if entry.questions.is_empty() {
            return Score::new(0, 1);
        }

        let mut score = Score::default();
        for (index, question) in entry.questions.iter().enumerate() {
            let Some(key) = question.correct_index() else {
                continue;
            };
            score.total += 1;
            if numeric_response(responses, &question.id, &entry.id, index) == Some(key as f64) {
                score.correct += 1;
            }
        }
        score
    }

    /// 按分段汇总成绩
    pub fn section_report(&self, pool: &ItemPool, responses: &AnswerMap) -> Vec<SectionScore> {
        let mut sections: Vec<Section> = Vec::new();
        for entry in pool.entries() {
            if !sections.contains(&entry.section) {
                sections.push(entry.section);
            }
        }

        sections
            .into_iter()
            .map(|section| {
                let entries: Vec<PoolEntry> = pool
                    .entries()
                    .iter()
                    .filter(|e| e.section == section)
                    .cloned()
                    .collect();
                let branch = entries.iter().find_map(|e| match e.stage {
                    Stage::Lower => Some(Branch::Lower),
                    Stage::Upper => Some(Branch::Upper),
                    _ => None,
                });
                SectionScore {
                    section,
                    score: self.score_items(&entries, responses),
                    branch,
                }
            })
            .collect()
    }
}

fn normalize_sentence(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn value_as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// 读取填空作答：小题 ID -> 条目组合作答（数组下标或对象键）-> 单空时的整串作答
fn text_response(
    responses: &AnswerMap,
    question_id: Option<&str>,
    entry_id: &str,
    index: usize,
) -> Option<String> {
    if let Some(answer) = question_id
        .and_then(|id| responses.decoded(id))
        .and_then(|v| value_as_text(&v))
    {
        return Some(answer);
    }

    match responses.decoded(entry_id)? {
        JsonValue::Array(parts) => parts.get(index).and_then(value_as_text),
        JsonValue::Object(map) => map.get(&index.to_string()).and_then(value_as_text),
        scalar if index == 0 => value_as_text(&scalar),
        _ => None,
    }
}

/// 读取选择作答：小题 ID -> 条目组合作答中的小题下标 -> 组合作答的 `answer` 字段 -> 首题的整条作答
fn numeric_response(
    responses: &AnswerMap,
    question_id: &str,
    entry_id: &str,
    index: usize,
) -> Option<f64> {
    if let Some(selected) = responses.decoded(question_id).and_then(|v| value_as_number(&v)) {
        return Some(selected);
    }

    match responses.decoded(entry_id)? {
        JsonValue::Object(map) => map
            .get(&index.to_string())
            .and_then(value_as_number)
            .or_else(|| map.get("answer").and_then(value_as_number)),
        scalar if index == 0 => value_as_number(&scalar),
        _ => None,
    }
}
