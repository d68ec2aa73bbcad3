//! 题库题目记录与题目内容

use serde::{Deserialize, Serialize};

use crate::models::task::TaskType;

/// 题库返回的题目记录
///
/// 保持接口原样：题型、分段为字符串，内容为序列化后的 JSON 字符串。
/// 由 `ItemPoolFetcher` 转换为强类型的 `PoolEntry`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankItem {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub task_type: String,
    pub section: String,
    #[serde(default)]
    pub prompt_content: String,
    #[serde(default)]
    pub questions: Vec<BankQuestion>,
}

/// 题目下的小题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankQuestion {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, alias = "correct_answer", skip_serializing_if = "Option::is_none")]
    pub correct: Option<AnswerKey>,
}

impl BankQuestion {
    pub fn new(id: impl Into<String>, correct: Option<AnswerKey>) -> Self {
        Self {
            id: id.into(),
            correct,
        }
    }

    /// 选择题的正确选项下标
    pub fn correct_index(&self) -> Option<i64> {
        match self.correct {
            Some(AnswerKey::Index(i)) => Some(i),
            _ => None,
        }
    }

    /// 填空题的标准答案
    pub fn correct_text(&self) -> Option<&str> {
        match &self.correct {
            Some(AnswerKey::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// 标准答案：选项下标或文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerKey {
    Index(i64),
    Text(String),
}

/// 题目内容（按题型区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemContent {
    WordCompletion(WordCompletionContent),
    SentenceBuild(SentenceBuildContent),
    Reading(ReadingContent),
    Listening(ListeningContent),
    Writing(WritingContent),
    Speaking(SpeakingContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCompletionContent {
    pub passage: String,
    /// 每个空已给出的前后缀字母；为空时从原文标记处解析
    #[serde(default)]
    pub blanks: Vec<WordBlank>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordBlank {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceBuildContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 展示给考生的（打乱后的）片段
    pub fragments: Vec<String>,
    /// 标准顺序
    #[serde(default)]
    pub correct_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptQuestion {
    pub stem: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub passage: String,
    #[serde(default)]
    pub questions: Vec<PromptQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningContent {
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default)]
    pub questions: Vec<PromptQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingContent {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_words: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingContent {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_secs: Option<u32>,
}

impl ItemContent {
    /// 按题型解析序列化的题目内容
    pub fn decode(task_type: TaskType, raw: &str) -> Result<Self, serde_json::Error> {
        let content = match task_type {
            TaskType::CompleteTheWords => ItemContent::WordCompletion(serde_json::from_str(raw)?),
            TaskType::BuildSentence => ItemContent::SentenceBuild(serde_json::from_str(raw)?),
            TaskType::ReadInDailyLife | TaskType::ReadAcademicPassage => {
                ItemContent::Reading(serde_json::from_str(raw)?)
            }
            TaskType::ListenChooseResponse
            | TaskType::ListenConversation
            | TaskType::ListenAnnouncement
            | TaskType::ListenAcademicTalk => ItemContent::Listening(serde_json::from_str(raw)?),
            TaskType::WriteEmail | TaskType::WriteAcademicDiscussion => {
                ItemContent::Writing(serde_json::from_str(raw)?)
            }
            TaskType::ListenAndRepeat | TaskType::TakeInterview => {
                ItemContent::Speaking(serde_json::from_str(raw)?)
            }
        };
        Ok(content)
    }

    /// 只保留第 `index` 个小题的内容切片
    pub fn question_slice(&self, index: usize) -> Self {
        fn slice(questions: &[PromptQuestion], index: usize) -> Vec<PromptQuestion> {
            questions.get(index).cloned().into_iter().collect()
        }

        match self {
            ItemContent::Reading(c) => ItemContent::Reading(ReadingContent {
                questions: slice(&c.questions, index),
                ..c.clone()
            }),
            ItemContent::Listening(c) => ItemContent::Listening(ListeningContent {
                questions: slice(&c.questions, index),
                ..c.clone()
            }),
            other => other.clone(),
        }
    }

    /// 内容中的小题数量
    pub fn question_count(&self) -> usize {
        match self {
            ItemContent::Reading(c) => c.questions.len(),
            ItemContent::Listening(c) => c.questions.len(),
            _ => 0,
        }
    }
}

/// 兼容字符串或整数形式的 ID
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer identifier")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bank_item_accepts_numeric_ids() {
        let raw = json!({
            "id": 1042,
            "task_type": "read_academic_passage",
            "section": "reading",
            "prompt_content": "{}",
            "questions": [{"id": 7, "correct": 2}, {"id": "q-8", "correct_answer": "plenty"}]
        });
        let item: BankItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.id, "1042");
        assert_eq!(item.questions[0].id, "7");
        assert_eq!(item.questions[0].correct_index(), Some(2));
        assert_eq!(item.questions[1].correct_text(), Some("plenty"));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let raw = r#"{"fragments": ["a", "b"]}"#;
        assert!(ItemContent::decode(TaskType::ReadAcademicPassage, raw).is_err());
        assert!(matches!(
            ItemContent::decode(TaskType::BuildSentence, raw).unwrap(),
            ItemContent::SentenceBuild(_)
        ));
    }

    #[test]
    fn test_question_slice_keeps_single_question() {
        let content = ItemContent::Reading(ReadingContent {
            title: Some("Bees".into()),
            passage: "Bees dance.".into(),
            questions: vec![
                PromptQuestion { stem: "Q1".into(), options: vec![] },
                PromptQuestion { stem: "Q2".into(), options: vec![] },
            ],
        });

        let sliced = content.question_slice(1);
        match sliced {
            ItemContent::Reading(c) => {
                assert_eq!(c.questions.len(), 1);
                assert_eq!(c.questions[0].stem, "Q2");
                assert_eq!(c.passage, "Bees dance.");
            }
            other => panic!("unexpected content: {:?}", other),
        }
        assert_eq!(content.question_slice(5).question_count(), 0);
    }
}
