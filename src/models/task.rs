//! 分段、题型、阶段等基础枚举

use serde::{Deserialize, Serialize};
use std::fmt;

/// 考试分段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Reading,
    Listening,
    Writing,
    Speaking,
}

impl Section {
    /// 题库接口使用的分段代码
    pub fn code(self) -> &'static str {
        match self {
            Section::Reading => "reading",
            Section::Listening => "listening",
            Section::Writing => "writing",
            Section::Speaking => "speaking",
        }
    }

    /// 从代码解析分段（大小写不敏感）
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "reading" => Some(Section::Reading),
            "listening" => Some(Section::Listening),
            "writing" => Some(Section::Writing),
            "speaking" => Some(Section::Speaking),
            _ => None,
        }
    }

    /// 进入该分段前是否需要麦克风检测
    pub fn requires_mic_check(self) -> bool {
        matches!(self, Section::Speaking)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Reading => "Reading",
            Section::Listening => "Listening",
            Section::Writing => "Writing",
            Section::Speaking => "Speaking",
        };
        write!(f, "{}", name)
    }
}

/// 计分规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringRule {
    /// 补全单词（填空）
    WordCompletion,
    /// 连词成句（排序）
    SentenceOrder,
    /// 选择题
    OptionSelection,
}

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CompleteTheWords,
    ReadInDailyLife,
    ReadAcademicPassage,
    ListenChooseResponse,
    ListenConversation,
    ListenAnnouncement,
    ListenAcademicTalk,
    BuildSentence,
    WriteEmail,
    WriteAcademicDiscussion,
    ListenAndRepeat,
    TakeInterview,
}

impl TaskType {
    /// 题库接口使用的题型代码
    pub fn code(self) -> &'static str {
        match self {
            TaskType::CompleteTheWords => "complete_the_words",
            TaskType::ReadInDailyLife => "read_in_daily_life",
            TaskType::ReadAcademicPassage => "read_academic_passage",
            TaskType::ListenChooseResponse => "listen_choose_response",
            TaskType::ListenConversation => "listen_conversation",
            TaskType::ListenAnnouncement => "listen_announcement",
            TaskType::ListenAcademicTalk => "listen_academic_talk",
            TaskType::BuildSentence => "build_sentence",
            TaskType::WriteEmail => "write_email",
            TaskType::WriteAcademicDiscussion => "write_academic_discussion",
            TaskType::ListenAndRepeat => "listen_and_repeat",
            TaskType::TakeInterview => "take_interview",
        }
    }

    /// 从代码解析题型
    pub fn from_code(code: &str) -> Option<Self> {
        const ALL: [TaskType; 12] = [
            TaskType::CompleteTheWords,
            TaskType::ReadInDailyLife,
            TaskType::ReadAcademicPassage,
            TaskType::ListenChooseResponse,
            TaskType::ListenConversation,
            TaskType::ListenAnnouncement,
            TaskType::ListenAcademicTalk,
            TaskType::BuildSentence,
            TaskType::WriteEmail,
            TaskType::WriteAcademicDiscussion,
            TaskType::ListenAndRepeat,
            TaskType::TakeInterview,
        ];
        let code = code.trim();
        ALL.into_iter().find(|t| t.code().eq_ignore_ascii_case(code))
    }

    pub fn scoring_rule(self) -> ScoringRule {
        match self {
            TaskType::CompleteTheWords => ScoringRule::WordCompletion,
            TaskType::BuildSentence => ScoringRule::SentenceOrder,
            _ => ScoringRule::OptionSelection,
        }
    }

    /// 多小题题目是否需要拆成每小题一个条目
    pub fn splits_per_question(self) -> bool {
        matches!(self, TaskType::ReadInDailyLife | TaskType::ReadAcademicPassage)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 题目所属阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// 分流阶段
    Router,
    /// 第二阶段（低难度）
    Lower,
    /// 第二阶段（高难度）
    Upper,
    /// 非自适应分段
    Linear,
}

impl Stage {
    pub fn is_stage_two(self) -> bool {
        matches!(self, Stage::Lower | Stage::Upper)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Router => "router",
            Stage::Lower => "lower",
            Stage::Upper => "upper",
            Stage::Linear => "linear",
        };
        write!(f, "{}", name)
    }
}

/// 分流结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Lower,
    Upper,
}

impl Branch {
    /// 分流结果对应的第二阶段
    pub fn stage(self) -> Stage {
        match self {
            Branch::Lower => Stage::Lower,
            Branch::Upper => Stage::Upper,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Lower => write!(f, "LOWER"),
            Branch::Upper => write!(f, "UPPER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_code_roundtrip_is_case_insensitive() {
        assert_eq!(
            TaskType::from_code("Complete_The_Words"),
            Some(TaskType::CompleteTheWords)
        );
        assert_eq!(TaskType::from_code("unknown_type"), None);
    }

    #[test]
    fn test_only_reading_passages_split() {
        assert!(TaskType::ReadAcademicPassage.splits_per_question());
        assert!(TaskType::ReadInDailyLife.splits_per_question());
        assert!(!TaskType::ListenConversation.splits_per_question());
        assert!(!TaskType::CompleteTheWords.splits_per_question());
    }

    #[test]
    fn test_only_speaking_needs_mic_check() {
        assert!(Section::Speaking.requires_mic_check());
        assert!(!Section::Reading.requires_mic_check());
        assert_eq!(Section::from_code(" Listening "), Some(Section::Listening));
    }
}
