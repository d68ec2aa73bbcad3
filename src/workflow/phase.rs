//! 会话阶段

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::models::task::Section;

/// 会话所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "section", rename_all = "snake_case")]
pub enum Phase {
    /// 注册会话、组装初始题池
    Loading,
    /// 分段开始前的说明页
    Intro(Section),
    /// 口语分段前的麦克风检测
    MicCheck,
    /// 正在作答
    Test,
    /// 正在分流、拉取第二阶段题目
    MstRouting,
    Finished,
    /// 会话无法继续（注册失败或题池为空）
    Failed,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Loading => write!(f, "LOADING"),
            Phase::Intro(section) => write!(f, "INTRO({})", section),
            Phase::MicCheck => write!(f, "MIC_CHECK"),
            Phase::Test => write!(f, "TEST"),
            Phase::MstRouting => write!(f, "MST_ROUTING"),
            Phase::Finished => write!(f, "FINISHED"),
            Phase::Failed => write!(f, "FAILED"),
        }
    }
}
