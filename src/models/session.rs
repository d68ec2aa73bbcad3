//! 会话标识

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 会话：启动时向会话服务注册一次，此后所有请求都带上会话 ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub student_id: String,
}

impl Session {
    pub fn new(id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            student_id: student_id.into(),
        }
    }
}

impl Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[会话 {} 学生 {}]", self.id, self.student_id)
    }
}
