//! 考生作答表
//!
//! 作答表是外部状态：界面组件写入，引擎只在分段边界读取快照。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// 小题 / 条目 ID -> 原始作答
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap {
    responses: HashMap<String, JsonValue>,
}

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录作答：首次作答时创建，之后的修改直接覆盖
    pub fn record(&mut self, id: impl Into<String>, response: impl Into<JsonValue>) {
        self.responses.insert(id.into(), response.into());
    }

    pub fn get(&self, id: &str) -> Option<&JsonValue> {
        self.responses.get(id)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// 读取作答，若为 JSON 字符串则先解码
    ///
    /// 界面组件会把组合作答（多小题、片段顺序等）序列化成字符串保存。
    pub fn decoded(&self, id: &str) -> Option<JsonValue> {
        let raw = self.responses.get(id)?;
        match raw {
            JsonValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    serde_json::from_str(trimmed).ok().or_else(|| Some(raw.clone()))
                } else {
                    Some(raw.clone())
                }
            }
            other => Some(other.clone()),
        }
    }
}

impl From<HashMap<String, JsonValue>> for AnswerMap {
    fn from(responses: HashMap<String, JsonValue>) -> Self {
        Self { responses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_overwrites_previous_response() {
        let mut answers = AnswerMap::new();
        answers.record("q1", 1);
        answers.record("q1", 3);
        assert_eq!(answers.get("q1"), Some(&json!(3)));
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn test_decoded_parses_json_encoded_strings() {
        let mut answers = AnswerMap::new();
        answers.record("blob", r#"{"0": 2, "answer": 1}"#);
        answers.record("plain", "plenty");
        answers.record("broken", "{not json");

        assert_eq!(answers.decoded("blob"), Some(json!({"0": 2, "answer": 1})));
        assert_eq!(answers.decoded("plain"), Some(json!("plenty")));
        assert_eq!(answers.decoded("broken"), Some(json!("{not json")));
        assert_eq!(answers.decoded("missing"), None);
    }
}
