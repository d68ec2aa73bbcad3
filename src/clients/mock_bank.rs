//! 内存题库，用于在没有真实服务时驱动引擎（测试、演练）。

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::clients::item_bank_client::ItemBank;
use crate::error::{AppError, AppResult, SessionError};
use crate::models::answers::AnswerMap;
use crate::models::item::BankItem;
use crate::models::task::Section;

/// 内存题库
///
/// 按 section + 前缀过滤题目，并记录所有请求，便于断言调用顺序。
pub struct MockItemBank {
    items: Vec<BankItem>,
    failing_prefixes: HashSet<String>,
    fail_registration: bool,
    submit_failures_remaining: AtomicUsize,
    fetch_log: Mutex<Vec<(Section, String)>>,
    submitted: Mutex<Vec<AnswerMap>>,
}

impl MockItemBank {
    pub fn new(items: Vec<BankItem>) -> Self {
        Self {
            items,
            failing_prefixes: HashSet::new(),
            fail_registration: false,
            submit_failures_remaining: AtomicUsize::new(0),
            fetch_log: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// 指定前缀的请求返回网络错误
    pub fn with_failing_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefixes.insert(prefix.into());
        self
    }

    /// 会话注册失败
    pub fn with_failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }

    /// 前 `times` 次提交失败
    pub fn with_submit_failures(self, times: usize) -> Self {
        self.submit_failures_remaining.store(times, Ordering::SeqCst);
        self
    }

    /// 已发出的题库请求（section, prefix）
    pub fn fetch_log(&self) -> Vec<(Section, String)> {
        lock(&self.fetch_log).clone()
    }

    /// 是否请求过指定前缀
    pub fn was_fetched(&self, prefix: &str) -> bool {
        self.fetch_log().iter().any(|(_, p)| p == prefix)
    }

    /// 成功提交的作答
    pub fn submissions(&self) -> Vec<AnswerMap> {
        lock(&self.submitted).clone()
    }
}

/// 持锁线程 panic 后仍继续使用记录
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ItemBank for MockItemBank {
    async fn fetch_items(&self, section: Section, prefix: &str) -> AppResult<Vec<BankItem>> {
        lock(&self.fetch_log).push((section, prefix.to_string()));

        if self.failing_prefixes.contains(prefix) {
            return Err(AppError::bad_response("/items", Some(500), Some(format!("模拟失败: {}", prefix))));
        }

        Ok(self
            .items
            .iter()
            .filter(|item| Section::from_code(&item.section) == Some(section))
            .filter(|item| item.id.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn register_session(&self, student_id: &str) -> AppResult<String> {
        if self.fail_registration {
            return Err(SessionError::RegistrationFailed {
                student_id: student_id.to_string(),
                reason: "模拟注册失败".to_string(),
            }
            .into());
        }
        Ok(format!("mock-session-{}", student_id))
    }

    async fn submit_answers(&self, session_id: &str, answers: &AnswerMap) -> AppResult<()> {
        let remaining = self.submit_failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.submit_failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(SessionError::SubmitFailed {
                session_id: session_id.to_string(),
                reason: "模拟提交失败".to_string(),
            }
            .into());
        }
        lock(&self.submitted).push(answers.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, section: &str) -> BankItem {
        BankItem {
            id: id.to_string(),
            task_type: "write_email".into(),
            section: section.into(),
            prompt_content: r#"{"prompt": "Write"}"#.into(),
            questions: Vec::new(),
        }
    }

    #[test]
    fn test_filters_by_section_and_prefix() {
        let bank = MockItemBank::new(vec![
            item("WR-1", "writing"),
            item("WR-2", "Writing"),
            item("RD-1", "reading"),
        ]);

        let items = tokio_test::block_on(bank.fetch_items(Section::Writing, "WR")).unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["WR-1", "WR-2"]);
        assert_eq!(bank.fetch_log(), vec![(Section::Writing, "WR".to_string())]);
    }

    #[test]
    fn test_failure_injection() {
        let bank = MockItemBank::new(vec![item("WR-1", "writing")])
            .with_failing_prefix("WR")
            .with_submit_failures(1);

        assert!(tokio_test::block_on(bank.fetch_items(Section::Writing, "WR")).is_err());
        assert!(bank.was_fetched("WR"));

        let answers = AnswerMap::new();
        assert!(tokio_test::block_on(bank.submit_answers("s-1", &answers)).is_err());
        assert!(tokio_test::block_on(bank.submit_answers("s-1", &answers)).is_ok());
        assert_eq!(bank.submissions().len(), 1);
    }

    #[test]
    fn test_poisoned_log_does_not_panic() {
        let bank = MockItemBank::new(vec![item("WR-1", "writing")]);
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = bank.fetch_log.lock().unwrap();
                    panic!("持锁时崩溃");
                })
                .join()
        });
        assert!(bank.fetch_log.is_poisoned());

        let items = tokio_test::block_on(bank.fetch_items(Section::Writing, "WR")).unwrap();
        assert_eq!(items.len(), 1);
        assert!(bank.was_fetched("WR"));
    }
}
