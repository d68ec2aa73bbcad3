/// 题库 / 会话服务客户端
///
/// 封装所有与题库 API 相关的调用逻辑
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, SessionError};
use crate::models::answers::AnswerMap;
use crate::models::item::{deserialize_id, BankItem};
use crate::models::task::Section;

/// 题库服务能力
///
/// 引擎只通过这三个请求/响应契约与外部服务交互。
#[async_trait]
pub trait ItemBank: Send + Sync {
    /// `GET /items?prefix=&section=`
    async fn fetch_items(&self, section: Section, prefix: &str) -> AppResult<Vec<BankItem>>;

    /// `POST /sessions`，返回会话 ID
    async fn register_session(&self, student_id: &str) -> AppResult<String>;

    /// `POST /sessions/{id}/submit`
    async fn submit_answers(&self, session_id: &str, answers: &AnswerMap) -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
struct SessionCreated {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
}

/// 基于 HTTP 的题库客户端
pub struct ItemBankClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl ItemBankClient {
    /// 创建新的题库客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.item_bank_base_url.trim_end_matches('/').to_string(),
            token: config.item_bank_token.clone(),
            max_retries: config.max_fetch_retries.max(1),
            retry_delay: Duration::from_secs(2),
        })
    }

    /// 自定义限流重试间隔
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 附加公共请求头
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json, text/plain, */*");
        if self.token.is_empty() {
            request
        } else {
            request.header("bank-token", &self.token)
        }
    }

    /// 发送请求，读取 JSON 响应体
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> AppResult<(StatusCode, JsonValue)> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        debug!("{} 响应 {}: {}", endpoint, status, crate::utils::logging::truncate_text(&text, 200));

        // 空响应体视为 null（例如提交接口只返回 204）
        let body = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        };

        Ok((status, body))
    }

    /// 检查是否是频率限制错误
    pub fn is_rate_limited(status: StatusCode, body: &JsonValue) -> bool {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return true;
        }
        body.get("code").and_then(|v| v.as_u64()) == Some(600)
    }

    /// 提取题目列表：兼容裸数组和 `{code, data: [...]}` 两种格式
    pub fn extract_items(body: &JsonValue) -> Option<&[JsonValue]> {
        match body {
            JsonValue::Array(items) => Some(items.as_slice()),
            JsonValue::Object(_) => body.get("data")?.as_array().map(|v| v.as_slice()),
            _ => None,
        }
    }

    /// 逐条解析题目，跳过格式错误的记录
    fn parse_items(raw_items: &[JsonValue]) -> Vec<BankItem> {
        raw_items
            .iter()
            .filter_map(|raw| match serde_json::from_value::<BankItem>(raw.clone()) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("跳过格式错误的题目记录: {}", e);
                    None
                }
            })
            .collect()
    }

    fn error_message(body: &JsonValue) -> Option<String> {
        body.get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| body.as_str().map(str::to_string))
    }
}

#[async_trait]
impl ItemBank for ItemBankClient {
    async fn fetch_items(&self, section: Section, prefix: &str) -> AppResult<Vec<BankItem>> {
        let endpoint = "/items";
        debug!("请求题库: section={}, prefix={}", section.code(), prefix);

        // 重试逻辑（仅针对限流）
        for retry_count in 0..self.max_retries {
            let request = self
                .http
                .get(self.url(endpoint))
                .query(&[("prefix", prefix), ("section", section.code())]);

            let (status, body) = self.send(endpoint, request).await?;

            if Self::is_rate_limited(status, &body) {
                warn!(
                    "API 请求频繁限制 (尝试 {}/{}), 等待 {:?} 后重试...",
                    retry_count + 1,
                    self.max_retries,
                    self.retry_delay
                );
                sleep(self.retry_delay).await;
                continue;
            }

            if !status.is_success() {
                return Err(AppError::bad_response(
                    endpoint,
                    Some(status.as_u16()),
                    Self::error_message(&body),
                ));
            }

            let raw_items = Self::extract_items(&body).ok_or_else(|| {
                AppError::bad_response(endpoint, Some(status.as_u16()), Some("响应中没有题目列表".to_string()))
            })?;

            return Ok(Self::parse_items(raw_items));
        }

        Err(ApiError::RateLimited {
            endpoint: endpoint.to_string(),
            attempts: self.max_retries,
        }
        .into())
    }

    async fn register_session(&self, student_id: &str) -> AppResult<String> {
        let endpoint = "/sessions";
        let request = self
            .http
            .post(self.url(endpoint))
            .json(&json!({ "studentId": student_id }));

        let registration_failed = |reason: String| {
            AppError::Session(SessionError::RegistrationFailed {
                student_id: student_id.to_string(),
                reason,
            })
        };

        let (status, body) = self
            .send(endpoint, request)
            .await
            .map_err(|e| registration_failed(e.to_string()))?;

        if !status.is_success() {
            return Err(registration_failed(format!(
                "status={}, message={:?}",
                status,
                Self::error_message(&body)
            )));
        }

        let created: SessionCreated = serde_json::from_value(body)
            .map_err(|e| registration_failed(format!("响应缺少会话ID: {}", e)))?;

        Ok(created.id)
    }

    async fn submit_answers(&self, session_id: &str, answers: &AnswerMap) -> AppResult<()> {
        let endpoint = format!("/sessions/{}/submit", session_id);
        let request = self
            .http
            .post(self.url(&endpoint))
            .json(&json!({ "answers": answers }));

        let submit_failed = |reason: String| {
            AppError::Session(SessionError::SubmitFailed {
                session_id: session_id.to_string(),
                reason,
            })
        };

        let (status, body) = self
            .send(&endpoint, request)
            .await
            .map_err(|e| submit_failed(e.to_string()))?;

        if !status.is_success() {
            return Err(submit_failed(format!(
                "status={}, message={:?}",
                status,
                Self::error_message(&body)
            )));
        }

        Ok(())
    }
}
