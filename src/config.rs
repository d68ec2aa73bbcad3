use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 考生ID（注册会话时使用）
    pub student_id: String,
    /// 试卷蓝图 TOML 文件
    pub blueprint_path: String,
    /// 回放答案文件（JSON，id -> 作答）
    pub replay_answers_path: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- 题库 API 配置 ---
    pub item_bank_base_url: String,
    /// 本地题库文件（JSON）；设置后不访问题库 API
    pub item_bank_fixture_path: Option<String>,
    pub item_bank_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 被限流时的最大重试次数
    pub max_fetch_retries: usize,
    /// 分流完成后切回答题的等待时间（毫秒）
    pub routing_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            student_id: "demo-student".to_string(),
            blueprint_path: "blueprints/standard.toml".to_string(),
            replay_answers_path: None,
            verbose_logging: false,
            output_log_file: "session_log.txt".to_string(),
            item_bank_base_url: "http://localhost:8080".to_string(),
            item_bank_fixture_path: None,
            item_bank_token: String::new(),
            request_timeout_secs: 15,
            max_fetch_retries: 5,
            routing_delay_ms: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            student_id: std::env::var("STUDENT_ID").unwrap_or(default.student_id),
            blueprint_path: std::env::var("BLUEPRINT_PATH").unwrap_or(default.blueprint_path),
            replay_answers_path: std::env::var("REPLAY_ANSWERS_PATH").ok().or(default.replay_answers_path),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            item_bank_base_url: std::env::var("ITEM_BANK_BASE_URL").unwrap_or(default.item_bank_base_url),
            item_bank_fixture_path: std::env::var("ITEM_BANK_FIXTURE").ok().or(default.item_bank_fixture_path),
            item_bank_token: std::env::var("ITEM_BANK_TOKEN").unwrap_or(default.item_bank_token),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_fetch_retries: std::env::var("MAX_FETCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_fetch_retries),
            routing_delay_ms: std::env::var("ROUTING_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.routing_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn routing_delay(&self) -> Duration {
        Duration::from_millis(self.routing_delay_ms)
    }
}
