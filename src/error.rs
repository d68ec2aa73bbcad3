use std::path::Path;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 题库 / 会话服务调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 考试会话状态错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status:?}, message={message:?}")]
    BadResponse {
        endpoint: String,
        status: Option<u16>,
        message: Option<String>,
    },
    /// 请求频率限制
    #[error("API请求频率限制 ({endpoint}), 已重试 {attempts} 次")]
    RateLimited { endpoint: String, attempts: usize },
}

/// 考试会话错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 会话注册失败，引擎无法启动
    #[error("会话注册失败 (学生: {student_id}): {reason}")]
    RegistrationFailed { student_id: String, reason: String },
    /// 初始题池为空
    #[error("初始题池为空，会话无法开始")]
    EmptyPool,
    /// 当前阶段不允许该操作
    #[error("阶段 {phase} 不允许操作: {action}")]
    InvalidTransition { phase: String, action: String },
    /// 同一分段重复插入第二阶段题目
    #[error("分段 {section} 已存在第二阶段题目")]
    AlreadyRouted { section: String },
    /// 回看导航越界
    #[error("无法回看到位置 {index}: {reason}")]
    ReviewOutOfBounds { index: usize, reason: String },
    /// 提交答案失败（可重试）
    #[error("提交答案失败 (会话: {session_id}): {reason}")]
    SubmitFailed { session_id: String, reason: String },
    /// 题目内容与题型不匹配
    #[error("题目 {item_id} 的内容无法按题型 {task_type} 解析: {reason}")]
    MalformedContent {
        item_id: String,
        task_type: String,
        reason: String,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 试卷蓝图不合法
    #[error("试卷蓝图不合法: {reason}")]
    InvalidBlueprint { reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建API错误响应
    pub fn bad_response(
        endpoint: impl Into<String>,
        status: Option<u16>,
        message: Option<String>,
    ) -> Self {
        AppError::Api(ApiError::BadResponse {
            endpoint: endpoint.into(),
            status,
            message,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: &Path,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.display().to_string(),
            source: Box::new(source),
        })
    }

    /// 创建 TOML 解析错误
    pub fn toml_parse_failed(path: &Path, source: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: path.display().to_string(),
            source: Box::new(source),
        })
    }

    /// 创建 JSON 解析错误
    pub fn json_parse_failed(path: &Path, source: serde_json::Error) -> Self {
        AppError::File(FileError::JsonParseFailed {
            path: path.display().to_string(),
            source: Box::new(source),
        })
    }

    /// 创建非法阶段转换错误
    pub fn invalid_transition(phase: impl ToString, action: impl Into<String>) -> Self {
        AppError::Session(SessionError::InvalidTransition {
            phase: phase.to_string(),
            action: action.into(),
        })
    }

    /// 创建蓝图校验错误
    pub fn invalid_blueprint(reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidBlueprint {
            reason: reason.into(),
        })
    }

    /// 是否为致命错误（会话无法继续）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Session(SessionError::RegistrationFailed { .. })
                | AppError::Session(SessionError::EmptyPool)
        )
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
