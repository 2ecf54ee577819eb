use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文档读取 / 解析错误
    #[error("文档错误: {0}")]
    Document(#[from] DocumentError),
    /// 模型调用错误
    #[error("模型错误: {0}")]
    Prompt(#[from] PromptError),
    /// 本地存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 整批分类失败
    #[error("批处理错误: {0}")]
    Batch(#[from] BatchError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少模型凭证
    #[error("环境变量 {var_name} 未设置，AI 功能不可用。请在环境中配置模型 API Key")]
    MissingCredentials { var_name: String },
    /// 词表文件无法加载
    #[error("词表文件 {path} 加载失败: {reason}")]
    VocabularyLoadFailed { path: String, reason: String },
}

/// 文档相关错误
#[derive(Debug, Error)]
pub enum DocumentError {
    /// data URI 缺少 MIME 类型
    #[error("data URI 缺少 MIME 类型，期望格式 data:<mimetype>;base64,<data>")]
    MissingMime,
    /// data URI 格式不合法
    #[error("data URI 格式不合法: {0}")]
    MalformedDataUri(String),
    /// 不支持的文件类型
    #[error("不支持的文件类型: {0}")]
    UnsupportedType(String),
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// PDF 光栅化失败
    #[error("PDF 渲染失败: {0}")]
    RenderFailed(String),
}

/// 单次模型调用错误
#[derive(Debug, Error, Clone)]
pub enum PromptError {
    /// 未配置凭证
    #[error("模型凭证未配置")]
    Config,
    /// 鉴权失败
    #[error("模型鉴权失败: {0}")]
    Unauthorized(String),
    /// 网络或服务端错误
    #[error("模型调用失败 (模型: {model}): {message}")]
    Transport { model: String, message: String },
    /// 返回内容为空
    #[error("模型返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 返回内容不符合约定的结构
    #[error("模型返回结构不合法 ({prompt}): {reason}")]
    Schema { prompt: String, reason: String },
}

impl PromptError {
    /// 是否属于"服务不可用"类错误（网络 / 鉴权 / 配置）
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            PromptError::Config | PromptError::Unauthorized(_) | PromptError::Transport { .. }
        )
    }
}

/// 本地存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 写入失败
    #[error("写入 {key} 失败: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// 删除失败
    #[error("删除 {key} 失败: {source}")]
    RemoveFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化 {key} 失败: {source}")]
    SerializeFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 整批分类失败
#[derive(Debug, Error)]
pub enum BatchError {
    /// 模型服务中断：截至某一批，连续多道题因服务不可用失败
    #[error("截至第 {chunk} 批连续 {failed} 道题分类失败，模型服务不可用: {last_error}")]
    Unavailable {
        chunk: usize,
        failed: usize,
        last_error: PromptError,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::VocabularyLoadFailed {
            path: String::new(),
            reason: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Document(DocumentError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
