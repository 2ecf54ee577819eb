use std::path::PathBuf;

use crate::error::ConfigError;

/// 分类时遇到词表之外的科目如何处理
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnmatchedSubjectPolicy {
    /// 丢弃该题（记录警告）
    Drop,
    /// 归入 "Miscellaneous" 科目
    Miscellaneous,
}

/// 分类策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationMode {
    /// 开放式：科目受限，主题由模型归纳生成
    Open,
    /// 封闭式：主题必须来自给定的主题列表
    Closed,
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 被限流时的最大尝试次数
    pub llm_max_retries: u32,
    // --- 流水线配置 ---
    /// 每批同时发出的分类请求数量
    pub classify_chunk_size: usize,
    /// PDF 逐页渲染的缩放倍数
    pub render_scale: f32,
    pub classification_mode: ClassificationMode,
    pub unmatched_subject_policy: UnmatchedSubjectPolicy,
    /// 封闭式分类使用的主题列表文件（每行一个主题）
    pub master_topics_file: Option<PathBuf>,
    /// 自定义科目词表（TOML）
    pub vocabulary_file: Option<PathBuf>,
    // --- 存储 / 日志 ---
    /// 本地数据目录
    pub data_dir: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-1.5-flash-latest".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 8192,
            llm_max_retries: 3,
            classify_chunk_size: 10,
            render_scale: 2.0,
            classification_mode: ClassificationMode::Open,
            unmatched_subject_policy: UnmatchedSubjectPolicy::Drop,
            master_topics_file: None,
            vocabulary_file: None,
            data_dir: PathBuf::from(".exam_hotspot"),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: std::env::var("LLM_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_temperature),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_tokens),
            llm_max_retries: std::env::var("LLM_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_retries),
            classify_chunk_size: std::env::var("CLASSIFY_CHUNK_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.classify_chunk_size),
            render_scale: std::env::var("RENDER_SCALE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.render_scale),
            classification_mode: std::env::var("CLASSIFICATION_POLICY").ok().and_then(|v| parse_mode(&v)).unwrap_or(default.classification_mode),
            unmatched_subject_policy: std::env::var("UNMATCHED_SUBJECT_POLICY").ok().and_then(|v| parse_unmatched(&v)).unwrap_or(default.unmatched_subject_policy),
            master_topics_file: std::env::var("MASTER_TOPICS_FILE").ok().map(PathBuf::from),
            vocabulary_file: std::env::var("VOCABULARY_FILE").ok().map(PathBuf::from),
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(default.data_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 在任何 I/O 之前检查必需配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredentials {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        if self.classify_chunk_size == 0 {
            return Err(ConfigError::EnvVarParseFailed {
                var_name: "CLASSIFY_CHUNK_SIZE".to_string(),
                value: "0".to_string(),
                expected_type: "正整数".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_mode(value: &str) -> Option<ClassificationMode> {
    match value.trim().to_lowercase().as_str() {
        "open" => Some(ClassificationMode::Open),
        "closed" => Some(ClassificationMode::Closed),
        _ => None,
    }
}

fn parse_unmatched(value: &str) -> Option<UnmatchedSubjectPolicy> {
    match value.trim().to_lowercase().as_str() {
        "drop" => Some(UnmatchedSubjectPolicy::Drop),
        "misc" | "miscellaneous" => Some(UnmatchedSubjectPolicy::Miscellaneous),
        _ => None,
    }
}
