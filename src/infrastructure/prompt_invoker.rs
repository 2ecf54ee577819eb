//! 模型调用 - 基础设施层
//!
//! 只负责"发一次提示词，拿回一段文本 / 一个结构化对象"，不认识题目和科目。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（Gemini、Azure、Doubao 等）
//! - 图片 / 文档以 data URI 形式作为多模态内容发送

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ConfigError, PromptError};

/// 一次结构化的提示词请求
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    /// 提示词名称（仅用于日志和错误信息）
    pub name: &'static str,
    pub system: String,
    pub user: String,
    /// 以 data URI 表示的图片 / 文档
    pub media: Vec<String>,
}

impl PromptRequest {
    pub fn new(name: &'static str, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name,
            system: system.into(),
            user: user.into(),
            media: Vec::new(),
        }
    }

    pub fn with_media(mut self, data_uri: impl Into<String>) -> Self {
        self.media.push(data_uri.into());
        self
    }
}

/// 托管模型的调用边界
#[async_trait]
pub trait PromptInvoker: Send + Sync {
    /// 发送请求并返回模型的原始文本
    async fn invoke(&self, request: &PromptRequest) -> Result<String, PromptError>;

    /// 当前使用的模型名称
    fn model_name(&self) -> &str;
}

/// 模型响应的结构校验
pub trait ResponseSchema {
    /// 反序列化成功之后的业务约束检查
    fn validate(&self) -> Result<(), String>;
}

/// 调用模型并把响应解析为 `T`
///
/// 解析步骤：去掉 Markdown 代码块 → 截取 JSON 对象 → serde 反序列化 → `validate()`。
/// 任何一步失败都返回 `PromptError::Schema`，由调用方决定如何降级。
pub async fn invoke_json<T>(
    invoker: &dyn PromptInvoker,
    request: &PromptRequest,
) -> Result<T, PromptError>
where
    T: DeserializeOwned + ResponseSchema,
{
    let raw = invoker.invoke(request).await?;
    parse_json_response(request.name, &raw)
}

/// 把模型文本解析为结构化对象
pub fn parse_json_response<T>(prompt: &str, raw: &str) -> Result<T, PromptError>
where
    T: DeserializeOwned + ResponseSchema,
{
    let schema_err = |reason: String| PromptError::Schema {
        prompt: prompt.to_string(),
        reason,
    };

    let body = extract_json_object(raw).ok_or_else(|| schema_err("响应中没有 JSON 对象".to_string()))?;
    let value: T = serde_json::from_str(body).map_err(|e| schema_err(e.to_string()))?;
    value.validate().map_err(schema_err)?;
    Ok(value)
}

/// 从模型文本中截取 JSON 对象（兼容 ```json 代码块）
pub fn extract_json_object(raw: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("静态正则")
    });

    let inner = match fence.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => raw,
    };
    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&inner[start..=end])
}

/// 基于 OpenAI 兼容接口的模型调用
pub struct OpenAiInvoker {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiInvoker {
    /// 创建调用器；未配置 API Key 时直接失败，不做任何 I/O
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Ok(Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            max_retries: config.llm_max_retries.max(1),
        })
    }

    fn transport(&self, message: impl std::fmt::Display) -> PromptError {
        PromptError::Transport {
            model: self.model_name.clone(),
            message: message.to_string(),
        }
    }

    fn build_messages(
        &self,
        request: &PromptRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, PromptError> {
        let mut messages = Vec::new();

        if !request.system.is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.as_str())
                .build()
                .map_err(|e| self.transport(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = if request.media.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user.as_str())
                .build()
                .map_err(|e| self.transport(e))?
        } else {
            // 多模态：文本 + 图片 / 文档
            let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                vec![ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: request.user.clone(),
                    },
                )];
            for url in &request.media {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: Some(ImageDetail::High),
                        },
                    },
                ));
            }
            debug!("[{}] 多模态请求，附带 {} 个文件", request.name, request.media.len());

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()
                .map_err(|e| self.transport(e))?
        };
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }
}

#[async_trait]
impl PromptInvoker for OpenAiInvoker {
    async fn invoke(&self, request: &PromptRequest) -> Result<String, PromptError> {
        debug!(
            "[{}] 调用 LLM API，模型: {}，用户消息长度: {} 字符",
            request.name,
            self.model_name,
            request.user.len()
        );

        let messages = self.build_messages(request)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| self.transport(e))?;

        // 重试逻辑：只对限流重试，其他错误直接返回
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.chat().create(chat_request.clone()).await {
                Ok(response) => break response,
                Err(e) => {
                    let message = e.to_string();
                    if is_rate_limited(&message) && attempt < self.max_retries {
                        warn!(
                            "[{}] API 请求频繁限制 (尝试 {}/{}), 等待 2 秒后重试...",
                            request.name, attempt, self.max_retries
                        );
                        sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                    warn!("[{}] LLM API 调用失败: {}", request.name, message);
                    return Err(classify_api_error(&self.model_name, &message));
                }
            }
        };

        debug!("[{}] LLM API 调用成功", request.name);

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PromptError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// 是否被限流
fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429") || lower.contains("rate limit") || lower.contains("resource_exhausted")
}

/// 根据错误信息区分鉴权失败和其他调用失败
fn classify_api_error(model: &str, message: &str) -> PromptError {
    let lower = message.to_lowercase();
    let unauthorized = ["401", "403", "unauthorized", "api key", "api_key", "permission denied"];
    if unauthorized.iter().any(|needle| lower.contains(needle)) {
        PromptError::Unauthorized(message.to_string())
    } else {
        PromptError::Transport {
            model: model.to_string(),
            message: message.to_string(),
        }
    }
}
