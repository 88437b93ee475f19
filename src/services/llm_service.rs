//! LLM 服务 - 基础能力层
//!
//! 只负责"发送一次对话请求并取回文本"，不关心批次、重试和结果校验
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ScoringError;

/// 单次回复的 token 上限（推理模型需要留出推理空间）
const MAX_COMPLETION_TOKENS: u32 = 8192;

/// 评分服务接口
///
/// 批次流程只依赖这个接口，测试时可以替换成固定回复的实现。
#[allow(async_fn_in_trait)]
pub trait CompletionBackend {
    /// 发送一次请求，返回模型的原始文本回复
    async fn complete(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, ScoringError>;
}

/// LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    response_format: Option<ResponseFormat>,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            response_format: None,
        }
    }

    /// 要求模型按给定的 JSON Schema 输出（strict 模式）
    ///
    /// 不支持结构化输出的兼容服务不要调用这个方法。
    pub fn with_json_schema(mut self, name: &str, schema: serde_json::Value) -> Self {
        self.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: name.to_string(),
                schema: Some(schema),
                strict: Some(true),
            },
        });
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    ///
    /// # 示例
    /// ```no_run
    /// # use job_hunt_assistant::{Config, services::LlmService};
    /// # async fn example(config: &Config) -> Result<(), job_hunt_assistant::error::ScoringError> {
    /// let service = LlmService::new(config);
    /// let reply = service
    ///     .send_to_llm("用一句话介绍 Rust", Some("你是一个简洁的助手"))
    ///     .await?;
    /// println!("{}", reply);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, ScoringError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| ScoringError::service(format!("构建系统消息失败: {}", e)))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| ScoringError::service(format!("构建用户消息失败: {}", e)))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name)
            .messages(messages)
            .max_completion_tokens(MAX_COMPLETION_TOKENS);
        if let Some(format) = &self.response_format {
            args.response_format(format.clone());
        }
        let request = args
            .build()
            .map_err(|e| ScoringError::service(format!("构建请求失败: {}", e)))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            ScoringError::service(format!("LLM API 调用失败 (模型: {}): {}", self.model_name, e))
        })?;

        debug!("LLM API 调用成功");

        // 空回复按结构错误处理，交给上层重试
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ScoringError::validation("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

impl CompletionBackend for LlmService {
    async fn complete(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, ScoringError> {
        self.send_to_llm(user_message, system_message).await
    }
}
