//! AWS Bedrock backend over the model-agnostic Converse API.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, Message, SystemContentBlock,
};
use serde::Deserialize;

use super::{SemanticGuess, SemanticParser, decode_guess, system_prompt};
use crate::error::SemanticError;

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockConfig {
    /// Bedrock model ID (e.g., "us.amazon.nova-lite-v1:0").
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Overrides the region from the AWS environment.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_model_id() -> String {
    "us.amazon.nova-lite-v1:0".into()
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region: None,
        }
    }
}

pub struct BedrockParser {
    client: BedrockClient,
    config: BedrockConfig,
}

impl BedrockParser {
    /// Create a parser with a pre-built Bedrock client.
    pub fn new(client: BedrockClient, config: BedrockConfig) -> Self {
        Self { client, config }
    }

    /// Build the client from the ambient AWS configuration.
    pub async fn from_env(config: BedrockConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::new(BedrockClient::new(&sdk_config), config)
    }
}

#[async_trait]
impl SemanticParser for BedrockParser {
    async fn parse(&self, text: &str, schema: &str) -> Result<Option<SemanticGuess>, SemanticError> {
        let user_message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(text.to_string()))
            .build()
            .map_err(|e| SemanticError::Transport(format!("failed to build message: {e}")))?;

        let response = self
            .client
            .converse()
            .model_id(&self.config.model_id)
            .system(SystemContentBlock::Text(system_prompt(schema)))
            .messages(user_message)
            .send()
            .await
            .map_err(|e| SemanticError::Transport(format!("bedrock converse error: {e}")))?;

        let output = response
            .output()
            .ok_or_else(|| SemanticError::Malformed("no output in bedrock response".into()))?;

        let raw_text = match output {
            ConverseOutput::Message(msg) => msg.content().iter().find_map(|block| {
                if let ContentBlock::Text(t) = block {
                    Some(t.clone())
                } else {
                    None
                }
            }),
            _ => None,
        };

        match raw_text {
            Some(raw) => decode_guess(&raw),
            None => Ok(None),
        }
    }

    fn backend_name(&self) -> &str {
        "bedrock"
    }
}
