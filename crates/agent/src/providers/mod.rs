pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicGateway;
pub use openai::OpenAiCompatibleGateway;
