pub mod embeddings;
pub mod llm;

pub use embeddings::{
    EmbeddingConfig, EmbeddingKind, EmbeddingProvider, HashingEmbeddingProvider,
    HttpEmbeddingProvider, create_provider,
};
pub use llm::{CompletionRequest, LanguageModel, LlmConfig, OpenAiCompatibleClient, complete_or};
