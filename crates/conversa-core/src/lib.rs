pub mod ai;
pub mod attachment;
pub mod config;
pub mod error;
pub mod highlight;
pub mod history;
pub mod location;
pub mod markdown;
pub mod pipeline;
pub mod provider;
pub mod state;
pub mod temporal;
pub mod typewriter;

// Re-export main types for convenience
pub use ai::{build_client, ClaudeClient, ClientOptions, CompletionClient, CompletionRequest, OllamaClient, OpenAIClient};
pub use config::{AiConfig, ChatConfig, ResponseStyle, Settings};
pub use error::ChatError;
pub use history::{ConversationHistory, PrunePolicy};
pub use location::{Location, LocationProvider, NominatimLocator};
pub use pipeline::{ChatView, MessagePipeline, TurnOutcome};
pub use provider::Provider;
pub use state::{ChatMessage, ChatRole, Content, ContentPart, PipelineState};
pub use typewriter::{AnimationOutcome, RenderTarget, StopHandle};
