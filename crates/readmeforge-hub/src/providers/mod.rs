pub mod fallback;
pub mod gemini;
pub mod openai;

pub use fallback::{FallbackController, PoolSnapshot};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
