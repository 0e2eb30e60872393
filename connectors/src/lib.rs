//! HTTP collaborators for the market pipelines.
//!
//! Every external system the pipelines talk to over HTTP lives here,
//! each behind a trait so orchestrators and tests share one seam:
//! - Social feed post source
//! - News search (GDELT) and web search (Tavily)
//! - External page fetcher
//! - Language model (structured JSON completions)
//! - Image generator

pub mod feed;
pub mod image;
pub mod llm;
pub mod news;
pub mod page;
pub mod websearch;

pub use feed::{FeedApi, PostSource};
pub use image::{ImageApi, ImageGenerator};
pub use llm::{structured, LanguageModel, OpenAiModel};
pub use news::GdeltNews;
pub use page::{HttpPageReader, PageReader};
pub use websearch::{SearchHit, SearchProvider, TavilyClient};
