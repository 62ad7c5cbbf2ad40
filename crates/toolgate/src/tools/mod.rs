//! A set of built-in tools that models can use.

mod chat;
mod wiki;

pub use chat::{ChitChatInput, ChitChatTool, SummarizeInput, SummarizeTool};
pub use wiki::{WikiSearchInput, WikiSearchTool};
