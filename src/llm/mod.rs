//! Language model integration
//!
//! - `chat` - chat wire types, the [`ChatModel`] seam and its HTTP client
//! - `tool_parse` - recovering tool calls that models print as text

pub mod chat;
pub mod tool_parse;

pub use chat::{
    ChatClient, ChatError, ChatMessage, ChatModel, ChatResponse, FunctionCall, Tool, ToolCall,
    ToolFunction,
};
pub use tool_parse::parse_tool_calls_from_text;
