//! Wire-level types shared between the router and provider adapters.

pub mod chat;

pub use chat::{
    ChatRequest, ChatResponse, Choice, Delta, Message, RoutingInfo, StreamChoice, StreamChunk,
    Usage,
};
