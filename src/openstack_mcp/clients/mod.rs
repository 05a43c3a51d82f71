//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! The MCP tools only need a single chat round-trip per request, so one OpenAI-compatible
//! client covers OpenAI itself and self-hosted gateways that mimic its API.

pub mod openai;
