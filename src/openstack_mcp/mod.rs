// src/openstack_mcp/mod.rs

pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod event;
pub mod jsonrpc;
pub mod log_analysis;
pub mod mcp_http_adapter;
pub mod mcp_server;
pub mod mcp_server_builder;
pub mod mcp_server_builder_utils;
pub mod openstack;
pub mod resource_protocol;
pub mod sampling;
pub mod tool_protocol;
pub mod tools;

