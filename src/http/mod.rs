//! HTTP transport for the Model Context Protocol router

pub mod handlers;
