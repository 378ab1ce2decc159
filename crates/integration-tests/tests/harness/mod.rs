#![allow(dead_code)]

pub mod config;
pub mod mock_backend;
pub mod server;
pub mod sse;
