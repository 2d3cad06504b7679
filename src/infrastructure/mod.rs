//! 基础设施层：外部系统交互
//!
//! 提供与外部系统（Discord、LLM、tokenizer、SQLite、日志、HTTP）的交互能力

pub mod discord;
pub mod llm;
pub mod logger;
pub mod store;
pub mod tokenizer;
pub mod web;
