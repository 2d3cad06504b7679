//! 核心层：配置、目录、载荷构建与抽象接口

pub mod catalog;
pub mod collector;
pub mod config;
pub mod payload;
pub mod store;
pub mod tokens;
