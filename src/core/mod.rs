//! 核心功能模块
//!
//! 本模块提供了应用的基础功能：日志系统、配置管理和错误处理。
//! 这些模块独立于图形 API，可以在任何平台上编译与测试。
//!
//! # 模块组织
//!
//! - `log`：日志系统，提供结构化的日志记录功能
//! - `config`：配置管理，支持从配置文件加载设置
//! - `error`：错误处理，定义统一的错误类型

pub mod config;
pub mod error;
pub mod log;

// 重新导出常用类型，方便使用
pub use config::Config;
pub use error::{GraphicsError, LumeRenderError, Result};
