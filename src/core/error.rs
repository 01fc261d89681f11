//! 错误处理模块
//!
//! 定义了整个应用使用的统一错误类型，手动实现 `Display` 与 `Error`，
//! 为每种错误提供清晰的上下文信息。
//!
//! # 设计原则
//!
//! - 图形 API 调用失败一律转换为 `GraphicsError` 变体并通过 `?` 向上传播
//! - 设备丢失一类的错误仍然是致命的，由 main 记录日志后退出
//! - 环形缓冲/描述符堆的容量越界是受检错误（`CapacityExceeded`），
//!   而不是静默的数据损坏

use std::fmt;

/// 应用统一的 Result 类型
pub type Result<T> = std::result::Result<T, LumeRenderError>;

/// LumeRender 的顶层错误类型
#[derive(Debug)]
pub enum LumeRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 固定容量的分配器越界（环形上传缓冲、描述符堆）
    CapacityExceeded {
        what: &'static str,
        requested: u64,
        capacity: u64,
    },

    /// 不支持的功能路径（例如 GUI 用户回调命令）
    Unsupported(String),
}

impl fmt::Display for LumeRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LumeRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            LumeRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            LumeRenderError::Io(e) => write!(f, "IO error: {}", e),
            LumeRenderError::Log(msg) => write!(f, "Log error: {}", msg),
            LumeRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            LumeRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => {
                write!(f, "shader compilation failed: {}", msg)
            }
            GraphicsError::ResourceCreation(msg) => write!(f, "resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "command execution failed: {}", msg),
            GraphicsError::CapacityExceeded {
                what,
                requested,
                capacity,
            } => write!(
                f,
                "{} capacity exceeded: requested {} bytes/slots, capacity {}",
                what, requested, capacity
            ),
            GraphicsError::Unsupported(msg) => write!(f, "unsupported: {}", msg),
        }
    }
}

impl std::error::Error for LumeRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LumeRenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

impl From<ConfigError> for LumeRenderError {
    fn from(e: ConfigError) -> Self {
        LumeRenderError::Config(e)
    }
}

impl From<GraphicsError> for LumeRenderError {
    fn from(e: GraphicsError) -> Self {
        LumeRenderError::Graphics(e)
    }
}

impl From<std::io::Error> for LumeRenderError {
    fn from(e: std::io::Error) -> Self {
        LumeRenderError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LumeRenderError::Graphics(GraphicsError::CapacityExceeded {
            what: "upload ring",
            requested: 2048,
            capacity: 1024,
        });
        let msg = format!("{}", err);
        assert!(msg.contains("upload ring"));
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_error_conversion() {
        fn returns_config_error() -> Result<()> {
            Err(ConfigError::FileNotFound("config.toml".to_string()))?
        }
        match returns_config_error() {
            Err(LumeRenderError::Config(ConfigError::FileNotFound(path))) => {
                assert_eq!(path, "config.toml");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
