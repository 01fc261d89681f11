//! 配置管理模块
//!
//! 提供应用配置的加载、解析和校验功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "LumeRender"
//! resizable = true
//!
//! [graphics]
//! vsync = true
//! buffer_count = 3
//! upload_ring_size = 67108864          # 64 MB
//! frame_upload_budget = 16777216       # 每帧最坏情况上传量
//! descriptor_capacity = 65536
//! frame_descriptor_budget = 4096       # 每帧最坏情况描述符消耗
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 应用配置
///
/// 包含了运行所需的所有配置项。
/// 可以从配置文件加载，也可以通过代码构建。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 缓冲帧数（同时在飞行中的帧数上限）
    #[serde(default = "default_buffer_count")]
    pub buffer_count: u32,

    /// 环形上传缓冲区总容量（字节）
    #[serde(default = "default_upload_ring_size")]
    pub upload_ring_size: u64,

    /// 声明的每帧最坏情况上传量（字节），启动时校验容量余量
    #[serde(default = "default_frame_upload_budget")]
    pub frame_upload_budget: u64,

    /// 着色器可见描述符堆容量
    #[serde(default = "default_descriptor_capacity")]
    pub descriptor_capacity: u32,

    /// 声明的每帧最坏情况描述符消耗，启动时校验容量余量
    #[serde(default = "default_frame_descriptor_budget")]
    pub frame_descriptor_budget: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_title() -> String { "LumeRender".to_string() }
fn default_resizable() -> bool { true }
fn default_vsync() -> bool { true }
fn default_buffer_count() -> u32 { 3 }
fn default_upload_ring_size() -> u64 { 64 * 1024 * 1024 }
fn default_frame_upload_budget() -> u64 { 16 * 1024 * 1024 }
fn default_descriptor_capacity() -> u32 { 65536 }
fn default_frame_descriptor_budget() -> u32 { 4096 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "lume_render.log".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            graphics: GraphicsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: default_vsync(),
            buffer_count: default_buffer_count(),
            upload_ring_size: default_upload_ring_size(),
            frame_upload_budget: default_frame_upload_budget(),
            descriptor_capacity: default_descriptor_capacity(),
            frame_descriptor_budget: default_frame_descriptor_budget(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// # 说明
    ///
    /// 支持的参数：
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    /// - `--no-vsync`: 关闭垂直同步（以允许撕裂的方式呈现）
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--no-vsync") {
            self.graphics.vsync = false;
        }

        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width_str) = args.get(idx + 1) {
                if let Ok(width) = width_str.parse() {
                    self.window.width = width;
                }
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height_str) = args.get(idx + 1) {
                if let Ok(height) = height_str.parse() {
                    self.window.height = height;
                }
            }
        }
    }

    /// 验证配置的有效性
    ///
    /// 除基本取值范围外，还校验环形上传缓冲与描述符堆的容量余量：
    /// 声明的每帧最坏情况用量 × (buffer_count + 1) 必须不超过总容量，
    /// 否则回绕可能覆盖 GPU 尚未消费完的数据。
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        if !(2..=4).contains(&self.graphics.buffer_count) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.buffer_count".to_string(),
                reason: "Buffer count must be 2, 3, or 4".to_string(),
            }.into());
        }

        // 环形区与描述符堆的游标对容量取模，零容量在这里拦下
        if self.graphics.upload_ring_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.upload_ring_size".to_string(),
                reason: "Upload ring capacity must be greater than 0".to_string(),
            }.into());
        }

        if self.graphics.descriptor_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "graphics.descriptor_capacity".to_string(),
                reason: "Descriptor heap capacity must be greater than 0".to_string(),
            }.into());
        }

        let in_flight = u64::from(self.graphics.buffer_count) + 1;
        if self.graphics.frame_upload_budget * in_flight > self.graphics.upload_ring_size {
            return Err(ConfigError::InvalidValue {
                field: "graphics.frame_upload_budget".to_string(),
                reason: format!(
                    "upload ring too small: need {} x {} bytes, have {}",
                    self.graphics.frame_upload_budget, in_flight, self.graphics.upload_ring_size
                ),
            }.into());
        }

        if u64::from(self.graphics.frame_descriptor_budget) * in_flight
            > u64::from(self.graphics.descriptor_capacity)
        {
            return Err(ConfigError::InvalidValue {
                field: "graphics.frame_descriptor_budget".to_string(),
                reason: format!(
                    "descriptor heap too small: need {} x {} slots, have {}",
                    self.graphics.frame_descriptor_budget,
                    in_flight,
                    self.graphics.descriptor_capacity
                ),
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.graphics.buffer_count, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_budget_validation() {
        let mut config = Config::default();
        // 每帧预算 × (buffer_count + 1) 超过总容量时应当在启动时报错
        config.graphics.upload_ring_size = 1024;
        config.graphics.frame_upload_budget = 512;
        assert!(config.validate().is_err());

        config.graphics.frame_upload_budget = 256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacities_rejected() {
        // 预算为 0 时余量校验不报错，零容量必须单独拦下
        let mut config = Config::default();
        config.graphics.upload_ring_size = 0;
        config.graphics.frame_upload_budget = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.descriptor_capacity = 0;
        config.graphics.frame_descriptor_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["--width", "1920", "--height", "1080", "--no-vsync"]);
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 1080);
        assert!(!config.graphics.vsync);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [graphics]
            vsync = false
            buffer_count = 2
            "#,
        )
        .unwrap();
        assert!(!config.graphics.vsync);
        assert_eq!(config.graphics.buffer_count, 2);
        // 未指定的字段取默认值
        assert_eq!(config.window.width, 1280);
    }
}
