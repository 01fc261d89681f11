//! 资源清单
//!
//! 启动时从 `assets/resources.toml` 读取一次的资源描述文件，
//! 列出命名的顶点/像素着色器源文件与命名的管线状态组合。
//! 加载后由注册表把名字解析成句柄，运行期不再引用名字。
//!
//! # 清单格式
//!
//! ```toml
//! [[vertex_shaders]]
//! name = "gui_vs"
//! path = "assets/shaders/gui.hlsl"
//! entry = "vs_main"
//!
//! [[pixel_shaders]]
//! name = "gui_ps"
//! path = "assets/shaders/gui.hlsl"
//! entry = "ps_main"
//!
//! [[pipeline_states]]
//! name = "gui"
//! vertex_shader = "gui_vs"
//! pixel_shader = "gui_ps"
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::core::error::{ConfigError, Result};

/// 着色器条目
#[derive(Debug, Clone, Deserialize)]
pub struct ShaderEntry {
    pub name: String,
    /// HLSL 源文件路径，相对工作目录
    pub path: String,
    /// 入口函数名
    pub entry: String,
}

/// 管线状态条目，按名字引用着色器
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineStateEntry {
    pub name: String,
    pub vertex_shader: String,
    pub pixel_shader: String,
}

/// 资源清单
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceManifest {
    #[serde(default)]
    pub vertex_shaders: Vec<ShaderEntry>,

    #[serde(default)]
    pub pixel_shaders: Vec<ShaderEntry>,

    #[serde(default)]
    pub pipeline_states: Vec<PipelineStateEntry>,
}

impl ResourceManifest {
    /// 从清单文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 清单文件路径
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str))?;

        let manifest: ResourceManifest = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// 从字符串解析（测试用）
    pub fn from_str_checked(contents: &str) -> Result<Self> {
        let manifest: ResourceManifest = toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// 校验条目之间的引用完整性
    ///
    /// 名字必须唯一，管线状态引用的着色器必须存在。
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in self.vertex_shaders.iter().chain(self.pixel_shaders.iter()) {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "shaders".to_string(),
                    reason: format!("duplicate shader name '{}'", entry.name),
                }
                .into());
            }
        }

        let mut pso_names = std::collections::HashSet::new();
        for pso in &self.pipeline_states {
            if !pso_names.insert(pso.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "pipeline_states".to_string(),
                    reason: format!("duplicate pipeline state name '{}'", pso.name),
                }
                .into());
            }
            if !self.vertex_shaders.iter().any(|s| s.name == pso.vertex_shader) {
                return Err(ConfigError::InvalidValue {
                    field: "pipeline_states".to_string(),
                    reason: format!(
                        "pipeline state '{}' references unknown vertex shader '{}'",
                        pso.name, pso.vertex_shader
                    ),
                }
                .into());
            }
            if !self.pixel_shaders.iter().any(|s| s.name == pso.pixel_shader) {
                return Err(ConfigError::InvalidValue {
                    field: "pipeline_states".to_string(),
                    reason: format!(
                        "pipeline state '{}' references unknown pixel shader '{}'",
                        pso.name, pso.pixel_shader
                    ),
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        [[vertex_shaders]]
        name = "gui_vs"
        path = "assets/shaders/gui.hlsl"
        entry = "vs_main"

        [[pixel_shaders]]
        name = "gui_ps"
        path = "assets/shaders/gui.hlsl"
        entry = "ps_main"

        [[pipeline_states]]
        name = "gui"
        vertex_shader = "gui_vs"
        pixel_shader = "gui_ps"
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ResourceManifest::from_str_checked(MANIFEST).unwrap();
        assert_eq!(manifest.vertex_shaders.len(), 1);
        assert_eq!(manifest.vertex_shaders[0].entry, "vs_main");
        assert_eq!(manifest.pipeline_states[0].pixel_shader, "gui_ps");
    }

    #[test]
    fn test_unknown_shader_reference_rejected() {
        let bad = r#"
            [[pipeline_states]]
            name = "gui"
            vertex_shader = "missing_vs"
            pixel_shader = "missing_ps"
        "#;
        assert!(ResourceManifest::from_str_checked(bad).is_err());
    }

    #[test]
    fn test_duplicate_shader_name_rejected() {
        let bad = r#"
            [[vertex_shaders]]
            name = "dup"
            path = "a.hlsl"
            entry = "vs"

            [[pixel_shaders]]
            name = "dup"
            path = "a.hlsl"
            entry = "ps"
        "#;
        assert!(ResourceManifest::from_str_checked(bad).is_err());
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = ResourceManifest::from_str_checked("").unwrap();
        assert!(manifest.pipeline_states.is_empty());
    }
}
