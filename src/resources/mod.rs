//! 资源描述层
//!
//! 句柄类型与启动时读取一次的资源清单。

pub mod handle;
pub mod manifest;

pub use handle::{InputLayoutHandle, MeshHandle, PipelineHandle, TextureHandle};
pub use manifest::ResourceManifest;
