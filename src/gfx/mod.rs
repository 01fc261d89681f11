//! DirectX 12 图形层
//!
//! 把 `renderer` 模块的纯逻辑（帧时间线、延迟销毁、游标分配）
//! 与真实的 D3D12 对象组合成可用的设备与录制上下文。
//!
//! # 主要组件
//!
//! - `GraphicsDevice`：设备、命令队列、交换链、围栏与帧资源轮转
//! - `GraphicsContext`：单条图形命令列表上的录制接口，按需解析 PSO
//! - `RingUploadBuffer`：常驻映射的环形上传缓冲
//! - `ResourceRegistry`：句柄索引的资源表，启动时从清单装载
//!
//! 仅在 Windows 上编译。

pub mod context;
pub mod device;
pub mod heap;
pub mod mesh;
pub mod pipeline;
pub mod registry;
pub mod texture;
pub mod upload;

pub use context::GraphicsContext;
pub use device::GraphicsDevice;
pub use heap::DescriptorHeap;
pub use mesh::Mesh;
pub use pipeline::{InputElement, InputLayoutDesc, PsoDesc, RootParamKind, RootSignature, Semantic, VertexFormat};
pub use registry::ResourceRegistry;
pub use texture::Texture2D;
pub use upload::RingUploadBuffer;
