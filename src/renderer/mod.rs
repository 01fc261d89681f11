//! 渲染器核心逻辑
//!
//! 本模块集中了与图形 API 无关的纯逻辑：帧时间线与围栏值计算、
//! 延迟销毁队列、环形上传缓冲与描述符堆的游标运算、上传请求队列。
//! 这些类型不触碰任何 D3D12 接口，可以在任意平台上独立测试；
//! `gfx` 模块在 Windows 上把它们与真实设备对象组合起来。

pub mod descriptor;
pub mod destroy;
pub mod ring;
pub mod sync;
pub mod upload;

pub use descriptor::{CpuDescriptorHandle, DescriptorRing, GpuDescriptorHandle};
pub use destroy::DelayDestroyQueue;
pub use ring::{RingAllocator, UPLOAD_ALIGNMENT};
pub use sync::{FenceValue, FrameTimeline, PresentSync};
pub use upload::{MeshChannel, PixelFormat, UploadQueue, UploadRequest};
