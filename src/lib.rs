//! 最小化的 DirectX 12 应用骨架
//!
//! 初始化 GPU 设备，维护逐帧资源（命令分配器、围栏、延迟销毁
//! 队列、环形上传缓冲、描述符堆），并把 egui 的绘制数据渲染到
//! 交换链上。
//!
//! # 模块划分
//!
//! - `core`：配置、日志、错误类型
//! - `renderer`：与图形 API 无关的帧生命周期纯逻辑（可跨平台测试）
//! - `resources`：句柄与资源清单
//! - `gfx`：D3D12 设备/上下文/管线（仅 Windows）
//! - `gui`：egui 集成（仅 Windows）
//! - `app`：帧驱动（仅 Windows）

pub mod core;
pub mod renderer;
pub mod resources;

#[cfg(target_os = "windows")]
pub mod gfx;
#[cfg(target_os = "windows")]
pub mod gui;
#[cfg(target_os = "windows")]
pub mod app;
