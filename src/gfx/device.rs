//! 图形设备
//!
//! D3D12 设备、命令队列、交换链、围栏与帧资源轮转的持有者。
//! 帧计数与等待目标的计算全部委托给 `renderer::sync::FrameTimeline`，
//! 本模块只负责把计算结果落到真实的 fence / 事件 / 交换链上。
//!
//! # 初始化流程
//!
//! 1. 启用调试层（Debug 模式）
//! 2. 创建 DXGI 工厂与 D3D12 设备
//! 3. 创建命令队列与翻转交换链（支持时探测撕裂模式）
//! 4. 按缓冲帧数创建命令分配器
//! 5. 创建描述符堆（RTV / DSV / 着色器可见 CBV_SRV_UAV）
//! 6. 以 `buffer_count` 为初值创建围栏与自动复位事件

use tracing::{debug, info, warn};
use windows::core::Interface;
use windows::Win32::Foundation::{BOOL, CloseHandle, HANDLE, HWND};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::heap::DescriptorHeap;
use crate::renderer::{DelayDestroyQueue, FenceValue, FrameTimeline};

/// 交换链后台缓冲格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

pub struct GraphicsDevice {
    pub device: ID3D12Device,
    pub command_queue: ID3D12CommandQueue,
    swap_chain: IDXGISwapChain3,
    /// 交换链后台缓冲，resize 时整体释放重取
    back_buffers: Vec<ID3D12Resource>,
    fence: ID3D12Fence,
    fence_event: HANDLE,
    timeline: FrameTimeline,
    allocators: Vec<ID3D12CommandAllocator>,
    destroy_queue: DelayDestroyQueue<ID3D12Resource>,
    pub rtv_heap: DescriptorHeap,
    pub dsv_heap: DescriptorHeap,
    /// 着色器可见的 CBV/SRV/UAV 堆
    pub shader_heap: DescriptorHeap,
    buffer_count: u32,
    width: u32,
    height: u32,
    tearing_supported: bool,
}

// D3D12 对象本身线程安全；提交只发生在单一线程
unsafe impl Send for GraphicsDevice {}

impl GraphicsDevice {
    pub fn new(window: &Window, config: &GraphicsConfig) -> Result<Self> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);
        let buffer_count = config.buffer_count;

        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug_iface: Option<ID3D12Debug> = None;
                if D3D12GetDebugInterface(&mut debug_iface).is_ok() {
                    debug_iface.unwrap().EnableDebugLayer();
                    debug!("D3D12 debug layer enabled");
                } else {
                    warn!("Failed to enable D3D12 debug layer");
                }
            }

            #[cfg(debug_assertions)]
            let factory: IDXGIFactory4 = CreateDXGIFactory2(DXGI_CREATE_FACTORY_DEBUG)
                .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create DXGI factory: {:?}", e)))?;
            #[cfg(not(debug_assertions))]
            let factory: IDXGIFactory4 = CreateDXGIFactory2(DXGI_CREATE_FACTORY_FLAGS(0))
                .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create DXGI factory: {:?}", e)))?;

            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device)
                .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create D3D12 device: {:?}", e)))?;
            let device = device.unwrap();

            #[cfg(debug_assertions)]
            debug!("D3D12 device created");

            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let command_queue: ID3D12CommandQueue = device
                .CreateCommandQueue(&queue_desc)
                .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create command queue: {:?}", e)))?;

            // 探测撕裂支持（可变刷新率显示器）
            let tearing_supported = {
                let mut allowed = BOOL::default();
                factory
                    .cast::<IDXGIFactory5>()
                    .and_then(|f5| {
                        f5.CheckFeatureSupport(
                            DXGI_FEATURE_PRESENT_ALLOW_TEARING,
                            &mut allowed as *mut BOOL as *mut core::ffi::c_void,
                            std::mem::size_of::<BOOL>() as u32,
                        )
                    })
                    .map(|_| allowed.as_bool())
                    .unwrap_or(false)
            };

            let window_handle = window
                .window_handle()
                .map_err(|e| GraphicsError::SwapchainError(format!("Failed to get window handle: {:?}", e)))?;
            let hwnd = match window_handle.as_raw() {
                RawWindowHandle::Win32(win32_handle) => {
                    HWND(win32_handle.hwnd.get() as *mut core::ffi::c_void)
                }
                _ => {
                    return Err(GraphicsError::SwapchainError(
                        "Expected Win32 window handle".to_string(),
                    )
                    .into())
                }
            };

            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    ..Default::default()
                },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: buffer_count,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                Flags: if tearing_supported {
                    DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING.0 as u32
                } else {
                    0
                },
                ..Default::default()
            };

            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)
                .map_err(|e| GraphicsError::SwapchainError(format!("Failed to create swap chain: {:?}", e)))?;
            let swap_chain: IDXGISwapChain3 = swap_chain
                .cast()
                .map_err(|e| GraphicsError::SwapchainError(format!("Failed to cast swap chain: {:?}", e)))?;

            info!(width, height, buffers = buffer_count, tearing = tearing_supported, "Swap chain created");

            let mut back_buffers = Vec::with_capacity(buffer_count as usize);
            for i in 0..buffer_count {
                let buffer: ID3D12Resource = swap_chain.GetBuffer(i).map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to get swap chain buffer {}: {:?}", i, e))
                })?;
                back_buffers.push(buffer);
            }

            let mut allocators = Vec::with_capacity(buffer_count as usize);
            for i in 0..buffer_count {
                let allocator: ID3D12CommandAllocator = device
                    .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                    .map_err(|e| {
                        GraphicsError::DeviceCreation(format!(
                            "Failed to create command allocator {}: {:?}",
                            i, e
                        ))
                    })?;
                allocators.push(allocator);
            }

            let rtv_heap = DescriptorHeap::new(
                &device,
                D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                64,
                false,
            )?;
            let dsv_heap = DescriptorHeap::new(
                &device,
                D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                16,
                false,
            )?;
            let shader_heap = DescriptorHeap::new(
                &device,
                D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                config.descriptor_capacity,
                true,
            )?;

            let timeline = FrameTimeline::new(buffer_count);
            let fence: ID3D12Fence = device
                .CreateFence(timeline.initial_fence_value(), D3D12_FENCE_FLAG_NONE)
                .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create fence: {:?}", e)))?;
            let fence_event = CreateEventA(None, false, false, None)
                .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create fence event: {:?}", e)))?;

            #[cfg(debug_assertions)]
            debug!("Synchronization objects created");

            info!("Graphics device initialization complete");

            Ok(Self {
                device,
                command_queue,
                swap_chain,
                back_buffers,
                fence,
                fence_event,
                timeline,
                allocators,
                destroy_queue: DelayDestroyQueue::new(),
                rtv_heap,
                dsv_heap,
                shader_heap,
                buffer_count,
                width,
                height,
                tearing_supported,
            })
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    /// 当前帧的命令分配器
    pub fn current_allocator(&self) -> &ID3D12CommandAllocator {
        &self.allocators[self.timeline.execute_index()]
    }

    /// 当前帧计数（下一次提交的 fence 值）
    pub fn current_frame(&self) -> FenceValue {
        self.timeline.current_signal()
    }

    /// 开始一帧：确认当前槽位的分配器不再被 GPU 引用后重置
    pub fn begin(&mut self) -> Result<()> {
        if let Some(slot_fence) = self.timeline.slot_fence() {
            self.wait_fence(slot_fence)?;
        }

        unsafe {
            self.current_allocator().Reset().map_err(|e| {
                GraphicsError::CommandExecution(format!("Failed to reset command allocator: {:?}", e))
            })?;
        }
        Ok(())
    }

    /// 提交后呈现：signal 帧计数，必要时阻塞到飞行帧数回到上限内，
    /// 然后回收到期的延迟销毁条目
    pub fn present(&mut self, vsync: bool) -> Result<()> {
        unsafe {
            let (interval, flags) = if vsync {
                (1, DXGI_PRESENT(0))
            } else if self.tearing_supported {
                (0, DXGI_PRESENT_ALLOW_TEARING)
            } else {
                (0, DXGI_PRESENT(0))
            };
            self.swap_chain
                .Present(interval, flags)
                .ok()
                .map_err(|e| GraphicsError::SwapchainError(format!("Present failed: {:?}", e)))?;

            let completed = self.fence.GetCompletedValue();
            let sync = self.timeline.on_present(completed);

            self.command_queue
                .Signal(&self.fence, sync.signal.value())
                .map_err(|e| GraphicsError::CommandExecution(format!("Fence signal failed: {:?}", e)))?;

            #[cfg(debug_assertions)]
            tracing::trace!(
                signal = sync.signal.value(),
                completed,
                waiting = sync.wait_target.is_some(),
                "Frame presented"
            );

            if let Some(target) = sync.wait_target {
                self.wait_fence(target)?;
            }

            let reclaimed = self.destroy_queue.reclaim(self.fence.GetCompletedValue());
            if reclaimed > 0 {
                #[cfg(debug_assertions)]
                tracing::trace!(reclaimed, "Delayed resources reclaimed");
            }
        }
        Ok(())
    }

    /// 阻塞直到 GPU 执行完所有已提交的工作
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        let idle = self.timeline.on_idle();
        unsafe {
            self.command_queue
                .Signal(&self.fence, idle.value())
                .map_err(|e| GraphicsError::CommandExecution(format!("Fence signal failed: {:?}", e)))?;
        }
        self.wait_fence(idle)?;
        self.destroy_queue.reclaim(idle.value());
        Ok(())
    }

    fn wait_fence(&self, target: FenceValue) -> Result<()> {
        unsafe {
            if self.fence.GetCompletedValue() < target.value() {
                self.fence
                    .SetEventOnCompletion(target.value(), self.fence_event)
                    .map_err(|e| {
                        GraphicsError::CommandExecution(format!("SetEventOnCompletion failed: {:?}", e))
                    })?;
                WaitForSingleObject(self.fence_event, INFINITE);
            }
        }
        Ok(())
    }

    /// 把资源交给延迟销毁队列，GPU 跑完当前帧后才真正释放
    pub fn destroy_resource(&mut self, resource: ID3D12Resource) {
        self.destroy_queue
            .retire(resource, self.timeline.current_signal().value());
    }

    /// 重建交换链缓冲
    ///
    /// 完整排空 GPU，释放全部后台缓冲引用（每个恰好一次），
    /// 再调整交换链尺寸并重新取回缓冲。RTV 每帧经临时槽位重建，
    /// 这里不需要处理。
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return Ok(());
        }

        #[cfg(debug_assertions)]
        debug!(width, height, "Resizing swap chain");

        self.wait_for_gpu()?;

        // 排空后飞行帧数为零，延迟队列必须清空
        self.destroy_queue.flush_all();
        self.back_buffers.clear();

        unsafe {
            self.swap_chain
                .ResizeBuffers(
                    self.buffer_count,
                    width,
                    height,
                    BACK_BUFFER_FORMAT,
                    DXGI_SWAP_CHAIN_FLAG(if self.tearing_supported {
                        DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING.0
                    } else {
                        0
                    }),
                )
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to resize swap chain: {:?}", e))
                })?;

            for i in 0..self.buffer_count {
                let buffer: ID3D12Resource = self.swap_chain.GetBuffer(i).map_err(|e| {
                    GraphicsError::SwapchainError(format!(
                        "Failed to get swap chain buffer {} after resize: {:?}",
                        i, e
                    ))
                })?;
                self.back_buffers.push(buffer);
            }
        }

        self.width = width;
        self.height = height;

        info!(width, height, "Swap chain resized");
        Ok(())
    }

    /// 当前后台缓冲
    pub fn back_buffer(&self) -> &ID3D12Resource {
        let index = unsafe { self.swap_chain.GetCurrentBackBufferIndex() } as usize;
        &self.back_buffers[index]
    }

    /// 为当前后台缓冲在 RTV 堆上分配一个临时视图
    pub fn back_buffer_rtv(&mut self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let index = unsafe { self.swap_chain.GetCurrentBackBufferIndex() } as usize;
        let (handle, _) = self.rtv_heap.allocate_temp();
        unsafe {
            self.device
                .CreateRenderTargetView(&self.back_buffers[index], None, handle);
        }
        handle
    }

    /// 在默认堆上创建一块缓冲
    pub fn create_buffer(
        &self,
        size: u64,
        initial_state: D3D12_RESOURCE_STATES,
    ) -> Result<ID3D12Resource> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: size,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            self.device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &desc,
                    initial_state,
                    None,
                    &mut resource,
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create buffer ({} bytes): {:?}",
                        size, e
                    ))
                })?;
            Ok(resource.unwrap())
        }
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        // 关闭前排空 GPU 并无条件清空延迟销毁队列
        if let Err(e) = self.wait_for_gpu() {
            warn!("Failed to drain GPU on shutdown: {}", e);
        }
        let flushed = self.destroy_queue.flush_all();
        if flushed > 0 {
            debug!(flushed, "Pending resources released at shutdown");
        }
        unsafe {
            let _ = CloseHandle(self.fence_event);
        }
    }
}
