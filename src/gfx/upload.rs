//! 环形上传缓冲
//!
//! 一块常驻映射的上传堆缓冲，配合 `renderer::ring::RingAllocator`
//! 做 256 字节对齐的 bump 分配。每帧的瞬态数据（GUI 顶点/索引、
//! 纹理中转行）写进这里，再由命令列表拷贝到目标资源。
//!
//! 回绕不检查占用；容量余量在配置校验阶段保证（见 `core::config`）。

use tracing::debug;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::RingAllocator;

pub struct RingUploadBuffer {
    resource: ID3D12Resource,
    mapped: *mut u8,
    gpu_base: u64,
    allocator: RingAllocator,
}

// 映射指针只在提交线程解引用
unsafe impl Send for RingUploadBuffer {}

impl RingUploadBuffer {
    /// 创建并常驻映射一块上传堆缓冲
    pub fn new(device: &ID3D12Device, capacity: u64) -> Result<Self> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_UPLOAD,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: capacity,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &resource_desc,
                    D3D12_RESOURCE_STATE_GENERIC_READ,
                    None,
                    &mut resource,
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create upload ring buffer: {:?}",
                        e
                    ))
                })?;
            let resource = resource.unwrap();

            let mut mapped = std::ptr::null_mut();
            resource.Map(0, None, Some(&mut mapped)).map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to map upload ring buffer: {:?}", e))
            })?;

            let gpu_base = resource.GetGPUVirtualAddress();

            debug!(capacity, "Upload ring buffer created");

            Ok(Self {
                resource,
                mapped: mapped as *mut u8,
                gpu_base,
                allocator: RingAllocator::new(capacity),
            })
        }
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    pub fn capacity(&self) -> u64 {
        self.allocator.capacity()
    }

    /// 写入一段字节，返回缓冲内偏移
    ///
    /// 超过整个缓冲容量的单次写入返回 `CapacityExceeded`。
    pub fn upload(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.allocator.allocate(data.len() as u64)?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.mapped.add(offset as usize),
                data.len(),
            );
        }
        Ok(offset)
    }

    /// 预留一段空间不写入，返回偏移与可写指针（纹理行重排用）
    pub fn reserve(&mut self, size: u64) -> Result<(u64, *mut u8)> {
        let offset = self.allocator.allocate(size)?;
        let ptr = unsafe { self.mapped.add(offset as usize) };
        Ok((offset, ptr))
    }

    /// 偏移对应的 GPU 虚拟地址
    pub fn gpu_address(&self, offset: u64) -> u64 {
        self.gpu_base + offset
    }
}

impl Drop for RingUploadBuffer {
    fn drop(&mut self) {
        unsafe {
            self.resource.Unmap(0, None);
        }
    }
}
