//! 描述符堆封装
//!
//! 把 `renderer::descriptor::DescriptorRing` 的游标运算绑定到一个
//! 真实的 `ID3D12DescriptorHeap` 上，分配结果直接换算成 D3D12 句柄。

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::DescriptorRing;

pub struct DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    ring: DescriptorRing,
    shader_visible: bool,
}

impl DescriptorHeap {
    /// 创建描述符堆并初始化游标
    ///
    /// # 参数
    ///
    /// * `kind` - 堆类型（RTV / DSV / CBV_SRV_UAV）
    /// * `capacity` - 描述符数量
    /// * `shader_visible` - 是否着色器可见（仅 CBV_SRV_UAV 堆）
    pub fn new(
        device: &ID3D12Device,
        kind: D3D12_DESCRIPTOR_HEAP_TYPE,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Self> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: kind,
            NumDescriptors: capacity,
            Flags: if shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            },
            NodeMask: 0,
        };

        unsafe {
            let heap: ID3D12DescriptorHeap = device.CreateDescriptorHeap(&desc).map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create descriptor heap: {:?}", e))
            })?;

            let increment = device.GetDescriptorHandleIncrementSize(kind);
            let cpu_start = heap.GetCPUDescriptorHandleForHeapStart().ptr;
            let gpu_start = if shader_visible {
                Some(heap.GetGPUDescriptorHandleForHeapStart().ptr)
            } else {
                None
            };

            Ok(Self {
                heap,
                ring: DescriptorRing::new(capacity, increment, cpu_start, gpu_start),
                shader_visible,
            })
        }
    }

    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    pub fn is_shader_visible(&self) -> bool {
        self.shader_visible
    }

    /// 分配一个临时槽位
    pub fn allocate_temp(
        &mut self,
    ) -> (D3D12_CPU_DESCRIPTOR_HANDLE, Option<D3D12_GPU_DESCRIPTOR_HANDLE>) {
        let (cpu, gpu) = self.ring.allocate_temp();
        (
            D3D12_CPU_DESCRIPTOR_HANDLE { ptr: cpu.ptr },
            gpu.map(|g| D3D12_GPU_DESCRIPTOR_HANDLE { ptr: g.ptr }),
        )
    }
}
