//! 网格封装
//!
//! 每个输入槽一条顶点通道，索引统一 32 位。缓冲建在默认堆上，
//! 数据经环形上传缓冲拷入；容量足够时复用旧缓冲，否则旧缓冲
//! 交给延迟销毁队列。

use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

/// 一条顶点通道（一个输入槽）
pub struct VertexChannel {
    pub resource: ID3D12Resource,
    pub stride: u32,
    /// 缓冲字节容量
    pub capacity: u64,
}

impl VertexChannel {
    pub fn view(&self, used_bytes: u64) -> D3D12_VERTEX_BUFFER_VIEW {
        D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { self.resource.GetGPUVirtualAddress() },
            SizeInBytes: used_bytes as u32,
            StrideInBytes: self.stride,
        }
    }
}

#[derive(Default)]
pub struct Mesh {
    /// 按输入槽排列的顶点通道
    pub channels: Vec<Option<VertexChannel>>,
    /// 各通道当前有效字节数
    pub channel_used: Vec<u64>,
    pub index_buffer: Option<ID3D12Resource>,
    pub index_capacity: u64,
    pub index_count: u32,
    pub vertex_count: u32,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定槽位的顶点缓冲视图
    pub fn vertex_view(&self, slot: usize) -> Option<D3D12_VERTEX_BUFFER_VIEW> {
        let channel = self.channels.get(slot)?.as_ref()?;
        let used = self.channel_used.get(slot).copied().unwrap_or(0);
        Some(channel.view(used))
    }

    pub fn index_view(&self) -> Option<D3D12_INDEX_BUFFER_VIEW> {
        let buffer = self.index_buffer.as_ref()?;
        Some(D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: unsafe { buffer.GetGPUVirtualAddress() },
            SizeInBytes: (self.index_count as u64 * 4) as u32,
            Format: DXGI_FORMAT_R32_UINT,
        })
    }

    /// 取出可复用的顶点通道缓冲；容量不足时返回旧资源供退役
    pub fn take_channel_if_small(&mut self, slot: usize, required: u64) -> Option<ID3D12Resource> {
        if slot >= self.channels.len() {
            self.channels.resize_with(slot + 1, || None);
            self.channel_used.resize(slot + 1, 0);
        }
        match &self.channels[slot] {
            Some(channel) if channel.capacity < required => {
                self.channels[slot].take().map(|c| c.resource)
            }
            _ => None,
        }
    }

    /// 取出容量不足的索引缓冲供退役
    pub fn take_index_if_small(&mut self, required: u64) -> Option<ID3D12Resource> {
        if self.index_buffer.is_some() && self.index_capacity < required {
            self.index_capacity = 0;
            self.index_buffer.take()
        } else {
            None
        }
    }
}
