//! 二维纹理封装
//!
//! 资源状态由纹理自身记录；状态迁移屏障由调用方显式请求，
//! 上下文不做任何推断。

use std::mem::ManuallyDrop;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};

pub struct Texture2D {
    pub resource: ID3D12Resource,
    pub width: u32,
    pub height: u32,
    pub format: DXGI_FORMAT,
    /// 当前资源状态
    pub state: D3D12_RESOURCE_STATES,
}

impl Texture2D {
    /// 在默认堆上创建纹理
    pub fn new(
        device: &ID3D12Device,
        width: u32,
        height: u32,
        format: DXGI_FORMAT,
        initial_state: D3D12_RESOURCE_STATES,
    ) -> Result<Self> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: format,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            ..Default::default()
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            device
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
                        "Failed to create texture {}x{}: {:?}",
                        width, height, e
                    ))
                })?;

            Ok(Self {
                resource: resource.unwrap(),
                width,
                height,
                format,
                state: initial_state,
            })
        }
    }

    /// 迁移到目标状态，返回需要录制的屏障
    ///
    /// 已处于目标状态时返回 `None`。
    pub fn transition(&mut self, target: D3D12_RESOURCE_STATES) -> Option<D3D12_RESOURCE_BARRIER> {
        if self.state == target {
            return None;
        }
        let barrier = transition_barrier(&self.resource, self.state, target);
        self.state = target;
        Some(barrier)
    }

    pub fn desc(&self) -> D3D12_RESOURCE_DESC {
        unsafe { self.resource.GetDesc() }
    }
}

/// 构造一条状态迁移屏障
pub fn transition_barrier(
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: ManuallyDrop::new(Some(resource.clone())),
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    }
}
