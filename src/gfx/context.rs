//! 图形上下文
//!
//! 单条图形命令列表上的录制接口。跟踪当前根签名、渲染状态描述与
//! 输入布局，在绘制时惰性解析出已编译的 PSO。状态迁移屏障全部由
//! 调用方显式请求，上下文不做推断。
//!
//! 上传路径也在这里：纹理走 footprint 子资源拷贝，网格顶点/索引
//! 经环形上传缓冲拷入默认堆缓冲。

use tracing::warn;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::device::GraphicsDevice;
use crate::gfx::mesh::VertexChannel;
use crate::gfx::pipeline::{PsoDesc, RootSignature};
use crate::gfx::registry::ResourceRegistry;
use crate::gfx::texture;
use crate::gfx::upload::RingUploadBuffer;
use crate::renderer::upload::{MeshChannel, PixelFormat, UploadRequest};
use crate::resources::{InputLayoutHandle, MeshHandle, PipelineHandle, TextureHandle};

/// 放置拷贝要求的行距对齐
const TEXTURE_ROW_ALIGNMENT: u64 = D3D12_TEXTURE_DATA_PITCH_ALIGNMENT as u64;
/// 放置拷贝要求的子资源起始对齐
const TEXTURE_PLACEMENT_ALIGNMENT: u64 = D3D12_TEXTURE_DATA_PLACEMENT_ALIGNMENT as u64;

pub struct GraphicsContext {
    list: ID3D12GraphicsCommandList,
    root_signature: Option<RootSignature>,
    pipeline: Option<PipelineHandle>,
    pso_desc: PsoDesc,
    input_layout: Option<InputLayoutHandle>,
    /// 后台缓冲当前是否处于渲染目标状态
    screen_in_render_state: bool,
}

impl GraphicsContext {
    pub fn new(device: &GraphicsDevice) -> Result<Self> {
        unsafe {
            let list: ID3D12GraphicsCommandList = device
                .device
                .CreateCommandList(
                    0,
                    D3D12_COMMAND_LIST_TYPE_DIRECT,
                    device.current_allocator(),
                    None,
                )
                .map_err(|e| {
                    GraphicsError::DeviceCreation(format!("Failed to create command list: {:?}", e))
                })?;
            // 命令列表创建后处于录制状态，关闭等待首帧
            list.Close().map_err(|e| {
                GraphicsError::CommandExecution(format!("Failed to close command list: {:?}", e))
            })?;

            Ok(Self {
                list,
                root_signature: None,
                pipeline: None,
                pso_desc: PsoDesc::default(),
                input_layout: None,
                screen_in_render_state: false,
            })
        }
    }

    /// 开始录制：用当前帧的分配器重置命令列表，清掉上一帧的绑定状态
    pub fn begin(&mut self, device: &GraphicsDevice) -> Result<()> {
        unsafe {
            self.list
                .Reset(device.current_allocator(), None)
                .map_err(|e| {
                    GraphicsError::CommandExecution(format!("Failed to reset command list: {:?}", e))
                })?;
        }
        self.root_signature = None;
        self.pipeline = None;
        self.input_layout = None;
        self.pso_desc = PsoDesc::default();
        self.screen_in_render_state = false;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        unsafe {
            self.list.Close().map_err(|e| {
                GraphicsError::CommandExecution(format!("Failed to close command list: {:?}", e))
            })?;
        }
        Ok(())
    }

    /// 提交录制好的命令列表
    pub fn execute(&self, device: &GraphicsDevice) {
        unsafe {
            let lists = [Some(self.list.clone().into())];
            device.command_queue.ExecuteCommandLists(&lists);
        }
    }

    /// 绑定着色器可见描述符堆
    pub fn bind_shader_heap(&self, device: &GraphicsDevice) {
        unsafe {
            self.list
                .SetDescriptorHeaps(&[Some(device.shader_heap.heap().clone())]);
        }
    }

    pub fn set_root_signature(&mut self, root_signature: &RootSignature) {
        unsafe {
            self.list.SetGraphicsRootSignature(root_signature.raw());
        }
        self.root_signature = Some(root_signature.clone());
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipeline = Some(pipeline);
    }

    pub fn set_pso_desc(&mut self, desc: PsoDesc) {
        self.pso_desc = desc;
    }

    pub fn set_input_layout(&mut self, layout: InputLayoutHandle) {
        self.input_layout = Some(layout);
    }

    /// 后台缓冲 Present -> RenderTarget
    pub fn screen_begin_render(&mut self, device: &GraphicsDevice) {
        let barrier = texture::transition_barrier(
            device.back_buffer(),
            D3D12_RESOURCE_STATE_PRESENT,
            D3D12_RESOURCE_STATE_RENDER_TARGET,
        );
        unsafe { self.list.ResourceBarrier(&[barrier]) };
        self.screen_in_render_state = true;
    }

    /// 后台缓冲 RenderTarget -> Present
    pub fn screen_end_render(&mut self, device: &GraphicsDevice) {
        debug_assert!(self.screen_in_render_state);
        let barrier = texture::transition_barrier(
            device.back_buffer(),
            D3D12_RESOURCE_STATE_RENDER_TARGET,
            D3D12_RESOURCE_STATE_PRESENT,
        );
        unsafe { self.list.ResourceBarrier(&[barrier]) };
        self.screen_in_render_state = false;
    }

    /// 绑定后台缓冲为渲染目标并清屏
    pub fn set_render_target_screen(
        &self,
        device: &mut GraphicsDevice,
        clear_color: Option<[f32; 4]>,
    ) {
        let rtv = device.back_buffer_rtv();
        unsafe {
            self.list.OMSetRenderTargets(1, Some(&rtv), false, None);
            if let Some(color) = clear_color {
                self.list.ClearRenderTargetView(rtv, &color, None);
            }
        }
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        unsafe {
            self.list.RSSetViewports(&[viewport]);
            self.list.RSSetScissorRects(&[RECT {
                left: 0,
                top: 0,
                right: width as i32,
                bottom: height as i32,
            }]);
        }
    }

    pub fn set_scissor(&self, rect: RECT) {
        unsafe {
            self.list.RSSetScissorRects(&[rect]);
        }
    }

    /// 按寄存器槽绑定根 CBV
    pub fn set_cbv(&self, slot: u32, gpu_address: u64) -> Result<()> {
        let root_signature = self.require_root_signature()?;
        let index = root_signature.cbv_index(slot).ok_or_else(|| {
            GraphicsError::CommandExecution(format!("No CBV parameter for register b{}", slot))
        })?;
        unsafe {
            self.list
                .SetGraphicsRootConstantBufferView(index, gpu_address);
        }
        Ok(())
    }

    /// 按寄存器槽绑定纹理 SRV（经临时描述符表）
    pub fn set_srv(
        &self,
        device: &mut GraphicsDevice,
        registry: &ResourceRegistry,
        slot: u32,
        handle: TextureHandle,
    ) -> Result<()> {
        let root_signature = self.require_root_signature()?;
        let index = root_signature.srv_index(slot).ok_or_else(|| {
            GraphicsError::CommandExecution(format!("No SRV parameter for register t{}", slot))
        })?;

        let texture = registry.texture(handle)?;
        debug_assert_eq!(texture.state, D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE);

        let srv_desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: texture.format,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                    PlaneSlice: 0,
                    ResourceMinLODClamp: 0.0,
                },
            },
        };

        let (cpu, gpu) = device.shader_heap.allocate_temp();
        let gpu = gpu.ok_or_else(|| {
            GraphicsError::CommandExecution("Shader heap is not shader visible".to_string())
        })?;
        unsafe {
            device
                .device
                .CreateShaderResourceView(&texture.resource, Some(&srv_desc), cpu);
            self.list.SetGraphicsRootDescriptorTable(index, gpu);
        }
        Ok(())
    }

    /// 绑定网格的顶点/索引缓冲
    pub fn set_mesh(&self, registry: &ResourceRegistry, handle: MeshHandle) -> Result<()> {
        let mesh = registry.mesh(handle)?;
        unsafe {
            self.list
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            for slot in 0..mesh.channels.len() {
                if let Some(view) = mesh.vertex_view(slot) {
                    self.list.IASetVertexBuffers(slot as u32, Some(&[view]));
                }
            }
            if let Some(view) = mesh.index_view() {
                self.list.IASetIndexBuffer(Some(&view));
            }
        }
        Ok(())
    }

    /// 索引绘制；此刻才解析（必要时编译）PSO
    pub fn draw_indexed(
        &mut self,
        device: &GraphicsDevice,
        registry: &mut ResourceRegistry,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<()> {
        let root_signature = self.require_root_signature()?.clone();
        let pipeline = self.pipeline.ok_or_else(|| {
            GraphicsError::CommandExecution("draw_indexed without a pipeline bound".to_string())
        })?;
        let layout = self.input_layout.ok_or_else(|| {
            GraphicsError::CommandExecution("draw_indexed without an input layout bound".to_string())
        })?;

        let (pso_object, layout_desc) = registry.pipeline_and_layout(pipeline, layout)?;
        let pso = pso_object.state(
            &device.device,
            &self.pso_desc,
            &root_signature,
            layout,
            layout_desc,
        )?;

        unsafe {
            self.list.SetPipelineState(&pso);
            self.list
                .DrawIndexedInstanced(index_count, 1, first_index, base_vertex, 0);
        }
        Ok(())
    }

    /// 执行一条上传请求
    pub fn process_upload(
        &self,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        ring: &mut RingUploadBuffer,
        request: &UploadRequest,
    ) -> Result<()> {
        if let Some(handle) = request.texture {
            self.upload_texture(registry, ring, handle, request)?;
        } else if let Some((handle, channel)) = request.mesh {
            self.upload_mesh(device, registry, ring, handle, channel, &request.data)?;
        } else {
            warn!("Upload request without a destination, dropped");
        }
        Ok(())
    }

    /// footprint 子资源拷贝上传纹理（支持子区域）
    fn upload_texture(
        &self,
        registry: &mut ResourceRegistry,
        ring: &mut RingUploadBuffer,
        handle: TextureHandle,
        request: &UploadRequest,
    ) -> Result<()> {
        let texture = registry.texture_mut(handle)?;

        let row_pitch = align_up(request.row_stride as u64, TEXTURE_ROW_ALIGNMENT);
        let staging_size = row_pitch * request.height as u64;

        // 环形缓冲按 256 对齐；放置拷贝要求 512，预留余量后手动对齐
        let (raw_offset, raw_ptr) =
            ring.reserve(staging_size + TEXTURE_PLACEMENT_ALIGNMENT)?;
        let offset = align_up(raw_offset, TEXTURE_PLACEMENT_ALIGNMENT);
        let ptr = unsafe { raw_ptr.add((offset - raw_offset) as usize) };

        // 行重排：紧密的源行 -> 对齐的中转行
        let src_stride = request.row_stride as usize;
        for row in 0..request.height as usize {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    request.data.as_ptr().add(row * src_stride),
                    ptr.add(row * row_pitch as usize),
                    src_stride,
                );
            }
        }

        if let Some(barrier) = texture.transition(D3D12_RESOURCE_STATE_COPY_DEST) {
            unsafe { self.list.ResourceBarrier(&[barrier]) };
        }

        // 拷贝位置里的资源指针用弱拷贝，避免每次上传泄漏一次引用计数
        let dst = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&texture.resource) },
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: 0,
            },
        };
        let src = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(ring.resource()) },
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                    Offset: offset,
                    Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                        Format: pixel_format_to_dxgi(request.format),
                        Width: request.width,
                        Height: request.height,
                        Depth: 1,
                        RowPitch: row_pitch as u32,
                    },
                },
            },
        };

        let (dst_x, dst_y) = request.origin.unwrap_or((0, 0));
        unsafe {
            self.list.CopyTextureRegion(&dst, dst_x, dst_y, 0, &src, None);
        }

        if let Some(barrier) = texture.transition(D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE) {
            unsafe { self.list.ResourceBarrier(&[barrier]) };
        }
        Ok(())
    }

    /// 网格数据经环形缓冲拷入默认堆；容量不足时旧缓冲退役重建
    fn upload_mesh(
        &self,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        ring: &mut RingUploadBuffer,
        handle: MeshHandle,
        channel: MeshChannel,
        data: &[u8],
    ) -> Result<()> {
        let size = data.len() as u64;
        let src_offset = ring.upload(data)?;
        let mesh = registry.mesh_mut(handle)?;

        match channel {
            MeshChannel::Vertices { slot, stride } => {
                if let Some(old) = mesh.take_channel_if_small(slot as usize, size) {
                    device.destroy_resource(old);
                }

                let slot = slot as usize;
                let fresh = mesh.channels[slot].is_none();
                if fresh {
                    let resource = device.create_buffer(size, D3D12_RESOURCE_STATE_COPY_DEST)?;
                    mesh.channels[slot] = Some(VertexChannel {
                        resource,
                        stride,
                        capacity: size,
                    });
                }
                let resource = &mesh.channels[slot].as_ref().unwrap().resource;

                unsafe {
                    if !fresh {
                        self.list.ResourceBarrier(&[texture::transition_barrier(
                            resource,
                            D3D12_RESOURCE_STATE_GENERIC_READ,
                            D3D12_RESOURCE_STATE_COPY_DEST,
                        )]);
                    }
                    self.list
                        .CopyBufferRegion(resource, 0, ring.resource(), src_offset, size);
                    self.list.ResourceBarrier(&[texture::transition_barrier(
                        resource,
                        D3D12_RESOURCE_STATE_COPY_DEST,
                        D3D12_RESOURCE_STATE_GENERIC_READ,
                    )]);
                }

                mesh.channel_used[slot] = size;
                mesh.vertex_count = (size / stride.max(1) as u64) as u32;
            }
            MeshChannel::Indices => {
                if let Some(old) = mesh.take_index_if_small(size) {
                    device.destroy_resource(old);
                }

                let fresh = mesh.index_buffer.is_none();
                if fresh {
                    let resource = device.create_buffer(size, D3D12_RESOURCE_STATE_COPY_DEST)?;
                    mesh.index_buffer = Some(resource);
                    mesh.index_capacity = size;
                }
                let resource = mesh.index_buffer.as_ref().unwrap();

                unsafe {
                    if !fresh {
                        self.list.ResourceBarrier(&[texture::transition_barrier(
                            resource,
                            D3D12_RESOURCE_STATE_GENERIC_READ,
                            D3D12_RESOURCE_STATE_COPY_DEST,
                        )]);
                    }
                    self.list
                        .CopyBufferRegion(resource, 0, ring.resource(), src_offset, size);
                    self.list.ResourceBarrier(&[texture::transition_barrier(
                        resource,
                        D3D12_RESOURCE_STATE_COPY_DEST,
                        D3D12_RESOURCE_STATE_GENERIC_READ,
                    )]);
                }

                mesh.index_count = (size / 4) as u32;
            }
        }
        Ok(())
    }

    fn require_root_signature(&self) -> Result<&RootSignature> {
        self.root_signature.as_ref().ok_or_else(|| {
            GraphicsError::CommandExecution("No root signature bound".to_string()).into()
        })
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

fn pixel_format_to_dxgi(format: PixelFormat) -> DXGI_FORMAT {
    match format {
        PixelFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        PixelFormat::R8Unorm => DXGI_FORMAT_R8_UNORM,
    }
}
