//! GUI 渲染器
//!
//! 把 egui 的曲面细分输出录制成 D3D12 绘制命令：所有图元的顶点与
//! 索引拼进一对网格缓冲（经环形上传缓冲拷入），逐图元设置裁剪
//! 矩形与字体/图像纹理的 SRV，再以顶点偏移 + 起始索引发出索引
//! 绘制。屏幕空间到 NDC 的变换是一个由显示区域（点单位）构成的
//! 二维正交矩阵，放在 b0 的根 CBV 里。
//!
//! 顶点布局与 egui 一致：位置 float2、UV float2、颜色 rgba8，
//! 共 20 字节一个顶点。

use std::collections::HashMap;

use tracing::{debug, error};
use windows::Win32::Foundation::RECT;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::pipeline::{
    BlendMode, CullMode, InputElement, InputLayoutDesc, PsoDesc, RootParamKind, RootSignature,
    Semantic, VertexFormat,
};
use crate::gfx::{GraphicsContext, GraphicsDevice, ResourceRegistry, RingUploadBuffer, Texture2D};
use crate::renderer::upload::{MeshChannel, PixelFormat, UploadQueue, UploadRequest};
use crate::resources::{InputLayoutHandle, MeshHandle, PipelineHandle, TextureHandle};

use windows::Win32::Graphics::Direct3D12::D3D12_RESOURCE_STATE_COPY_DEST;
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_R8G8B8A8_UNORM;

/// egui 顶点字节跨度（float2 位置 + float2 UV + rgba8 颜色）
const GUI_VERTEX_STRIDE: u32 = 20;

/// 一个待绘制的图元区段
struct DrawCall {
    clip: egui::Rect,
    texture: TextureHandle,
    index_count: u32,
    first_index: u32,
    base_vertex: i32,
}

pub struct GuiRenderer {
    pipeline: PipelineHandle,
    input_layout: InputLayoutHandle,
    mesh: MeshHandle,
    root_signature: Option<RootSignature>,
    /// egui 纹理 ID 到注册表句柄的映射
    textures: HashMap<egui::TextureId, TextureHandle>,
}

impl GuiRenderer {
    /// 从注册表解析 GUI 管线并注册顶点布局
    ///
    /// 要求资源清单里存在名为 `gui` 的管线状态。
    pub fn new(registry: &mut ResourceRegistry) -> Result<Self> {
        let pipeline = registry.pipeline_by_name("gui").ok_or_else(|| {
            GraphicsError::ResourceCreation(
                "Resource manifest does not define a 'gui' pipeline state".to_string(),
            )
        })?;

        let input_layout = registry.register_input_layout(InputLayoutDesc::new(vec![
            InputElement {
                semantic: Semantic::Position,
                semantic_index: 0,
                format: VertexFormat::Float2,
                slot: 0,
                offset: 0,
            },
            InputElement {
                semantic: Semantic::TexCoord,
                semantic_index: 0,
                format: VertexFormat::Float2,
                slot: 0,
                offset: 8,
            },
            InputElement {
                semantic: Semantic::Color,
                semantic_index: 0,
                format: VertexFormat::Rgba8,
                slot: 0,
                offset: 16,
            },
        ]));

        let mesh = registry.create_mesh();

        Ok(Self {
            pipeline,
            input_layout,
            mesh,
            root_signature: None,
            textures: HashMap::new(),
        })
    }

    /// 把 egui 纹理增量转换成上传请求
    ///
    /// 整图增量（重新）创建纹理；子区域增量（字形缓存增长）带
    /// 目标原点入队。旧纹理走延迟销毁。
    pub fn apply_textures_delta(
        &mut self,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        uploads: &UploadQueue,
        delta: &egui::TexturesDelta,
    ) -> Result<()> {
        for (id, image_delta) in &delta.set {
            let (width, height, data) = convert_image(&image_delta.image);

            match image_delta.pos {
                None => {
                    // 整图：尺寸变化或首次出现都重建
                    if let Some(&existing) = self.textures.get(id) {
                        let stale = registry
                            .texture(existing)
                            .map(|t| t.width != width || t.height != height)
                            .unwrap_or(true);
                        if stale {
                            if let Some(texture) = registry.remove_texture(existing) {
                                device.destroy_resource(texture.resource);
                            }
                            self.textures.remove(id);
                        }
                    }

                    let handle = match self.textures.get(id) {
                        Some(&handle) => handle,
                        None => {
                            let texture = Texture2D::new(
                                &device.device,
                                width,
                                height,
                                DXGI_FORMAT_R8G8B8A8_UNORM,
                                D3D12_RESOURCE_STATE_COPY_DEST,
                            )?;
                            let handle = registry.register_texture(texture);
                            self.textures.insert(*id, handle);
                            debug!(?id, width, height, "GUI texture created");
                            handle
                        }
                    };

                    uploads.enqueue(UploadRequest::texture(
                        handle,
                        data,
                        PixelFormat::Rgba8Unorm,
                        width,
                        height,
                    ));
                }
                Some([x, y]) => {
                    let handle = *self.textures.get(id).ok_or_else(|| {
                        GraphicsError::CommandExecution(format!(
                            "Partial update for unknown GUI texture {:?}",
                            id
                        ))
                    })?;
                    uploads.enqueue(UploadRequest::texture_region(
                        handle,
                        data,
                        PixelFormat::Rgba8Unorm,
                        (x as u32, y as u32),
                        width,
                        height,
                    ));
                }
            }
        }
        Ok(())
    }

    /// 释放一张 egui 纹理
    pub fn free_texture(
        &mut self,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        id: egui::TextureId,
    ) {
        if let Some(handle) = self.textures.remove(&id) {
            if let Some(texture) = registry.remove_texture(handle) {
                device.destroy_resource(texture.resource);
            }
            debug!(?id, "GUI texture freed");
        }
    }

    /// 录制裁剪图元
    pub fn render(
        &mut self,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        ring: &mut RingUploadBuffer,
        context: &mut GraphicsContext,
        primitives: &[egui::ClippedPrimitive],
        pixels_per_point: f32,
    ) -> Result<()> {
        if primitives.is_empty() {
            return Ok(());
        }

        // 根签名首帧惰性构建：b0 矩阵 + t0 纹理表
        if self.root_signature.is_none() {
            self.root_signature = Some(RootSignature::build(
                &device.device,
                &[RootParamKind::Cbv { slot: 0 }, RootParamKind::SrvTable { slot: 0 }],
            )?);
        }
        let root_signature = self.root_signature.as_ref().unwrap().clone();

        // 所有图元拼成一对缓冲，逐段记录绘制参数
        let mut vertex_bytes: Vec<u8> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut calls: Vec<DrawCall> = Vec::new();

        for primitive in primitives {
            match &primitive.primitive {
                egui::epaint::Primitive::Mesh(mesh) => {
                    let Some(&texture) = self.textures.get(&mesh.texture_id) else {
                        error!(id = ?mesh.texture_id, "Draw references unknown GUI texture, skipped");
                        continue;
                    };
                    let base_vertex = (vertex_bytes.len() / GUI_VERTEX_STRIDE as usize) as i32;
                    let first_index = indices.len() as u32;

                    vertex_bytes.extend_from_slice(bytemuck::cast_slice(&mesh.vertices));
                    indices.extend_from_slice(&mesh.indices);

                    calls.push(DrawCall {
                        clip: primitive.clip_rect,
                        texture,
                        index_count: mesh.indices.len() as u32,
                        first_index,
                        base_vertex,
                    });
                }
                egui::epaint::Primitive::Callback(_) => {
                    // 自定义绘制回调不在支持范围内，报告并继续
                    error!("GUI paint callbacks are not supported, primitive skipped");
                }
            }
        }

        if calls.is_empty() {
            return Ok(());
        }

        context.process_upload(
            device,
            registry,
            ring,
            &UploadRequest::mesh(
                self.mesh,
                MeshChannel::Vertices {
                    slot: 0,
                    stride: GUI_VERTEX_STRIDE,
                },
                vertex_bytes,
            ),
        )?;
        context.process_upload(
            device,
            registry,
            ring,
            &UploadRequest::mesh(
                self.mesh,
                MeshChannel::Indices,
                bytemuck::cast_slice(&indices).to_vec(),
            ),
        )?;

        // 显示区域（点单位）到 NDC 的正交矩阵，行主序
        let width_points = device.width() as f32 / pixels_per_point;
        let height_points = device.height() as f32 / pixels_per_point;
        let mvp: [[f32; 4]; 4] = [
            [2.0 / width_points, 0.0, 0.0, -1.0],
            [0.0, -2.0 / height_points, 0.0, 1.0],
            [0.0, 0.0, 0.5, 0.5],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let mvp_offset = ring.upload(bytemuck::bytes_of(&mvp))?;

        context.set_root_signature(&root_signature);
        context.set_pipeline(self.pipeline);
        context.set_input_layout(self.input_layout);
        context.set_pso_desc(PsoDesc {
            blend: BlendMode::PremultipliedAlpha,
            cull: CullMode::None,
            depth_enable: false,
            rtv_format: crate::gfx::device::BACK_BUFFER_FORMAT,
        });
        context.set_cbv(0, ring.gpu_address(mvp_offset))?;
        context.set_mesh(registry, self.mesh)?;

        let screen_width = device.width() as i32;
        let screen_height = device.height() as i32;

        for call in &calls {
            // 裁剪矩形从点换算到像素并夹到屏幕内
            let left = (call.clip.min.x * pixels_per_point).floor() as i32;
            let top = (call.clip.min.y * pixels_per_point).floor() as i32;
            let right = (call.clip.max.x * pixels_per_point).ceil() as i32;
            let bottom = (call.clip.max.y * pixels_per_point).ceil() as i32;

            let rect = RECT {
                left: left.clamp(0, screen_width),
                top: top.clamp(0, screen_height),
                right: right.clamp(0, screen_width),
                bottom: bottom.clamp(0, screen_height),
            };
            if rect.right <= rect.left || rect.bottom <= rect.top {
                continue;
            }

            context.set_scissor(rect);
            context.set_srv(device, registry, 0, call.texture)?;
            context.draw_indexed(
                device,
                registry,
                call.index_count,
                call.first_index,
                call.base_vertex,
            )?;
        }

        Ok(())
    }
}

/// egui 图像数据展开成紧密的 RGBA8 字节
fn convert_image(image: &egui::ImageData) -> (u32, u32, Vec<u8>) {
    match image {
        egui::ImageData::Color(color) => {
            let data = color
                .pixels
                .iter()
                .flat_map(|c| c.to_array())
                .collect::<Vec<u8>>();
            (color.size[0] as u32, color.size[1] as u32, data)
        }
        egui::ImageData::Font(font) => {
            let data = font
                .srgba_pixels(None)
                .flat_map(|c| c.to_array())
                .collect::<Vec<u8>>();
            (font.size[0] as u32, font.size[1] as u32, data)
        }
    }
}
