//! 资源注册表
//!
//! 所有运行期资源的句柄索引表。启动时读取资源清单，编译其中的
//! HLSL 着色器并为每个命名管线状态建立 `PipelineStateObject`；
//! 之后名字只在这里出现一次，每帧的访问全部走句柄下标。

use std::collections::HashMap;
use std::ffi::CString;

use tracing::{debug, info};
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
use windows::Win32::Graphics::Direct3D12::ID3D12Device;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::mesh::Mesh;
use crate::gfx::pipeline::{InputLayoutDesc, PipelineStateObject};
use crate::gfx::texture::Texture2D;
use crate::resources::{
    InputLayoutHandle, MeshHandle, PipelineHandle, ResourceManifest, TextureHandle,
};

#[derive(Default)]
pub struct ResourceRegistry {
    textures: Vec<Option<Texture2D>>,
    meshes: Vec<Mesh>,
    pipelines: Vec<PipelineStateObject>,
    input_layouts: Vec<InputLayoutDesc>,
    pipeline_names: HashMap<String, PipelineHandle>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 装载资源清单：编译着色器并建立命名管线状态
    pub fn load_manifest(&mut self, manifest: &ResourceManifest) -> Result<()> {
        let mut vs_bytecode: HashMap<&str, Vec<u8>> = HashMap::new();
        for shader in &manifest.vertex_shaders {
            let source = std::fs::read_to_string(&shader.path)?;
            let bytecode = compile_shader(&source, &shader.entry, "vs_5_0", &shader.path)?;
            debug!(name = %shader.name, bytes = bytecode.len(), "Vertex shader compiled");
            vs_bytecode.insert(shader.name.as_str(), bytecode);
        }

        let mut ps_bytecode: HashMap<&str, Vec<u8>> = HashMap::new();
        for shader in &manifest.pixel_shaders {
            let source = std::fs::read_to_string(&shader.path)?;
            let bytecode = compile_shader(&source, &shader.entry, "ps_5_0", &shader.path)?;
            debug!(name = %shader.name, bytes = bytecode.len(), "Pixel shader compiled");
            ps_bytecode.insert(shader.name.as_str(), bytecode);
        }

        for pso in &manifest.pipeline_states {
            // 清单校验保证引用存在
            let vs = vs_bytecode[pso.vertex_shader.as_str()].clone();
            let ps = ps_bytecode[pso.pixel_shader.as_str()].clone();
            let handle = PipelineHandle(self.pipelines.len() as u32);
            self.pipelines.push(PipelineStateObject::new(vs, ps));
            self.pipeline_names.insert(pso.name.clone(), handle);
        }

        info!(
            pipelines = self.pipelines.len(),
            "Resource manifest loaded"
        );
        Ok(())
    }

    /// 按清单中的名字查找管线句柄，仅加载阶段使用
    pub fn pipeline_by_name(&self, name: &str) -> Option<PipelineHandle> {
        self.pipeline_names.get(name).copied()
    }

    pub fn register_texture(&mut self, texture: Texture2D) -> TextureHandle {
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(Some(texture));
        handle
    }

    pub fn texture(&self, handle: TextureHandle) -> Result<&Texture2D> {
        self.textures
            .get(handle.index())
            .and_then(|t| t.as_ref())
            .ok_or_else(|| stale_handle("texture", handle.0))
    }

    pub fn texture_mut(&mut self, handle: TextureHandle) -> Result<&mut Texture2D> {
        self.textures
            .get_mut(handle.index())
            .and_then(|t| t.as_mut())
            .ok_or_else(|| stale_handle("texture", handle.0))
    }

    /// 释放纹理槽位，返回底层资源供延迟销毁
    pub fn remove_texture(&mut self, handle: TextureHandle) -> Option<Texture2D> {
        self.textures.get_mut(handle.index()).and_then(|t| t.take())
    }

    pub fn create_mesh(&mut self) -> MeshHandle {
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(Mesh::new());
        handle
    }

    pub fn mesh(&self, handle: MeshHandle) -> Result<&Mesh> {
        self.meshes
            .get(handle.index())
            .ok_or_else(|| stale_handle("mesh", handle.0))
    }

    pub fn mesh_mut(&mut self, handle: MeshHandle) -> Result<&mut Mesh> {
        self.meshes
            .get_mut(handle.index())
            .ok_or_else(|| stale_handle("mesh", handle.0))
    }

    pub fn register_input_layout(&mut self, layout: InputLayoutDesc) -> InputLayoutHandle {
        let handle = InputLayoutHandle(self.input_layouts.len() as u32);
        self.input_layouts.push(layout);
        handle
    }

    pub fn input_layout(&self, handle: InputLayoutHandle) -> Result<&InputLayoutDesc> {
        self.input_layouts
            .get(handle.index())
            .ok_or_else(|| stale_handle("input layout", handle.0))
    }

    /// 绘制路径需要同时拿到管线与输入布局，拆开借用
    pub fn pipeline_and_layout(
        &mut self,
        pipeline: PipelineHandle,
        layout: InputLayoutHandle,
    ) -> Result<(&mut PipelineStateObject, &InputLayoutDesc)> {
        let layout_ref = self
            .input_layouts
            .get(layout.index())
            .ok_or_else(|| stale_handle("input layout", layout.0))?;
        let pipeline_ref = self
            .pipelines
            .get_mut(pipeline.index())
            .ok_or_else(|| stale_handle("pipeline", pipeline.0))?;
        Ok((pipeline_ref, layout_ref))
    }
}

fn stale_handle(kind: &str, value: u32) -> crate::core::error::LumeRenderError {
    GraphicsError::ResourceCreation(format!("Stale {} handle {}", kind, value)).into()
}

/// 运行时编译一段 HLSL
fn compile_shader(source: &str, entry: &str, target: &str, path: &str) -> Result<Vec<u8>> {
    let entry_c = CString::new(entry).map_err(|_| {
        GraphicsError::ShaderCompilation(format!("Invalid shader entry name '{}'", entry))
    })?;
    let target_c = CString::new(target).unwrap();

    unsafe {
        let mut blob = None;
        let mut error_blob = None;
        let result = D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            PCSTR(entry_c.as_ptr() as *const u8),
            PCSTR(target_c.as_ptr() as *const u8),
            0,
            0,
            &mut blob,
            Some(&mut error_blob),
        );

        if let Err(e) = result {
            let message = error_blob
                .map(|error| {
                    String::from_utf8_lossy(std::slice::from_raw_parts(
                        error.GetBufferPointer() as *const u8,
                        error.GetBufferSize(),
                    ))
                    .into_owned()
                })
                .unwrap_or_else(|| format!("{:?}", e));
            return Err(GraphicsError::ShaderCompilation(format!(
                "{} ({}): {}",
                path, entry, message
            ))
            .into());
        }

        let blob = blob.unwrap();
        let bytes = std::slice::from_raw_parts(
            blob.GetBufferPointer() as *const u8,
            blob.GetBufferSize(),
        )
        .to_vec();
        Ok(bytes)
    }
}
