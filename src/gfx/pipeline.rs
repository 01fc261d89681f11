//! 根签名与管线状态
//!
//! 根签名从参数种类列表构建，同时记录每种寄存器槽到根参数下标的
//! 映射，供上下文按槽位绑定。每个根签名固定携带四个静态采样器。
//!
//! 管线状态对象持有一对着色器字节码，按（渲染状态 + 输入布局）
//! 的组合缓存编译出的 `ID3D12PipelineState`，在绘制时惰性创建。

use std::collections::HashMap;
use std::mem::ManuallyDrop;

use tracing::debug;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::resources::InputLayoutHandle;

/// 根参数种类，携带着色器寄存器槽号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParamKind {
    /// 直接根描述符 CBV（bN）
    Cbv { slot: u32 },
    /// 直接根描述符 SRV（tN）
    Srv { slot: u32 },
    /// 直接根描述符 UAV（uN）
    Uav { slot: u32 },
    /// 单描述符表 CBV
    CbvTable { slot: u32 },
    /// 单描述符表 SRV
    SrvTable { slot: u32 },
    /// 单描述符表 UAV
    UavTable { slot: u32 },
}

/// 根签名与寄存器槽映射
#[derive(Clone)]
pub struct RootSignature {
    inner: ID3D12RootSignature,
    /// CBV 槽 -> 根参数下标
    cbv: HashMap<u32, u32>,
    srv: HashMap<u32, u32>,
    uav: HashMap<u32, u32>,
}

impl RootSignature {
    /// 从参数种类列表构建根签名
    pub fn build(device: &ID3D12Device, params: &[RootParamKind]) -> Result<Self> {
        let mut cbv = HashMap::new();
        let mut srv = HashMap::new();
        let mut uav = HashMap::new();

        // ranges 预分配到位，root_parameters 内的指针不会因扩容失效
        let mut ranges: Vec<D3D12_DESCRIPTOR_RANGE> = Vec::with_capacity(params.len());
        let mut root_parameters: Vec<D3D12_ROOT_PARAMETER> = Vec::with_capacity(params.len());

        for (index, kind) in params.iter().enumerate() {
            let index = index as u32;
            match *kind {
                RootParamKind::Cbv { slot } => {
                    cbv.insert(slot, index);
                    root_parameters.push(direct_descriptor(D3D12_ROOT_PARAMETER_TYPE_CBV, slot));
                }
                RootParamKind::Srv { slot } => {
                    srv.insert(slot, index);
                    root_parameters.push(direct_descriptor(D3D12_ROOT_PARAMETER_TYPE_SRV, slot));
                }
                RootParamKind::Uav { slot } => {
                    uav.insert(slot, index);
                    root_parameters.push(direct_descriptor(D3D12_ROOT_PARAMETER_TYPE_UAV, slot));
                }
                RootParamKind::CbvTable { slot } => {
                    cbv.insert(slot, index);
                    ranges.push(descriptor_range(D3D12_DESCRIPTOR_RANGE_TYPE_CBV, slot));
                    root_parameters.push(table_parameter(ranges.last().unwrap()));
                }
                RootParamKind::SrvTable { slot } => {
                    srv.insert(slot, index);
                    ranges.push(descriptor_range(D3D12_DESCRIPTOR_RANGE_TYPE_SRV, slot));
                    root_parameters.push(table_parameter(ranges.last().unwrap()));
                }
                RootParamKind::UavTable { slot } => {
                    uav.insert(slot, index);
                    ranges.push(descriptor_range(D3D12_DESCRIPTOR_RANGE_TYPE_UAV, slot));
                    root_parameters.push(table_parameter(ranges.last().unwrap()));
                }
            }
        }

        let static_samplers = static_samplers();

        let root_desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: root_parameters.len() as u32,
            pParameters: root_parameters.as_ptr(),
            NumStaticSamplers: static_samplers.len() as u32,
            pStaticSamplers: static_samplers.as_ptr(),
            Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        };

        unsafe {
            let mut signature = None;
            D3D12SerializeRootSignature(
                &root_desc,
                D3D_ROOT_SIGNATURE_VERSION_1,
                &mut signature,
                None,
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to serialize root signature: {:?}",
                    e
                ))
            })?;
            let signature = signature.unwrap();

            let inner: ID3D12RootSignature = device
                .CreateRootSignature(
                    0,
                    std::slice::from_raw_parts(
                        signature.GetBufferPointer() as _,
                        signature.GetBufferSize(),
                    ),
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create root signature: {:?}",
                        e
                    ))
                })?;

            debug!(parameters = root_parameters.len(), "Root signature created");

            Ok(Self { inner, cbv, srv, uav })
        }
    }

    pub fn raw(&self) -> &ID3D12RootSignature {
        &self.inner
    }

    /// CBV 寄存器槽对应的根参数下标
    pub fn cbv_index(&self, slot: u32) -> Option<u32> {
        self.cbv.get(&slot).copied()
    }

    pub fn srv_index(&self, slot: u32) -> Option<u32> {
        self.srv.get(&slot).copied()
    }

    pub fn uav_index(&self, slot: u32) -> Option<u32> {
        self.uav.get(&slot).copied()
    }
}

fn direct_descriptor(kind: D3D12_ROOT_PARAMETER_TYPE, slot: u32) -> D3D12_ROOT_PARAMETER {
    D3D12_ROOT_PARAMETER {
        ParameterType: kind,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            Descriptor: D3D12_ROOT_DESCRIPTOR {
                ShaderRegister: slot,
                RegisterSpace: 0,
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }
}

fn descriptor_range(kind: D3D12_DESCRIPTOR_RANGE_TYPE, slot: u32) -> D3D12_DESCRIPTOR_RANGE {
    D3D12_DESCRIPTOR_RANGE {
        RangeType: kind,
        NumDescriptors: 1,
        BaseShaderRegister: slot,
        RegisterSpace: 0,
        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
    }
}

fn table_parameter(range: &D3D12_DESCRIPTOR_RANGE) -> D3D12_ROOT_PARAMETER {
    D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                NumDescriptorRanges: 1,
                pDescriptorRanges: range,
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }
}

/// 四个固定的静态采样器：s0 线性钳制、s1 点钳制、s2 线性重复、s3 各向异性
fn static_samplers() -> [D3D12_STATIC_SAMPLER_DESC; 4] {
    fn sampler(
        slot: u32,
        filter: D3D12_FILTER,
        address: D3D12_TEXTURE_ADDRESS_MODE,
        max_anisotropy: u32,
    ) -> D3D12_STATIC_SAMPLER_DESC {
        D3D12_STATIC_SAMPLER_DESC {
            Filter: filter,
            AddressU: address,
            AddressV: address,
            AddressW: address,
            MipLODBias: 0.0,
            MaxAnisotropy: max_anisotropy,
            ComparisonFunc: D3D12_COMPARISON_FUNC_NEVER,
            BorderColor: D3D12_STATIC_BORDER_COLOR_TRANSPARENT_BLACK,
            MinLOD: 0.0,
            MaxLOD: f32::MAX,
            ShaderRegister: slot,
            RegisterSpace: 0,
            ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
        }
    }

    [
        sampler(0, D3D12_FILTER_MIN_MAG_MIP_LINEAR, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 1),
        sampler(1, D3D12_FILTER_MIN_MAG_MIP_POINT, D3D12_TEXTURE_ADDRESS_MODE_CLAMP, 1),
        sampler(2, D3D12_FILTER_MIN_MAG_MIP_LINEAR, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 1),
        sampler(3, D3D12_FILTER_ANISOTROPIC, D3D12_TEXTURE_ADDRESS_MODE_WRAP, 16),
    ]
}

/// 混合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    /// 预乘 alpha（GUI 绘制用）
    PremultipliedAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// 渲染状态描述，PSO 缓存键的一部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsoDesc {
    pub blend: BlendMode,
    pub cull: CullMode,
    pub depth_enable: bool,
    pub rtv_format: DXGI_FORMAT,
}

impl Default for PsoDesc {
    fn default() -> Self {
        Self {
            blend: BlendMode::Opaque,
            cull: CullMode::Back,
            depth_enable: false,
            rtv_format: DXGI_FORMAT_R8G8B8A8_UNORM,
        }
    }
}

/// PSO 缓存键：纯整数字段（DXGI_FORMAT 不实现 Hash，存原始值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PsoCacheKey {
    blend: BlendMode,
    cull: CullMode,
    depth_enable: bool,
    rtv_format: i32,
    layout: u32,
}

impl PsoCacheKey {
    fn new(desc: &PsoDesc, layout: InputLayoutHandle) -> Self {
        Self {
            blend: desc.blend,
            cull: desc.cull,
            depth_enable: desc.depth_enable,
            rtv_format: desc.rtv_format.0,
            layout: layout.0,
        }
    }
}

/// 顶点语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    TexCoord,
    Color,
    Normal,
}

impl Semantic {
    fn name(self) -> windows::core::PCSTR {
        match self {
            Semantic::Position => windows::core::s!("POSITION"),
            Semantic::TexCoord => windows::core::s!("TEXCOORD"),
            Semantic::Color => windows::core::s!("COLOR"),
            Semantic::Normal => windows::core::s!("NORMAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float2,
    Float3,
    Float4,
    Rgba8,
}

impl VertexFormat {
    fn dxgi(self) -> DXGI_FORMAT {
        match self {
            VertexFormat::Float2 => DXGI_FORMAT_R32G32_FLOAT,
            VertexFormat::Float3 => DXGI_FORMAT_R32G32B32_FLOAT,
            VertexFormat::Float4 => DXGI_FORMAT_R32G32B32A32_FLOAT,
            VertexFormat::Rgba8 => DXGI_FORMAT_R8G8B8A8_UNORM,
        }
    }

    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float2 => 8,
            VertexFormat::Float3 => 12,
            VertexFormat::Float4 => 16,
            VertexFormat::Rgba8 => 4,
        }
    }
}

/// 输入布局的一个元素
#[derive(Debug, Clone, Copy)]
pub struct InputElement {
    pub semantic: Semantic,
    pub semantic_index: u32,
    pub format: VertexFormat,
    /// 输入槽（顶点通道）
    pub slot: u32,
    pub offset: u32,
}

/// 输入布局描述
#[derive(Debug, Clone, Default)]
pub struct InputLayoutDesc {
    pub elements: Vec<InputElement>,
}

impl InputLayoutDesc {
    pub fn new(elements: Vec<InputElement>) -> Self {
        Self { elements }
    }

    fn to_d3d(&self) -> Vec<D3D12_INPUT_ELEMENT_DESC> {
        self.elements
            .iter()
            .map(|e| D3D12_INPUT_ELEMENT_DESC {
                SemanticName: e.semantic.name(),
                SemanticIndex: e.semantic_index,
                Format: e.format.dxgi(),
                InputSlot: e.slot,
                AlignedByteOffset: e.offset,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            })
            .collect()
    }
}

/// 管线状态对象：一对着色器 + 按状态组合缓存的已编译 PSO
pub struct PipelineStateObject {
    vs: Vec<u8>,
    ps: Vec<u8>,
    states: HashMap<PsoCacheKey, ID3D12PipelineState>,
}

impl PipelineStateObject {
    pub fn new(vs: Vec<u8>, ps: Vec<u8>) -> Self {
        Self {
            vs,
            ps,
            states: HashMap::new(),
        }
    }

    /// 解析（惰性编译）给定状态组合的 PSO
    pub fn state(
        &mut self,
        device: &ID3D12Device,
        desc: &PsoDesc,
        root_signature: &RootSignature,
        layout_handle: InputLayoutHandle,
        layout: &InputLayoutDesc,
    ) -> Result<ID3D12PipelineState> {
        let key = PsoCacheKey::new(desc, layout_handle);
        if let Some(pso) = self.states.get(&key) {
            return Ok(pso.clone());
        }

        let input_elements = layout.to_d3d();

        let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC::default();
        pso_desc.pRootSignature = ManuallyDrop::new(Some(root_signature.raw().clone()));
        pso_desc.VS = D3D12_SHADER_BYTECODE {
            pShaderBytecode: self.vs.as_ptr() as _,
            BytecodeLength: self.vs.len(),
        };
        pso_desc.PS = D3D12_SHADER_BYTECODE {
            pShaderBytecode: self.ps.as_ptr() as _,
            BytecodeLength: self.ps.len(),
        };
        pso_desc.BlendState = blend_desc(desc.blend);
        pso_desc.RasterizerState = D3D12_RASTERIZER_DESC {
            FillMode: D3D12_FILL_MODE_SOLID,
            CullMode: match desc.cull {
                CullMode::None => D3D12_CULL_MODE_NONE,
                CullMode::Front => D3D12_CULL_MODE_FRONT,
                CullMode::Back => D3D12_CULL_MODE_BACK,
            },
            DepthClipEnable: true.into(),
            ..Default::default()
        };
        pso_desc.DepthStencilState = D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: desc.depth_enable.into(),
            DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D12_COMPARISON_FUNC_LESS,
            ..Default::default()
        };
        pso_desc.SampleMask = 0xFFFFFFFF;
        pso_desc.InputLayout = D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: input_elements.as_ptr(),
            NumElements: input_elements.len() as u32,
        };
        pso_desc.PrimitiveTopologyType = D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE;
        pso_desc.NumRenderTargets = 1;
        pso_desc.RTVFormats[0] = desc.rtv_format;
        pso_desc.SampleDesc.Count = 1;

        let pso: ID3D12PipelineState = unsafe {
            device.CreateGraphicsPipelineState(&pso_desc).map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to create pipeline state: {:?}",
                    e
                ))
            })?
        };

        #[cfg(debug_assertions)]
        debug!(?key, "Pipeline state compiled");

        self.states.insert(key, pso.clone());
        Ok(pso)
    }
}

fn blend_desc(mode: BlendMode) -> D3D12_BLEND_DESC {
    let rt0 = match mode {
        BlendMode::Opaque => D3D12_RENDER_TARGET_BLEND_DESC {
            BlendEnable: false.into(),
            LogicOpEnable: false.into(),
            RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
            ..Default::default()
        },
        BlendMode::PremultipliedAlpha => D3D12_RENDER_TARGET_BLEND_DESC {
            BlendEnable: true.into(),
            LogicOpEnable: false.into(),
            SrcBlend: D3D12_BLEND_ONE,
            DestBlend: D3D12_BLEND_INV_SRC_ALPHA,
            BlendOp: D3D12_BLEND_OP_ADD,
            SrcBlendAlpha: D3D12_BLEND_ONE,
            DestBlendAlpha: D3D12_BLEND_INV_SRC_ALPHA,
            BlendOpAlpha: D3D12_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
            ..Default::default()
        },
    };

    D3D12_BLEND_DESC {
        AlphaToCoverageEnable: false.into(),
        IndependentBlendEnable: false.into(),
        RenderTarget: [
            rt0,
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
        ],
    }
}
