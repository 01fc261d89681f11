//! GUI 系统
//!
//! 集成 egui：输入事件先交给 egui，被消费的不再往下传；
//! 每帧构建 UI 后，纹理增量经上传队列进入 GPU，裁剪图元由
//! `GuiRenderer` 录制成索引绘制命令。

pub mod renderer;

pub use renderer::GuiRenderer;

use egui_winit::State as EguiState;
use winit::window::Window;

use crate::core::error::Result;
use crate::gfx::{GraphicsContext, GraphicsDevice, ResourceRegistry, RingUploadBuffer};
use crate::renderer::UploadQueue;

/// GUI 管理器
///
/// 持有 egui 上下文与 winit 集成状态，驱动每帧的
/// 构建 -> 纹理增量 -> 渲染流程。
pub struct GuiManager {
    context: egui::Context,
    state: EguiState,
    renderer: GuiRenderer,
    /// 本帧曲面细分结果，构建后保留到渲染
    primitives: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    pixels_per_point: f32,
}

impl GuiManager {
    pub fn new(window: &Window, registry: &mut ResourceRegistry) -> Result<Self> {
        let context = egui::Context::default();
        let state = EguiState::new(
            context.clone(),
            egui::viewport::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );
        let renderer = GuiRenderer::new(registry)?;

        Ok(Self {
            context,
            state,
            renderer,
            primitives: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
            pixels_per_point: 1.0,
        })
    }

    /// 处理窗口事件，返回 true 表示事件被 GUI 消费
    pub fn on_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// 构建一帧 UI
    ///
    /// 纹理增量在这里转换成上传请求进入队列；裁剪图元保留到
    /// `render` 被调用。
    pub fn run(
        &mut self,
        window: &Window,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        uploads: &UploadQueue,
        ui: impl FnOnce(&egui::Context),
    ) -> Result<()> {
        let raw_input = self.state.take_egui_input(window);
        let output = self.context.run(raw_input, |ctx| ui(ctx));

        self.state
            .handle_platform_output(window, output.platform_output);

        self.renderer
            .apply_textures_delta(device, registry, uploads, &output.textures_delta)?;

        self.pixels_per_point = output.pixels_per_point;
        self.primitives = self
            .context
            .tessellate(output.shapes, output.pixels_per_point);
        self.textures_delta = output.textures_delta;
        Ok(())
    }

    /// 录制本帧的 GUI 绘制命令
    pub fn render(
        &mut self,
        device: &mut GraphicsDevice,
        registry: &mut ResourceRegistry,
        ring: &mut RingUploadBuffer,
        context: &mut GraphicsContext,
    ) -> Result<()> {
        self.renderer.render(
            device,
            registry,
            ring,
            context,
            &self.primitives,
            self.pixels_per_point,
        )?;

        // egui 约定：释放发生在绘制之后
        for id in self.textures_delta.free.drain(..) {
            self.renderer.free_texture(device, registry, id);
        }
        Ok(())
    }
}
