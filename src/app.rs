//! 应用帧驱动
//!
//! 每个重绘 tick 的编排顺序固定：
//!
//! 1. 窗口尺寸与交换链不一致则先重建交换链
//! 2. 构建 GUI（产生纹理增量上传请求）
//! 3. `begin`（槽位围栏等待 + 分配器重置）并开始录制
//! 4. 排空上传队列
//! 5. 后台缓冲迁移到渲染目标、清屏、录制 GUI 绘制
//! 6. 迁回呈现状态，关闭并提交命令列表，`present`

use std::sync::Arc;

use tracing::info;
use winit::window::Window;

use crate::core::error::Result;
use crate::core::Config;
use crate::gfx::{GraphicsContext, GraphicsDevice, ResourceRegistry, RingUploadBuffer};
use crate::gui::GuiManager;
use crate::renderer::UploadQueue;
use crate::resources::ResourceManifest;

/// 演示 UI 的可变状态
struct UiState {
    text: String,
    value: f32,
    show_stats: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            text: String::new(),
            value: 0.5,
            show_stats: true,
        }
    }
}

pub struct App {
    window: Arc<Window>,
    device: GraphicsDevice,
    context: GraphicsContext,
    registry: ResourceRegistry,
    ring: RingUploadBuffer,
    uploads: UploadQueue,
    gui: GuiManager,
    ui_state: UiState,
    vsync: bool,
    clear_color: [f32; 4],
    frame_count: u64,
}

impl App {
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let device = GraphicsDevice::new(&window, &config.graphics)?;

        let mut registry = ResourceRegistry::new();
        let manifest = ResourceManifest::from_file("assets/resources.toml")?;
        registry.load_manifest(&manifest)?;

        let ring = RingUploadBuffer::new(&device.device, config.graphics.upload_ring_size)?;
        let context = GraphicsContext::new(&device)?;
        let gui = GuiManager::new(&window, &mut registry)?;

        info!("Application initialized");

        Ok(Self {
            window,
            device,
            context,
            registry,
            ring,
            uploads: UploadQueue::new(),
            gui,
            ui_state: UiState::default(),
            vsync: config.graphics.vsync,
            clear_color: [0.18, 0.20, 0.25, 1.0],
            frame_count: 0,
        })
    }

    /// 事件先交给 GUI，返回 true 表示已消费
    pub fn on_window_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        self.gui.on_window_event(&self.window, event)
    }

    /// 渲染一帧
    pub fn draw(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            // 最小化时跳过
            return Ok(());
        }
        if size.width != self.device.width() || size.height != self.device.height() {
            self.device.resize(size.width, size.height)?;
        }

        let ui_state = &mut self.ui_state;
        let frame_count = self.frame_count;
        self.gui.run(
            &self.window,
            &mut self.device,
            &mut self.registry,
            &self.uploads,
            |ctx| build_ui(ctx, ui_state, frame_count),
        )?;

        self.device.begin()?;
        self.context.begin(&self.device)?;

        for request in self.uploads.drain() {
            self.context
                .process_upload(&mut self.device, &mut self.registry, &mut self.ring, &request)?;
        }

        self.context.bind_shader_heap(&self.device);
        self.context.screen_begin_render(&self.device);
        self.context
            .set_render_target_screen(&mut self.device, Some(self.clear_color));
        self.context
            .set_viewport(self.device.width(), self.device.height());

        self.gui.render(
            &mut self.device,
            &mut self.registry,
            &mut self.ring,
            &mut self.context,
        )?;

        self.context.screen_end_render(&self.device);
        self.context.end()?;
        self.context.execute(&self.device);
        self.device.present(self.vsync)?;

        self.frame_count += 1;
        Ok(())
    }
}

fn build_ui(ctx: &egui::Context, state: &mut UiState, frame_count: u64) {
    egui::Window::new("LumeRender")
        .default_width(320.0)
        .show(ctx, |ui| {
            ui.heading("Demo");
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Text:");
                ui.text_edit_singleline(&mut state.text);
            });
            ui.add(egui::Slider::new(&mut state.value, 0.0..=1.0).text("Value"));
            ui.checkbox(&mut state.show_stats, "Show stats");

            if state.show_stats {
                ui.separator();
                ui.label(format!("Frame: {}", frame_count));
            }
        });
}
