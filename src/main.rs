//! LumeRender - 最小化 DirectX 12 应用骨架
//!
//! 初始化 GPU 设备与逐帧资源，把 egui 的绘制数据渲染到窗口。
//!
//! # 使用方法
//!
//! ```bash
//! cargo run
//!
//! # 覆盖窗口尺寸 / 关闭垂直同步
//! cargo run -- --width 1280 --height 720 --no-vsync
//! ```
//!
//! # 初始化流程
//!
//! 1. 加载引擎配置文件（config.toml）
//! 2. 应用命令行参数覆盖并校验（缓冲深度、预算余量）
//! 3. 初始化日志系统
//! 4. 创建窗口与事件循环
//! 5. 创建应用（设备、资源清单、GUI）
//! 6. 启动主循环
//!
//! # 事件处理
//!
//! 窗口事件先交给 GUI（egui），被消费的不再向下传递；
//! `CloseRequested` 与未被 GUI 消费的 Escape 退出，
//! `RedrawRequested` 渲染一帧，`AboutToWait` 请求下一次重绘。

#[cfg(target_os = "windows")]
fn main() {
    use std::sync::Arc;

    use lume_render::app::App;
    use lume_render::core::{log, Config};
    use tracing::{error, info};
    use winit::dpi::LogicalSize;
    use winit::event::{ElementState, Event, WindowEvent};
    use winit::event_loop::EventLoop;
    use winit::keyboard::{Key, NamedKey};
    use winit::window::WindowBuilder;

    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    config.apply_args(std::env::args());

    // 3. 验证配置
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 4. 初始化日志系统
    let log_file = if config.logging.file_output {
        Some(config.logging.log_file.as_str())
    } else {
        None
    };
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!("LumeRender starting...");
    info!(version = env!("CARGO_PKG_VERSION"), "Application initialized");

    info!(
        width = config.window.width,
        height = config.window.height,
        vsync = config.graphics.vsync,
        buffer_count = config.graphics.buffer_count,
        "Graphics configuration"
    );

    // 5. 创建事件循环与窗口
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };

    let window = match WindowBuilder::new()
        .with_title(config.window.title.clone())
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .with_resizable(config.window.resizable)
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(e) => {
            error!("Failed to create window: {}", e);
            std::process::exit(1);
        }
    };

    // 6. 创建应用
    let mut app = match App::new(window.clone(), &config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            eprintln!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Entering main loop...");

    // 7. 启动事件循环
    let result = event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => {
                // GUI 优先消费输入
                let consumed = app.on_window_event(&event);

                match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested, shutting down...");
                        elwt.exit();
                    }
                    WindowEvent::RedrawRequested => {
                        if let Err(e) = app.draw() {
                            error!("Draw failed: {}", e);
                            eprintln!("Draw failed: {}", e);
                            elwt.exit();
                        }
                    }
                    // GUI 没有消费的按键才轮到应用处理
                    WindowEvent::KeyboardInput { event: key, .. } if !consumed => {
                        if key.state == ElementState::Pressed
                            && key.logical_key == Key::Named(NamedKey::Escape)
                        {
                            info!("Escape pressed, shutting down...");
                            elwt.exit();
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => (),
        }
    });

    if let Err(e) = result {
        error!("Event loop error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("This application requires Windows (DirectX 12)");
    std::process::exit(1);
}
