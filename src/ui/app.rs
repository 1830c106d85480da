use std::path::{Path, PathBuf};

use egui::{Color32, Context, PointerButton, RichText, TextureHandle, TextureOptions, Vec2};
use log::{error, info, warn};
use native_dialog::FileDialogBuilder;
use nalgebra::Point2;

use crate::app::{APP_TITLE, Viewer};
use crate::error::ModelLoadError;
use crate::gpu::{SoftwareDevice, Viewport};
use crate::io::config::Config;
use crate::io::obj_loader::is_obj_path;
use crate::timing::{FrameClock, FrameRateCounter};
use crate::ui::input::MouseButton;

/// The eframe host: input, menus, frame loop and presentation of the software framebuffer.
pub struct ViewerApp {
    viewer: Viewer<SoftwareDevice>,
    resolution_scale: f32,
    clock: FrameClock,
    fps: FrameRateCounter,
    title: String,
    frame_texture: Option<TextureHandle>,
    pixels: Vec<u8>,
    image_rect: egui::Rect,
    fullscreen: bool,
    error_message: Option<String>,
}

impl ViewerApp {
    pub fn new(viewer: Viewer<SoftwareDevice>, resolution_scale: f32, initial_model: Option<PathBuf>) -> Self {
        let mut app = Self {
            viewer,
            resolution_scale: resolution_scale.clamp(0.1, 1.0),
            clock: FrameClock::new(),
            fps: FrameRateCounter::default(),
            title: APP_TITLE.to_string(),
            frame_texture: None,
            pixels: Vec::new(),
            image_rect: egui::Rect::NOTHING,
            fullscreen: false,
            error_message: None,
        };
        if let Some(path) = initial_model {
            app.open_model(&path);
        }
        app
    }

    fn set_error(&mut self, message: String) {
        warn!("{message}");
        self.error_message = Some(message);
    }

    fn open_model(&mut self, path: &Path) {
        if let Err(e) = checked_obj_path(path).and_then(|p| self.viewer.load_model(p)) {
            self.set_error(e.to_string());
        }
    }

    fn select_model_file(&mut self) {
        let result = FileDialogBuilder::default()
            .set_title("Open OBJ model")
            .add_filter("OBJ model", ["obj"])
            .open_single_file()
            .show();

        match result {
            Ok(Some(path)) => self.open_model(&path),
            Ok(None) => {}
            Err(e) => self.set_error(format!("File dialog error: {e}")),
        }
    }

    fn toggle_fullscreen(&mut self, ctx: &Context) {
        self.fullscreen = !self.fullscreen;
        ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.fullscreen));
    }

    fn handle_shortcuts(&mut self, ctx: &Context) {
        let (escape, reset, textures, wireframe, fullscreen) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::R),
                i.key_pressed(egui::Key::T),
                i.key_pressed(egui::Key::W),
                i.modifiers.alt && i.key_pressed(egui::Key::Enter),
            )
        });

        if escape {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        if reset {
            self.viewer.reset_view();
        }
        if textures {
            self.viewer.toggle_textures();
        }
        if wireframe {
            self.viewer.toggle_wireframe();
        }
        if fullscreen {
            self.toggle_fullscreen(ctx);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });
        // Only the first file of a multi-file drop is opened.
        if let Some(path) = dropped.first() {
            self.open_model(path);
        }
    }

    /// Routes pointer events to the camera controller.
    ///
    /// Presses only start a drag over the rendered image; once captured,
    /// motion and releases are followed anywhere in the window.
    fn handle_pointer(&mut self, ctx: &Context) {
        let ppp = ctx.pixels_per_point();
        let events = ctx.input(|i| i.events.clone());

        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    ..
                } => {
                    let Some(button) = mouse_button(button) else {
                        continue;
                    };
                    if !pressed {
                        self.viewer.pointer_released(button);
                    } else if self.image_rect.contains(pos) {
                        self.viewer.pointer_pressed(button, to_pixels(pos, ppp));
                    }
                }
                egui::Event::PointerMoved(pos) => self.viewer.pointer_moved(to_pixels(pos, ppp)),
                _ => {}
            }
        }
    }

    fn update_title(&mut self, ctx: &Context) {
        let title = self.viewer.title(self.fps.fps());
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }
    }

    fn menu_bar(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        ui.close_menu();
                        self.select_model_file();
                    }
                    if ui
                        .add_enabled(self.viewer.model().is_some(), egui::Button::new("Close"))
                        .clicked()
                    {
                        ui.close_menu();
                        self.viewer.unload_model();
                    }
                    ui.separator();
                    if ui.add(egui::Button::new("Exit").shortcut_text("Esc")).clicked() {
                        ui.close_menu();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.add(egui::Button::new("Reset view").shortcut_text("R")).clicked() {
                        ui.close_menu();
                        self.viewer.reset_view();
                    }
                    ui.separator();

                    let flags = self.viewer.flags();
                    let (mut textures, mut wireframe, mut culling) =
                        (flags.textures, flags.wireframe, flags.cull_back_faces);
                    if ui.checkbox(&mut textures, "Textures (T)").changed() {
                        self.viewer.toggle_textures();
                    }
                    if ui.checkbox(&mut wireframe, "Wireframe (W)").changed() {
                        self.viewer.toggle_wireframe();
                    }
                    if ui.checkbox(&mut culling, "Back-face culling").changed() {
                        self.viewer.toggle_culling();
                    }
                    ui.separator();

                    let mut fullscreen = self.fullscreen;
                    if ui.checkbox(&mut fullscreen, "Full screen (Alt+Enter)").changed() {
                        self.toggle_fullscreen(ctx);
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        RichText::new(format!("{} pipeline", self.viewer.pipeline().name()))
                            .color(Color32::GRAY),
                    );
                });
            });
        });
    }

    fn show_error_dialog(&mut self, ctx: &Context) {
        let Some(message) = &self.error_message else {
            return;
        };
        let mut dismissed = false;

        egui::Window::new("Error")
            .fixed_size([400.0, 150.0])
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(10.0);
                    ui.label(
                        RichText::new(message)
                            .color(Color32::from_rgb(230, 50, 50))
                            .size(16.0),
                    );
                    ui.add_space(20.0);
                    dismissed = ui.button(RichText::new("OK").size(16.0)).clicked();
                });
            });

        if dismissed {
            self.error_message = None;
        }
    }

    /// Renders one frame at the panel size and uploads it to the egui texture.
    fn render_frame(&mut self, ctx: &Context, size: Vec2) {
        let viewport = render_viewport(size, ctx.pixels_per_point(), self.resolution_scale);
        self.viewer.render(viewport);

        let [width, height] = self.viewer.device().read_pixels(&mut self.pixels);
        let image = egui::ColorImage::from_rgba_unmultiplied([width, height], &self.pixels);
        if let Some(texture) = &mut self.frame_texture {
            texture.set(image, TextureOptions::LINEAR);
        } else {
            self.frame_texture = Some(ctx.load_texture("frame", image, TextureOptions::LINEAR));
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let focused = ctx.input(|i| i.focused);

        self.handle_dropped_files(ctx);
        self.handle_shortcuts(ctx);
        if focused {
            self.handle_pointer(ctx);
        } else {
            self.viewer.cancel_drag();
        }

        self.menu_bar(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let size = ui.available_size();
                if focused {
                    let elapsed = self.clock.tick();
                    self.fps.update(elapsed);
                    self.render_frame(ctx, size);
                }
                if let Some(texture) = &self.frame_texture {
                    let response = ui.add(egui::Image::new(texture).fit_to_exact_size(size));
                    self.image_rect = response.rect;
                }
            });

        self.show_error_dialog(ctx);
        self.update_title(ctx);

        // Unfocused frames wait for the next window event instead of spinning.
        if focused {
            ctx.request_repaint();
        }
    }
}

/// Starts the event loop. Returns once the window has been closed.
pub fn run(config: &Config, viewer: Viewer<SoftwareDevice>, initial_model: Option<PathBuf>) -> eframe::Result {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([config.window.width, config.window.height])
            .with_min_inner_size([320.0, 240.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    let resolution_scale = config.render.resolution_scale;

    info!("Starting event loop");
    let result = eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(viewer, resolution_scale, initial_model)))),
    );
    if let Err(e) = &result {
        error!("Event loop failed: {e}");
    }
    result
}

fn mouse_button(button: PointerButton) -> Option<MouseButton> {
    match button {
        PointerButton::Primary => Some(MouseButton::Left),
        PointerButton::Secondary => Some(MouseButton::Right),
        PointerButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn to_pixels(pos: egui::Pos2, pixels_per_point: f32) -> Point2<f32> {
    Point2::new(pos.x * pixels_per_point, pos.y * pixels_per_point)
}

/// Framebuffer size for a panel of `size` points, never smaller than one pixel.
fn render_viewport(size: Vec2, pixels_per_point: f32, resolution_scale: f32) -> Viewport {
    let scale = pixels_per_point * resolution_scale;
    Viewport {
        width: ((size.x * scale).round() as u32).max(1),
        height: ((size.y * scale).round() as u32).max(1),
    }
}

/// Rejects anything but `.obj` files before they reach the importer.
fn checked_obj_path(path: &Path) -> Result<&Path, ModelLoadError> {
    if is_obj_path(path) {
        Ok(path)
    } else {
        Err(ModelLoadError::UnsupportedFormat(path.to_path_buf()))
    }
}
