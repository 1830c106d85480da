use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use native_dialog::{MessageDialogBuilder, MessageLevel};

use obj_viewer::app::{APP_TITLE, Viewer};
use obj_viewer::error::InitError;
use obj_viewer::gpu::SoftwareDevice;
use obj_viewer::io::config::Config;
use obj_viewer::io::image::ImageCrateDecoder;
use obj_viewer::io::obj_loader::ObjImporter;
use obj_viewer::io::shader_source::{EmbeddedShaders, ShaderDirectory, ShaderSource};
use obj_viewer::ui::app::run;

#[derive(Parser, Debug)]
#[command(name = "obj-viewer", version, about = "Interactive viewer for textured OBJ/MTL meshes")]
struct Cli {
    /// OBJ model to open at startup
    model: Option<PathBuf>,
}

fn create_viewer(config: &Config) -> Result<Viewer<SoftwareDevice>, InitError> {
    let device = SoftwareDevice::new(config.device_settings()).map_err(InitError::Device)?;
    let shaders: Box<dyn ShaderSource> = match &config.shaders.directory {
        Some(dir) => Box::new(ShaderDirectory::new(dir)),
        None => Box::new(EmbeddedShaders),
    };

    Viewer::new(
        device,
        config.viewer_settings(),
        shaders.as_ref(),
        Box::new(ObjImporter),
        Box::new(ImageCrateDecoder),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("eframe", log::LevelFilter::Warn)
        .filter_module("egui_glow", log::LevelFilter::Warn)
        .filter_module("egui_winit", log::LevelFilter::Warn)
        .filter_module("winit", log::LevelFilter::Warn)
        .filter_module("wgpu", log::LevelFilter::Warn)
        .filter_module("glutin", log::LevelFilter::Warn)
        .filter_module("sctk", log::LevelFilter::Warn)
        .format_timestamp(None)
        .format_level(true)
        .init();

    let cli = Cli::parse();
    let config = Config::discover();

    let viewer = match create_viewer(&config) {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Initialization failed: {e}");
            if let Err(dialog_err) = MessageDialogBuilder::default()
                .set_level(MessageLevel::Error)
                .set_title(APP_TITLE)
                .set_text(e.to_string())
                .alert()
                .show()
            {
                error!("Could not show the error dialog: {dialog_err}");
            }
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(&config, viewer, cli.model) {
        error!("Viewer exited with an error: {e}");
        return ExitCode::FAILURE;
    }
    info!("Bye");
    ExitCode::SUCCESS
}
