//! Interactive viewer for textured Wavefront OBJ/MTL meshes.
//!
//! [`app::Viewer`] owns the model, camera and device resources; the
//! [`ui`] module hosts it in an eframe window.

pub mod app;
pub mod core;
pub mod error;
pub mod gpu;
pub mod io;
pub mod pipeline;
pub mod scene;
pub mod timing;
pub mod ui;
