pub mod programs;
pub mod renderer;
pub mod shaders;
pub mod textures;
