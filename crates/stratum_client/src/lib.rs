pub mod app;
pub mod renderer;
pub mod settings;
pub mod world;
