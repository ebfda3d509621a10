pub mod app;
pub mod audio;
pub mod clock;
pub mod config;
pub mod display;
pub mod input;
pub mod library;
pub mod model;
pub mod navigation;
pub mod playback;
pub mod render;
pub mod scroll;
pub mod volume;
