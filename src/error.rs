// Crate error type. Every variant states *where* things went wrong.
// The simulation core never returns these; only the host side
// (window, camera, config, snapshots) can fail.
use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),   // Creating the window failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed
    #[error("Camera init error: {0}")]
    CameraInit(String),   // Opening/starting the camera failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String),  // Grabbing/decoding a frame failed
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] image::ImageError),
}
