// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the simulation engine
//!
//! Only construction and one-shot readbacks surface errors. Per-frame problems
//! are logged and absorbed so the render loop never fails mid-stream.

use std::fmt;

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Main engine error type
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Fatal GPU setup failure; the engine is unusable afterwards
    Initialization(InitError),
    /// Reading a GPU surface back to the CPU failed
    Readback(String),
    /// A frame source handed over a malformed pixel buffer
    InvalidFrame(String),
    /// Configuration rejected at load or validation time
    Config(String),
    /// Filesystem errors (CLI input/output)
    Io(String),
}

/// GPU initialization errors
#[derive(Debug, Clone)]
pub enum InitError {
    /// No adapter matched the requested options
    NoAdapter(String),
    /// The adapter refused to create a device
    DeviceRequest(String),
    /// A stage shader or pipeline failed validation
    ShaderCompile(String),
    /// The adapter cannot satisfy the minimum limits
    Limits(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Initialization(e) => write!(f, "Initialization failed: {}", e),
            EngineError::Readback(msg) => write!(f, "GPU readback failed: {}", msg),
            EngineError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            EngineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            EngineError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::NoAdapter(msg) => write!(f, "No suitable GPU adapter: {}", msg),
            InitError::DeviceRequest(msg) => write!(f, "Failed to create GPU device: {}", msg),
            InitError::ShaderCompile(msg) => write!(f, "Shader compilation failed: {}", msg),
            InitError::Limits(msg) => write!(f, "Unsupported device limits: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}
impl std::error::Error for InitError {}

impl From<InitError> for EngineError {
    fn from(err: InitError) -> Self {
        EngineError::Initialization(err)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::Io(err.to_string())
    }
}
