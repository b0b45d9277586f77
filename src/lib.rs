pub mod error;
pub mod palette;
pub mod profiling;

// Layout generation and transition state
pub mod sampler;
pub mod layout;
pub mod transition;

// Visual groups
pub mod foliage;
pub mod ornament;
pub mod star;

pub mod camera;
pub mod config;
pub mod gpu;
pub mod visualiser;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(not(target_arch = "wasm32"))]
pub mod viewer;
