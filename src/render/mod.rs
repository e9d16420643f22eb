pub mod canvas;
pub mod color;
pub mod features;
pub mod frame;
pub mod geometry;
pub mod gpu;
pub mod host;
pub mod pipeline;
pub mod rave;
pub mod shapes;

pub use rave::{band_configs, Rave};
