pub mod audio;
pub mod encode;
pub mod error;
pub mod render;
pub mod util;

pub use error::{AnalyzerError, ContextError, RenderError};
pub use render::Rave;
