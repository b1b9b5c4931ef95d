pub mod backend;
pub mod types;

pub use backend::{CaptureTarget, MockFramebuffer, capture_target};
pub use types::{Capture, CaptureError, CaptureResult};
