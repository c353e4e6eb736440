mod local_onnx_provider;
mod mock_provider;

pub use local_onnx_provider::*;
pub use mock_provider::*;
