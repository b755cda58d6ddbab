//! 基础设施层
//!
//! 持有稀缺资源（源页面），只暴露能力

pub mod host;
pub mod js_executor;

pub use host::{HostAutomation, SourceId, SurfaceId};
pub use js_executor::JsExecutor;
