pub mod capture_flow;
pub mod item_ctx;

pub use capture_flow::{CaptureFlow, ItemOutcome};
pub use item_ctx::ItemCtx;
