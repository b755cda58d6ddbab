pub mod naming;
pub mod run_state;
pub mod work_item;

pub use naming::{build_display_name, file_stem, sanitize_display_name, RowIndexRule};
pub use run_state::{clamp_delay_ms, RunState, DEFAULT_INTER_ITEM_DELAY_MS, MIN_INTER_ITEM_DELAY_MS};
pub use work_item::{QueueEntry, WorkItem};
