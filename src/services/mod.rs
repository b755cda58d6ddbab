//! 服务层 - 业务能力层
//!
//! 每个服务只做一件事，不持有流程状态

pub mod csv_export;
pub mod grid_adapter;
pub mod page_adapter;
pub mod pagination;
pub mod pdf_writer;

pub use grid_adapter::GridPageAdapter;
pub use page_adapter::{DiscoveredAction, PageAdapter, PagerLink, PaginationSnapshot};
pub use pagination::{find_next_page, NextPageChoice, NextPageStrategy};
pub use pdf_writer::PdfWriter;
