pub mod base;
pub mod endpoints;
pub mod pool;

pub use base::{CrawlerConfig, CrawlerSession};
pub use endpoints::{normalize_list, CurrentLotInfo};
pub use pool::CrawlerPool;
</content>
