// Infrastructure layer - 基础设施层
// 数据库连接、Prometheus 指标、时钟、内存存储

pub mod clock;
pub mod database;
pub mod memory;
pub mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use database::Database;
pub use memory::MemoryStore;
