pub mod cancellation;
pub mod config;
pub mod driver;
pub mod iterative;
pub mod partitioner;
pub mod recursive;
pub mod search_context;
pub mod search_result;
mod spinlock;
pub mod threading;
pub mod tree;
pub mod work_order;

pub use cancellation::CancellationToken;
pub use config::{DriverKind, Scoring, SearchConfig};
pub use driver::{MinMaxDriver, driver_for};
pub use iterative::IterativeMinMaxDriver;
pub use partitioner::{MinMaxPartitioner, aggregate};
pub use recursive::RecursiveMinMaxDriver;
pub use search_context::EvaluationContext;
pub use search_result::{AiResult, ResultSource};
pub use threading::{
    CountdownLatch, DispatchStrategy, MultiThreadedDispatchStrategy,
    SingleThreadedDispatchStrategy,
};
pub use tree::SearchTree;
pub use work_order::{EvaluationStrategy, WorkOrder, WorkResult};
