pub mod batch;
pub mod pool;
pub mod scanner;

pub use batch::{run_batch, BatchSummary};
pub use pool::{WorkItem, WorkResult, WorkerPool};
pub use scanner::scan;

pub use crossbeam_channel;
