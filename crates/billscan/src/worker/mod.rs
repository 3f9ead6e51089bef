pub mod pool;
pub mod processor;
pub mod unit;

pub use pool::{StageBuilder, WorkerPool};
pub use processor::BatchProcessor;
pub use unit::{TaskHandle, TaskQueue, UnitOutcome, UnitReport, WorkUnit};

