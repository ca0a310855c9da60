pub mod folders;
pub mod notify;
pub mod pipeline;
pub mod worker_pool;

pub use notify::{LoggingNotifier, NotifyOperator, NotifyOwner};
pub use pipeline::{process_file, FileOutcome};
pub use worker_pool::{process_files_parallel, RunResult};
