// taskcal - calendar task manager core: query/filter engine and CSV import/export

pub mod api;
pub mod clock;
pub mod export;
pub mod filter;
pub mod import;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use api::{Api, Envelope, TaskInput};
pub use clock::{Clock, FixedClock, SystemClock};
pub use export::CsvExport;
pub use filter::{ExportCriteria, TaskCriteria};
pub use import::ImportOutcome;
pub use store::TaskStore;
pub use task::{NewTask, Priority, Status, Task};

// Re-export rusqlite for callers embedding the store
pub use rusqlite;
