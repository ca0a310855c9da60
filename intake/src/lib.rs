pub mod reader;
pub mod registry;
pub mod validator;

pub use reader::{read_records, RawRecord};
pub use registry::SourceRegistry;
pub use validator::{validate, FailedRecord, FieldError, ValidRecord, ValidationOutcome, ValidationTally};
