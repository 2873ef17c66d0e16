pub mod preprocessor;
pub mod response_parser;
pub mod retry;

pub use preprocessor::Preprocessor;
pub use response_parser::{ParsedResponse, ResponseParser, ResponseValidation, NO_EXPLANATION_PLACEHOLDER};
pub use retry::{RetryError, RetryPolicy};
