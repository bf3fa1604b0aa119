//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;


pub use cli::LoadArgs;
pub use types::{
    HttpMethod, IdempotencyMode, OutputFormat, PositiveU64, PositiveUsize, RampStage, RandomField,
    ThinkTime,
};

pub(crate) use parsers::{parse_duration_arg, parse_header};
