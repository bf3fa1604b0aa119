use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid header format: '{value}'. Expected 'Key: Value'")]
    InvalidHeaderFormat { value: String },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid stage '{value}'. Expected 'duration:target' (e.g., 30s:10).")]
    InvalidStageFormat { value: String },
    #[error("Invalid think time '{value}'. Expected a duration or 'min..max' (e.g., 500ms..1500ms).")]
    InvalidThinkTime { value: String },
    #[error("Invalid random field '{value}'. Expected 'name=min..max' (e.g., quantity=1..5).")]
    InvalidRandomField { value: String },
}
