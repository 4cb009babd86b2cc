use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error(
        "No {family} instance type offers at least {vcpus} vCPUs and {memory_mib} MiB; \
         set an explicit instance type for this capacity"
    )]
    UnsupportedCapacity {
        family: String,
        vcpus: u32,
        memory_mib: u64,
    },

    #[error("Invalid image specification: {0}")]
    InvalidImageSpec(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
