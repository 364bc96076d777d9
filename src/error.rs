use std::result;
use thiserror::Error;

/// Indicates failures from the allocator collaborator: out-of-memory, or a
/// request the allocator cannot satisfy.
#[derive(Error, Clone, Debug)]
pub enum AllocError {
    #[error("allocator could not satisfy a request for {0} bytes")]
    OutOfSpace(usize),
}

pub type Result<T> = result::Result<T, AllocError>;

//-------------------------------------------------------------------------
