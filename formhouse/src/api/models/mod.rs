//! Request/response data structures for the API.

pub mod storage;
pub mod submissions;
pub mod system;
