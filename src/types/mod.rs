pub mod result;

pub use result::{FailureKind, RunFailure, RunResult};
