pub mod engine;
pub mod queue;

pub use engine::PushEngine;
pub use queue::SubmissionQueue;
