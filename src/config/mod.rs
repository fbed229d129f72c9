//! Configuration models for the admission queue.

pub mod queue;

pub use queue::QueueConfig;
