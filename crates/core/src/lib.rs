#![forbid(unsafe_code)]

pub mod chat;
pub mod curriculum;
pub mod grading;
pub mod model;
pub mod progress;
pub mod retrieval;
pub mod time;
pub mod validate;

pub use time::Clock;
