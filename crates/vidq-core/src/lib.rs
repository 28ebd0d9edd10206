pub mod config;
pub mod logging;

pub mod adapters;
pub mod agent;
pub mod collab;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod selection;
pub mod storage;
