pub mod config;
pub mod error;
pub mod logging;

// Orchestrator core
pub mod dispatcher;
pub mod job;
pub mod limiter;
pub mod poll;
pub mod range;
pub mod recorder;
pub mod run;

// External collaborators
pub mod checksum;
pub mod http;
pub mod service;
pub mod sink;
pub mod storage;
pub mod tabular;
pub mod transfer;
