// Library for tests to access modules

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod emitter;
pub mod error;
pub mod models;
pub mod runtime;
pub mod sink;
pub mod version;
