pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod identity;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod text;
pub mod translate;
pub mod validate;
