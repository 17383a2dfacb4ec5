//! Data Transfer Objects sent to the build server

pub mod build;
