//! Core domain types
//!
//! This module contains the structures exchanged with the build server.
//! They are shared between the transport client (which encodes and decodes
//! them) and the command-line tool (which acts on them).

pub mod build;
pub mod config;
pub mod event;
pub mod pipe;
