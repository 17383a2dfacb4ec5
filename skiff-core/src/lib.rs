//! Skiff Core
//!
//! Core types shared by the skiff client and command-line tool.
//!
//! This crate contains:
//! - Domain types: Pipes, builds, job configuration and build events
//! - DTOs: Request bodies sent to the build server

pub mod domain;
pub mod dto;
