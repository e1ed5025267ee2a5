//! Core transform/expiry/middle/output engine for turning OSM data into
//! relational geometry tables.
//!
//! The OSM file parser, the database driver, CLI argument parsing details,
//! and the flat-node cache's storage medium are external collaborators;
//! this crate exposes only the narrow interfaces it needs from them
//! ([`collab::Source`], [`collab::RowSink`]).

pub mod collab;
pub mod config;
pub mod dependency;
pub mod error;
pub mod expiry;
pub mod geometry;
pub mod middle;
pub mod output;
pub mod pipeline;
pub mod reproject;
pub mod style;
pub mod tags;
