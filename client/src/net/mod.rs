//! Networking modules for the trace API collaborator.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` defines the read contract and its error taxonomy, `http` implements
//! it over REST, and `config` parses endpoint settings from the environment.

pub mod api;
pub mod config;
pub mod http;
