//! Data types for topics, sessions, voters and votes.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
