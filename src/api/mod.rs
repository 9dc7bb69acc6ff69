//! HTTP API handlers

pub mod chat;
