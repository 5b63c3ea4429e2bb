//! Terminal user interface components

pub mod chat;
