//! Terminal tracker of where your focus goes. It samples the focused application (and the
//! active tab for browsers) about once a second, keeps every sample in a SQLite log and shows a
//! running breakdown of the current session.

pub mod cli;
pub mod config;
pub mod probe;
pub mod storage;
pub mod tracker;
pub mod utils;
