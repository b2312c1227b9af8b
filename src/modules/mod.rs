pub mod astar;
pub mod config;
pub mod context;
pub mod cost;
pub mod debug;
pub mod error;
pub mod escalation;
pub mod geometry;
pub mod grid;
pub mod lanes;
pub mod navigator;
pub mod outcome;
pub mod search;
pub mod sim;
pub mod state;
pub mod stats;
pub mod stepper;
pub mod storage;
pub mod store;
pub mod world;
