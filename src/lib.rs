pub mod cluster;
pub mod clustering;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod model;
pub mod point;
