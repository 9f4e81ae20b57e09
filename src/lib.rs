pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod etl;
pub mod monitoring;
pub mod normalize;
pub mod stats;
pub mod upstream;
