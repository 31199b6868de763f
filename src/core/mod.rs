pub mod downloader;
pub mod error;
pub mod events;
pub mod installer;
pub mod manifest;
pub mod model;
pub mod planner;
pub mod registry;
