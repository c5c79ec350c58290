pub mod config;
pub mod db;
pub mod util;
pub mod vcs;

pub use config::AppConfig;
