pub mod cache_cmd;
pub mod config_cmd;
pub mod output;
pub mod renderer;
pub mod score_cmd;
pub mod usage_cmd;
