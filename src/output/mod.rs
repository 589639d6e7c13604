//! Durable outputs: the run log and saved scene lists

pub mod run_log;
pub mod scene_list;

pub use run_log::RunLogger;
pub use scene_list::SceneList;
