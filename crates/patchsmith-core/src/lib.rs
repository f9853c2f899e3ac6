pub mod prompts;
pub mod services;
mod session;
pub mod shared;

pub use session::Session;
pub use shared::config::Settings;
pub use shared::response::{
    EditRecord, EditSource, FileStatus, ParsedResponse, SearchReplaceBlock,
};
pub use shared::task::TaskState;
