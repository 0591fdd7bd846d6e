//! Filesystem tools
//!
//! Every path parameter resolves through the workspace confinement layer
//! before anything is read or written.

mod delete;
mod find;
mod info;
mod list;
mod move_file;
mod patch;
mod read;
mod write;

pub use delete::DeleteFile;
pub use find::FindFiles;
pub use info::{FileExists, GetFileInfo};
pub use list::ListDirectory;
pub use move_file::MoveFile;
pub use patch::ApplyPatch;
pub use read::ReadFile;
pub use write::WriteFile;
