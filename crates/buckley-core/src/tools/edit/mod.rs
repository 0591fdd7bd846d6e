//! Editing tools - exact replacement, pattern replacement, line surgery
//!
//! All of these write immediately and attach a diff preview describing what
//! changed; the host renders the preview instead of echoing file content.

mod edit_file;
mod lines;
mod search_replace;

pub use edit_file::EditFile;
pub use lines::{DeleteLines, InsertText};
pub use search_replace::SearchReplace;
