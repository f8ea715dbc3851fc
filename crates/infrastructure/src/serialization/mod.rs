//! JSON files of a workspace.
//!
//! Every file is written as 2-space indented UTF-8 JSON with a trailing
//! newline, replaced atomically, so workspaces diff cleanly under version
//! control.

mod json;

pub use json::{SerializationError, read_json_file, to_json_stable, write_json_file};
