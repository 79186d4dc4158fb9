//! Agent-facing tools

pub mod run_shell_cmd;
pub mod search_relevant_files;
pub mod str_replace_editor;
pub mod view_directory;

pub use run_shell_cmd::RunShellCmdTool;
pub use search_relevant_files::SearchRelevantFilesTool;
pub use str_replace_editor::StrReplaceEditorTool;
pub use view_directory::ViewDirectoryTool;
