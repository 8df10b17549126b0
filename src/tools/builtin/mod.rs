//! Built-in tools: the standard agent tool set

mod edit_file;
mod glob;
mod grep;
mod read_file;
mod shell;
mod write_file;

pub use edit_file::EditFileTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use read_file::ReadFileTool;
pub use shell::ShellTool;
pub use write_file::WriteFileTool;
