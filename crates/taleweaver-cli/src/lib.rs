// Library interface for taleweaver-cli
// This allows integration tests to access the shell's helpers.

pub mod app;
pub mod theme;

pub use theme::Theme;
