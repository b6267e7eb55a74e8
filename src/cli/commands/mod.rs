pub mod init;
pub mod log;
pub mod show;
pub mod source_helpers;
pub mod status;
