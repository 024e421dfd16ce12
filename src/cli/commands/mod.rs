pub mod init;
pub mod ping;
pub mod report;
pub mod tenant;
pub mod token;
