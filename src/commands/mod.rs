pub mod show;
pub mod status;
pub mod upload;
