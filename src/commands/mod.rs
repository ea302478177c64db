pub mod add;
pub mod init;
pub mod lifecycle;
pub mod select;
pub mod show;
pub mod state;
pub mod sync;
pub mod update;
