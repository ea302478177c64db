pub mod codec;
pub mod ids;
pub mod lock;
pub mod ops;
pub mod repo;
pub mod state;
