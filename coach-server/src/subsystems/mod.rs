pub mod conversation;
pub mod gateway;
pub mod session_locks;
