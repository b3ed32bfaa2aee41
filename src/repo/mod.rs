pub mod event_repo;
pub mod session_repo;
