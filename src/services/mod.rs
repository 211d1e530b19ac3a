pub mod approvals;
pub mod artworks;
pub mod auth;
pub mod feedback;
pub mod init;
pub mod links;
pub mod speech;
pub mod storage;
