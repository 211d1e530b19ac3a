mod approval;
mod artwork;
mod feedback;
mod project;
mod shared_link;
mod user;

pub use approval::{ApprovalRepository, ReminderOutcome};
pub use artwork::ArtworkRepository;
pub use feedback::FeedbackRepository;
pub use project::ProjectRepository;
pub use shared_link::SharedLinkRepository;
pub use user::UserRepository;
