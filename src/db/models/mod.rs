//! Database models, one file per table family.
//! Everything is re-exported at `crate::db::models` so callers can
//! `use crate::db::models::*;`.

mod approval;
mod artwork;
mod feedback;
mod project;
mod shared_link;
mod user;

pub use self::approval::*;
pub use self::artwork::*;
pub use self::feedback::*;
pub use self::project::*;
pub use self::shared_link::*;
pub use self::user::*;
