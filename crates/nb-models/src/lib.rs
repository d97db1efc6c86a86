//! Entity records of the NB annotation platform.
//!
//! One Rust struct per `base_*` table, each implementing [`nb_db::Record`]
//! so the generic helpers in [`nb_db::record`] (`find`, `filter`, `insert`,
//! `update`, `save`, `delete`) work on it. Integer-coded columns are typed
//! [`choices`] enums and foreign keys are [`nb_db::Id`] values.
//!
//! # Entity groups
//!
//! | Module | Records |
//! |--------|---------|
//! | `user` | `User` |
//! | `ensemble` | `Ensemble`, `Folder`, `Section`, `Invite`, `Membership` |
//! | `source` | `Source`, `Html5Info`, `YoutubeInfo`, `OnDemandInfo`, `Ownership`, `SourceVersion`, `ProcessQueue`, `FileDownload` |
//! | `location` | `Location`, `Html5Location` |
//! | `comment` | `Comment`, `Tag`, `Mark`, `ThreadMark`, `ThreadMarkHistory`, `ReplyRating` |
//! | `activity` | `Session`, `CommentSeen`, `PageSeen`, `AnalyticsVisit`, `AnalyticsClick`, `Landing`, `Idle`, `GuestHistory`, `GuestLoginHistory`, `Notification` |
//! | `settings` | `DefaultSetting`, `SettingLabel`, `UserSetting` |
//! | `grading` | `AssignmentGrade`, `AssignmentGradeHistory`, `LabelCategory`, `LabelCategoryCaption`, `CommentLabel`, `CommentLabelHistory` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use nb_db::record::insert;
//! use nb_models::User;
//!
//! let mut user = User::new("ada@example.org", Some("Ada"), None);
//! user.set_password("correct horse");
//! insert(&mut db, &mut user)?;
//! assert!(user.authenticate("correct horse"));
//! ```

#[macro_use]
mod macros;

mod activity;
pub mod choices;
mod comment;
pub mod credentials;
mod ensemble;
mod error;
mod grading;
mod location;
mod settings;
mod source;
mod user;

pub use activity::{
    AnalyticsClick, AnalyticsVisit, CommentSeen, GuestHistory, GuestLoginHistory, Idle, Landing,
    Notification, PageSeen, Session,
};
pub use choices::{
    CommentType, LabelScope, LabelVisibility, MarkType, RatingStatus, SectionAssignment,
    SourceType, TagType, ThreadMarkType,
};
pub use comment::{Comment, Mark, ReplyRating, Tag, ThreadMark, ThreadMarkHistory};
pub use ensemble::{Ensemble, Folder, Invite, Membership, Section};
pub use error::ModelError;
pub use grading::{
    AssignmentGrade, AssignmentGradeHistory, CommentLabel, CommentLabelHistory, LabelCategory,
    LabelCategoryCaption,
};
pub use location::{Html5Location, Location};
pub use settings::{DefaultSetting, SettingLabel, UserSetting};
pub use source::{
    FileDownload, Html5Info, OnDemandInfo, Ownership, ProcessQueue, Source, SourceVersion,
    YoutubeInfo,
};
pub use user::User;

use std::fmt;

/// Displays an optional field, printing `None` when it is unset.
pub(crate) struct OrNone<'a, T>(pub(crate) &'a Option<T>);

impl<T: fmt::Display> fmt::Display for OrNone<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("None"),
        }
    }
}
