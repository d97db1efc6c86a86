//! Comments, per-user marks and tags, and flagged threads.

use std::fmt;

use nb_db::record::{insert, update};
use nb_db::{now, Db, DbError, Id, Record};

use crate::choices::{CommentType, MarkType, RatingStatus, TagType, ThreadMarkType};
use crate::error::ModelError;
use crate::location::Location;
use crate::user::User;
use crate::OrNone;

record! {
    /// One post in the thread attached to a location.
    pub struct Comment in "base_comment" {
        location_id: Id<Location>,
        /// The comment replied to; `None` for the thread's first comment.
        parent_id: Option<Id<Comment>>,
        author_id: Id<User>,
        ctime: String,
        body: Option<String>,
        kind as "type": CommentType,
        signed: bool,
        deleted: bool,
        moderated: bool,
    }
}

impl Comment {
    /// A new thread-opening comment.
    pub fn new(location_id: Id<Location>, author_id: Id<User>, body: &str, kind: CommentType) -> Self {
        Self {
            id: None,
            location_id,
            parent_id: None,
            author_id,
            ctime: now(),
            body: Some(body.to_string()),
            kind,
            signed: true,
            deleted: false,
            moderated: false,
        }
    }

    /// A reply to this comment in the same thread.
    pub fn reply(&self, author_id: Id<User>, body: &str, kind: CommentType) -> Result<Self, DbError> {
        Ok(Self {
            parent_id: Some(self.saved_id()?),
            ..Self::new(self.location_id, author_id, body, kind)
        })
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Direct replies, oldest first.
    pub fn replies(&self, db: &mut Db) -> Result<Vec<Comment>, DbError> {
        db.query_records("WHERE parent_id = ? ORDER BY ctime, id", &[&self.saved_id()?])
    }

    pub fn marks(&self, db: &mut Db) -> Result<Vec<Mark>, DbError> {
        db.query_records("WHERE comment_id = ? ORDER BY id", &[&self.saved_id()?])
    }

    /// Users tagged in the comment.
    pub fn tagged_users(&self, db: &mut Db) -> Result<Vec<User>, DbError> {
        db.query_records(
            "WHERE id IN (SELECT individual_id FROM base_tag WHERE comment_id = ?) ORDER BY id",
            &[&self.saved_id()?],
        )
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 50;
        write!(f, "Comment {}: ", OrNone(&self.id))?;
        match self.body.as_deref() {
            Some(body) => {
                let cut = body.char_indices().nth(PREVIEW).map_or(body.len(), |(i, _)| i);
                write!(f, "{} ", &body[..cut])
            }
            None => f.write_str("None "),
        }
    }
}

record! {
    /// A user tagged in a comment.
    pub struct Tag in "base_tag" {
        kind as "type": TagType,
        /// `None` once the tagged account is deleted.
        individual_id: Option<Id<User>>,
        comment_id: Id<Comment>,
        /// When the tagged user was last reminded of the comment.
        last_reminder: Option<String>,
    }
}

impl Tag {
    pub fn new(individual_id: Id<User>, comment_id: Id<Comment>) -> Self {
        Self {
            id: None,
            kind: TagType::Individual,
            individual_id: Some(individual_id),
            comment_id,
            last_reminder: None,
        }
    }

    /// Stamps the reminder time and saves the tag.
    pub fn mark_reminded(&mut self, db: &mut Db) -> Result<(), DbError> {
        self.last_reminder = Some(now());
        update(db, self)
    }
}

record! {
    /// A user's reaction to a comment.
    pub struct Mark in "base_mark" {
        ctime: String,
        kind as "type": MarkType,
        comment_id: Id<Comment>,
        user_id: Id<User>,
    }
}

impl Mark {
    pub fn new(comment_id: Id<Comment>, user_id: Id<User>, kind: MarkType) -> Self {
        Self {
            id: None,
            ctime: now(),
            kind,
            comment_id,
            user_id,
        }
    }
}

record! {
    /// A flag raised on a thread (question, star, summary request).
    pub struct ThreadMark in "base_threadmark" {
        active: bool,
        kind as "type": ThreadMarkType,
        ctime: String,
        location_id: Id<Location>,
        comment_id: Option<Id<Comment>>,
        user_id: Id<User>,
    }
}

impl ThreadMark {
    pub fn new(
        location_id: Id<Location>,
        user_id: Id<User>,
        kind: ThreadMarkType,
        comment_id: Option<Id<Comment>>,
    ) -> Self {
        Self {
            id: None,
            active: true,
            kind,
            ctime: now(),
            location_id,
            comment_id,
            user_id,
        }
    }

    /// Copies the current state of the mark into its history.
    pub fn record_history(&self, db: &mut Db) -> Result<ThreadMarkHistory, DbError> {
        let mut entry = ThreadMarkHistory {
            id: None,
            active: self.active,
            kind: self.kind,
            ctime: self.ctime.clone(),
            location_id: self.location_id,
            comment_id: self.comment_id,
            user_id: self.user_id,
            threadmark_id: Some(self.saved_id()?),
        };
        insert(db, &mut entry)?;
        Ok(entry)
    }

    /// Lowers the flag, keeping the previous state in the history.
    pub fn deactivate(&mut self, db: &mut Db) -> Result<(), DbError> {
        if !self.active {
            return Ok(());
        }
        let mut next = self.clone();
        next.active = false;
        next.ctime = now();
        db.atomic(|db| {
            self.record_history(db)?;
            update(db, &next)
        })?;
        *self = next;
        Ok(())
    }

    pub fn history(&self, db: &mut Db) -> Result<Vec<ThreadMarkHistory>, DbError> {
        db.query_records("WHERE threadmark_id = ? ORDER BY id", &[&self.saved_id()?])
    }

    pub fn ratings(&self, db: &mut Db) -> Result<Vec<ReplyRating>, DbError> {
        db.query_records("WHERE threadmark_id = ? ORDER BY id", &[&self.saved_id()?])
    }
}

record! {
    /// Earlier state of a [`ThreadMark`].
    pub struct ThreadMarkHistory in "base_threadmarkhistory" {
        active: bool,
        kind as "type": ThreadMarkType,
        ctime: String,
        location_id: Id<Location>,
        comment_id: Option<Id<Comment>>,
        user_id: Id<User>,
        /// `None` on entries written before the mark was tracked.
        threadmark_id: Option<Id<ThreadMark>>,
    }
}

record! {
    /// How well a reply answered a flagged thread.
    pub struct ReplyRating in "base_replyrating" {
        threadmark_id: Id<ThreadMark>,
        comment_id: Id<Comment>,
        ctime: String,
        status: RatingStatus,
    }
}

impl ReplyRating {
    pub fn new(threadmark_id: Id<ThreadMark>, comment_id: Id<Comment>) -> Self {
        Self {
            id: None,
            threadmark_id,
            comment_id,
            ctime: now(),
            status: RatingStatus::Unresolved,
        }
    }

    /// Moves the rating to `status`, persisting it if the rating is saved.
    ///
    /// # Errors
    ///
    /// `ModelError::StatusRegression` if `status` precedes the current one.
    pub fn set_status(&mut self, db: &mut Db, status: RatingStatus) -> Result<(), ModelError> {
        if status < self.status {
            return Err(ModelError::StatusRegression {
                from: self.status,
                to: status,
            });
        }
        if status == self.status {
            return Ok(());
        }
        let previous = self.status;
        self.status = status;
        if self.id.is_some() {
            if let Err(e) = update(db, self) {
                self.status = previous;
                return Err(e.into());
            }
        }
        Ok(())
    }
}
