//! Sessions, reading activity, analytics events and guest bookkeeping.

use nb_db::record::{insert, update};
use nb_db::{now, Db, DbError, Id};

use crate::comment::Comment;
use crate::credentials::random_token;
use crate::source::Source;
use crate::user::User;

record! {
    /// A login session, identified to the client by `ctoken`.
    pub struct Session in "base_session" {
        user_id: Id<User>,
        ctime: String,
        lastactivity: Option<String>,
        ip: Option<String>,
        clienttime: Option<String>,
        /// `None` on sessions opened before client tokens were issued.
        ctoken: Option<String>,
    }
}

impl Session {
    /// Starts and stores a session with a fresh client token.
    pub fn open(db: &mut Db, user_id: Id<User>, ip: Option<&str>) -> Result<Self, DbError> {
        let ctime = now();
        let mut session = Self {
            id: None,
            user_id,
            lastactivity: Some(ctime.clone()),
            ctime,
            ip: ip.map(str::to_string),
            clienttime: None,
            ctoken: Some(random_token()),
        };
        insert(db, &mut session)?;
        tracing::debug!(user = user_id.get(), "opened session");
        Ok(session)
    }

    pub fn find_by_token(db: &mut Db, ctoken: &str) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE ctoken = ?", &[&ctoken])
    }

    /// Records activity now, with the client's own clock if it sent one.
    pub fn touch(&mut self, db: &mut Db, clienttime: Option<&str>) -> Result<(), DbError> {
        self.lastactivity = Some(now());
        if let Some(t) = clienttime {
            self.clienttime = Some(t.to_string());
        }
        update(db, self)
    }
}

record! {
    /// A comment displayed to a user.
    pub struct CommentSeen in "base_commentseen" {
        comment_id: Id<Comment>,
        session_id: Option<Id<Session>>,
        user_id: Id<User>,
        ctime: String,
    }
}

impl CommentSeen {
    pub fn new(comment_id: Id<Comment>, user_id: Id<User>, session_id: Option<Id<Session>>) -> Self {
        Self {
            id: None,
            comment_id,
            session_id,
            user_id,
            ctime: now(),
        }
    }

    /// Whether `user_id` has ever been shown `comment_id`.
    pub fn exists(db: &mut Db, comment_id: Id<Comment>, user_id: Id<User>) -> Result<bool, DbError> {
        let row = db.get_row(
            "SELECT 1 FROM base_commentseen WHERE comment_id = ? AND user_id = ? LIMIT 1",
            &[&comment_id, &user_id],
        )?;
        Ok(row.is_some())
    }
}

record! {
    /// A page of a source displayed to a user.
    pub struct PageSeen in "base_pageseen" {
        source_id: Id<Source>,
        page: i64,
        session_id: Option<Id<Session>>,
        user_id: Option<Id<User>>,
        ctime: String,
    }
}

impl PageSeen {
    pub fn new(source_id: Id<Source>, page: i64, user_id: Id<User>, session_id: Option<Id<Session>>) -> Self {
        Self {
            id: None,
            source_id,
            page,
            session_id,
            user_id: Some(user_id),
            ctime: now(),
        }
    }
}

record! {
    /// A user opened a source.
    pub struct AnalyticsVisit in "base_analyticsvisit" {
        source_id: Id<Source>,
        user_id: Option<Id<User>>,
        ctime: String,
    }
}

record! {
    /// A user operated a control while reading a source.
    pub struct AnalyticsClick in "base_analyticsclick" {
        source_id: Id<Source>,
        user_id: Option<Id<User>>,
        ctime: String,
        control: String,
        value: String,
    }
}

record! {
    /// A request that arrived on a landing page.
    pub struct Landing in "base_landing" {
        user_id: Id<User>,
        ctime: String,
        ip: Option<String>,
        client: Option<String>,
        referer: Option<String>,
        path: Option<String>,
    }
}

record! {
    /// A stretch of client inactivity within a session.
    pub struct Idle in "base_idle" {
        session_id: Id<Session>,
        t1: String,
        t2: String,
    }
}

record! {
    /// The lifetime of a guest account.
    pub struct GuestHistory in "base_guesthistory" {
        user_id: Id<User>,
        t_start: Option<String>,
        t_end: Option<String>,
    }
}

impl GuestHistory {
    pub fn start(db: &mut Db, user_id: Id<User>) -> Result<Self, DbError> {
        let mut entry = Self {
            id: None,
            user_id,
            t_start: Some(now()),
            t_end: None,
        };
        insert(db, &mut entry)?;
        Ok(entry)
    }

    pub fn close(&mut self, db: &mut Db) -> Result<(), DbError> {
        self.t_end = Some(now());
        update(db, self)
    }
}

record! {
    /// A guest that signed in to a real account.
    pub struct GuestLoginHistory in "base_guestloginhistory" {
        guest_id: Id<User>,
        user_id: Id<User>,
        ctime: Option<String>,
    }
}

record! {
    /// A notification run of some kind and when it last happened.
    pub struct Notification in "base_notification" {
        kind as "type": String,
        atime: Option<String>,
    }
}

impl Notification {
    /// Records that a notification of `kind` ran now.
    pub fn stamp(db: &mut Db, kind: &str) -> Result<Self, DbError> {
        let mut entry = Self {
            id: None,
            kind: kind.to_string(),
            atime: Some(now()),
        };
        insert(db, &mut entry)?;
        Ok(entry)
    }

    /// The most recent run of `kind`, if any.
    pub fn latest(db: &mut Db, kind: &str) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE type = ? ORDER BY atime DESC, id DESC", &[&kind])
    }
}
