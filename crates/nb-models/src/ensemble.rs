//! Ensembles (classes), their folders and sections, and membership.

use std::fmt;

use nb_db::record::{filter, insert, update};
use nb_db::{now, Db, DbError, Id, Record};

use crate::choices::SectionAssignment;
use crate::credentials::random_token;
use crate::source::Ownership;
use crate::user::User;
use crate::OrNone;

record! {
    /// A class or workspace that groups users, sources and sections.
    pub struct Ensemble in "base_ensemble" {
        name: String,
        description: String,
        allow_staffonly: bool,
        allow_anonymous: bool,
        /// Comments may be restricted to the users they tag.
        allow_tag_private: bool,
        allow_guest: bool,
        /// Shared key that lets anyone holding it join.
        invitekey: Option<String>,
        use_invitekey: bool,
        allow_download: bool,
        allow_ondemand: bool,
        default_pause: bool,
        section_assignment: Option<SectionAssignment>,
        /// Free-form JSON used by processing jobs.
        metadata: Option<String>,
    }
}

impl Ensemble {
    /// Description stored when none is given.
    pub const NO_DESCRIPTION: &'static str = "No description available";

    /// An ensemble with the stored column defaults and a fresh invite key.
    ///
    /// `None` for `description` stores [`Ensemble::NO_DESCRIPTION`].
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            description: description.unwrap_or(Self::NO_DESCRIPTION).to_string(),
            allow_staffonly: true,
            allow_anonymous: true,
            allow_tag_private: true,
            allow_guest: false,
            invitekey: Some(random_token()),
            use_invitekey: true,
            allow_download: true,
            allow_ondemand: false,
            default_pause: false,
            section_assignment: Some(SectionAssignment::NoAssignment),
            metadata: None,
        }
    }

    /// Replaces the shared invite key, returning the new one.
    pub fn generate_invite_key(&mut self) -> &str {
        self.invitekey.insert(random_token())
    }

    pub fn find_by_invite_key(db: &mut Db, key: &str) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE invitekey = ?", &[&key])
    }

    /// Users with a live (not deleted) membership.
    pub fn members(&self, db: &mut Db) -> Result<Vec<User>, DbError> {
        db.query_records(
            "WHERE id IN (
                SELECT user_id FROM base_membership WHERE ensemble_id = ? AND deleted = 0
             ) ORDER BY id",
            &[&self.saved_id()?],
        )
    }

    pub fn sections(&self, db: &mut Db) -> Result<Vec<Section>, DbError> {
        filter(db, "ensemble_id", &self.saved_id()?)
    }

    /// Top-level folders; nested ones hang off [`Folder::children`].
    pub fn root_folders(&self, db: &mut Db) -> Result<Vec<Folder>, DbError> {
        db.query_records(
            "WHERE ensemble_id = ? AND parent_id IS NULL ORDER BY name",
            &[&self.saved_id()?],
        )
    }

    /// Sources shared with this ensemble and not withdrawn.
    pub fn ownerships(&self, db: &mut Db) -> Result<Vec<Ownership>, DbError> {
        db.query_records(
            "WHERE ensemble_id = ? AND deleted = 0 ORDER BY published",
            &[&self.saved_id()?],
        )
    }
}

impl fmt::Display for Ensemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ensemble {}: {}", OrNone(&self.id), self.name)
    }
}

record! {
    /// A folder inside an ensemble, optionally nested.
    pub struct Folder in "base_folder" {
        parent_id: Option<Id<Folder>>,
        ensemble_id: Id<Ensemble>,
        name: String,
    }
}

impl Folder {
    pub fn new(ensemble_id: Id<Ensemble>, parent_id: Option<Id<Folder>>, name: &str) -> Self {
        Self {
            id: None,
            parent_id,
            ensemble_id,
            name: name.to_string(),
        }
    }

    pub fn children(&self, db: &mut Db) -> Result<Vec<Folder>, DbError> {
        filter(db, "parent_id", &self.saved_id()?)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Folder {}: {}", OrNone(&self.id), self.name)
    }
}

record! {
    /// A subdivision of an ensemble's members.
    pub struct Section in "base_section" {
        name: String,
        ensemble_id: Id<Ensemble>,
    }
}

impl Section {
    pub fn new(ensemble_id: Id<Ensemble>, name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            ensemble_id,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Section {}: {}", OrNone(&self.id), self.name)
    }
}

record! {
    /// A personal invitation for one user to join an ensemble.
    pub struct Invite in "base_invite" {
        key: String,
        user_id: Id<User>,
        ensemble_id: Id<Ensemble>,
        admin: bool,
        ctime: Option<String>,
        section_id: Option<Id<Section>>,
    }
}

impl Invite {
    /// An invitation with a freshly generated key.
    pub fn new(
        user_id: Id<User>,
        ensemble_id: Id<Ensemble>,
        admin: bool,
        section_id: Option<Id<Section>>,
    ) -> Self {
        Self {
            id: None,
            key: random_token(),
            user_id,
            ensemble_id,
            admin,
            ctime: Some(now()),
            section_id,
        }
    }

    pub fn find_by_key(db: &mut Db, key: &str) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE key = ?", &[&key])
    }

    /// Turns the invitation into a membership.
    ///
    /// An existing membership is revived and takes the invite's admin flag
    /// and section.
    pub fn accept(&self, db: &mut Db) -> Result<Membership, DbError> {
        db.atomic(|db| {
            match Membership::find(db, self.user_id, self.ensemble_id)? {
                Some(mut membership) => {
                    membership.admin = self.admin;
                    membership.section_id = self.section_id;
                    membership.deleted = false;
                    update(db, &membership)?;
                    Ok(membership)
                }
                None => {
                    let mut membership = Membership::new(self.user_id, self.ensemble_id);
                    membership.admin = self.admin;
                    membership.section_id = self.section_id;
                    insert(db, &mut membership)?;
                    Ok(membership)
                }
            }
        })
    }
}

impl fmt::Display for Invite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invite {}: {}", OrNone(&self.id), self.key)
    }
}

record! {
    /// Binds one user to one ensemble, optionally within a section.
    pub struct Membership in "base_membership" {
        user_id: Id<User>,
        ensemble_id: Id<Ensemble>,
        section_id: Option<Id<Section>>,
        admin: bool,
        deleted: bool,
        guest: bool,
    }
}

impl Membership {
    pub fn new(user_id: Id<User>, ensemble_id: Id<Ensemble>) -> Self {
        Self {
            id: None,
            user_id,
            ensemble_id,
            section_id: None,
            admin: false,
            deleted: false,
            guest: false,
        }
    }

    /// The membership of `user_id` in `ensemble_id`, deleted or not.
    pub fn find(
        db: &mut Db,
        user_id: Id<User>,
        ensemble_id: Id<Ensemble>,
    ) -> Result<Option<Self>, DbError> {
        db.query_record(
            "WHERE user_id = ? AND ensemble_id = ?",
            &[&user_id, &ensemble_id],
        )
    }

    /// Live memberships of `user_id`.
    pub fn for_user(db: &mut Db, user_id: Id<User>) -> Result<Vec<Self>, DbError> {
        db.query_records("WHERE user_id = ? AND deleted = 0 ORDER BY id", &[&user_id])
    }

    /// Whether the member administers the ensemble.
    pub fn is_admin(&self) -> bool {
        self.admin && !self.deleted
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Membership {}: (user {}, ensemble {})",
            OrNone(&self.id),
            self.user_id,
            self.ensemble_id
        )
    }
}
