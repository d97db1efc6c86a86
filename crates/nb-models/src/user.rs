//! Accounts and credential verification.

use std::fmt;

use nb_db::record::{filter, update};
use nb_db::{Db, DbError, Record};

use crate::credentials::{digests_match, generate_salt, legacy_digest, random_token, salted_digest};
use crate::ensemble::Membership;
use crate::OrNone;

record! {
    /// A registered or guest account.
    pub struct User in "base_user" {
        email: Option<String>,
        firstname: Option<String>,
        lastname: Option<String>,
        pseudonym: Option<String>,
        /// Confirmation key mailed to the user before the account is valid.
        confkey: Option<String>,
        guest: bool,
        valid: bool,
        #[serde(skip_serializing, default)]
        salt: Option<String>,
        #[serde(skip_serializing, default)]
        saltedhash: Option<String>,
    }
}

impl User {
    /// An unconfirmed account for `email`, with a fresh confirmation key.
    pub fn new(email: &str, firstname: Option<&str>, lastname: Option<&str>) -> Self {
        Self {
            id: None,
            email: Some(email.to_string()),
            firstname: firstname.map(str::to_string),
            lastname: lastname.map(str::to_string),
            pseudonym: None,
            confkey: Some(random_token()),
            guest: false,
            valid: false,
            salt: None,
            saltedhash: None,
        }
    }

    /// An anonymous guest account.
    pub fn new_guest() -> Self {
        Self {
            email: None,
            guest: true,
            ..Self::new("", None, None)
        }
    }

    /// Replaces the stored credentials with a digest of `plaintext`.
    ///
    /// Only the in-memory record changes; the caller persists it.
    pub fn set_password(&mut self, plaintext: &str) {
        let salt = generate_salt();
        self.saltedhash = Some(salted_digest(plaintext, &salt));
        self.salt = Some(salt);
    }

    /// Whether `plaintext` matches the stored password.
    ///
    /// Accounts without credentials never authenticate.
    pub fn authenticate(&self, plaintext: &str) -> bool {
        self.check_with(plaintext, salted_digest)
    }

    /// Whether `plaintext` matches a password stored by the pre-UTF-8 scheme.
    pub fn authenticate_legacy(&self, plaintext: &str) -> bool {
        self.check_with(plaintext, legacy_digest)
    }

    /// Re-hashes the password if `plaintext` only matches the legacy scheme.
    ///
    /// Returns `true` when the stored credentials were replaced; the caller
    /// persists the record.
    pub fn upgrade_legacy_password(&mut self, plaintext: &str) -> bool {
        if self.authenticate(plaintext) || !self.authenticate_legacy(plaintext) {
            return false;
        }
        self.set_password(plaintext);
        tracing::info!(user = ?self.id, "upgraded legacy password digest");
        true
    }

    fn check_with(&self, plaintext: &str, digest: fn(&str, &str) -> String) -> bool {
        match (&self.salt, &self.saltedhash) {
            (Some(salt), Some(stored)) => digests_match(&digest(plaintext, salt), stored),
            _ => false,
        }
    }

    /// Looks up an account by email address.
    pub fn find_by_email(db: &mut Db, email: &str) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE email = ?", &[&email])
    }

    /// Marks the account confirmed if `confkey` matches, and saves it.
    pub fn confirm(&mut self, db: &mut Db, confkey: &str) -> Result<bool, DbError> {
        if self.confkey.as_deref() != Some(confkey) {
            return Ok(false);
        }
        self.valid = true;
        update(db, self)?;
        Ok(true)
    }

    /// Ensembles this user belongs to, as membership rows.
    pub fn memberships(&self, db: &mut Db) -> Result<Vec<Membership>, DbError> {
        filter(db, "user_id", &self.saved_id()?)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "User {}: {} {} <{}>",
            OrNone(&self.id),
            OrNone(&self.firstname),
            OrNone(&self.lastname),
            OrNone(&self.email)
        )
    }
}
