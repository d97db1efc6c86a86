//! User-tunable settings and their site-wide defaults.

use nb_db::record::{filter, insert, update};
use nb_db::{now, Db, DbError, Id, Record};

use crate::user::User;

record! {
    /// A setting and the value used when a user has not chosen one.
    pub struct DefaultSetting in "base_defaultsetting" {
        name: String,
        description: Option<String>,
        value: i64,
    }
}

impl DefaultSetting {
    /// Stores a setting with its default and the label of each allowed value.
    pub fn define(
        db: &mut Db,
        name: &str,
        description: Option<&str>,
        value: i64,
        labels: &[(i64, &str)],
    ) -> Result<Self, DbError> {
        let mut setting = Self {
            id: None,
            name: name.to_string(),
            description: description.map(str::to_string),
            value,
        };
        db.atomic(|db| {
            let setting_id = insert(db, &mut setting)?;
            for (value, label) in labels {
                insert(
                    db,
                    &mut SettingLabel {
                        id: None,
                        setting_id,
                        value: *value,
                        label: label.to_string(),
                    },
                )?;
            }
            Ok::<_, DbError>(())
        })?;
        Ok(setting)
    }

    pub fn find_by_name(db: &mut Db, name: &str) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE name = ?", &[&name])
    }

    /// Allowed values with their labels, in value order.
    pub fn labels(&self, db: &mut Db) -> Result<Vec<SettingLabel>, DbError> {
        db.query_records("WHERE setting_id = ? ORDER BY value", &[&self.saved_id()?])
    }
}

record! {
    /// Display label for one value of a setting.
    pub struct SettingLabel in "base_settinglabel" {
        setting_id: Id<DefaultSetting>,
        value: i64,
        label: String,
    }
}

record! {
    /// A user's own value for a setting.
    pub struct UserSetting in "base_usersetting" {
        user_id: Id<User>,
        setting_id: Id<DefaultSetting>,
        value: i64,
        ctime: String,
    }
}

impl UserSetting {
    /// The user's value for the setting called `name`, else its default.
    ///
    /// `None` when no setting has that name.
    pub fn value_or_default(db: &mut Db, user_id: Id<User>, name: &str) -> Result<Option<i64>, DbError> {
        let Some(setting) = DefaultSetting::find_by_name(db, name)? else {
            return Ok(None);
        };
        let own: Option<Self> = db.query_record(
            "WHERE user_id = ? AND setting_id = ?",
            &[&user_id, &setting.saved_id()?],
        )?;
        Ok(Some(own.map_or(setting.value, |s| s.value)))
    }

    /// Stores `value` as the user's choice for `setting_id`.
    pub fn set(
        db: &mut Db,
        user_id: Id<User>,
        setting_id: Id<DefaultSetting>,
        value: i64,
    ) -> Result<Self, DbError> {
        let existing: Option<Self> = db.query_record(
            "WHERE user_id = ? AND setting_id = ?",
            &[&user_id, &setting_id],
        )?;
        match existing {
            Some(mut own) => {
                own.value = value;
                own.ctime = now();
                update(db, &own)?;
                Ok(own)
            }
            None => {
                let mut own = Self {
                    id: None,
                    user_id,
                    setting_id,
                    value,
                    ctime: now(),
                };
                insert(db, &mut own)?;
                Ok(own)
            }
        }
    }

    /// Every explicit choice of `user_id`.
    pub fn for_user(db: &mut Db, user_id: Id<User>) -> Result<Vec<Self>, DbError> {
        filter(db, "user_id", &user_id)
    }
}
