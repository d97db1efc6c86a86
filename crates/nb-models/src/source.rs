//! Sources (documents and media), how they are shared, and their history.

use std::fmt;

use nb_db::record::{filter, insert, update};
use nb_db::{now, Db, DbError, Id, Record};

use crate::choices::SourceType;
use crate::ensemble::{Ensemble, Folder};
use crate::error::ModelError;
use crate::user::User;
use crate::OrNone;

record! {
    /// An uploaded or linked document.
    ///
    /// `version` counts revisions; each superseded revision is kept as a
    /// [`SourceVersion`] row.
    pub struct Source in "base_source" {
        title: String,
        submittedby_id: Option<Id<User>>,
        numpages: i64,
        w: i64,
        h: i64,
        rotation: i64,
        version: i64,
        kind as "type": SourceType,
        x0: i64,
        y0: i64,
    }
}

impl Source {
    /// Title stored when none is given.
    pub const UNTITLED: &'static str = "untitled";

    pub fn new(title: &str, kind: SourceType, submittedby_id: Option<Id<User>>) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            submittedby_id,
            numpages: 0,
            w: 0,
            h: 0,
            rotation: 0,
            version: 0,
            kind,
            x0: 0,
            y0: 0,
        }
    }

    /// Archives the current revision and bumps `version`.
    ///
    /// The snapshot is stamped `published` with the time it was superseded.
    /// The snapshot insert and the source update commit together.
    pub fn archive_version(&mut self, db: &mut Db) -> Result<SourceVersion, ModelError> {
        let source_id = self.saved_id()?;
        let mut snapshot = SourceVersion {
            id: None,
            title: self.title.clone(),
            submittedby_id: self.submittedby_id,
            numpages: self.numpages,
            w: self.w,
            h: self.h,
            rotation: self.rotation,
            version: self.version,
            published: now(),
            source_id: Some(source_id),
        };

        let mut next = self.clone();
        next.version += 1;
        db.atomic(|db| -> Result<(), DbError> {
            insert(db, &mut snapshot)?;
            update(db, &next)
        })?;

        tracing::info!(
            source = source_id.get(),
            archived = snapshot.version,
            current = next.version,
            "archived source version"
        );
        *self = next;
        Ok(snapshot)
    }

    /// Archived revisions, oldest first.
    pub fn versions(&self, db: &mut Db) -> Result<Vec<SourceVersion>, DbError> {
        db.query_records("WHERE source_id = ? ORDER BY version", &[&self.saved_id()?])
    }

    pub fn html5_info(&self, db: &mut Db) -> Result<Option<Html5Info>, DbError> {
        db.query_record("WHERE source_id = ?", &[&self.saved_id()?])
    }

    pub fn youtube_info(&self, db: &mut Db) -> Result<Option<YoutubeInfo>, DbError> {
        db.query_record("WHERE source_id = ?", &[&self.saved_id()?])
    }

    pub fn ondemand_info(&self, db: &mut Db) -> Result<Option<OnDemandInfo>, DbError> {
        db.query_record("WHERE source_id = ?", &[&self.saved_id()?])
    }

    /// Every ensemble share of this source, withdrawn ones included.
    pub fn ownerships(&self, db: &mut Db) -> Result<Vec<Ownership>, DbError> {
        filter(db, "source_id", &self.saved_id()?)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source {}: {}", OrNone(&self.id), self.title)
    }
}

record! {
    /// The video key of a YouTube source.
    pub struct YoutubeInfo in "base_youtubeinfo" {
        source_id: Id<Source>,
        key: Option<String>,
    }
}

impl fmt::Display for YoutubeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YoutubeInfo {}: {}", OrNone(&self.id), OrNone(&self.key))
    }
}

record! {
    /// Where an HTML5 source lives.
    pub struct Html5Info in "base_html5info" {
        source_id: Id<Source>,
        url: Option<String>,
    }
}

impl fmt::Display for Html5Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTML5Info {}: {}", OrNone(&self.id), OrNone(&self.url))
    }
}

record! {
    /// A PDF added to an ensemble by pointing at its URL.
    pub struct OnDemandInfo in "base_ondemandinfo" {
        ensemble_id: Id<Ensemble>,
        source_id: Id<Source>,
        url: Option<String>,
    }
}

impl OnDemandInfo {
    /// Records that `source_id` was fetched on demand from `url`.
    ///
    /// Refused unless the ensemble allows on-demand sources.
    pub fn register(
        db: &mut Db,
        ensemble: &Ensemble,
        source_id: Id<Source>,
        url: &str,
    ) -> Result<Self, ModelError> {
        let ensemble_id = ensemble.saved_id()?;
        if !ensemble.allow_ondemand {
            return Err(ModelError::OnDemandDisabled {
                ensemble: ensemble_id.get(),
            });
        }
        let mut info = Self {
            id: None,
            ensemble_id,
            source_id,
            url: Some(url.to_string()),
        };
        insert(db, &mut info)?;
        Ok(info)
    }

    /// The on-demand source of `ensemble_id` fetched from `url`, if any.
    pub fn find_by_url(
        db: &mut Db,
        ensemble_id: Id<Ensemble>,
        url: &str,
    ) -> Result<Option<Self>, DbError> {
        db.query_record("WHERE ensemble_id = ? AND url = ?", &[&ensemble_id, &url])
    }
}

record! {
    /// A source shared with an ensemble, optionally as a graded assignment.
    pub struct Ownership in "base_ownership" {
        source_id: Id<Source>,
        ensemble_id: Id<Ensemble>,
        folder_id: Option<Id<Folder>>,
        published: String,
        deleted: bool,
        assignment: bool,
        due: Option<String>,
    }
}

impl Ownership {
    pub fn new(source_id: Id<Source>, ensemble_id: Id<Ensemble>, folder_id: Option<Id<Folder>>) -> Self {
        Self {
            id: None,
            source_id,
            ensemble_id,
            folder_id,
            published: now(),
            deleted: false,
            assignment: false,
            due: None,
        }
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ownership {}: source {} in ensemble {}",
            OrNone(&self.id),
            self.source_id,
            self.ensemble_id
        )
    }
}

record! {
    /// A superseded revision of a source.
    pub struct SourceVersion in "base_sourceversion" {
        title: String,
        submittedby_id: Option<Id<User>>,
        numpages: i64,
        w: i64,
        h: i64,
        rotation: i64,
        version: i64,
        /// When the revision was superseded.
        published: String,
        /// `None` on revisions archived before the source was tracked.
        source_id: Option<Id<Source>>,
    }
}

record! {
    /// A pending or finished background processing job for a source.
    pub struct ProcessQueue in "base_processqueue" {
        source_id: Option<Id<Source>>,
        submitted: String,
        started: Option<String>,
        completed: Option<String>,
    }
}

impl ProcessQueue {
    /// Queues `source_id` for processing.
    pub fn enqueue(db: &mut Db, source_id: Id<Source>) -> Result<Self, DbError> {
        let mut job = Self {
            id: None,
            source_id: Some(source_id),
            submitted: now(),
            started: None,
            completed: None,
        };
        insert(db, &mut job)?;
        Ok(job)
    }

    /// Jobs not yet started, oldest first.
    pub fn pending(db: &mut Db) -> Result<Vec<Self>, DbError> {
        db.query_records("WHERE started IS NULL ORDER BY submitted, id", &[])
    }

    pub fn mark_started(&mut self, db: &mut Db) -> Result<(), DbError> {
        self.started = Some(now());
        update(db, self)
    }

    pub fn mark_completed(&mut self, db: &mut Db) -> Result<(), DbError> {
        self.completed = Some(now());
        update(db, self)
    }
}

record! {
    /// A download of a source file, with or without annotations.
    pub struct FileDownload in "base_filedownload" {
        ctime: String,
        user_id: Id<User>,
        source_id: Id<Source>,
        annotated: bool,
    }
}

impl FileDownload {
    pub fn record(
        db: &mut Db,
        user_id: Id<User>,
        source_id: Id<Source>,
        annotated: bool,
    ) -> Result<Self, DbError> {
        let mut download = Self {
            id: None,
            ctime: now(),
            user_id,
            source_id,
            annotated,
        };
        insert(db, &mut download)?;
        Ok(download)
    }
}
