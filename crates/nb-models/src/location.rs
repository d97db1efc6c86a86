//! Anchored regions of a source where discussion threads attach.

use std::fmt;

use nb_db::{Db, DbError, Id, Record};

use crate::comment::{Comment, ThreadMark};
use crate::ensemble::{Ensemble, Section};
use crate::source::Source;
use crate::OrNone;

record! {
    /// A rectangle on a page (or a moment of a video) of a source, scoped to
    /// one ensemble.
    pub struct Location in "base_location" {
        source_id: Id<Source>,
        /// Source revision the region was drawn on.
        version: i64,
        ensemble_id: Id<Ensemble>,
        section_id: Option<Id<Section>>,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        /// 1-based page.
        page: i64,
        /// Playback position for video sources.
        duration: Option<i64>,
        is_title: bool,
        pause: bool,
    }
}

impl Location {
    pub fn new(
        source_id: Id<Source>,
        ensemble_id: Id<Ensemble>,
        page: i64,
        (x, y, w, h): (i64, i64, i64, i64),
    ) -> Self {
        Self {
            id: None,
            source_id,
            version: 1,
            ensemble_id,
            section_id: None,
            x,
            y,
            w,
            h,
            page,
            duration: None,
            is_title: false,
            pause: false,
        }
    }

    /// Every comment of the thread, oldest first.
    pub fn comments(&self, db: &mut Db) -> Result<Vec<Comment>, DbError> {
        db.query_records(
            "WHERE location_id = ? ORDER BY ctime, id",
            &[&self.saved_id()?],
        )
    }

    /// The comment that opened the thread.
    pub fn root_comment(&self, db: &mut Db) -> Result<Option<Comment>, DbError> {
        db.query_record(
            "WHERE location_id = ? AND parent_id IS NULL ORDER BY ctime, id",
            &[&self.saved_id()?],
        )
    }

    /// Active flags raised on the thread.
    pub fn thread_marks(&self, db: &mut Db) -> Result<Vec<ThreadMark>, DbError> {
        db.query_records(
            "WHERE location_id = ? AND active = 1 ORDER BY ctime, id",
            &[&self.saved_id()?],
        )
    }

    pub fn html5(&self, db: &mut Db) -> Result<Option<Html5Location>, DbError> {
        db.query_record("WHERE location_id = ?", &[&self.saved_id()?])
    }

    /// Locations of `source_id` visible in `ensemble_id`, in page order.
    pub fn for_source(
        db: &mut Db,
        source_id: Id<Source>,
        ensemble_id: Id<Ensemble>,
    ) -> Result<Vec<Self>, DbError> {
        db.query_records(
            "WHERE source_id = ? AND ensemble_id = ? ORDER BY page, y, x",
            &[&source_id, &ensemble_id],
        )
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Location {}: on source {} - page {} ",
            OrNone(&self.id),
            self.source_id,
            self.page
        )
    }
}

record! {
    /// DOM range of a location on an HTML5 source.
    pub struct Html5Location in "base_html5location" {
        location_id: Id<Location>,
        path1: Option<String>,
        path2: Option<String>,
        offset1: i64,
        offset2: i64,
    }
}
