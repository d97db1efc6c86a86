//! Assignment grades and per-comment labels, each with an audit history.

use nb_db::record::{insert, update};
use nb_db::{now, Db, DbError, Id, Record};

use crate::choices::{LabelScope, LabelVisibility};
use crate::comment::Comment;
use crate::ensemble::Ensemble;
use crate::error::ModelError;
use crate::source::Source;
use crate::user::User;

record! {
    /// The current grade of one user on one assignment.
    pub struct AssignmentGrade in "base_assignmentgrade" {
        user_id: Id<User>,
        grade: i64,
        source_id: Id<Source>,
        grader_id: Id<User>,
        ctime: String,
    }
}

impl AssignmentGrade {
    /// Sets the grade of `user_id` on `source_id` and appends it to the history.
    pub fn set_grade(
        db: &mut Db,
        user_id: Id<User>,
        source_id: Id<Source>,
        grader_id: Id<User>,
        grade: i64,
    ) -> Result<Self, DbError> {
        db.atomic(|db| {
            let existing: Option<Self> = db.query_record(
                "WHERE user_id = ? AND source_id = ?",
                &[&user_id, &source_id],
            )?;
            let ctime = now();
            let current = match existing {
                Some(mut current) => {
                    current.grade = grade;
                    current.grader_id = grader_id;
                    current.ctime = ctime.clone();
                    update(db, &current)?;
                    current
                }
                None => {
                    let mut current = Self {
                        id: None,
                        user_id,
                        grade,
                        source_id,
                        grader_id,
                        ctime: ctime.clone(),
                    };
                    insert(db, &mut current)?;
                    current
                }
            };

            insert(
                db,
                &mut AssignmentGradeHistory {
                    id: None,
                    user_id,
                    grade,
                    source_id,
                    grader_id,
                    ctime,
                },
            )?;
            Ok(current)
        })
    }

    /// Every grade given for `source_id`, in user order.
    pub fn for_source(db: &mut Db, source_id: Id<Source>) -> Result<Vec<Self>, DbError> {
        db.query_records("WHERE source_id = ? ORDER BY user_id", &[&source_id])
    }
}

record! {
    /// A grade as it was at some point.
    pub struct AssignmentGradeHistory in "base_assignmentgradehistory" {
        user_id: Id<User>,
        grade: i64,
        source_id: Id<Source>,
        grader_id: Id<User>,
        ctime: String,
    }
}

record! {
    /// A grading rubric dimension of an ensemble, scored 0..=pointscale.
    pub struct LabelCategory in "base_labelcategory" {
        visibility: LabelVisibility,
        scope: LabelScope,
        pointscale: i64,
        name: String,
        ensemble_id: Id<Ensemble>,
    }
}

impl LabelCategory {
    /// An admin-visible category that labels single comments.
    pub fn new(ensemble_id: Id<Ensemble>, name: &str, pointscale: i64) -> Self {
        Self {
            id: None,
            visibility: LabelVisibility::Admin,
            scope: LabelScope::Comment,
            pointscale,
            name: name.to_string(),
            ensemble_id,
        }
    }

    /// Categories of `ensemble_id` with the given scope, by name.
    pub fn for_ensemble(
        db: &mut Db,
        ensemble_id: Id<Ensemble>,
        scope: LabelScope,
    ) -> Result<Vec<Self>, DbError> {
        db.query_records(
            "WHERE ensemble_id = ? AND scope = ? ORDER BY name",
            &[&ensemble_id, &scope],
        )
    }

    pub fn captions(&self, db: &mut Db) -> Result<Vec<LabelCategoryCaption>, DbError> {
        db.query_records("WHERE category_id = ? ORDER BY grade", &[&self.saved_id()?])
    }
}

record! {
    /// Caption shown for one grade of a label category.
    pub struct LabelCategoryCaption in "base_labelcategorycaption" {
        category_id: Id<LabelCategory>,
        grade: i64,
        caption: String,
    }
}

record! {
    /// A grader's score of one comment in one label category.
    pub struct CommentLabel in "base_commentlabel" {
        category_id: Id<LabelCategory>,
        grader_id: Id<User>,
        comment_id: Id<Comment>,
        grade: i64,
        ctime: String,
    }
}

impl CommentLabel {
    /// Scores `comment_id` and appends the score to the history.
    ///
    /// # Errors
    ///
    /// `ModelError::Missing` if the category does not exist,
    /// `ModelError::GradeOutOfRange` if `grade` is outside its point scale.
    pub fn set_grade(
        db: &mut Db,
        category_id: Id<LabelCategory>,
        grader_id: Id<User>,
        comment_id: Id<Comment>,
        grade: i64,
    ) -> Result<Self, ModelError> {
        let category = category_id.load(db)?.ok_or(ModelError::Missing {
            table: LabelCategory::TABLE,
            id: category_id.get(),
        })?;
        if !(0..=category.pointscale).contains(&grade) {
            return Err(ModelError::GradeOutOfRange {
                grade,
                pointscale: category.pointscale,
            });
        }

        let label = db.atomic(|db| -> Result<Self, DbError> {
            let existing: Option<Self> = db.query_record(
                "WHERE grader_id = ? AND comment_id = ? AND category_id = ?",
                &[&grader_id, &comment_id, &category_id],
            )?;
            let ctime = now();
            let label = match existing {
                Some(mut label) => {
                    label.grade = grade;
                    label.ctime = ctime.clone();
                    update(db, &label)?;
                    label
                }
                None => {
                    let mut label = Self {
                        id: None,
                        category_id,
                        grader_id,
                        comment_id,
                        grade,
                        ctime: ctime.clone(),
                    };
                    insert(db, &mut label)?;
                    label
                }
            };
            insert(
                db,
                &mut CommentLabelHistory {
                    id: None,
                    category_id,
                    grader_id,
                    comment_id,
                    grade,
                    ctime,
                },
            )?;
            Ok(label)
        })?;
        Ok(label)
    }

    pub fn for_comment(db: &mut Db, comment_id: Id<Comment>) -> Result<Vec<Self>, DbError> {
        db.query_records("WHERE comment_id = ? ORDER BY category_id, grader_id", &[&comment_id])
    }
}

record! {
    /// A comment score as it was at some point.
    pub struct CommentLabelHistory in "base_commentlabelhistory" {
        category_id: Id<LabelCategory>,
        grader_id: Id<User>,
        comment_id: Id<Comment>,
        grade: i64,
        ctime: String,
    }
}
