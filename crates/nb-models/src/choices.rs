//! Integer-coded choice columns.

choices! {
    /// Kind of document or media behind a source.
    pub enum SourceType {
        Pdf = 1 => "PDF",
        Youtube = 2 => "YOUTUBE",
        Html5Video = 3 => "HTML5VIDEO",
        Html5 = 4 => "HTML5",
    }
}

choices! {
    /// Who can read a comment.
    pub enum CommentType {
        /// Only the author.
        Private = 1 => "Private",
        /// The author and the ensemble staff.
        Staff = 2 => "Staff",
        /// Everyone in the ensemble.
        Class = 3 => "Class",
        /// The author and the users tagged in the comment.
        TagPrivate = 4 => "Tag Private",
    }
}

choices! {
    /// What a tag points at.
    pub enum TagType {
        Individual = 1 => "Individual",
    }
}

choices! {
    /// Per-user reaction to a single comment.
    pub enum MarkType {
        AnswerPlease = 1 => "answerplease",
        Approve = 3 => "approve",
        Reject = 5 => "reject",
        Favorite = 7 => "favorite",
        Hide = 9 => "hide",
    }
}

choices! {
    /// Reason a thread was flagged.
    pub enum ThreadMarkType {
        Question = 1 => "question",
        Star = 2 => "star",
        Summarize = 3 => "summarize",
    }
}

choices! {
    /// Resolution state of a reply to a flagged thread.
    ///
    /// Ordered: a rating only ever moves towards [`RatingStatus::Thanks`].
    pub enum RatingStatus {
        Unresolved = 1 => "unresolved",
        Resolved = 2 => "resolved",
        Thanks = 3 => "thanks",
    }
}

choices! {
    /// How new members of an ensemble are placed into sections.
    pub enum SectionAssignment {
        NoAssignment = 1 => "NULL",
        Random = 2 => "RANDOM",
    }
}

choices! {
    /// Who sees the labels of a category.
    pub enum LabelVisibility {
        User = 1 => "USER",
        Admin = 2 => "ADMIN",
        SuperAdmin = 3 => "SUPERADMIN",
    }
}

choices! {
    /// Whether a label category scores single comments or whole threads.
    pub enum LabelScope {
        Comment = 1 => "COMMENT",
        Thread = 2 => "THREAD",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_db::rusqlite::types::Value;

    #[test]
    fn codes_round_trip_and_reject_unknowns() {
        for status in RatingStatus::ALL {
            assert_eq!(RatingStatus::from_code(status.code()), Some(*status));
        }
        assert_eq!(MarkType::from_code(2), None);
        assert_eq!(Value::from(MarkType::Hide), Value::Integer(9));
    }

    #[test]
    fn rating_status_is_ordered() {
        assert!(RatingStatus::Unresolved < RatingStatus::Resolved);
        assert!(RatingStatus::Resolved < RatingStatus::Thanks);
    }

    #[test]
    fn labels_display() {
        assert_eq!(CommentType::Class.to_string(), "Class");
        assert_eq!(SourceType::Html5Video.label(), "HTML5VIDEO");
        assert_eq!(CommentType::TagPrivate.to_string(), "Tag Private");
    }

    fn codes<T: Copy>(all: &[T], code: impl Fn(T) -> i64) -> Vec<i64> {
        all.iter().map(|c| code(*c)).collect()
    }

    #[test]
    fn stored_codes_are_stable() {
        assert_eq!(codes(SourceType::ALL, SourceType::code), [1, 2, 3, 4]);
        assert_eq!(codes(CommentType::ALL, CommentType::code), [1, 2, 3, 4]);
        assert_eq!(codes(TagType::ALL, TagType::code), [1]);
        assert_eq!(codes(MarkType::ALL, MarkType::code), [1, 3, 5, 7, 9]);
        assert_eq!(codes(ThreadMarkType::ALL, ThreadMarkType::code), [1, 2, 3]);
        assert_eq!(codes(RatingStatus::ALL, RatingStatus::code), [1, 2, 3]);
        assert_eq!(codes(SectionAssignment::ALL, SectionAssignment::code), [1, 2]);
        assert_eq!(codes(LabelVisibility::ALL, LabelVisibility::code), [1, 2, 3]);
        assert_eq!(codes(LabelScope::ALL, LabelScope::code), [1, 2]);
    }
}
