use crate::date::PhotoDate;

/// What to do with one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply(PhotoDate),
    SkipAlreadyCorrect,
    RefuseConflict { existing: PhotoDate, candidate: PhotoDate },
    SkipNoCandidate,
}

/// Conservative policy: a date is only written where none exists.
/// A present date that differs from the candidate is never replaced.
pub fn decide(existing: Option<PhotoDate>, candidate: Option<PhotoDate>) -> Decision {
    let Some(candidate) = candidate else {
        return Decision::SkipNoCandidate;
    };
    match existing {
        None => Decision::Apply(candidate),
        Some(existing) if existing.same_moment(&candidate) => Decision::SkipAlreadyCorrect,
        Some(existing) => Decision::RefuseConflict {
            existing,
            candidate,
        },
    }
}
