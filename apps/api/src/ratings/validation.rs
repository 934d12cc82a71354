use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;

pub const MAX_SCORE: i32 = 5;

/// Body of a rate request. `score` is optional on the wire so an unset star picker
/// reaches validation instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct RatingInput {
    pub activity_id: Uuid,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRating {
    pub nota: i32,
    pub comentario: Option<String>,
}

/// Checks a rating before anything touches the store.
///
/// A missing or zero score is an incomplete rating. Blank comments are stored as null.
pub fn validate_rating(score: Option<i32>, comment: Option<&str>) -> Result<ValidRating, AppError> {
    let nota = match score {
        None | Some(0) => {
            return Err(AppError::Validation(
                "Incomplete rating: choose a score from 1 to 5".to_string(),
            ))
        }
        Some(n) if !(1..=MAX_SCORE).contains(&n) => {
            return Err(AppError::Validation(format!(
                "Score must be between 1 and {MAX_SCORE}, got {n}"
            )))
        }
        Some(n) => n,
    };

    let comentario = comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(ValidRating { nota, comentario })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_zero_score_is_incomplete() {
        for score in [None, Some(0)] {
            let err = validate_rating(score, Some("ótimo")).unwrap_err();
            match err {
                AppError::Validation(msg) => assert!(msg.starts_with("Incomplete rating")),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_out_of_range_scores_rejected() {
        assert!(validate_rating(Some(6), None).is_err());
        assert!(validate_rating(Some(-1), None).is_err());
    }

    #[test]
    fn test_blank_comment_becomes_none() {
        let valid = validate_rating(Some(4), Some("   ")).unwrap();
        assert_eq!(valid, ValidRating { nota: 4, comentario: None });

        let valid = validate_rating(Some(5), Some("  vista incrível ")).unwrap();
        assert_eq!(valid.comentario.as_deref(), Some("vista incrível"));
        assert_eq!(validate_rating(Some(1), None).unwrap().comentario, None);
    }
}
