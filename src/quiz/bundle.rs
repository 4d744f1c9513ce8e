//! Quiz document loading
//!
//! A quiz document is a single JSON file with the editor's output:
//! `{ "questions": [ ... ] }`. Images are already embedded as asset
//! references, so no other files are involved.

use super::schema::Quiz;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Quiz document errors
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing quiz file: {0}")]
    MissingFile(String),
}

/// Read a quiz document from disk
///
/// Questions that break the model invariants are still loaded; the player
/// renders whatever is there. Violations are logged so authors can fix them.
pub fn read_quiz(path: &Path) -> Result<Quiz, BundleError> {
    if !path.is_file() {
        return Err(BundleError::MissingFile(path.display().to_string()));
    }

    let content = fs::read_to_string(path)?;
    let quiz: Quiz = serde_json::from_str(&content)?;

    for (index, problem) in quiz.validate() {
        tracing::warn!("Question {} in {:?}: {}", index + 1, path, problem);
    }

    tracing::debug!("Loaded quiz with {} questions from {:?}", quiz.len(), path);

    Ok(quiz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_quiz() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quiz.json");
        fs::write(
            &path,
            r#"{"questions": [{
                "id": "a",
                "text": "2 + 2?",
                "answerFormat": "text",
                "options": [{"text": "3"}, {"text": "4"}, {"text": "5"}, {"text": "22"}],
                "correctAnswer": 2,
                "explanation": "Basic arithmetic"
            }]}"#,
        )
        .unwrap();

        let quiz = read_quiz(&path).unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz.questions[0].explanation, "Basic arithmetic");
    }

    #[test]
    fn test_invalid_questions_still_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quiz.json");
        fs::write(
            &path,
            r#"{"questions": [{"id": "a", "text": "Broken", "options": [], "correctAnswer": 9}]}"#,
        )
        .unwrap();

        let quiz = read_quiz(&path).unwrap();
        assert_eq!(quiz.validate().len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = read_quiz(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(BundleError::MissingFile(_))));
    }
}
