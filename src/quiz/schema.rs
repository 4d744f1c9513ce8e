//! Quiz schema definitions
//!
//! These types match the quiz document produced by the editor. A quiz is
//! handed to the player as-is and never mutated during playback.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;
use uuid::Uuid;

/// Number of options on a standard question
pub const STANDARD_OPTION_COUNT: usize = 4;

/// Allowed option counts for prediction questions
pub const PREDICTION_OPTION_RANGE: RangeInclusive<usize> = 2..=10;

/// Errors raised when building or checking questions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Question text is required")]
    MissingText,

    #[error("Expected {expected} options, got {actual}")]
    OptionCount { expected: String, actual: usize },

    #[error("Correct answer {answer} is outside 1..={options}")]
    CorrectAnswerOutOfRange { answer: usize, options: usize },
}

// =============================================================================
// Quiz
// =============================================================================

/// An ordered set of questions. Insertion order is play order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// A quiz can be played once it has at least one question
    pub fn is_playable(&self) -> bool {
        !self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Collect invariant violations for every question, keyed by position
    pub fn validate(&self) -> Vec<(usize, ModelError)> {
        self.questions
            .iter()
            .enumerate()
            .filter_map(|(index, q)| q.validate().err().map(|e| (index, e)))
            .collect()
    }
}

// =============================================================================
// Question
// =============================================================================

/// How the options of a question are presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerFormat {
    #[default]
    Text,
    Image,
    Both,
    MultipleImages,
}

impl AnswerFormat {
    pub fn shows_text(self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }

    pub fn shows_image(self) -> bool {
        matches!(self, Self::Image | Self::Both | Self::MultipleImages)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Opaque unique identifier
    pub id: String,

    /// Question text (the editor's `questionText`)
    #[serde(alias = "questionText")]
    pub text: String,

    #[serde(default)]
    pub answer_format: AnswerFormat,

    #[serde(default)]
    pub options: Vec<QuizOption>,

    /// 1-based index into `options`, `None` for prediction questions
    #[serde(default)]
    pub correct_answer: Option<usize>,

    /// Shown next to the result when non-empty
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Build a standard question with exactly four options
    pub fn standard(
        text: impl Into<String>,
        answer_format: AnswerFormat,
        options: Vec<QuizOption>,
        correct_answer: usize,
    ) -> Result<Self, ModelError> {
        let question = Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            answer_format,
            options,
            correct_answer: Some(correct_answer),
            explanation: String::new(),
        };
        question.validate()?;
        Ok(question)
    }

    /// Build a prediction question, which never reveals a correct answer
    pub fn prediction(
        text: impl Into<String>,
        answer_format: AnswerFormat,
        options: Vec<QuizOption>,
    ) -> Result<Self, ModelError> {
        let question = Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            answer_format,
            options,
            correct_answer: None,
            explanation: String::new(),
        };
        question.validate()?;
        Ok(question)
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn is_prediction(&self) -> bool {
        self.correct_answer.is_none()
    }

    /// The correct option, if it actually points at one of the options
    pub fn valid_correct_answer(&self) -> Option<usize> {
        self.correct_answer
            .filter(|&answer| answer >= 1 && answer <= self.options.len())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.text.trim().is_empty() {
            return Err(ModelError::MissingText);
        }

        let count = self.options.len();
        match self.correct_answer {
            None => {
                if !PREDICTION_OPTION_RANGE.contains(&count) {
                    return Err(ModelError::OptionCount {
                        expected: format!(
                            "{}..={}",
                            PREDICTION_OPTION_RANGE.start(),
                            PREDICTION_OPTION_RANGE.end()
                        ),
                        actual: count,
                    });
                }
            }
            Some(answer) => {
                if count != STANDARD_OPTION_COUNT {
                    return Err(ModelError::OptionCount {
                        expected: STANDARD_OPTION_COUNT.to_string(),
                        actual: count,
                    });
                }
                if answer < 1 || answer > count {
                    return Err(ModelError::CorrectAnswerOutOfRange {
                        answer,
                        options: count,
                    });
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Option
// =============================================================================

/// A single answer card. Both fields may be empty; such a card renders blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    #[serde(default)]
    pub text: String,

    /// Embeddable asset reference (usually a data URL)
    #[serde(default)]
    pub image: Option<String>,
}

impl QuizOption {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            image: Some(image.into()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.image.is_none()
    }

    /// The parts of this option that render under the given format
    pub fn visible_parts(&self, format: AnswerFormat) -> (Option<&str>, Option<&str>) {
        let text = Some(self.text.as_str()).filter(|t| format.shows_text() && !t.is_empty());
        let image = self.image.as_deref().filter(|_| format.shows_image());
        (text, image)
    }
}
