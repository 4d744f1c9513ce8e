//! Quiz model
//!
//! Questions, options and quiz document loading.

pub mod bundle;
pub mod schema;

pub use bundle::{read_quiz, BundleError};
pub use schema::{AnswerFormat, ModelError, Question, Quiz, QuizOption};
