//! Playback state
//!
//! The phase machine, reveal evaluation and the snapshot published to the
//! UI after every change.

use crate::capture::RecordingArtifact;
use crate::config::PlaybackConfig;
use crate::quiz::{AnswerFormat, Question};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generation marker for one playback session
///
/// Minted on every `start()`. Deferred work tagged with an older token is
/// dropped when it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub(crate) u64);

/// Current phase of playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackPhase {
    /// No session
    #[default]
    Idle,
    /// Background is changing; question content is hidden
    Transitioning,
    /// Question shown, countdown running
    AwaitingAnswer,
    /// Answer locked, result shown
    Revealing,
    /// Every question played
    Completed,
}

impl PlaybackPhase {
    pub fn content_visible(self) -> bool {
        matches!(self, Self::AwaitingAnswer | Self::Revealing)
    }
}

/// How an option card is highlighted during the reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionMark {
    #[default]
    None,
    Correct,
    Incorrect,
    /// Chosen on a prediction question; no judgment
    Selected,
}

/// Per-question result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Correct,
    Incorrect,
    TimedOut,
    /// Prediction question, nothing to judge
    Informational,
}

/// Result banner shown while revealing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RevealMessage {
    TimedOut { correct: Option<usize> },
    Correct { selected: usize },
    Incorrect { selected: usize, correct: usize },
    Informational { selected: Option<usize> },
}

impl fmt::Display for RevealMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { correct: Some(correct) } => {
                write!(f, "Time's up! The correct answer is Option {correct}")
            }
            Self::TimedOut { correct: None } => write!(f, "Time's up!"),
            Self::Correct { selected } => write!(f, "Correct! You selected Option {selected}"),
            Self::Incorrect { selected, correct } => write!(
                f,
                "Incorrect. You selected Option {selected}, but the correct answer is Option {correct}"
            ),
            Self::Informational { selected: Some(selected) } => {
                write!(f, "You picked Option {selected}")
            }
            Self::Informational { selected: None } => write!(f, "Time's up!"),
        }
    }
}

/// Everything the reveal shows for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reveal {
    pub verdict: Verdict,
    pub message: RevealMessage,
    /// Rendered `message`
    pub text: String,
    /// One mark per option, in option order
    pub marks: Vec<OptionMark>,
    pub explanation: Option<String>,
}

impl Reveal {
    /// Judge `selected` against the question's correct answer
    ///
    /// A correct answer outside the option range is treated as absent, the
    /// same as a prediction question.
    pub fn evaluate(question: &Question, selected: Option<usize>) -> Self {
        let count = question.option_count();
        let selected = selected.filter(|&s| s >= 1 && s <= count);
        let mut marks = vec![OptionMark::None; count];

        let (verdict, message) = match (question.valid_correct_answer(), selected) {
            (None, selected) => {
                if let Some(s) = selected {
                    marks[s - 1] = OptionMark::Selected;
                }
                if selected.is_none() && !question.is_prediction() {
                    (Verdict::TimedOut, RevealMessage::TimedOut { correct: None })
                } else {
                    (Verdict::Informational, RevealMessage::Informational { selected })
                }
            }
            (Some(correct), None) => {
                marks[correct - 1] = OptionMark::Correct;
                (Verdict::TimedOut, RevealMessage::TimedOut { correct: Some(correct) })
            }
            (Some(correct), Some(s)) if s == correct => {
                marks[correct - 1] = OptionMark::Correct;
                (Verdict::Correct, RevealMessage::Correct { selected: s })
            }
            (Some(correct), Some(s)) => {
                marks[correct - 1] = OptionMark::Correct;
                marks[s - 1] = OptionMark::Incorrect;
                (
                    Verdict::Incorrect,
                    RevealMessage::Incorrect {
                        selected: s,
                        correct,
                    },
                )
            }
        };

        let explanation = Some(question.explanation.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Self {
            verdict,
            text: message.to_string(),
            message,
            marks,
            explanation,
        }
    }
}

/// Outcome of one played question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: String,
    pub selected: Option<usize>,
    pub verdict: Verdict,
}

/// Countdown colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerUrgency {
    #[default]
    Normal,
    Warning,
    Danger,
}

impl TimerUrgency {
    pub fn for_remaining(remaining: u32, config: &PlaybackConfig) -> Self {
        if remaining <= config.danger_threshold_secs {
            Self::Danger
        } else if remaining <= config.warning_threshold_secs {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Where the session's recording stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingStatus {
    #[default]
    Inactive,
    Starting,
    Recording,
    Stopping,
    Finished,
    Unavailable,
}

/// Question as rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub answer_format: AnswerFormat,
    pub prediction: bool,
}

/// Option card as rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    /// 1-based option number
    pub number: usize,
    pub text: Option<String>,
    pub image: Option<String>,
    pub mark: OptionMark,
    /// Entrance animation offset
    pub appear_delay_ms: u64,
}

impl OptionView {
    pub fn for_question(question: &Question, marks: Option<&[OptionMark]>, stagger_ms: u64) -> Vec<Self> {
        question
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let (text, image) = option.visible_parts(question.answer_format);
                Self {
                    number: i + 1,
                    text: text.map(str::to_string),
                    image: image.map(str::to_string),
                    mark: marks
                        .and_then(|m| m.get(i).copied())
                        .unwrap_or_default(),
                    appear_delay_ms: i as u64 * stagger_ms,
                }
            })
            .collect()
    }
}

/// Observable playback state, published on every change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub session: Option<SessionToken>,
    pub phase: PlaybackPhase,
    pub current_index: usize,
    pub total_questions: usize,
    pub content_visible: bool,
    pub question: Option<QuestionView>,
    pub options: Vec<OptionView>,
    pub selected_answer: Option<usize>,
    pub time_remaining: u32,
    /// Remaining share of the countdown, 0.0 to 1.0
    pub timer_fraction: f32,
    pub timer_urgency: TimerUrgency,
    pub timer_running: bool,
    pub reveal: Option<Reveal>,
    pub recording: RecordingStatus,
    pub recording_unavailable: bool,
    pub recording_artifact: Option<RecordingArtifact>,
    pub results: Vec<QuestionOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuizOption;

    fn question(correct: usize) -> Question {
        Question::standard(
            "Which?",
            AnswerFormat::Text,
            ["A", "B", "C", "D"].into_iter().map(QuizOption::text).collect(),
            correct,
        )
        .unwrap()
        .with_explanation("Because.")
    }

    #[test]
    fn test_reveal_correct_selection() {
        let reveal = Reveal::evaluate(&question(2), Some(2));
        assert_eq!(reveal.verdict, Verdict::Correct);
        assert_eq!(
            reveal.marks,
            vec![OptionMark::None, OptionMark::Correct, OptionMark::None, OptionMark::None]
        );
        assert_eq!(reveal.text, "Correct! You selected Option 2");
        assert_eq!(reveal.explanation.as_deref(), Some("Because."));
    }

    #[test]
    fn test_reveal_incorrect_selection() {
        let reveal = Reveal::evaluate(&question(1), Some(3));
        assert_eq!(reveal.verdict, Verdict::Incorrect);
        assert_eq!(reveal.marks[0], OptionMark::Correct);
        assert_eq!(reveal.marks[2], OptionMark::Incorrect);
        assert_eq!(
            reveal.text,
            "Incorrect. You selected Option 3, but the correct answer is Option 1"
        );
    }

    #[test]
    fn test_reveal_timeout_still_marks_correct() {
        let reveal = Reveal::evaluate(&question(4), None);
        assert_eq!(reveal.verdict, Verdict::TimedOut);
        assert_eq!(reveal.marks[3], OptionMark::Correct);
        assert!(!reveal.marks.contains(&OptionMark::Incorrect));
        assert_eq!(reveal.text, "Time's up! The correct answer is Option 4");
    }

    #[test]
    fn test_reveal_prediction_never_judges() {
        let options = (1..=6).map(|i| QuizOption::text(format!("#{i}"))).collect();
        let q = Question::prediction("Who wins?", AnswerFormat::Text, options).unwrap();

        let picked = Reveal::evaluate(&q, Some(5));
        assert_eq!(picked.verdict, Verdict::Informational);
        assert_eq!(picked.marks[4], OptionMark::Selected);
        assert!(picked
            .marks
            .iter()
            .all(|m| !matches!(m, OptionMark::Correct | OptionMark::Incorrect)));

        let skipped = Reveal::evaluate(&q, None);
        assert_eq!(skipped.verdict, Verdict::Informational);
        assert!(skipped.marks.iter().all(|m| *m == OptionMark::None));
    }

    #[test]
    fn test_reveal_tolerates_broken_correct_answer() {
        let mut q = question(1);
        q.correct_answer = Some(9);
        let reveal = Reveal::evaluate(&q, Some(2));
        assert!(reveal.marks.iter().all(|m| *m != OptionMark::Correct));
    }

    #[test]
    fn test_urgency_thresholds() {
        let config = PlaybackConfig::default();
        assert_eq!(TimerUrgency::for_remaining(10, &config), TimerUrgency::Normal);
        assert_eq!(TimerUrgency::for_remaining(5, &config), TimerUrgency::Warning);
        assert_eq!(TimerUrgency::for_remaining(3, &config), TimerUrgency::Danger);
    }

    #[test]
    fn test_option_views_stagger_and_blank_cards() {
        let mut q = question(1);
        q.options[1] = QuizOption::default();
        let views = OptionView::for_question(&q, None, 400);
        assert_eq!(views[3].appear_delay_ms, 1200);
        assert_eq!(views[1].text, None);
        assert_eq!(views[1].image, None);
        assert_eq!(views[1].number, 2);
    }
}
