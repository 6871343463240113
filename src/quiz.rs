//! Personality quizzes: definitions, per-user sessions and scoring.
//!
//! A session moves `NoSession -> InProgress -> NoSession`. Selecting a quiz
//! while one is in progress is refused so progress is never discarded
//! silently; `cancel` is the explicit way out.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::QuizError;
use crate::user_state::{Slot, UserStateMap};

/// Canonical answer labels. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Alif,
    Ba,
    Jim,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Alif, Label::Ba, Label::Jim];

    /// Accepts the digit, latin and arabic spellings of each label.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "1" | "a" | "أ" | "ا" => Some(Label::Alif),
            "2" | "b" | "ب" => Some(Label::Ba),
            "3" | "c" | "ج" => Some(Label::Jim),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Alif => "أ",
            Label::Ba => "ب",
            Label::Jim => "ج",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawQuiz {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(default)]
    options: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub prompt: String,
    /// Options in canonical label order.
    pub options: Vec<(Label, String)>,
}

impl Question {
    fn offers(&self, label: Label) -> bool {
        self.options.iter().any(|(l, _)| *l == label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    /// Source key, e.g. `لعبة2`. Results are keyed by it.
    pub key: String,
    pub title: String,
    pub questions: Vec<Question>,
}

/// Quiz key -> winning label -> result text.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct ResultTable(HashMap<String, HashMap<String, String>>);

impl ResultTable {
    pub fn lookup(&self, quiz_key: &str, label: Label) -> Option<&str> {
        self.0
            .get(quiz_key)
            .and_then(|by_label| by_label.get(label.as_str()))
            .map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct QuizBook {
    quizzes: Vec<Quiz>,
    results: ResultTable,
}

impl QuizBook {
    /// Orders quizzes by the number their key ends with, then by key, and
    /// drops quizzes left without a usable question.
    pub fn from_raw(raw: HashMap<String, RawQuiz>, results: ResultTable) -> Self {
        let mut keyed: Vec<(String, RawQuiz)> = raw.into_iter().collect();
        keyed.sort_by(|(a, _), (b, _)| (trailing_number(a), a).cmp(&(trailing_number(b), b)));

        let mut quizzes = Vec::with_capacity(keyed.len());
        for (key, raw_quiz) in keyed {
            let questions: Vec<Question> = raw_quiz
                .questions
                .into_iter()
                .filter_map(|q| {
                    let mut options: Vec<(Label, String)> = q
                        .options
                        .into_iter()
                        .filter_map(|(label, text)| Label::parse(&label).map(|l| (l, text)))
                        .collect();
                    options.sort_by_key(|(l, _)| *l);
                    options.dedup_by_key(|(l, _)| *l);
                    if options.is_empty() {
                        warn!("Quiz {}: question without usable options dropped", key);
                        None
                    } else {
                        Some(Question {
                            prompt: q.question,
                            options,
                        })
                    }
                })
                .collect();

            if questions.is_empty() {
                warn!("Quiz {} has no usable questions, skipping", key);
                continue;
            }
            let title = raw_quiz
                .title
                .unwrap_or_else(|| format!("تحليل {}", quizzes.len() + 1));
            quizzes.push(Quiz {
                key,
                title,
                questions,
            });
        }

        Self { quizzes, results }
    }

    #[cfg(test)]
    pub fn new(mut quizzes: Vec<Quiz>, results: ResultTable) -> Self {
        quizzes.retain(|q| !q.questions.is_empty());
        Self { quizzes, results }
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    pub fn quizzes(&self) -> &[Quiz] {
        &self.quizzes
    }
}

fn trailing_number(key: &str) -> u64 {
    let digits: String = key
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QuizSession {
    quiz: usize,
    question: usize,
    answers: Vec<Label>,
}

/// A question ready to be shown, with its place in the quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPrompt {
    pub quiz_title: String,
    pub prompt: String,
    pub options: Vec<(Label, String)>,
    pub position: usize,
    pub total: usize,
}

impl QuestionPrompt {
    fn new(quiz: &Quiz, index: usize) -> Self {
        let question = &quiz.questions[index];
        Self {
            quiz_title: quiz.title.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            position: index + 1,
            total: quiz.questions.len(),
        }
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.position, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally([usize; 3]);

impl Tally {
    pub fn of(answers: &[Label]) -> Self {
        let mut counts = [0; 3];
        for label in answers {
            counts[label.position()] += 1;
        }
        Self(counts)
    }

    pub fn count(&self, label: Label) -> usize {
        self.0[label.position()]
    }

    /// The first label, in canonical order, holding the highest count.
    pub fn winner(&self) -> Label {
        let mut best = Label::Alif;
        for label in Label::ALL {
            if self.count(label) > self.count(best) {
                best = label;
            }
        }
        best
    }

    pub fn summary(&self) -> String {
        Label::ALL
            .iter()
            .map(|l| format!("{}: {}", l, self.count(*l)))
            .collect::<Vec<_>>()
            .join(" • ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub winner: Label,
    pub tally: Tally,
    pub text: String,
}

/// Scores a finished quiz against the results stored under `quiz_key`.
pub fn score(answers: &[Label], quiz_key: &str, results: &ResultTable) -> QuizResult {
    let tally = Tally::of(answers);
    let winner = tally.winner();
    let text = match results.lookup(quiz_key, winner) {
        Some(text) => text.to_string(),
        None => format!("شخصيتك فريدة ومميزة! (اختيارك الغالب: {})", winner),
    };
    QuizResult {
        winner,
        tally,
        text,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Input was not an offered label; the session did not move.
    Rejected(QuestionPrompt),
    Next(QuestionPrompt),
    Finished(QuizResult),
}

pub struct QuizManager {
    book: Arc<QuizBook>,
    sessions: UserStateMap<QuizSession>,
}

impl QuizManager {
    pub fn new(book: Arc<QuizBook>, session_ttl_secs: u64) -> Self {
        Self {
            book,
            sessions: UserStateMap::new(session_ttl_secs),
        }
    }

    pub fn book(&self) -> &QuizBook {
        &self.book
    }

    pub fn is_active(&self, user: &str) -> bool {
        self.sessions.contains(user)
    }

    /// Starts quiz `quiz_no` (1-based) for `user`.
    pub fn select(&self, user: &str, quiz_no: usize) -> Result<QuestionPrompt, QuizError> {
        let available = self.book.len();
        if quiz_no == 0 || quiz_no > available {
            return Err(QuizError::OutOfRange {
                requested: quiz_no,
                available,
            });
        }
        let quiz = &self.book.quizzes[quiz_no - 1];

        let session = QuizSession {
            quiz: quiz_no - 1,
            question: 0,
            answers: Vec::with_capacity(quiz.questions.len()),
        };
        self.sessions
            .insert_if_vacant(user, session)
            .map_err(|_| QuizError::AlreadyInProgress)?;

        info!("Quiz {} started for {}", quiz.key, user);
        Ok(QuestionPrompt::new(quiz, 0))
    }

    pub fn answer(&self, user: &str, raw: &str) -> Result<AnswerOutcome, QuizError> {
        let label = Label::parse(raw);
        self.sessions
            .alter(user, |session| {
                let quiz = &self.book.quizzes[session.quiz];
                let current = &quiz.questions[session.question];

                let Some(label) = label.filter(|l| current.offers(*l)) else {
                    debug!("Rejected quiz answer {:?} from {}", raw, user);
                    return (
                        AnswerOutcome::Rejected(QuestionPrompt::new(quiz, session.question)),
                        Slot::Keep,
                    );
                };

                session.answers.push(label);
                session.question += 1;

                if session.question < quiz.questions.len() {
                    (
                        AnswerOutcome::Next(QuestionPrompt::new(quiz, session.question)),
                        Slot::Keep,
                    )
                } else {
                    let result = score(&session.answers, &quiz.key, &self.book.results);
                    info!(
                        "Quiz {} finished for {} with {}",
                        quiz.key,
                        user,
                        result.winner
                    );
                    (AnswerOutcome::Finished(result), Slot::Clear)
                }
            })
            .ok_or(QuizError::NoSession)
    }

    /// The question the user is currently on, if a session is live.
    pub fn current(&self, user: &str) -> Option<QuestionPrompt> {
        self.sessions.alter(user, |session| {
            let quiz = &self.book.quizzes[session.quiz];
            (QuestionPrompt::new(quiz, session.question), Slot::Keep)
        })
    }

    pub fn cancel(&self, user: &str) -> Result<(), QuizError> {
        self.sessions
            .take(user)
            .map(|_| info!("Quiz cancelled for {}", user))
            .ok_or(QuizError::NoSession)
    }

    pub fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(prompt: &str) -> Question {
        Question {
            prompt: prompt.to_string(),
            options: vec![
                (Label::Alif, "one".to_string()),
                (Label::Ba, "two".to_string()),
                (Label::Jim, "three".to_string()),
            ],
        }
    }

    fn book() -> Arc<QuizBook> {
        let results: ResultTable = serde_json::from_str(
            r#"{"لعبة1": {"أ": "quiet leader", "ب": "social spark"}}"#,
        )
        .unwrap();
        Arc::new(QuizBook::new(
            vec![
                Quiz {
                    key: "لعبة1".into(),
                    title: "First".into(),
                    questions: vec![question("q1"), question("q2"), question("q3")],
                },
                Quiz {
                    key: "لعبة2".into(),
                    title: "Second".into(),
                    questions: vec![question("only")],
                },
            ],
            results,
        ))
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(Label::parse("1"), Some(Label::Alif));
        assert_eq!(Label::parse(" A "), Some(Label::Alif));
        assert_eq!(Label::parse("أ"), Some(Label::Alif));
        assert_eq!(Label::parse("b"), Some(Label::Ba));
        assert_eq!(Label::parse("ج"), Some(Label::Jim));
        assert_eq!(Label::parse("4"), None);
        assert_eq!(Label::parse("hello"), None);
    }

    #[test]
    fn test_winner_majority() {
        let tally = Tally::of(&[Label::Alif, Label::Alif, Label::Ba]);
        assert_eq!(tally.winner(), Label::Alif);
    }

    #[test]
    fn test_winner_full_tie_is_first_canonical() {
        let tally = Tally::of(&[Label::Alif, Label::Ba, Label::Jim]);
        assert_eq!(tally.winner(), Label::Alif);
        let tally = Tally::of(&[Label::Jim, Label::Ba]);
        assert_eq!(tally.winner(), Label::Ba);
        assert_eq!(Tally::of(&[]).winner(), Label::Alif);
    }

    #[test]
    fn test_score_lookup_and_fallback() {
        let book = book();
        let found = score(&[Label::Ba, Label::Ba, Label::Alif], "لعبة1", &book.results);
        assert_eq!(found.text, "social spark");
        assert_eq!(found.tally.summary(), "أ: 1 • ب: 2 • ج: 0");

        let fallback = score(&[Label::Jim], "لعبة1", &book.results);
        assert!(fallback.text.contains("شخصيتك فريدة ومميزة"));
        assert!(fallback.text.contains("ج"));

        let other_quiz = score(&[Label::Alif], "لعبة2", &book.results);
        assert!(other_quiz.text.contains("أ"));
    }

    #[test]
    fn test_full_session_lifecycle() {
        let manager = QuizManager::new(book(), 600);
        let first = manager.select("u", 1).unwrap();
        assert_eq!(first.prompt, "q1");
        assert_eq!(first.progress(), "1/3");
        assert!(manager.is_active("u"));

        match manager.answer("u", "a").unwrap() {
            AnswerOutcome::Next(p) => assert_eq!(p.progress(), "2/3"),
            other => panic!("unexpected {:?}", other),
        }
        match manager.answer("u", "a").unwrap() {
            AnswerOutcome::Next(p) => assert_eq!(p.prompt, "q3"),
            other => panic!("unexpected {:?}", other),
        }
        match manager.answer("u", "a").unwrap() {
            AnswerOutcome::Finished(r) => {
                assert_eq!(r.winner, Label::Alif);
                assert_eq!(r.text, "quiet leader");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(!manager.is_active("u"));
        assert_eq!(manager.answer("u", "a"), Err(QuizError::NoSession));
    }

    #[test]
    fn test_unrecognized_answer_does_not_advance() {
        let manager = QuizManager::new(book(), 600);
        manager.select("u", 1).unwrap();

        match manager.answer("u", "maybe").unwrap() {
            AnswerOutcome::Rejected(p) => assert_eq!(p.progress(), "1/3"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(manager.current("u").unwrap().prompt, "q1");
    }

    #[test]
    fn test_label_not_offered_is_rejected() {
        let quiz = Quiz {
            key: "لعبة1".into(),
            title: "two options".into(),
            questions: vec![Question {
                prompt: "pick".into(),
                options: vec![(Label::Alif, "x".into()), (Label::Ba, "y".into())],
            }],
        };
        let manager = QuizManager::new(Arc::new(QuizBook::new(vec![quiz], ResultTable::default())), 600);
        manager.select("u", 1).unwrap();

        assert!(matches!(
            manager.answer("u", "3").unwrap(),
            AnswerOutcome::Rejected(_)
        ));
        assert!(matches!(
            manager.answer("u", "2").unwrap(),
            AnswerOutcome::Finished(_)
        ));
    }

    #[test]
    fn test_reselection_is_rejected_while_in_progress() {
        let manager = QuizManager::new(book(), 600);
        manager.select("u", 1).unwrap();
        manager.answer("u", "b").unwrap();

        assert_eq!(manager.select("u", 2), Err(QuizError::AlreadyInProgress));
        assert_eq!(manager.current("u").unwrap().progress(), "2/3");
    }

    #[test]
    fn test_selection_out_of_range() {
        let manager = QuizManager::new(book(), 600);
        assert_eq!(
            manager.select("u", 0),
            Err(QuizError::OutOfRange {
                requested: 0,
                available: 2
            })
        );
        assert!(matches!(
            manager.select("u", 3),
            Err(QuizError::OutOfRange { .. })
        ));
        assert!(!manager.is_active("u"));
    }

    #[test]
    fn test_sessions_are_per_user() {
        let manager = QuizManager::new(book(), 600);
        manager.select("alice", 1).unwrap();
        manager.select("bob", 2).unwrap();

        assert!(matches!(
            manager.answer("bob", "c").unwrap(),
            AnswerOutcome::Finished(_)
        ));
        assert!(manager.is_active("alice"));
        assert_eq!(manager.current("alice").unwrap().quiz_title, "First");
    }

    #[test]
    fn test_cancel_and_expiry() {
        let manager = QuizManager::new(book(), 600);
        manager.select("u", 1).unwrap();
        assert_eq!(manager.cancel("u"), Ok(()));
        assert_eq!(manager.cancel("u"), Err(QuizError::NoSession));

        let expiring = QuizManager::new(book(), 0);
        expiring.select("u", 1).unwrap();
        assert!(!expiring.is_active("u"));
        assert_eq!(expiring.answer("u", "a"), Err(QuizError::NoSession));
        assert!(expiring.select("u", 2).is_ok());
    }

    #[test]
    fn test_from_raw_orders_and_normalizes() {
        let raw: HashMap<String, RawQuiz> = serde_json::from_str(
            r#"{
                "لعبة10": {"title": "ten", "questions": [{"question": "x", "options": {"أ": "a"}}]},
                "لعبة2": {"questions": [{"question": "y", "options": {"ج": "c", "1": "a", "z": "junk"}}]},
                "لعبة3": {"title": "empty", "questions": [{"question": "no options"}]}
            }"#,
        )
        .unwrap();
        let book = QuizBook::from_raw(raw, ResultTable::default());

        assert_eq!(book.len(), 2);
        assert_eq!(book.quizzes()[0].title, "تحليل 1");
        assert_eq!(book.quizzes()[1].title, "ten");
        assert_eq!(
            book.quizzes()[0].questions[0].options,
            vec![(Label::Alif, "a".to_string()), (Label::Jim, "c".to_string())]
        );
        assert_eq!(book.quizzes()[0].key, "لعبة2");
    }

    #[test]
    fn test_results_follow_source_key_when_earlier_quiz_dropped() {
        let raw: HashMap<String, RawQuiz> = serde_json::from_str(
            r#"{
                "لعبة1": {"title": "broken", "questions": []},
                "لعبة2": {"title": "kept", "questions": [{"question": "x", "options": {"أ": "a"}}]}
            }"#,
        )
        .unwrap();
        let results: ResultTable = serde_json::from_str(
            r#"{"لعبة1": {"أ": "first result"}, "لعبة2": {"أ": "second result"}}"#,
        )
        .unwrap();
        let manager = QuizManager::new(Arc::new(QuizBook::from_raw(raw, results)), 600);

        assert_eq!(manager.book().len(), 1);
        assert_eq!(manager.select("u", 1).unwrap().quiz_title, "kept");
        match manager.answer("u", "أ").unwrap() {
            AnswerOutcome::Finished(r) => assert_eq!(r.text, "second result"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_quizzes_without_questions_are_never_offered() {
        let empty = Quiz {
            key: "لعبة1".into(),
            title: "empty".into(),
            questions: vec![],
        };
        let book = QuizBook::new(vec![empty], ResultTable::default());
        assert!(book.is_empty());
    }
}
