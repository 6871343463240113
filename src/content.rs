//! Content collections loaded once at startup.
//!
//! Every source degrades to an empty collection when it is missing or does
//! not parse; loading never fails the process.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::BotError;
use crate::quiz::{QuizBook, RawQuiz, ResultTable};
use crate::sampler::Sampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Question,
    Challenge,
    Confession,
    Mention,
    Situation,
    Poem,
    WouldYouRather,
    Quote,
    Riddle,
    Proverb,
    Story,
}

impl Category {
    /// Categories stored as plain line files, with their file names.
    pub const LINE_SOURCES: &'static [(Category, &'static str)] = &[
        (Category::Question, "questions.txt"),
        (Category::Challenge, "challenges.txt"),
        (Category::Confession, "confessions.txt"),
        (Category::Mention, "more_questions.txt"),
        (Category::Situation, "situations.txt"),
        (Category::Poem, "poems.txt"),
        (Category::WouldYouRather, "would_you_rather.txt"),
    ];

    pub fn title(self) -> &'static str {
        match self {
            Category::Question => "سؤال",
            Category::Challenge => "تحدي",
            Category::Confession => "اعتراف",
            Category::Mention => "منشن",
            Category::Situation => "موقف",
            Category::Poem => "شعر",
            Category::WouldYouRather => "لو خيروك",
            Category::Quote => "اقتباس",
            Category::Riddle => "لغز",
            Category::Proverb => "مثل",
            Category::Story => "قصة",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::Question => "💭",
            Category::Challenge => "🎯",
            Category::Confession => "🤫",
            Category::Mention => "👥",
            Category::Situation => "🎭",
            Category::Poem => "🪶",
            Category::WouldYouRather => "⚖️",
            Category::Quote => "✨",
            Category::Riddle => "🧩",
            Category::Proverb => "📜",
            Category::Story => "📖",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Quote {
    pub text: String,
    #[serde(default = "unknown_author")]
    pub author: String,
}

fn unknown_author() -> String {
    "مجهول".to_string()
}

/// A riddle or proverb: a prompt whose answer is revealed on request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Puzzle {
    #[serde(alias = "question", alias = "proverb")]
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Story {
    pub title: String,
    pub parts: Vec<String>,
}

/// One drawn item, borrowed from the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    Text(&'a str),
    Quote(&'a Quote),
    Puzzle(&'a Puzzle),
    Story { index: usize, story: &'a Story },
}

#[derive(Default)]
pub struct ContentStore {
    lines: HashMap<Category, Vec<String>>,
    quotes: Vec<Quote>,
    riddles: Vec<Puzzle>,
    proverbs: Vec<Puzzle>,
    stories: Vec<Story>,
    quizzes: Arc<QuizBook>,
}

impl ContentStore {
    pub fn load(dir: &Path) -> Self {
        let mut lines = HashMap::new();
        for (category, file) in Category::LINE_SOURCES {
            lines.insert(*category, read_lines(&dir.join(file)));
        }

        let stories: Vec<Story> = read_json(&dir.join("stories.json"));
        let stories = stories
            .into_iter()
            .filter(|s| !s.parts.is_empty())
            .collect();

        let raw_quizzes: HashMap<String, RawQuiz> = read_json(&dir.join("personality_games.json"));
        let results: ResultTable = read_json(&dir.join("detailed_results.json"));

        let store = Self {
            lines,
            quotes: read_json(&dir.join("quotes.json")),
            riddles: read_json(&dir.join("riddles.json")),
            proverbs: read_json(&dir.join("proverbs.json")),
            stories,
            quizzes: Arc::new(QuizBook::from_raw(raw_quizzes, results)),
        };

        info!(
            "Content loaded from {}: {} lines, {} quotes, {} riddles, {} proverbs, {} stories, {} quizzes",
            dir.display(),
            store.lines.values().map(Vec::len).sum::<usize>(),
            store.quotes.len(),
            store.riddles.len(),
            store.proverbs.len(),
            store.stories.len(),
            store.quizzes.len(),
        );
        store
    }

    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Quote => self.quotes.len(),
            Category::Riddle => self.riddles.len(),
            Category::Proverb => self.proverbs.len(),
            Category::Story => self.stories.len(),
            _ => self.lines.get(&category).map_or(0, Vec::len),
        }
    }

    /// Draws the next item of `category` without repeating within a cycle.
    pub fn get(&self, category: Category, sampler: &Sampler) -> Result<Item<'_>, BotError> {
        let index = sampler
            .next_index(category, self.len(category))
            .ok_or(BotError::EmptyCollection(category))?;
        self.item(category, index)
            .ok_or(BotError::EmptyCollection(category))
    }

    fn item(&self, category: Category, index: usize) -> Option<Item<'_>> {
        match category {
            Category::Quote => self.quotes.get(index).map(Item::Quote),
            Category::Riddle => self.riddles.get(index).map(Item::Puzzle),
            Category::Proverb => self.proverbs.get(index).map(Item::Puzzle),
            Category::Story => self
                .stories
                .get(index)
                .map(|story| Item::Story { index, story }),
            _ => self
                .lines
                .get(&category)
                .and_then(|l| l.get(index))
                .map(|s| Item::Text(s.as_str())),
        }
    }

    pub fn story(&self, index: usize) -> Option<&Story> {
        self.stories.get(index)
    }

    pub fn quizzes(&self) -> &Arc<QuizBook> {
        &self.quizzes
    }
}

/// Reads non-blank trimmed lines; an absent or unreadable file is empty.
pub fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Content source {} not found, using empty collection", path.display());
            Vec::new()
        }
        Err(e) => {
            log_malformed(path, e.to_string());
            Vec::new()
        }
    }
}

/// Parses a JSON file; an absent or malformed file yields `T::default()`.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Content source {} not found, using empty collection", path.display());
            return T::default();
        }
        Err(e) => {
            log_malformed(path, e.to_string());
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            log_malformed(path, e.to_string());
            T::default()
        }
    }
}

fn log_malformed(path: &Path, reason: String) {
    let err = BotError::MalformedSource {
        path: PathBuf::from(path),
        reason,
    };
    error!("{}", err);
}
