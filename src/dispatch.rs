//! Text command routing.
//!
//! Matching is exact after normalization (trim, lowercase, single spaces,
//! Arabic-Indic digits folded to ASCII).

use crate::content::Category;
use crate::quiz::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShowHelp,
    FetchContent(Category),
    AnswerPuzzle,
    HintPuzzle,
    ContinueStory,
    ListGames,
    CancelGame,
    SelectGame(usize),
    SubmitGameAnswer(Label),
    Unrecognized,
}

/// What the router needs to know about the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteContext {
    pub session_active: bool,
    pub game_count: usize,
}

const COMMANDS: &[(Action, &[&str])] = &[
    (Action::ShowHelp, &["مساعدة", "مساعده", "help", "الاوامر", "الأوامر"]),
    (
        Action::FetchContent(Category::Question),
        &["سؤال", "سوال", "اسأل", "اسال"],
    ),
    (Action::FetchContent(Category::Challenge), &["تحدي", "تحدى"]),
    (Action::FetchContent(Category::Confession), &["اعتراف"]),
    (Action::FetchContent(Category::Mention), &["منشن"]),
    (Action::FetchContent(Category::Situation), &["موقف"]),
    (Action::FetchContent(Category::Poem), &["شعر", "قصيدة", "قصيده"]),
    (
        Action::FetchContent(Category::WouldYouRather),
        &["لو خيروك", "خيروك"],
    ),
    (
        Action::FetchContent(Category::Quote),
        &["اقتباسات", "اقتباس", "حكمة", "حكمه"],
    ),
    (Action::FetchContent(Category::Riddle), &["لغز", "الغاز"]),
    (Action::FetchContent(Category::Proverb), &["مثل", "امثال", "أمثال"]),
    (Action::FetchContent(Category::Story), &["قصة", "قصه"]),
    (Action::HintPuzzle, &["لمح", "تلميح"]),
    (Action::AnswerPuzzle, &["جاوب", "الجواب", "الحل"]),
    (Action::ContinueStory, &["كمل", "تكملة", "تكمله", "التالي"]),
    (Action::ListGames, &["تحليل", "تحليل شخصية", "شخصية"]),
    (Action::CancelGame, &["الغاء", "إلغاء", "انهاء", "إنهاء"]),
];

pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(ascii_digit)
        .collect::<String>()
        .to_lowercase()
}

/// Arabic keyboards send `٠`-`٩` (and Persian ones `۰`-`۹`).
fn ascii_digit(c: char) -> char {
    let zero = match c {
        '\u{0660}'..='\u{0669}' => 0x0660,
        '\u{06F0}'..='\u{06F9}' => 0x06F0,
        _ => return c,
    };
    char::from_digit(c as u32 - zero, 10).unwrap_or(c)
}

/// Maps inbound text to an action. Table commands win; then a label counts
/// as a quiz answer while a session is live; only without a session does a
/// bare number select a quiz.
pub fn resolve(raw: &str, ctx: RouteContext) -> Action {
    let text = normalize(raw);

    if let Some((action, _)) = COMMANDS
        .iter()
        .find(|(_, forms)| forms.iter().any(|f| *f == text))
    {
        return *action;
    }

    if ctx.session_active {
        return match Label::parse(&text) {
            Some(label) => Action::SubmitGameAnswer(label),
            None => Action::Unrecognized,
        };
    }

    match text.parse::<usize>() {
        Ok(n) if n >= 1 && n <= ctx.game_count && text.chars().all(|c| c.is_ascii_digit()) => {
            Action::SelectGame(n)
        }
        _ => Action::Unrecognized,
    }
}

/// Canonical forms offered as quick-reply buttons.
pub fn menu_commands() -> &'static [&'static str] {
    &["سؤال", "منشن", "اعتراف", "تحدي", "موقف", "اقتباسات", "لغز", "قصة", "تحليل"]
}
