use std::sync::Arc;

use tracing::{debug, error, info};

use crate::content::{Category, ContentStore, Item, Puzzle};
use crate::dispatch::{resolve, Action, RouteContext};
use crate::error::{BotError, QuizError};
use crate::line::ReplySink;
use crate::models::{InboundText, Message};
use crate::quiz::{AnswerOutcome, QuizManager};
use crate::render;
use crate::sampler::Sampler;
use crate::user_state::{Slot, UserStateMap};

const RETRY_TEXT: &str = "حدث خطأ، حاول مرة أخرى";
const NO_PENDING_PUZZLE: &str = "لا يوجد لغز بانتظار الجواب، اكتب: لغز";
const NO_PENDING_STORY: &str = "لا توجد قصة بانتظار التكملة، اكتب: قصة";
const NO_HINT: &str = "لا يوجد تلميح لهذا اللغز";
const NO_GAMES: &str = "لا توجد تحليلات متاحة";

struct PendingPuzzle {
    category: Category,
    puzzle: Puzzle,
}

struct PendingStory {
    story: usize,
    next_part: usize,
}

pub struct ChatBot {
    content: Arc<ContentStore>,
    sampler: Sampler,
    quizzes: QuizManager,
    puzzles: UserStateMap<PendingPuzzle>,
    stories: UserStateMap<PendingStory>,
}

impl ChatBot {
    pub fn new(content: Arc<ContentStore>, sampler: Sampler, state_ttl_secs: u64) -> Self {
        let quizzes = QuizManager::new(Arc::clone(content.quizzes()), state_ttl_secs);
        Self {
            content,
            sampler,
            quizzes,
            puzzles: UserStateMap::new(state_ttl_secs),
            stories: UserStateMap::new(state_ttl_secs),
        }
    }

    /// Replies for one text message, or `None` when the bot stays quiet.
    /// Failures turn into a generic retry message here and go no further.
    pub fn respond(&self, user: &str, text: &str) -> Option<Vec<Message>> {
        match self.handle_text(user, text) {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to handle message from {}: {}", user, e);
                Some(vec![Message::text(RETRY_TEXT)])
            }
        }
    }

    /// Handles an inbound event and sends its single reply.
    pub async fn handle_event(&self, event: InboundText<'_>, sink: &dyn ReplySink) {
        let Some(messages) = self.respond(event.user_id, event.text) else {
            return;
        };
        if let Err(e) = sink.reply(event.reply_token, messages).await {
            error!("Failed to send reply to {}: {}", event.user_id, e);
        }
    }

    fn handle_text(&self, user: &str, text: &str) -> Result<Option<Vec<Message>>, BotError> {
        let ctx = RouteContext {
            session_active: self.quizzes.is_active(user),
            game_count: self.quizzes.book().len(),
        };
        let action = resolve(text, ctx);
        debug!("Routing {:?} from {} to {:?}", text, user, action);

        let reply = match action {
            Action::ShowHelp => render::help(),
            Action::FetchContent(category) => self.fetch(user, category)?,
            Action::HintPuzzle => vec![self.hint(user)],
            Action::AnswerPuzzle => vec![self.reveal_answer(user)],
            Action::ContinueStory => vec![self.continue_story(user)?],
            Action::ListGames => {
                let book = self.quizzes.book();
                if book.is_empty() {
                    vec![Message::text(NO_GAMES)]
                } else {
                    vec![render::games(book.quizzes())]
                }
            }
            Action::SelectGame(n) => match self.quizzes.select(user, n) {
                Ok(prompt) => vec![render::question(&prompt)],
                // A live session keeps its progress; the selection is ignored.
                Err(QuizError::AlreadyInProgress) => return Ok(None),
                Err(e) => return Err(e.into()),
            },
            Action::SubmitGameAnswer(label) => return Ok(self.answer_game(user, label.as_str())),
            Action::CancelGame => match self.quizzes.cancel(user) {
                Ok(()) => vec![Message::text("تم إلغاء التحليل")],
                Err(QuizError::NoSession) => vec![Message::text("لا يوجد تحليل جاري")],
                Err(e) => return Err(e.into()),
            },
            Action::Unrecognized => {
                if !ctx.session_active {
                    return Ok(None);
                }
                return Ok(self.answer_game(user, text));
            }
        };
        Ok(Some(reply))
    }

    fn fetch(&self, user: &str, category: Category) -> Result<Vec<Message>, BotError> {
        let item = match self.content.get(category, &self.sampler) {
            Ok(item) => item,
            Err(BotError::EmptyCollection(_)) => {
                return Ok(vec![Message::text(format!(
                    "لا يوجد محتوى متاح حالياً في: {}",
                    category.title()
                ))]);
            }
            Err(e) => return Err(e),
        };

        let message = match item {
            Item::Text(text) => render::content(category, text),
            Item::Quote(quote) => render::quote(quote),
            Item::Puzzle(puzzle) => {
                self.puzzles.insert(
                    user,
                    PendingPuzzle {
                        category,
                        puzzle: puzzle.clone(),
                    },
                );
                render::puzzle(category, puzzle)
            }
            Item::Story { index, story } => {
                if story.parts.len() > 1 {
                    self.stories.insert(
                        user,
                        PendingStory {
                            story: index,
                            next_part: 1,
                        },
                    );
                } else {
                    self.stories.take(user);
                }
                render::story_part(story, 0)
            }
        };
        Ok(vec![message])
    }

    /// The hint leaves the puzzle pending.
    fn hint(&self, user: &str) -> Message {
        let hint = self
            .puzzles
            .alter(user, |pending| (pending.puzzle.hint.clone(), Slot::Keep));
        match hint {
            Some(Some(hint)) => render::reveal(false, &hint),
            Some(None) => Message::text(NO_HINT),
            None => Message::text(NO_PENDING_PUZZLE),
        }
    }

    fn reveal_answer(&self, user: &str) -> Message {
        match self.puzzles.take(user) {
            Some(pending) => {
                debug!("Revealed {:?} answer for {}", pending.category, user);
                render::reveal(true, &pending.puzzle.answer)
            }
            None => Message::text(NO_PENDING_PUZZLE),
        }
    }

    fn continue_story(&self, user: &str) -> Result<Message, BotError> {
        let step = self.stories.alter(user, |pending| {
            let part = pending.next_part;
            let parts = self
                .content
                .story(pending.story)
                .map_or(0, |story| story.parts.len());
            pending.next_part += 1;
            let slot = if pending.next_part >= parts {
                Slot::Clear
            } else {
                Slot::Keep
            };
            ((pending.story, part), slot)
        });

        let Some((index, part)) = step else {
            return Ok(Message::text(NO_PENDING_STORY));
        };
        match self.content.story(index) {
            Some(story) if part < story.parts.len() => Ok(render::story_part(story, part)),
            _ => Err(BotError::InvalidSelection(format!(
                "story {} has no part {}",
                index, part
            ))),
        }
    }

    /// `None` when the session ended between routing and answering.
    fn answer_game(&self, user: &str, raw: &str) -> Option<Vec<Message>> {
        let outcome = match self.quizzes.answer(user, raw) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("Quiz answer from {} dropped: {}", user, e);
                return None;
            }
        };
        Some(match outcome {
            AnswerOutcome::Next(prompt) => vec![render::question(&prompt)],
            AnswerOutcome::Rejected(prompt) => vec![
                Message::text("اختر أ أو ب أو ج"),
                render::question(&prompt),
            ],
            AnswerOutcome::Finished(result) => vec![render::result(&result)],
        })
    }

    /// Drops expired per-user state everywhere.
    pub fn purge_expired(&self) {
        let sessions = self.quizzes.purge_expired();
        let puzzles = self.puzzles.purge_expired();
        let stories = self.stories.purge_expired();
        if sessions + puzzles + stories > 0 {
            info!(
                "Evicted {} quiz sessions, {} puzzles, {} stories; {} puzzles and {} stories still pending",
                sessions,
                puzzles,
                stories,
                self.puzzles.len(),
                self.stories.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::UsageCursors;
    use std::fs;
    use std::sync::Mutex;

    fn bot_with(files: &[(&str, &str)], ttl: u64) -> ChatBot {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let store = ContentStore::load(dir.path());
        ChatBot::new(
            Arc::new(store),
            Sampler::new(Arc::new(UsageCursors::default())),
            ttl,
        )
    }

    fn flex_text(messages: &[Message]) -> String {
        serde_json::to_string(messages).unwrap()
    }

    fn plain(messages: &[Message]) -> &str {
        match &messages[0] {
            Message::Text { text, .. } => text,
            other => panic!("expected text, got {:?}", other),
        }
    }

    const RIDDLES: &str = r#"[
        {"question": "r1", "answer": "a1", "hint": "h1"},
        {"question": "r2", "answer": "a2", "hint": "h2"},
        {"question": "r3", "answer": "a3", "hint": "h3"}
    ]"#;

    const GAMES: &str = r#"{
        "لعبة1": {"title": "G1", "questions": [
            {"question": "gq1", "options": {"أ": "x", "ب": "y", "ج": "z"}},
            {"question": "gq2", "options": {"أ": "x", "ب": "y", "ج": "z"}}
        ]},
        "لعبة2": {"title": "G2", "questions": [
            {"question": "hq1", "options": {"أ": "x", "ب": "y"}}
        ]}
    }"#;

    #[test]
    fn test_riddle_hint_answer_flow() {
        let bot = bot_with(&[("riddles.json", RIDDLES)], 600);

        let shown = bot.respond("u", "لغز").unwrap();
        let shown = flex_text(&shown);
        let n = ["r1", "r2", "r3"]
            .iter()
            .position(|r| shown.contains(&format!("\"{}\"", r)))
            .unwrap()
            + 1;

        let hint = flex_text(&bot.respond("u", "لمح").unwrap());
        assert!(hint.contains(&format!("\"h{}\"", n)));
        // Still pending after the hint.
        let hint_again = flex_text(&bot.respond("u", "لمح").unwrap());
        assert!(hint_again.contains(&format!("\"h{}\"", n)));

        let answer = flex_text(&bot.respond("u", "جاوب").unwrap());
        assert!(answer.contains(&format!("\"a{}\"", n)));

        let after = bot.respond("u", "جاوب").unwrap();
        assert_eq!(plain(&after), NO_PENDING_PUZZLE);
    }

    #[test]
    fn test_pending_puzzle_is_per_user() {
        let bot = bot_with(&[("riddles.json", RIDDLES)], 600);
        bot.respond("alice", "لغز").unwrap();

        assert_eq!(plain(&bot.respond("bob", "جاوب").unwrap()), NO_PENDING_PUZZLE);
        assert!(matches!(
            bot.respond("alice", "جاوب").unwrap()[0],
            Message::Flex { .. }
        ));
    }

    #[test]
    fn test_riddle_without_hint() {
        let bot = bot_with(
            &[("proverbs.json", r#"[{"proverb": "p", "answer": "m"}]"#)],
            600,
        );
        bot.respond("u", "مثل").unwrap();
        assert_eq!(plain(&bot.respond("u", "لمح").unwrap()), NO_HINT);
        assert!(flex_text(&bot.respond("u", "جاوب").unwrap()).contains("\"m\""));
    }

    #[test]
    fn test_empty_category_is_reported() {
        let bot = bot_with(&[], 600);
        let reply = bot.respond("u", "تحدي").unwrap();
        assert!(plain(&reply).contains("تحدي"));
        assert_eq!(plain(&bot.respond("u", "تحليل").unwrap()), NO_GAMES);
    }

    #[test]
    fn test_content_fetch_does_not_repeat() {
        let bot = bot_with(&[("questions.txt", "one\ntwo\nthree\n")], 600);
        let mut seen: Vec<String> = (0..3)
            .map(|i| {
                let user = format!("user{}", i);
                let json = flex_text(&bot.respond(&user, "سوال").unwrap());
                ["one", "two", "three"]
                    .iter()
                    .find(|w| json.contains(&format!("\"{}\"", w)))
                    .unwrap()
                    .to_string()
            })
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["one", "three", "two"]);
    }

    #[test]
    fn test_story_continues_until_last_part() {
        let bot = bot_with(
            &[(
                "stories.json",
                r#"[{"title": "tale", "parts": ["p-one", "p-two", "p-three"]}]"#,
            )],
            600,
        );

        assert!(flex_text(&bot.respond("u", "قصة").unwrap()).contains("p-one"));
        assert!(flex_text(&bot.respond("u", "كمل").unwrap()).contains("p-two"));
        assert!(flex_text(&bot.respond("u", "كمل").unwrap()).contains("p-three"));
        assert_eq!(plain(&bot.respond("u", "كمل").unwrap()), NO_PENDING_STORY);
    }

    #[test]
    fn test_quiz_through_text_commands() {
        let bot = bot_with(
            &[
                ("personality_games.json", GAMES),
                ("detailed_results.json", r#"{"لعبة1": {"ب": "you are B"}}"#),
            ],
            600,
        );

        assert!(flex_text(&bot.respond("u", "تحليل").unwrap()).contains("G2"));
        assert!(flex_text(&bot.respond("u", "1").unwrap()).contains("1/2"));
        // "2" is now an answer, not a selection.
        assert!(flex_text(&bot.respond("u", "2").unwrap()).contains("2/2"));

        let rejected = bot.respond("u", "maybe").unwrap();
        assert_eq!(rejected.len(), 2);
        assert!(flex_text(&rejected).contains("2/2"));

        let done = flex_text(&bot.respond("u", "b").unwrap());
        assert!(done.contains("you are B"));
        assert!(done.contains("ب: 2"));

        // No session now: unknown text is ignored.
        assert!(bot.respond("u", "maybe").is_none());
    }

    #[test]
    fn test_cancel_game() {
        let bot = bot_with(&[("personality_games.json", GAMES)], 600);
        bot.respond("u", "2").unwrap();
        assert!(bot.quizzes.is_active("u"));

        assert_eq!(plain(&bot.respond("u", "الغاء").unwrap()), "تم إلغاء التحليل");
        assert!(!bot.quizzes.is_active("u"));
        assert_eq!(plain(&bot.respond("u", "الغاء").unwrap()), "لا يوجد تحليل جاري");
        assert!(bot.respond("u", "7").is_none());
    }

    #[test]
    fn test_expired_state_is_gone() {
        let bot = bot_with(&[("riddles.json", RIDDLES), ("personality_games.json", GAMES)], 0);
        bot.respond("u", "لغز").unwrap();
        bot.respond("u", "1").unwrap();

        assert_eq!(plain(&bot.respond("u", "جاوب").unwrap()), NO_PENDING_PUZZLE);
        assert!(!bot.quizzes.is_active("u"));
        bot.purge_expired();
        assert_eq!(bot.puzzles.len(), 0);
    }

    #[test]
    fn test_help_has_quick_replies() {
        let bot = bot_with(&[], 600);
        let reply = bot.respond("u", "مساعدة").unwrap();
        assert_eq!(reply.len(), 2);
        assert!(matches!(
            &reply[1],
            Message::Text {
                quick_reply: Some(_),
                ..
            }
        ));
    }

    struct RecordingSink {
        sent: Mutex<Vec<(String, Vec<Message>)>>,
    }

    #[async_trait::async_trait]
    impl ReplySink for RecordingSink {
        async fn reply(&self, reply_token: &str, messages: Vec<Message>) -> Result<(), BotError> {
            self.sent
                .lock()
                .unwrap()
                .push((reply_token.to_string(), messages));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handle_event_replies_once() {
        let bot = bot_with(&[("confessions.txt", "secret")], 600);
        let sink = RecordingSink {
            sent: Mutex::new(Vec::new()),
        };

        bot.handle_event(
            InboundText {
                user_id: "u",
                text: "اعتراف",
                reply_token: "token-1",
            },
            &sink,
        )
        .await;
        bot.handle_event(
            InboundText {
                user_id: "u",
                text: "just chatting",
                reply_token: "token-2",
            },
            &sink,
        )
        .await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "token-1");
        assert!(flex_text(&sent[0].1).contains("secret"));
    }
}
