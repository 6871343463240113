//! Flex bubbles and quick replies for every reply the bot sends.

use serde_json::{json, Value};

use crate::content::{Category, Puzzle, Quote, Story};
use crate::dispatch::menu_commands;
use crate::models::{Message, MessageAction, QuickReply, QuickReplyItem};
use crate::quiz::{QuestionPrompt, Quiz, QuizResult};

const BG: &str = "#0a0a0c";
const CARD: &str = "#13131a";
const CARD_INNER: &str = "#1a1a22";
const PRIMARY: &str = "#9C6BFF";
const ACCENT: &str = "#A67CFF";
const BORDER: &str = "#B58CFF";
const TEXT: &str = "#FFFFFF";
const TEXT_DIM: &str = "#BFBFD9";
const TEXT_MUTED: &str = "#8C8CA3";
const BTN_SECONDARY: &str = "#1E1E27";

fn bubble(alt_text: &str, padding: &str, contents: Vec<Value>) -> Message {
    Message::Flex {
        alt_text: alt_text.to_string(),
        contents: json!({
            "type": "bubble",
            "direction": "rtl",
            "styles": {"body": {"backgroundColor": BG}},
            "body": {
                "type": "box",
                "layout": "vertical",
                "backgroundColor": BG,
                "paddingAll": padding,
                "contents": contents,
            }
        }),
    }
}

fn header(title: &str, icon: &str) -> Value {
    let text = if icon.is_empty() {
        title.to_string()
    } else {
        format!("{} {}", icon, title)
    };
    json!({
        "type": "box",
        "layout": "vertical",
        "backgroundColor": CARD,
        "cornerRadius": "16px",
        "paddingAll": "16px",
        "borderWidth": "1px",
        "borderColor": BORDER,
        "contents": [{
            "type": "text", "text": text, "weight": "bold", "size": "xl",
            "color": TEXT, "align": "center"
        }]
    })
}

fn panel(contents: Vec<Value>) -> Value {
    json!({
        "type": "box",
        "layout": "vertical",
        "margin": "xl",
        "paddingAll": "20px",
        "backgroundColor": CARD_INNER,
        "cornerRadius": "16px",
        "borderWidth": "1px",
        "borderColor": BORDER,
        "contents": contents,
    })
}

fn body_text(text: &str) -> Value {
    json!({
        "type": "text", "text": text, "size": "lg", "color": TEXT,
        "wrap": true, "align": "center"
    })
}

fn separator() -> Value {
    json!({"type": "separator", "margin": "lg", "color": BORDER})
}

fn button(label: &str, text: &str, primary: bool) -> Value {
    let (style, color) = if primary {
        ("primary", PRIMARY)
    } else {
        ("secondary", BTN_SECONDARY)
    };
    json!({
        "type": "button",
        "action": {"type": "message", "label": truncate_label(label), "text": text},
        "style": style,
        "color": color,
        "height": "sm"
    })
}

/// LINE rejects action labels over 40 characters.
fn truncate_label(label: &str) -> String {
    const MAX: usize = 40;
    if label.chars().count() <= MAX {
        label.to_string()
    } else {
        let mut cut: String = label.chars().take(MAX - 1).collect();
        cut.push('…');
        cut
    }
}

fn buttons(contents: Vec<Value>) -> Value {
    json!({
        "type": "box", "layout": "vertical", "margin": "xl", "spacing": "sm",
        "contents": contents
    })
}

pub fn menu() -> QuickReply {
    QuickReply {
        items: menu_commands()
            .iter()
            .map(|c| QuickReplyItem {
                kind: "action",
                action: MessageAction::new(*c, *c),
            })
            .collect(),
    }
}

pub fn help() -> Vec<Message> {
    let commands = menu_commands()
        .iter()
        .chain(["مثل", "شعر", "لو خيروك"].iter())
        .map(|c| {
            json!({
                "type": "text", "text": format!("• {}", c), "size": "md",
                "color": TEXT_DIM, "margin": "sm"
            })
        })
        .collect::<Vec<_>>();

    let card = bubble(
        "مساعدة",
        "20px",
        vec![
            header("بوت السهرة", ""),
            separator(),
            json!({
                "type": "text", "text": "أوامر البوت:", "weight": "bold", "size": "lg",
                "color": PRIMARY, "margin": "lg"
            }),
            json!({
                "type": "box", "layout": "vertical", "margin": "md", "spacing": "xs",
                "contents": commands
            }),
            separator(),
            json!({
                "type": "text",
                "text": "💡 تقدر تستخدم البوت بالخاص والقروبات",
                "size": "sm", "color": TEXT_MUTED, "wrap": true, "align": "center",
                "margin": "md"
            }),
        ],
    );

    vec![
        card,
        Message::Text {
            text: "اختر من الأزرار:".to_string(),
            quick_reply: Some(menu()),
        },
    ]
}

pub fn content(category: Category, text: &str) -> Message {
    bubble(
        category.title(),
        "24px",
        vec![
            header(category.title(), category.icon()),
            panel(vec![body_text(text)]),
        ],
    )
}

pub fn quote(quote: &Quote) -> Message {
    bubble(
        Category::Quote.title(),
        "24px",
        vec![
            header(Category::Quote.title(), Category::Quote.icon()),
            panel(vec![
                json!({
                    "type": "text", "text": format!("\"{}\"", quote.text), "size": "lg",
                    "color": TEXT, "wrap": true, "align": "center", "style": "italic"
                }),
                json!({
                    "type": "text", "text": format!("— {}", quote.author), "size": "sm",
                    "color": TEXT_MUTED, "align": "center", "margin": "lg"
                }),
            ]),
        ],
    )
}

pub fn puzzle(category: Category, puzzle: &Puzzle) -> Message {
    bubble(
        category.title(),
        "24px",
        vec![
            header(category.title(), category.icon()),
            panel(vec![body_text(&puzzle.prompt)]),
            buttons(vec![
                button("💡 تلميح", "لمح", false),
                button("✓ الجواب", "جاوب", true),
            ]),
        ],
    )
}

/// Shows a hint or an answer.
pub fn reveal(is_answer: bool, text: &str) -> Message {
    let (title, color) = if is_answer {
        ("✓ الجواب", PRIMARY)
    } else {
        ("💡 تلميح", ACCENT)
    };
    bubble(
        title,
        "24px",
        vec![
            json!({
                "type": "box", "layout": "vertical", "paddingAll": "16px",
                "backgroundColor": CARD, "cornerRadius": "16px",
                "borderWidth": "1px", "borderColor": BORDER,
                "contents": [{
                    "type": "text", "text": title, "weight": "bold", "size": "xl",
                    "color": color, "align": "center"
                }]
            }),
            panel(vec![body_text(text)]),
        ],
    )
}

/// One part of a story; `part` is 0-based.
pub fn story_part(story: &Story, part: usize) -> Message {
    let total = story.parts.len();
    let mut contents = vec![
        header(&story.title, Category::Story.icon()),
        panel(vec![body_text(&story.parts[part])]),
        json!({
            "type": "text", "text": format!("{}/{}", part + 1, total), "size": "xs",
            "color": TEXT_MUTED, "align": "center", "margin": "md"
        }),
    ];
    if part + 1 < total {
        contents.push(buttons(vec![button("📖 كمل", "كمل", true)]));
    }
    bubble(&story.title, "24px", contents)
}

pub fn games(quizzes: &[Quiz]) -> Message {
    let options = quizzes
        .iter()
        .take(10)
        .enumerate()
        .map(|(i, quiz)| button(&format!("{}. {}", i + 1, quiz.title), &(i + 1).to_string(), false))
        .collect();
    bubble(
        "تحليل الشخصية",
        "24px",
        vec![header("تحليل الشخصية", "🔮"), buttons(options)],
    )
}

pub fn question(prompt: &QuestionPrompt) -> Message {
    let options = prompt
        .options
        .iter()
        .map(|(label, text)| button(&format!("{}. {}", label, text), label.as_str(), false))
        .collect();
    bubble(
        &prompt.quiz_title,
        "20px",
        vec![
            json!({
                "type": "box", "layout": "horizontal",
                "contents": [
                    {"type": "text", "text": prompt.quiz_title, "weight": "bold", "size": "lg",
                     "color": PRIMARY, "flex": 1},
                    {"type": "text", "text": prompt.progress(), "size": "xs",
                     "color": TEXT_MUTED, "flex": 0, "align": "end"}
                ]
            }),
            separator(),
            json!({
                "type": "box", "layout": "vertical", "margin": "lg", "paddingAll": "16px",
                "backgroundColor": CARD, "cornerRadius": "8px",
                "borderWidth": "1px", "borderColor": BORDER,
                "contents": [{
                    "type": "text", "text": prompt.prompt, "size": "md",
                    "color": TEXT, "wrap": true
                }]
            }),
            buttons(options),
        ],
    )
}

pub fn result(result: &QuizResult) -> Message {
    bubble(
        "النتيجة",
        "20px",
        vec![
            json!({
                "type": "text", "text": "✨ نتيجة التحليل", "weight": "bold", "size": "xl",
                "color": PRIMARY, "align": "center"
            }),
            separator(),
            panel(vec![json!({
                "type": "text", "text": result.text, "size": "md", "color": TEXT,
                "wrap": true, "lineSpacing": "6px"
            })]),
            json!({
                "type": "text", "text": result.tally.summary(), "size": "xs",
                "color": TEXT_MUTED, "align": "center", "margin": "md"
            }),
            buttons(vec![button("🔄 تحليل جديد", "تحليل", true)]),
        ],
    )
}
