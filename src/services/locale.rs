use chrono::DateTime;
use chrono_tz::Tz;

use crate::domains::event::CalendarEvent;

/// Reply languages with localized fixed strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Russian,
}

impl Language {
    /// Accepts codes and names ("ru", "Russian", "русский"); anything else is
    /// English.
    pub fn from_preference(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "ru" | "ru-ru" | "rus" | "russian" | "русский" => Language::Russian,
            _ => Language::English,
        }
    }

    /// Cyrillic letters mean Russian, Latin letters mean English, otherwise
    /// the user's preference decides.
    pub fn detect(text: &str, preferred: &str) -> Self {
        if text.chars().any(is_cyrillic) {
            Language::Russian
        } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
            Language::English
        } else {
            Language::from_preference(preferred)
        }
    }

    /// Name used in the "respond in" directive.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Russian => "Russian",
        }
    }

    pub fn apology(&self) -> String {
        match self {
            Language::English => {
                "Sorry, I can't reach the assistant service right now. Please try again in a moment."
            }
            Language::Russian => {
                "Извините, сервис ассистента сейчас недоступен. Попробуйте ещё раз чуть позже."
            }
        }
        .to_string()
    }

    pub fn generic_failure(&self) -> String {
        match self {
            Language::English => "Something went wrong while handling your message. Please try again.",
            Language::Russian => "Что-то пошло не так при обработке сообщения. Попробуйте ещё раз.",
        }
        .to_string()
    }

    pub fn empty_message(&self) -> String {
        match self {
            Language::English => "Your message is empty. What would you like to do?",
            Language::Russian => "Сообщение пустое. Что вы хотите сделать?",
        }
        .to_string()
    }

    pub fn conflict(&self, existing: &CalendarEvent, tz: Tz) -> String {
        let start = existing.start_time.with_timezone(&tz);
        let end = existing.effective_end().with_timezone(&tz);
        match self {
            Language::English => format!(
                "That time overlaps \"{}\" ({} {}-{}). I didn't add the event; pick another time?",
                existing.title,
                start.format("%Y-%m-%d"),
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
            Language::Russian => format!(
                "Это время пересекается с «{}» ({} {}-{}). Событие не добавлено, выберите другое время?",
                existing.title,
                start.format("%Y-%m-%d"),
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
        }
    }

    pub fn past_time(&self, when: DateTime<Tz>) -> String {
        match self {
            Language::English => format!(
                "{} is already in the past, so I can't schedule it. Please choose a future time.",
                when.format("%Y-%m-%d %H:%M")
            ),
            Language::Russian => format!(
                "{} уже прошло, запланировать нельзя. Выберите время в будущем.",
                when.format("%Y-%m-%d %H:%M")
            ),
        }
    }

    pub fn invalid_event(&self) -> String {
        match self {
            Language::English => {
                "I couldn't understand the event details (title, start and length). Could you rephrase?"
            }
            Language::Russian => {
                "Не удалось разобрать детали события (название, начало и длительность). Уточните, пожалуйста."
            }
        }
        .to_string()
    }

    pub fn not_found(&self) -> String {
        match self {
            Language::English => "I couldn't find a matching event in your calendar.",
            Language::Russian => "Не нашёл подходящего события в календаре.",
        }
        .to_string()
    }

    pub fn ambiguous(&self, candidates: &[CalendarEvent], tz: Tz) -> String {
        let mut out = match self {
            Language::English => "Several events match. Which one should I delete?".to_string(),
            Language::Russian => "Подходит несколько событий. Какое удалить?".to_string(),
        };
        for event in candidates {
            let start = event.start_time.with_timezone(&tz);
            out.push_str(&format!(
                "\n- [id {}] {} {}",
                event.id,
                start.format("%Y-%m-%d %H:%M"),
                event.title
            ));
        }
        out
    }

    pub fn created(&self, event: &CalendarEvent, tz: Tz) -> String {
        let start = event.start_time.with_timezone(&tz);
        let end = event.effective_end().with_timezone(&tz);
        match self {
            Language::English => format!(
                "Added \"{}\" on {} {}-{}.",
                event.title,
                start.format("%Y-%m-%d"),
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
            Language::Russian => format!(
                "Добавил «{}» на {} {}-{}.",
                event.title,
                start.format("%Y-%m-%d"),
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
        }
    }

    pub fn deleted(&self, event: &CalendarEvent, tz: Tz) -> String {
        let start = event.start_time.with_timezone(&tz);
        match self {
            Language::English => format!(
                "Deleted \"{}\" ({}).",
                event.title,
                start.format("%Y-%m-%d %H:%M")
            ),
            Language::Russian => format!(
                "Удалил «{}» ({}).",
                event.title,
                start.format("%Y-%m-%d %H:%M")
            ),
        }
    }
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}
