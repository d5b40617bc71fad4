use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    /// Unknown values map to `Other`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Gender::Male,
            "female" | "f" => Gender::Female,
            _ => Gender::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    #[default]
    Assistant,
    Coach,
    Friend,
    Girlfriend,
    Boyfriend,
}

impl Personality {
    /// Unknown values map to `Assistant`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "coach" => Personality::Coach,
            "friend" => Personality::Friend,
            "girlfriend" => Personality::Girlfriend,
            "boyfriend" => Personality::Boyfriend,
            _ => Personality::Assistant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Assistant => "assistant",
            Personality::Coach => "coach",
            Personality::Friend => "friend",
            Personality::Girlfriend => "girlfriend",
            Personality::Boyfriend => "boyfriend",
        }
    }
}

/// Authenticated user as supplied by the identity layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub full_name: Option<String>,
    pub timezone: String,
    pub gender: Gender,
    pub chat_personality: Personality,
    pub preferred_language: String,
}

impl User {
    pub fn new(id: i32, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: None,
            timezone: "UTC".to_string(),
            gender: Gender::Other,
            chat_personality: Personality::Assistant,
            preferred_language: "en".to_string(),
        }
    }
}
