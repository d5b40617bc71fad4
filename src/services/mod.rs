pub mod assistant;
pub mod duration;
pub mod locale;
pub mod prompt;
pub mod tags;
