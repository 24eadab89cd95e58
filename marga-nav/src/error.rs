//! Error types for the navigation layer.

use thiserror::Error;

/// Navigation layer error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("planner invoked without a map")]
    MissingMap,

    #[error("planner invoked without a start position")]
    MissingStart,

    #[error("planner invoked without a goal position")]
    MissingGoal,

    #[error(transparent)]
    Map(#[from] marga_map::MapError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
