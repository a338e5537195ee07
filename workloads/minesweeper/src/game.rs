//! The game collaborator the routes render through.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use worker_sdk::RouteError;

/// Board dimensions and mine count chosen by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub rows: u32,
    pub cols: u32,
    pub mines: u32,
}

impl GameSettings {
    /// Read settings from query parameters.
    ///
    /// Each missing, non-numeric or zero field falls back to `defaults`. Mines
    /// are capped so at least one cell is safe.
    pub fn from_query(query: &HashMap<String, String>, defaults: GameSettings) -> Self {
        let field = |name: &str, default: u32| {
            query
                .get(name)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        let rows = field("rows", defaults.rows);
        let cols = field("cols", defaults.cols);
        let mines = field("mines", defaults.mines).min(rows.saturating_mul(cols).saturating_sub(1));
        Self { rows, cols, mines }
    }

    /// Read settings persisted in the cookie, or `defaults` if there are none.
    pub fn from_cookie(cookie: Option<&str>, defaults: GameSettings) -> Self {
        let Some(cookie) = cookie else {
            return defaults;
        };
        match serde_json::from_str(cookie) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(error = %e, "unreadable settings cookie, using defaults");
                defaults
            }
        }
    }

    /// The cookie value these settings persist as.
    pub fn to_cookie(&self) -> Result<String, GameError> {
        serde_json::to_string(self).map_err(GameError::Settings)
    }
}

/// Failures while handling a game request.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("Only one cell may be selected")]
    MultipleSelected,

    #[error("No cell selected")]
    NothingSelected,

    #[error("Invalid cell: {0}")]
    InvalidCell(String),

    #[error("Settings could not be serialized: {0}")]
    Settings(#[source] serde_json::Error),
}

impl From<GameError> for RouteError {
    fn from(err: GameError) -> Self {
        RouteError::handler(err)
    }
}

/// Board generation, reveal rules and markup.
///
/// Implemented outside this crate; the routes only move data between the
/// request, the cookie and these calls.
pub trait Game: Send + Sync {
    /// Settings used when the player has chosen none.
    fn defaults(&self) -> GameSettings;

    /// Wrap contents in the full page.
    fn page(&self, contents: &str) -> String;

    /// Placeholder shown while the page fetches the settings form.
    fn loading_form(&self) -> String;

    /// The new game form, pre-filled with `settings`.
    fn new_game_form(&self, settings: &GameSettings) -> String;

    /// A fresh board.
    fn new_game(&self, settings: &GameSettings) -> String;

    /// Reveal `selected` on the board described by `cells` and render the result.
    ///
    /// Both are the serialized cells the board markup posts back.
    fn reveal(&self, cells: &[String], selected: &str) -> Result<String, GameError>;
}
