//! Feature engineering
//!
//! Converts stored games and box scores into point-in-time model inputs.

pub mod columns;
pub mod form;

pub use columns::FeatureColumn;
pub use form::{
    build_game_features, head_to_head, league_averages, matchup_features, team_form_as_of,
    GameFeatures, HeadToHead, LeagueAverages, TeamForm,
};
