pub mod backtest;
pub mod box_score;
pub mod config;
pub mod error;
pub mod feature_select;
pub mod game_rows;
pub mod games_dataset;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod target;
