//! Hexuct: a Monte Carlo Tree Search engine for the game of Hex.
//!
//! The engine picks moves with a multi-threaded UCT search using RAVE
//! statistics, bridge-aware playouts and a time manager that splits a game
//! clock or a playout quota into per-move budgets.
//!
//! ## Modules
//!
//! - [`constants`] - Board dimensions and engine defaults
//! - [`board`] - Board state, union-find connectivity, bridges
//! - [`patterns`] - Ring patterns for playout replies
//! - [`connection`] - Flood-fill connection distances
//! - [`playout`] - Random game simulation with bridge heuristics
//! - [`tree`] - Lock-free node arena
//! - [`mcts`] - Parallel tree search with RAVE
//! - [`time_manager`] - Per-move search budgets
//! - [`config`] - Search parameters and strategy toggles
//! - [`game`] - Facade used by front ends
//!
//! ## Example
//!
//! ```
//! use hexuct::board::{Location, Move, Player};
//! use hexuct::config::Config;
//! use hexuct::game::Game;
//!
//! let mut game = Game::new(Config {
//!     arena_capacity: 1 << 16,
//!     ..Config::deterministic(1)
//! })
//! .unwrap();
//! game.time_manager_mut().playouts_per_move = 200;
//!
//! game.play(Move::new(Player::Black, Location::center())).unwrap();
//! let reply = game.gen_move().unwrap();
//! assert!(game.is_valid_move(Move::new(Player::White, reply)));
//! ```

pub mod board;
pub mod config;
pub mod connection;
pub mod constants;
pub mod game;
pub mod mcts;
pub mod patterns;
pub mod playout;
pub mod time_manager;
pub mod tree;
