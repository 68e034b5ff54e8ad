//! Game facade: the board, the engine and the clock behind one type.
//!
//! This is the surface a text-protocol adapter drives. Every configuration
//! change takes `&mut self`, so none can happen while a search borrows the
//! game.

use thiserror::Error;
use tracing::info;

use crate::board::{Board, Location, Move, Player};
use crate::config::{Config, ConfigError};
use crate::mcts::{Engine, SearchError, SearchStats, StopHandle};
use crate::patterns::init_patterns;
use crate::time_manager::TimeManager;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("invalid move: {} at {}", .0.player, .0.location)]
    InvalidMove(Move),

    #[error("the game is already finished")]
    Finished,

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct Game {
    board: Board,
    engine: Engine,
    config: Config,
    time_manager: TimeManager,
    last_search: Option<SearchStats>,
}

impl Game {
    pub fn new(config: Config) -> Result<Self, GameError> {
        config.validate()?;
        init_patterns();
        Ok(Self {
            board: Board::new(),
            engine: Engine::new(),
            time_manager: TimeManager::new(config.resources_part),
            config,
            last_search: None,
        })
    }

    /// Start a new game. Clock settings other than the per-game resources
    /// are kept.
    pub fn clear_board(&mut self) {
        self.board = Board::new();
        self.engine.reset();
        self.time_manager.reset();
        self.last_search = None;
    }

    pub fn is_valid_move(&self, mv: Move) -> bool {
        self.board.is_valid_move(mv)
    }

    /// Place a stone for `mv.player`. Either player may move at any time; the
    /// opponent of the mover moves next.
    pub fn play(&mut self, mv: Move) -> Result<(), GameError> {
        if !self.board.is_valid_move(mv) {
            return Err(GameError::InvalidMove(mv));
        }
        self.board.play_stone(mv.location, mv.player);
        self.engine.notify_play(mv);
        if let Some(winner) = self.board.winner() {
            info!(%winner, moves = self.board.moves_played(), "game over");
        }
        Ok(())
    }

    /// Search for the best move of the player to move. The move is not
    /// played.
    pub fn gen_move(&mut self) -> Result<Location, GameError> {
        if self.board.is_finished() {
            return Err(GameError::Finished);
        }
        let budget = self.time_manager.budget(&self.board);
        let outcome = self.engine.search(&self.board, &self.config, budget)?;
        self.time_manager.consume(outcome.stats.usage());
        self.last_search = Some(outcome.stats);
        Ok(outcome.best)
    }

    pub fn is_finished(&self) -> bool {
        self.board.is_finished()
    }

    pub fn winner(&self) -> Option<Player> {
        self.board.winner()
    }

    pub fn current_player(&self) -> Player {
        self.board.to_move()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn set_max_tree_depth(&mut self, depth: usize) -> Result<(), GameError> {
        Ok(self.engine.set_max_tree_depth(depth)?)
    }

    pub fn print_board(&self) -> String {
        self.board.to_string()
    }

    /// The search tree, at most `max_children` children per node.
    pub fn print_tree(&self, max_children: usize) -> String {
        match self.engine.tree() {
            Some(tree) => tree.format(max_children),
            None => String::from("no search tree\n"),
        }
    }

    pub fn set_defending_bridges(&mut self, on: bool) {
        self.config.toggles.defending_bridges = on;
    }

    pub fn set_avoiding_bridges(&mut self, on: bool) {
        self.config.toggles.avoiding_bridges = on;
    }

    pub fn time_manager(&self) -> &TimeManager {
        &self.time_manager
    }

    pub fn time_manager_mut(&mut self) -> &mut TimeManager {
        &mut self.time_manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: Config) -> Result<(), GameError> {
        config.validate()?;
        self.time_manager.resources_part = config.resources_part;
        self.config = config;
        Ok(())
    }

    /// Handle for cancelling a running `gen_move` from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.engine.stop_handle()
    }

    /// Statistics of the last `gen_move`.
    pub fn last_search(&self) -> Option<&SearchStats> {
        self.last_search.as_ref()
    }
}
