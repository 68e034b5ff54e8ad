//! Hexuct: Hex MCTS engine driver.
//!
//! ## Usage
//!
//! - `hexuct` - Show a demo
//! - `hexuct demo` - Search one reply to a center opening
//! - `hexuct selfplay` - Play full games engine against engine
//! - `hexuct bench` - Measure playout throughput

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use fastrand::Rng;
use tracing::info;

use hexuct::board::{Board, Location, Move, Player};
use hexuct::config::{Config, Initialization};
use hexuct::game::Game;
use hexuct::playout::playout;
use hexuct::time_manager::TimeManagement;

/// Hexuct: a Monte Carlo Tree Search engine for Hex
#[derive(Parser)]
#[command(name = "hexuct")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one reply to a center opening and print the tree
    Demo(EngineArgs),
    /// Play games engine against engine
    Selfplay {
        #[command(flatten)]
        engine: EngineArgs,
        /// Number of games
        #[arg(long, default_value_t = 1)]
        games: usize,
    },
    /// Measure playout throughput on the empty board
    Bench {
        /// Number of playouts
        #[arg(long, default_value_t = 10_000)]
        playouts: u64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

#[derive(Args, Clone)]
struct EngineArgs {
    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    threads: Option<usize>,
    /// Base RNG seed
    #[arg(long)]
    seed: Option<u64>,
    /// 0 = playouts per move, 1 = playout moves per game, 2 = time
    #[arg(long, default_value_t = 0)]
    time_management: u32,
    #[arg(long, default_value_t = 2_000)]
    playouts_per_move: u64,
    /// Game clock in seconds, for time management 2
    #[arg(long, default_value_t = 60)]
    time: u64,
    /// 0 = plain, 1 = even priors, 2 = bridge priors, 3 = delayed expansion
    #[arg(long, default_value_t = 2)]
    initialization: u32,
    #[arg(long)]
    max_tree_depth: Option<usize>,
    /// Disable RAVE
    #[arg(long)]
    no_rave: bool,
    /// Keep no tree between moves
    #[arg(long)]
    no_reuse: bool,
}

impl EngineArgs {
    fn build(&self) -> Result<Game> {
        let mut config = Config::default();
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        config.seed = self.seed;
        config.initialization = Initialization::from_index(self.initialization)
            .with_context(|| format!("unknown initialization {}", self.initialization))?;
        config.toggles.rave = !self.no_rave;
        config.reuse_tree = !self.no_reuse;

        let mut game = Game::new(config)?;
        if let Some(depth) = self.max_tree_depth {
            game.set_max_tree_depth(depth)?;
        }
        let tm = game.time_manager_mut();
        tm.management = TimeManagement::from_index(self.time_management)
            .with_context(|| format!("unknown time management {}", self.time_management))?;
        tm.playouts_per_move = self.playouts_per_move;
        tm.time_left = Duration::from_secs(self.time);
        Ok(game)
    }
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Some(Commands::Demo(engine)) => run_demo(&engine),
        Some(Commands::Selfplay { engine, games }) => run_selfplay(&engine, games),
        Some(Commands::Bench { playouts, seed }) => run_bench(playouts, seed),
        None => run_demo(&EngineArgs {
            threads: None,
            seed: None,
            time_management: 0,
            playouts_per_move: 2_000,
            time: 60,
            initialization: 2,
            max_tree_depth: None,
            no_rave: false,
            no_reuse: false,
        }),
    }
}

fn run_demo(args: &EngineArgs) -> Result<()> {
    println!("Hexuct: Hex MCTS Engine\n");

    let mut game = args.build()?;
    game.play(Move::new(Player::Black, Location::center()))?;
    println!("{}", game.print_board());

    let reply = game.gen_move()?;
    println!("white replies {reply}");
    if let Some(stats) = game.last_search() {
        println!(
            "{} playouts in {:.2}s, win rate {:.1}%",
            stats.playouts,
            stats.elapsed.as_secs_f64(),
            stats.win_rate * 100.0
        );
    }
    println!("{}", game.print_tree(5));
    Ok(())
}

fn run_selfplay(args: &EngineArgs, games: usize) -> Result<()> {
    let mut wins = [0usize; 2];
    let mut game = args.build()?;
    for index in 0..games {
        game.clear_board();
        while !game.is_finished() {
            let player = game.current_player();
            let loc = game.gen_move()?;
            game.play(Move::new(player, loc))?;
        }
        let Some(winner) = game.winner() else {
            bail!("game {index} ended without a winner");
        };
        wins[winner.index()] += 1;
        info!(
            game = index,
            %winner,
            moves = game.board().moves_played(),
            "self-play game finished"
        );
        println!("{}", game.print_board());
    }
    println!("black {} - white {}", wins[0], wins[1]);
    Ok(())
}

fn run_bench(playouts: u64, seed: u64) -> Result<()> {
    let config = Config::default();
    let mut rng = Rng::with_seed(seed);
    let mut played = Vec::new();
    let mut wins = [0u64; 2];
    let mut moves = 0u64;

    let start = Instant::now();
    for _ in 0..playouts {
        let mut board = Board::new();
        played.clear();
        if let Some(winner) = playout(&mut board, &config.toggles, &mut rng, &mut played) {
            wins[winner.index()] += 1;
        }
        moves += played.len() as u64;
    }
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "{playouts} playouts, {moves} moves in {elapsed:.2}s ({:.0} playouts/s)",
        playouts as f64 / elapsed.max(f64::EPSILON)
    );
    println!("black {} - white {}", wins[0], wins[1]);
    Ok(())
}
