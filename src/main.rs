use base64::{engine::general_purpose, Engine as _};
use chain_reaction::{
    arena::{run_match, tournament, Controller, MatchConfig, MatchOutcome, TournamentConfig},
    cli_rendering::{display_board, display_cell},
    engine::{SearchConfig, SearchEngine, Weights},
    presenter::{status_line, TextPresenter},
    run_tui, GameState, Player, Position,
};
use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Chain reaction territory game with a minimax bot", long_about = None)]
struct Cli {
    /// Board rows
    #[arg(long, global = true, default_value_t = 5)]
    rows: usize,

    /// Board columns
    #[arg(long, global = true, default_value_t = 5)]
    columns: usize,

    /// Bot search depth in plies
    #[arg(long, global = true, default_value_t = 3)]
    depth: u32,

    /// Evaluation weights as "base,exponent,center"
    #[arg(long, global = true, default_value_t = Weights::default())]
    weights: Weights,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play against the bot
    Play(PlayArgs),
    /// Print a base64 state, optionally after playing some moves
    Export(ExportArgs),
    /// Render a base64 state
    Import(StateArgs),
    /// List the legal moves of a base64 state
    ShowMoves(StateArgs),
    /// Search a base64 state and print every optimal move
    BestMoves(StateArgs),
    /// Self-play between the current weights and a challenger
    Arena(ArenaArgs),
}

#[derive(Args, Default)]
struct PlayArgs {
    /// Line based play on stdin/stdout instead of the terminal UI
    #[arg(long)]
    plain: bool,

    /// Let the bot open the game
    #[arg(long)]
    bot_first: bool,
}

#[derive(Args)]
struct ExportArgs {
    /// Moves to play from the empty board, e.g. "2,2"
    moves: Vec<Position>,
}

#[derive(Args)]
struct StateArgs {
    /// Base64 encoded state
    data: String,
}

#[derive(Args)]
struct ArenaArgs {
    /// Number of games to play
    #[arg(long, default_value_t = 10)]
    games: usize,

    /// Challenger weights as "base,exponent,center"
    #[arg(long)]
    challenger: Weights,

    /// Turn cap after which a game counts as unfinished
    #[arg(long, default_value_t = 200)]
    max_turns: u32,

    /// Seed of the first game
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; the terminal UI path never installs a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = SearchConfig {
        depth: cli.depth,
        weights: cli.weights,
        ..SearchConfig::default()
    };

    match cli.command {
        None => play(cli.rows, cli.columns, config, PlayArgs::default()),
        Some(Commands::Play(args)) => play(cli.rows, cli.columns, config, args),
        Some(Commands::Export(args)) => {
            init_tracing();
            let mut state = GameState::new(cli.rows, cli.columns)?;
            for position in args.moves {
                if !state.apply_move(position) {
                    return Err(format!("illegal move {} at turn {}", position, state.turn()).into());
                }
            }
            println!("{}", general_purpose::STANDARD.encode(state.to_binary()));
            Ok(())
        }
        Some(Commands::Import(args)) => {
            init_tracing();
            let state = decode_state(&args.data)?;
            display_board(state.board());
            println!("{}", status_line(&state));
            Ok(())
        }
        Some(Commands::ShowMoves(args)) => {
            init_tracing();
            let state = decode_state(&args.data)?;
            display_board(state.board());
            show_moves(&state);
            Ok(())
        }
        Some(Commands::BestMoves(args)) => {
            init_tracing();
            let state = decode_state(&args.data)?;
            show_best_moves(&state, config);
            Ok(())
        }
        Some(Commands::Arena(args)) => {
            init_tracing();
            let arena_config = TournamentConfig {
                rows: cli.rows,
                columns: cli.columns,
                games: args.games,
                depth: cli.depth,
                max_turns: Some(args.max_turns),
                seed: args.seed,
            };
            let report = tournament(cli.weights, args.challenger, arena_config)?;
            println!("Incumbent  {}: {} wins", cli.weights, report.incumbent_wins);
            println!("Challenger {}: {} wins", args.challenger, report.challenger_wins);
            println!("Unfinished: {}", report.unfinished);
            Ok(())
        }
    }
}

fn play(rows: usize, columns: usize, config: SearchConfig, args: PlayArgs) -> Result<(), Box<dyn Error>> {
    let state = GameState::new(rows, columns)?;
    let human = if args.bot_first { Player::Two } else { Player::One };

    if !args.plain {
        run_tui(state, config, human)?;
        return Ok(());
    }

    init_tracing();
    let mut state = state;
    let mut presenter = TextPresenter::new(io::stdin().lock(), io::stdout());
    let bot = Controller::Bot {
        engine: SearchEngine::new(config.weights),
        depth: config.depth,
        policy: config.selection,
    };
    let (mut one, mut two) = match human {
        Player::One => (Controller::Human, bot),
        Player::Two => (bot, Controller::Human),
    };

    let outcome = run_match(
        &mut state,
        &mut presenter,
        &mut one,
        &mut two,
        MatchConfig::default(),
        &mut rand::thread_rng(),
    );
    match outcome {
        MatchOutcome::Won(winner) if winner == human => println!("You win!"),
        MatchOutcome::Won(winner) => println!("{} wins.", winner),
        MatchOutcome::Abandoned | MatchOutcome::TurnLimit => println!("Game abandoned."),
    }
    Ok(())
}

fn decode_state(data: &str) -> chain_reaction::Result<GameState> {
    let bytes = general_purpose::STANDARD.decode(data.trim())?;
    GameState::from_binary(&bytes)
}

fn show_moves(state: &GameState) {
    if state.is_game_over() {
        println!("Game over, no moves available.");
        return;
    }
    println!("Available moves for {}:", state.current_player());
    for position in state.valid_moves() {
        let cell = state
            .board()
            .get(&position)
            .map(display_cell)
            .unwrap_or_default();
        println!(" - {} ({})", position, cell);
    }
}

fn show_best_moves(state: &GameState, config: SearchConfig) {
    let mut engine = SearchEngine::new(config.weights);
    let best = engine.best_moves(state, config.depth);

    println!("Best moves at depth {} with weights {}:", config.depth, config.weights);
    for scored in &best {
        match scored.mv {
            Some(position) => println!(" - {} scores {:.3}", position, scored.score),
            None => println!(" - no move, position scores {:.3}", scored.score),
        }
    }
    println!("{} optimal move(s)", best.iter().filter(|scored| scored.mv.is_some()).count());

    let stats = engine.get_statistics();
    println!("Nodes searched: {}", stats.nodes);
    println!("Leaves evaluated: {}", stats.leaves);
    println!("Cutoffs: {}", stats.cutoffs);
    println!("Table hit rate: {:.2}%", stats.table_hit_rate() * 100.0);
}
