use chain_reaction::cli_rendering::display_board;
use chain_reaction::engine::{SearchEngine, SelectionPolicy, Weights};
use chain_reaction::{GameState, Player};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    println!("Chain Reaction - Minimax Engine Example");
    println!("=======================================\n");

    let mut game = match GameState::new(4, 4) {
        Ok(game) => game,
        Err(e) => {
            eprintln!("✗ Failed to create game: {}", e);
            return;
        }
    };

    // Player one searches deeper with the default weights; player two only
    // counts dots.
    let mut one = SearchEngine::new(Weights::default());
    let mut two = SearchEngine::new(Weights {
        base_cell: 1.0,
        dot_exponent: 1.0,
        center: 0.0,
    });
    let mut rng = StdRng::seed_from_u64(42);

    println!("Bot one (depth 3) against bot two (depth 1) on a 4x4 board:\n");

    while !game.is_game_over() && game.turn() < 60 {
        let player = game.current_player();
        let (engine, depth) = match player {
            Player::One => (&mut one, 3),
            Player::Two => (&mut two, 1),
        };

        let ties = engine.best_moves(&game, depth);
        let Some(chosen) = SelectionPolicy::Random.select(&ties, &mut rng).and_then(|best| best.mv) else {
            break;
        };

        println!(
            "Turn {:>2}: {} plays {} ({} tied, score {:.2})",
            game.turn(),
            player,
            chosen,
            ties.len(),
            ties[0].score
        );
        game.apply_move(chosen);
    }

    println!();
    display_board(game.board());
    match game.winner() {
        Some(winner) => println!("\n{} wins after {} turns", winner, game.turn()),
        None => println!("\nNo winner after {} turns", game.turn()),
    }

    let stats = one.get_statistics();
    println!("\nBot one statistics:");
    println!("- Searches: {}", stats.searches);
    println!("- Nodes searched: {}", stats.nodes);
    println!("- Cutoffs: {}", stats.cutoffs);
    println!("- Table hit rate: {:.2}%", stats.table_hit_rate() * 100.0);
}
