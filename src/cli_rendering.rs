use crate::board::{Board, Cell, Player};

pub fn player_to_char(player: Player) -> char {
    match player {
        Player::One => 'X',
        Player::Two => 'O',
    }
}

/// `.` for an empty cell, otherwise dot count and owner, e.g. `3X`.
pub fn display_cell(cell: &Cell) -> String {
    match cell.owner {
        Some(owner) if cell.value > 0 => format!("{}{}", cell.value, player_to_char(owner)),
        _ => ".".to_string(),
    }
}

pub fn render_board(board: &Board) -> String {
    let mut output = String::from("   ");
    for column in 0..board.columns() {
        output.push_str(&format!("{:>4}", column));
    }
    output.push('\n');

    for (position, cell) in board.cells() {
        if position.column == 0 {
            output.push_str(&format!("{:>3}", position.row));
        }
        output.push_str(&format!("{:>4}", display_cell(cell)));
        if position.column + 1 == board.columns() {
            output.push('\n');
        }
    }

    output
}

pub fn display_board(board: &Board) {
    print!("{}", render_board(board));
}
