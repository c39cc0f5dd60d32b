use crate::{
    board::{Cell, Player, Position, CRITICAL_MASS},
    cli_rendering::player_to_char,
    engine::{SearchConfig, SearchEngine},
    game::GameState,
    presenter::CascadeTrace,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color as RatatuiColor, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Playing,
    GameOver { winner: Player },
}

pub struct App {
    initial: GameState,
    state: GameState,
    engine: SearchEngine,
    config: SearchConfig,
    human: Player,
    rng: StdRng,
    cursor_position: Position,
    mode: Mode,
    last_move: Option<(Player, Position)>,
    last_explosions: usize,
}

impl App {
    pub fn new(state: GameState, config: SearchConfig, human: Player) -> Self {
        Self::with_rng(state, config, human, StdRng::from_entropy())
    }

    pub fn with_rng(state: GameState, config: SearchConfig, human: Player, rng: StdRng) -> Self {
        let mut app = App {
            initial: state.clone(),
            state,
            engine: SearchEngine::new(config.weights),
            config,
            human,
            rng,
            cursor_position: Position::new(0, 0),
            mode: Mode::Playing,
            last_move: None,
            last_explosions: 0,
        };
        app.bot_turns();
        app
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor_position(&self) -> Position {
        self.cursor_position
    }

    pub fn move_cursor(&mut self, d_row: isize, d_column: isize) {
        if matches!(self.mode, Mode::GameOver { .. }) {
            return;
        }

        let board = self.state.board();
        if let Some(new_pos) = self
            .cursor_position
            .get_new(d_row, d_column, board.rows(), board.columns())
        {
            self.cursor_position = new_pos;
        }
    }

    /// Plays the cursor cell for the human, then lets the bot answer.
    pub fn handle_enter(&mut self) {
        if self.mode != Mode::Playing || self.state.current_player() != self.human {
            return;
        }
        if self.play(self.cursor_position) {
            self.bot_turns();
        }
    }

    /// Restarts from the position the app was created with.
    pub fn new_game(&mut self) {
        self.state = self.initial.clone();
        self.mode = Mode::Playing;
        self.last_move = None;
        self.last_explosions = 0;
        self.engine.reset_statistics();
        self.bot_turns();
    }

    fn play(&mut self, position: Position) -> bool {
        let player = self.state.current_player();
        let mut trace = CascadeTrace::new();
        if !self
            .state
            .apply_move_observed(position, |pending| trace.record(pending))
        {
            return false;
        }

        self.last_move = Some((player, position));
        self.last_explosions = trace.explosions();
        if let Some(winner) = self.state.winner() {
            self.mode = Mode::GameOver { winner };
        }
        true
    }

    fn bot_turns(&mut self) {
        while self.mode == Mode::Playing && self.state.current_player() != self.human {
            let chosen = self
                .engine
                .best_move(&self.state, self.config.depth, self.config.selection, &mut self.rng)
                .and_then(|best| best.mv);
            match chosen {
                Some(position) if self.play(position) => {}
                _ => break,
            }
        }
    }

    fn cell_display(&self, cell: &Cell) -> String {
        match cell.owner {
            Some(owner) => format!("{}{} ", cell.value, player_to_char(owner)),
            None => "   ".to_string(),
        }
    }
}

pub fn run_tui(
    state: GameState,
    config: SearchConfig,
    human: Player,
) -> Result<GameState, Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(state, config, human);

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(app.state)
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('n') => app.new_game(),
                    KeyCode::Enter | KeyCode::Char(' ') => app.handle_enter(),
                    KeyCode::Up => app.move_cursor(-1, 0),
                    KeyCode::Down => app.move_cursor(1, 0),
                    KeyCode::Left => app.move_cursor(0, -1),
                    KeyCode::Right => app.move_cursor(0, 1),
                    _ => {}
                }
            }
        }
    }
}

fn player_color(player: Player) -> RatatuiColor {
    match player {
        Player::One => RatatuiColor::White,
        Player::Two => RatatuiColor::Red,
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(8),    // Board
            Constraint::Length(4), // Instructions
        ])
        .split(f.area());

    let title = match app.mode {
        Mode::Playing => format!(
            "Turn {} - {} ({}) to move",
            app.state.turn(),
            app.state.current_player(),
            player_to_char(app.state.current_player())
        ),
        Mode::GameOver { winner } if winner == app.human => "GAME OVER - YOU WIN!".to_string(),
        Mode::GameOver { winner } => format!("GAME OVER - {} WINS", winner),
    };

    let title_paragraph = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL).title("Chain Reaction"))
        .alignment(Alignment::Center);
    f.render_widget(title_paragraph, chunks[0]);

    render_board(f, app, chunks[1]);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let instructions = vec![
        Line::from(vec![
            Span::raw("Use "),
            Span::styled("Arrow Keys", bold),
            Span::raw(" to move cursor, "),
            Span::styled("Enter", bold),
            Span::raw(" to add a dot"),
        ]),
        Line::from(vec![
            Span::styled("N", bold),
            Span::raw(" for a new game, "),
            Span::styled("Q", bold),
            Span::raw(" to quit"),
        ]),
    ];

    let instructions_paragraph = Paragraph::new(instructions)
        .block(Block::default().borders(Borders::ALL).title("Controls"))
        .alignment(Alignment::Center);
    f.render_widget(instructions_paragraph, chunks[2]);
}

fn border_line(columns: usize, left: &str, middle: &str, right: &str) -> String {
    let segments = vec!["━━━"; columns].join(middle);
    format!("    {}{}{}", left, segments, right)
}

fn render_board(f: &mut Frame, app: &App, area: Rect) {
    let board = app.state.board();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let block = Block::default().borders(Borders::ALL).title("Board");
    let board_area = block.inner(area);
    f.render_widget(block, area);

    let mut board_lines = Vec::new();

    let header: String = (0..board.columns()).map(|column| format!("{:^4}", column)).collect();
    board_lines.push(Line::from(Span::styled(format!("    {}", header), bold)));
    board_lines.push(Line::from(border_line(board.columns(), "┏", "┳", "┓")));

    for row in 0..board.rows() {
        if row > 0 {
            board_lines.push(Line::from(border_line(board.columns(), "┣", "╋", "┫")));
        }

        let mut row_spans = vec![Span::styled(format!("{:>3} ", row), bold), Span::raw("┃")];

        for column in 0..board.columns() {
            let position = Position::new(row, column);
            let mut cell_content = "   ".to_string();
            let mut cell_style = Style::default();

            if let Some(cell) = board.get(&position) {
                cell_content = app.cell_display(cell);
                if let Some(owner) = cell.owner {
                    cell_style = cell_style.fg(player_color(owner));
                    if cell.value + 1 >= CRITICAL_MASS {
                        cell_style = cell_style.add_modifier(Modifier::BOLD);
                    }
                }
            }

            if app.mode == Mode::Playing && position == app.cursor_position {
                cell_style = if app.state.is_valid_move(&position) {
                    cell_style.bg(RatatuiColor::Blue)
                } else {
                    cell_style.bg(RatatuiColor::DarkGray)
                };
            } else if app.last_move.is_some_and(|(_, last)| last == position) {
                cell_style = cell_style.add_modifier(Modifier::UNDERLINED);
            }

            row_spans.push(Span::styled(cell_content, cell_style));
            row_spans.push(Span::raw("┃"));
        }

        board_lines.push(Line::from(row_spans));
    }

    board_lines.push(Line::from(border_line(board.columns(), "┗", "┻", "┛")));

    let status_message = match app.last_move {
        Some((player, position)) if app.last_explosions > 0 => format!(
            "{} played {}: chain reaction of {} explosions",
            player, position, app.last_explosions
        ),
        Some((player, position)) => format!("{} played {}", player, position),
        None => "Pick an empty cell to place your first three dots".to_string(),
    };
    board_lines.push(Line::from(Span::styled(status_message, bold)));

    let board_paragraph = Paragraph::new(board_lines).alignment(Alignment::Left);

    f.render_widget(board_paragraph, board_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SelectionPolicy;

    fn config() -> SearchConfig {
        SearchConfig {
            depth: 1,
            selection: SelectionPolicy::First,
            ..SearchConfig::default()
        }
    }

    fn app(human: Player) -> App {
        let state = GameState::new(3, 3).unwrap();
        App::with_rng(state, config(), human, StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_cursor_stays_on_board() {
        let mut app = app(Player::One);
        app.move_cursor(-1, 0);
        app.move_cursor(0, -1);
        assert_eq!(app.cursor_position(), Position::new(0, 0));

        for _ in 0..5 {
            app.move_cursor(1, 0);
            app.move_cursor(0, 1);
        }
        assert_eq!(app.cursor_position(), Position::new(2, 2));
    }

    #[test]
    fn test_enter_plays_and_bot_answers() {
        let mut app = app(Player::One);
        app.move_cursor(1, 0);
        app.handle_enter();

        assert_eq!(app.state().turn(), 2);
        assert_eq!(app.state().current_player(), Player::One);
        let played = app.state().board().get(&Position::new(1, 0)).copied();
        assert_eq!(played, Some(Cell::new(3, Player::One)));
        assert_eq!(app.state().board().count_owned(Player::Two), 1);
    }

    #[test]
    fn test_illegal_enter_is_ignored() {
        let mut app = app(Player::One);
        app.handle_enter();
        let turn = app.state().turn();

        // After the opening the human may only play their own cells.
        let bot_cell = app
            .state()
            .board()
            .cells()
            .find(|(_, cell)| cell.is_owned_by(Player::Two))
            .map(|(position, _)| position)
            .unwrap();
        while app.cursor_position().row < bot_cell.row {
            app.move_cursor(1, 0);
        }
        while app.cursor_position().column < bot_cell.column {
            app.move_cursor(0, 1);
        }
        app.handle_enter();
        assert_eq!(app.state().turn(), turn);
    }

    #[test]
    fn test_bot_opens_when_human_plays_second() {
        let app = app(Player::Two);
        assert_eq!(app.state().turn(), 1);
        assert_eq!(app.state().current_player(), Player::Two);
    }

    #[test]
    fn test_new_game_resets() {
        let mut app = app(Player::One);
        app.handle_enter();
        app.new_game();
        assert_eq!(app.state(), &GameState::new(3, 3).unwrap());
        assert_eq!(app.mode(), Mode::Playing);
    }

    #[test]
    fn test_game_over_freezes_input() {
        let board = crate::board::Board::from_cells(
            1,
            3,
            vec![Cell::new(3, Player::One), Cell::new(3, Player::Two), Cell::EMPTY],
        )
        .unwrap();
        let state = GameState::from_parts(board, Player::One, 2);
        let mut app = App::with_rng(state, config(), Player::One, StdRng::seed_from_u64(3));

        app.handle_enter();
        assert_eq!(app.mode(), Mode::GameOver { winner: Player::One });
        assert_eq!(app.last_explosions, 1);

        app.move_cursor(0, 1);
        assert_eq!(app.cursor_position(), Position::new(0, 0));
        app.handle_enter();
        assert_eq!(app.state().turn(), 3);
    }
}
