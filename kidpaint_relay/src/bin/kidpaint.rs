// Headless KidPaint client.
//
// Joins a session (by UDP discovery, or directly with `--relay`) and reads
// drawing commands from stdin, one per line. Remote edits and chat are
// applied between commands; chat lines are printed as they arrive. Useful
// for scripting a participant and for poking at a relay by hand.
//
// Commands:
//   pen <col> <row>     paint one cell with the selected color
//   erase <col> <row>   clear one cell
//   fill <col> <row>    flood-fill with the selected color
//   color <c>           select a color: signed ARGB int, #RRGGBB or #AARRGGBB
//   undo | redo
//   say <text>          send a chat line
//   save <path>         export the local grid as JSON
//   load <path>         import a JSON grid and send the differences
//   show                print the grid ('.' empty, '#' painted)
//   help | quit

use std::io::{self, BufRead};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use clap::Parser;
use kidpaint_canvas::Grid;
use kidpaint_protocol::Color;
use kidpaint_relay::{CanvasUpdate, ClientConfig, ClientError, CollaborativeCanvas, logging};
use tracing::error;

/// How often remote traffic is applied while waiting for input.
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "kidpaint", version, about = "Headless KidPaint canvas client")]
struct Cli {
    /// JSON file with client settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Display name for discovery and chat
    #[arg(short, long)]
    name: Option<String>,

    /// Connect to this relay directly instead of discovering one
    #[arg(long)]
    relay: Option<SocketAddr>,

    /// Where to send discovery requests
    #[arg(long)]
    broadcast: Option<IpAddr>,

    /// UDP discovery port
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Per-attempt discovery timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig, kidpaint_relay::RelayError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(broadcast) = self.broadcast {
            config.discovery.broadcast_address = broadcast;
        }
        if let Some(port) = self.discovery_port {
            config.discovery.port = port;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.discovery.timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Pen(i32, i32),
    Erase(i32, i32),
    Fill(i32, i32),
    Color(Color),
    Undo,
    Redo,
    Say(String),
    Save(PathBuf),
    Load(PathBuf),
    Show,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "pen" => parse_cell(rest).map(|(c, r)| Command::Pen(c, r)),
        "erase" => parse_cell(rest).map(|(c, r)| Command::Erase(c, r)),
        "fill" => parse_cell(rest).map(|(c, r)| Command::Fill(c, r)),
        "color" => parse_color(rest).map(Command::Color),
        "undo" => Ok(Command::Undo),
        "redo" => Ok(Command::Redo),
        "say" if !rest.is_empty() => Ok(Command::Say(rest.to_string())),
        "save" if !rest.is_empty() => Ok(Command::Save(PathBuf::from(rest))),
        "load" if !rest.is_empty() => Ok(Command::Load(PathBuf::from(rest))),
        "show" => Ok(Command::Show),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "say" | "save" | "load" => Err(format!("{word} needs an argument")),
        other => Err(format!("unknown command {other:?} (try help)")),
    }
}

fn parse_cell(args: &str) -> Result<(i32, i32), String> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(column), Some(row), None) => {
            let column = column.parse().map_err(|_| format!("bad column {column:?}"))?;
            let row = row.parse().map_err(|_| format!("bad row {row:?}"))?;
            Ok((column, row))
        }
        _ => Err("expected <col> <row>".into()),
    }
}

/// Signed ARGB integer, `#RRGGBB` (opaque), or `#AARRGGBB`.
fn parse_color(arg: &str) -> Result<Color, String> {
    let bad = || format!("bad color {arg:?}");
    match arg.strip_prefix('#') {
        Some(hex) if hex.len() == 6 => u32::from_str_radix(hex, 16)
            .map(|rgb| Color::from_argb(0xFF00_0000 | rgb))
            .map_err(|_| bad()),
        Some(hex) if hex.len() == 8 => u32::from_str_radix(hex, 16)
            .map(Color::from_argb)
            .map_err(|_| bad()),
        Some(_) => Err(bad()),
        None => arg.parse::<i32>().map(Color).map_err(|_| bad()),
    }
}

fn render(grid: &Grid) -> String {
    let mut out = String::new();
    for row in 0..grid.height() as i32 {
        for column in 0..grid.width() as i32 {
            let painted = grid.get(column, row).is_some_and(|c| !c.is_empty());
            out.push(if painted { '#' } else { '.' });
        }
        out.push('\n');
    }
    out
}

/// Run one command. Returns false when the session should end.
fn execute(canvas: &mut CollaborativeCanvas, command: Command) -> Result<bool, ClientError> {
    match command {
        Command::Pen(column, row) => {
            let color = canvas.model().selected_color();
            report_cells(usize::from(canvas.set_cell_color(column, row, color)?.is_some()));
        }
        Command::Erase(column, row) => {
            let edit = canvas.set_cell_color(column, row, Color::EMPTY)?;
            report_cells(usize::from(edit.is_some()));
        }
        Command::Fill(column, row) => {
            let color = canvas.model().selected_color();
            report_cells(canvas.flood_fill(column, row, color)?.len());
        }
        Command::Color(color) => {
            canvas.select_color(color);
            println!("color {color}");
        }
        Command::Undo => {
            if !canvas.undo()? {
                println!("nothing to undo");
            }
        }
        Command::Redo => {
            if !canvas.redo()? {
                println!("nothing to redo");
            }
        }
        Command::Say(text) => {
            let chat = canvas.send_chat(&text)?;
            println!("{chat}");
        }
        Command::Save(path) => {
            canvas.export_grid(&path)?;
            println!("saved {}", path.display());
        }
        Command::Load(path) => {
            let edits = canvas.import_grid(&path)?;
            println!("loaded {} ({} cells changed)", path.display(), edits.len());
        }
        Command::Show => print!("{}", render(canvas.model().grid())),
        Command::Help => println!(
            "commands: pen|erase|fill <col> <row>, color <c>, undo, redo, say <text>, \
             save <path>, load <path>, show, quit"
        ),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn report_cells(count: usize) {
    if count == 0 {
        println!("no change");
    }
}

fn pump(canvas: &mut CollaborativeCanvas) -> Result<(), ClientError> {
    for update in canvas.pump()? {
        if let CanvasUpdate::Chat(chat) = update {
            println!("{chat}");
        }
    }
    Ok(())
}

fn run(mut canvas: CollaborativeCanvas) -> Result<(), ClientError> {
    println!("joined {} as {}", canvas.address(), canvas.name());

    // Blocking stdin reads happen on their own thread so remote traffic keeps
    // flowing while the user is idle.
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        pump(&mut canvas)?;
        let line = match rx.recv_timeout(PUMP_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => match execute(&mut canvas, command) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e @ ClientError::ConnectionLost(_)) => return Err(e),
                Err(e) => println!("error: {e}"),
            },
            Err(message) => println!("{message}"),
        }
    }
    canvas.leave();
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match cli.client_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let joined = match cli.relay {
        Some(addr) => CollaborativeCanvas::join(addr.into(), &config),
        None => CollaborativeCanvas::discover_and_join(&config),
    };
    let canvas = match joined {
        Ok(canvas) => canvas,
        Err(e) => {
            error!("could not join a session: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(canvas) {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cell_commands() {
        assert_eq!(parse_command("pen 3 4"), Ok(Command::Pen(3, 4)));
        assert_eq!(parse_command("  erase 0 49 "), Ok(Command::Erase(0, 49)));
        assert_eq!(parse_command("fill -1 2"), Ok(Command::Fill(-1, 2)));
        assert!(parse_command("pen 3").is_err());
        assert!(parse_command("pen 3 4 5").is_err());
        assert!(parse_command("fill a b").is_err());
    }

    #[test]
    fn parses_colors() {
        assert_eq!(parse_color("-543230"), Ok(Color(-543_230)));
        assert_eq!(parse_color("#FF0000"), Ok(Color::from_argb(0xFFFF_0000)));
        assert_eq!(parse_color("#80FF0000"), Ok(Color::from_argb(0x80FF_0000)));
        assert!(parse_color("#FFF").is_err());
        assert!(parse_color("red").is_err());
    }

    #[test]
    fn parses_text_commands() {
        assert_eq!(
            parse_command("say hello there"),
            Ok(Command::Say("hello there".into()))
        );
        assert_eq!(
            parse_command("save out/pic.json"),
            Ok(Command::Save(PathBuf::from("out/pic.json")))
        );
        assert!(parse_command("say").is_err());
        assert!(parse_command("load").is_err());
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
        assert!(parse_command("paint 1 2").is_err());
    }

    #[test]
    fn renders_painted_cells() {
        let mut grid = Grid::new(3, 2);
        grid.set(1, 0, Color(5));
        grid.set(2, 1, Color(-1));
        assert_eq!(render(&grid), ".#.\n..#\n");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
