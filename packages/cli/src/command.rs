//! Parser for the line commands accepted by `watch`.
//!
//! ```text
//! move S W N E     pan the viewport
//! zoom S W N E     finish a zoom on the given viewport
//! search LAT LNG   jump to a location
//! click N          click marker handle N
//! quit
//! ```

use wildfire_map_fire_models::Coordinates;
use wildfire_map_sync::{MapSignal, MarkerHandle, ViewRect};

/// Help text printed when a session starts.
pub const HELP: &str = "\
Commands:
  move S W N E     pan the viewport to the given edges
  zoom S W N E     end a zoom on the given edges
  search LAT LNG   fetch around a location immediately
  click N          show details for marker N
  quit             end the session";

/// One parsed session command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchCommand {
    Move(ViewRect),
    Zoom(ViewRect),
    Search(Coordinates),
    Click(MarkerHandle),
    Quit,
}

/// Errors from parsing a session command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try move, zoom, search, click, quit)")]
    Unknown(String),

    #[error("'{command}' takes {expected} argument(s), got {found}")]
    Arity {
        command: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("'{0}' is not a number")]
    Number(String),
}

impl WatchCommand {
    /// The map signal this command stands for. `quit` has none.
    pub const fn into_signal<S>(self) -> Option<MapSignal<S>> {
        match self {
            Self::Move(rect) => Some(MapSignal::Moved(rect)),
            Self::Zoom(rect) => Some(MapSignal::ZoomEnded(rect)),
            Self::Search(center) => Some(MapSignal::Search(center)),
            Self::Click(handle) => Some(MapSignal::MarkerClicked(handle)),
            Self::Quit => None,
        }
    }
}

/// Parses one input line.
///
/// # Errors
///
/// Returns [`ParseCommandError`] for unknown commands, wrong argument
/// counts, or non-numeric arguments.
pub fn parse_command(line: &str) -> Result<WatchCommand, ParseCommandError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(ParseCommandError::Empty)?;
    let args: Vec<&str> = words.collect();

    match name.to_ascii_lowercase().as_str() {
        "move" => Ok(WatchCommand::Move(rect("move", &args)?)),
        "zoom" => Ok(WatchCommand::Zoom(rect("zoom", &args)?)),
        "search" => {
            let [lat, lng] = numbers::<2>("search", &args)?;
            Ok(WatchCommand::Search(Coordinates::new(lat, lng)))
        }
        "click" => {
            expect_arity("click", &args, 1)?;
            let handle = args[0]
                .parse()
                .map_err(|_| ParseCommandError::Number(args[0].to_string()))?;
            Ok(WatchCommand::Click(MarkerHandle(handle)))
        }
        "quit" | "exit" => {
            expect_arity("quit", &args, 0)?;
            Ok(WatchCommand::Quit)
        }
        other => Err(ParseCommandError::Unknown(other.to_string())),
    }
}

fn rect(command: &'static str, args: &[&str]) -> Result<ViewRect, ParseCommandError> {
    let [south, west, north, east] = numbers::<4>(command, args)?;
    Ok(ViewRect::new(south, west, north, east))
}

fn numbers<const N: usize>(
    command: &'static str,
    args: &[&str],
) -> Result<[f64; N], ParseCommandError> {
    expect_arity(command, args, N)?;
    let mut values = [0.0; N];
    for (value, arg) in values.iter_mut().zip(args) {
        *value = arg
            .parse()
            .map_err(|_| ParseCommandError::Number((*arg).to_string()))?;
    }
    Ok(values)
}

const fn expect_arity(
    command: &'static str,
    args: &[&str],
    expected: usize,
) -> Result<(), ParseCommandError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ParseCommandError::Arity {
            command,
            expected,
            found: args.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_viewport_commands() {
        assert_eq!(
            parse_command("move 36 -123 38 -121"),
            Ok(WatchCommand::Move(ViewRect::new(36.0, -123.0, 38.0, -121.0)))
        );
        assert_eq!(
            parse_command("  ZOOM 1.5 2 3 4.25 "),
            Ok(WatchCommand::Zoom(ViewRect::new(1.5, 2.0, 3.0, 4.25)))
        );
    }

    #[test]
    fn parses_search_click_and_quit() {
        assert_eq!(
            parse_command("search 37.77 -122.41"),
            Ok(WatchCommand::Search(Coordinates::new(37.77, -122.41)))
        );
        assert_eq!(
            parse_command("click 7"),
            Ok(WatchCommand::Click(MarkerHandle(7)))
        );
        assert_eq!(parse_command("quit"), Ok(WatchCommand::Quit));
        assert_eq!(parse_command("exit"), Ok(WatchCommand::Quit));
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(parse_command("   "), Err(ParseCommandError::Empty));
        assert_eq!(
            parse_command("pan 1 2 3 4"),
            Err(ParseCommandError::Unknown("pan".to_string()))
        );
        assert_eq!(
            parse_command("search 1"),
            Err(ParseCommandError::Arity {
                command: "search",
                expected: 2,
                found: 1,
            })
        );
        assert_eq!(
            parse_command("move 1 2 north 4"),
            Err(ParseCommandError::Number("north".to_string()))
        );
        assert_eq!(
            parse_command("click -1"),
            Err(ParseCommandError::Number("-1".to_string()))
        );
    }

    #[test]
    fn quit_has_no_signal() {
        assert!(WatchCommand::Quit.into_signal::<()>().is_none());
        assert!(matches!(
            WatchCommand::Click(MarkerHandle(3)).into_signal::<()>(),
            Some(MapSignal::MarkerClicked(MarkerHandle(3)))
        ));
    }
}
