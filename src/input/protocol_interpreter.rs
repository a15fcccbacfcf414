use std::fmt::{Display, Formatter};
use crate::core::score::EngineScore;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CalculateOptions {
    MoveTime(u64),  // Time to calculate, in ms
    Depth(u32),
}

/// Commands sent to the engine process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineCommand {
    Identify,  // `uci`
    SetOption {
        name: String,
        value: String,
    },
    IsReady,
    NewGame,
    SetPosition(String),  // a FEN
    Calculate(CalculateOptions),  // `go` in UCI
    Stop,
    Quit,
}

/// One `info` line carrying a scored search result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InfoFrame {
    pub depth: u32,
    pub score: EngineScore,
    pub principal_variation: Vec<String>,
}

/// Lines received from the engine process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineMessage {
    IdentifyFinished,  // `uciok`
    ReadyOk,
    BestMove(String),
    Info(InfoFrame),
}

pub trait ProtocolInterpreter {
    /// `None` for lines that carry nothing the client acts on.
    fn line_to_message(line: &str) -> Option<EngineMessage>;

    fn command_to_line(command: &EngineCommand) -> String;
}

impl Display for CalculateOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CalculateOptions::MoveTime(ms) => write!(f, "movetime {}", ms),
            CalculateOptions::Depth(depth) => write!(f, "depth {}", depth),
        }
    }
}
