use crate::core::score::{Centipawns, EngineScore};
use crate::input::protocol_interpreter::{CalculateOptions, EngineCommand, EngineMessage, InfoFrame};
use super::protocol_interpreter::ProtocolInterpreter;

// Interpreter for the Universal Chess Interface protocol, seen from the GUI side
pub struct UciInterpreter;

impl UciInterpreter {
    fn determine_best_move<'a>(mut args: impl Iterator<Item=&'a str>) -> Option<EngineMessage> {
        // a trailing `ponder <move>` is not used
        args.next().map(|x| EngineMessage::BestMove(x.to_string()))
    }

    fn determine_info<'a>(args: impl Iterator<Item=&'a str>) -> Option<EngineMessage> {
        let args = args.collect::<Vec<_>>();

        if args.first() == Some(&"string") {
            return None;
        }

        let mut depth = None;
        let mut score = None;
        let mut principal_variation = Vec::new();

        let mut index = 0;
        while index < args.len() {
            match args[index] {
                "depth" => {
                    depth = args.get(index + 1).and_then(|x| x.parse::<u32>().ok());
                    index += 2;
                },
                "score" => {
                    score = UciInterpreter::determine_score(args.get(index + 1).copied(), args.get(index + 2).copied());
                    index += 3;
                },
                "pv" => {
                    principal_variation = args[index + 1..].iter().map(|x| x.to_string()).collect();
                    break;
                },
                _ => index += 1,
            }
        }

        Some(EngineMessage::Info(InfoFrame {
            depth: depth?,
            score: score?,
            principal_variation,
        }))
    }

    fn determine_score(kind: Option<&str>, value: Option<&str>) -> Option<EngineScore> {
        let value = value?;

        match kind? {
            "cp" => value.parse::<i64>().ok().map(|x| EngineScore::Centipawns(Centipawns::new(x))),
            "mate" => value.parse::<i32>().ok().map(EngineScore::Mate),
            _ => None,
        }
    }
}

impl ProtocolInterpreter for UciInterpreter {
    fn line_to_message(line: &str) -> Option<EngineMessage> {
        let mut split = line.split_whitespace();

        let command_word = split.next()?;

        match command_word {
            "uciok" => Some(EngineMessage::IdentifyFinished),
            "readyok" => Some(EngineMessage::ReadyOk),
            "bestmove" => UciInterpreter::determine_best_move(split),
            "info" => UciInterpreter::determine_info(split),
            _ => None,  // `id`, `option`, `copyprotection`, banners...
        }
    }

    fn command_to_line(command: &EngineCommand) -> String {
        match command {
            EngineCommand::Identify => "uci".to_string(),
            EngineCommand::SetOption { name, value } => format!("setoption name {} value {}", name, value),
            EngineCommand::IsReady => "isready".to_string(),
            EngineCommand::NewGame => "ucinewgame".to_string(),
            EngineCommand::SetPosition(fen) => format!("position fen {}", fen),
            EngineCommand::Calculate(options) => format!("go {}", options),
            EngineCommand::Stop => "stop".to_string(),
            EngineCommand::Quit => "quit".to_string(),
        }
    }
}

#[test]
fn check_handshake_lines() {
    assert_eq!(UciInterpreter::line_to_message("uciok"), Some(EngineMessage::IdentifyFinished));
    assert_eq!(UciInterpreter::line_to_message("readyok\n"), Some(EngineMessage::ReadyOk));
    assert_eq!(UciInterpreter::line_to_message("id name Stockfish 16"), None);
    assert_eq!(UciInterpreter::line_to_message("option name Hash type spin default 16 min 1 max 33554432"), None);
    assert_eq!(UciInterpreter::line_to_message(""), None);
}

#[test]
fn check_best_move() {
    assert_eq!(UciInterpreter::line_to_message("bestmove e2e4"), Some(EngineMessage::BestMove("e2e4".to_string())));
    assert_eq!(UciInterpreter::line_to_message("bestmove e7e8q ponder d1d8"), Some(EngineMessage::BestMove("e7e8q".to_string())));
    assert_eq!(UciInterpreter::line_to_message("bestmove"), None);
}

#[test]
fn check_info_centipawns() {
    let line = "info depth 12 seldepth 18 multipv 1 score cp -35 nodes 123456 nps 1000000 time 120 pv e7e5 g1f3 b8c6";
    let expected = Some(EngineMessage::Info(InfoFrame {
        depth: 12,
        score: EngineScore::Centipawns(Centipawns::new(-35)),
        principal_variation: vec!["e7e5".to_string(), "g1f3".to_string(), "b8c6".to_string()],
    }));

    assert_eq!(UciInterpreter::line_to_message(line), expected);
}

#[test]
fn check_info_mate_and_bounds() {
    let line = "info depth 20 score mate -3 upperbound pv h7h8";
    let expected = Some(EngineMessage::Info(InfoFrame {
        depth: 20,
        score: EngineScore::Mate(-3),
        principal_variation: vec!["h7h8".to_string()],
    }));

    assert_eq!(UciInterpreter::line_to_message(line), expected);

    let line = "info depth 5 score cp 10 lowerbound nodes 20 pv d2d4";
    assert!(matches!(UciInterpreter::line_to_message(line), Some(EngineMessage::Info(InfoFrame { depth: 5, .. }))));
}

#[test]
fn check_unscored_info_ignored() {
    assert_eq!(UciInterpreter::line_to_message("info depth 10 currmove e2e4 currmovenumber 1"), None);
    assert_eq!(UciInterpreter::line_to_message("info string NNUE evaluation using nn-ad9b42354671.nnue enabled"), None);
    assert_eq!(UciInterpreter::line_to_message("info depth x score cp 10 pv e2e4"), None);
}

#[test]
fn check_outbound_commands() {
    assert_eq!(UciInterpreter::command_to_line(&EngineCommand::Identify), "uci");
    assert_eq!(UciInterpreter::command_to_line(&EngineCommand::IsReady), "isready");
    assert_eq!(
        UciInterpreter::command_to_line(&EngineCommand::SetPosition("8/8/8/8/8/8/8/K6k w - - 0 1".to_string())),
        "position fen 8/8/8/8/8/8/8/K6k w - - 0 1",
    );
    assert_eq!(UciInterpreter::command_to_line(&EngineCommand::Calculate(CalculateOptions::MoveTime(1500))), "go movetime 1500");
    assert_eq!(UciInterpreter::command_to_line(&EngineCommand::Calculate(CalculateOptions::Depth(15))), "go depth 15");
    assert_eq!(
        UciInterpreter::command_to_line(&EngineCommand::SetOption { name: "Hash".to_string(), value: "64".to_string() }),
        "setoption name Hash value 64",
    );
}
