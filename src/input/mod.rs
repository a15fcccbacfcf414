pub mod protocol_interpreter;
pub mod uci_interpreter;
pub mod command_line;
