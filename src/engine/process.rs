use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};
use crate::engine::{degraded_evaluation, EngineConfig, EngineError, EngineState, DEFAULT_OPENING_MOVE};
use crate::engine::pending::{PendingKind, PendingRequest, PendingTable, RequestId};
use crate::input::protocol_interpreter::{EngineCommand, EngineMessage, ProtocolInterpreter};
use crate::input::uci_interpreter::UciInterpreter;

/// What the client asks of the worker task.
#[derive(Debug)]
pub enum WorkerMessage {
    Request(PendingRequest),
    Cancel(RequestId),
    NewGame,
    Quit,
}

/// Starts the engine process together with the tasks that drive it.
pub fn spawn_engine(
    config: &EngineConfig,
) -> io::Result<(mpsc::UnboundedSender<WorkerMessage>, watch::Receiver<EngineState>)> {
    let mut child = Command::new(&config.path)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child.stdin.take().ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin not captured"))?;
    let stdout = child.stdout.take().ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdout not captured"))?;

    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(EngineState::Starting);

    tokio::spawn(listen_to_engine(stdout, message_tx));

    let worker = EngineWorker {
        child,
        stdin,
        messages: message_rx,
        requests: request_rx,
        state: state_tx,
        table: PendingTable::default(),
        new_game_pending: false,
        quit_requested: false,
    };
    tokio::spawn(worker.run(config.handshake_timeout, config.options.clone()));

    Ok((request_tx, state_rx))
}

/// Forwards every line the engine prints that the client can act on.
async fn listen_to_engine(stdout: ChildStdout, message_tx: mpsc::UnboundedSender<EngineMessage>) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                trace!(%line, "engine >");

                if let Some(message) = UciInterpreter::line_to_message(&line) {
                    if message_tx.send(message).is_err() {
                        break;
                    }
                }
            },
            Ok(None) => break,
            Err(error) => {
                warn!(%error, "failed to read engine output");
                break;
            },
        }
    }
}

struct EngineWorker {
    child: Child,
    stdin: ChildStdin,
    messages: mpsc::UnboundedReceiver<EngineMessage>,
    requests: mpsc::UnboundedReceiver<WorkerMessage>,
    state: watch::Sender<EngineState>,
    table: PendingTable,
    new_game_pending: bool,
    // the client asked to quit before the handshake was over
    quit_requested: bool,
}

impl EngineWorker {
    async fn run(mut self, handshake_timeout: Duration, options: Vec<(String, String)>) {
        let handshake = tokio::time::timeout(handshake_timeout, self.handshake(&options)).await;

        match handshake {
            Ok(Ok(())) => {
                info!("engine handshake finished");
                self.state.send_replace(EngineState::Ready);
            },
            Ok(Err(_)) if self.quit_requested => {
                let _ = self.write(&EngineCommand::Quit).await;
                return self.shut_down(EngineError::Dead).await;
            },
            Ok(Err(error)) => return self.degrade(error).await,
            Err(_) => return self.degrade(EngineError::Unresponsive(handshake_timeout)).await,
        }

        loop {
            if let Err(error) = self.dispatch().await {
                return self.shut_down(error).await;
            }

            tokio::select! {
                message = self.requests.recv() => match message {
                    Some(WorkerMessage::Request(request)) => self.table.enqueue(request),
                    Some(WorkerMessage::Cancel(id)) => {
                        if self.table.cancel(id) {
                            debug!(id = id.0, "stopping abandoned search");
                            if let Err(error) = self.write(&EngineCommand::Stop).await {
                                return self.shut_down(error).await;
                            }
                        }
                    },
                    Some(WorkerMessage::NewGame) => self.new_game_pending = true,
                    Some(WorkerMessage::Quit) | None => {
                        let _ = self.write(&EngineCommand::Quit).await;
                        return self.shut_down(EngineError::Dead).await;
                    },
                },
                message = self.messages.recv() => match message {
                    Some(EngineMessage::Info(frame)) => self.table.on_info(frame),
                    Some(EngineMessage::BestMove(best_move)) => {
                        if let Some(id) = self.table.on_best_move(best_move) {
                            debug!(id = id.0, "search finished");
                        }
                    },
                    Some(_) => (),
                    None => {
                        warn!("engine process closed its output");
                        return self.shut_down(EngineError::Dead).await;
                    },
                },
            }

            self.publish_state();
        }
    }

    async fn handshake(&mut self, options: &[(String, String)]) -> Result<(), EngineError> {
        self.write(&EngineCommand::Identify).await?;
        self.wait_for(EngineMessage::IdentifyFinished).await?;

        for (name, value) in options {
            self.write(&EngineCommand::SetOption { name: name.clone(), value: value.clone() }).await?;
        }

        self.write(&EngineCommand::IsReady).await?;
        self.wait_for(EngineMessage::ReadyOk).await
    }

    /// Waits for one engine message. Requests arriving meanwhile are queued,
    /// a quit ends the wait.
    async fn wait_for(&mut self, expected: EngineMessage) -> Result<(), EngineError> {
        loop {
            tokio::select! {
                message = self.messages.recv() => match message {
                    Some(message) if message == expected => return Ok(()),
                    Some(_) => (),
                    None => return Err(EngineError::Dead),
                },
                message = self.requests.recv(), if !self.quit_requested => match message {
                    Some(WorkerMessage::Request(request)) => self.table.enqueue(request),
                    Some(WorkerMessage::Cancel(id)) => {
                        self.table.cancel(id);
                    },
                    Some(WorkerMessage::NewGame) => self.new_game_pending = true,
                    Some(WorkerMessage::Quit) | None => {
                        self.quit_requested = true;
                        return Err(EngineError::Dead);
                    },
                },
            }
        }
    }

    /// Sends the next queued search, if the engine is idle.
    async fn dispatch(&mut self) -> Result<(), EngineError> {
        if self.table.is_busy() {
            return Ok(());
        }

        if self.new_game_pending {
            self.new_game_pending = false;
            self.write(&EngineCommand::NewGame).await?;
        }

        if let Some((id, fen, options)) = self.table.dispatch_next() {
            debug!(id = id.0, %fen, %options, "search sent");
            self.write(&EngineCommand::SetPosition(fen)).await?;
            self.write(&EngineCommand::Calculate(options)).await?;
            self.publish_state();
        }

        Ok(())
    }

    fn publish_state(&self) {
        let state = match self.table.is_busy() {
            true => EngineState::Busy,
            false => EngineState::Ready,
        };

        self.state.send_if_modified(|current| {
            let modified = *current != state;
            *current = state;
            modified
        });
    }

    async fn write(&mut self, command: &EngineCommand) -> Result<(), EngineError> {
        let line = UciInterpreter::command_to_line(command);
        trace!(%line, "engine <");

        let result = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.write_all(b"\n").await?;
            self.stdin.flush().await
        }.await;

        result.map_err(|error| {
            warn!(%error, "failed to write to engine");
            EngineError::Dead
        })
    }

    async fn shut_down(mut self, error: EngineError) {
        let _ = self.child.kill().await;
        self.table.fail_all(error);
        self.state.send_replace(EngineState::Dead);
        info!("engine process stopped");

        // anything still queued in the channel is answered by dropping it
    }

    /// The handshake failed: drop the process and answer with fixed results from now on.
    async fn degrade(mut self, error: EngineError) {
        warn!(%error, "engine handshake failed, running degraded");
        let _ = self.child.kill().await;
        self.state.send_replace(EngineState::Degraded);

        // requests that came in during the handshake
        for request in self.table.take_queued() {
            answer_degraded(request);
        }

        while let Some(message) = self.requests.recv().await {
            match message {
                WorkerMessage::Request(request) => answer_degraded(request),
                WorkerMessage::Quit => break,
                _ => (),
            }
        }
    }
}

fn answer_degraded(request: PendingRequest) {
    match request.kind {
        PendingKind::BestMove(reply) => {
            let _ = reply.send(Ok(DEFAULT_OPENING_MOVE.to_string()));
        },
        PendingKind::Evaluation { reply, .. } => {
            let _ = reply.send(Ok(degraded_evaluation()));
        },
    }
}
