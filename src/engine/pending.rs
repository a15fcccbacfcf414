use std::collections::VecDeque;
use tokio::sync::oneshot;
use crate::core::evaluation::EngineEvaluation;
use crate::engine::EngineError;
use crate::input::protocol_interpreter::{CalculateOptions, InfoFrame};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequestId(pub u64);

pub type BestMoveReply = oneshot::Sender<Result<String, EngineError>>;
pub type EvaluationReply = oneshot::Sender<Result<EngineEvaluation, EngineError>>;

/// Where the answer to a request goes, and what counts as an answer.
#[derive(Debug)]
pub enum PendingKind {
    BestMove(BestMoveReply),
    Evaluation {
        depth_floor: u32,
        reply: EvaluationReply,
    },
}

#[derive(Debug)]
pub struct PendingRequest {
    pub id: RequestId,
    pub fen: String,
    pub options: CalculateOptions,
    pub kind: PendingKind,
}

/// The search the engine is currently running.
///
/// `kind` is taken once the request is answered; the search stays outstanding
/// until the engine's `bestmove` closes it.
#[derive(Debug)]
struct Outstanding {
    id: RequestId,
    kind: Option<PendingKind>,
    deepest: Option<u32>,
}

/// Correlates engine output with the request that caused it.
///
/// Only one search runs at a time: `info` and `bestmove` lines always belong to
/// the outstanding search, later requests wait in the queue.
#[derive(Debug, Default)]
pub struct PendingTable {
    outstanding: Option<Outstanding>,
    queue: VecDeque<PendingRequest>,
}

impl PendingTable {
    pub fn enqueue(&mut self, request: PendingRequest) {
        self.queue.push_back(request);
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn outstanding_id(&self) -> Option<RequestId> {
        self.outstanding.as_ref().map(|x| x.id)
    }

    /// Pops the next request to send, if the engine is idle.
    ///
    /// Requests whose caller already gave up are dropped here.
    pub fn dispatch_next(&mut self) -> Option<(RequestId, String, CalculateOptions)> {
        if self.outstanding.is_some() {
            return None;
        }

        while let Some(request) = self.queue.pop_front() {
            if request.kind.is_closed() {
                continue;
            }

            self.outstanding = Some(Outstanding {
                id: request.id,
                kind: Some(request.kind),
                deepest: None,
            });

            return Some((request.id, request.fen, request.options));
        }

        None
    }

    pub fn on_info(&mut self, frame: InfoFrame) {
        let Some(outstanding) = self.outstanding.as_mut() else {
            return;
        };

        outstanding.deepest = outstanding.deepest.max(Some(frame.depth));

        let floor = match &outstanding.kind {
            Some(PendingKind::Evaluation { depth_floor, .. }) => *depth_floor,
            _ => return,
        };

        if frame.depth < floor {
            return;
        }

        if let Some(PendingKind::Evaluation { reply, .. }) = outstanding.kind.take() {
            let evaluation = EngineEvaluation::from_frame(frame.depth, frame.score, frame.principal_variation);
            let _ = reply.send(Ok(evaluation));
        }
    }

    /// Closes the outstanding search. Returns its id, if there was one.
    pub fn on_best_move(&mut self, best_move: String) -> Option<RequestId> {
        let outstanding = self.outstanding.take()?;

        match outstanding.kind {
            Some(PendingKind::BestMove(reply)) => {
                let _ = reply.send(Ok(best_move));
            },
            Some(PendingKind::Evaluation { reply, .. }) => {
                let _ = reply.send(Err(EngineError::InsufficientDepth { reached: outstanding.deepest }));
            },
            None => (),
        }

        Some(outstanding.id)
    }

    /// Forgets request `id`. Returns true if the engine is searching for it
    /// and should be told to stop.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        self.queue.retain(|x| x.id != id);

        match self.outstanding.as_mut() {
            Some(outstanding) if outstanding.id == id => {
                outstanding.kind = None;
                true
            },
            _ => false,
        }
    }

    /// Hands back every request not sent to the engine yet.
    pub fn take_queued(&mut self) -> Vec<PendingRequest> {
        self.queue.drain(..).collect()
    }

    pub fn fail_all(&mut self, error: EngineError) {
        if let Some(outstanding) = self.outstanding.take() {
            if let Some(kind) = outstanding.kind {
                kind.fail(error.clone());
            }
        }

        for request in self.queue.drain(..) {
            request.kind.fail(error.clone());
        }
    }
}

impl PendingKind {
    fn is_closed(&self) -> bool {
        match self {
            PendingKind::BestMove(reply) => reply.is_closed(),
            PendingKind::Evaluation { reply, .. } => reply.is_closed(),
        }
    }

    pub fn fail(self, error: EngineError) {
        match self {
            PendingKind::BestMove(reply) => {
                let _ = reply.send(Err(error));
            },
            PendingKind::Evaluation { reply, .. } => {
                let _ = reply.send(Err(error));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::score::{Centipawns, EngineScore};
    use super::*;

    fn frame(depth: u32, cp: i64, pv: &[&str]) -> InfoFrame {
        InfoFrame {
            depth,
            score: EngineScore::Centipawns(Centipawns::new(cp)),
            principal_variation: pv.iter().map(|x| x.to_string()).collect(),
        }
    }

    fn evaluation_request(id: u64) -> (PendingRequest, oneshot::Receiver<Result<EngineEvaluation, EngineError>>) {
        let (reply, rx) = oneshot::channel();
        let request = PendingRequest {
            id: RequestId(id),
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string(),
            options: CalculateOptions::Depth(15),
            kind: PendingKind::Evaluation { depth_floor: 10, reply },
        };

        (request, rx)
    }

    fn best_move_request(id: u64) -> (PendingRequest, oneshot::Receiver<Result<String, EngineError>>) {
        let (reply, rx) = oneshot::channel();
        let request = PendingRequest {
            id: RequestId(id),
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string(),
            options: CalculateOptions::MoveTime(500),
            kind: PendingKind::BestMove(reply),
        };

        (request, rx)
    }

    #[test]
    fn check_shallow_frames_are_discarded() {
        let mut table = PendingTable::default();
        let (request, mut rx) = evaluation_request(1);
        table.enqueue(request);
        assert_eq!(table.dispatch_next().map(|x| x.0), Some(RequestId(1)));

        table.on_info(frame(1, 5, &["a2a3"]));
        table.on_info(frame(9, 7, &["b2b3"]));
        assert!(rx.try_recv().is_err());

        table.on_info(frame(10, 20, &["e2e4", "e7e5"]));
        table.on_info(frame(11, 25, &["d2d4"]));

        let evaluation = rx.try_recv().unwrap().unwrap();
        assert_eq!(evaluation.depth, 10);
        assert_eq!(evaluation.score, 0.2);
        assert_eq!(evaluation.best_move, "e2e4");

        // still searching until the engine reports its best move
        assert!(table.is_busy());
        assert_eq!(table.on_best_move("d2d4".to_string()), Some(RequestId(1)));
        assert!(!table.is_busy());
    }

    #[test]
    fn check_trailing_best_move_not_misrouted() {
        let mut table = PendingTable::default();
        let (evaluation, _evaluation_rx) = evaluation_request(1);
        let (best_move, mut best_move_rx) = best_move_request(2);
        table.enqueue(evaluation);
        table.enqueue(best_move);

        table.dispatch_next();
        table.on_info(frame(12, 0, &["e2e4"]));

        // the best move request has to wait for the evaluation search to end
        assert!(table.dispatch_next().is_none());
        table.on_best_move("e2e4".to_string());
        assert!(best_move_rx.try_recv().is_err());

        assert_eq!(table.dispatch_next().map(|x| x.0), Some(RequestId(2)));
        table.on_best_move("g1f3".to_string());
        assert_eq!(best_move_rx.try_recv().unwrap().unwrap(), "g1f3");
    }

    #[test]
    fn check_search_without_deep_frame() {
        let mut table = PendingTable::default();
        let (request, mut rx) = evaluation_request(1);
        table.enqueue(request);
        table.dispatch_next();

        table.on_info(frame(6, 0, &["e2e4"]));
        table.on_best_move("e2e4".to_string());

        assert_eq!(rx.try_recv().unwrap(), Err(EngineError::InsufficientDepth { reached: Some(6) }));
    }

    #[test]
    fn check_cancel() {
        let mut table = PendingTable::default();
        let (first, _first_rx) = best_move_request(1);
        let (second, _second_rx) = best_move_request(2);
        table.enqueue(first);
        table.enqueue(second);
        table.dispatch_next();
        assert_eq!(table.outstanding_id(), Some(RequestId(1)));

        assert!(!table.cancel(RequestId(2)));
        assert_eq!(table.queued(), 0);
        assert!(table.cancel(RequestId(1)));
        assert!(table.is_busy());

        // the answer to a cancelled search only frees the engine
        assert_eq!(table.on_best_move("a2a3".to_string()), Some(RequestId(1)));
        assert!(table.dispatch_next().is_none());
        assert_eq!(table.outstanding_id(), None);
    }

    #[test]
    fn check_take_queued() {
        let mut table = PendingTable::default();
        let (first, _first_rx) = best_move_request(1);
        let (second, _second_rx) = evaluation_request(2);
        table.enqueue(first);
        table.enqueue(second);

        let queued = table.take_queued().into_iter().map(|x| x.id).collect::<Vec<_>>();
        assert_eq!(queued, vec![RequestId(1), RequestId(2)]);
        assert_eq!(table.queued(), 0);
        assert!(table.dispatch_next().is_none());
    }

    #[test]
    fn check_abandoned_requests_are_skipped() {
        let mut table = PendingTable::default();
        let (first, first_rx) = best_move_request(1);
        let (second, _second_rx) = best_move_request(2);
        table.enqueue(first);
        table.enqueue(second);
        drop(first_rx);

        assert_eq!(table.dispatch_next().map(|x| x.0), Some(RequestId(2)));
    }

    #[test]
    fn check_fail_all() {
        let mut table = PendingTable::default();
        let (first, mut first_rx) = best_move_request(1);
        let (second, mut second_rx) = evaluation_request(2);
        table.enqueue(first);
        table.enqueue(second);
        table.dispatch_next();

        table.fail_all(EngineError::Dead);

        assert_eq!(first_rx.try_recv().unwrap(), Err(EngineError::Dead));
        assert_eq!(second_rx.try_recv().unwrap(), Err(EngineError::Dead));
        assert!(!table.is_busy());
    }
}
