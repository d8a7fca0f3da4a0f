//! Match runner: drives a [`GameLoop`] on its own tokio task
//!
//! Callers talk to a running match only by writing handle positions and by
//! calling [`MatchEngine::start`] / [`MatchEngine::stop`]. Goals, completion and
//! failures come back as [`MatchEvent`]s on a channel.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::game::bodies::HandlePosition;
use crate::game::game_loop::{GameLoop, GameLoopConfig, GameLoopEvent};
use crate::game::space::Position;
use crate::game::state::{BoardState, MatchId, PlayerSlot};
use crate::net::protocol::BroadcastFrame;

/// Destination for per-player frames
pub trait FrameSink: Send + Sync + 'static {
    /// Must not block; a frame that cannot be delivered right away is dropped
    fn send_frame(&self, match_id: MatchId, slot: PlayerSlot, frame: &BroadcastFrame);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn send_frame(&self, _match_id: MatchId, _slot: PlayerSlot, _frame: &BroadcastFrame) {}
}

/// Notifications from a running match to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    GoalScored(PlayerSlot),
    /// Match clock ran out. The loop has exited.
    Completed,
    /// Tick failed. The loop has exited and the match should be torn down.
    Failed(String),
}

/// A [`MatchEvent`] tagged with the loop run that produced it.
///
/// Every [`MatchEngine::start`] begins a new run; events from an earlier run
/// are stale once the engine has been stopped or restarted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchNotice {
    pub match_id: MatchId,
    pub run: u64,
    pub event: MatchEvent,
}

pub type EventSender = mpsc::UnboundedSender<MatchNotice>;
pub type EventReceiver = mpsc::UnboundedReceiver<MatchNotice>;

struct Worker {
    stop: watch::Sender<bool>,
    task: JoinHandle<GameLoop>,
}

/// Owns one match's board and, while running, the task ticking it
pub struct MatchEngine {
    match_id: MatchId,
    config: GameLoopConfig,
    /// Present whenever no worker holds it
    board: Option<BoardState>,
    inputs: [Arc<HandlePosition>; 2],
    worker: Option<Worker>,
    /// Runs started so far; the latest one is current until `stop`
    runs: u64,
    active_run: Option<u64>,
    events: EventSender,
    sink: Arc<dyn FrameSink>,
}

impl MatchEngine {
    pub fn new(
        match_id: MatchId,
        config: GameLoopConfig,
        events: EventSender,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let board = BoardState::new();
        let inputs = board.inputs();
        Self {
            match_id,
            config,
            board: Some(board),
            inputs,
            worker: None,
            runs: 0,
            active_run: None,
            events,
            sink,
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    /// Worker task exists and has not exited
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.task.is_finished())
    }

    /// Run whose events are still meaningful: set by `start`, cleared by `stop`
    pub fn active_run(&self) -> Option<u64> {
        self.active_run
    }

    /// Board, when no worker is holding it
    pub fn board(&self) -> Option<&BoardState> {
        self.board.as_ref()
    }

    /// Set a handle's position in player one's frame. Never blocks on the loop.
    pub fn update_handle(&self, slot: PlayerSlot, position: Position) {
        self.inputs[slot.index()].store(position);
    }

    /// Spawn a fresh loop. A loop that is already running is stopped first.
    pub async fn start(&mut self) {
        self.stop().await;

        let board = self.take_board();
        let game_loop = GameLoop::new(board, self.config.clone());
        let (stop_tx, stop_rx) = watch::channel(false);

        self.runs += 1;
        self.active_run = Some(self.runs);

        let task = tokio::spawn(run_match(
            self.match_id,
            self.runs,
            game_loop,
            stop_rx,
            self.events.clone(),
            Arc::clone(&self.sink),
        ));

        self.worker = Some(Worker {
            stop: stop_tx,
            task,
        });
    }

    /// Signal the loop and wait for it to exit. No-op when nothing is running.
    pub async fn stop(&mut self) {
        self.active_run = None;
        let Some(worker) = self.worker.take() else {
            return;
        };

        // Err means the loop already exited on its own
        let _ = worker.stop.send(true);

        match worker.task.await {
            Ok(game_loop) => self.board = Some(game_loop.into_board()),
            Err(e) => {
                error!(match_id = %self.match_id, "Match task did not shut down cleanly: {}", e);
                self.board = None;
            }
        }
    }

    pub fn board_mut(&mut self) -> Option<&mut BoardState> {
        self.board.as_mut()
    }

    /// Put the board back at kick-off. No-op while a worker holds it.
    pub fn reset_board(&mut self) -> bool {
        match self.board.as_mut() {
            Some(board) => {
                board.reset();
                true
            }
            None => false,
        }
    }

    fn take_board(&mut self) -> BoardState {
        match self.board.take() {
            Some(board) => board,
            None => {
                // Lost with a crashed worker; new board gets new input cells
                let board = BoardState::new();
                self.inputs = board.inputs();
                board
            }
        }
    }
}

impl Drop for MatchEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.send(true);
            worker.task.abort();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_match(
    match_id: MatchId,
    run: u64,
    mut game_loop: GameLoop,
    mut stop: watch::Receiver<bool>,
    events: EventSender,
    sink: Arc<dyn FrameSink>,
) -> GameLoop {
    let mut ticker = interval(game_loop.config().tick_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let notify = |event: MatchEvent| {
        events
            .send(MatchNotice {
                match_id,
                run,
                event,
            })
            .is_ok()
    };

    info!(
        %match_id,
        run,
        "Match loop started at {} Hz, {} ticks",
        game_loop.config().tick_rate,
        game_loop.remaining_ticks()
    );

    loop {
        tokio::select! {
            biased;
            // Also fires if the engine was dropped
            _ = stop.changed() => {
                debug!(%match_id, "Match loop stopped at tick {}", game_loop.tick_count());
                break;
            }
            _ = ticker.tick() => {}
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| game_loop.tick()));

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(%match_id, "Match tick failed: {}", e);
                notify(MatchEvent::Failed(e.to_string()));
                break;
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(%match_id, "Match tick panicked: {}", reason);
                notify(MatchEvent::Failed(reason));
                break;
            }
        };

        if let Some([one, two]) = output.frames.as_ref() {
            sink.send_frame(match_id, PlayerSlot::PlayerOne, one);
            sink.send_frame(match_id, PlayerSlot::PlayerTwo, two);
        }

        let mut completed = false;
        for event in output.events {
            let event = match event {
                GameLoopEvent::GoalScored { scorer } => MatchEvent::GoalScored(scorer),
                GameLoopEvent::Completed => {
                    completed = true;
                    MatchEvent::Completed
                }
            };
            if !notify(event) {
                warn!(%match_id, "Match event receiver dropped");
            }
        }

        if completed {
            info!(%match_id, "Match loop completed");
            break;
        }
    }

    game_loop
}
