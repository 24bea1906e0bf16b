//! Async node process.
//!
//! A running node owns:
//!
//! - one receive task per neighbor channel, feeding the [`SnapshotEngine`]
//! - one writer task per neighbor channel, draining an unbounded FIFO queue
//! - one workload task that sends bursts while the node is active
//! - at the initiator, one coordinator task that starts rounds and owns the aggregator
//!
//! Engine and workload state sit behind a single mutex. Every handler that produces outgoing
//! messages enqueues them before releasing it, which keeps markers and application traffic in
//! the order the engine decided on. Tasks live in a [`JoinSet`] and stop together when the
//! shutdown watch flips, either after a quiescent round (`Finish`) or on a fatal error.

use crate::aggregator::{GlobalStateAggregator, RoundOutcome};
use crate::bootstrap::{self, BootstrapOptions};
use crate::engine::{Action, SnapshotEngine};
use crate::results::ResultWriter;
use crate::workload::Workload;
use crate::NodeError;
use cutline_core::{
    Config, Message, NodeId, ProtocolViolation, RunParameters, SnapshotReport, VectorClock,
};
use cutline_transport::{FrameReader, FrameWriter, Transport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinSet;

/// Final counters of a node that shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    /// Node id
    pub node: NodeId,
    /// Application messages sent
    pub messages_sent: u64,
    /// Snapshot rounds closed locally
    pub rounds_closed: u64,
    /// Vector clock at shutdown
    pub final_clock: VectorClock,
}

/// One peer process of the simulation.
pub struct Node<T: Transport> {
    id: NodeId,
    config: Arc<Config>,
    transport: T,
    results: Option<Arc<dyn ResultWriter>>,
    outcomes: Option<mpsc::UnboundedSender<RoundOutcome>>,
    bootstrap: BootstrapOptions,
}

impl<T: Transport> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("transport", &self.transport.transport_type())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Node<T> {
    /// Node `id` of `config`, communicating over `transport`
    pub fn new(id: NodeId, config: Arc<Config>, transport: T) -> Self {
        Self {
            id,
            config,
            transport,
            results: None,
            outcomes: None,
            bootstrap: BootstrapOptions::default(),
        }
    }

    /// Persist every completed round (initiator only)
    pub fn with_result_writer(mut self, writer: Arc<dyn ResultWriter>) -> Self {
        self.results = Some(writer);
        self
    }

    /// Publish every completed round (initiator only)
    pub fn with_outcome_sink(mut self, sink: mpsc::UnboundedSender<RoundOutcome>) -> Self {
        self.outcomes = Some(sink);
        self
    }

    /// Override the connection retry policy
    pub fn with_bootstrap(mut self, options: BootstrapOptions) -> Self {
        self.bootstrap = options;
        self
    }

    /// Connect to all neighbors and run until termination.
    ///
    /// Returns once a `Finish` broadcast has been handled and every task has stopped, or with
    /// the first fatal error.
    pub async fn run(self) -> Result<NodeSummary, NodeError> {
        let id = self.id;
        let entry = self.config.node(id).ok_or(NodeError::UnknownNode(id))?;
        let address = entry.address();

        let mut listener = self.transport.listen(id, &address).await?;
        let channels =
            bootstrap::establish(&self.transport, &mut listener, id, &self.config, self.bootstrap)
                .await?;
        drop(listener);

        let parameters = &self.config.parameters;
        let is_initiator = id == parameters.initiator;
        let (reports_tx, reports_rx) = if is_initiator {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let mut core = NodeCore {
            engine: SnapshotEngine::from_config(id, &self.config),
            workload: Workload::new(id, parameters, self.config.neighbors(id)),
            finished: false,
        };
        let start_burst = id == parameters.start_node && core.workload.try_activate(&mut core.engine);

        let (shutdown, _) = watch::channel(false);
        let mut outbound = HashMap::with_capacity(channels.len());
        let mut halves = Vec::with_capacity(channels.len());
        for channel in channels {
            let (tx, rx) = mpsc::unbounded_channel();
            outbound.insert(channel.peer(), tx);
            let (reader, writer) = channel.split();
            halves.push((reader, writer, rx));
        }

        let shared = Arc::new(Shared {
            id,
            core: Mutex::new(core),
            outbound,
            reports: reports_tx,
            wake: Notify::new(),
            shutdown,
        });
        if start_burst {
            tracing::info!(node = %id, "start node activated");
            shared.wake.notify_one();
        }

        let mut tasks = JoinSet::new();
        for (reader, writer, queue) in halves {
            tasks.spawn(receive_loop(shared.clone(), reader));
            tasks.spawn(writer_loop(id, writer, queue, shared.shutdown.subscribe()));
        }
        tasks.spawn(workload_loop(shared.clone(), parameters.clone()));
        if let Some(reports) = reports_rx {
            tasks.spawn(coordinate(
                shared.clone(),
                reports,
                self.config.clone(),
                self.results.clone(),
                self.outcomes.clone(),
            ));
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(NodeError::Task(e.to_string())));
            if let Err(error) = result {
                tracing::error!(node = %id, %error, "node task failed");
                shared.stop();
                failure.get_or_insert(error);
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let core = shared.core.lock();
        let summary = NodeSummary {
            node: id,
            messages_sent: core.workload.sent(),
            rounds_closed: core.engine.rounds_closed(),
            final_clock: core.engine.clock().clone(),
        };
        tracing::info!(
            node = %id,
            sent = summary.messages_sent,
            rounds = summary.rounds_closed,
            clock = %summary.final_clock,
            "node finished"
        );
        Ok(summary)
    }
}

struct NodeCore {
    engine: SnapshotEngine,
    workload: Workload,
    finished: bool,
}

struct Shared {
    id: NodeId,
    core: Mutex<NodeCore>,
    outbound: HashMap<NodeId, mpsc::UnboundedSender<Message>>,
    reports: Option<mpsc::UnboundedSender<SnapshotReport>>,
    wake: Notify,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    /// Handle one inbound message from `peer`
    fn deliver(&self, peer: NodeId, message: Message) -> Result<(), NodeError> {
        let claims_peer = !matches!(message, Message::Snapshot(_));
        if claims_peer && message.source() != peer {
            return Err(ProtocolViolation::SourceMismatch {
                claimed: message.source(),
                channel: peer,
                kind: message.kind(),
            }
            .into());
        }

        match message {
            Message::Application { clock, .. } => {
                let mut guard = self.core.lock();
                let core = &mut *guard;
                core.engine.on_application(peer, &clock)?;
                tracing::trace!(node = %self.id, peer = %peer, clock = %core.engine.clock(), "application received");
                if core.workload.try_activate(&mut core.engine) {
                    self.wake.notify_one();
                }
            }
            Message::Marker { .. } => {
                let mut core = self.core.lock();
                let actions = core.engine.on_marker(peer)?;
                self.dispatch(actions);
            }
            Message::Snapshot(report) => {
                let mut core = self.core.lock();
                let actions = core.engine.on_snapshot(report)?;
                self.dispatch(actions);
            }
            Message::Finish { .. } => {
                if self.finish(Some(peer)) {
                    tracing::info!(node = %self.id, peer = %peer, "finish received");
                }
            }
        }
        Ok(())
    }

    /// Carry out engine actions; callers hold the core lock.
    fn dispatch(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send { to, message } => self.enqueue(to, message),
                Action::Aggregate(report) => match &self.reports {
                    Some(reports) => {
                        if reports.send(report).is_err() {
                            tracing::debug!(node = %self.id, "coordinator stopped, report dropped");
                        }
                    }
                    None => {
                        tracing::warn!(node = %self.id, "aggregate requested on a non-initiator");
                    }
                },
            }
        }
    }

    fn enqueue(&self, to: NodeId, message: Message) {
        match self.outbound.get(&to) {
            Some(queue) => {
                if queue.send(message).is_err() {
                    tracing::debug!(node = %self.id, peer = %to, "writer stopped, message dropped");
                }
            }
            None => {
                tracing::warn!(node = %self.id, peer = %to, kind = message.kind(), "no channel to peer");
            }
        }
    }

    /// Broadcast `Finish` to every neighbor except `from` and begin shutdown.
    ///
    /// Returns false if the node had already finished.
    fn finish(&self, from: Option<NodeId>) -> bool {
        {
            let mut core = self.core.lock();
            if core.finished {
                return false;
            }
            core.finished = true;
            let neighbors: Vec<NodeId> = core.engine.neighbors().iter().copied().collect();
            for neighbor in neighbors.into_iter().filter(|n| Some(*n) != from) {
                self.enqueue(neighbor, Message::Finish { source: self.id });
            }
        }
        self.stop();
        true
    }

    fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Resolves once shutdown has been requested.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep for `delay`; false if shutdown was requested first.
async fn pause(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = stopped(shutdown) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn receive_loop(shared: Arc<Shared>, mut reader: FrameReader) -> Result<(), NodeError> {
    let peer = reader.peer();
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        let received = tokio::select! {
            _ = stopped(&mut shutdown) => return Ok(()),
            received = reader.receive() => received,
        };
        match received {
            Ok(Some(message)) => shared.deliver(peer, message)?,
            Ok(None) => {
                tracing::debug!(node = %shared.id, peer = %peer, "channel closed by peer");
                return Ok(());
            }
            Err(error) => {
                tracing::warn!(node = %shared.id, peer = %peer, %error, "receive failed");
                return Ok(());
            }
        }
    }
}

async fn writer_loop(
    node: NodeId,
    mut writer: FrameWriter,
    mut queue: mpsc::UnboundedReceiver<Message>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), NodeError> {
    let peer = writer.peer();
    loop {
        tokio::select! {
            biased;
            next = queue.recv() => {
                let Some(message) = next else { break };
                if let Err(error) = writer.send(&message).await {
                    tracing::warn!(node = %node, peer = %peer, %error, "send failed");
                    return Ok(());
                }
            }
            _ = stopped(&mut shutdown) => {
                while let Ok(message) = queue.try_recv() {
                    if let Err(error) = writer.send(&message).await {
                        tracing::debug!(node = %node, peer = %peer, %error, "send failed during shutdown");
                        return Ok(());
                    }
                }
                break;
            }
        }
    }
    if let Err(error) = writer.close().await {
        tracing::debug!(node = %node, peer = %peer, %error, "close failed");
    }
    Ok(())
}

async fn workload_loop(shared: Arc<Shared>, parameters: RunParameters) -> Result<(), NodeError> {
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => return Ok(()),
            _ = shared.wake.notified() => {}
        }
        if !pause(&mut shutdown, parameters.activation_delay).await {
            return Ok(());
        }
        loop {
            let sent = {
                let mut guard = shared.core.lock();
                let core = &mut *guard;
                match core.workload.next_message(&mut core.engine) {
                    Some((to, message)) => {
                        shared.enqueue(to, message);
                        true
                    }
                    None => false,
                }
            };
            if !sent {
                break;
            }
            if !pause(&mut shutdown, parameters.min_send_delay).await {
                return Ok(());
            }
        }
    }
}

/// Initiator task: start a round every `snapshot_delay`, aggregate it, verify and persist.
async fn coordinate(
    shared: Arc<Shared>,
    mut reports: mpsc::UnboundedReceiver<SnapshotReport>,
    config: Arc<Config>,
    results: Option<Arc<dyn ResultWriter>>,
    outcomes: Option<mpsc::UnboundedSender<RoundOutcome>>,
) -> Result<(), NodeError> {
    let parameters = &config.parameters;
    let mut shutdown = shared.shutdown.subscribe();
    let mut aggregator = GlobalStateAggregator::new(shared.id, config.node_count());

    loop {
        if !pause(&mut shutdown, parameters.snapshot_delay).await {
            return Ok(());
        }
        {
            let mut core = shared.core.lock();
            let actions = core.engine.initiate()?;
            shared.dispatch(actions);
        }
        tracing::debug!(node = %shared.id, round = aggregator.rounds_completed() + 1, "snapshot initiated");

        let global = loop {
            let next = tokio::select! {
                _ = stopped(&mut shutdown) => return Ok(()),
                next = reports.recv() => next,
            };
            let Some(report) = next else {
                return Err(NodeError::Task("snapshot report queue closed".to_string()));
            };
            if let Some(global) = aggregator.on_report(report) {
                break global;
            }
        };

        let outcome = RoundOutcome::evaluate(
            aggregator.rounds_completed(),
            global,
            parameters.consistency_rule,
        );
        match outcome.consistency.violation {
            None => tracing::info!(
                round = outcome.round,
                local_states = outcome.global.local_states.len(),
                channel_states = outcome.global.channel_states.len(),
                quiescent = outcome.quiescent,
                "snapshot consistent"
            ),
            Some(violation) => tracing::warn!(
                round = outcome.round,
                rule = ?outcome.consistency.rule,
                owner = %violation.owner,
                observer = %violation.observer,
                recorded = violation.recorded,
                observed = violation.observed,
                "snapshot inconsistent"
            ),
        }

        if let Some(writer) = &results {
            for local in &outcome.global.local_states {
                writer.append(local.node, &local.clock)?;
            }
        }

        let quiescent = outcome.quiescent;
        if let Some(sink) = &outcomes {
            // A dropped observer does not stop the run.
            let _ = sink.send(outcome);
        }
        if quiescent {
            tracing::info!(node = %shared.id, "quiescent snapshot, broadcasting finish");
            shared.finish(None);
            return Ok(());
        }
    }
}
