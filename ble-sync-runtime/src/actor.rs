//! The actor: single-threaded mailbox loop driving one device's sync.
//! See `spec.md` §5 for the concurrency model this implements.

use std::collections::HashMap;
use std::time::Instant;

use ble_sync_core::policy::{
    BoundedPageSizingPolicy, BreakerPolicy, ExponentialBackoffRetryPolicy, PageSizingPolicyConfig,
    ThreadRandomSource, ThresholdBreakerPolicy,
};
use ble_sync_core::{
    BlePort, BreakerState, ClockPort, Command, DeliveryPort, DeviceId, DomainError, RetryReason,
    SagaPolicies, StateStorePort, SyncAggregate, SyncEngineConfig, SyncEvent, SyncEventKind,
    SyncSnapshot, TelemetryEvent, TelemetryPort, TimerToken,
};
use tokio::sync::mpsc;

use crate::error::ActorError;

/// Which of the aggregate's five breakers a command's outcome feeds
/// back into. The saga's decision table only reads `connect_breaker`
/// directly (`spec.md` §4.5); the other four are maintained here so a
/// stuck bond dialog, a failing read, a failing delivery, or a failing
/// ack each get the same gating behaviour without the saga needing to
/// special-case them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Bond,
    Connect,
    Read,
    Deliver,
    Ack,
}

impl Stage {
    const fn for_command(command: &Command) -> Option<Self> {
        match command {
            Command::BondDevice => Some(Self::Bond),
            Command::ConnectGatt => Some(Self::Connect),
            Command::ReadEventCount | Command::ReadEvents { .. } => Some(Self::Read),
            Command::DeliverToApp { .. } => Some(Self::Deliver),
            Command::Acknowledge { .. } => Some(Self::Ack),
            Command::ScheduleRetry { .. } | Command::Stop => None,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Bond => "bond",
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Deliver => "deliver",
            Self::Ack => "ack",
        }
    }
}

/// A message delivered to the actor's mailbox. Processed strictly in
/// FIFO order by the single consumer task.
#[derive(Debug)]
pub enum Message {
    /// Kick off the saga; sent once, immediately after the actor task
    /// starts.
    Start,
    /// A fact observed from a port or synthesized by the actor itself.
    Event(SyncEvent),
    /// A previously scheduled timer fired.
    TimerFired(TimerToken),
    /// Drain the mailbox and stop after the current message.
    Stop,
}

/// A handle used to send messages to a running actor. Cloning a handle
/// is cheap; every clone shares the same mailbox.
#[derive(Clone)]
pub struct ActorHandle {
    device_id: DeviceId,
    sender: mpsc::UnboundedSender<Message>,
}

impl ActorHandle {
    /// Send a message to the actor, returning an error if its mailbox
    /// has already been closed.
    ///
    /// # Errors
    ///
    /// Returns `ActorError::Stopped` if the actor task has ended.
    pub fn send(&self, message: Message) -> Result<(), ActorError> {
        self.sender.send(message).map_err(|_| ActorError::Stopped {
            device_id: self.device_id.clone(),
        })
    }

    /// The device this handle addresses.
    #[must_use]
    pub const fn device_id(&self) -> &DeviceId {
        &self.device_id
    }
}

/// Runs one device's sync actor to completion. Owns the aggregate, the
/// concrete policies, and the ports; everything else is driven through
/// the pure `saga::decide` and `reducer::apply` functions in
/// `ble-sync-core`.
pub struct Actor<Ble, Delivery, Clock, Store, Telemetry> {
    device_id: DeviceId,
    aggregate: SyncAggregate,
    retry: ExponentialBackoffRetryPolicy<ThreadRandomSource>,
    breaker: ThresholdBreakerPolicy,
    paging: BoundedPageSizingPolicy,
    pending_timer: Option<TimerToken>,
    read_in_flight: bool,
    last_attempted_stage: Option<Stage>,
    ble: Ble,
    delivery: Delivery,
    clock: Clock,
    store: Store,
    telemetry: Telemetry,
    mailbox: mpsc::UnboundedReceiver<Message>,
}

impl<Ble, Delivery, Clock, Store, Telemetry> Actor<Ble, Delivery, Clock, Store, Telemetry>
where
    Ble: BlePort,
    Delivery: DeliveryPort,
    Clock: ClockPort,
    Store: StateStorePort,
    Telemetry: TelemetryPort,
{
    /// Construct an actor and its handle. The caller is responsible for
    /// spawning `actor.run()` on a task; the handle can be used to feed
    /// it messages from that point on.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        config: SyncEngineConfig,
        ble: Ble,
        delivery: Delivery,
        clock: Clock,
        store: Store,
        telemetry: Telemetry,
    ) -> (Self, ActorHandle) {
        let (sender, mailbox) = mpsc::unbounded_channel();
        let handle = ActorHandle {
            device_id: device_id.clone(),
            sender,
        };
        let actor = Self {
            aggregate: SyncAggregate::initial(device_id.clone(), config.initial_page_size),
            device_id,
            retry: ExponentialBackoffRetryPolicy::new(config.retry),
            breaker: ThresholdBreakerPolicy::new(config.breaker),
            paging: BoundedPageSizingPolicy::new(PageSizingPolicyConfig {
                min_page: config.paging.min_page,
                max_page: config.paging.max_page,
                grow_step: config.paging.grow_step,
                shrink_step: config.paging.shrink_step,
            }),
            pending_timer: None,
            read_in_flight: false,
            last_attempted_stage: None,
            ble,
            delivery,
            clock,
            store,
            telemetry,
            mailbox,
        };
        (actor, handle)
    }

    /// Restore a prior snapshot before the mailbox loop starts, if the
    /// store has one. Resynthesized fields (breaker states, attempt
    /// counters, `total_on_device`, `last_error`) start fresh and
    /// reconverge within the first few processed events, per
    /// `spec.md` §4.6.
    ///
    /// # Errors
    ///
    /// Returns `ActorError::SnapshotRestoreFailed` if the store reports
    /// an error (a corrupted or absent snapshot is not an error and is
    /// treated as a cold start).
    pub async fn restore(&mut self) -> Result<(), ActorError> {
        match self.store.load(&self.device_id).await {
            Ok(Some(snapshot)) => {
                self.apply_snapshot(snapshot).await;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(source) => Err(ActorError::SnapshotRestoreFailed {
                device_id: self.device_id.clone(),
                source,
            }),
        }
    }

    async fn apply_snapshot(&mut self, snapshot: SyncSnapshot) {
        tracing::info!(device_id = %self.device_id, "snapshot_restored");
        metrics::counter!("ble_sync.snapshot.restored").increment(1);
        self.aggregate.last_acked_exclusive = snapshot.last_acked_exclusive;
        self.aggregate.page_size = snapshot.page_size;
        self.aggregate.saga_cursor = snapshot.saga_cursor.clone();

        let at = self.clock.now();
        self.emit_telemetry(
            "snapshot_restored",
            at,
            HashMap::from([
                ("acked".to_string(), snapshot.last_acked_exclusive.to_string()),
                ("pageSize".to_string(), snapshot.page_size.to_string()),
                ("cursor".to_string(), snapshot.saga_cursor),
            ]),
        )
        .await;
    }

    /// Drive the mailbox to completion: process `Start`, then every
    /// subsequent message in FIFO order, until `Stop` or the mailbox
    /// closes.
    pub async fn run(mut self) {
        while let Some(message) = self.mailbox.recv().await {
            match message {
                Message::Start => self.advance(None).await,
                Message::Event(event) => self.advance(Some(event)).await,
                Message::TimerFired(token) => {
                    if self.pending_timer == Some(token) {
                        self.pending_timer = None;
                        let now = self.clock.now();
                        let retry_event = SyncEvent::new(
                            self.device_id.clone(),
                            now,
                            SyncEventKind::RetryScheduled { after: now },
                        );
                        self.advance(Some(retry_event)).await;
                    }
                }
                Message::Stop => {
                    if let Some(token) = self.pending_timer.take() {
                        self.clock.cancel(token).await;
                    }
                    break;
                }
            }
        }
    }

    /// Apply one incoming event (if any), then repeatedly consult the
    /// saga and execute whatever commands it returns, feeding each
    /// command's resulting event straight back into the reducer and
    /// the saga, until the saga has nothing left to do. Iterative
    /// rather than recursive, so a long page-by-page sync never grows
    /// an unbounded call stack.
    async fn advance(&mut self, event: Option<SyncEvent>) {
        let mut last_event = event;

        if let Some(event) = &last_event {
            self.apply_event(event).await;
        }

        loop {
            let now = self.clock.now();
            let commands = {
                let mut policies = SagaPolicies {
                    retry: &mut self.retry,
                    connect_breaker: &self.breaker,
                    page_sizing: &self.paging,
                };
                ble_sync_core::saga::decide(&self.aggregate, last_event.as_ref(), now, &mut policies)
            };

            if commands.is_empty() {
                return;
            }

            last_event = None;
            for command in commands {
                if let Some(produced) = self.execute(command).await {
                    self.apply_event(&produced).await;
                    last_event = Some(produced);
                }
            }
        }
    }

    async fn apply_event(&mut self, event: &SyncEvent) {
        self.aggregate = ble_sync_core::reducer::apply(self.aggregate.clone(), event);
        self.route_breaker_outcome(event);

        if let SyncEventKind::SyncFailed { reason } = &event.kind {
            tracing::warn!(device_id = %self.device_id, %reason, "sync_failed");
            metrics::counter!("ble_sync.sync.failed").increment(1);
            self.emit_telemetry(
                "sync_failed",
                event.at,
                HashMap::from([("reason".to_string(), reason.to_string())]),
            )
            .await;
        }

        // Snapshotting is gated to the two points `spec.md` §4.6.4 names:
        // a durable ack high-water mark and an opportunistic write on
        // disconnect, not every processed event.
        match &event.kind {
            SyncEventKind::EventsAcked { .. } => self.save_snapshot("acked").await,
            SyncEventKind::Disconnected { .. } => self.save_snapshot("disconnected").await,
            _ => {}
        }
    }

    fn route_breaker_outcome(&mut self, event: &SyncEvent) {
        let routed = match &event.kind {
            SyncEventKind::DeviceBonded => Some((Stage::Bond, self.breaker.on_success(&self.aggregate.bond_breaker))),
            SyncEventKind::DeviceConnected => {
                Some((Stage::Connect, self.breaker.on_success(&self.aggregate.connect_breaker)))
            }
            SyncEventKind::EventCountLoaded { .. } | SyncEventKind::EventsRead { .. } => {
                Some((Stage::Read, self.breaker.on_success(&self.aggregate.read_breaker)))
            }
            SyncEventKind::EventsDelivered { .. } => {
                Some((Stage::Deliver, self.breaker.on_success(&self.aggregate.deliver_breaker)))
            }
            SyncEventKind::EventsAcked { .. } => {
                Some((Stage::Ack, self.breaker.on_success(&self.aggregate.ack_breaker)))
            }
            SyncEventKind::Disconnected { .. } => {
                let fallback = DomainError::Transport {
                    message: "disconnected".to_string(),
                    code: None,
                };
                let error = self.aggregate.last_error.as_ref().unwrap_or(&fallback);
                Some((
                    Stage::Connect,
                    self.breaker.on_failure(event.at, &self.aggregate.connect_breaker, error),
                ))
            }
            SyncEventKind::SyncFailed { reason } => self.last_attempted_stage.take().map(|stage| {
                let current = self.breaker_state_for(stage);
                (stage, self.breaker.on_failure(event.at, current, reason))
            }),
            SyncEventKind::RetryScheduled { .. } | SyncEventKind::SyncCompleted => None,
        };

        if let Some((stage, state)) = routed {
            self.set_breaker_state(stage, state);
        }
    }

    const fn breaker_state_for(&self, stage: Stage) -> &BreakerState {
        match stage {
            Stage::Bond => &self.aggregate.bond_breaker,
            Stage::Connect => &self.aggregate.connect_breaker,
            Stage::Read => &self.aggregate.read_breaker,
            Stage::Deliver => &self.aggregate.deliver_breaker,
            Stage::Ack => &self.aggregate.ack_breaker,
        }
    }

    fn set_breaker_state(&mut self, stage: Stage, state: BreakerState) {
        match stage {
            Stage::Bond => self.aggregate.bond_breaker = state,
            Stage::Connect => self.aggregate.connect_breaker = state,
            Stage::Read => self.aggregate.read_breaker = state,
            Stage::Deliver => self.aggregate.deliver_breaker = state,
            Stage::Ack => self.aggregate.ack_breaker = state,
        }
    }

    /// Execute one command via the corresponding port, returning the
    /// event it produced. Returns `None` for commands that don't
    /// produce an event directly (`ScheduleRetry`, `Stop`) or when
    /// backpressure skips a read outright.
    async fn execute(&mut self, command: Command) -> Option<SyncEvent> {
        let stage = Stage::for_command(&command);
        let started = Instant::now();

        let outcome = match &command {
            Command::BondDevice => self.ble.bond(&self.device_id).await.map(|()| SyncEventKind::DeviceBonded),
            Command::ConnectGatt => self
                .ble
                .connect(&self.device_id)
                .await
                .map(|()| SyncEventKind::DeviceConnected),
            Command::ReadEventCount => self
                .ble
                .read_event_count(&self.device_id)
                .await
                .map(|total| SyncEventKind::EventCountLoaded { total }),
            Command::ReadEvents { offset, count } => {
                if self.read_in_flight {
                    tracing::debug!(device_id = %self.device_id, "read_skipped_backpressure");
                    metrics::counter!("ble_sync.read.skipped_backpressure").increment(1);
                    let at = self.clock.now();
                    self.emit_telemetry(
                        "read_skipped_backpressure",
                        at,
                        HashMap::from([
                            ("offset".to_string(), offset.to_string()),
                            ("count".to_string(), count.to_string()),
                        ]),
                    )
                    .await;
                    return None;
                }
                self.read_in_flight = true;
                let result = self
                    .ble
                    .read_events(&self.device_id, *offset, *count)
                    .await
                    .map(|range| SyncEventKind::EventsRead { range });
                self.read_in_flight = false;
                result
            }
            Command::DeliverToApp { range } => self
                .delivery
                .deliver(&self.device_id, *range)
                .await
                .map(|()| SyncEventKind::EventsDelivered { range: *range }),
            Command::Acknowledge { up_to } => self
                .ble
                .acknowledge(&self.device_id, *up_to)
                .await
                .map(|()| SyncEventKind::EventsAcked { up_to: *up_to }),
            Command::ScheduleRetry { after, reason } => {
                self.schedule_retry(*after, reason.clone()).await;
                return None;
            }
            Command::Stop => return None,
        };

        metrics::histogram!("ble_sync.command.duration_seconds", "stage" => stage.map_or("other", Stage::label))
            .record(started.elapsed().as_secs_f64());

        let at = self.clock.now();
        Some(match outcome {
            Ok(kind) => SyncEvent::new(self.device_id.clone(), at, kind),
            Err(error) => {
                self.last_attempted_stage = stage;
                let kind = match &command {
                    Command::ConnectGatt => SyncEventKind::Disconnected {
                        reason: ble_sync_core::DisconnectReason::GattError,
                        gatt_code: None,
                    },
                    _ => SyncEventKind::SyncFailed { reason: error },
                };
                SyncEvent::new(self.device_id.clone(), at, kind)
            }
        })
    }

    async fn schedule_retry(&mut self, after: ble_sync_core::TimestampMs, reason: RetryReason) {
        if let Some(previous) = self.pending_timer.take() {
            self.clock.cancel(previous).await;
        }
        let token = self.clock.schedule(after).await;
        self.pending_timer = Some(token);
        tracing::info!(device_id = %self.device_id, ?reason, "retry_scheduled");
        metrics::counter!("ble_sync.retry.scheduled").increment(1);

        let now = self.clock.now();
        self.emit_telemetry(
            "retry_scheduled",
            now,
            HashMap::from([
                ("reason".to_string(), format!("{reason:?}")),
                ("after".to_string(), after.to_string()),
            ]),
        )
        .await;
    }

    async fn save_snapshot(&self, reason: &'static str) {
        let snapshot = SyncSnapshot::new(
            self.device_id.clone(),
            self.aggregate.last_acked_exclusive,
            self.aggregate.page_size,
            self.aggregate.saga_cursor.clone(),
        );
        if let Err(error) = self.store.save(&snapshot).await {
            tracing::warn!(device_id = %self.device_id, %error, "failed to persist snapshot");
            return;
        }
        tracing::debug!(device_id = %self.device_id, reason, "snapshot_saved");
        metrics::counter!("ble_sync.snapshot.saved").increment(1);

        let at = self.clock.now();
        self.emit_telemetry(
            "snapshot_saved",
            at,
            HashMap::from([
                ("reason".to_string(), reason.to_string()),
                ("acked".to_string(), snapshot.last_acked_exclusive.to_string()),
                ("pageSize".to_string(), snapshot.page_size.to_string()),
                ("cursor".to_string(), snapshot.saga_cursor),
            ]),
        )
        .await;
    }

    /// Record a structured fact to the host-facing `TelemetryPort`, using
    /// the fixed vocabulary from `spec.md` §6.3. Distinct from the
    /// `tracing`/`metrics` calls alongside each call site, which
    /// instrument the runtime itself rather than the sync protocol.
    async fn emit_telemetry(
        &self,
        name: &'static str,
        at: ble_sync_core::TimestampMs,
        data: HashMap<String, String>,
    ) {
        self.telemetry
            .record(TelemetryEvent {
                name: name.to_string(),
                at,
                device_id: self.device_id.clone(),
                data,
            })
            .await;
    }
}
