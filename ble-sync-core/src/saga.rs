//! The saga: a pure decision function mapping `(state, last event, now)`
//! to an ordered list of commands. See `spec.md` §4.5. The saga never
//! performs I/O and never mutates the aggregate; the actor runtime
//! executes whatever it returns.

use crate::aggregate::SyncAggregate;
use crate::command::Command;
use crate::event::{RetryReason, SyncEvent, SyncEventKind};
use crate::policy::{BreakerPolicy, PageOutcome, PageSizingPolicy, RetryPolicy};
use crate::value::{AttemptKey, EventCount, TimestampMs};

/// The policies the saga consults. Only the connect breaker is gated by
/// the decision table directly (bonding is user-gated, and the other
/// breakers are updated by the runtime's outcome routing rather than
/// read by the saga); retry and page-sizing apply uniformly.
pub struct SagaPolicies<'a> {
    /// Retry timing policy, mutable because the default implementation
    /// carries an internal random source.
    pub retry: &'a mut dyn RetryPolicy,
    /// Gates `ConnectGatt` attempts.
    pub connect_breaker: &'a dyn BreakerPolicy,
    /// Adapts the page size after each ack.
    pub page_sizing: &'a dyn PageSizingPolicy,
}

/// Decide the next commands given the current aggregate, the last
/// event applied (`None` at actor start), and the current time.
#[must_use]
pub fn decide(
    aggregate: &SyncAggregate,
    last_event: Option<&SyncEvent>,
    now: TimestampMs,
    policies: &mut SagaPolicies<'_>,
) -> Vec<Command> {
    use crate::aggregate::{BondStatus, ConnectionStatus};

    // 1. Bonding always comes first.
    if aggregate.bond_status != BondStatus::Bonded {
        return vec![Command::BondDevice];
    }

    // 2. Then connection, gated by the connect breaker.
    if aggregate.connection_status != ConnectionStatus::Connected {
        return connect_or_retry(aggregate, now, policies, RetryReason::BackoffAfterFailure);
    }

    // 3. Initial bootstrap: nothing has ever been read.
    if aggregate.total_on_device.is_zero() && aggregate.last_acked_exclusive.value() == 0 {
        return vec![Command::ReadEventCount];
    }

    // 4. Otherwise dispatch on the last event.
    match last_event.map(|e| &e.kind) {
        None => vec![Command::ReadEventCount],
        Some(SyncEventKind::DeviceBonded) => vec![Command::ConnectGatt],
        Some(SyncEventKind::DeviceConnected) => vec![Command::ReadEventCount],
        Some(SyncEventKind::EventCountLoaded { .. }) => {
            if aggregate.is_fully_acked() {
                vec![Command::ReadEventCount]
            } else {
                vec![Command::read_events(
                    aggregate.last_acked_exclusive,
                    EventCount::from(aggregate.page_size),
                )]
            }
        }
        Some(SyncEventKind::EventsRead { range }) => {
            vec![Command::DeliverToApp { range: *range }]
        }
        Some(SyncEventKind::EventsDelivered { range }) => vec![Command::Acknowledge {
            up_to: range.end,
        }],
        Some(SyncEventKind::EventsAcked { .. }) => {
            if aggregate.last_acked_exclusive.value() < aggregate.total_on_device.value() {
                let outcome = if aggregate.last_error.is_none() {
                    PageOutcome::Stable
                } else {
                    PageOutcome::MostlyStable
                };
                let page_size = policies.page_sizing.next(aggregate.page_size, outcome);
                vec![Command::read_events(
                    aggregate.last_acked_exclusive,
                    EventCount::from(page_size),
                )]
            } else {
                vec![Command::ReadEventCount]
            }
        }
        Some(SyncEventKind::Disconnected { .. }) => {
            connect_or_retry(aggregate, now, policies, RetryReason::TemporaryGattError)
        }
        _ => vec![],
    }
}

fn connect_or_retry(
    aggregate: &SyncAggregate,
    now: TimestampMs,
    policies: &mut SagaPolicies<'_>,
    reason: RetryReason,
) -> Vec<Command> {
    if policies
        .connect_breaker
        .is_call_allowed(now, &aggregate.connect_breaker)
    {
        return vec![Command::ConnectGatt];
    }

    let attempts = aggregate
        .attempts
        .get(&AttemptKey::connect_gatt())
        .copied()
        .unwrap_or(0);

    match policies.retry.decide(now, attempts, &reason) {
        crate::policy::RetryDecision::Schedule(at) => vec![Command::ScheduleRetry { after: at, reason }],
        crate::policy::RetryDecision::GiveUp => vec![],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::aggregate::{BondStatus, BreakerState, ConnectionStatus};
    use crate::event::DisconnectReason;
    use crate::policy::{
        BoundedPageSizingPolicy, ExponentialBackoffRetryPolicy, FixedRandomSource,
        PageSizingPolicyConfig, RetryPolicyConfig, ThresholdBreakerPolicy,
    };
    use crate::value::{DeviceId, EventOffset, EventRange, PageSize};

    fn device() -> DeviceId {
        DeviceId::new("dev-1").expect("non-empty literal")
    }

    fn bonded_connected(mut agg: SyncAggregate) -> SyncAggregate {
        agg.bond_status = BondStatus::Bonded;
        agg.connection_status = ConnectionStatus::Connected;
        agg
    }

    fn event(kind: SyncEventKind) -> SyncEvent {
        SyncEvent::new(device(), TimestampMs::new(0), kind)
    }

    struct Harness {
        retry: ExponentialBackoffRetryPolicy<FixedRandomSource>,
        connect_breaker: ThresholdBreakerPolicy,
        page_sizing: BoundedPageSizingPolicy,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                retry: ExponentialBackoffRetryPolicy::with_random_source(
                    RetryPolicyConfig::builder()
                        .max_attempts(3)
                        .min_backoff_ms(500)
                        .max_backoff_ms(5_000)
                        .jitter_ratio(0.0)
                        .build(),
                    FixedRandomSource(1.0),
                ),
                connect_breaker: ThresholdBreakerPolicy::new(
                    crate::policy::BreakerPolicyConfig::builder()
                        .failures_to_open(1)
                        .cool_down_ms(500)
                        .build(),
                ),
                page_sizing: BoundedPageSizingPolicy::new(
                    PageSizingPolicyConfig::builder()
                        .min_page(20)
                        .max_page(500)
                        .grow_step(20)
                        .shrink_step(20)
                        .build(),
                ),
            }
        }

        fn policies(&mut self) -> SagaPolicies<'_> {
            SagaPolicies {
                retry: &mut self.retry,
                connect_breaker: &self.connect_breaker,
                page_sizing: &self.page_sizing,
            }
        }
    }

    #[test]
    fn not_bonded_yields_bond_device() {
        let agg = SyncAggregate::initial(device(), PageSize::new(50).expect("positive"));
        let mut h = Harness::new();
        let cmds = decide(&agg, None, TimestampMs::new(0), &mut h.policies());
        assert_eq!(cmds, vec![Command::BondDevice]);
    }

    #[test]
    fn happy_path_walks_through_bootstrap_and_first_page() {
        let mut h = Harness::new();
        let mut agg = bonded_connected(SyncAggregate::initial(
            device(),
            PageSize::new(50).expect("positive"),
        ));

        let cmds = decide(&agg, Some(&event(SyncEventKind::DeviceBonded)), TimestampMs::new(0), &mut h.policies());
        assert_eq!(cmds, vec![Command::ConnectGatt]);

        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::DeviceConnected)),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(cmds, vec![Command::ReadEventCount]);

        agg.total_on_device = EventCount::new(120);
        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::EventCountLoaded {
                total: EventCount::new(120),
            })),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(
            cmds,
            vec![Command::read_events(EventOffset::new(0), EventCount::new(50))]
        );

        let range = EventRange::new(EventOffset::new(0), EventOffset::new(50)).expect("valid");
        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::EventsRead { range })),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(cmds, vec![Command::DeliverToApp { range }]);

        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::EventsDelivered { range })),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(cmds, vec![Command::Acknowledge { up_to: range.end }]);

        agg.last_acked_exclusive = EventOffset::new(50);
        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::EventsAcked {
                up_to: EventOffset::new(50),
            })),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(
            cmds,
            vec![Command::read_events(EventOffset::new(50), EventCount::new(70))]
        );

        agg.last_acked_exclusive = EventOffset::new(120);
        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::EventsAcked {
                up_to: EventOffset::new(120),
            })),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(cmds, vec![Command::ReadEventCount]);
    }

    #[test]
    fn disconnect_mid_paging_resumes_at_high_water() {
        let mut h = Harness::new();
        let mut agg = bonded_connected(SyncAggregate::initial(
            device(),
            PageSize::new(50).expect("positive"),
        ));
        agg.connection_status = ConnectionStatus::Disconnected;
        agg.last_acked_exclusive = EventOffset::new(50);
        agg.total_on_device = EventCount::new(120);

        let disconnected = event(SyncEventKind::Disconnected {
            reason: DisconnectReason::Timeout,
            gatt_code: None,
        });
        let cmds = decide(&agg, Some(&disconnected), TimestampMs::new(0), &mut h.policies());
        assert_eq!(cmds, vec![Command::ConnectGatt]);

        agg.connection_status = ConnectionStatus::Connected;
        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::DeviceConnected)),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(cmds, vec![Command::ReadEventCount]);

        let cmds = decide(
            &agg,
            Some(&event(SyncEventKind::EventCountLoaded {
                total: EventCount::new(120),
            })),
            TimestampMs::new(0),
            &mut h.policies(),
        );
        assert_eq!(
            cmds,
            vec![Command::read_events(EventOffset::new(50), EventCount::new(50))]
        );
    }

    #[test]
    fn breaker_gating_schedules_retry_then_allows_after_cooldown() {
        let mut h = Harness::new();
        let mut agg = bonded_connected(SyncAggregate::initial(
            device(),
            PageSize::new(50).expect("positive"),
        ));
        agg.connection_status = ConnectionStatus::Disconnected;
        agg.connect_breaker = BreakerState {
            phase: crate::aggregate::BreakerPhase::Open,
            opened_at: Some(TimestampMs::new(5000)),
            last_failure: None,
        };

        let disconnected = event(SyncEventKind::Disconnected {
            reason: DisconnectReason::Timeout,
            gatt_code: None,
        });

        let cmds = decide(&agg, Some(&disconnected), TimestampMs::new(5000), &mut h.policies());
        assert_eq!(
            cmds,
            vec![Command::ScheduleRetry {
                after: TimestampMs::new(5500),
                reason: RetryReason::TemporaryGattError,
            }]
        );

        let cmds = decide(&agg, Some(&disconnected), TimestampMs::new(6000), &mut h.policies());
        assert_eq!(cmds, vec![Command::ConnectGatt]);
    }

    #[test]
    fn retry_cap_gives_up_once_exhausted() {
        let mut h = Harness::new();
        let mut agg = bonded_connected(SyncAggregate::initial(
            device(),
            PageSize::new(50).expect("positive"),
        ));
        agg.connection_status = ConnectionStatus::Disconnected;
        agg.connect_breaker = BreakerState {
            phase: crate::aggregate::BreakerPhase::Open,
            opened_at: Some(TimestampMs::new(0)),
            last_failure: None,
        };
        agg.attempts.insert(AttemptKey::connect_gatt(), 3);

        let disconnected = event(SyncEventKind::Disconnected {
            reason: DisconnectReason::Timeout,
            gatt_code: None,
        });
        let cmds = decide(&agg, Some(&disconnected), TimestampMs::new(0), &mut h.policies());
        assert_eq!(cmds, Vec::<Command>::new());
    }

    #[test]
    fn decide_is_deterministic_for_fixed_inputs() {
        let mut h = Harness::new();
        let agg = bonded_connected(SyncAggregate::initial(
            device(),
            PageSize::new(50).expect("positive"),
        ));
        let first = decide(&agg, None, TimestampMs::new(0), &mut h.policies());
        let second = decide(&agg, None, TimestampMs::new(0), &mut h.policies());
        assert_eq!(first, second);
    }
}
