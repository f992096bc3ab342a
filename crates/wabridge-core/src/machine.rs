//! The connection lifecycle state machine.
//!
//! [`apply`] is a pure function from the current state and one input to the
//! next state plus the side effects the caller must carry out. It never
//! touches the network or a clock (apart from stamping `updated_at`); the
//! [`ConnectionSupervisor`](crate::ConnectionSupervisor) executes the effects.
//!
//! ```text
//!                 qr-issued            authenticated           ready
//! Initializing ─────────────▶ AwaitingScan ─────────▶ Authenticated ─────▶ Ready
//!      │  ▲                                                                  │
//!      │  │ retry fired (current generation)                   disconnected  │
//!      │  └──────────────────────── Disconnected ◀───────────────────────────┘
//!      │  └──────────────────────── Failed ◀─── init-error
//! ```
//!
//! Recovery is time based with fixed delays and no retry limit. Every time a
//! retry is scheduled the generation is bumped; a timer that fires for an
//! older generation is ignored, so one episode restarts the provider once.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::event::{MachineInput, SessionEvent};
use crate::relay::RelayPayload;
use crate::state::{ConnectionState, Phase, status};

/// Fixed delays used for recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before reconnecting after `disconnected`.
    pub reconnect_delay: Duration,
    /// Delay before re-initializing after provider construction failed.
    pub reinit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(30),
            reinit_delay: Duration::from_secs(60),
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Create a fresh provider instance bound to `generation`.
    StartProvider { generation: u64 },
    /// Fire [`MachineInput::RetryFired`] for `generation` after `delay`.
    ScheduleRetry { delay: Duration, generation: u64 },
    /// Forward an inbound message.
    Relay(RelayPayload),
}

/// Result of applying one input.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The next state (equal to the previous one when ignored).
    pub state: ConnectionState,
    /// Effects to execute, in order.
    pub effects: Vec<Effect>,
    /// Whether the input was rejected in the current phase.
    pub ignored: bool,
}

impl Transition {
    fn ignored(state: &ConnectionState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
            ignored: true,
        }
    }
}

/// Applies one input to `state`.
pub fn apply(state: &ConnectionState, input: MachineInput, policy: &RetryPolicy) -> Transition {
    let input_name = input.name();
    let mut next = state.clone();
    let mut effects = Vec::new();

    let accepted = match input {
        MachineInput::Session(event) => on_session_event(&mut next, &mut effects, event, policy),
        MachineInput::InitFailed(reason) => {
            if state.phase == Phase::Initializing {
                enter_recovery(&mut next, &mut effects, Phase::Failed, policy.reinit_delay);
                next.status_message = status::init_failed(&reason);
                true
            } else {
                false
            }
        }
        MachineInput::RetryFired { generation } => {
            if state.phase.is_recovering() && generation == state.generation {
                next.phase = Phase::Initializing;
                next.pending_challenge = None;
                next.status_message = status::INITIALIZING.to_string();
                effects.push(Effect::StartProvider { generation });
                true
            } else {
                false
            }
        }
        MachineInput::Fault(reason) => {
            next.status_message = status::fault(&reason);
            true
        }
    };

    if !accepted {
        debug!(input = input_name, phase = %state.phase, "Input ignored in current phase");
        return Transition::ignored(state);
    }

    if next != *state {
        next.updated_at = Utc::now();
        if next.phase != state.phase {
            info!(
                input = input_name,
                from = %state.phase,
                to = %next.phase,
                status = %next.status_message,
                "Connection phase changed"
            );
        }
    }

    Transition {
        state: next,
        effects,
        ignored: false,
    }
}

fn on_session_event(
    next: &mut ConnectionState,
    effects: &mut Vec<Effect>,
    event: SessionEvent,
    policy: &RetryPolicy,
) -> bool {
    match event {
        SessionEvent::QrIssued(token) => {
            if token.is_empty()
                || !matches!(next.phase, Phase::Initializing | Phase::AwaitingScan)
            {
                return false;
            }
            next.phase = Phase::AwaitingScan;
            next.pending_challenge = Some(token);
            next.status_message = status::AWAITING_SCAN.to_string();
            true
        }
        SessionEvent::Authenticated => {
            // Initializing covers sessions restored from stored credentials.
            if !matches!(next.phase, Phase::Initializing | Phase::AwaitingScan) {
                return false;
            }
            next.phase = Phase::Authenticated;
            next.pending_challenge = None;
            next.status_message = status::AUTHENTICATED.to_string();
            true
        }
        SessionEvent::Ready => {
            if next.phase != Phase::Authenticated {
                return false;
            }
            next.phase = Phase::Ready;
            next.pending_challenge = None;
            next.status_message = status::READY.to_string();
            true
        }
        SessionEvent::AuthFailed(message) => {
            // A pending retry owns the recovering phases.
            if next.phase.is_recovering() {
                return false;
            }
            next.phase = Phase::AuthFailed;
            next.pending_challenge = None;
            next.status_message = status::auth_failed(&message);
            true
        }
        SessionEvent::Disconnected(reason) => match next.phase {
            Phase::Failed => false,
            Phase::Disconnected => {
                next.status_message = status::disconnected(&reason);
                next.last_disconnect_reason = Some(reason);
                true
            }
            _ => {
                enter_recovery(next, effects, Phase::Disconnected, policy.reconnect_delay);
                next.status_message = status::disconnected(&reason);
                next.last_disconnect_reason = Some(reason);
                true
            }
        },
        SessionEvent::MessageReceived(msg) => {
            effects.push(Effect::Relay(msg.into()));
            true
        }
    }
}

fn enter_recovery(
    next: &mut ConnectionState,
    effects: &mut Vec<Effect>,
    phase: Phase,
    delay: Duration,
) {
    next.phase = phase;
    next.pending_challenge = None;
    next.generation += 1;
    effects.push(Effect::ScheduleRetry {
        delay,
        generation: next.generation,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InboundMessage;

    fn run(inputs: impl IntoIterator<Item = MachineInput>) -> (ConnectionState, Vec<Effect>) {
        let policy = RetryPolicy::default();
        let mut state = ConnectionState::initial();
        let mut effects = Vec::new();
        for input in inputs {
            let t = apply(&state, input, &policy);
            state = t.state;
            effects.extend(t.effects);
        }
        (state, effects)
    }

    fn session(event: SessionEvent) -> MachineInput {
        MachineInput::Session(event)
    }

    fn message(body: &str) -> InboundMessage {
        InboundMessage {
            from: "15551234567@c.us".into(),
            body: body.into(),
            timestamp: 1_700_000_000,
            message_type: "chat".into(),
        }
    }

    #[test]
    fn test_scan_then_ready() {
        let (state, effects) = run([
            session(SessionEvent::QrIssued("XYZ".into())),
            session(SessionEvent::Authenticated),
            session(SessionEvent::Ready),
        ]);

        assert_eq!(state.phase, Phase::Ready);
        assert!(!state.has_challenge());
        assert_eq!(state.status_message, "Connected and ready");
        assert!(effects.is_empty());
    }

    #[test]
    fn test_qr_stores_challenge() {
        let (state, _) = run([session(SessionEvent::QrIssued("XYZ".into()))]);
        assert_eq!(state.phase, Phase::AwaitingScan);
        assert_eq!(state.pending_challenge.as_deref(), Some("XYZ"));
        assert_eq!(state.status_message, "QR Code generated - ready to scan");
    }

    #[test]
    fn test_qr_refresh_replaces_challenge() {
        let (state, _) = run([
            session(SessionEvent::QrIssued("first".into())),
            session(SessionEvent::QrIssued("second".into())),
        ]);
        assert_eq!(state.pending_challenge.as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_qr_is_ignored() {
        let policy = RetryPolicy::default();
        let t = apply(
            &ConnectionState::initial(),
            session(SessionEvent::QrIssued(String::new())),
            &policy,
        );
        assert!(t.ignored);
        assert_eq!(t.state.phase, Phase::Initializing);
    }

    #[test]
    fn test_qr_is_noop_once_authenticated_or_ready() {
        let (state, _) = run([
            session(SessionEvent::Authenticated),
            session(SessionEvent::QrIssued("late".into())),
        ]);
        assert_eq!(state.phase, Phase::Authenticated);
        assert!(!state.has_challenge());

        let (state, _) = run([
            session(SessionEvent::Authenticated),
            session(SessionEvent::Ready),
            session(SessionEvent::QrIssued("late".into())),
        ]);
        assert_eq!(state.phase, Phase::Ready);
        assert!(!state.has_challenge());
    }

    #[test]
    fn test_restored_session_skips_scan() {
        let (state, _) = run([
            session(SessionEvent::Authenticated),
            session(SessionEvent::Ready),
        ]);
        assert_eq!(state.phase, Phase::Ready);
    }

    #[test]
    fn test_ready_requires_authenticated() {
        let policy = RetryPolicy::default();
        let t = apply(&ConnectionState::initial(), session(SessionEvent::Ready), &policy);
        assert!(t.ignored);
        assert_eq!(t.state.phase, Phase::Initializing);
    }

    #[test]
    fn test_auth_failure_clears_challenge() {
        let (state, effects) = run([
            session(SessionEvent::QrIssued("XYZ".into())),
            session(SessionEvent::AuthFailed("bad session".into())),
        ]);
        assert_eq!(state.phase, Phase::AuthFailed);
        assert!(!state.has_challenge());
        assert_eq!(state.status_message, "Authentication failed: bad session");
        assert!(effects.is_empty());
    }

    #[test]
    fn test_disconnect_schedules_reconnect() {
        let (state, effects) = run([
            session(SessionEvent::Authenticated),
            session(SessionEvent::Ready),
            session(SessionEvent::Disconnected("logout".into())),
        ]);

        assert_eq!(state.phase, Phase::Disconnected);
        assert_eq!(state.last_disconnect_reason.as_deref(), Some("logout"));
        assert_eq!(state.status_message, "Disconnected: logout");
        assert_eq!(state.generation, 1);
        assert_eq!(
            effects,
            vec![Effect::ScheduleRetry {
                delay: Duration::from_secs(30),
                generation: 1
            }]
        );
    }

    #[test]
    fn test_repeated_disconnect_schedules_once() {
        let (state, effects) = run([
            session(SessionEvent::Disconnected("a".into())),
            session(SessionEvent::Disconnected("b".into())),
            session(SessionEvent::Disconnected("c".into())),
        ]);

        assert_eq!(state.last_disconnect_reason.as_deref(), Some("c"));
        assert_eq!(state.generation, 1);
        let retries = effects
            .iter()
            .filter(|e| matches!(e, Effect::ScheduleRetry { .. }))
            .count();
        assert_eq!(retries, 1);
    }

    #[test]
    fn test_retry_restarts_provider() {
        let (state, effects) = run([
            session(SessionEvent::QrIssued("XYZ".into())),
            session(SessionEvent::Disconnected("timeout".into())),
            MachineInput::RetryFired { generation: 1 },
        ]);

        assert_eq!(state.phase, Phase::Initializing);
        assert!(!state.has_challenge());
        assert_eq!(state.status_message, "Initializing...");
        assert_eq!(effects.last(), Some(&Effect::StartProvider { generation: 1 }));
    }

    #[test]
    fn test_stale_retry_is_ignored() {
        let policy = RetryPolicy::default();
        let (state, _) = run([session(SessionEvent::Disconnected("x".into()))]);

        let t = apply(&state, MachineInput::RetryFired { generation: 0 }, &policy);
        assert!(t.ignored);
        assert_eq!(t.state.phase, Phase::Disconnected);

        let t = apply(&ConnectionState::initial(), MachineInput::RetryFired { generation: 0 }, &policy);
        assert!(t.ignored);
    }

    #[test]
    fn test_init_failure_schedules_reinit() {
        let (state, effects) = run([MachineInput::InitFailed("browser missing".into())]);

        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.status_message, "Failed to initialize: browser missing");
        assert_eq!(
            effects,
            vec![Effect::ScheduleRetry {
                delay: Duration::from_secs(60),
                generation: 1
            }]
        );
    }

    #[test]
    fn test_init_failure_outside_initializing_is_ignored() {
        let (state, effects) = run([
            session(SessionEvent::Authenticated),
            MachineInput::InitFailed("late".into()),
        ]);
        assert_eq!(state.phase, Phase::Authenticated);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_failed_ignores_disconnect() {
        let (state, effects) = run([
            MachineInput::InitFailed("boom".into()),
            session(SessionEvent::Disconnected("late".into())),
        ]);
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.last_disconnect_reason, None);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_message_relays_without_phase_change() {
        let (state, effects) = run([
            session(SessionEvent::Authenticated),
            session(SessionEvent::Ready),
            session(SessionEvent::MessageReceived(message("hello"))),
        ]);

        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Relay(payload) => assert_eq!(payload.body, "hello"),
            other => panic!("expected relay, got {other:?}"),
        }
    }

    #[test]
    fn test_fault_only_touches_status() {
        let (state, _) = run([
            session(SessionEvent::QrIssued("XYZ".into())),
            MachineInput::Fault("boom".into()),
        ]);
        assert_eq!(state.phase, Phase::AwaitingScan);
        assert!(state.has_challenge());
        assert_eq!(state.status_message, "Error: boom");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn input_strategy() -> impl Strategy<Value = MachineInput> {
            prop_oneof![
                "[a-z]{0,4}".prop_map(|t| MachineInput::Session(SessionEvent::QrIssued(t))),
                Just(MachineInput::Session(SessionEvent::Authenticated)),
                Just(MachineInput::Session(SessionEvent::Ready)),
                "[a-z]{0,4}".prop_map(|m| MachineInput::Session(SessionEvent::AuthFailed(m))),
                "[a-z]{0,4}".prop_map(|r| MachineInput::Session(SessionEvent::Disconnected(r))),
                "[a-z]{0,4}".prop_map(|b| MachineInput::Session(SessionEvent::MessageReceived(
                    InboundMessage {
                        from: "1@c.us".into(),
                        body: b,
                        timestamp: 0,
                        message_type: "chat".into(),
                    }
                ))),
                "[a-z]{0,4}".prop_map(MachineInput::InitFailed),
                (0u64..6).prop_map(|generation| MachineInput::RetryFired { generation }),
                "[a-z]{0,4}".prop_map(MachineInput::Fault),
            ]
        }

        proptest! {
            #[test]
            fn challenge_present_iff_awaiting_scan(
                inputs in proptest::collection::vec(input_strategy(), 0..64)
            ) {
                let policy = RetryPolicy::default();
                let mut state = ConnectionState::initial();
                for input in inputs {
                    state = apply(&state, input, &policy).state;
                    prop_assert!(state.is_consistent(), "inconsistent state: {:?}", state);
                }
            }

            #[test]
            fn retry_scheduled_only_when_entering_recovery(
                inputs in proptest::collection::vec(input_strategy(), 0..64)
            ) {
                let policy = RetryPolicy::default();
                let mut state = ConnectionState::initial();
                for input in inputs {
                    let t = apply(&state, input, &policy);
                    let scheduled = t
                        .effects
                        .iter()
                        .filter(|e| matches!(e, Effect::ScheduleRetry { .. }))
                        .count();
                    let entered = !state.phase.is_recovering() && t.state.phase.is_recovering();
                    prop_assert_eq!(scheduled, usize::from(entered));
                    state = t.state;
                }
            }
        }
    }
}
