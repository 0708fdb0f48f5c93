//! Application service: the glue between dispatch, the FSM, and the
//! auth engine.
//!
//! The main loop (and the integration tests) drive exactly three entry
//! points per iteration:
//!
//! 1. [`LockService::handle_message`] — fold a decoded radio message into
//!    the context and mirror lifecycle milestones into the event sink.
//! 2. [`LockService::tick`] — run any exchange the FSM scheduled, then
//!    advance the state machine one step.
//! 3. [`LockService::handle_local_event`] — button and wake events from
//!    the ISR queue; button rotations bypass the radio protocol entirely.

use log::warn;

use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, BatteryPort, CipherPort, EventSink, StoragePort};
use crate::auth::engine::{self, RESPONSE_LEN};
use crate::error::{AuthError, Error};
use crate::events::Event;
use crate::fsm::context::{LockContext, PendingExchange};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::link::wire::{
    HANDLE_LOCK_TRANSMIT, MAX_COMMAND_DATA, RadioCommand, RadioMessage, connection_established,
};
use crate::store::CredentialStore;

pub struct LockService<C, A, B, S, E>
where
    C: CipherPort,
    A: ActuatorPort,
    B: BatteryPort,
    S: StoragePort,
    E: EventSink,
{
    cipher: C,
    actuator: A,
    battery: B,
    store: CredentialStore<S>,
    events: E,
    fsm: Fsm,
}

impl<C, A, B, S, E> LockService<C, A, B, S, E>
where
    C: CipherPort,
    A: ActuatorPort,
    B: BatteryPort,
    S: StoragePort,
    E: EventSink,
{
    pub fn new(
        cipher: C,
        actuator: A,
        battery: B,
        store: CredentialStore<S>,
        events: E,
    ) -> Self {
        Self {
            cipher,
            actuator,
            battery,
            store,
            events,
            fsm: Fsm::new(build_state_table(), StateId::Booting),
        }
    }

    /// Run the initial state's `on_enter`.  Call once before ticking.
    pub fn start(&mut self, ctx: &mut LockContext) {
        self.fsm.start(ctx);
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Fold a decoded radio message into the context.
    pub fn handle_message(&mut self, ctx: &mut LockContext, message: &RadioMessage) {
        match message {
            RadioMessage::AddressResponse { address } => {
                self.events.emit(&AppEvent::RadioReady { address: *address });
            }
            RadioMessage::ModeResponse { result: 0 } => {
                self.events.emit(&AppEvent::AdvertisingStarted);
            }
            RadioMessage::ConnectionStatusEvent { flags } if connection_established(*flags) => {
                self.events.emit(&AppEvent::PeerConnected);
            }
            RadioMessage::DisconnectedEvent { reason } => {
                self.events
                    .emit(&AppEvent::PeerDisconnected { reason: *reason });
            }
            _ => {}
        }
        ctx.apply(message);
    }

    /// Run a pending exchange, then advance the FSM one tick.
    ///
    /// Auth rejections are folded into `ctx.exchange_outcome` and handled
    /// by the state handlers; anything else (a storage fault during the
    /// nonce spend) is fatal and propagates to the caller.
    pub fn tick(&mut self, ctx: &mut LockContext) -> Result<(), Error> {
        if let Some(exchange) = ctx.pending_exchange.take() {
            self.run_exchange(ctx, exchange)?;
        }

        let before = self.fsm.current_state();
        self.fsm.tick(ctx);
        let after = self.fsm.current_state();
        if before != after {
            self.events.emit(&AppEvent::StateChanged {
                from: before,
                to: after,
            });
        }
        Ok(())
    }

    /// Handle a local (non-radio) event.
    ///
    /// Physical buttons drive the bolt directly: no session, no nonces,
    /// no radio traffic.
    pub fn handle_local_event(&mut self, event: Event) {
        match event {
            Event::ButtonLock => {
                let outcome = self.actuator.rotate_clockwise();
                self.events.emit(&AppEvent::ManualRotate {
                    clockwise: true,
                    outcome,
                });
            }
            Event::ButtonUnlock => {
                let outcome = self.actuator.rotate_counter_clockwise();
                self.events.emit(&AppEvent::ManualRotate {
                    clockwise: false,
                    outcome,
                });
            }
            // WakePin only exists to leave light sleep; the motor timer is
            // consumed inside the actuator adapter.
            Event::WakePin | Event::MotorTimerExpired => {}
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn run_exchange(&mut self, ctx: &mut LockContext, exchange: PendingExchange) -> Result<(), Error> {
        let result = match exchange {
            PendingExchange::Ticket => match ctx.msg_buf.as_ticket() {
                Some(ticket) => engine::process_ticket(
                    ticket,
                    &mut ctx.session,
                    &self.cipher,
                    &mut self.store,
                    &mut self.battery,
                    &mut self.events,
                ),
                None => {
                    // the length gate makes this unreachable
                    warn!("ticket exchange scheduled without a complete ticket");
                    Err(AuthError::DecryptFailed.into())
                }
            },
            PendingExchange::Request => match ctx.msg_buf.as_request() {
                Some(request) => engine::process_request(
                    request,
                    &mut ctx.session,
                    &self.cipher,
                    &mut self.actuator,
                    &mut self.events,
                ),
                None => {
                    warn!("request exchange scheduled without a complete request");
                    Err(AuthError::DecryptFailed.into())
                }
            },
        };

        match result {
            Ok(response) => {
                ctx.exchange_outcome = Some(Ok(()));
                self.queue_response(ctx, &response);
                Ok(())
            }
            Err(Error::Auth(e)) => {
                ctx.exchange_outcome = Some(Err(e));
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Load the chunker and queue the first attribute write; the rest of
    /// the sequence is released by write acknowledgements in dispatch.
    fn queue_response(&mut self, ctx: &mut LockContext, response: &[u8; RESPONSE_LEN]) {
        let first = ctx.chunker.begin(response);
        if let Ok(data) = heapless::Vec::<u8, MAX_COMMAND_DATA>::from_slice(first) {
            ctx.commands.push_radio(RadioCommand::WriteAttribute {
                handle: HANDLE_LOCK_TRANSMIT,
                offset: 0,
                data,
            });
        }
    }
}
