//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern: a fixed table of state descriptors, each
//! holding plain `fn` pointers — no heap, no `dyn`.
//!
//! ```text
//! Booting ─▶ AddressQuery ─▶ AdvertiseParamSet ─▶ AdvertiseDataSet
//!                                  ▲                     │
//!                                  │                     ▼
//!                            Disconnected        ScanResponseSet
//!                                  ▲                     │
//!                                  │                     ▼
//!         Connected ◀──[established]────────── Advertising (sleeps)
//!             │
//!             ▼ [72 bytes]
//!        TicketReceived ──ok──▶ AwaitingRequest ◀──────┐
//!             │ fail                 │ [41 bytes]      │
//!             ▼                      ▼                 │
//!         Connected          RequestReceived ──────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  If it
//! returns `Some(next_id)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next.  Handlers receive the shared
//! [`LockContext`] blackboard.
//!
//! "Waiting" is not a separate state: `on_enter` queues the radio command
//! and `on_update` polls for the acknowledgement flag, so a command is
//! never re-issued while its response is outstanding.

pub mod context;
pub mod states;

use context::LockContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all lifecycle states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Booting = 0,
    AddressQuery = 1,
    AdvertiseParamSet = 2,
    AdvertiseDataSet = 3,
    ScanResponseSet = 4,
    Advertising = 5,
    Connected = 6,
    TicketReceived = 7,
    AwaitingRequest = 8,
    RequestReceived = 9,
    Disconnected = 10,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 11;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; falls back to `Disconnected` in release (which clears
    /// volatile state and restarts advertising — the safe direction).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Booting,
            1 => Self::AddressQuery,
            2 => Self::AdvertiseParamSet,
            3 => Self::AdvertiseDataSet,
            4 => Self::ScanResponseSet,
            5 => Self::Advertising,
            6 => Self::Connected,
            7 => Self::TicketReceived,
            8 => Self::AwaitingRequest,
            9 => Self::RequestReceived,
            10 => Self::Disconnected,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Disconnected
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut LockContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut LockContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut LockContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    pub fn tick(&mut self, ctx: &mut LockContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition (used by the main loop to drop the
    /// machine back to `Disconnected` after a recovered fault).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut LockContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut LockContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
