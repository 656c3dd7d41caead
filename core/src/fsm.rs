//! Finite-state machine
//!
//! A machine owns a closed set of states ([`StateSet`]) addressed by a small
//! `Copy` id. Exactly one state is active. `transit()` swaps the active state
//! and runs the new state's `entry()` immediately, before any further
//! `task()` call; there are no queued or deferred transitions.
//!
//! States never see the machine itself, only the shared context, so a state
//! cannot re-enter `tick()` or `transit()`. A state asks for a transition by
//! returning [`Next`] from `task()`.
//!
//! Misuse is fatal and reported as [`FsmError`]:
//! - ticking or transiting before `start()`
//! - starting twice
//! - a second transition in the same pass (an external `transit()` followed
//!   by the state's own transition in the following `tick()`)
//! - `Next::Back` with nothing to go back to

use core::fmt::Debug;

use crate::error::FsmError;

/// What a state wants after its `task()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Next<Id> {
    /// Stay in the current state
    Stay,
    /// Enter another state
    Transit(Id),
    /// Return to the state that was active before this one
    Back,
}

/// A closed set of states sharing a context `Cx`
pub trait StateSet<Cx: ?Sized> {
    /// State identifier
    type Id: Copy + Eq + Debug;

    /// Name of state `id` for diagnostics
    fn name(&self, id: Self::Id) -> &'static str;

    /// One-time initialization, run by [`Fsm::start`]
    fn setup(&mut self, _cx: &mut Cx) {}

    /// Run once each time `id` becomes active
    fn entry(&mut self, id: Self::Id, cx: &mut Cx);

    /// Run every pass while `id` is active
    fn task(&mut self, id: Self::Id, cx: &mut Cx) -> Next<Self::Id>;
}

/// A running state machine
#[derive(Debug)]
pub struct Fsm<S, Id> {
    name: &'static str,
    states: S,
    current: Option<Id>,
    previous: Option<Id>,
    transited: bool,
}

impl<S, Id: Copy + Eq + Debug> Fsm<S, Id> {
    /// Machine over `states`, not yet started
    pub const fn new(name: &'static str, states: S) -> Self {
        Self {
            name,
            states,
            current: None,
            previous: None,
            transited: false,
        }
    }

    /// Machine name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Active state, `None` before `start()`
    pub fn current(&self) -> Option<Id> {
        self.current
    }

    /// State active before the current one
    pub fn previous(&self) -> Option<Id> {
        self.previous
    }

    /// `true` once started
    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    /// The states
    pub fn states(&self) -> &S {
        &self.states
    }

    /// The states, mutably
    pub fn states_mut(&mut self) -> &mut S {
        &mut self.states
    }

    /// Run the states' setup and enter `initial`
    pub fn start<Cx: ?Sized>(&mut self, initial: Id, cx: &mut Cx) -> Result<(), FsmError>
    where
        S: StateSet<Cx, Id = Id>,
    {
        if self.is_started() {
            error!("{}: already started", self.name);
            return Err(FsmError::AlreadyStarted);
        }
        self.states.setup(cx);
        self.enter(initial, cx);
        // Starting does not count against the first pass
        self.transited = false;
        Ok(())
    }

    /// Make `next` the active state and run its `entry()` now
    pub fn transit<Cx: ?Sized>(&mut self, next: Id, cx: &mut Cx) -> Result<(), FsmError>
    where
        S: StateSet<Cx, Id = Id>,
    {
        if !self.is_started() {
            error!("{}: transit before start", self.name);
            return Err(FsmError::NotStarted);
        }
        if self.transited {
            error!(
                "{}: second transition to {} in one pass",
                self.name,
                self.states.name(next)
            );
            return Err(FsmError::DoubleTransit);
        }
        self.transited = true;
        self.enter(next, cx);
        Ok(())
    }

    /// Run the active state's `task()` and apply what it asks for
    pub fn tick<Cx: ?Sized>(&mut self, cx: &mut Cx) -> Result<(), FsmError>
    where
        S: StateSet<Cx, Id = Id>,
    {
        let Some(current) = self.current else {
            error!("{}: tick before start", self.name);
            return Err(FsmError::NotStarted);
        };

        let result = match self.states.task(current, cx) {
            Next::Stay => Ok(()),
            Next::Transit(next) => self.transit(next, cx),
            Next::Back => match self.previous {
                Some(previous) => self.transit(previous, cx),
                None => {
                    error!("{}: back with no previous state", self.name);
                    Err(FsmError::NoPreviousState)
                }
            },
        };

        self.transited = false;
        result
    }

    fn enter<Cx: ?Sized>(&mut self, next: Id, cx: &mut Cx)
    where
        S: StateSet<Cx, Id = Id>,
    {
        match self.current {
            Some(current) => info!(
                "{}: {} -> {}",
                self.name,
                self.states.name(current),
                self.states.name(next)
            ),
            None => info!("{}: -> {}", self.name, self.states.name(next)),
        }
        self.previous = self.current;
        self.current = Some(next);
        self.states.entry(next, cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
        Amber,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Setup,
        Entry(Light),
        Task(Light),
    }

    #[derive(Default)]
    struct Trace {
        calls: heapless::Vec<Call, 32>,
    }

    /// Scripted states: Green moves on to Amber, Amber goes back
    #[derive(Default)]
    struct Lights {
        green_moves: bool,
        amber_goes_back: bool,
    }

    impl StateSet<Trace> for Lights {
        type Id = Light;

        fn name(&self, id: Light) -> &'static str {
            match id {
                Light::Red => "Red",
                Light::Green => "Green",
                Light::Amber => "Amber",
            }
        }

        fn setup(&mut self, cx: &mut Trace) {
            cx.calls.push(Call::Setup).unwrap();
        }

        fn entry(&mut self, id: Light, cx: &mut Trace) {
            cx.calls.push(Call::Entry(id)).unwrap();
        }

        fn task(&mut self, id: Light, cx: &mut Trace) -> Next<Light> {
            cx.calls.push(Call::Task(id)).unwrap();
            match id {
                Light::Green if self.green_moves => Next::Transit(Light::Amber),
                Light::Amber if self.amber_goes_back => Next::Back,
                _ => Next::Stay,
            }
        }
    }

    #[test]
    fn test_entry_runs_before_next_task() {
        let mut cx = Trace::default();
        let mut fsm = Fsm::new("Main", Lights::default());
        fsm.start(Light::Red, &mut cx).unwrap();
        fsm.tick(&mut cx).unwrap();
        fsm.transit(Light::Green, &mut cx).unwrap();
        fsm.tick(&mut cx).unwrap();

        assert_eq!(
            cx.calls.as_slice(),
            &[
                Call::Setup,
                Call::Entry(Light::Red),
                Call::Task(Light::Red),
                Call::Entry(Light::Green),
                Call::Task(Light::Green),
            ]
        );
        assert_eq!(fsm.current(), Some(Light::Green));
        assert_eq!(fsm.previous(), Some(Light::Red));
    }

    #[test]
    fn test_state_transition_and_back() {
        let mut cx = Trace::default();
        let lights = Lights {
            green_moves: true,
            amber_goes_back: true,
        };
        let mut fsm = Fsm::new("Main", lights);
        fsm.start(Light::Green, &mut cx).unwrap();

        fsm.tick(&mut cx).unwrap();
        assert_eq!(fsm.current(), Some(Light::Amber));
        fsm.states_mut().green_moves = false;
        fsm.tick(&mut cx).unwrap();
        assert_eq!(fsm.current(), Some(Light::Green));

        let entries = cx
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Entry(_)))
            .count();
        assert_eq!(entries, 3);
    }

    #[test]
    fn test_misuse_is_an_error() {
        let mut cx = Trace::default();
        let mut fsm = Fsm::new("Main", Lights::default());
        assert_eq!(fsm.tick(&mut cx), Err(FsmError::NotStarted));
        assert_eq!(fsm.transit(Light::Red, &mut cx), Err(FsmError::NotStarted));

        fsm.start(Light::Red, &mut cx).unwrap();
        assert_eq!(fsm.start(Light::Red, &mut cx), Err(FsmError::AlreadyStarted));

        // Back from the initial state has nowhere to go
        let mut cx = Trace::default();
        let mut fsm = Fsm::new(
            "Main",
            Lights {
                green_moves: false,
                amber_goes_back: true,
            },
        );
        fsm.start(Light::Amber, &mut cx).unwrap();
        assert_eq!(fsm.tick(&mut cx), Err(FsmError::NoPreviousState));
    }

    #[test]
    fn test_double_transit_in_one_pass() {
        let mut cx = Trace::default();
        let mut fsm = Fsm::new("Main", Lights::default());
        fsm.start(Light::Red, &mut cx).unwrap();

        fsm.transit(Light::Amber, &mut cx).unwrap();
        assert_eq!(
            fsm.transit(Light::Green, &mut cx),
            Err(FsmError::DoubleTransit)
        );
        assert_eq!(fsm.current(), Some(Light::Amber));

        // The state's own transition after an external one is the second
        fsm.states_mut().green_moves = true;
        fsm.tick(&mut cx).unwrap();
        fsm.transit(Light::Green, &mut cx).unwrap();
        assert_eq!(fsm.tick(&mut cx), Err(FsmError::DoubleTransit));

        // The next pass starts clean
        assert!(fsm.tick(&mut cx).is_ok());
    }
}
