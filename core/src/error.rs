//! Error types for the runtime, the state machines and shared state

use core::fmt;

/// Why a task stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskError {
    /// A collaborator the task depends on is not available
    Unavailable,
    /// The hardware reported a failure
    Hardware,
    /// The task gave up waiting
    Timeout,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Unavailable"),
            Self::Hardware => write!(f, "Hardware error"),
            Self::Timeout => write!(f, "Timeout"),
        }
    }
}

impl core::error::Error for TaskError {}

/// Delegation stack misuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DelegationError {
    /// Pushing would exceed the maximum delegation depth
    TooDeep,
}

impl fmt::Display for DelegationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooDeep => write!(f, "Delegation too deep"),
        }
    }
}

impl core::error::Error for DelegationError {}

/// State machine misuse. Always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmError {
    /// `tick` or `transit` called before `start`
    NotStarted,
    /// `start` called twice
    AlreadyStarted,
    /// More than one transition requested in a single pass
    DoubleTransit,
    /// `Back` requested with no previous state to return to
    NoPreviousState,
}

impl fmt::Display for FsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "State machine not started"),
            Self::AlreadyStarted => write!(f, "State machine already started"),
            Self::DoubleTransit => write!(f, "Second transition in one pass"),
            Self::NoPreviousState => write!(f, "No previous state"),
        }
    }
}

impl core::error::Error for FsmError {}

/// Shared device state errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateError {
    /// No module with this id is attached
    UnknownModule(u8),
    /// Channel index outside the module's schema
    ChannelOutOfRange {
        /// Module id
        module: u8,
        /// Offending channel
        channel: u8,
    },
    /// A module with this id is already attached
    DuplicateModule(u8),
    /// The module table is full
    ModuleTableFull,
    /// The schema declares more channels than a module can hold
    SchemaTooLarge,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModule(id) => write!(f, "Unknown module {}", id),
            Self::ChannelOutOfRange { module, channel } => {
                write!(f, "Channel {} out of range for module {}", channel, module)
            }
            Self::DuplicateModule(id) => write!(f, "Module {} already attached", id),
            Self::ModuleTableFull => write!(f, "Module table full"),
            Self::SchemaTooLarge => write!(f, "Schema too large"),
        }
    }
}

impl core::error::Error for StateError {}

/// Critical subsystem failure during boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// Persistent storage could not be set up
    Storage,
    /// The state machines refused to start
    Fsm(FsmError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "Storage setup failed"),
            Self::Fsm(e) => write!(f, "State machine start failed: {}", e),
        }
    }
}

impl core::error::Error for BootError {}

impl From<FsmError> for BootError {
    fn from(e: FsmError) -> Self {
        Self::Fsm(e)
    }
}

/// Anything that stops the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreError {
    /// Boot failed
    Boot(BootError),
    /// A state machine was misused
    Fsm(FsmError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boot(e) => write!(f, "Boot failed: {}", e),
            Self::Fsm(e) => write!(f, "State machine error: {}", e),
        }
    }
}

impl core::error::Error for CoreError {}

impl From<BootError> for CoreError {
    fn from(e: BootError) -> Self {
        Self::Boot(e)
    }
}

impl From<FsmError> for CoreError {
    fn from(e: FsmError) -> Self {
        Self::Fsm(e)
    }
}
