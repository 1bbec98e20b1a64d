use thiserror::Error;

use crate::ids::{AccountId, Amount, FlightKey, RequestKey};

/// Result alias for protocol operations.
pub type SuretyResult<T> = Result<T, SuretyError>;

/// Errors signaled by protocol operations.
///
/// A failed mutating operation leaves protocol state exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuretyError {
    // --- Authorization ---
    #[error("caller {0} is not the contract owner")]
    Unauthorized(AccountId),

    #[error("sponsor {0} is not an active airline")]
    SponsorNotActive(AccountId),

    #[error("voter {0} is not an active airline")]
    VoterNotActive(AccountId),

    #[error("index {index} is not assigned to oracle {oracle}")]
    IndexNotAssigned { oracle: AccountId, index: u8 },

    #[error("oracle {0} is not registered")]
    OracleNotRegistered(AccountId),

    // --- Preconditions ---
    #[error("contract is not operational")]
    NotOperational,

    #[error("flight {0} is not registered")]
    FlightNotRegistered(FlightKey),

    #[error("flight {0} is already registered")]
    AlreadyRegistered(FlightKey),

    #[error("flight {0} is already resolved")]
    AlreadyResolved(FlightKey),

    #[error("passenger {passenger} already holds a policy on flight {flight}")]
    DuplicatePolicy {
        passenger: AccountId,
        flight: FlightKey,
    },

    #[error("premium {amount} exceeds the cap of {cap}")]
    AmountExceedsCap { amount: Amount, cap: Amount },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("stake {amount} is below the minimum of {minimum}")]
    InsufficientStake { amount: Amount, minimum: Amount },

    #[error("fee {amount} is below the registration fee of {required}")]
    InsufficientFee { amount: Amount, required: Amount },

    #[error("passenger {0} has no credit to withdraw")]
    NoCredit(AccountId),

    #[error("airline {0} is already registered")]
    AirlineAlreadyRegistered(AccountId),

    #[error("airline {0} is not registered")]
    AirlineNotRegistered(AccountId),

    #[error("no pending nomination for airline {0}")]
    NomineeNotFound(AccountId),

    #[error("{voter} already voted for {nominee}")]
    DuplicateVote {
        voter: AccountId,
        nominee: AccountId,
    },

    #[error("oracle {0} is already registered")]
    OracleAlreadyRegistered(AccountId),

    #[error("no status request {0}")]
    RequestNotFound(RequestKey),

    #[error("oracle {oracle} already responded to request {request}")]
    DuplicateResponse {
        oracle: AccountId,
        request: RequestKey,
    },

    #[error("treasury holds {available}, cannot pay {required}")]
    TreasuryShortfall { required: Amount, available: Amount },

    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("transfer to {to} failed: {reason}")]
    TransferFailed { to: AccountId, reason: String },

    #[error("invalid protocol parameters: {0}")]
    InvalidParameters(String),

    // --- Consensus timing ---
    #[error("status request {0} is already closed")]
    RequestClosed(RequestKey),
}

/// Classification of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the required role or state
    Authorization,
    /// The operation's invariants are not met given current state
    Precondition,
    /// A late response to an already-finalized request
    ConsensusTiming,
}

impl SuretyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SuretyError::Unauthorized(_)
            | SuretyError::SponsorNotActive(_)
            | SuretyError::VoterNotActive(_)
            | SuretyError::IndexNotAssigned { .. }
            | SuretyError::OracleNotRegistered(_) => ErrorKind::Authorization,
            SuretyError::RequestClosed(_) => ErrorKind::ConsensusTiming,
            _ => ErrorKind::Precondition,
        }
    }

    /// Late responses are dropped rather than failing a surrounding batch.
    pub fn is_droppable(&self) -> bool {
        self.kind() == ErrorKind::ConsensusTiming
    }
}
