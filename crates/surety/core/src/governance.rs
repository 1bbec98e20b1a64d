use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use surety_types::{AccountId, Amount, ProtocolParameters, SuretyError, SuretyResult};
use tracing::{debug, info};

/// Admission state of an airline identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AirlineState {
    /// Awaiting a strict majority of active airlines
    Nominated,
    /// Admitted but not yet funded
    Registered,
    /// Funded at or above the minimum stake; may sponsor, vote and register flights
    Active,
}

/// An airline record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Airline {
    pub id: AccountId,
    pub name: String,
    pub state: AirlineState,
    /// Active airlines that endorsed this airline while it was nominated
    pub votes_received: BTreeSet<AccountId>,
    /// Stake paid on activation (zero until funded)
    pub stake: Amount,
    /// Airline that first put this identity forward (`None` for the founder)
    pub sponsor: Option<AccountId>,
}

impl Airline {
    fn new(id: AccountId, name: String, state: AirlineState, sponsor: Option<AccountId>) -> Self {
        Self {
            id,
            name,
            state,
            votes_received: BTreeSet::new(),
            stake: 0,
            sponsor,
        }
    }

    /// Registered or Active.
    pub fn is_registered(&self) -> bool {
        matches!(self.state, AirlineState::Registered | AirlineState::Active)
    }

    pub fn is_active(&self) -> bool {
        self.state == AirlineState::Active
    }
}

/// Result of a nomination or a vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Registered directly through the founders' fast path
    FastTracked,
    /// A nomination record was opened carrying the sponsor's endorsement
    Nominated { votes: usize },
    /// The vote was recorded; the nominee still lacks a strict majority
    VoteRecorded { votes: usize, active: usize },
    /// The vote completed a strict majority and the nominee is now Registered
    Elected { votes: usize, active: usize },
}

impl AdmissionOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(
            self,
            AdmissionOutcome::FastTracked | AdmissionOutcome::Elected { .. }
        )
    }
}

/// Result of funding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FundingOutcome {
    /// Registered → Active; the stake was taken into escrow
    Activated { stake: Amount },
    /// Already Active; nothing changed and nothing was charged
    AlreadyActive,
}

/// Airline governance: multi-party admission control.
///
/// While fewer than `founders_threshold` airlines are registered, any active
/// airline may register a new one directly. From then on a nominee needs
/// `votes * 2 > active airlines`; exactly half is not enough.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AirlineGovernance {
    airlines: BTreeMap<AccountId, Airline>,
}

impl AirlineGovernance {
    /// Governance seeded with the first airline, registered but not funded.
    pub fn with_founder(founder: AccountId, name: impl Into<String>) -> Self {
        let mut airlines = BTreeMap::new();
        airlines.insert(
            founder.clone(),
            Airline::new(founder, name.into(), AirlineState::Registered, None),
        );
        Self { airlines }
    }

    pub fn airline(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    pub fn airlines(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values()
    }

    /// Nominations still waiting for a majority.
    pub fn pending_nominations(&self) -> impl Iterator<Item = &Airline> {
        self.airlines
            .values()
            .filter(|a| a.state == AirlineState::Nominated)
    }

    pub fn is_airline(&self, id: &AccountId) -> bool {
        self.airlines.get(id).is_some_and(Airline::is_registered)
    }

    pub fn is_active(&self, id: &AccountId) -> bool {
        self.airlines.get(id).is_some_and(Airline::is_active)
    }

    /// Airlines that are Registered or Active.
    pub fn registered_count(&self) -> usize {
        self.airlines.values().filter(|a| a.is_registered()).count()
    }

    pub fn active_count(&self) -> usize {
        self.airlines.values().filter(|a| a.is_active()).count()
    }

    pub fn require_active_sponsor(&self, sponsor: &AccountId) -> SuretyResult<()> {
        if self.is_active(sponsor) {
            Ok(())
        } else {
            Err(SuretyError::SponsorNotActive(sponsor.clone()))
        }
    }

    /// Put `nominee` forward on behalf of `sponsor`.
    ///
    /// A repeat nomination of a pending nominee counts as the sponsor's vote.
    pub fn nominate(
        &mut self,
        sponsor: &AccountId,
        nominee: &AccountId,
        name: impl Into<String>,
        params: &ProtocolParameters,
    ) -> SuretyResult<AdmissionOutcome> {
        self.require_active_sponsor(sponsor)?;
        if self.is_airline(nominee) {
            return Err(SuretyError::AirlineAlreadyRegistered(nominee.clone()));
        }
        if self.airlines.contains_key(nominee) {
            return self.vote(sponsor, nominee);
        }

        let name = name.into();
        if self.registered_count() < params.founders_threshold {
            info!(
                airline = %nominee,
                sponsor = %sponsor,
                "Airline registered through founders' fast path"
            );
            self.airlines.insert(
                nominee.clone(),
                Airline::new(
                    nominee.clone(),
                    name,
                    AirlineState::Registered,
                    Some(sponsor.clone()),
                ),
            );
            return Ok(AdmissionOutcome::FastTracked);
        }

        let mut record = Airline::new(
            nominee.clone(),
            name,
            AirlineState::Nominated,
            Some(sponsor.clone()),
        );
        record.votes_received.insert(sponsor.clone());
        info!(airline = %nominee, sponsor = %sponsor, "Airline nominated");
        self.airlines.insert(nominee.clone(), record);
        Ok(AdmissionOutcome::Nominated { votes: 1 })
    }

    /// Record `voter`'s endorsement of a pending nominee.
    pub fn vote(
        &mut self,
        voter: &AccountId,
        nominee: &AccountId,
    ) -> SuretyResult<AdmissionOutcome> {
        if !self.is_active(voter) {
            return Err(SuretyError::VoterNotActive(voter.clone()));
        }
        let active = self.active_count();
        let record = self
            .airlines
            .get_mut(nominee)
            .ok_or_else(|| SuretyError::NomineeNotFound(nominee.clone()))?;
        if record.is_registered() {
            return Err(SuretyError::AirlineAlreadyRegistered(nominee.clone()));
        }
        if !record.votes_received.insert(voter.clone()) {
            return Err(SuretyError::DuplicateVote {
                voter: voter.clone(),
                nominee: nominee.clone(),
            });
        }

        let votes = record.votes_received.len();
        if votes * 2 > active {
            record.state = AirlineState::Registered;
            info!(airline = %nominee, votes, active, "Airline elected by majority");
            Ok(AdmissionOutcome::Elected { votes, active })
        } else {
            debug!(airline = %nominee, voter = %voter, votes, active, "Vote recorded");
            Ok(AdmissionOutcome::VoteRecorded { votes, active })
        }
    }

    /// Pay the stake that turns a Registered airline Active.
    pub fn fund(
        &mut self,
        airline: &AccountId,
        amount: Amount,
        params: &ProtocolParameters,
    ) -> SuretyResult<FundingOutcome> {
        let record = self
            .airlines
            .get_mut(airline)
            .filter(|a| a.is_registered())
            .ok_or_else(|| SuretyError::AirlineNotRegistered(airline.clone()))?;

        if amount < params.minimum_stake {
            return Err(SuretyError::InsufficientStake {
                amount,
                minimum: params.minimum_stake,
            });
        }
        if record.is_active() {
            debug!(airline = %airline, "Airline already active; funding ignored");
            return Ok(FundingOutcome::AlreadyActive);
        }

        record.state = AirlineState::Active;
        record.stake = amount;
        info!(airline = %airline, stake = amount, "Airline funded and active");
        Ok(FundingOutcome::Activated { stake: amount })
    }
}
