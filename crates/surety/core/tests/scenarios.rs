//! End-to-end flows through the public protocol surface.

use surety_core::{
    AccountId, EventPayload, ExternalAccounts, FlightStatus, FlightSuretyProtocol, LedgerRuntime,
    OracleResponse, RoundRobinSelector, Submission, SuretyError, UNIT,
};

const DEPARTURE: u64 = 1_700_000_000;

fn id(name: &str) -> AccountId {
    AccountId::new(name)
}

fn deploy(accounts: &ExternalAccounts) -> FlightSuretyProtocol {
    FlightSuretyProtocol::builder(id("owner"), id("airline-1"), "Founder Air")
        .selector(RoundRobinSelector::new())
        .payout_rail(accounts.clone())
        .build()
        .unwrap()
}

fn register_oracles(protocol: &mut FlightSuretyProtocol, count: usize) -> Vec<AccountId> {
    (0..count)
        .map(|n| {
            let oracle = AccountId::new(format!("oracle-{}", n));
            protocol.register_oracle(&oracle, UNIT).unwrap();
            oracle
        })
        .collect()
}

fn holders(protocol: &FlightSuretyProtocol, oracles: &[AccountId], index: u8) -> Vec<AccountId> {
    oracles
        .iter()
        .filter(|o| protocol.oracle_indexes(o).unwrap().contains(&index))
        .cloned()
        .collect()
}

#[test]
fn airline_admission_moves_from_fast_path_to_voting() {
    let mut protocol = deploy(&ExternalAccounts::new());
    let founder = id("airline-1");
    protocol.fund_airline(&founder, 10 * UNIT).unwrap();

    for n in 2..=4 {
        let airline = AccountId::new(format!("airline-{}", n));
        let outcome = protocol
            .register_airline(&founder, &airline, "Fast Path Air")
            .unwrap();
        assert!(outcome.is_registered());
        assert!(protocol.is_airline(&airline));
    }

    let fifth = id("airline-5");
    protocol
        .register_airline(&founder, &fifth, "Fifth Air")
        .unwrap();
    assert!(!protocol.is_airline(&fifth));

    // An unfunded airline cannot vote.
    assert_eq!(
        protocol.vote_airline(&id("airline-2"), &fifth),
        Err(SuretyError::VoterNotActive(id("airline-2")))
    );

    protocol.fund_airline(&id("airline-2"), 10 * UNIT).unwrap();
    let outcome = protocol.vote_airline(&id("airline-2"), &fifth).unwrap();
    assert!(outcome.is_registered());
    assert!(protocol.is_airline(&fifth));
    assert!(!protocol.is_active_airline(&fifth));
}

#[test]
fn delayed_flight_credits_and_pays_the_passenger() {
    let accounts = ExternalAccounts::new();
    let mut protocol = deploy(&accounts);
    let airline = id("airline-1");
    let passenger = id("passenger-1");

    protocol.fund_airline(&airline, 10 * UNIT).unwrap();
    let flight = protocol
        .register_flight(&airline, "ND1309", DEPARTURE)
        .unwrap();
    assert_eq!(protocol.get_flight_key(&airline, "ND1309", DEPARTURE), flight);
    protocol
        .buy_insurance(&passenger, &flight, UNIT / 2)
        .unwrap();
    assert_eq!(protocol.view_insurance(&passenger, &flight), UNIT / 2);

    let oracles = register_oracles(&mut protocol, 20);
    let index = protocol
        .request_flight_status(&passenger, &airline, "ND1309", DEPARTURE)
        .unwrap();
    let response = OracleResponse {
        index,
        airline: airline.clone(),
        code: "ND1309".into(),
        timestamp: DEPARTURE,
        status: FlightStatus::LateAirline,
    };

    let mut last = None;
    for oracle in holders(&protocol, &oracles, index).iter().take(3) {
        last = Some(protocol.submit_oracle_response(oracle, &response).unwrap());
    }
    assert_eq!(
        last,
        Some(Submission::Finalized {
            status: FlightStatus::LateAirline,
            credited: 1
        })
    );
    assert_eq!(protocol.view_credits(&passenger), 3 * UNIT / 4);

    assert_eq!(protocol.withdraw(&passenger), Ok(3 * UNIT / 4));
    assert_eq!(protocol.view_credits(&passenger), 0);
    assert_eq!(accounts.balance(&passenger), 3 * UNIT / 4);

    let names: Vec<&str> = protocol
        .journal()
        .iter()
        .map(|e| e.payload.name())
        .filter(|n| *n == "flight_status_info" || *n == "passenger_credited")
        .collect();
    assert_eq!(names, vec!["flight_status_info", "passenger_credited"]);
}

#[test]
fn premium_above_cap_leaves_no_policy() {
    let mut protocol = deploy(&ExternalAccounts::new());
    let airline = id("airline-1");
    let passenger = id("passenger-1");
    protocol.fund_airline(&airline, 10 * UNIT).unwrap();
    let flight = protocol
        .register_flight(&airline, "ND1309", DEPARTURE)
        .unwrap();

    assert_eq!(
        protocol.buy_insurance(&passenger, &flight, 2 * UNIT),
        Err(SuretyError::AmountExceedsCap {
            amount: 2 * UNIT,
            cap: UNIT
        })
    );
    assert_eq!(protocol.view_insurance(&passenger, &flight), 0);
    assert!(protocol.insurees(&flight).is_empty());
    assert_eq!(protocol.treasury().balance(), 10 * UNIT);
}

#[test]
fn on_time_flight_closes_without_credit() {
    let mut protocol = deploy(&ExternalAccounts::new());
    let airline = id("airline-1");
    let passenger = id("passenger-1");
    protocol.fund_airline(&airline, 10 * UNIT).unwrap();
    let flight = protocol
        .register_flight(&airline, "ND1309", DEPARTURE)
        .unwrap();
    protocol.buy_insurance(&passenger, &flight, UNIT).unwrap();
    let oracles = register_oracles(&mut protocol, 20);

    let index = protocol
        .request_flight_status(&passenger, &airline, "ND1309", DEPARTURE)
        .unwrap();
    let response = OracleResponse {
        index,
        airline: airline.clone(),
        code: "ND1309".into(),
        timestamp: DEPARTURE,
        status: FlightStatus::OnTime,
    };
    for oracle in holders(&protocol, &oracles, index).iter().take(3) {
        protocol.submit_oracle_response(oracle, &response).unwrap();
    }

    assert_eq!(protocol.flight_status(&flight), Ok(FlightStatus::OnTime));
    assert_eq!(protocol.view_credits(&passenger), 0);
    assert_eq!(
        protocol.withdraw(&passenger),
        Err(SuretyError::NoCredit(passenger.clone()))
    );
    assert!(matches!(
        protocol.request_flight_status(&passenger, &airline, "ND1309", DEPARTURE),
        Err(SuretyError::AlreadyResolved(_))
    ));
}

#[test]
fn unknown_consensus_leaves_flight_open_for_another_request() {
    let mut protocol = deploy(&ExternalAccounts::new());
    let airline = id("airline-1");
    protocol.fund_airline(&airline, 10 * UNIT).unwrap();
    let flight = protocol
        .register_flight(&airline, "ND1309", DEPARTURE)
        .unwrap();
    let oracles = register_oracles(&mut protocol, 20);

    let index = protocol
        .request_flight_status(&airline, &airline, "ND1309", DEPARTURE)
        .unwrap();
    let response = OracleResponse {
        index,
        airline: airline.clone(),
        code: "ND1309".into(),
        timestamp: DEPARTURE,
        status: FlightStatus::Unknown,
    };
    for oracle in holders(&protocol, &oracles, index).iter().take(3) {
        protocol.submit_oracle_response(oracle, &response).unwrap();
    }

    assert_eq!(protocol.flight_status(&flight), Ok(FlightStatus::Unknown));
    assert!(protocol
        .request_flight_status(&airline, &airline, "ND1309", DEPARTURE)
        .is_ok());
}

#[tokio::test]
async fn runtime_streams_status_requests() {
    let protocol = deploy(&ExternalAccounts::new());
    let runtime = LedgerRuntime::new(protocol);
    let mut events = runtime.subscribe();
    let airline = id("airline-1");

    runtime
        .execute(|p| {
            p.fund_airline(&airline, 10 * UNIT)?;
            p.register_flight(&airline, "ND1309", DEPARTURE)?;
            p.request_flight_status(&airline, &airline, "ND1309", DEPARTURE)
        })
        .await
        .unwrap();

    let mut requested = None;
    while let Ok(event) = events.try_recv() {
        if let EventPayload::StatusRequested { code, .. } = event.payload {
            requested = Some(code);
        }
    }
    assert_eq!(requested.as_deref(), Some("ND1309"));
}
