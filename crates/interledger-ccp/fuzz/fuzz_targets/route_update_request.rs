#![no_main]
use interledger_ccp::packet::{RouteUpdateRequest, CCP_UPDATE_DESTINATION, PEER_PROTOCOL_CONDITION};
use interledger_packet::PrepareBuilder;
use libfuzzer_sys::fuzz_target;
use std::convert::TryFrom;
use std::time::{Duration, SystemTime};

fuzz_target!(|data: &[u8]| {
    let prepare = PrepareBuilder {
        amount: 0,
        expires_at: SystemTime::now() + Duration::from_secs(30),
        execution_condition: &PEER_PROTOCOL_CONDITION,
        destination: CCP_UPDATE_DESTINATION.clone(),
        data,
    }
    .build();
    let _ = RouteUpdateRequest::try_from(&prepare);
});
