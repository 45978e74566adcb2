//! Span and logging helpers for packets flowing through the connector.

use crate::{AccountId, IlpResult};

use interledger_packet::Prepare;
use std::str;
use tracing::{debug_span, error_span, info, Span};
use uuid::Uuid;

/// Span wrapping the handling of one incoming Prepare. A fresh `request.id`
/// is only added when no enclosing span already carries one, so ids
/// propagated from elsewhere are kept.
pub fn incoming_span(from: &AccountId, prepare: &Prepare) -> Span {
    if Span::current().has_field("request.id") {
        error_span!(
            "incoming",
            prepare.destination = %prepare.destination(),
            prepare.amount = prepare.amount(),
            from.id = %from,
        )
    } else {
        error_span!(
            "incoming",
            request.id = %Uuid::new_v4(),
            prepare.destination = %prepare.destination(),
            prepare.amount = prepare.amount(),
            from.id = %from,
        )
    }
}

/// Span wrapping the forwarding of a Prepare to the next hop.
pub fn forwarding_span(to: &AccountId) -> Span {
    error_span!("forwarding", to.id = %to)
}

/// Logs the outcome of a Prepare.
pub fn trace_response(result: &IlpResult) {
    match result {
        Ok(fulfill) => {
            debug_span!("", fulfillment = %hex::encode(fulfill.fulfillment())).in_scope(|| {
                info!(result = "fulfill");
            })
        }
        Err(reject) => {
            let triggered_by = reject
                .triggered_by()
                .map(|address| address.to_string())
                .unwrap_or_default();
            debug_span!("",
                reject.code = %reject.code(),
                reject.message = %str::from_utf8(reject.message()).unwrap_or_default(),
                reject.triggered_by = %triggered_by,
            )
            .in_scope(|| {
                info!(result = "reject");
            })
        }
    }
}
