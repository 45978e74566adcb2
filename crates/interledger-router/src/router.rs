use crate::{LinkRegistry, RouteResolver};

use std::sync::Arc;

use async_trait::async_trait;
use interledger_packet::{ErrorCode, Prepare};
use interledger_service::{trace::forwarding_span, AccountSettings, IlpResult};
use interledger_service_util::{PacketForwarder, PacketRejector};
use tracing::{debug, error, Instrument};

/// # Router
///
/// Picks the next hop for a Prepare and sends it over that account's link.
///
/// - `F02` when no resolver knows the destination, or the only route leads
///   back to the account the packet came from
/// - `T01` when the next hop has no link, the link is not connected, or the
///   link fails to deliver the packet
#[derive(Clone)]
pub struct Router {
    resolvers: Vec<Arc<dyn RouteResolver>>,
    links: LinkRegistry,
    rejector: PacketRejector,
}

impl Router {
    pub fn new(
        resolvers: Vec<Arc<dyn RouteResolver>>,
        links: LinkRegistry,
        rejector: PacketRejector,
    ) -> Self {
        Router {
            resolvers,
            links,
            rejector,
        }
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }
}

#[async_trait]
impl PacketForwarder for Router {
    async fn forward(&self, source_account: &AccountSettings, prepare: Prepare) -> IlpResult {
        let destination = prepare.destination();
        let next_hop = self
            .resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(destination));

        let next_hop = match next_hop {
            Some(next_hop) => next_hop,
            None => {
                return Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::F02_UNREACHABLE,
                    &format!("No route found for destination {}", destination),
                ))
            }
        };
        if next_hop == source_account.id {
            return Err(self.rejector.reject(
                &source_account.id,
                &prepare,
                ErrorCode::F02_UNREACHABLE,
                "Refusing to route a packet back to the account it came from",
            ));
        }

        let link = match self.links.get(&next_hop) {
            Some(link) if link.is_connected() => link,
            Some(_) => {
                return Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::T01_PEER_UNREACHABLE,
                    &format!("Link for account {} is not connected", next_hop),
                ))
            }
            None => {
                return Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::T01_PEER_UNREACHABLE,
                    &format!("No link for account {}", next_hop),
                ))
            }
        };

        debug!("Forwarding packet to {}", next_hop);
        let forwarded = prepare.clone();
        match link
            .send_packet(forwarded)
            .instrument(forwarding_span(&next_hop))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                error!("Error sending packet to {}: {}", next_hop, err);
                Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::T01_PEER_UNREACHABLE,
                    &format!("Unable to reach peer {}", next_hop),
                ))
            }
        }
    }
}
