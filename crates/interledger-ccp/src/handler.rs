use crate::packet::{
    RouteControlRequest, RouteUpdateRequest, CCP_CONTROL_DESTINATION, CCP_RESPONSE,
    CCP_UPDATE_DESTINATION,
};
use crate::{CcpError, RouteBroadcaster};

use std::convert::TryFrom;
use std::sync::Arc;

use async_trait::async_trait;
use interledger_link::{LinkHandler, LinkId};
use interledger_packet::{ErrorCode, Prepare};
use interledger_service::{AccountId, IlpResult};
use interledger_service_util::{PacketRejector, PacketSwitch};
use tracing::{debug, error, warn};

/// Handler registered on every peer link. Route control and route update
/// messages go to that peer's CCP sender and receiver; everything else goes
/// to the packet switch.
pub struct CcpLinkHandler {
    account_id: AccountId,
    broadcaster: Arc<RouteBroadcaster>,
    packet_switch: PacketSwitch,
    rejector: PacketRejector,
}

impl CcpLinkHandler {
    pub fn new(
        account_id: AccountId,
        broadcaster: Arc<RouteBroadcaster>,
        packet_switch: PacketSwitch,
        rejector: PacketRejector,
    ) -> Self {
        CcpLinkHandler {
            account_id,
            broadcaster,
            packet_switch,
            rejector,
        }
    }

    fn reject(&self, prepare: &Prepare, err: CcpError) -> IlpResult {
        Err(self.rejector.reject(
            &self.account_id,
            prepare,
            ErrorCode::F00_BAD_REQUEST,
            &err.to_string(),
        ))
    }

    fn handle_route_control_request(&self, prepare: Prepare) -> IlpResult {
        let request = match RouteControlRequest::try_from(&prepare) {
            Ok(request) => request,
            Err(err) => return self.reject(&prepare, err.into()),
        };
        match self.broadcaster.ccp_sender(&self.account_id) {
            Some(sender) => {
                sender.handle_route_control_request(&request);
                Ok(CCP_RESPONSE.clone())
            }
            None => {
                warn!(
                    "Got route control request from {}, which we do not send routes to",
                    self.account_id
                );
                self.reject(&prepare, CcpError::NotRouting(self.account_id.clone()))
            }
        }
    }

    fn handle_route_update_request(&self, prepare: Prepare) -> IlpResult {
        let request = match RouteUpdateRequest::try_from(&prepare) {
            Ok(request) => request,
            Err(err) => return self.reject(&prepare, err.into()),
        };
        let receiver = match self.broadcaster.ccp_receiver(&self.account_id) {
            Some(receiver) => receiver,
            None => {
                warn!(
                    "Got route update from {}, which we do not accept routes from",
                    self.account_id
                );
                return self.reject(&prepare, CcpError::NotRouting(self.account_id.clone()));
            }
        };

        match self.broadcaster.handle_route_update_request(&receiver, request) {
            Ok(changed) => {
                debug!(
                    "Route update from {} changed {} prefixes",
                    self.account_id,
                    changed.len()
                );
                Ok(CCP_RESPONSE.clone())
            }
            Err(err @ CcpError::EpochGap { .. }) => {
                debug!("{}; asking {} to resend", err, self.account_id);
                let account_id = self.account_id.clone();
                tokio::spawn(async move {
                    if let Err(err) = receiver.send_route_control_request().await {
                        error!(
                            "Failed to send route control request to {}: {}",
                            account_id, err
                        );
                    }
                });
                self.reject(&prepare, err)
            }
            Err(err) => self.reject(&prepare, err),
        }
    }
}

#[async_trait]
impl LinkHandler for CcpLinkHandler {
    async fn handle_incoming_packet(&self, link_id: &LinkId, prepare: Prepare) -> IlpResult {
        let destination = prepare.destination();
        if destination == &*CCP_CONTROL_DESTINATION {
            debug!("Route control request on link {}", link_id);
            self.handle_route_control_request(prepare)
        } else if destination == &*CCP_UPDATE_DESTINATION {
            debug!("Route update request on link {}", link_id);
            self.handle_route_update_request(prepare)
        } else {
            self.packet_switch.switch_packet(&self.account_id, prepare).await
        }
    }
}
