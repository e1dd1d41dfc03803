use std::collections::VecDeque;

use ethers_core::types::Address;
use tracing::{debug, info};

use crate::{
    accumulator::{hash, LaneProof},
    lanes::LaneError,
    proof::{MessageDispatch, ProofVerifier},
    types::{DeliveredMessages, InboundLaneData, LaneId, Message, MessageDispatched, OutboundLaneData},
    verifier::LightClientVerifier,
};

/// The receiver-side lane state machine.
///
/// Accepts proven outbound-lane snapshots and dispatches the pending
/// messages to their target applications in nonce order. Dispatch is
/// at-most-once: a failing application consumes its nonce with
/// `dispatched = false`, and re-submitting an already-processed range is a
/// no-op.
#[derive(Debug, Clone)]
pub struct InboundLane {
    lane: LaneId,
    last_confirmed_nonce: u64,
    last_delivered_nonce: u64,
    /// Delivery runs not yet confirmed back to the sending chain
    relayers: VecDeque<DeliveredMessages>,
}

impl InboundLane {
    /// Instantiate an empty inbound lane
    pub fn new(lane: LaneId) -> Self {
        Self {
            lane,
            last_confirmed_nonce: 0,
            last_delivered_nonce: 0,
            relayers: VecDeque::new(),
        }
    }

    /// This lane's identity
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Highest nonce known confirmed on the sending side
    pub fn last_confirmed_nonce(&self) -> u64 {
        self.last_confirmed_nonce
    }

    /// Highest nonce dispatched on this lane
    pub fn last_delivered_nonce(&self) -> u64 {
        self.last_delivered_nonce
    }

    /// The current lane snapshot; its hash is this lane's committer leaf
    pub fn data(&self) -> InboundLaneData {
        InboundLaneData {
            last_confirmed_nonce: self.last_confirmed_nonce,
            last_delivered_nonce: self.last_delivered_nonce,
            relayers: self.relayers.iter().cloned().collect(),
        }
    }

    /// Deliver messages from a proven outbound-lane snapshot.
    ///
    /// The snapshot (and through its stubs, `payloads`) must verify against
    /// the light client's current message root. Nonces at or below
    /// `last_delivered_nonce` are skipped; the rest dispatch in ascending
    /// order through `dispatcher`, each outcome recorded without aborting
    /// the batch. Returns one event per newly processed nonce.
    #[allow(clippy::too_many_arguments)]
    pub fn receive_messages_proof<V: ProofVerifier, D: MessageDispatch>(
        &mut self,
        light_client: &LightClientVerifier,
        verifier: &V,
        outbound: &OutboundLaneData,
        payloads: &[Vec<u8>],
        proof: &LaneProof,
        relayer: Address,
        dispatcher: &mut D,
        dispatch_budget: u64,
    ) -> Result<Vec<MessageDispatched>, LaneError> {
        let root = light_client.message_root();
        if !verifier.verify_membership(root, self.lane.bridged_lane_pos, outbound.hash(), proof) {
            return Err(LaneError::InvalidProof);
        }
        if outbound.latest_generated_nonce < self.last_delivered_nonce {
            return Err(LaneError::NonceGap {
                snapshot_latest: outbound.latest_generated_nonce,
                delivered: self.last_delivered_nonce,
            });
        }
        // a sender cannot have seen confirmations for nonces this lane
        // never dispatched
        if outbound.latest_received_nonce > self.last_delivered_nonce {
            return Err(LaneError::InvalidProof);
        }
        if payloads.len() != outbound.messages.len() {
            return Err(LaneError::InvalidProof);
        }
        // stubs must be the contiguous window ending at the snapshot edge
        let mut expected = outbound.latest_received_nonce;
        for (stub, payload) in outbound.messages.iter().zip(payloads) {
            expected += 1;
            if stub.nonce != expected || hash(payload) != stub.payload_hash {
                return Err(LaneError::InvalidProof);
            }
        }

        // the snapshot also carries the sender's view of confirmations;
        // fold it in and drop delivery runs it covers
        let confirmed = outbound
            .latest_received_nonce
            .min(self.last_delivered_nonce);
        if confirmed > self.last_confirmed_nonce {
            self.last_confirmed_nonce = confirmed;
            while self
                .relayers
                .front()
                .map(|run| run.end <= confirmed)
                .unwrap_or(false)
            {
                self.relayers.pop_front();
            }
        }

        let begin = self.last_delivered_nonce + 1;
        let mut events = Vec::new();
        let mut dispatch_results = Vec::new();
        for (stub, payload) in outbound.messages.iter().zip(payloads) {
            if stub.nonce <= self.last_delivered_nonce {
                continue;
            }
            let message = Message {
                nonce: stub.nonce,
                target: stub.target,
                encoded_payload: payload.clone(),
            };
            let (dispatched, return_data) =
                match dispatcher.dispatch(&self.lane, &message, dispatch_budget) {
                    Ok(data) => (true, data),
                    Err(err) => {
                        debug!(lane = %self.lane, nonce = stub.nonce, %err, "Dispatch failed");
                        (false, Vec::new())
                    }
                };
            dispatch_results.push(dispatched);
            events.push(MessageDispatched {
                lane: self.lane,
                nonce: stub.nonce,
                target: stub.target,
                dispatched,
                return_data,
            });
            self.last_delivered_nonce = stub.nonce;
        }

        if !dispatch_results.is_empty() {
            self.relayers.push_back(DeliveredMessages {
                relayer,
                begin,
                end: self.last_delivered_nonce,
                dispatch_results,
            });
            info!(
                lane = %self.lane,
                begin,
                end = self.last_delivered_nonce,
                ?relayer,
                "Messages dispatched"
            );
        }
        Ok(events)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        proof::DispatchError,
        types::{AuthoritySet, Commitment, CommitmentPayload, MessageStub},
    };
    use ethers_core::types::H256;

    fn lane_id() -> LaneId {
        LaneId {
            this_chain_pos: 1,
            this_lane_pos: 1,
            bridged_chain_pos: 0,
            bridged_lane_pos: 0,
        }
    }

    /// Records every payload it sees; fails nonces listed in `fail_on`
    #[derive(Default)]
    struct RecordingApp {
        seen: Vec<u64>,
        fail_on: Vec<u64>,
    }

    impl MessageDispatch for RecordingApp {
        fn dispatch(
            &mut self,
            _lane: &LaneId,
            message: &Message,
            _budget: u64,
        ) -> Result<Vec<u8>, DispatchError> {
            self.seen.push(message.nonce);
            if self.fail_on.contains(&message.nonce) {
                Err(DispatchError::new("application reverted"))
            } else {
                Ok(vec![])
            }
        }
    }

    struct SoloLaneVerifier;

    impl ProofVerifier for SoloLaneVerifier {
        fn verify_membership(
            &self,
            root: H256,
            _lane_pos: u32,
            leaf: H256,
            _proof: &LaneProof,
        ) -> bool {
            root == leaf
        }
    }

    fn anchored_on(outbound: &OutboundLaneData) -> LightClientVerifier {
        LightClientVerifier::new(
            Commitment {
                payload: CommitmentPayload {
                    state_root: H256::zero(),
                    message_root: outbound.hash(),
                },
                block_number: 0,
                validator_set_id: 0,
            },
            AuthoritySet::of_members(0, &[]),
        )
    }

    fn snapshot(received: u64, payloads: &[Vec<u8>]) -> OutboundLaneData {
        OutboundLaneData {
            latest_received_nonce: received,
            latest_generated_nonce: received + payloads.len() as u64,
            messages: payloads
                .iter()
                .enumerate()
                .map(|(i, p)| MessageStub {
                    nonce: received + 1 + i as u64,
                    target: H256::repeat_byte(0x0a),
                    payload_hash: hash(p),
                })
                .collect(),
        }
    }

    fn proof() -> LaneProof {
        LaneProof {
            lane_pos: 0,
            branch: vec![],
        }
    }

    #[test]
    fn dispatches_in_order_and_is_idempotent() {
        let mut lane = InboundLane::new(lane_id());
        let payloads = vec![vec![1], vec![2], vec![3]];
        let outbound = snapshot(0, &payloads);
        let light_client = anchored_on(&outbound);
        let mut app = RecordingApp::default();
        let relayer = Address::repeat_byte(0x33);

        let events = lane
            .receive_messages_proof(
                &light_client,
                &SoloLaneVerifier,
                &outbound,
                &payloads,
                &proof(),
                relayer,
                &mut app,
                0,
            )
            .unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.dispatched));
        assert_eq!(app.seen, vec![1, 2, 3]);
        assert_eq!(lane.last_delivered_nonce(), 3);
        assert_eq!(lane.data().relayers.len(), 1);

        // second submission of the same proof: no events, no new records
        let replay = lane
            .receive_messages_proof(
                &light_client,
                &SoloLaneVerifier,
                &outbound,
                &payloads,
                &proof(),
                relayer,
                &mut app,
                0,
            )
            .unwrap();
        assert!(replay.is_empty());
        assert_eq!(app.seen.len(), 3);
        assert_eq!(lane.data().relayers.len(), 1);
    }

    #[test]
    fn failed_dispatch_consumes_the_nonce() {
        let mut lane = InboundLane::new(lane_id());
        let payloads = vec![vec![1], vec![2]];
        let outbound = snapshot(0, &payloads);
        let light_client = anchored_on(&outbound);
        let mut app = RecordingApp {
            seen: vec![],
            fail_on: vec![2],
        };

        let events = lane
            .receive_messages_proof(
                &light_client,
                &SoloLaneVerifier,
                &outbound,
                &payloads,
                &proof(),
                Address::repeat_byte(0x33),
                &mut app,
                0,
            )
            .unwrap();
        assert_eq!(
            events.iter().map(|e| e.dispatched).collect::<Vec<_>>(),
            vec![true, false]
        );
        // the nonce advanced past the failure
        assert_eq!(lane.last_delivered_nonce(), 2);
        assert_eq!(
            lane.data().relayers[0].dispatch_results,
            vec![true, false]
        );
    }

    #[test]
    fn tampered_payload_rejected() {
        let mut lane = InboundLane::new(lane_id());
        let payloads = vec![vec![1]];
        let outbound = snapshot(0, &payloads);
        let light_client = anchored_on(&outbound);
        let mut app = RecordingApp::default();

        let tampered = vec![vec![9]];
        assert!(matches!(
            lane.receive_messages_proof(
                &light_client,
                &SoloLaneVerifier,
                &outbound,
                &tampered,
                &proof(),
                Address::repeat_byte(0x33),
                &mut app,
                0,
            ),
            Err(LaneError::InvalidProof)
        ));
        assert!(app.seen.is_empty());
        assert_eq!(lane.last_delivered_nonce(), 0);
    }

    #[test]
    fn nonce_gap_rejected() {
        let mut lane = InboundLane::new(lane_id());
        // pretend the lane already delivered 5
        let payloads = vec![vec![1]];
        let outbound = snapshot(0, &payloads);
        let light_client = anchored_on(&outbound);
        let mut app = RecordingApp::default();
        lane.receive_messages_proof(
            &light_client,
            &SoloLaneVerifier,
            &outbound,
            &payloads,
            &proof(),
            Address::repeat_byte(0x33),
            &mut app,
            0,
        )
        .unwrap();

        let regressed = OutboundLaneData {
            latest_received_nonce: 0,
            latest_generated_nonce: 0,
            messages: vec![],
        };
        let anchor = anchored_on(&regressed);
        assert!(matches!(
            lane.receive_messages_proof(
                &anchor,
                &SoloLaneVerifier,
                &regressed,
                &[],
                &proof(),
                Address::repeat_byte(0x33),
                &mut app,
                0,
            ),
            Err(LaneError::NonceGap { .. })
        ));
    }

    #[test]
    fn snapshot_claiming_unseen_confirmations_rejected() {
        let mut lane = InboundLane::new(lane_id());
        let mut app = RecordingApp::default();
        // the sender claims nonces 1..=2 were already confirmed, but this
        // lane never dispatched anything
        let payloads = vec![vec![3]];
        let outbound = snapshot(2, &payloads);
        let light_client = anchored_on(&outbound);
        assert!(matches!(
            lane.receive_messages_proof(
                &light_client,
                &SoloLaneVerifier,
                &outbound,
                &payloads,
                &proof(),
                Address::repeat_byte(0x33),
                &mut app,
                0,
            ),
            Err(LaneError::InvalidProof)
        ));
        assert!(app.seen.is_empty());
        assert_eq!(lane.last_delivered_nonce(), 0);
    }

    #[test]
    fn confirmation_piggyback_prunes_runs() {
        let mut lane = InboundLane::new(lane_id());
        let payloads = vec![vec![1], vec![2]];
        let outbound = snapshot(0, &payloads);
        let light_client = anchored_on(&outbound);
        let mut app = RecordingApp::default();
        let relayer = Address::repeat_byte(0x33);
        lane.receive_messages_proof(
            &light_client,
            &SoloLaneVerifier,
            &outbound,
            &payloads,
            &proof(),
            relayer,
            &mut app,
            0,
        )
        .unwrap();
        assert_eq!(lane.data().relayers.len(), 1);

        // next snapshot says the sender has seen our deliveries up to 2
        let next_payloads = vec![vec![3]];
        let next = snapshot(2, &next_payloads);
        let anchor = anchored_on(&next);
        lane.receive_messages_proof(
            &anchor,
            &SoloLaneVerifier,
            &next,
            &next_payloads,
            &proof(),
            relayer,
            &mut app,
            0,
        )
        .unwrap();
        assert_eq!(lane.last_confirmed_nonce(), 2);
        // the confirmed run dropped, only the new one remains
        assert_eq!(lane.data().relayers.len(), 1);
        assert_eq!(lane.data().relayers[0].begin, 3);
    }
}
