use std::collections::{HashSet, VecDeque};

use ethers_core::types::{Address, H256, U256};
use tracing::info;

use crate::{
    accumulator::LaneProof,
    fee_market::FeeMarket,
    lanes::LaneError,
    proof::ProofVerifier,
    types::{
        InboundLaneData, LaneId, Message, MessageAccepted, MessagesDelivered, OutboundLaneData,
        MAX_PENDING_MESSAGES,
    },
    verifier::LightClientVerifier,
};

/// The sender-side lane state machine.
///
/// Accepts outgoing messages from relied callers, assigns strictly
/// increasing nonces, and finalizes messages once a proven inbound snapshot
/// confirms their delivery.
#[derive(Debug, Clone)]
pub struct OutboundLane {
    lane: LaneId,
    /// Addresses with the send capability; wards administer the list
    wards: HashSet<Address>,
    latest_received_nonce: u64,
    latest_generated_nonce: u64,
    /// Messages in `(latest_received_nonce, latest_generated_nonce]`
    messages: VecDeque<Message>,
}

impl OutboundLane {
    /// Instantiate a lane with `deployer` as the first ward
    pub fn new(lane: LaneId, deployer: Address) -> Self {
        Self {
            lane,
            wards: HashSet::from([deployer]),
            latest_received_nonce: 0,
            latest_generated_nonce: 0,
            messages: VecDeque::new(),
        }
    }

    /// This lane's identity
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Highest nonce confirmed delivered
    pub fn latest_received_nonce(&self) -> u64 {
        self.latest_received_nonce
    }

    /// Highest nonce generated
    pub fn latest_generated_nonce(&self) -> u64 {
        self.latest_generated_nonce
    }

    /// Grant the send capability. Wards only.
    pub fn rely(&mut self, caller: Address, usr: Address) -> Result<(), LaneError> {
        self.auth(caller)?;
        self.wards.insert(usr);
        Ok(())
    }

    /// Revoke the send capability. Wards only.
    pub fn deny(&mut self, caller: Address, usr: Address) -> Result<(), LaneError> {
        self.auth(caller)?;
        self.wards.remove(&usr);
        Ok(())
    }

    fn auth(&self, caller: Address) -> Result<(), LaneError> {
        if self.wards.contains(&caller) {
            Ok(())
        } else {
            Err(LaneError::Unauthorized(caller))
        }
    }

    /// The current lane snapshot; its hash is this lane's committer leaf
    pub fn data(&self) -> OutboundLaneData {
        OutboundLaneData {
            latest_received_nonce: self.latest_received_nonce,
            latest_generated_nonce: self.latest_generated_nonce,
            messages: self.messages.iter().map(Message::to_stub).collect(),
        }
    }

    /// The stored message at `nonce`, while still unconfirmed
    pub fn message(&self, nonce: u64) -> Option<&Message> {
        self.messages.iter().find(|m| m.nonce == nonce)
    }

    /// Payload bytes for every pending message, nonce order
    pub fn pending_payloads(&self) -> Vec<Vec<u8>> {
        self.messages
            .iter()
            .map(|m| m.encoded_payload.clone())
            .collect()
    }

    /// Accept a message for delivery to `target` on the bridged chain.
    ///
    /// Assigns the next nonce and opens a fee-market order for it; the
    /// lane state is untouched unless assignment succeeds. The unconfirmed
    /// window is capped at `MAX_PENDING_MESSAGES` so every confirmable
    /// range fits one results bitmap.
    pub fn send_message(
        &mut self,
        caller: Address,
        target: H256,
        payload: Vec<u8>,
        fee_market: &mut FeeMarket,
        now: u64,
    ) -> Result<MessageAccepted, LaneError> {
        self.auth(caller)?;
        if self.latest_generated_nonce == u64::MAX {
            return Err(LaneError::Overflow);
        }
        let pending = self.latest_generated_nonce - self.latest_received_nonce;
        if pending >= MAX_PENDING_MESSAGES {
            return Err(LaneError::LaneFull { pending });
        }
        let nonce = self.latest_generated_nonce + 1;
        fee_market.assign_order(self.lane, nonce, now)?;

        self.messages.push_back(Message {
            nonce,
            target,
            encoded_payload: payload.clone(),
        });
        self.latest_generated_nonce = nonce;
        info!(lane = %self.lane, nonce, "Message accepted");
        Ok(MessageAccepted { nonce, payload })
    }

    /// Confirm delivery from a proven inbound-lane snapshot.
    ///
    /// The snapshot must verify against the light client's current message
    /// root. A snapshot at or behind `latest_received_nonce` is an
    /// idempotent no-op returning an empty range. On success the covered
    /// messages are pruned and each covered fee-market order settles,
    /// crediting the relayer that delivered the nonce and the caller that
    /// confirmed it.
    pub fn receive_messages_delivery_proof<V: ProofVerifier>(
        &mut self,
        light_client: &LightClientVerifier,
        verifier: &V,
        inbound: &InboundLaneData,
        proof: &LaneProof,
        confirming_relayer: Address,
        fee_market: &mut FeeMarket,
        now: u64,
    ) -> Result<MessagesDelivered, LaneError> {
        let root = light_client.message_root();
        if !verifier.verify_membership(root, self.lane.bridged_lane_pos, inbound.hash(), proof) {
            return Err(LaneError::InvalidProof);
        }

        let end = inbound.last_delivered_nonce;
        if end <= self.latest_received_nonce {
            return Ok(MessagesDelivered {
                begin: self.latest_received_nonce + 1,
                end: self.latest_received_nonce,
                results_bitmap: U256::zero(),
            });
        }
        if end > self.latest_generated_nonce {
            return Err(LaneError::InvalidProof);
        }

        let begin = self.latest_received_nonce + 1;
        // plan the whole settlement before touching any state
        let mut plan = Vec::with_capacity((end - begin + 1) as usize);
        for nonce in begin..=end {
            let (relayer, dispatched) =
                inbound.delivery_of(nonce).ok_or(LaneError::InvalidProof)?;
            if fee_market.order(nonce).is_none() {
                return Err(LaneError::FeeMarket(
                    crate::fee_market::FeeMarketError::UnknownOrder(nonce),
                ));
            }
            plan.push((nonce, relayer, dispatched));
        }

        let mut results_bitmap = U256::zero();
        for (i, (nonce, relayer, dispatched)) in plan.into_iter().enumerate() {
            if dispatched {
                results_bitmap = results_bitmap | (U256::one() << i);
            }
            fee_market.settle(nonce, relayer, confirming_relayer, 1, now)?;
        }

        self.latest_received_nonce = end;
        while self
            .messages
            .front()
            .map(|m| m.nonce <= end)
            .unwrap_or(false)
        {
            self.messages.pop_front();
        }

        info!(lane = %self.lane, begin, end, "Messages delivered");
        Ok(MessagesDelivered {
            begin,
            end,
            results_bitmap,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fee_market::{FeeMarketConfig, FeeMarketError},
        types::{AuthoritySet, Commitment, CommitmentPayload, DeliveredMessages},
    };

    fn lane_id() -> LaneId {
        LaneId {
            this_chain_pos: 0,
            this_lane_pos: 0,
            bridged_chain_pos: 1,
            bridged_lane_pos: 1,
        }
    }

    fn market() -> FeeMarket {
        let mut market = FeeMarket::new(FeeMarketConfig {
            vault: Address::zero(),
            collateral_per_order: U256::from(10),
            assigned_relayers_number: 1,
            relay_time: 100,
            slash_time: 200,
            delivery_share_percent: 80,
        });
        market
            .enroll(Address::repeat_byte(0x11), None, U256::from(10), U256::from(1000), 0)
            .unwrap();
        market
    }

    fn owner() -> Address {
        Address::repeat_byte(0xab)
    }

    #[test]
    fn nonces_are_strictly_increasing_without_gaps() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = market();
        for expect in 1..=5u64 {
            let accepted = lane
                .send_message(owner(), H256::zero(), vec![expect as u8], &mut market, 0)
                .unwrap();
            assert_eq!(accepted.nonce, expect);
        }
        assert_eq!(lane.latest_generated_nonce(), 5);
        assert_eq!(lane.data().messages.len(), 5);
    }

    #[test]
    fn unauthorized_sender_rejected() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = market();
        let intruder = Address::repeat_byte(0x99);
        assert!(matches!(
            lane.send_message(intruder, H256::zero(), vec![], &mut market, 0),
            Err(LaneError::Unauthorized(_))
        ));
        // rely grants the capability, deny revokes it
        lane.rely(owner(), intruder).unwrap();
        lane.send_message(intruder, H256::zero(), vec![], &mut market, 0)
            .unwrap();
        lane.deny(owner(), intruder).unwrap();
        assert!(matches!(
            lane.send_message(intruder, H256::zero(), vec![], &mut market, 0),
            Err(LaneError::Unauthorized(_))
        ));
        assert!(matches!(
            lane.rely(intruder, intruder),
            Err(LaneError::Unauthorized(_))
        ));
    }

    #[test]
    fn failed_order_assignment_leaves_lane_unchanged() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        // empty market: no relayers to assign
        let mut market = FeeMarket::new(FeeMarketConfig {
            vault: Address::zero(),
            collateral_per_order: U256::from(10),
            assigned_relayers_number: 1,
            relay_time: 100,
            slash_time: 200,
            delivery_share_percent: 80,
        });
        let before = lane.data();
        assert!(lane
            .send_message(owner(), H256::zero(), vec![1], &mut market, 0)
            .is_err());
        assert_eq!(lane.data(), before);
    }

    #[test]
    fn pending_window_caps_at_bitmap_width() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = FeeMarket::new(FeeMarketConfig {
            vault: Address::zero(),
            collateral_per_order: U256::from(10),
            assigned_relayers_number: 1,
            relay_time: 100,
            slash_time: 200,
            delivery_share_percent: 80,
        });
        market
            .enroll(Address::repeat_byte(0x11), None, U256::from(10), U256::from(100_000), 0)
            .unwrap();

        for _ in 0..MAX_PENDING_MESSAGES {
            lane.send_message(owner(), H256::zero(), vec![], &mut market, 0)
                .unwrap();
        }
        assert!(matches!(
            lane.send_message(owner(), H256::zero(), vec![], &mut market, 0),
            Err(LaneError::LaneFull { pending: 256 })
        ));

        // a full window confirms into a fully saturated bitmap, no bit lost
        let inbound = InboundLaneData {
            last_confirmed_nonce: 0,
            last_delivered_nonce: MAX_PENDING_MESSAGES,
            relayers: vec![DeliveredMessages {
                relayer: Address::repeat_byte(0x44),
                begin: 1,
                end: MAX_PENDING_MESSAGES,
                dispatch_results: vec![true; MAX_PENDING_MESSAGES as usize],
            }],
        };
        let light_client = anchored_on(&inbound);
        let proof = LaneProof {
            lane_pos: 1,
            branch: vec![],
        };
        let delivered = lane
            .receive_messages_delivery_proof(
                &light_client,
                &SoloLaneVerifier,
                &inbound,
                &proof,
                owner(),
                &mut market,
                10,
            )
            .unwrap();
        assert_eq!((delivered.begin, delivered.end), (1, MAX_PENDING_MESSAGES));
        assert_eq!(delivered.results_bitmap, U256::MAX);

        // confirmation reopens the window
        lane.send_message(owner(), H256::zero(), vec![], &mut market, 10)
            .unwrap();
    }

    #[test]
    fn out_of_band_settled_order_fails_whole_confirmation() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = market();
        for _ in 0..2 {
            lane.send_message(owner(), H256::zero(), vec![1], &mut market, 0)
                .unwrap();
        }
        // someone settles the second order directly
        market
            .settle(2, Address::repeat_byte(0x55), Address::repeat_byte(0x56), 1, 0)
            .unwrap();

        let deliverer = Address::repeat_byte(0x44);
        let inbound = InboundLaneData {
            last_confirmed_nonce: 0,
            last_delivered_nonce: 2,
            relayers: vec![DeliveredMessages {
                relayer: deliverer,
                begin: 1,
                end: 2,
                dispatch_results: vec![true, true],
            }],
        };
        let light_client = anchored_on(&inbound);
        let proof = LaneProof {
            lane_pos: 1,
            branch: vec![],
        };
        let lane_before = lane.data();
        let balance_before = market.balance_of(deliverer);
        assert!(matches!(
            lane.receive_messages_delivery_proof(
                &light_client,
                &SoloLaneVerifier,
                &inbound,
                &proof,
                owner(),
                &mut market,
                0,
            ),
            Err(LaneError::FeeMarket(FeeMarketError::UnknownOrder(2)))
        ));
        // nothing moved: not the lane, not order 1's rewards
        assert_eq!(lane.data(), lane_before);
        assert_eq!(market.balance_of(deliverer), balance_before);
        assert!(market.order(1).is_some());
    }

    #[test]
    fn stale_delivery_proof_is_idempotent_noop() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = market();
        lane.send_message(owner(), H256::zero(), vec![1], &mut market, 0)
            .unwrap();

        // snapshot claiming nothing new
        let inbound = InboundLaneData {
            last_confirmed_nonce: 0,
            last_delivered_nonce: 0,
            relayers: vec![],
        };
        let light_client = anchored_on(&inbound);
        let proof = LaneProof {
            lane_pos: 1,
            branch: vec![],
        };
        let delivered = lane
            .receive_messages_delivery_proof(
                &light_client,
                &SoloLaneVerifier,
                &inbound,
                &proof,
                owner(),
                &mut market,
                0,
            )
            .unwrap();
        assert!(delivered.is_empty());
        assert_eq!(lane.latest_received_nonce(), 0);
    }

    #[test]
    fn delivery_proof_confirms_and_prunes() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = market();
        for _ in 0..3 {
            lane.send_message(owner(), H256::zero(), vec![7], &mut market, 0)
                .unwrap();
        }

        let deliverer = Address::repeat_byte(0x44);
        let inbound = InboundLaneData {
            last_confirmed_nonce: 0,
            last_delivered_nonce: 3,
            relayers: vec![DeliveredMessages {
                relayer: deliverer,
                begin: 1,
                end: 3,
                dispatch_results: vec![true, false, true],
            }],
        };
        let light_client = anchored_on(&inbound);
        let proof = LaneProof {
            lane_pos: 1,
            branch: vec![],
        };
        let delivered = lane
            .receive_messages_delivery_proof(
                &light_client,
                &SoloLaneVerifier,
                &inbound,
                &proof,
                owner(),
                &mut market,
                10,
            )
            .unwrap();
        assert_eq!((delivered.begin, delivered.end), (1, 3));
        assert_eq!(delivered.results_bitmap, U256::from(0b101));
        assert_eq!(lane.latest_received_nonce(), 3);
        assert!(lane.data().messages.is_empty());
        // the delivering relayer earned the delivery share of each order
        assert!(market.balance_of(deliverer) > U256::zero());
    }

    #[test]
    fn overclaiming_snapshot_rejected_without_state_change() {
        let mut lane = OutboundLane::new(lane_id(), owner());
        let mut market = market();
        lane.send_message(owner(), H256::zero(), vec![1], &mut market, 0)
            .unwrap();

        let inbound = InboundLaneData {
            last_confirmed_nonce: 0,
            last_delivered_nonce: 5,
            relayers: vec![],
        };
        let light_client = anchored_on(&inbound);
        let proof = LaneProof {
            lane_pos: 1,
            branch: vec![],
        };
        let before = lane.data();
        assert!(matches!(
            lane.receive_messages_delivery_proof(
                &light_client,
                &SoloLaneVerifier,
                &inbound,
                &proof,
                owner(),
                &mut market,
                0,
            ),
            Err(LaneError::InvalidProof)
        ));
        assert_eq!(lane.data(), before);
    }

    /// Verifier for a single-lane chain whose message root is the lane
    /// data hash itself
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

    fn anchored_on(inbound: &InboundLaneData) -> LightClientVerifier {
        LightClientVerifier::new(
            Commitment {
                payload: CommitmentPayload {
                    state_root: H256::zero(),
                    message_root: inbound.hash(),
                },
                block_number: 0,
                validator_set_id: 0,
            },
            AuthoritySet::of_members(0, &[]),
        )
    }
}
