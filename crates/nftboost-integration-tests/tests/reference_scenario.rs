//! Integration test: the boosted reward reference scenario.
//!
//! 1. Alice deposits 1000 tokens and holds 3 NFTs of a collection with
//!    beta 0.1 and a 50% share
//! 2. The exchange rate grows by 10%
//! 3. Preview reports 1000 * 10% * 50% * (1 + 3 * 0.1) = 65 tokens
//! 4. Claiming pays exactly the previewed amount
//! 5. An immediate second claim pays nothing

use nftboost_integration_tests::{delta, Harness, ALICE, APES, BOB, PUNKS, UNIT};
use nftboost_rewards::ClaimSimulationPolicy;
use nftboost_types::events::{ClaimTarget, RewardsEvent};

#[test]
fn boosted_reward_preview_then_claim() {
    let mut harness = Harness::new(ClaimSimulationPolicy::Apply).expect("harness");
    harness.fund(1_000 * UNIT);

    // =========================================================
    // Step 1: Deposit with 3 NFTs at index 1.0
    // =========================================================
    let receipt = harness
        .submit(ALICE, vec![delta(PUNKS, 100, 3, 1_000)])
        .expect("deposit batch");
    assert_eq!(receipt.nonce, 0);
    assert_eq!(harness.controller.active_collections(&ALICE), vec![PUNKS]);

    // =========================================================
    // Step 2: Exchange rate +10%
    // =========================================================
    harness.accrue_bps(1_000);

    // =========================================================
    // Step 3: Preview
    // =========================================================
    let preview = harness
        .controller
        .preview_rewards(&ALICE, &[PUNKS], &[])
        .expect("preview");
    assert_eq!(preview.total, 65 * UNIT, "1000 * 10% * 50% * 1.3 = 65");
    assert_eq!(preview.collections[0].projected_nft_balance, 3);
    assert_eq!(preview.collections[0].projected_balance, 1_000 * UNIT);
    assert_eq!(
        harness.controller.stored_index(),
        UNIT,
        "preview must not persist the index"
    );

    // =========================================================
    // Step 4: Claim
    // =========================================================
    let paid = harness.claim(ALICE, 200, PUNKS).expect("claim");
    assert_eq!(paid, preview.total);
    assert_eq!(harness.controller.yield_source().paid_to(&ALICE), 65 * UNIT);

    let state = harness.controller.user_state(&ALICE, &PUNKS);
    assert_eq!(state.accrued_reward, 0);
    assert_eq!(state.last_reward_index, UNIT + UNIT / 10);
    assert_eq!(state.last_update_block, 200);

    let events = harness.controller.drain_events();
    let claimed = events
        .iter()
        .find(|record| matches!(record.event, RewardsEvent::RewardsClaimed { .. }))
        .expect("claim event");
    assert_eq!(
        claimed.event,
        RewardsEvent::RewardsClaimed {
            user: ALICE,
            target: ClaimTarget::Collection { collection: PUNKS },
            amount: 65 * UNIT,
        }
    );
    assert!(!events
        .iter()
        .any(|record| matches!(record.event, RewardsEvent::RewardClaimCapped { .. })));

    let json = serde_json::to_value(claimed).expect("serialize claim event");
    assert_eq!(json["block"], 200);
    assert_eq!(
        json["event"]["rewards_claimed"]["amount"],
        "65000000000000000000",
        "amounts travel as decimal strings"
    );
    assert_eq!(
        json["event"]["rewards_claimed"]["target"]["collection"]["collection"],
        "c1".repeat(32)
    );

    // =========================================================
    // Step 5: Back-to-back claim pays zero
    // =========================================================
    let second = harness.claim(ALICE, 200, PUNKS).expect("second claim");
    assert_eq!(second, 0);
    assert_eq!(harness.controller.yield_source().paid_to(&ALICE), 65 * UNIT);
}

#[test]
fn unboosted_holder_earns_base_share_only() {
    let mut harness = Harness::new(ClaimSimulationPolicy::Apply).expect("harness");
    harness.fund(1_000 * UNIT);
    harness
        .submit(BOB, vec![delta(APES, 10, 0, 1_000)])
        .expect("deposit");
    harness.accrue_bps(1_000);

    assert_eq!(harness.claim(BOB, 20, APES).expect("claim"), 50 * UNIT);
}

#[test]
fn boost_is_capped_at_ten_times() {
    let mut harness = Harness::new(ClaimSimulationPolicy::Apply).expect("harness");
    harness.fund(10_000 * UNIT);
    // 200 NFTs at beta 0.1 would be 1 + 20; capped at 1 + 9.
    harness
        .submit(ALICE, vec![delta(PUNKS, 10, 200, 1_000)])
        .expect("deposit");
    harness.accrue_bps(1_000);

    let preview = harness
        .controller
        .preview_rewards(&ALICE, &[PUNKS], &[])
        .expect("preview");
    assert_eq!(preview.total, 500 * UNIT, "50 base * 10x cap");
}

#[test]
fn zero_index_growth_earns_nothing() {
    let mut harness = Harness::new(ClaimSimulationPolicy::Apply).expect("harness");
    harness.fund(1_000 * UNIT);
    harness
        .submit(ALICE, vec![delta(PUNKS, 10, 5, 1_000)])
        .expect("deposit");
    harness
        .submit(ALICE, vec![delta(PUNKS, 20, 1, 500)])
        .expect("top up");

    assert_eq!(harness.claim_all(ALICE, 30).expect("claim"), 0);
}

#[test]
fn multi_collection_claim_all() {
    let mut harness = Harness::new(ClaimSimulationPolicy::Apply).expect("harness");
    harness.fund(1_000 * UNIT);
    harness
        .submit_multi(
            vec![ALICE, ALICE],
            vec![delta(PUNKS, 10, 3, 1_000), delta(APES, 10, 0, 1_000)],
        )
        .expect("batch");
    harness.accrue_bps(1_000);

    let preview = harness
        .controller
        .preview_rewards(&ALICE, &[PUNKS, APES], &[])
        .expect("preview");
    assert_eq!(preview.total, 115 * UNIT);

    let paid = harness.claim_all(ALICE, 20).expect("claim all");
    assert_eq!(paid, 115 * UNIT);
}
