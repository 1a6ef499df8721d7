mod common;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;
use vote_engine::client::{
    ClientError, DisplayedVote, Settlement, VotePhase, VoteReconciler, VoteTransport,
};
use vote_engine::error::ErrorCode;
use vote_engine::models::{ItemRef, ItemType, VoteIntent, VoteOutcome, VoteState};
use vote_engine::services::vote_service::VoteService;
use vote_engine::store::MemoryVoteStore;

use common::{counts, fast_settings, seeded_item};

/// Talks to the vote service directly, the way the HTTP layer would.
struct InProcess {
    votes: VoteService,
}

#[async_trait]
impl VoteTransport for InProcess {
    async fn cast_vote(&self, intent: &VoteIntent) -> Result<VoteOutcome, ClientError> {
        self.votes
            .cast_vote(intent.item, intent.user_id, intent.direction)
            .await
            .map_err(|e| ClientError::Server {
                code: e.code(),
                message: e.to_string(),
            })
    }
}

struct Failing {
    code: ErrorCode,
}

#[async_trait]
impl VoteTransport for Failing {
    async fn cast_vote(&self, _intent: &VoteIntent) -> Result<VoteOutcome, ClientError> {
        Err(ClientError::Server {
            code: self.code,
            message: "simulated failure".to_string(),
        })
    }
}

/// Holds every request until released, counting how many reached the wire.
struct Gated {
    release: Notify,
    calls: AtomicU32,
    outcome: VoteOutcome,
}

#[async_trait]
impl VoteTransport for Gated {
    async fn cast_vote(&self, _intent: &VoteIntent) -> Result<VoteOutcome, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(self.outcome.clone())
    }
}

/// Never answers the first request; later ones succeed with `outcome`.
struct StallsOnce {
    calls: AtomicU32,
    outcome: VoteOutcome,
}

#[async_trait]
impl VoteTransport for StallsOnce {
    async fn cast_vote(&self, _intent: &VoteIntent) -> Result<VoteOutcome, ClientError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::future::pending::<()>().await;
        }
        Ok(self.outcome.clone())
    }
}

fn post() -> ItemRef {
    ItemRef::new(ItemType::Post, Uuid::new_v4())
}

#[tokio::test]
async fn test_rollback_restores_exact_snapshot() {
    let reconciler = VoteReconciler::new(Failing {
        code: ErrorCode::Unavailable,
    });
    let item = post();
    let user = Uuid::new_v4();
    let before = DisplayedVote::new(12, 3, VoteState::Downvote);
    reconciler.track(item, user, before).await;

    let err = reconciler
        .vote(VoteIntent::new(item, user, VoteState::Upvote))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(reconciler.displayed(item, user).await, Some(before));
    assert_eq!(reconciler.phase(item, user).await, VotePhase::Idle);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retryable() {
    let reconciler = VoteReconciler::new(Failing {
        code: ErrorCode::NotFound,
    });
    let item = post();
    let user = Uuid::new_v4();

    let err = reconciler
        .vote(VoteIntent::new(item, user, VoteState::Downvote))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(
        reconciler.displayed(item, user).await,
        Some(DisplayedVote::default())
    );
}

#[tokio::test]
async fn test_server_answer_replaces_optimistic_guess() {
    let store = Arc::new(MemoryVoteStore::new());
    let item = seeded_item(&store, 5, 2).await;
    let user = Uuid::new_v4();
    let votes = VoteService::new(store.clone(), fast_settings());

    // Another device already upvoted; this client still shows the stale feed.
    votes.cast_vote(item, user, VoteState::Upvote).await.unwrap();

    let reconciler = VoteReconciler::new(InProcess { votes });
    reconciler
        .track(item, user, DisplayedVote::new(5, 2, VoteState::None))
        .await;

    let settlement = reconciler
        .vote(VoteIntent::new(item, user, VoteState::Upvote))
        .await
        .unwrap();

    // The client guessed "added" (6, 2); the server toggled the vote off.
    let authoritative = DisplayedVote::new(5, 2, VoteState::None);
    assert_eq!(settlement, Settlement::Committed(authoritative));
    assert_eq!(reconciler.displayed(item, user).await, Some(authoritative));
    assert_eq!(counts(&store, &item).await, (5, 2));
}

#[tokio::test]
async fn test_add_remove_switch_through_reconciler() {
    let store = Arc::new(MemoryVoteStore::new());
    let item = seeded_item(&store, 5, 2).await;
    let user = Uuid::new_v4();
    let reconciler = VoteReconciler::new(InProcess {
        votes: VoteService::new(store.clone(), fast_settings()),
    });
    reconciler
        .track(item, user, DisplayedVote::new(5, 2, VoteState::None))
        .await;

    let steps = [
        (VoteState::Upvote, (6, 2)),
        (VoteState::Upvote, (5, 2)),
        (VoteState::Downvote, (5, 3)),
        (VoteState::Upvote, (6, 2)),
    ];
    for (direction, (up, down)) in steps {
        let settlement = reconciler
            .vote(VoteIntent::new(item, user, direction))
            .await
            .unwrap();
        let Settlement::Committed(view) = settlement else {
            panic!("vote was ignored");
        };
        assert_eq!((view.upvotes, view.downvotes), (up, down));
        assert_eq!(counts(&store, &item).await, (up, down));
    }
}

#[tokio::test]
async fn test_second_tap_while_voting_is_ignored() {
    let item = post();
    let user = Uuid::new_v4();
    let transport = Arc::new(Gated {
        release: Notify::new(),
        calls: AtomicU32::new(0),
        outcome: VoteOutcome {
            action: vote_engine::delta::VoteAction::Added,
            new_upvotes: 1,
            new_downvotes: 0,
            vote_score: 1,
            vote_state: VoteState::Upvote,
        },
    });
    let reconciler = Arc::new(VoteReconciler::new(transport.clone()));

    let first = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move {
            reconciler
                .vote(VoteIntent::new(item, user, VoteState::Upvote))
                .await
        })
    };

    while transport.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // Optimistic state is visible immediately, before the server answers.
    assert_eq!(reconciler.phase(item, user).await, VotePhase::Voting);
    assert_eq!(
        reconciler.displayed(item, user).await,
        Some(DisplayedVote::new(1, 0, VoteState::Upvote))
    );

    let second = reconciler
        .vote(VoteIntent::new(item, user, VoteState::Upvote))
        .await
        .unwrap();
    assert_eq!(second, Settlement::Ignored);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    transport.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(
        first,
        Settlement::Committed(DisplayedVote::new(1, 0, VoteState::Upvote))
    );
    assert_eq!(reconciler.phase(item, user).await, VotePhase::Idle);
}

#[tokio::test]
async fn test_timed_out_vote_rolls_back_and_unblocks() {
    let item = post();
    let user = Uuid::new_v4();
    let reconciler = VoteReconciler::new(StallsOnce {
        calls: AtomicU32::new(0),
        outcome: VoteOutcome {
            action: vote_engine::delta::VoteAction::Added,
            new_upvotes: 8,
            new_downvotes: 2,
            vote_score: 6,
            vote_state: VoteState::Upvote,
        },
    });
    let before = DisplayedVote::new(7, 2, VoteState::None);
    reconciler.track(item, user, before).await;

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        reconciler.vote(VoteIntent::new(item, user, VoteState::Upvote)),
    )
    .await;
    assert!(timed_out.is_err());

    assert_eq!(reconciler.phase(item, user).await, VotePhase::Idle);
    assert_eq!(reconciler.displayed(item, user).await, Some(before));

    let retry = reconciler
        .vote(VoteIntent::new(item, user, VoteState::Upvote))
        .await
        .unwrap();
    assert_eq!(
        retry,
        Settlement::Committed(DisplayedVote::new(8, 2, VoteState::Upvote))
    );
}
