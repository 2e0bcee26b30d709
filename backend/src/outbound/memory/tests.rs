//! Behavioural tests for the in-memory ledger store.

use chrono::{DateTime, TimeDelta, Utc};
use rstest::{fixture, rstest};

use super::MemoryLedgerStore;
use crate::domain::ports::{
    AddLinkOutcome, ComplaintDecision, CompletionRequest, CreditLedger, DecideComplaintOutcome,
    DecideUnbanOutcome, DeleteLinkOutcome, FileComplaintOutcome, LinkRepository,
    ModerationRepository, NewLink, ReferralRepository, TaskQuery, TaskRepository,
    UnbanRequestOutcome, UserRepository,
};
use crate::domain::{
    ActionType, BanDraft, BonusCause, CompletionOutcome, CompletionPolicy, ComplaintDraft,
    ComplaintId, LinkDetails, LinkStatus, LinkUrl, Platform, ReferralAttachment,
    RequirementDraft, SpendOutcome, Strike, UnbanDecision, UserId, Verdict,
};
use crate::test_support::{fixture_now, sample_user};

const OWNER: UserId = UserId::new(1);
const EARNER: UserId = UserId::new(2);
const REFERRER: UserId = UserId::new(3);

#[fixture]
fn store() -> MemoryLedgerStore {
    let store = MemoryLedgerStore::new();
    for (id, credits) in [(1, 500), (2, 0), (3, 0)] {
        store
            .seed_user(sample_user(id, credits))
            .expect("seed user");
    }
    store
}

fn draft(action_type: ActionType, target: i64, unit_cost: i64) -> RequirementDraft {
    RequirementDraft {
        action_type,
        target,
        unit_cost,
    }
}

async fn add_link(
    store: &MemoryLedgerStore,
    url: &str,
    requirements: Vec<RequirementDraft>,
    created_at: DateTime<Utc>,
) -> LinkDetails {
    let outcome = store
        .create_link(NewLink {
            owner: OWNER,
            url: LinkUrl::parse(url).expect("valid url"),
            platform: Platform::Behance,
            requirements,
            created_at,
        })
        .await
        .expect("create link");
    match outcome {
        AddLinkOutcome::Created { details, .. } => details,
        other => panic!("expected link creation, got {other:?}"),
    }
}

fn completion(link: &LinkDetails, action_type: ActionType, now: DateTime<Utc>) -> CompletionRequest {
    CompletionRequest {
        user: EARNER,
        link: link.link.id,
        action_type,
        now,
        cooldown_since: now - TimeDelta::days(30),
        policy: CompletionPolicy::Aggregate,
        referral_percent: 20,
    }
}

#[rstest]
#[tokio::test]
async fn completion_credits_earner_pays_referrer_and_completes_link(store: MemoryLedgerStore) {
    let now = fixture_now();
    store
        .attach_referrer(EARNER, REFERRER, 0, now)
        .await
        .expect("attach referrer");
    let link = add_link(
        &store,
        "https://behance.net/gallery/1/poster",
        vec![draft(ActionType::Comment, 1, 7)],
        now,
    )
    .await;

    let outcome = store
        .record_completion(completion(&link, ActionType::Comment, now))
        .await
        .expect("record completion");

    let CompletionOutcome::Credited(receipt) = outcome else {
        panic!("expected credit, got {outcome:?}");
    };
    assert_eq!(receipt.credited, 7);
    assert_eq!(receipt.balance, 7);
    assert!(receipt.link_completed);
    let bonus = receipt.referral_bonus.expect("referrer bonus");
    assert_eq!((bonus.amount, bonus.cause), (1, BonusCause::EarnedAction));

    let stored = store.find_link(link.link.id).await.expect("find").expect("link");
    assert_eq!(stored.link.status, LinkStatus::Completed);
    let earner = store.find_by_id(EARNER).await.expect("find").expect("earner");
    assert_eq!(earner.rating, 5);
}

#[rstest]
#[tokio::test]
async fn same_url_is_blocked_across_links_and_after_cooldown(store: MemoryLedgerStore) {
    let now = fixture_now();
    let first = add_link(
        &store,
        "https://www.behance.net/gallery/9/mural/",
        vec![draft(ActionType::Like, 2, 5)],
        now,
    )
    .await;
    let second = add_link(
        &store,
        "behance.net/gallery/9/mural?utm=x",
        vec![draft(ActionType::Like, 2, 5)],
        now,
    )
    .await;

    let earned = store
        .record_completion(completion(&first, ActionType::Like, now))
        .await
        .expect("first completion");
    assert!(matches!(earned, CompletionOutcome::Credited(_)));

    let again = store
        .record_completion(completion(&first, ActionType::Like, now))
        .await
        .expect("repeat");
    assert_eq!(again, CompletionOutcome::AlreadyDone);

    let later = now + TimeDelta::days(45);
    let elsewhere = store
        .record_completion(completion(&second, ActionType::Like, later))
        .await
        .expect("other link");
    assert_eq!(elsewhere, CompletionOutcome::CooldownActive);
}

#[rstest]
#[case::exactly_thirty_days(TimeDelta::days(30), false)]
#[case::one_second_past(TimeDelta::days(30) + TimeDelta::seconds(1), true)]
#[tokio::test]
async fn cooldown_alone_guards_history_without_completed_url_record(
    store: MemoryLedgerStore,
    #[case] age: TimeDelta,
    #[case] allowed: bool,
) {
    let now = fixture_now();
    let old = add_link(
        &store,
        "https://behance.net/gallery/31/lamp",
        vec![draft(ActionType::Like, 1, 5)],
        now - TimeDelta::days(60),
    )
    .await;
    store
        .seed_transaction(EARNER, old.link.id, ActionType::Like, now - age)
        .expect("seed history");
    let repost = add_link(
        &store,
        "http://www.behance.net/gallery/31/lamp/",
        vec![draft(ActionType::Like, 2, 5)],
        now,
    )
    .await;

    let offers = store
        .eligible_tasks(TaskQuery {
            user: EARNER,
            platforms: vec![Platform::Behance],
            cooldown_since: now - TimeDelta::days(30),
            limit: 5,
        })
        .await
        .expect("eligible tasks");
    let offered: Vec<_> = offers.iter().map(|offer| offer.link.id).collect();
    if allowed {
        assert_eq!(offered, vec![repost.link.id]);
    } else {
        assert!(offered.is_empty());
    }

    let outcome = store
        .record_completion(completion(&repost, ActionType::Like, now))
        .await
        .expect("completion");
    if allowed {
        assert!(matches!(outcome, CompletionOutcome::Credited(ref receipt) if receipt.credited == 5));
    } else {
        assert_eq!(outcome, CompletionOutcome::CooldownActive);
    }
}

#[rstest]
#[tokio::test]
async fn rejections_leave_no_trace(store: MemoryLedgerStore) {
    let now = fixture_now();
    let link = add_link(
        &store,
        "https://behance.net/gallery/2/logo",
        vec![draft(ActionType::View, 1, 1)],
        now,
    )
    .await;

    let mut own = completion(&link, ActionType::View, now);
    own.user = OWNER;
    let outcome = store.record_completion(own).await.expect("self action");
    assert_eq!(outcome, CompletionOutcome::SelfActionForbidden);

    let missing = store
        .record_completion(completion(&link, ActionType::Follow, now))
        .await
        .expect("unrequested action");
    assert_eq!(missing, CompletionOutcome::NotEligible);

    let earner = store.find_by_id(EARNER).await.expect("find").expect("earner");
    assert_eq!(earner.credits, 0);
    assert!(store.performers(link.link.id).await.expect("performers").is_empty());
}

#[rstest]
#[tokio::test]
async fn eligible_tasks_prefer_newest_links_and_skip_done_work(store: MemoryLedgerStore) {
    let now = fixture_now();
    let older = add_link(
        &store,
        "https://behance.net/gallery/3/older",
        vec![
            draft(ActionType::Like, 1, 5),
            draft(ActionType::Comment, 1, 10),
        ],
        now - TimeDelta::hours(2),
    )
    .await;
    let newer = add_link(
        &store,
        "https://behance.net/gallery/4/newer",
        vec![draft(ActionType::View, 3, 1)],
        now - TimeDelta::hours(1),
    )
    .await;
    store
        .record_completion(completion(&older, ActionType::Like, now))
        .await
        .expect("complete like");

    let offers = store
        .eligible_tasks(TaskQuery {
            user: EARNER,
            platforms: vec![Platform::Behance],
            cooldown_since: now - TimeDelta::days(30),
            limit: 5,
        })
        .await
        .expect("eligible tasks");

    let offered: Vec<_> = offers
        .iter()
        .map(|offer| (offer.link.id, offer.requirement.action_type))
        .collect();
    assert_eq!(
        offered,
        vec![
            (newer.link.id, ActionType::View),
            (older.link.id, ActionType::Comment),
        ]
    );

    let for_owner = store
        .eligible_tasks(TaskQuery {
            user: OWNER,
            platforms: vec![Platform::Behance],
            cooldown_since: now - TimeDelta::days(30),
            limit: 5,
        })
        .await
        .expect("owner tasks");
    assert!(for_owner.is_empty());
}

#[rstest]
#[tokio::test]
async fn link_creation_requires_full_price(store: MemoryLedgerStore) {
    let outcome = store
        .create_link(NewLink {
            owner: EARNER,
            url: LinkUrl::parse("https://behance.net/gallery/5/x").expect("valid url"),
            platform: Platform::Behance,
            requirements: vec![draft(ActionType::Follow, 1, 30)],
            created_at: fixture_now(),
        })
        .await
        .expect("create link");
    assert_eq!(
        outcome,
        AddLinkOutcome::InsufficientFunds {
            balance: 0,
            required: 30
        }
    );
    assert!(store.links_by_owner(EARNER).await.expect("links").is_empty());
}

#[rstest]
#[tokio::test]
async fn deleting_refunds_unserved_credit(store: MemoryLedgerStore) {
    let now = fixture_now();
    let link = add_link(
        &store,
        "https://behance.net/gallery/6/deck",
        vec![
            draft(ActionType::Like, 3, 5),
            draft(ActionType::Comment, 1, 10),
        ],
        now,
    )
    .await;
    store
        .record_completion(completion(&link, ActionType::Like, now))
        .await
        .expect("complete like");

    let foreign = store
        .delete_link(EARNER, link.link.id, 80)
        .await
        .expect("foreign delete");
    assert_eq!(foreign, DeleteLinkOutcome::NotOwner);

    let outcome = store
        .delete_link(OWNER, link.link.id, 80)
        .await
        .expect("delete");
    // Likes: 2 unserved x 5 = 10 -> 8. Comments: 10 -> 8.
    assert_eq!(
        outcome,
        DeleteLinkOutcome::Deleted {
            refund: 16,
            balance: 500 - 25 + 16
        }
    );
    assert!(store.find_link(link.link.id).await.expect("find").is_none());
}

#[rstest]
#[tokio::test]
async fn complaint_removes_completion_and_strikes_escalate(store: MemoryLedgerStore) {
    let now = fixture_now();
    let mut last = None;
    for round in 0..3 {
        let link = add_link(
            &store,
            &format!("https://behance.net/gallery/7{round}/piece"),
            vec![draft(ActionType::Like, 1, 5)],
            now,
        )
        .await;
        store
            .record_completion(completion(&link, ActionType::Like, now))
            .await
            .expect("complete");

        let filed = store
            .file_complaint(
                ComplaintDraft {
                    complainant_id: OWNER,
                    accused_id: EARNER,
                    link_id: link.link.id,
                    category: "unliked".to_owned(),
                    action_type: None,
                },
                now,
            )
            .await
            .expect("file complaint");
        let FileComplaintOutcome::Filed {
            complaint,
            removed_transactions,
        } = filed
        else {
            panic!("expected complaint, got {filed:?}");
        };
        assert_eq!(removed_transactions, 1);
        assert!(store.performers(link.link.id).await.expect("performers").is_empty());
        let accused = store.find_by_id(EARNER).await.expect("find").expect("accused");
        assert_eq!(accused.rating, 0);

        let decided = store
            .decide_complaint(ComplaintDecision {
                complaint: complaint.id,
                admin: REFERRER,
                verdict: Verdict::Violation,
                note: None,
                now,
                strike_threshold: 3,
            })
            .await
            .expect("decide");
        last = Some(decided);
    }

    let Some(DecideComplaintOutcome::Decided { strike, ban, .. }) = last else {
        panic!("expected a decision");
    };
    assert_eq!(strike, Some(Strike::Ban { warnings: 3 }));
    let ban = ban.expect("ban issued");
    assert!(ban.is_permanent());
    assert!(store.active_ban(EARNER, now).await.expect("ban").is_some());

    let earner = store.find_by_id(EARNER).await.expect("find").expect("earner");
    assert_eq!(earner.credits, 15);
}

#[rstest]
#[tokio::test]
async fn decided_complaints_cannot_be_decided_again(store: MemoryLedgerStore) {
    let outcome = store
        .decide_complaint(ComplaintDecision {
            complaint: ComplaintId::new(99),
            admin: REFERRER,
            verdict: Verdict::NonViolation,
            note: None,
            now: fixture_now(),
            strike_threshold: 3,
        })
        .await
        .expect("decide");
    assert_eq!(outcome, DecideComplaintOutcome::NotFound);
}

#[rstest]
#[tokio::test]
async fn unban_requests_are_rate_limited_and_approval_lifts(store: MemoryLedgerStore) {
    let now = fixture_now();
    let window = TimeDelta::hours(24);
    let not_banned = store
        .create_unban_request(EARNER, now, now - window)
        .await
        .expect("request");
    assert_eq!(not_banned, UnbanRequestOutcome::NotBanned);

    store
        .issue_ban(
            BanDraft {
                user_id: EARNER,
                reason: "spam".to_owned(),
                expires_at: None,
                issued_by: Some(OWNER),
            },
            now,
        )
        .await
        .expect("ban");
    let UnbanRequestOutcome::Created(request) = store
        .create_unban_request(EARNER, now, now - window)
        .await
        .expect("request")
    else {
        panic!("expected request");
    };
    let later = now + TimeDelta::hours(1);
    let too_soon = store
        .create_unban_request(EARNER, later, later - window)
        .await
        .expect("second request");
    assert!(matches!(too_soon, UnbanRequestOutcome::TooSoon { .. }));

    let decided = store
        .decide_unban_request(request.id, OWNER, UnbanDecision::Approve, later)
        .await
        .expect("approve");
    assert!(matches!(decided, DecideUnbanOutcome::Decided { lifted: 1, .. }));
    assert!(store.active_ban(EARNER, later).await.expect("ban").is_none());
    let history = store.ban_history(EARNER).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].lifted_by, Some(OWNER));
}

#[rstest]
#[tokio::test]
async fn referral_links_are_single_and_acyclic(store: MemoryLedgerStore) {
    let now = fixture_now();
    let attached = store
        .attach_referrer(EARNER, REFERRER, 50, now)
        .await
        .expect("attach");
    assert!(matches!(attached, ReferralAttachment::Attached(bonus) if bonus.amount == 50));

    let again = store
        .attach_referrer(EARNER, OWNER, 50, now)
        .await
        .expect("second attach");
    assert_eq!(again, ReferralAttachment::AlreadyReferred);

    let circular = store
        .attach_referrer(REFERRER, EARNER, 50, now)
        .await
        .expect("circular attach");
    assert_eq!(circular, ReferralAttachment::Circular);

    assert_eq!(
        store.referral_totals(REFERRER).await.expect("totals"),
        (1, 50)
    );
    let referrer = store.find_by_id(REFERRER).await.expect("find").expect("user");
    assert_eq!(referrer.credits, 50);
}

#[rstest]
#[tokio::test]
async fn spend_never_overdraws(store: MemoryLedgerStore) {
    let outcome = store.spend(EARNER, 1).await.expect("spend");
    assert_eq!(
        outcome,
        SpendOutcome::InsufficientFunds {
            balance: 0,
            required: 1
        }
    );
    let missing = store.credit(UserId::new(404), 5).await;
    assert!(missing.is_err());
}
