//! End-to-end ledger behaviour through the public services and the
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use mockable::Clock;
use reciprocity::domain::ports::{AddLinkOutcome, FixtureNotifier, UserRepository};
use reciprocity::domain::{
    AbuseState, AccountService, ActionType, BroadcastService, Cart, CompletionOutcome,
    EconomyConfig, ExternalUserId, LinkDetails, LinkService, LinkStatus, MatchOutcome,
    ModerationService, Notice, Platform, ReferralAttachment, ReferralService, TaskMatcherService,
    UserId, Verdict,
};
use reciprocity::inbound::access_gate::{AccessDecision, AccessGate, GatedAction};
use reciprocity::outbound::memory::MemoryLedgerStore;
use reciprocity::test_support::{MutableClock, RecordingSleeper, fixture_now, sample_user};
use rstest::{fixture, rstest};

const OWNER: UserId = UserId::new(1);
const BOB: UserId = UserId::new(2);
const CAROL: UserId = UserId::new(3);
const FRANK: UserId = UserId::new(4);
const GRACE: UserId = UserId::new(5);
const ADMIN: UserId = UserId::new(9);

struct World {
    store: Arc<MemoryLedgerStore>,
    notifier: Arc<FixtureNotifier>,
    clock: Arc<MutableClock>,
    economy: Arc<EconomyConfig>,
}

impl World {
    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn links(&self) -> LinkService<MemoryLedgerStore, MemoryLedgerStore, FixtureNotifier> {
        LinkService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            self.clock(),
        )
    }

    fn matcher(&self) -> TaskMatcherService<MemoryLedgerStore, MemoryLedgerStore, FixtureNotifier> {
        TaskMatcherService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            self.clock(),
        )
    }

    fn moderation(
        &self,
    ) -> ModerationService<MemoryLedgerStore, MemoryLedgerStore, MemoryLedgerStore, FixtureNotifier>
    {
        ModerationService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            self.clock(),
        )
        .with_admin_contact(Some(external(ADMIN)))
    }

    fn accounts(&self) -> AccountService<MemoryLedgerStore, MemoryLedgerStore, FixtureNotifier> {
        AccountService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            self.clock(),
        )
    }

    async fn credits(&self, user: UserId) -> i64 {
        self.store
            .find_by_id(user)
            .await
            .expect("user lookup")
            .expect("user exists")
            .credits
    }

    async fn add_link(&self, path: &str, cart: Cart) -> LinkDetails {
        let url = format!("https://www.behance.net/gallery/{path}");
        match self.links().add_link(OWNER, &url, cart).await.expect("add link") {
            AddLinkOutcome::Created { details, .. } => details,
            other => panic!("expected link creation, got {other:?}"),
        }
    }

    async fn complete(&self, user: UserId, link: &LinkDetails, action: ActionType) -> CompletionOutcome {
        self.matcher()
            .record_completion(user, link.link.id, action)
            .await
            .expect("record completion")
    }
}

const fn external(user: UserId) -> ExternalUserId {
    ExternalUserId::new(1000 + user.get())
}

fn credited(outcome: &CompletionOutcome) -> i64 {
    match outcome {
        CompletionOutcome::Credited(receipt) => receipt.credited,
        other => panic!("expected credit, got {other:?}"),
    }
}

#[fixture]
fn world() -> World {
    let store = MemoryLedgerStore::new();
    for (id, credits) in [(1, 500), (2, 0), (3, 0), (4, 0), (5, 0), (9, 0)] {
        store.seed_user(sample_user(id, credits)).expect("seed user");
    }
    World {
        store: Arc::new(store),
        notifier: Arc::new(FixtureNotifier::default()),
        clock: Arc::new(MutableClock::new(fixture_now())),
        economy: Arc::new(EconomyConfig::default()),
    }
}

#[rstest]
#[tokio::test]
async fn two_likes_are_served_by_two_distinct_performers(world: World) {
    let link = world
        .add_link("1", Cart::default().with(ActionType::Like, 2))
        .await;
    assert_eq!(world.credits(OWNER).await, 490);

    let first = world.complete(BOB, &link, ActionType::Like).await;
    assert_eq!(credited(&first), 5);
    let CompletionOutcome::Credited(receipt) = first else {
        panic!("expected credit");
    };
    assert_eq!((receipt.progress.completed, receipt.progress.required), (1, 2));
    assert!(!receipt.link_completed);

    let repeat = world.complete(BOB, &link, ActionType::Like).await;
    assert_eq!(repeat, CompletionOutcome::AlreadyDone);
    assert_eq!(world.credits(BOB).await, 5);

    let second = world.complete(CAROL, &link, ActionType::Like).await;
    let CompletionOutcome::Credited(receipt) = second else {
        panic!("expected credit, got {second:?}");
    };
    assert_eq!(receipt.credited, 5);
    assert_eq!((receipt.progress.completed, receipt.progress.required), (2, 2));
    assert!(receipt.link_completed);

    let details = world.links().link_details(link.link.id).await.expect("details");
    assert_eq!(details.link.status, LinkStatus::Completed);
    assert!(
        world
            .notifier
            .sent_to(external(OWNER))
            .iter()
            .any(|notice| matches!(notice, Notice::LinkCompleted { .. }))
    );
}

#[rstest]
#[tokio::test]
async fn owners_are_never_offered_their_own_links(world: World) {
    world
        .add_link("2", Cart::default().with(ActionType::View, 3))
        .await;

    let own = world
        .matcher()
        .match_task(OWNER, &[Platform::Behance])
        .await
        .expect("match");
    assert_eq!(own, MatchOutcome::NoWork);

    let other = world
        .matcher()
        .match_task(BOB, &[Platform::Behance])
        .await
        .expect("match");
    assert!(matches!(other, MatchOutcome::Offers(ref offers) if offers.len() == 1));
}

#[rstest]
#[tokio::test]
async fn completed_url_is_never_offered_again(world: World) {
    let link = world
        .add_link("3", Cart::default().with(ActionType::Like, 1))
        .await;
    assert_eq!(credited(&world.complete(BOB, &link, ActionType::Like).await), 5);
    world
        .links()
        .delete_link(OWNER, link.link.id)
        .await
        .expect("delete link");

    for _ in 0..2 {
        world.clock.advance(TimeDelta::days(40));
        let again = world
            .add_link("3/", Cart::default().with(ActionType::Like, 1))
            .await;
        let offer = world
            .matcher()
            .match_task(BOB, &[Platform::Behance])
            .await
            .expect("match");
        assert_eq!(offer, MatchOutcome::NoWork);
        let outcome = world.complete(BOB, &again, ActionType::Like).await;
        assert_eq!(outcome, CompletionOutcome::CooldownActive);
    }
}

#[rstest]
#[tokio::test]
async fn reposting_over_plain_http_does_not_reopen_a_completed_url(world: World) {
    let link = world
        .add_link("77/poster", Cart::default().with(ActionType::Like, 1))
        .await;
    assert_eq!(credited(&world.complete(BOB, &link, ActionType::Like).await), 5);
    world
        .links()
        .delete_link(OWNER, link.link.id)
        .await
        .expect("delete link");

    let repost = match world
        .links()
        .add_link(
            OWNER,
            "http://behance.net/gallery/77/poster",
            Cart::default().with(ActionType::Like, 1),
        )
        .await
        .expect("add link")
    {
        AddLinkOutcome::Created { details, .. } => details,
        other => panic!("expected link creation, got {other:?}"),
    };
    assert_eq!(repost.link.url, link.link.url);

    let offer = world
        .matcher()
        .match_task(BOB, &[Platform::Behance])
        .await
        .expect("match");
    assert_eq!(offer, MatchOutcome::NoWork);
    let outcome = world.complete(BOB, &repost, ActionType::Like).await;
    assert_eq!(outcome, CompletionOutcome::CooldownActive);
    assert_eq!(world.credits(BOB).await, 5);
}

#[rstest]
#[tokio::test]
async fn deleting_a_partly_served_link_refunds_eighty_percent(world: World) {
    let link = world
        .add_link("4", Cart::default().with(ActionType::Like, 10))
        .await;
    for user in [BOB, CAROL, FRANK] {
        assert_eq!(credited(&world.complete(user, &link, ActionType::Like).await), 5);
    }

    let refund = world
        .links()
        .delete_link(OWNER, link.link.id)
        .await
        .expect("delete link");
    assert_eq!(refund.refund, 28);
    assert_eq!(refund.balance, 500 - 50 + 28);
}

#[rstest]
#[tokio::test]
async fn fully_served_link_refunds_nothing(world: World) {
    let link = world
        .add_link("5", Cart::default().with(ActionType::Comment, 1))
        .await;
    assert_eq!(credited(&world.complete(BOB, &link, ActionType::Comment).await), 10);

    let refund = world
        .links()
        .delete_link(OWNER, link.link.id)
        .await
        .expect("delete link");
    assert_eq!(refund.refund, 0);
    assert_eq!(refund.balance, 490);
}

#[rstest]
#[tokio::test]
async fn three_confirmed_complaints_ban_regardless_of_category(world: World) {
    let moderation = world.moderation();
    let mut last_state = AbuseState::Clean;
    for (index, category) in ["fake", "unliked", "bot"].into_iter().enumerate() {
        let link = world
            .add_link(&format!("strike-{index}"), Cart::default().with(ActionType::Like, 1))
            .await;
        assert_eq!(credited(&world.complete(BOB, &link, ActionType::Like).await), 5);
        let filing = moderation
            .file_complaint(OWNER, BOB, link.link.id, category, None)
            .await
            .expect("file complaint");
        assert_eq!(filing.removed_transactions, 1);
        let resolution = moderation
            .resolve_complaint(ADMIN, filing.complaint.id, Verdict::Violation, None)
            .await
            .expect("resolve complaint");
        last_state = resolution.accused_state;
    }
    assert_eq!(last_state, AbuseState::Banned);
    assert!(moderation.is_banned(BOB).await.expect("ban check"));
    // Paid credit stays with the accused.
    assert_eq!(world.credits(BOB).await, 15);

    let gate = AccessGate::new(
        Arc::clone(&world.store),
        Arc::clone(&world.store),
        world.clock(),
        Some(external(ADMIN)),
    );
    let command = gate
        .check(external(BOB), GatedAction::Command)
        .await
        .expect("gate");
    assert!(matches!(command, AccessDecision::Denied(_)));
    let appeal = gate
        .check(external(BOB), GatedAction::RequestUnban)
        .await
        .expect("gate");
    assert!(appeal.is_allowed());
}

#[rstest]
#[tokio::test]
async fn referrer_receives_floored_share_without_reducing_earner(world: World) {
    let accounts = world.accounts();
    let code = accounts
        .ensure_referral_code(GRACE)
        .await
        .expect("referral code");
    let registration = accounts
        .register(external(FRANK), None, Some(&code))
        .await
        .expect("register");
    assert!(!registration.created);
    assert!(matches!(
        registration.referral,
        Some(ReferralAttachment::Attached(bonus)) if bonus.amount == 50
    ));

    let link = world
        .add_link("6", Cart::default().with(ActionType::Follow, 1))
        .await;
    assert_eq!(credited(&world.complete(FRANK, &link, ActionType::Follow).await), 30);
    assert_eq!(world.credits(FRANK).await, 30);
    assert_eq!(world.credits(GRACE).await, 50 + 6);

    let summary = ReferralService::new(
        Arc::clone(&world.store),
        Arc::clone(&world.store),
        Arc::clone(&world.economy),
    )
    .summary(GRACE)
    .await
    .expect("summary");
    assert_eq!(summary.total_referred, 1);
    assert_eq!(summary.total_earned, 56);
}

#[rstest]
#[tokio::test]
async fn registration_bonus_is_paid_once_and_never_reciprocated(world: World) {
    let accounts = world.accounts();
    let dana = UserId::new(3);
    let code = accounts.ensure_referral_code(dana).await.expect("code");

    let erin = accounts
        .register(ExternalUserId::new(2000), Some("erin"), Some(&code))
        .await
        .expect("register");
    assert!(erin.created);
    assert_eq!(world.credits(dana).await, 50);

    let repeat = accounts
        .register(ExternalUserId::new(2000), Some("erin"), Some(&code))
        .await
        .expect("register again");
    assert_eq!(repeat.referral, Some(ReferralAttachment::AlreadyReferred));
    assert_eq!(world.credits(dana).await, 50);

    let erin_code = accounts
        .ensure_referral_code(erin.user.id)
        .await
        .expect("code");
    let back = accounts
        .register(external(dana), None, Some(&erin_code))
        .await
        .expect("register referrer");
    assert_eq!(back.referral, Some(ReferralAttachment::Circular));
    assert_eq!(world.credits(erin.user.id).await, 0);
}

#[rstest]
#[tokio::test]
async fn broadcast_skips_banned_users_and_collects_failures(world: World) {
    world
        .moderation()
        .ban(Some(ADMIN), CAROL, "spam", Some(TimeDelta::days(1)))
        .await
        .expect("ban");
    let notifier = Arc::new(FixtureNotifier::failing_for([external(FRANK)]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let broadcaster = BroadcastService::new(
        Arc::clone(&world.store),
        Arc::clone(&notifier),
        Arc::clone(&sleeper),
        world.clock(),
        Duration::from_millis(50),
    );

    let summary = broadcaster
        .broadcast(Some(ADMIN), "maintenance tonight")
        .await
        .expect("broadcast");
    // Owner, Bob, Frank, and Grace; Carol is banned and the admin sends.
    assert_eq!(summary.total, 4);
    assert_eq!(summary.sent, 3);
    assert_eq!(summary.failures.len(), 1);
    assert!(notifier.sent_to(external(CAROL)).is_empty());

    world.clock.advance(TimeDelta::days(2));
    let after_expiry = broadcaster
        .broadcast(Some(ADMIN), "welcome back")
        .await
        .expect("broadcast");
    assert_eq!(after_expiry.total, 5);
    assert!(!sleeper.pauses().is_empty());
}
