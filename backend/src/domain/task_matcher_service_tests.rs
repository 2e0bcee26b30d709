//! Regression coverage for task matching orchestration.

use super::*;
use crate::domain::ports::{
    DeliveryError, LedgerStoreError, MockNotifier, MockTaskRepository, MockUserRepository,
};
use crate::domain::{
    ActionRequirement, CompletionReceipt, ErrorCode, Link, LinkProgress, LinkStatus, LinkUrl,
    RequirementId, TransactionId,
};
use crate::test_support::{MutableClock, fixture_now, sample_user};
use rstest::rstest;

type Service = TaskMatcherService<MockTaskRepository, MockUserRepository, MockNotifier>;

fn service(tasks: MockTaskRepository, users: MockUserRepository, notifier: MockNotifier) -> Service {
    TaskMatcherService::new(
        Arc::new(tasks),
        Arc::new(users),
        Arc::new(notifier),
        Arc::new(EconomyConfig::default()),
        Arc::new(MutableClock::new(fixture_now())),
    )
}

fn offer(link_id: i64) -> TaskOffer {
    let url = LinkUrl::parse(&format!("https://behance.net/gallery/{link_id}"))
        .expect("fixture url");
    TaskOffer {
        link: Link {
            id: LinkId::new(link_id),
            owner_id: UserId::new(1),
            url,
            platform: Platform::Behance,
            status: LinkStatus::Active,
            created_at: fixture_now(),
        },
        requirement: ActionRequirement {
            id: RequirementId::new(link_id * 10),
            link_id: LinkId::new(link_id),
            action_type: ActionType::Like,
            target: 2,
            unit_cost: 5,
            completed: 0,
        },
    }
}

fn receipt(link_completed: bool) -> CompletionReceipt {
    CompletionReceipt {
        transaction_id: TransactionId::new(1),
        user_id: UserId::new(2),
        link_id: LinkId::new(9),
        action_type: ActionType::Like,
        credited: 5,
        balance: 5,
        progress: LinkProgress {
            completed: 2,
            required: 2,
        },
        link_completed,
        owner_id: UserId::new(1),
        link_url: LinkUrl::parse("https://behance.net/gallery/9").expect("fixture url"),
        referral_bonus: None,
    }
}

#[tokio::test]
async fn no_platforms_short_circuits_without_querying() {
    let mut tasks = MockTaskRepository::new();
    tasks.expect_eligible_tasks().times(0);

    let outcome = service(tasks, MockUserRepository::new(), MockNotifier::new())
        .match_task(UserId::new(2), &[])
        .await
        .expect("match succeeds");

    assert_eq!(outcome, MatchOutcome::NoPlatforms);
}

#[rstest]
#[case(0, 1)]
#[case(3, 3)]
#[case(50, 5)]
#[tokio::test]
async fn batch_size_is_capped(#[case] requested: usize, #[case] expected: usize) {
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_eligible_tasks()
        .withf(move |query| {
            query.limit == expected
                && query.cooldown_since == fixture_now() - chrono::TimeDelta::days(30)
                && query.platforms == vec![Platform::Behance]
        })
        .times(1)
        .return_once(|_| Ok(vec![offer(4)]));

    let outcome = service(tasks, MockUserRepository::new(), MockNotifier::new())
        .match_tasks(UserId::new(2), &[Platform::Behance], requested)
        .await
        .expect("match succeeds");

    assert_eq!(outcome, MatchOutcome::Offers(vec![offer(4)]));
}

#[tokio::test]
async fn empty_result_means_no_work() {
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_eligible_tasks()
        .times(1)
        .return_once(|_| Ok(Vec::new()));

    let outcome = service(tasks, MockUserRepository::new(), MockNotifier::new())
        .match_task(UserId::new(2), &[Platform::Dribbble])
        .await
        .expect("match succeeds");

    assert_eq!(outcome, MatchOutcome::NoWork);
}

#[tokio::test]
async fn match_for_user_uses_connected_platforms() {
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .times(1)
        .return_once(|_| Ok(Some(sample_user(2, 0))));
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_eligible_tasks()
        .withf(|query| query.platforms == vec![Platform::Behance])
        .times(1)
        .return_once(|_| Ok(Vec::new()));

    let outcome = service(tasks, users, MockNotifier::new())
        .match_for_user(UserId::new(2), 1)
        .await
        .expect("match succeeds");

    assert_eq!(outcome, MatchOutcome::NoWork);
}

#[tokio::test]
async fn match_for_unknown_user_is_not_found() {
    let mut users = MockUserRepository::new();
    users.expect_find_by_id().return_once(|_| Ok(None));

    let err = service(MockTaskRepository::new(), users, MockNotifier::new())
        .match_for_user(UserId::new(2), 1)
        .await
        .expect_err("unknown user");

    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn completing_a_link_notifies_the_owner() {
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_record_completion()
        .withf(|request| {
            request.referral_percent == 20
                && request.cooldown_since == fixture_now() - chrono::TimeDelta::days(30)
        })
        .times(1)
        .return_once(|_| Ok(CompletionOutcome::Credited(receipt(true))));
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .times(1)
        .return_once(|_| Ok(Some(sample_user(1, 0))));
    let mut notifier = MockNotifier::new();
    notifier
        .expect_deliver()
        .withf(|recipient, notice| {
            *recipient == sample_user(1, 0).external_id
                && matches!(notice, Notice::LinkCompleted { .. })
        })
        .times(1)
        .return_once(|_, _| Ok(()));

    let outcome = service(tasks, users, notifier)
        .record_completion(UserId::new(2), LinkId::new(9), ActionType::Like)
        .await
        .expect("completion succeeds");

    assert_eq!(outcome, CompletionOutcome::Credited(receipt(true)));
}

#[tokio::test]
async fn owner_notification_failure_keeps_the_credit() {
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_record_completion()
        .return_once(|_| Ok(CompletionOutcome::Credited(receipt(true))));
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .return_once(|_| Ok(Some(sample_user(1, 0))));
    let mut notifier = MockNotifier::new();
    notifier
        .expect_deliver()
        .return_once(|_, _| Err(DeliveryError::unreachable("blocked")));

    let outcome = service(tasks, users, notifier)
        .record_completion(UserId::new(2), LinkId::new(9), ActionType::Like)
        .await
        .expect("completion succeeds despite delivery failure");

    assert!(matches!(outcome, CompletionOutcome::Credited(_)));
}

#[tokio::test]
async fn partial_progress_sends_no_notice() {
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_record_completion()
        .return_once(|_| Ok(CompletionOutcome::Credited(receipt(false))));
    let mut notifier = MockNotifier::new();
    notifier.expect_deliver().times(0);

    service(tasks, MockUserRepository::new(), notifier)
        .record_completion(UserId::new(2), LinkId::new(9), ActionType::Like)
        .await
        .expect("completion succeeds");
}

#[rstest]
#[case(CompletionOutcome::AlreadyDone)]
#[case(CompletionOutcome::CooldownActive)]
#[case(CompletionOutcome::SelfActionForbidden)]
#[tokio::test]
async fn policy_rejections_pass_through(#[case] rejection: CompletionOutcome) {
    let mut tasks = MockTaskRepository::new();
    let returned = rejection.clone();
    tasks
        .expect_record_completion()
        .return_once(move |_| Ok(returned));

    let outcome = service(tasks, MockUserRepository::new(), MockNotifier::new())
        .record_completion(UserId::new(2), LinkId::new(9), ActionType::Like)
        .await
        .expect("rejections are not errors");

    assert_eq!(outcome, rejection);
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let mut tasks = MockTaskRepository::new();
    tasks
        .expect_record_completion()
        .return_once(|_| Err(LedgerStoreError::connection("refused")));

    let err = service(tasks, MockUserRepository::new(), MockNotifier::new())
        .record_completion(UserId::new(2), LinkId::new(9), ActionType::Like)
        .await
        .expect_err("outage surfaces");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}
