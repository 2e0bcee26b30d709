//! PostgreSQL round trip for the Diesel adapters.
//!
//! Runs only when `RECIPROCITY_TEST_DATABASE_URL` points at a disposable
//! database; otherwise each test reports a skip and passes.

use std::env;
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use rand::Rng;
use reciprocity::domain::ports::{AddLinkOutcome, NoOpNotifier};
use reciprocity::domain::{
    AccountService, ActionType, Cart, CompletionOutcome, CreditLedgerService, EconomyConfig,
    ExternalUserId, LinkService, SpendOutcome, TaskMatcherService,
};
use reciprocity::outbound::persistence::{
    DbPool, DieselStores, PoolConfig, run_pending_migrations,
};

const DATABASE_URL_VAR: &str = "RECIPROCITY_TEST_DATABASE_URL";

async fn stores() -> Option<DieselStores> {
    let Ok(url) = env::var(DATABASE_URL_VAR) else {
        eprintln!("SKIP-TEST-CLUSTER: {DATABASE_URL_VAR} not set");
        return None;
    };
    run_pending_migrations(&url).await.expect("migrations apply");
    let pool = DbPool::new(PoolConfig::new(&url).with_max_size(4))
        .await
        .expect("pool builds");
    Some(DieselStores::new(pool))
}

fn fresh_external_id() -> ExternalUserId {
    ExternalUserId::new(rand::thread_rng().gen_range(1_000_000..i64::from(i32::MAX)))
}

#[tokio::test]
async fn completion_round_trips_through_postgres() {
    let Some(stores) = stores().await else {
        return;
    };
    let economy = Arc::new(EconomyConfig::default());
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let notifier = Arc::new(NoOpNotifier);
    let accounts = AccountService::new(
        Arc::clone(&stores.users),
        Arc::clone(&stores.referrals),
        Arc::clone(&notifier),
        Arc::clone(&economy),
        Arc::clone(&clock),
    );
    let ledger = CreditLedgerService::new(
        Arc::clone(&stores.ledger),
        Arc::clone(&economy),
        Arc::clone(&clock),
    );
    let links = LinkService::new(
        Arc::clone(&stores.links),
        Arc::clone(&stores.users),
        Arc::clone(&notifier),
        Arc::clone(&economy),
        Arc::clone(&clock),
    );
    let matcher = TaskMatcherService::new(
        Arc::clone(&stores.tasks),
        Arc::clone(&stores.users),
        Arc::clone(&notifier),
        Arc::clone(&economy),
        Arc::clone(&clock),
    );

    let owner = accounts
        .register(fresh_external_id(), Some("owner"), None)
        .await
        .expect("register owner")
        .user;
    let earner = accounts
        .register(fresh_external_id(), Some("earner"), None)
        .await
        .expect("register earner")
        .user;
    assert_eq!(ledger.credit(owner.id, 20).await.expect("credit"), 20);

    let suffix = rand::thread_rng().gen_range(0..u32::MAX);
    let url = format!("https://dribbble.com/shots/{suffix}");
    let link = match links
        .add_link(owner.id, &url, Cart::default().with(ActionType::Like, 2))
        .await
        .expect("add link")
    {
        AddLinkOutcome::Created { details, balance } => {
            assert_eq!(balance, 10);
            details
        }
        other => panic!("expected link creation, got {other:?}"),
    };

    let first = matcher
        .record_completion(earner.id, link.link.id, ActionType::Like)
        .await
        .expect("completion");
    assert!(matches!(first, CompletionOutcome::Credited(ref receipt) if receipt.credited == 5));
    let repeat = matcher
        .record_completion(earner.id, link.link.id, ActionType::Like)
        .await
        .expect("repeat completion");
    assert_eq!(repeat, CompletionOutcome::AlreadyDone);

    let overdraw = ledger.spend(earner.id, 6).await.expect("spend");
    assert_eq!(
        overdraw,
        SpendOutcome::InsufficientFunds {
            balance: 5,
            required: 6
        }
    );

    let refund = links
        .delete_link(owner.id, link.link.id)
        .await
        .expect("delete link");
    assert_eq!(refund.refund, 4);
    assert_eq!(refund.balance, 14);
}
