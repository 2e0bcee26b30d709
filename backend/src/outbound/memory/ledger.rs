//! Balances, completions, and links for the in-memory ledger.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    AddLinkOutcome, CompletionRequest, CreditLedger, DeleteLinkOutcome, LedgerStoreError,
    LinkRepository, NewLink, TaskOffer, TaskQuery, TaskRepository,
};
use crate::domain::{
    BonusCause, CompletionOutcome, CompletionPolicy, CompletionReceipt, Link, LinkDetails, LinkId,
    LinkProgress, LinkStatus, Performer, Purchase, PurchaseBundle, PurchaseOutcome, RequirementId,
    SpendOutcome, TransactionId, UserId, drafts_total, refund, share_floor,
};

use super::{MemoryLedgerStore, RequirementRow, TransactionRow, missing_user, next};

#[async_trait]
impl CreditLedger for MemoryLedgerStore {
    async fn credit(&self, user: UserId, amount: i64) -> Result<i64, LedgerStoreError> {
        self.lock()?.credit(user, amount)
    }

    async fn spend(&self, user: UserId, amount: i64) -> Result<SpendOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let account = state.user_mut(user)?;
        if account.credits < amount {
            return Ok(SpendOutcome::InsufficientFunds {
                balance: account.credits,
                required: amount,
            });
        }
        account.credits -= amount;
        Ok(SpendOutcome::Spent {
            balance: account.credits,
        })
    }

    async fn record_purchase(
        &self,
        user: UserId,
        bundle: PurchaseBundle,
        referral_bonus: i64,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let balance = state.credit(user, bundle.amount)?;
        let purchase = Purchase {
            user_id: user,
            amount: bundle.amount,
            cost: bundle.cost,
            created_at: now,
        };
        state.purchases.push(purchase);
        let referral_bonus = state.pay_referrer(user, referral_bonus, BonusCause::Purchase)?;
        Ok(PurchaseOutcome::Recorded {
            purchase,
            balance,
            referral_bonus,
        })
    }
}

#[async_trait]
impl TaskRepository for MemoryLedgerStore {
    async fn eligible_tasks(&self, query: TaskQuery) -> Result<Vec<TaskOffer>, LedgerStoreError> {
        let state = self.lock()?;
        let mut candidates: Vec<&Link> = state
            .links
            .values()
            .filter(|link| link.status == LinkStatus::Active)
            .filter(|link| link.owner_id != query.user)
            .filter(|link| query.platforms.contains(&link.platform))
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let mut offers = Vec::new();
        for link in candidates {
            if offers.len() >= query.limit {
                break;
            }
            let requirement = state.requirements_of(link.id).into_iter().find(|row| {
                row.outstanding() > 0
                    && state
                        .earn_block(query.user, link, row.action_type, query.cooldown_since)
                        .is_none()
            });
            if let Some(requirement) = requirement {
                offers.push(TaskOffer {
                    link: link.clone(),
                    requirement,
                });
            }
        }
        Ok(offers)
    }

    async fn record_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&request.user) {
            return Err(missing_user(request.user));
        }
        let Some(link) = state.links.get(&request.link).cloned() else {
            return Ok(CompletionOutcome::NotEligible);
        };
        if link.owner_id == request.user {
            return Ok(CompletionOutcome::SelfActionForbidden);
        }
        let Some(requirement) = state
            .requirements_of(link.id)
            .into_iter()
            .find(|row| row.action_type == request.action_type)
        else {
            return Ok(CompletionOutcome::NotEligible);
        };
        if let Some(blocked) = state.earn_block(
            request.user,
            &link,
            request.action_type,
            request.cooldown_since,
        ) {
            return Ok(blocked);
        }
        if link.status != LinkStatus::Active || requirement.outstanding() == 0 {
            return Ok(CompletionOutcome::NotEligible);
        }

        let transaction_id = TransactionId::new(next(&mut state.seq.transaction));
        state.transactions.insert(
            transaction_id,
            TransactionRow {
                id: transaction_id,
                user_id: request.user,
                link_id: link.id,
                link_url: link.url.clone(),
                action_type: request.action_type,
                created_at: request.now,
            },
        );
        state
            .completed_urls
            .insert((request.user, link.url.clone(), request.action_type));

        let credited = requirement.unit_cost;
        let balance = state.credit(request.user, credited)?;
        let referral_bonus = state.pay_referrer(
            request.user,
            share_floor(credited, request.referral_percent),
            BonusCause::EarnedAction,
        )?;
        state.refresh_rating(request.user);
        state.refresh_rating(link.owner_id);

        let link_completed = state.try_complete(link.id, request.policy).is_some();
        let progress = LinkProgress::of(&state.requirements_of(link.id));
        Ok(CompletionOutcome::Credited(CompletionReceipt {
            transaction_id,
            user_id: request.user,
            link_id: link.id,
            action_type: request.action_type,
            credited,
            balance,
            progress,
            link_completed,
            owner_id: link.owner_id,
            link_url: link.url,
            referral_bonus,
        }))
    }
}

#[async_trait]
impl LinkRepository for MemoryLedgerStore {
    async fn create_link(&self, new_link: NewLink) -> Result<AddLinkOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let required = drafts_total(&new_link.requirements);
        let owner = state.user_mut(new_link.owner)?;
        if owner.credits < required {
            return Ok(AddLinkOutcome::InsufficientFunds {
                balance: owner.credits,
                required,
            });
        }
        owner.credits -= required;
        let balance = owner.credits;

        let id = LinkId::new(next(&mut state.seq.link));
        let link = Link {
            id,
            owner_id: new_link.owner,
            url: new_link.url,
            platform: new_link.platform,
            status: LinkStatus::Active,
            created_at: new_link.created_at,
        };
        state.links.insert(id, link.clone());
        for draft in new_link.requirements {
            let row_id = RequirementId::new(next(&mut state.seq.requirement));
            state.requirements.insert(
                row_id,
                RequirementRow {
                    id: row_id,
                    link_id: id,
                    action_type: draft.action_type,
                    target: draft.target,
                    unit_cost: draft.unit_cost,
                },
            );
        }
        state.refresh_rating(new_link.owner);

        Ok(AddLinkOutcome::Created {
            details: state.details(&link),
            balance,
        })
    }

    async fn find_link(&self, id: LinkId) -> Result<Option<LinkDetails>, LedgerStoreError> {
        let state = self.lock()?;
        Ok(state.links.get(&id).map(|link| state.details(link)))
    }

    async fn links_by_owner(&self, owner: UserId) -> Result<Vec<LinkDetails>, LedgerStoreError> {
        let state = self.lock()?;
        let mut owned: Vec<&Link> = state
            .links
            .values()
            .filter(|link| link.owner_id == owner)
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned.into_iter().map(|link| state.details(link)).collect())
    }

    async fn performers(&self, id: LinkId) -> Result<Vec<Performer>, LedgerStoreError> {
        let state = self.lock()?;
        let mut rows: Vec<&TransactionRow> = state
            .transactions
            .values()
            .filter(|tx| tx.link_id == id)
            .collect();
        rows.sort_by_key(|tx| (tx.created_at, tx.id));
        Ok(rows
            .into_iter()
            .filter_map(|tx| {
                state.users.get(&tx.user_id).map(|user| Performer {
                    transaction_id: tx.id,
                    user_id: user.id,
                    external_id: user.external_id,
                    username: user.username.clone(),
                    action_type: tx.action_type,
                    performed_at: tx.created_at,
                })
            })
            .collect())
    }

    async fn complete_if_served(
        &self,
        id: LinkId,
        policy: CompletionPolicy,
    ) -> Result<Option<Link>, LedgerStoreError> {
        Ok(self.lock()?.try_complete(id, policy))
    }

    async fn delete_link(
        &self,
        owner: UserId,
        id: LinkId,
        refund_percent: i64,
    ) -> Result<DeleteLinkOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let Some(link) = state.links.get(&id) else {
            return Ok(DeleteLinkOutcome::NotFound);
        };
        if link.owner_id != owner {
            return Ok(DeleteLinkOutcome::NotOwner);
        }
        let refund = refund(&state.requirements_of(id), refund_percent);

        state.complaints.retain(|_, complaint| complaint.link_id != id);
        let performers: BTreeSet<UserId> = state
            .transactions
            .values()
            .filter(|tx| tx.link_id == id)
            .map(|tx| tx.user_id)
            .collect();
        state.transactions.retain(|_, tx| tx.link_id != id);
        state.requirements.retain(|_, row| row.link_id != id);
        state.links.remove(&id);

        let balance = state.credit(owner, refund)?;
        state.refresh_rating(owner);
        for performer in performers {
            state.refresh_rating(performer);
        }
        Ok(DeleteLinkOutcome::Deleted { refund, balance })
    }
}
