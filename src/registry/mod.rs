//! Curated-registry watcher: reconstructs item state per status event,
//! composes one notice per transition, and publishes it into the item's
//! reply thread.

pub mod dispatcher;
pub mod snapshot;

use alloy::primitives::{Address, B256, U256};
use tracing::{debug, info, warn};

use crate::chain::{
    non_fatal, BlockRange, ChainError, EventKind, EventPayload, ItemStatus, RawEvent,
    RegistryReader,
};
use crate::links::LinkShortener;
use crate::payload::{truncate_evidence, PayloadError, PayloadSource};
use crate::registry::dispatcher::{evidence_notice, ruling_notice, status_notice, Notice};
use crate::registry::snapshot::{max_appeal_fee, winnable_deposits, EntitySnapshot};
use crate::social::{PublishError, Publisher};
use crate::store::StateStore;
use crate::supervisor::Watcher;

/// One watched registry deployment.
#[derive(Debug, Clone)]
pub struct RegistrySource {
    /// Checkpoint namespace, unique across all configured sources.
    pub key: String,
    pub registry: Address,
    /// Base URL of the listing UI, item ID appended.
    pub item_base_url: String,
    /// Base URL of the block explorer, item address appended.
    pub explorer_base_url: String,
    pub backfill: bool,
}

pub struct RegistryBot<C, S, P, L, F> {
    chain: C,
    store: S,
    publisher: P,
    shortener: L,
    payloads: F,
    source: RegistrySource,
}

impl<C, S, P, L, F> RegistryBot<C, S, P, L, F>
where
    C: RegistryReader,
    S: StateStore,
    P: Publisher,
    L: LinkShortener,
    F: PayloadSource,
{
    pub fn new(
        chain: C,
        store: S,
        publisher: P,
        shortener: L,
        payloads: F,
        source: RegistrySource,
    ) -> Self {
        Self {
            chain,
            store,
            publisher,
            shortener,
            payloads,
            source,
        }
    }

    fn entity_key(&self, item_id: B256) -> String {
        format!("{}:{}", self.source.key, item_id)
    }

    async fn listing_link(&self, item_id: B256) -> anyhow::Result<String> {
        let long = format!(
            "{}/{}",
            self.source.item_base_url.trim_end_matches('/'),
            item_id
        );
        Ok(self.shortener.shorten(&long).await?)
    }

    /// Publish into the entity's thread. A duplicate response means the
    /// transition was already announced before a restart; the thread
    /// handle is left pointing at the original post.
    async fn publish_for(
        &mut self,
        entity_key: &str,
        text: &str,
        media: Option<&[u8]>,
    ) -> anyhow::Result<()> {
        let reply_to = self.store.thread_handle(entity_key).await?;
        match self
            .publisher
            .publish(text, media, reply_to.as_deref())
            .await
        {
            Ok(handle) => {
                info!(entity = entity_key, handle = %handle, "notice published");
                self.store.set_thread_handle(entity_key, &handle).await?;
                Ok(())
            }
            Err(PublishError::Duplicate) => {
                debug!(entity = entity_key, "already announced, skipping");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_status(
        &mut self,
        item_id: B256,
        status: ItemStatus,
        disputed: bool,
        appealed: bool,
    ) -> anyhow::Result<()> {
        let Some(info) = non_fatal(self.chain.item(item_id).await, "item read")? else {
            return Ok(());
        };
        let Some(params) = non_fatal(self.chain.deposit_params().await, "deposit parameter read")?
        else {
            return Ok(());
        };
        let deposits = winnable_deposits(&params);
        let snap = EntitySnapshot::new(item_id, info, status, disputed, appealed, deposits);

        let listing_link = self.listing_link(item_id).await?;
        let explorer_link = if status == ItemStatus::RegistrationRequested && !disputed {
            let long = format!(
                "{}/{}",
                self.source.explorer_base_url.trim_end_matches('/'),
                snap.address
            );
            Some(self.shortener.shorten(&long).await?)
        } else {
            None
        };

        let Notice {
            text,
            attach_symbol,
        } = status_notice(&snap, &listing_link, explorer_link.as_deref());

        let media = if attach_symbol {
            match self.payloads.media(&snap.symbol_uri).await {
                Ok(bytes) => Some(bytes),
                Err(PayloadError::Malformed(reason)) => {
                    warn!(item = %item_id, reason, "symbol image unusable, posting without it");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        self.publish_for(&self.entity_key(item_id), &text, media.as_deref())
            .await
    }

    async fn handle_evidence(&mut self, ev: &RawEvent, uri: &str) -> anyhow::Result<()> {
        let Some(resolved) = non_fatal(
            self.chain.item_for_evidence(ev.tx_ref).await,
            "evidence transaction read",
        )?
        else {
            return Ok(());
        };
        let Some(item_id) = resolved else {
            warn!(tx = %ev.tx_ref, "evidence transaction names no item, skipping");
            return Ok(());
        };
        let Some(info) = non_fatal(self.chain.item(item_id).await, "item read")? else {
            return Ok(());
        };

        let doc = match self.payloads.evidence(uri).await {
            Ok(doc) => doc,
            Err(PayloadError::Malformed(reason)) => {
                warn!(item = %item_id, uri, reason, "malformed evidence document, skipping");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let description = doc.description.clone().unwrap_or_default();
        let (title, description) = truncate_evidence(doc.display_title(), &description);

        let file_link = match &doc.file_uri {
            Some(file_uri) if !file_uri.is_empty() => {
                Some(self.shortener.shorten(&self.payloads.resolve(file_uri)).await?)
            }
            _ => None,
        };
        let listing_link = self.listing_link(item_id).await?;

        let text = evidence_notice(
            &info.name,
            &title,
            &description,
            file_link.as_deref(),
            &listing_link,
        );
        self.publish_for(&self.entity_key(item_id), &text, None)
            .await
    }

    async fn handle_appeal(&mut self, dispute_id: U256, arbitrable: Address) -> anyhow::Result<()> {
        // The arbitrator serves many arbitrables; only our registry's
        // disputes concern this source.
        if arbitrable != self.source.registry {
            return Ok(());
        }
        let Some(resolved) = non_fatal(
            self.chain.item_for_dispute(dispute_id).await,
            "dispute mapping read",
        )?
        else {
            return Ok(());
        };
        let Some(item_id) = resolved else {
            warn!(dispute = %dispute_id, "dispute maps to no item, skipping");
            return Ok(());
        };

        let Some(ruling) = non_fatal(self.chain.current_ruling(dispute_id).await, "ruling read")?
        else {
            return Ok(());
        };
        if ruling.is_zero() {
            debug!(dispute = %dispute_id, "ruling still undecided, nothing to announce");
            return Ok(());
        }

        let Some(params) = non_fatal(
            self.chain.appeal_params(dispute_id).await,
            "appeal parameter read",
        )?
        else {
            return Ok(());
        };
        let max_fee = max_appeal_fee(&params);
        let Some(info) = non_fatal(self.chain.item(item_id).await, "item read")? else {
            return Ok(());
        };
        let listing_link = self.listing_link(item_id).await?;

        let text = ruling_notice(&info.name, ruling, max_fee, &listing_link);
        self.publish_for(&self.entity_key(item_id), &text, None)
            .await
    }
}

impl<C, S, P, L, F> Watcher for RegistryBot<C, S, P, L, F>
where
    C: RegistryReader,
    S: StateStore,
    P: Publisher,
    L: LinkShortener,
    F: PayloadSource,
{
    fn source_key(&self) -> &str {
        &self.source.key
    }

    fn backfill(&self) -> bool {
        self.source.backfill
    }

    async fn head(&self) -> Result<u64, ChainError> {
        self.chain.head().await
    }

    async fn process_window(&mut self, range: BlockRange) -> anyhow::Result<()> {
        let mut events = self
            .chain
            .fetch(EventKind::StatusChange, range, None)
            .await?;
        events.extend(self.chain.fetch(EventKind::Evidence, range, None).await?);
        events.extend(
            self.chain
                .fetch(EventKind::AppealPossible, range, None)
                .await?,
        );
        events.sort_by_key(|e| e.block_number);

        for ev in &events {
            match &ev.payload {
                EventPayload::StatusChange {
                    item_id,
                    status,
                    disputed,
                    appealed,
                } => {
                    self.handle_status(*item_id, *status, *disputed, *appealed)
                        .await?
                }
                EventPayload::Evidence { uri } => self.handle_evidence(ev, uri).await?,
                EventPayload::AppealPossible {
                    dispute_id,
                    arbitrable,
                } => self.handle_appeal(*dispute_id, *arbitrable).await?,
                _ => {}
            }
        }
        Ok(())
    }
}
