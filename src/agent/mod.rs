//! Document integration: discovers post cards, injects one block control per
//! card, and runs the block pipeline when a control is clicked.
//!
//! ## Flow
//! 1. Wait for the document to leave `Loading`, then scan once
//! 2. Watch child-list mutations; each (re)arms a debounce, one scan per quiet window
//! 3. On click: extract handle → resolve id → block → show feedback → revert

mod handle;

pub use handle::HandleMatcher;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::credentials::CredentialCell;
use crate::dom::{
    build_control, ActionControl, ClickEvent, ControlEvent, ControlState, Document, Mutation,
    NodeId, Selector, CONTROL_CLASS,
};
use crate::error::{AgentError, AgentResult};
use crate::remote::RemoteActions;

/// Result of one click on a control.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// The control was already busy (or is not ours).
    Ignored,
    Blocked { handle: String, user_id: String },
    Failed(AgentError),
}

struct Selectors {
    card: Selector,
    anchor: Selector,
    control: Selector,
    link: Selector,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            card: Selector::tag("article").with_attr("data-testid", "tweet"),
            anchor: Selector::tag("button").with_attr("data-testid", "caret"),
            control: Selector::any().with_class(CONTROL_CLASS),
            link: Selector::tag("a").with_attr_prefix("href", "/"),
        }
    }
}

pub struct BlockAgent {
    document: Arc<Document>,
    remote: Arc<dyn RemoteActions>,
    config: Config,
    credentials: Option<CredentialCell>,
    selectors: Selectors,
    handles: HandleMatcher,
    controls: Mutex<HashMap<NodeId, Arc<ActionControl>>>,
    scans: AtomicU64,
    // Lets click listeners reach the agent without keeping it alive.
    this: Weak<BlockAgent>,
}

impl BlockAgent {
    pub fn new(
        document: Arc<Document>,
        remote: Arc<dyn RemoteActions>,
        config: Config,
    ) -> anyhow::Result<Arc<Self>> {
        Self::build(document, remote, config, None)
    }

    /// Like [`BlockAgent::new`], also reporting bearer-token status at startup.
    pub fn with_credentials(
        document: Arc<Document>,
        remote: Arc<dyn RemoteActions>,
        config: Config,
        credentials: CredentialCell,
    ) -> anyhow::Result<Arc<Self>> {
        Self::build(document, remote, config, Some(credentials))
    }

    fn build(
        document: Arc<Document>,
        remote: Arc<dyn RemoteActions>,
        config: Config,
        credentials: Option<CredentialCell>,
    ) -> anyhow::Result<Arc<Self>> {
        let handles = HandleMatcher::new()?;
        Ok(Arc::new_cyclic(|this| Self {
            document,
            remote,
            config,
            credentials,
            selectors: Selectors::default(),
            handles,
            controls: Mutex::new(HashMap::new()),
            scans: AtomicU64::new(0),
            this: this.clone(),
        }))
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Number of scans run so far.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// The control injected as `button`, if any.
    pub fn control(&self, button: NodeId) -> Option<Arc<ActionControl>> {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&button)
            .cloned()
    }

    pub fn control_count(&self) -> usize {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ==================== Discovery ====================

    /// Attach a control to every card that lacks one. Returns how many were added.
    pub fn scan(&self) -> usize {
        self.scans.fetch_add(1, Ordering::Relaxed);

        self.prune_detached();

        let mut attached = 0;
        for card in self.document.query_all(self.document.root(), &self.selectors.card) {
            let Some(anchor) = self.document.query(card, &self.selectors.anchor) else {
                continue;
            };
            if self.attach(card, anchor).is_some() {
                attached += 1;
            }
        }

        if attached > 0 {
            tracing::debug!("Attached {} block controls", attached);
        }
        attached
    }

    /// Forget idle controls whose button has left the document and release
    /// their click listeners. A busy control stays until its feedback reverts.
    fn prune_detached(&self) {
        let mut released = Vec::new();
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|button, control| {
                let keep =
                    self.document.is_connected(*button) || control.state() != ControlState::Idle;
                if !keep {
                    released.push(*button);
                }
                keep
            });
        for button in released {
            self.document.remove_click_listeners(button);
        }
    }

    /// Insert a control right before `anchor`, unless its container already
    /// has a registered one. A control that came back with a re-attached card
    /// is registered again in place.
    fn attach(&self, card: NodeId, anchor: NodeId) -> Option<Arc<ActionControl>> {
        let container = self.document.parent(anchor)?;
        if let Some(existing) = self.document.query(container, &self.selectors.control) {
            if self.control(existing).is_some() {
                return None;
            }
            tracing::debug!("Re-registering block control {:?}", existing);
            return Some(self.bind(existing, card));
        }

        let button = build_control(&self.document);
        if let Err(e) = self.document.insert_before(container, button, Some(anchor)) {
            tracing::warn!("Failed to insert block control: {}", e);
            return None;
        }
        Some(self.bind(button, card))
    }

    /// Register `button` as an idle control for `card` and listen for its clicks.
    fn bind(&self, button: NodeId, card: NodeId) -> Arc<ActionControl> {
        let control = Arc::new(ActionControl::new(button, card));
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(button, control.clone());

        let agent = self.this.clone();
        self.document.add_click_listener(
            button,
            Arc::new(move |event: &mut ClickEvent| {
                event.prevent_default();
                event.stop_propagation();

                let Some(agent) = agent.upgrade() else {
                    return;
                };
                let button = event.current_target;
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(async move {
                            agent.activate(button).await;
                        });
                    }
                    Err(e) => tracing::error!("No async runtime to handle click: {}", e),
                }
            }),
        );

        control
    }

    /// Whether a mutation can have introduced new cards.
    fn is_relevant(&self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::ChildAdded { child, .. } => !self.document.has_class(*child, CONTROL_CLASS),
            Mutation::ChildRemoved { .. } => false,
        }
    }

    /// Scan once the document is ready, then keep scanning after mutation
    /// bursts until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tokio::select! {
            _ = self.document.wait_ready() => {}
            _ = shutdown.cancelled() => return,
        }

        let mut mutations = self.document.subscribe();
        self.scan();
        tracing::info!("Easy Block initialized");
        match &self.credentials {
            Some(cell) if cell.is_present() => tracing::info!("Bearer token ready"),
            Some(_) => tracing::info!("Bearer token will be captured on first API request"),
            None => {}
        }

        let window = self.config.debounce();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = mutations.recv() => match received {
                    Ok(mutation) => {
                        if self.is_relevant(&mutation) {
                            deadline = Some(Instant::now() + window);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Mutation observer lagged by {} records", skipped);
                        deadline = Some(Instant::now() + window);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.scan();
                }
            }
        }

        tracing::info!("Easy Block stopped");
    }

    // ==================== Activation ====================

    /// Run the block pipeline for the control injected as `button`.
    pub async fn activate(&self, button: NodeId) -> ActivationOutcome {
        let Some(control) = self.control(button) else {
            return ActivationOutcome::Ignored;
        };
        if control.state() == ControlState::Loading {
            tracing::debug!("Block already in progress, ignoring click");
            return ActivationOutcome::Ignored;
        }

        let Some(handle) = self.extract_handle(control.card()) else {
            tracing::error!(stage = "extract", "Could not find username");
            if let Some((_, epoch)) = control.apply(&self.document, ControlEvent::Reject) {
                self.schedule_revert(control, epoch);
            }
            return ActivationOutcome::Failed(AgentError::HandleNotFound);
        };

        if control.apply(&self.document, ControlEvent::Activate).is_none() {
            return ActivationOutcome::Ignored;
        }

        let result = self.block_handle(&handle).await;

        let (event, outcome) = match result {
            Ok(user_id) => {
                tracing::info!("Blocked @{} ({})", handle, user_id);
                (
                    ControlEvent::Succeeded,
                    ActivationOutcome::Blocked { handle, user_id },
                )
            }
            Err(e) => {
                tracing::error!(handle = %handle, stage = e.stage(), "Error blocking user: {}", e);
                (ControlEvent::Failed, ActivationOutcome::Failed(e))
            }
        };

        if let Some((_, epoch)) = control.apply(&self.document, event) {
            self.schedule_revert(control, epoch);
        }
        outcome
    }

    /// Resolve then block; the block call is only made after a successful resolve.
    async fn block_handle(&self, handle: &str) -> AgentResult<String> {
        let user_id = self.remote.resolve_identity(handle).await?;
        self.remote.block_subject(&user_id).await?;
        Ok(user_id)
    }

    fn extract_handle(&self, card: NodeId) -> Option<String> {
        let hrefs: Vec<String> = self
            .document
            .query_all(card, &self.selectors.link)
            .into_iter()
            .filter_map(|link| self.document.attribute(link, "href"))
            .collect();
        self.handles.first_handle(hrefs.iter().map(String::as_str))
    }

    fn schedule_revert(&self, control: Arc<ActionControl>, epoch: u64) {
        let document = self.document.clone();
        let delay = self.config.feedback();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            control.revert(&document, epoch);
        });
    }
}
