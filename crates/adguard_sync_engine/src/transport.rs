//! Instance client abstraction.

use crate::error::{SyncError, SyncResult};
use adguard_sync_model::{
    Client, Filter, FilterList, FilteringConfig, FilteringStatus, RewriteEntry, Services, Status,
    Toggle, UserRules,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Capabilities of one AdGuard Home instance.
///
/// This trait abstracts the transport, allowing the engine to run against
/// the HTTP API or an in-memory mock. Every call may fail independently;
/// mutating calls act on exactly one item so that failures stay item-scoped.
#[async_trait]
pub trait InstanceClient: Send + Sync {
    /// Name of the instance (its host) for logs and reports.
    fn name(&self) -> &str;

    /// Reads the instance status. Used as the connectivity probe.
    async fn status(&self) -> SyncResult<Status>;

    /// Reads all DNS rewrites.
    async fn rewrites(&self) -> SyncResult<Vec<RewriteEntry>>;

    /// Adds one DNS rewrite.
    async fn add_rewrite(&self, entry: &RewriteEntry) -> SyncResult<()>;

    /// Deletes one DNS rewrite.
    async fn delete_rewrite(&self, entry: &RewriteEntry) -> SyncResult<()>;

    /// Reads filter lists, custom rules and the filtering config.
    async fn filtering(&self) -> SyncResult<FilteringStatus>;

    /// Subscribes to a filter list.
    async fn add_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()>;

    /// Replaces name and enabled flag of the subscription at `filter.url`.
    async fn update_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()>;

    /// Unsubscribes from the filter list at `filter.url`.
    async fn delete_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()>;

    /// Re-downloads the filter lists of one partition.
    async fn refresh_filters(&self, list: FilterList) -> SyncResult<()>;

    /// Replaces the custom filtering rules.
    async fn set_custom_rules(&self, rules: &UserRules) -> SyncResult<()>;

    /// Sets the filtering enable flag and update interval.
    async fn set_filtering_config(&self, config: FilteringConfig) -> SyncResult<()>;

    /// Reads whether a protection feature is on.
    async fn toggle_status(&self, toggle: Toggle) -> SyncResult<bool>;

    /// Switches a protection feature on or off.
    async fn set_toggle(&self, toggle: Toggle, enabled: bool) -> SyncResult<()>;

    /// Reads the globally blocked services.
    async fn services(&self) -> SyncResult<Services>;

    /// Replaces the globally blocked services.
    async fn set_services(&self, services: &Services) -> SyncResult<()>;

    /// Reads the configured clients.
    async fn clients(&self) -> SyncResult<Vec<Client>>;

    /// Adds a client.
    async fn add_client(&self, client: &Client) -> SyncResult<()>;

    /// Replaces the client with the same name.
    async fn update_client(&self, client: &Client) -> SyncResult<()>;

    /// Deletes a client.
    async fn delete_client(&self, client: &Client) -> SyncResult<()>;
}

/// Read endpoints of the mock instance, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockRead {
    /// `status()`.
    Status,
    /// `rewrites()`.
    Rewrites,
    /// `filtering()`.
    Filtering,
    /// `toggle_status()`.
    Toggles,
    /// `services()`.
    Services,
    /// `clients()`.
    Clients,
}

/// A mutating call received by the mock instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `add_rewrite`.
    AddRewrite(RewriteEntry),
    /// `delete_rewrite`.
    DeleteRewrite(RewriteEntry),
    /// `add_filter`.
    AddFilter(FilterList, Filter),
    /// `update_filter`.
    UpdateFilter(FilterList, Filter),
    /// `delete_filter`.
    DeleteFilter(FilterList, Filter),
    /// `refresh_filters`.
    RefreshFilters(FilterList),
    /// `set_custom_rules`.
    SetCustomRules(UserRules),
    /// `set_filtering_config`.
    SetFilteringConfig(FilteringConfig),
    /// `set_toggle`.
    SetToggle(Toggle, bool),
    /// `set_services`.
    SetServices(Services),
    /// `add_client`.
    AddClient(Client),
    /// `update_client`.
    UpdateClient(Client),
    /// `delete_client`.
    DeleteClient(Client),
}

/// Configuration held by a mock instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockState {
    /// Status returned by the probe.
    pub status: Status,
    /// DNS rewrites.
    pub rewrites: Vec<RewriteEntry>,
    /// Filters, custom rules and filtering config.
    pub filtering: FilteringStatus,
    /// Protection features.
    pub toggles: BTreeMap<Toggle, bool>,
    /// Blocked services.
    pub services: Services,
    /// Configured clients.
    pub clients: Vec<Client>,
}

/// Tracks how many calls are in flight across a set of mock instances.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    /// Creates a tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of concurrent calls seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-memory AdGuard Home instance for testing.
///
/// Mutations change the held state, so running the engine twice against the
/// same mock converges. Every mutating call is recorded, including rejected
/// ones. Item keys used by [`MockInstance::reject`] are the rewrite domain,
/// filter URL, client name, toggle path, or one of `custom_rules`,
/// `services`, `filtering` and `refresh`.
#[derive(Debug)]
pub struct MockInstance {
    name: String,
    state: Mutex<MockState>,
    calls: Mutex<Vec<MockCall>>,
    reachable: AtomicBool,
    failing_reads: Mutex<HashMap<MockRead, SyncError>>,
    panicking_reads: Mutex<HashSet<MockRead>>,
    rejections: Mutex<HashMap<String, SyncError>>,
    next_filter_id: AtomicI64,
    latency: Duration,
    in_flight: Option<Arc<InFlight>>,
}

impl MockInstance {
    /// Creates a reachable, empty mock instance.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MockState::default()),
            calls: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            failing_reads: Mutex::new(HashMap::new()),
            panicking_reads: Mutex::new(HashSet::new()),
            rejections: Mutex::new(HashMap::new()),
            next_filter_id: AtomicI64::new(1),
            latency: Duration::ZERO,
            in_flight: None,
        }
    }

    /// Sets the reported version.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        self.state.lock().status.version = version.into();
        self
    }

    /// Sets the DNS rewrites.
    pub fn with_rewrites(self, rewrites: Vec<RewriteEntry>) -> Self {
        self.state.lock().rewrites = rewrites;
        self
    }

    /// Sets the filters of one partition.
    pub fn with_filters(self, list: FilterList, filters: Vec<Filter>) -> Self {
        {
            let mut state = self.state.lock();
            match list {
                FilterList::Blacklist => state.filtering.filters = filters,
                FilterList::Whitelist => state.filtering.whitelist_filters = filters,
            }
        }
        self
    }

    /// Sets the custom rules.
    pub fn with_user_rules(self, rules: UserRules) -> Self {
        self.state.lock().filtering.user_rules = rules;
        self
    }

    /// Sets the filtering enable flag and interval.
    pub fn with_filtering_config(self, config: FilteringConfig) -> Self {
        {
            let mut state = self.state.lock();
            state.filtering.enabled = config.enabled;
            state.filtering.interval = config.interval;
        }
        self
    }

    /// Sets a protection feature.
    pub fn with_toggle(self, toggle: Toggle, enabled: bool) -> Self {
        self.state.lock().toggles.insert(toggle, enabled);
        self
    }

    /// Sets the blocked services.
    pub fn with_services(self, services: Services) -> Self {
        self.state.lock().services = services;
        self
    }

    /// Sets the clients.
    pub fn with_clients(self, clients: Vec<Client>) -> Self {
        self.state.lock().clients = clients;
        self
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reports every call to a shared in-flight tracker.
    pub fn with_in_flight(mut self, tracker: Arc<InFlight>) -> Self {
        self.in_flight = Some(tracker);
        self
    }

    /// Makes every call fail with a connection error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes a read endpoint fail with `error`.
    pub fn fail_read(&self, read: MockRead, error: SyncError) {
        self.failing_reads.lock().insert(read, error);
    }

    /// Makes a read endpoint panic.
    pub fn panic_on_read(&self, read: MockRead) {
        self.panicking_reads.lock().insert(read);
    }

    /// Makes every mutation of the item with `key` fail with `error`.
    pub fn reject(&self, key: impl Into<String>, error: SyncError) {
        self.rejections.lock().insert(key.into(), error);
    }

    /// Returns a copy of the current state.
    pub fn state(&self) -> MockState {
        self.state.lock().clone()
    }

    /// Returns the mutating calls received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn simulate(&self) -> SyncResult<()> {
        let _guard = self.in_flight.as_ref().map(InFlight::enter);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::connection(format!(
                "{}: connection refused",
                self.name
            )))
        }
    }

    #[allow(clippy::panic)]
    async fn read(&self, read: MockRead) -> SyncResult<()> {
        self.simulate().await?;
        if self.panicking_reads.lock().contains(&read) {
            panic!("{}: injected panic on {:?}", self.name, read);
        }
        match self.failing_reads.lock().get(&read) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn mutate(&self, call: MockCall, key: &str) -> SyncResult<()> {
        self.simulate().await?;
        self.calls.lock().push(call);
        match self.rejections.lock().get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn filters_mut(state: &mut MockState, list: FilterList) -> &mut Vec<Filter> {
        match list {
            FilterList::Blacklist => &mut state.filtering.filters,
            FilterList::Whitelist => &mut state.filtering.whitelist_filters,
        }
    }
}

#[async_trait]
impl InstanceClient for MockInstance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> SyncResult<Status> {
        self.read(MockRead::Status).await?;
        Ok(self.state.lock().status.clone())
    }

    async fn rewrites(&self) -> SyncResult<Vec<RewriteEntry>> {
        self.read(MockRead::Rewrites).await?;
        Ok(self.state.lock().rewrites.clone())
    }

    async fn add_rewrite(&self, entry: &RewriteEntry) -> SyncResult<()> {
        self.mutate(MockCall::AddRewrite(entry.clone()), &entry.domain)
            .await?;
        self.state.lock().rewrites.push(entry.clone());
        Ok(())
    }

    async fn delete_rewrite(&self, entry: &RewriteEntry) -> SyncResult<()> {
        self.mutate(MockCall::DeleteRewrite(entry.clone()), &entry.domain)
            .await?;
        let mut state = self.state.lock();
        if let Some(pos) = state.rewrites.iter().position(|e| e == entry) {
            state.rewrites.remove(pos);
        }
        Ok(())
    }

    async fn filtering(&self) -> SyncResult<FilteringStatus> {
        self.read(MockRead::Filtering).await?;
        Ok(self.state.lock().filtering.clone())
    }

    async fn add_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()> {
        self.mutate(MockCall::AddFilter(list, filter.clone()), &filter.url)
            .await?;
        let mut state = self.state.lock();
        let filters = Self::filters_mut(&mut state, list);
        if filters.iter().any(|f| f.url == filter.url) {
            return Err(SyncError::http(400, "filter URL already added"));
        }
        filters.push(Filter {
            id: self.next_filter_id.fetch_add(1, Ordering::SeqCst),
            enabled: true,
            url: filter.url.clone(),
            name: filter.name.clone(),
            ..Filter::default()
        });
        Ok(())
    }

    async fn update_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()> {
        self.mutate(MockCall::UpdateFilter(list, filter.clone()), &filter.url)
            .await?;
        let mut state = self.state.lock();
        let filters = Self::filters_mut(&mut state, list);
        match filters.iter_mut().find(|f| f.url == filter.url) {
            Some(existing) => {
                existing.name = filter.name.clone();
                existing.enabled = filter.enabled;
                Ok(())
            }
            None => Err(SyncError::http(400, "filter URL not found")),
        }
    }

    async fn delete_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()> {
        self.mutate(MockCall::DeleteFilter(list, filter.clone()), &filter.url)
            .await?;
        let mut state = self.state.lock();
        Self::filters_mut(&mut state, list).retain(|f| f.url != filter.url);
        Ok(())
    }

    async fn refresh_filters(&self, list: FilterList) -> SyncResult<()> {
        self.mutate(MockCall::RefreshFilters(list), "refresh").await
    }

    async fn set_custom_rules(&self, rules: &UserRules) -> SyncResult<()> {
        self.mutate(MockCall::SetCustomRules(rules.clone()), "custom_rules")
            .await?;
        self.state.lock().filtering.user_rules = rules.clone();
        Ok(())
    }

    async fn set_filtering_config(&self, config: FilteringConfig) -> SyncResult<()> {
        self.mutate(MockCall::SetFilteringConfig(config), "filtering")
            .await?;
        let mut state = self.state.lock();
        state.filtering.enabled = config.enabled;
        state.filtering.interval = config.interval;
        Ok(())
    }

    async fn toggle_status(&self, toggle: Toggle) -> SyncResult<bool> {
        self.read(MockRead::Toggles).await?;
        Ok(self
            .state
            .lock()
            .toggles
            .get(&toggle)
            .copied()
            .unwrap_or(false))
    }

    async fn set_toggle(&self, toggle: Toggle, enabled: bool) -> SyncResult<()> {
        self.mutate(MockCall::SetToggle(toggle, enabled), toggle.path())
            .await?;
        self.state.lock().toggles.insert(toggle, enabled);
        Ok(())
    }

    async fn services(&self) -> SyncResult<Services> {
        self.read(MockRead::Services).await?;
        Ok(self.state.lock().services.clone())
    }

    async fn set_services(&self, services: &Services) -> SyncResult<()> {
        self.mutate(MockCall::SetServices(services.clone()), "services")
            .await?;
        self.state.lock().services = services.clone();
        Ok(())
    }

    async fn clients(&self) -> SyncResult<Vec<Client>> {
        self.read(MockRead::Clients).await?;
        Ok(self.state.lock().clients.clone())
    }

    async fn add_client(&self, client: &Client) -> SyncResult<()> {
        self.mutate(MockCall::AddClient(client.clone()), &client.name)
            .await?;
        let mut state = self.state.lock();
        if state.clients.iter().any(|c| c.name == client.name) {
            return Err(SyncError::http(400, "client already exists"));
        }
        state.clients.push(client.clone());
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> SyncResult<()> {
        self.mutate(MockCall::UpdateClient(client.clone()), &client.name)
            .await?;
        let mut state = self.state.lock();
        match state.clients.iter_mut().find(|c| c.name == client.name) {
            Some(existing) => {
                *existing = client.clone();
                Ok(())
            }
            None => Err(SyncError::http(400, "client not found")),
        }
    }

    async fn delete_client(&self, client: &Client) -> SyncResult<()> {
        self.mutate(MockCall::DeleteClient(client.clone()), &client.name)
            .await?;
        self.state.lock().clients.retain(|c| c.name != client.name);
        Ok(())
    }
}
