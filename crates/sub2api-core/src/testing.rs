//! Hand-written fakes for the upstream and account ports

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::ports::{AccountRepository, AntigravityApi, ClaudeUsageFetcher, OAuthTokenClient};
use crate::upstream::{
    ClaudeUsageResponse, FetchAvailableModelsResponse, LoadCodeAssistResponse, TokenInfo,
};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Default)]
pub struct FakeAccounts {
    accounts: Mutex<Vec<Account>>,
    updates: Mutex<Vec<Account>>,
    fail_update: Mutex<HashSet<i64>>,
    pub fail_list: AtomicBool,
    pub list_calls: AtomicU32,
}

impl FakeAccounts {
    pub fn with(accounts: Vec<Account>) -> Self {
        let fake = Self::default();
        *lock(&fake.accounts) = accounts;
        fake
    }

    pub fn fail_update_for(&self, id: i64) {
        lock(&self.fail_update).insert(id);
    }

    pub fn updates(&self) -> Vec<Account> {
        lock(&self.updates).clone()
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountRepository for FakeAccounts {
    async fn get_by_id(&self, id: i64) -> Result<Account> {
        lock(&self.accounts)
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(Error::AccountNotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<Account>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Repository("connection refused".to_string()));
        }
        Ok(lock(&self.accounts)
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect())
    }

    async fn update(&self, account: &Account) -> Result<()> {
        if lock(&self.fail_update).contains(&account.id) {
            return Err(Error::Repository("write conflict".to_string()));
        }
        lock(&self.updates).push(account.clone());
        let mut accounts = lock(&self.accounts);
        if let Some(slot) = accounts.iter_mut().find(|a| a.id == account.id) {
            *slot = account.clone();
        }
        Ok(())
    }
}

// ============================================================================
// OAuth
// ============================================================================

#[derive(Default)]
pub struct FakeOAuth {
    responses: Mutex<VecDeque<Result<TokenInfo>>>,
    proxies: Mutex<Vec<Option<String>>>,
    pub calls: AtomicU32,
}

impl FakeOAuth {
    pub fn push(&self, response: Result<TokenInfo>) {
        lock(&self.responses).push_back(response);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn proxies(&self) -> Vec<Option<String>> {
        lock(&self.proxies).clone()
    }
}

#[async_trait]
impl OAuthTokenClient for FakeOAuth {
    async fn refresh_token(&self, _account: &Account, proxy_url: Option<&str>) -> Result<TokenInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.proxies).push(proxy_url.map(str::to_string));
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(Error::Upstream("no scripted response".to_string())))
    }
}

// ============================================================================
// Antigravity
// ============================================================================

#[derive(Default)]
pub struct FakeAntigravity {
    pub load: Mutex<Option<LoadCodeAssistResponse>>,
    pub models: Mutex<HashMap<String, FetchAvailableModelsResponse>>,
    fetched: Mutex<Vec<(String, String, Option<String>)>>,
    pub load_calls: AtomicU32,
}

impl FakeAntigravity {
    /// Scripts the models response for one access token
    pub fn models_for(&self, token: &str, response: FetchAvailableModelsResponse) {
        lock(&self.models).insert(token.to_string(), response);
    }

    pub fn set_load(&self, response: LoadCodeAssistResponse) {
        *lock(&self.load) = Some(response);
    }

    /// `(access_token, project_id, proxy_url)` of each models call
    pub fn fetched(&self) -> Vec<(String, String, Option<String>)> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl AntigravityApi for FakeAntigravity {
    async fn load_code_assist(
        &self,
        _access_token: &str,
        _proxy_url: Option<&str>,
    ) -> Result<LoadCodeAssistResponse> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.load)
            .clone()
            .ok_or_else(|| Error::Upstream("loadCodeAssist: 503".to_string()))
    }

    async fn fetch_available_models(
        &self,
        access_token: &str,
        project_id: &str,
        proxy_url: Option<&str>,
    ) -> Result<FetchAvailableModelsResponse> {
        lock(&self.fetched).push((
            access_token.to_string(),
            project_id.to_string(),
            proxy_url.map(str::to_string),
        ));
        lock(&self.models)
            .get(access_token)
            .cloned()
            .ok_or_else(|| Error::Upstream("fetchAvailableModels: 429".to_string()))
    }
}

// ============================================================================
// Claude usage
// ============================================================================

#[derive(Default)]
pub struct FakeUsageFetcher {
    pub response: Mutex<Option<ClaudeUsageResponse>>,
    pub calls: AtomicU32,
}

impl FakeUsageFetcher {
    pub fn returning(response: ClaudeUsageResponse) -> Self {
        let fake = Self::default();
        *lock(&fake.response) = Some(response);
        fake
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaudeUsageFetcher for FakeUsageFetcher {
    async fn fetch_usage(
        &self,
        _access_token: &str,
        _proxy_url: Option<&str>,
    ) -> Result<ClaudeUsageResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.response)
            .clone()
            .ok_or_else(|| Error::Upstream("usage: 500".to_string()))
    }
}
