use std::path::Path;

use vfs_lib::ids;
use vfs_lib::token;

use crate::accounts::{Accounts, ConfigAccounts, UserLimit};
use crate::config;
use crate::context::Context;
use crate::error::{self, OpResult};
use crate::favorites::Favorites;
use crate::hooks::Hooks;
use crate::links::LinkIndex;
use crate::resolve::Resolver;
use crate::snapshot::Snapshot;

pub const TOKEN_KEY_INFO: &[u8] = b"vfs_token_key";
pub const LINKS_SNAPSHOT: &str = "links.json";
pub const FAVORITES_SNAPSHOT: &str = "favorites.json";
pub const LIMITS_SNAPSHOT: &str = "limits.json";

pub struct Shared {
    resolver: Resolver,
    token_key: token::Key,
    public_url: String,
    upload_limit: u64,
    accounts: Box<dyn Accounts>,
    limits: Option<Snapshot>,
    links: LinkIndex,
    favorites: Favorites,
    hooks: Hooks,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("resolver", &self.resolver)
            .field("public_url", &self.public_url)
            .field("upload_limit", &self.upload_limit)
            .field("links", &self.links.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl Shared {
    pub fn from_config(config: &config::Config) -> error::Result<Shared> {
        tracing::debug!("creating Shared state");

        let data = &config.settings.data;
        let accounts = ConfigAccounts::from_settings(&config.settings);
        let limits = Snapshot::new(data.join(LIMITS_SNAPSHOT));

        for changed in limits.load::<UserLimit>()? {
            if !accounts.set_user_limit(&changed.user_id, changed.space_limit) {
                tracing::warn!("dropping stored limit of unknown user {}", changed.user_id);
            }
        }

        Ok(Shared {
            resolver: Resolver::new(data.clone()),
            token_key: config.derive_key(TOKEN_KEY_INFO)?,
            public_url: config.settings.public_url.clone(),
            upload_limit: config.settings.quota.upload_size_limit,
            accounts: Box::new(accounts),
            limits: Some(limits),
            links: LinkIndex::open(data.join(LINKS_SNAPSHOT))?,
            favorites: Favorites::open(data.join(FAVORITES_SNAPSHOT))?,
            hooks: Hooks::new(),
        })
    }

    /// state with in memory tables, for embedding and tests
    pub fn new<P, A>(data: P, token_key: token::Key, accounts: A) -> Shared
    where
        P: AsRef<Path>,
        A: Accounts + 'static,
    {
        Shared {
            resolver: Resolver::new(data.as_ref()),
            token_key,
            public_url: String::new(),
            upload_limit: 0,
            accounts: Box::new(accounts),
            limits: None,
            links: LinkIndex::new(),
            favorites: Favorites::new(),
            hooks: Hooks::new(),
        }
    }

    pub fn with_upload_limit(mut self, limit: u64) -> Self {
        self.upload_limit = limit;
        self
    }

    pub fn with_public_url<U>(mut self, url: U) -> Self
    where
        U: Into<String>
    {
        self.public_url = url.into();
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn token_key(&self) -> &token::Key {
        &self.token_key
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// 0 is unlimited
    pub fn upload_limit(&self) -> u64 {
        self.upload_limit
    }

    pub fn accounts(&self) -> &dyn Accounts {
        self.accounts.as_ref()
    }

    /// writes the user limits changed at runtime if the state was created
    /// from a config
    pub async fn persist_limits(&self) -> OpResult<()> {
        let Some(snapshot) = &self.limits else {
            return Ok(());
        };

        snapshot.save(|| self.accounts.changed_limits()).await
    }

    pub fn links(&self) -> &LinkIndex {
        &self.links
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn context(&self, user_id: &ids::UserId) -> Context {
        Context::lookup(self.accounts(), user_id)
    }
}
