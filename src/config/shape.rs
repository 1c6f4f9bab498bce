use std::path::PathBuf;
use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Quota {
    pub upload_size_limit_mb: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub enum Role {
    User,
    TenantAdmin,
    SuperAdmin,
}

#[derive(Debug, Deserialize)]
pub struct Tenant {
    pub space_limit_mb: Option<u64>,
    pub user_space_limit_mb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub tenant: Option<i64>,
    pub space_limit_mb: Option<u64>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub data: Option<PathBuf>,
    pub master_key: Option<String>,
    pub public_url: Option<String>,

    pub quota: Option<Quota>,

    pub tenants: Option<HashMap<i64, Tenant>>,
    pub users: Option<HashMap<i64, User>>,
}
