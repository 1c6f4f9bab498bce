use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::default::Default;
use std::fmt::{Display, Formatter};

use clap::Parser;
use vfs_lib::ids;

use crate::accounts::Role;
use crate::cli::Command;
use crate::error::{self, Context};
use crate::path::{metadata, normalize};

mod shape;

pub type Kdf = hkdf::Hkdf<sha3::Sha3_512>;

pub const MB: u64 = 1024 * 1024;

pub trait TryDefault: Sized {
    type Error;

    fn try_default() -> Result<Self, Self::Error>;
}

#[derive(Debug, Parser)]
#[command(author, version ,about, long_about = None)]
pub struct CliArgs {
    /// a config path or directory to load file from
    #[arg(long)]
    pub config: Vec<PathBuf>,

    /// the user to run the command as
    #[arg(long, short, default_value_t = 0)]
    pub user: ids::UserId,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
    pub kdf: Kdf,
}

impl Config {
    pub fn from_args(args: &CliArgs) -> error::Result<Self> {
        let cwd = std::env::current_dir()
            .context("failed to retrieve cwd for Settings")?;
        let mut settings = Settings::try_default()?;

        for config_path in &args.config {
            let full = if config_path.is_absolute() {
                config_path.clone()
            } else {
                normalize(cwd.join(config_path))
            };

            tracing::debug!("loading config file \"{}\"", full.display());

            let loaded = Self::load_file(&full)?;
            let src = SrcFile::new(&full)?;
            let dot = DotPath::new(&"settings");

            settings.merge(&src, dot, loaded)?;
        }

        {
            let meta = metadata(&settings.data).context(
                "failed to retrieve metadata for settings.data"
            )?.context(
                "settings.data does not exist"
            )?;

            if !meta.is_dir() {
                return Err(error::Error::new().message(
                    "settings.data is not a directory"
                ));
            }
        }

        tracing::debug!("{settings:#?}");

        let kdf = Kdf::new(None, settings.master_key.as_bytes());

        Ok(Config {
            settings,
            kdf
        })
    }

    /// derives a fixed length key for the given purpose from the master key
    pub fn derive_key<const N: usize>(&self, info: &[u8]) -> error::Result<[u8; N]> {
        let mut key = [0u8; N];

        self.kdf.expand(info, &mut key)?;

        Ok(key)
    }

    fn load_file(path: &PathBuf) -> error::Result<shape::Settings> {
        let ext = path.extension().context(format!(
            "failed to retrieve the file extension for config file: \"{}\"", path.display()
        ))?;

        let ext = ext.to_ascii_lowercase();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .context(format!("failed to open config file: \"{}\"", path.display()))?;
        let reader = std::io::BufReader::new(file);

        if ext.eq("yaml") || ext.eq("yml") {
            serde_yaml::from_reader(reader).context(format!(
                "failed to parse yaml config file: \"{}\"", path.display()
            ))
        } else if ext.eq("json") {
            serde_json::from_reader(reader).context(format!(
                "failed to parse json config file: \"{}\"", path.display()
            ))
        } else {
            Err(error::Error::new().message(format!(
                "unknown type of config file: \"{}\"", path.display()
            )))
        }
    }
}

struct SrcFile<'a> {
    parent: &'a Path,
    src: &'a Path,
}

impl<'a> SrcFile<'a> {
    fn new(src: &'a Path) -> error::Result<Self> {
        let parent = src.parent().context(format!(
            "failed to retrieve parent path from source file \"{}\"", src.display()
        ))?;

        Ok(SrcFile {
            parent,
            src
        })
    }
}

impl<'a> Display for SrcFile<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.src.display())
    }
}

struct DotPath<'a>(Vec<&'a dyn Display>);

impl<'a> DotPath<'a> {
    fn new(name: &'a (dyn Display)) -> Self {
        DotPath(vec![name])
    }

    fn push(&self, name: &'a (dyn Display)) -> Self {
        let mut path = self.0.clone();
        path.push(name);

        DotPath(path)
    }
}

impl<'a> Display for DotPath<'a> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;

        for name in &self.0 {
            if first {
                write!(fmt, "{name}")?;
                first = false;
            } else {
                write!(fmt, ".{name}")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Settings {
    pub data: PathBuf,
    pub master_key: String,
    pub public_url: String,
    pub quota: Quota,
    pub tenants: HashMap<ids::TenantId, Tenant>,
    pub users: HashMap<ids::UserId, User>,
}

impl Settings {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, settings: shape::Settings) -> error::Result<()> {
        if let Some(data) = settings.data {
            self.data = check_dir(data, src, dot.push(&"data"))?;
        }

        if let Some(master_key) = settings.master_key {
            if master_key.is_empty() {
                return Err(error::Error::new().message(format!(
                    "{} cannot be empty. file: {src}", dot.push(&"master_key")
                )));
            }

            self.master_key = master_key;
        }

        if let Some(public_url) = settings.public_url {
            self.public_url = check_url(public_url, src, dot.push(&"public_url"))?;
        }

        if let Some(quota) = settings.quota {
            self.quota.merge(src, dot.push(&"quota"), quota)?;
        }

        if let Some(tenants) = settings.tenants {
            let tenants_dot = dot.push(&"tenants");

            for (id, tenant) in tenants {
                self.tenants.entry(id)
                    .or_insert_with(|| Tenant::with_id(id))
                    .merge(src, tenants_dot.push(&id), tenant)?;
            }
        }

        if let Some(users) = settings.users {
            let users_dot = dot.push(&"users");

            for (id, user) in users {
                if !ids::user_id_valid(&id) {
                    return Err(error::Error::new().message(format!(
                        "{users_dot}.{id} user ids must be greater than 0. file: {src}"
                    )));
                }

                self.users.entry(id)
                    .or_insert_with(|| User::with_id(id))
                    .merge(src, users_dot.push(&id), user)?;
            }
        }

        Ok(())
    }
}

impl TryDefault for Settings {
    type Error = error::Error;

    fn try_default() -> Result<Self, Self::Error> {
        let cwd = std::env::current_dir()
            .context("failed to retrieve cwd for Settings")?;

        Ok(Settings {
            data: cwd.join("data"),
            master_key: "vfs_master_key_secret".into(),
            public_url: String::new(),
            quota: Quota::default(),
            tenants: HashMap::new(),
            users: HashMap::new(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Quota {
    /// 0 is unlimited
    pub upload_size_limit: u64,
}

impl Quota {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, quota: shape::Quota) -> error::Result<()> {
        if let Some(mb) = quota.upload_size_limit_mb {
            self.upload_size_limit = mb_to_bytes(mb, src, dot.push(&"upload_size_limit_mb"))?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Tenant {
    pub id: ids::TenantId,
    pub space_limit: u64,
    pub user_space_limit: u64,
}

impl Tenant {
    fn with_id(id: ids::TenantId) -> Self {
        Tenant {
            id,
            space_limit: 0,
            user_space_limit: 0,
        }
    }

    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, tenant: shape::Tenant) -> error::Result<()> {
        if let Some(mb) = tenant.space_limit_mb {
            self.space_limit = mb_to_bytes(mb, src, dot.push(&"space_limit_mb"))?;
        }

        if let Some(mb) = tenant.user_space_limit_mb {
            self.user_space_limit = mb_to_bytes(mb, src, dot.push(&"user_space_limit_mb"))?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct User {
    pub id: ids::UserId,
    pub tenant: ids::TenantId,
    pub space_limit: Option<u64>,
    pub role: Role,
}

impl User {
    fn with_id(id: ids::UserId) -> Self {
        User {
            id,
            tenant: 0,
            space_limit: None,
            role: Role::User,
        }
    }

    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, user: shape::User) -> error::Result<()> {
        if let Some(tenant) = user.tenant {
            self.tenant = tenant;
        }

        if let Some(mb) = user.space_limit_mb {
            self.space_limit = Some(mb_to_bytes(mb, src, dot.push(&"space_limit_mb"))?);
        }

        if let Some(role) = user.role {
            self.role = match role {
                shape::Role::User => Role::User,
                shape::Role::TenantAdmin => Role::TenantAdmin,
                shape::Role::SuperAdmin => Role::SuperAdmin,
            };
        }

        Ok(())
    }
}

fn mb_to_bytes(mb: u64, src: &SrcFile<'_>, dot: DotPath<'_>) -> error::Result<u64> {
    mb.checked_mul(MB).context(format!(
        "{dot} {mb}MB is too large. file: {src}"
    ))
}

fn check_dir(given: PathBuf, src: &SrcFile<'_>, dot: DotPath<'_>) -> error::Result<PathBuf> {
    let full = if given.is_absolute() {
        given
    } else {
        normalize(src.parent.join(given))
    };

    tracing::debug!("{dot} {src} checking {}", full.display());

    let meta = metadata(&full).context(format!(
        "{dot} failed to retrieve metadata for: {src}"
    ))?.context(format!(
        "{dot} {src} was not found"
    ))?;

    if !meta.is_dir() {
        return Err(error::Error::new().message(format!(
            "{dot} is not a directory in: {src}"
        )));
    }

    Ok(full)
}

fn check_url(given: String, src: &SrcFile<'_>, dot: DotPath<'_>) -> error::Result<String> {
    let trimmed = given.trim().trim_end_matches('/');

    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let url = url::Url::parse(trimmed).context(format!(
        "{dot} \"{given}\" is not a valid url. file: {src}"
    ))?;

    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_owned()),
        _ => Err(error::Error::new().message(format!(
            "{dot} \"{given}\" must be an http or https url. file: {src}"
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const YAML: &str = r#"
data: "./storage"
master_key: "test_key"
public_url: "https://files.example.com/"
quota:
  upload_size_limit_mb: 5
tenants:
  1:
    space_limit_mb: 100
    user_space_limit_mb: 10
users:
  4:
    tenant: 1
    role: TenantAdmin
  5:
    tenant: 1
    space_limit_mb: 20
"#;

    fn load(contents: &str) -> (tempfile::TempDir, error::Result<Settings>) {
        let dir = tempfile::tempdir().expect("failed to create tmp dir");

        std::fs::create_dir(dir.path().join("storage")).expect("failed to create data dir");

        let file = dir.path().join("config.yaml");

        std::fs::write(&file, contents).expect("failed to write config file");

        let result = Config::load_file(&file).and_then(|loaded| {
            let mut settings = Settings::try_default()?;
            let src = SrcFile::new(&file)?;

            settings.merge(&src, DotPath::new(&"settings"), loaded)?;

            Ok(settings)
        });

        (dir, result)
    }

    #[test]
    fn merge_yaml() {
        let (dir, result) = load(YAML);
        let settings = result.expect("failed to load settings");

        assert_eq!(settings.data, dir.path().join("storage"));
        assert_eq!(settings.master_key, "test_key");
        assert_eq!(settings.public_url, "https://files.example.com");
        assert_eq!(settings.quota.upload_size_limit, 5 * MB);

        let tenant = settings.tenants.get(&1).expect("tenant 1 missing");

        assert_eq!(tenant.space_limit, 100 * MB);
        assert_eq!(tenant.user_space_limit, 10 * MB);

        let admin = settings.users.get(&4).expect("user 4 missing");

        assert_eq!(admin.role, Role::TenantAdmin);
        assert_eq!(admin.space_limit, None);
        assert_eq!(settings.users.get(&5).and_then(|u| u.space_limit), Some(20 * MB));
    }

    #[test]
    fn rejects_invalid() {
        let invalid = [
            "master_key: \"\"\n",
            "public_url: \"ftp://files.example.com\"\n",
            "data: \"./missing\"\n",
            "users:\n  0:\n    tenant: 1\n",
            "quota:\n  upload_size_limit_mb: 18446744073709551615\n",
            "tenants:\n  1:\n    space_limit_mb: 18446744073709551615\n",
            "users:\n  4:\n    space_limit_mb: 18446744073709551615\n",
        ];

        for contents in invalid {
            let (_dir, result) = load(contents);

            assert!(result.is_err(), "config was accepted: {contents:?}");
        }
    }
}
