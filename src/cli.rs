use std::path::PathBuf;

use bytes::Bytes;
use clap::{Args, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;

use crate::config::MB;
use crate::context::Context;
use crate::error::{self, Context as _};
use crate::ops::{self, ItemRef, ListOptions, Transfer, Upload, WriteOptions};
use crate::quota;
use crate::state::Shared;

fn parse_storage(given: &str) -> Result<StorageType, String> {
    given.parse::<StorageType>().map_err(|err| err.to_string())
}

fn parse_range(given: &str) -> Result<ops::RangeType, String> {
    let value: u8 = given.parse().map_err(|_| format!("\"{given}\" is not a number"))?;

    ops::RangeType::try_from(value).map_err(|_| String::from("range type must be 0, 1, 2 or 3"))
}

#[derive(Debug, Args)]
pub struct Target {
    /// storage to use. personal, shared, corporate or a custom name
    #[arg(long, short, default_value = "personal", value_parser(parse_storage))]
    pub storage: StorageType,

    /// logical path of the folder
    #[arg(long, short, default_value = "")]
    pub path: String,
}

#[derive(Debug, Args)]
pub struct ItemTarget {
    #[arg(long, short, default_value = "personal", value_parser(parse_storage))]
    pub storage: StorageType,

    /// logical path of the item
    pub item: String,
}

impl ItemTarget {
    fn split(&self) -> error::Result<(String, String)> {
        let full = logical::normalize(&self.item)
            .context(format!("invalid item path \"{}\"", self.item))?;
        let (parent, name) = logical::split_full(&full);

        if name.is_empty() {
            return Err(error::Error::new().message("item path is the storage root"));
        }

        Ok((parent.to_owned(), name.to_owned()))
    }
}

#[derive(Debug, Args)]
pub struct TransferArgs {
    #[arg(long, default_value = "personal", value_parser(parse_storage))]
    pub from_storage: StorageType,

    /// storage of the destination, defaults to the source storage
    #[arg(long, value_parser(parse_storage))]
    pub to_storage: Option<StorageType>,

    /// folder holding the items
    #[arg(long, default_value = "")]
    pub from: String,

    /// destination folder
    #[arg(long)]
    pub to: String,

    /// names of the items in the source folder
    #[arg(required = true)]
    pub names: Vec<String>,
}

impl TransferArgs {
    fn into_parts(self) -> (Transfer, Vec<ItemRef>) {
        let transfer = Transfer {
            to_type: self.to_storage.unwrap_or_else(|| self.from_storage.clone()),
            from_type: self.from_storage,
            from_path: self.from,
            to_path: self.to,
        };
        let items = self.names.into_iter()
            .map(ItemRef::file)
            .collect();

        (transfer, items)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// lists the contents of a folder
    Ls {
        #[command(flatten)]
        target: Target,

        /// search every folder below the path for names containing this
        #[arg(long)]
        pattern: Option<String>,

        /// list inside a published folder instead
        #[arg(long)]
        public: Option<String>,
    },

    /// shows a single item
    Info {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// creates a folder
    Mkdir {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// uploads a local file
    Put {
        #[command(flatten)]
        target: Target,

        /// local file to upload
        file: PathBuf,

        /// name to store the file under, defaults to the local name
        #[arg(long)]
        name: Option<String>,

        /// 0 overwrite, 1 append, 2 update from start, 3 update from end
        #[arg(long, default_value = "0", value_parser(parse_range))]
        range: ops::RangeType,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// replace an existing file instead of picking a free name
        #[arg(long)]
        overwrite: bool,
    },

    /// downloads a file to a local path or stdout
    Get {
        #[command(flatten)]
        target: ItemTarget,

        /// local destination, stdout when absent
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        #[arg(long)]
        length: Option<u64>,
    },

    /// creates a link to an external url
    Link {
        #[command(flatten)]
        target: Target,

        url: String,

        #[arg(long)]
        name: Option<String>,
    },

    /// renames an item inside its folder
    Rename {
        #[command(flatten)]
        target: ItemTarget,

        new_name: String,

        /// keep the link file extension
        #[arg(long)]
        link: bool,
    },

    /// moves items to another folder
    Mv(TransferArgs),

    /// copies items to another folder
    Cp(TransferArgs),

    /// deletes items from a folder
    Rm {
        #[command(flatten)]
        target: Target,

        #[arg(required = true)]
        names: Vec<String>,
    },

    /// publishes an item
    Share {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// removes the public link of an item
    Unshare {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// lists the public links of the user
    Published,

    /// adds an item to the favorites
    Fav {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// removes an item from the favorites
    Unfav {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// lists the favorites of the user
    Favs,

    /// shows used space and the limit
    Quota,

    /// changes the space limit of a user
    SetLimit {
        user: vfs_lib::ids::UserId,

        limit_mb: u64,
    },

    /// resolves an item token
    Token {
        token: String,
    },
}

fn print_json<T>(value: &T) -> error::Result<()>
where
    T: Serialize + ?Sized
{
    let output = serde_json::to_string_pretty(value)
        .context("failed to serialize output")?;

    println!("{output}");

    Ok(())
}

async fn upload(
    shared: &Shared,
    ctx: &Context,
    target: Target,
    file: PathBuf,
    name: Option<String>,
    options: WriteOptions,
) -> error::Result<()> {
    let name = match name {
        Some(name) => name,
        None => file.file_name()
            .and_then(|n| n.to_str())
            .map(ToOwned::to_owned)
            .context("the local file has no usable name, provide one with --name")?,
    };

    let local = tokio::fs::File::open(&file).await
        .context(format!("failed to open \"{}\"", file.display()))?;
    let length = local.metadata().await?.len();

    let item = ops::create_file(
        shared,
        ctx,
        &target.storage,
        &target.path,
        &name,
        Upload::new(local, length),
        options,
    ).await?;

    print_json(&item)
}

async fn download(
    shared: &Shared,
    ctx: &Context,
    target: ItemTarget,
    output: Option<PathBuf>,
    offset: u64,
    length: Option<u64>,
) -> error::Result<()> {
    let (path, name) = target.split()?;
    let (item, reader) = ops::read_range(shared, ctx, &target.storage, &path, &name, offset, length).await?;
    let mut stream = ReaderStream::new(reader);
    let mut written = 0u64;

    match output {
        Some(output) => {
            let mut local = tokio::fs::File::create(&output).await
                .context(format!("failed to create \"{}\"", output.display()))?;

            while let Some(chunk) = stream.next().await {
                let chunk: Bytes = chunk?;

                local.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            local.flush().await?;
        },
        None => {
            let mut stdout = tokio::io::stdout();

            while let Some(chunk) = stream.next().await {
                let chunk: Bytes = chunk?;

                stdout.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            stdout.flush().await?;
        }
    }

    tracing::debug!("read {written} of {} bytes from \"{}\"", item.size, item.full_path);

    Ok(())
}

pub async fn run(shared: &Shared, ctx: &Context, command: Command) -> error::Result<()> {
    match command {
        Command::Ls { target, pattern, public } => {
            let options = ListOptions {
                pattern,
                public_hash: public,
            };

            print_json(&ops::list(shared, ctx, &target.storage, &target.path, &options).await?)
        },
        Command::Info { target } => {
            let (path, name) = target.split()?;

            print_json(&ops::info(shared, ctx, &target.storage, &path, &name).await?)
        },
        Command::Mkdir { target } => {
            let (path, name) = target.split()?;

            print_json(&ops::create_folder(shared, ctx, &target.storage, &path, &name).await?)
        },
        Command::Put { target, file, name, range, offset, overwrite } => {
            let options = WriteOptions {
                range_type: range,
                offset,
                overwrite,
            };

            upload(shared, ctx, target, file, name, options).await
        },
        Command::Get { target, output, offset, length } => {
            download(shared, ctx, target, output, offset, length).await
        },
        Command::Link { target, url, name } => {
            print_json(&ops::create_link(shared, ctx, &target.storage, &target.path, name.as_deref(), &url).await?)
        },
        Command::Rename { target, new_name, link } => {
            let (path, name) = target.split()?;

            print_json(&ops::rename(shared, ctx, &target.storage, &path, &name, &new_name, link).await?)
        },
        Command::Mv(args) => {
            let (transfer, items) = args.into_parts();

            print_json(&ops::move_items(shared, ctx, &transfer, &items).await?)
        },
        Command::Cp(args) => {
            let (transfer, items) = args.into_parts();

            print_json(&ops::copy_items(shared, ctx, &transfer, &items).await?)
        },
        Command::Rm { target, names } => {
            let items: Vec<ItemRef> = names.into_iter()
                .map(ItemRef::file)
                .collect();

            print_json(&ops::delete_items(shared, ctx, &target.storage, &target.path, &items).await?)
        },
        Command::Share { target } => {
            let (path, name) = target.split()?;

            print_json(&ops::create_public_link(shared, ctx, &target.storage, &path, &name).await?)
        },
        Command::Unshare { target } => {
            let (path, name) = target.split()?;

            ops::delete_public_link(shared, ctx, &target.storage, &path, &name).await?;

            Ok(())
        },
        Command::Published => {
            print_json(&ops::public_links(shared, ctx)?)
        },
        Command::Fav { target } => {
            let (path, name) = target.split()?;

            print_json(&ops::add_to_favorites(shared, ctx, &target.storage, &path, &name).await?)
        },
        Command::Unfav { target } => {
            print_json(&ops::remove_from_favorites(shared, ctx, &target.storage, &target.item).await?)
        },
        Command::Favs => {
            print_json(&ops::favorites(shared, ctx)?)
        },
        Command::Quota => {
            print_json(&quota::quota(shared, ctx).await?)
        },
        Command::SetLimit { user, limit_mb } => {
            let limit = limit_mb.checked_mul(MB)
                .context(format!("limit of {limit_mb}MB is too large"))?;

            quota::set_user_limit(shared, ctx, &user, limit).await?;

            Ok(())
        },
        Command::Token { token } => {
            print_json(&ops::resolve_token(shared, ctx, &token).await?)
        },
    }
}
