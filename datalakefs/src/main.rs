mod cli;

use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use datalakefs_adapter::DataLakeFileSystem;
use datalakefs_common::{FileSystem, RemoteUri};
use datalakefs_store::FileSystemConfig;

use cli::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = cli::parse(&args)?;

    let config_path = invocation.resolve_config_path();
    let config = FileSystemConfig::load(&config_path)?;
    info!(config = %config_path.display(), account = %config.account_fqdn, "Configuration loaded");
    cli::check_store(&config.store, &invocation.command)?;

    let client = datalakefs_store::from_config(&config)?;
    let fs = DataLakeFileSystem::new(client)?;

    run(&fs, invocation.command).await
}

/// Accept either a full URI or a bare path.
fn resolve(fs: &DataLakeFileSystem, arg: &str) -> anyhow::Result<RemoteUri> {
    if arg.contains("://") {
        Ok(RemoteUri::parse(arg)?)
    } else {
        Ok(fs.create_uri_for_path(Some(arg))?)
    }
}

async fn run(fs: &DataLakeFileSystem, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Exists(path) => {
            println!("{}", fs.exists(&resolve(fs, &path)?).await?);
        }
        Command::Stat(path) => {
            let uri = resolve(fs, &path)?;
            let status = fs.get_file_status(Some(&uri)).await?;
            println!(
                "{}\t{}\t{}",
                uri,
                status.length_bytes,
                status.modification_time.to_rfc3339()
            );
        }
        Command::Ls(path) => {
            for child in fs.get_children(&resolve(fs, &path)?).await? {
                println!("{}", child);
            }
        }
        Command::Mkdir(path) => fs.create_directory(&resolve(fs, &path)?).await?,
        Command::Rm(path) => fs.delete(&resolve(fs, &path)?).await?,
        Command::Rmdir(path) => fs.delete_directory(&resolve(fs, &path)?).await?,
        Command::Put { local, remote } => {
            fs.copy_from_local(&local, &resolve(fs, &remote)?).await?;
        }
        Command::Get { remote, local } => {
            fs.copy_to_local(&resolve(fs, &remote)?, &local).await?;
        }
        Command::Cat(path) => {
            let mut stream = fs.open(&resolve(fs, &path)?).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await?;
            stdout.flush().await?;
        }
        Command::Write { remote, text } => {
            let mut stream = fs.create(&resolve(fs, &remote)?).await?;
            stream.write_all(text.as_bytes()).await?;
            stream.shutdown().await?;
        }
        Command::Uri(path) => {
            println!("{}", fs.create_uri_for_path(Some(&path))?);
        }
    }
    Ok(())
}
