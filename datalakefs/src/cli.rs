use std::path::PathBuf;

use anyhow::bail;

use datalakefs_store::StoreConfig;

pub const DEFAULT_CONFIG_PATH: &str = "datalakefs.toml";
pub const CONFIG_ENV: &str = "DATALAKEFS_CONFIG";

pub const USAGE: &str = "\
usage: datalakefs [-c config.toml] <command> [args]

commands:
  exists <path>            print whether an entry exists
  stat <path>              print modification time and length
  ls <path>                list the children of a directory
  mkdir <path>             create a directory
  rm <path>                delete a file or empty directory
  rmdir <path>             recursively delete a directory
  put <local> <remote>     upload a local file or tree
  get <remote> <local>     download a remote file or tree
  cat <remote>             write a remote file to stdout
  write <remote> <text>    create or overwrite a remote file with text
  uri <path>               print the canonical URI for a path

A store with kind = \"memory\" is empty on every run and only accepts `uri`.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exists(String),
    Stat(String),
    Ls(String),
    Mkdir(String),
    Rm(String),
    Rmdir(String),
    Put { local: PathBuf, remote: String },
    Get { remote: String, local: PathBuf },
    Cat(String),
    Write { remote: String, text: String },
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

impl Invocation {
    /// Explicit `-c`, then the environment, then the working directory.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(|| {
            PathBuf::from(std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()))
        })
    }
}

/// A memory store lives only as long as one invocation, so only `uri`,
/// which never touches the store, may run against it.
pub fn check_store(store: &StoreConfig, command: &Command) -> anyhow::Result<()> {
    if *store == StoreConfig::Memory && !matches!(command, Command::Uri(_)) {
        bail!("the memory store does not persist between invocations; configure kind = \"directory\"");
    }
    Ok(())
}

pub fn parse(args: &[String]) -> anyhow::Result<Invocation> {
    let mut rest = args;
    let mut config_path = None;
    if rest.first().map(String::as_str) == Some("-c") {
        let Some(path) = rest.get(1) else {
            bail!("-c requires a path\n\n{}", USAGE);
        };
        config_path = Some(PathBuf::from(path));
        rest = &rest[2..];
    }

    let Some((name, operands)) = rest.split_first() else {
        bail!("missing command\n\n{}", USAGE);
    };

    let command = match (name.as_str(), operands) {
        ("exists", [p]) => Command::Exists(p.clone()),
        ("stat", [p]) => Command::Stat(p.clone()),
        ("ls", [p]) => Command::Ls(p.clone()),
        ("mkdir", [p]) => Command::Mkdir(p.clone()),
        ("rm", [p]) => Command::Rm(p.clone()),
        ("rmdir", [p]) => Command::Rmdir(p.clone()),
        ("put", [local, remote]) => Command::Put {
            local: PathBuf::from(local),
            remote: remote.clone(),
        },
        ("get", [remote, local]) => Command::Get {
            remote: remote.clone(),
            local: PathBuf::from(local),
        },
        ("cat", [p]) => Command::Cat(p.clone()),
        ("write", [remote, text]) => Command::Write {
            remote: remote.clone(),
            text: text.clone(),
        },
        ("uri", [p]) => Command::Uri(p.clone()),
        (other, _) => bail!("invalid command or arguments: {}\n\n{}", other, USAGE),
    };

    Ok(Invocation { config_path, command })
}
