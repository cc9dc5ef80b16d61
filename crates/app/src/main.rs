use std::fmt;

use exam_core::ExamCatalog;
use exam_core::model::{ExamId, Identity, SessionSettings, SessionSettingsDraft, UserDraft};
use services::{AppServices, Clock};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod console;

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");
const HISTORY_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingExamId,
    MissingQuery,
    UnknownArg(String),
    InvalidExamId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidNumber { name: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingExamId => write!(f, "take requires --exam-id <id>"),
            ArgsError::MissingQuery => write!(f, "search requires a query"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidExamId { raw } => write!(f, "invalid --exam-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => {
                write!(f, "invalid user '{raw}', expected <google_id>,<email>,<name>")
            }
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid {name} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- list    [--catalog <path>]");
    eprintln!("  cargo run -p app -- search  <query> [--catalog <path>]");
    eprintln!("  cargo run -p app -- take    --exam-id <id> [--db <sqlite_url>] [--user <g,e,n>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] --user <g,e,n>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:exams.sqlite3");
    eprintln!("  --catalog <built-in sample exams>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_CATALOG, EXAM_USER, EXAM_TICK_MS, EXAM_WARNING_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    List,
    Search,
    Take,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "list" => Some(Self::List),
            "search" => Some(Self::Search),
            "take" => Some(Self::Take),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    catalog_path: Option<String>,
    user: Option<UserDraft>,
    exam_id: Option<ExamId>,
    query: Option<String>,
    settings: SessionSettingsDraft,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(
            std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "sqlite:exams.sqlite3".into()),
        );
        let mut catalog_path = std::env::var("EXAM_CATALOG")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let mut user = std::env::var("EXAM_USER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_user(&value))
            .transpose()?;
        let settings = SessionSettingsDraft {
            tick_period_ms: env_number("EXAM_TICK_MS")?,
            warning_threshold_secs: env_number("EXAM_WARNING_SECS")?,
        };
        let mut exam_id = None;
        let mut query: Option<String> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => catalog_path = Some(require_value(args, "--catalog")?),
                "--user" => user = Some(parse_user(&require_value(args, "--user")?)?),
                "--exam-id" => {
                    let value = require_value(args, "--exam-id")?;
                    let parsed = value
                        .parse::<ExamId>()
                        .map_err(|_| ArgsError::InvalidExamId { raw: value.clone() })?;
                    exam_id = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => {
                    // Bare words form the search query.
                    query = Some(match query {
                        Some(existing) => format!("{existing} {arg}"),
                        None => arg,
                    });
                }
            }
        }

        Ok(Self {
            db_url,
            catalog_path,
            user,
            exam_id,
            query,
            settings,
        })
    }

    fn load_catalog_json(&self) -> Result<String, std::io::Error> {
        match &self.catalog_path {
            Some(path) => std::fs::read_to_string(path),
            None => Ok(BUILTIN_CATALOG.to_owned()),
        }
    }
}

fn parse_user(raw: &str) -> Result<UserDraft, ArgsError> {
    let mut parts = raw.splitn(3, ',').map(str::trim);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(google_id), Some(email), Some(name)) => Ok(UserDraft {
            google_id: google_id.to_owned(),
            email: email.to_owned(),
            name: name.to_owned(),
        }),
        _ => Err(ArgsError::InvalidUser { raw: raw.to_owned() }),
    }
}

fn env_number(name: &'static str) -> Result<Option<u32>, ArgsError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ArgsError::InvalidNumber { name, raw }),
        _ => Ok(None),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    // Logs go to stderr so they never interleave with the question screen.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,app=info,services=info,storage=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::List,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::List,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    info!(command = ?cmd, db = %parsed.db_url, catalog = ?parsed.catalog_path, "starting");
    let catalog_json = parsed.load_catalog_json()?;
    let (catalog, settings) = load_exam_setup(&catalog_json, parsed.settings.clone())?;

    match cmd {
        Command::List => {
            console::print_summaries(&catalog.list());
            Ok(())
        }
        Command::Search => {
            let query = parsed.query.as_deref().ok_or(ArgsError::MissingQuery)?;
            console::print_summaries(&catalog.search(query));
            Ok(())
        }
        Command::Take => {
            let exam_id = parsed.exam_id.ok_or(ArgsError::MissingExamId)?;
            let services = open_services(&parsed, catalog, settings).await?;
            let identity = sign_in(&services, parsed.user.clone()).await?;
            if !identity.is_signed_in() {
                println!("Not signed in: this attempt will be scored but not saved.");
            }
            let mut input = console::spawn_stdin_lines();
            console::take_exam(&services, &identity, exam_id, &mut input).await?;
            Ok(())
        }
        Command::History => {
            let services = open_services(&parsed, catalog, settings).await?;
            let identity = sign_in(&services, parsed.user.clone()).await?;
            let Some(user) = identity.user() else {
                println!("Sign in with --user or EXAM_USER to see your history.");
                return Ok(());
            };
            let items = services.history().list_recent(user.id, HISTORY_LIMIT).await?;
            console::print_history(&items);
            Ok(())
        }
    }
}

/// Everything a command needs from the domain before storage is touched.
fn load_exam_setup(
    catalog_json: &str,
    settings: SessionSettingsDraft,
) -> Result<(ExamCatalog, SessionSettings), exam_core::Error> {
    let catalog = ExamCatalog::from_json(catalog_json)?;
    let settings = settings.validate()?;
    Ok((catalog, settings))
}

async fn open_services(
    args: &Args,
    catalog: ExamCatalog,
    settings: SessionSettings,
) -> Result<AppServices, Box<dyn std::error::Error>> {
    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let services =
        AppServices::sqlite_with_catalog(&args.db_url, Clock::system(), settings, catalog).await?;
    Ok(services)
}

async fn sign_in(
    services: &AppServices,
    user: Option<UserDraft>,
) -> Result<Identity, Box<dyn std::error::Error>> {
    match user {
        Some(draft) => Ok(services.identity().sign_in(draft).await?),
        None => Ok(Identity::anonymous()),
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = ExamCatalog::from_json(BUILTIN_CATALOG).unwrap();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.search("azure").len(), 1);
    }

    #[test]
    fn parses_user_triplet() {
        let draft = parse_user("g-1, ada@example.com, Ada Lovelace").unwrap();
        assert_eq!(draft.google_id, "g-1");
        assert_eq!(draft.email, "ada@example.com");
        assert_eq!(draft.name, "Ada Lovelace");
        assert!(matches!(
            parse_user("g-1,ada@example.com"),
            Err(ArgsError::InvalidUser { .. })
        ));
    }

    #[test]
    fn flags_override_and_collect_query() {
        let mut argv = ["--exam-id", "3", "cloud", "practitioner", "--catalog", "x.json"]
            .into_iter()
            .map(String::from);
        let args = Args::parse(&mut argv).unwrap();
        assert_eq!(args.exam_id, Some(ExamId::new(3)));
        assert_eq!(args.query.as_deref(), Some("cloud practitioner"));
        assert_eq!(args.catalog_path.as_deref(), Some("x.json"));
    }

    #[test]
    fn rejects_bad_exam_id_and_unknown_flags() {
        let mut argv = ["--exam-id", "abc"].into_iter().map(String::from);
        assert!(matches!(
            Args::parse(&mut argv),
            Err(ArgsError::InvalidExamId { .. })
        ));
        let mut argv = ["--verbose", "1"].into_iter().map(String::from);
        assert!(matches!(Args::parse(&mut argv), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn exam_setup_reports_catalog_and_settings_errors() {
        let (catalog, settings) =
            load_exam_setup(BUILTIN_CATALOG, SessionSettingsDraft::default()).unwrap();
        assert_eq!(catalog.len(), 6);
        assert_eq!(settings, SessionSettings::default());

        let err = load_exam_setup("{", SessionSettingsDraft::default()).unwrap_err();
        assert!(matches!(err, exam_core::Error::Catalog(_)));

        let draft = SessionSettingsDraft {
            tick_period_ms: Some(0),
            warning_threshold_secs: None,
        };
        let err = load_exam_setup(BUILTIN_CATALOG, draft).unwrap_err();
        assert!(matches!(err, exam_core::Error::Settings(_)));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        let url = normalize_sqlite_url("sqlite:data/exams.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/exams.sqlite3"));
    }
}
