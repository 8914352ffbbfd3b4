use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cloday::dates;
use cloday::media::{FolderGallery, Launcher, MailDraft, PickedFile, SourceError};
use cloday::state::{EntryStore, ProfileStore, SqliteKv};
use cloday::titles::TierTable;
use cloday::{AppConfig, StoreError};

/// Cloday: capture your daily style
#[derive(Debug, Parser)]
#[command(name = "cloday", version, about)]
struct Cli {
    /// Data directory (defaults to the platform data dir, or $CLODAY_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the outfit saved for a day
    Show {
        #[arg(value_parser = parse_day, default_value = "today")]
        date: NaiveDate,
    },
    /// List saved outfits, optionally for one month (YYYY-MM)
    List {
        #[arg(long, value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },
    /// Save a photo as the outfit of a day
    Capture {
        source: PathBuf,
        #[arg(long, value_parser = parse_day, default_value = "today")]
        date: NaiveDate,
    },
    /// Delete the outfit of a day
    Remove {
        #[arg(value_parser = parse_day)]
        date: NaiveDate,
    },
    /// Copy the outfit of a day to the gallery folder
    Export {
        #[arg(value_parser = parse_day)]
        date: NaiveDate,
        /// Gallery folder (defaults to Pictures/Cloday)
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Delete every saved outfit
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Show unlocked titles and progress to the next one
    Titles,
    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// Print a prefilled feedback mail link
    Feedback,
}

#[derive(Debug, Subcommand)]
enum ProfileAction {
    Name { name: String },
    Title { label: String },
    Color { hex: String },
    Avatar { source: PathBuf },
}

/// Prints URIs instead of opening them; a terminal has no mail composer.
struct PrintLauncher;

impl Launcher for PrintLauncher {
    fn open_uri(&self, uri: &str) -> Result<(), SourceError> {
        println!("{}", uri);
        Ok(())
    }
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    match value {
        "today" => Ok(dates::today()),
        "yesterday" => Ok(dates::previous_day(dates::today())),
        other => dates::parse_iso(other).ok_or_else(|| format!("expected YYYY-MM-DD, got {:?}", other)),
    }
}

fn parse_month(value: &str) -> Result<(i32, u32), String> {
    let first = dates::parse_iso(&format!("{}-01", value)).ok_or_else(|| format!("expected YYYY-MM, got {:?}", value))?;
    Ok((first.year(), first.month()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.data_dir {
        Some(dir) => AppConfig::at(dir),
        None => AppConfig::from_env().context("Could not determine user data directory")?,
    };
    config
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let kv = Arc::new(SqliteKv::open(&config.db_path).context("Failed to open the Cloday database")?);
    let entries = EntryStore::with_config(&config, kv.clone());
    let profile = ProfileStore::new(kv, config.data_dir.clone());

    entries.load().await;
    profile.ensure_install_date()?;

    match run(cli.command, &entries, &profile).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            eprintln!("⚠️  {}", e.user_message());
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::Error::new(e).context("Something went wrong, please try again")),
    }
}

async fn run(command: Command, entries: &EntryStore, profile: &ProfileStore) -> Result<(), StoreError> {
    match command {
        Command::Show { date } => match entries.get(date) {
            Some(entry) => println!("{}  {}", dates::to_iso(date), entry.photo_path.display()),
            None => println!("{}  Nothing here !", dates::to_iso(date)),
        },
        Command::List { month } => {
            let map = entries.entries();
            let days: Vec<NaiveDate> = match month {
                Some((year, month)) => map.marked_in_month(year, month),
                None => map.dates().collect(),
            };
            for day in days {
                let lock = if entries.is_editable(day) { "" } else { "  (view only)" };
                if let Some(entry) = map.get(day) {
                    println!("{}  {}{}", dates::to_iso(day), entry.photo_path.display(), lock);
                }
            }
            println!(
                "{} outfits, current streak {}, longest {}",
                map.len(),
                map.current_streak(entries.today()),
                map.longest_streak()
            );
        }
        Command::Capture { source, date } => {
            let stored = entries.capture_from(date, &PickedFile(source)).await?;
            println!("📸 Saved outfit for {}: {}", dates::to_iso(date), stored.display());
        }
        Command::Remove { date } => {
            if entries.remove(date).await? {
                println!("🗑️  Deleted outfit for {}", dates::to_iso(date));
            } else {
                println!("{}  Nothing here !", dates::to_iso(date));
            }
        }
        Command::Export { date, to } => {
            let gallery = match to {
                Some(dir) => FolderGallery::new(dir),
                None => FolderGallery::default_location()
                    .ok_or_else(|| SourceError::NoHandler("gallery folder".into()))?,
            };
            let saved = entries.export(date, &gallery)?;
            println!("🎉 Saved to {}", saved.display());
        }
        Command::Clear { yes } => {
            if !yes {
                return Err(StoreError::InvalidInput(
                    "this removes every saved outfit; pass --yes to confirm".into(),
                ));
            }
            let removed = entries.clear_all().await?;
            println!("All outfits have been cleared ({}).", removed);
        }
        Command::Titles => {
            let progress = TierTable::standard().progress(entries.count());
            for tier in TierTable::standard().tiers() {
                let mark = if tier.threshold <= progress.count { "✅" } else { "🔒" };
                println!("{} {:>3}  {}", mark, tier.threshold, tier.label);
            }
            match (progress.next, progress.remaining()) {
                (Some(next), Some(left)) => println!(
                    "{}% to \"{}\" ({} more outfits)",
                    progress.percent, next.label, left
                ),
                _ => println!("All titles unlocked!"),
            }
        }
        Command::Profile { action } => {
            let count = entries.count();
            match action {
                None => {}
                Some(ProfileAction::Name { name }) => {
                    profile.set_name(&name)?;
                }
                Some(ProfileAction::Title { label }) => {
                    if !profile.select_title(&label, count)? {
                        println!("🔒 \"{}\" is not unlocked yet", label);
                    }
                }
                Some(ProfileAction::Color { hex }) => {
                    profile.set_background_color(&hex)?;
                }
                Some(ProfileAction::Avatar { source }) => {
                    profile.set_avatar_from(&PickedFile(source)).await?;
                }
            }

            let state = profile.snapshot(count)?;
            println!("Name:       {}", state.name);
            println!("Title:      {}", state.selected_title.as_deref().unwrap_or("-"));
            println!("Avatar:     {}", state.avatar.map(|p| p.display().to_string()).unwrap_or_else(|| "-".into()));
            println!("Background: {}", state.background_color);
            if let Some(joined) = state.install_date {
                println!("Joined:     {}", joined.format("%b %Y"));
            }
            println!("Outfits:    {}", count);
        }
        Command::Feedback => {
            MailDraft::feedback().send_with(&PrintLauncher)?;
        }
    }
    Ok(())
}
