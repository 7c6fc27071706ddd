use std::{error::Error, process};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};
use serde::Serialize;

use ncmapi::{
    api::Api,
    comments::{CommentController, FloorQuery, Resource, ResourceType, SortType, ThreadId},
    config::Config,
    protocol::{search::SearchKind, song::SongLevel},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// May contain your login cookie. Keep it private.
    ///
    /// [default: built-in defaults, guest access]
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<String>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Print top-level comments of a resource
    Comments {
        /// Numeric id of the resource
        id: u64,

        /// song, mv, playlist, album, program or video
        #[arg(short, long, default_value = "song")]
        kind: ResourceType,

        /// recommended, hot or time
        #[arg(short, long, default_value = "recommended")]
        sort: SortType,

        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },

    /// Print replies to a comment
    Floor {
        /// Numeric id of the resource
        id: u64,

        /// Id of the comment whose replies to print
        parent: u64,

        /// song, mv, playlist, album, program or video
        #[arg(short, long, default_value = "song")]
        kind: ResourceType,
    },

    /// Search for songs, albums, artists, playlists or radios
    Search {
        keyword: String,

        /// song, album, artist, playlist or radio
        #[arg(short, long, default_value = "song")]
        kind: SearchKind,

        #[arg(short, long, default_value_t = 30)]
        limit: u32,

        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },

    /// Print keyword suggestions
    Suggest { keyword: String },

    /// Print lyrics of a song
    Lyric { id: u64 },

    /// Print the playback URL of a song
    Url {
        id: u64,

        /// standard, higher, exhigh, lossless, hires, sky, jyeffect or jymaster
        #[arg(short, long, default_value = "standard")]
        level: SongLevel,
    },

    /// Print a playlist with its tracks
    Playlist { id: u64 },

    /// Print the profile of a user, such as a comment author
    User { id: u64 },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Output goes to stdout, so stay quiet unless asked.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );

    if let Some(level) = log_level(config.quiet, config.verbose) {
        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Level requested on the command line, if any. Quiet mode still shows
/// warnings and errors.
fn log_level(quiet: bool, verbose: u8) -> Option<LevelFilter> {
    if !quiet && verbose == 0 {
        return None;
    }

    Some(match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    })
}

/// Loads the configuration file, or the defaults without one. Environment
/// overrides apply either way.
fn load_config(path: Option<&str>) -> ncmapi::error::Result<Config> {
    let Some(path) = path else {
        return Config::default().with_env();
    };

    let config = Config::from_file(path);
    if config.is_err() && !std::path::Path::new(path).exists() {
        info!("see ncmapi.toml.example on how to write {path}");
    }

    config
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.config.as_deref())?;
    debug!("{config:?}");
    let api = Api::new(&config)?;

    match args.command {
        Command::Comments {
            id,
            kind,
            sort,
            pages,
        } => {
            let controller = CommentController::from_config(api, &config);
            controller.set_sort(sort).await;

            let resource = Resource::new(kind, id);
            controller.load_comments(resource, false).await;
            for _ in 1..pages {
                controller.load_more().await;
            }

            let thread = controller.state().thread;
            if let Some(e) = thread.error {
                return Err(e.into());
            }
            info!(
                "{} of {} comments, {}",
                thread.comments.len(),
                thread.total_count,
                if thread.has_more { "more available" } else { "no more" }
            );
            print_json(&thread.comments)
        }

        Command::Floor { id, parent, kind } => {
            let query = FloorQuery {
                parent_comment_id: parent,
                thread_id: ThreadId::new(kind, id),
                time: FloorQuery::FIRST_PAGE,
                limit: config.floor_limit,
            };
            print_json(&api.floor_comments(&query).await?)
        }

        Command::Search {
            keyword,
            kind,
            limit,
            offset,
        } => print_json(&api.search(&keyword, kind, limit, offset).await?),

        Command::Suggest { keyword } => {
            print_json(&api.search_suggest(&keyword).await?.keywords())
        }

        Command::Lyric { id } => {
            let lyrics = api.lyric(id).await?;
            match lyrics.text() {
                Some(text) => {
                    println!("{text}");
                    Ok(())
                }
                None => print_json(&lyrics),
            }
        }

        Command::Url { id, level } => print_json(&api.song_url(id, level).await?),

        Command::Playlist { id } => print_json(&api.playlist_detail(id).await?),

        Command::User { id } => print_json(&api.user_detail(id).await?),
    }
}

/// Main entry point of the application.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
