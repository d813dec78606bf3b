use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};
use trackstore::compute::geojson::{track_from_geojson, track_to_geometry, tracks_to_json};
use trackstore::{
    Position, PositionUpdate, SelfPositionSource, TrackError, TrackFetcher, TrackRegistry,
    TrackService, TracksConfig,
};

/// Replay newline-delimited JSON position updates and print the resulting tracks as GeoJSON.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// NDJSON file of position updates; stdin when omitted
    input: Option<PathBuf>,

    /// JSON tracks configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bounding box filter: minLon,minLat,maxLon,maxLat
    #[arg(long)]
    bbox: Option<String>,

    /// Radius filter in meters around the self position
    #[arg(long)]
    radius: Option<String>,

    #[arg(long, requires = "self_lon")]
    self_lat: Option<f64>,

    #[arg(long, requires = "self_lat")]
    self_lon: Option<f64>,

    /// Context whose latest position is used as the self position
    #[arg(long, conflicts_with = "self_lat")]
    self_context: Option<String>,

    /// Print only the track of this context
    #[arg(long)]
    context: Option<String>,

    /// Directory of `<context>.geojson` historical tracks fetched for new contexts
    #[arg(long)]
    fetch_dir: Option<PathBuf>,

    /// How long to wait for historical track fetches after the replay
    #[arg(long, default_value_t = 200)]
    fetch_grace_ms: u64,

    /// Prune contexts idle for maxAge at the latest replayed timestamp
    #[arg(long)]
    prune: bool,
}

/// Reads historical tracks from GeoJSON files named after the context.
struct DirectoryFetcher {
    dir: PathBuf,
}

impl DirectoryFetcher {
    fn path_for(&self, context: &str) -> PathBuf {
        let name: String = context
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.geojson", name))
    }
}

impl TrackFetcher for DirectoryFetcher {
    fn fetch(&self, context: &str) -> BoxFuture<'static, trackstore::Result<Option<Vec<Position>>>> {
        let path = self.path_for(context);
        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => track_from_geojson(&raw),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(TrackError::Fetch(format!("{}: {}", path.display(), e))),
            }
        })
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TracksConfig> {
    let Some(path) = path else {
        return Ok(TracksConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = TracksConfig::from_json(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn self_position_source(args: &Args, registry: &Arc<TrackRegistry>) -> Arc<dyn SelfPositionSource> {
    if let (Some(lat), Some(lon)) = (args.self_lat, args.self_lon) {
        let fixed = Position::new(lat, lon);
        return Arc::new(move || Some(fixed));
    }

    let context = args.self_context.clone();
    let registry = registry.clone();
    Arc::new(move || {
        let context = context.as_deref()?;
        registry.track(context).ok()?.last().copied()
    })
}

fn updates<R>(reader: R) -> impl futures::Stream<Item = PositionUpdate> + Send + 'static
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let lines = BufReader::new(reader).lines();
    futures::stream::unfold((lines, 0usize), |(mut lines, mut line_no)| async move {
        loop {
            line_no += 1;
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!("failed to read input: {}", e);
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PositionUpdate>(&line) {
                Ok(update) => return Some((update, (lines, line_no))),
                Err(e) => warn!("skipping line {}: {}", line_no, e),
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackstore_replay=info,trackstore=info,info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_ref())?;
    if args.fetch_dir.is_some() {
        config = config.with_fetch_initial_track(true);
    }

    let mut registry = TrackRegistry::new(config)?;
    if let Some(dir) = &args.fetch_dir {
        info!("Fetching historical tracks from {}", dir.display());
        registry = registry.with_fetcher(Arc::new(DirectoryFetcher { dir: dir.clone() }));
    }
    let registry = Arc::new(registry);
    let service = TrackService::new(registry.clone(), self_position_source(&args, &registry));

    let mut stream: BoxStream<'static, PositionUpdate> = match &args.input {
        Some(path) => {
            info!("Replaying {}", path.display());
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            updates(file).boxed()
        }
        None => {
            info!("Replaying stdin");
            updates(tokio::io::stdin()).boxed()
        }
    };

    // replay on the recorded clock; updates without a timestamp count as arriving now
    let mut latest: Option<SystemTime> = None;
    while let Some(update) = stream.next().await {
        let at = update.observed_at().unwrap_or_else(SystemTime::now);
        latest = Some(latest.map_or(at, |seen| seen.max(at)));
        registry.record_position_at(&update.context, update.value, at);
    }

    if args.fetch_dir.is_some() {
        tokio::time::sleep(Duration::from_millis(args.fetch_grace_ms)).await;
    }

    if args.prune {
        let now = latest.unwrap_or_else(SystemTime::now);
        let removed = registry.prune_at(registry.config().max_age(), now);
        info!("Pruned {} idle tracks", removed.len());
    }

    let stats = registry.stats();
    info!("{} tracks, {} points", stats.tracks, stats.points);

    let output = match &args.context {
        Some(context) => {
            let track = service.track(context)?;
            serde_json::to_string_pretty(&track_to_geometry(&track))?
        }
        None => {
            let tracks = service.query(args.bbox.as_deref(), args.radius.as_deref())?;
            serde_json::to_string_pretty(&tracks_to_json(&tracks))?
        }
    };
    println!("{}", output);

    service.stop().await;
    Ok(())
}
