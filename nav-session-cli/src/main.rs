use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};

use nav_session::{
    CityCatalog, GeoError, GraphBackend, KnapsackItem, NarrationError, NavigationSession,
    OsrmProvider, PositionOptions, PositionSource, SessionConfig, SessionEvent, SpeechEngine,
    Utterance, Voice,
};
use nav_session_types::{CityId, Coordinate, Endpoint, RouteResult};

#[derive(Parser)]
struct Args {
    /// Path to a JSON config file. Missing fields use defaults.
    #[arg(long)]
    config: Option<String>,

    /// Overrides the configured language, like "es-AR"
    #[arg(long)]
    language: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find a route and follow it step by step
    Route(RouteArgs),
    /// List the cities endpoints can be picked from
    Cities {
        #[arg(long)]
        backend_catalog: bool,
    },
    /// Run one of the graph backend's algorithms
    #[command(subcommand)]
    Graph(GraphQuery),
}

#[derive(clap::Args)]
struct RouteArgs {
    /// A city id, "lat,lng", or "here"
    #[arg(long)]
    from: String,

    /// A city id or "lat,lng"
    #[arg(long)]
    to: String,

    /// Where "here" is, as "lat,lng". Without this, the device has no location.
    #[arg(long)]
    position: Option<String>,

    /// Load the cities from the graph backend instead of the built-in list
    #[arg(long)]
    backend_catalog: bool,

    /// Read instructions aloud
    #[arg(long)]
    voice: bool,

    /// Write the route line and markers to this GeoJSON file
    #[arg(long)]
    geojson: Option<String>,

    /// Print the route and exit instead of reading step commands from stdin
    #[arg(long)]
    no_interactive: bool,
}

#[derive(Subcommand)]
enum GraphQuery {
    Dijkstra {
        from: String,
        to: String,
    },
    Bfs {
        from: String,
    },
    Dfs {
        from: String,
    },
    Prim,
    Kruskal,
    Quicksort {
        values: Vec<i64>,
    },
    Mergesort {
        values: Vec<i64>,
    },
    /// Greedy coin change
    Change {
        amount: i64,
        #[arg(long, value_delimiter = ',', default_value = "50,25,10,5,1")]
        coins: Vec<i64>,
    },
    Subsets {
        values: Vec<i64>,
    },
    Knapsack {
        capacity: i64,
        /// Each one as "name:weight:value"
        items: Vec<String>,
        #[arg(long)]
        branch_bound: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(if args.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    })?;

    let mut config = match args.config {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            SessionConfig::from_json(&raw).with_context(|| format!("loading {path}"))?
        }
        None => SessionConfig::default(),
    };
    if let Some(language) = args.language {
        config.language = language;
    }

    match args.command {
        Command::Route(route) => run_route(config, route).await,
        Command::Cities { backend_catalog } => {
            for city in load_catalog(&config, backend_catalog).await?.cities() {
                println!("{:<15} {:<25} {:.4}, {:.4}", city.id.0, city.name, city.lat, city.lng);
            }
            Ok(())
        }
        Command::Graph(query) => run_graph(&config, query).await,
    }
}

async fn load_catalog(config: &SessionConfig, from_backend: bool) -> Result<CityCatalog> {
    if !from_backend {
        return Ok(CityCatalog::default_branches());
    }
    let backend = GraphBackend::from_config(config)?;
    let (catalog, edges) = backend.map().await.context("loading the city catalog")?;
    debug!("Backend has {} cities and {} roads", catalog.cities().len(), edges.len());
    if catalog.is_empty() {
        bail!("The backend has no cities");
    }
    Ok(catalog)
}

async fn run_route(config: SessionConfig, args: RouteArgs) -> Result<()> {
    let catalog = load_catalog(&config, args.backend_catalog).await?;
    let position = args.position.as_deref().map(parse_point).transpose()?;
    let provider = Arc::new(OsrmProvider::from_config(&config)?);
    let engine = Arc::new(ConsoleSpeech::new(&config.language));
    let source: Option<Arc<dyn PositionSource>> =
        Some(Arc::new(ConfiguredPosition(position)));
    let mut session = NavigationSession::new(config, catalog, provider, engine, source);

    if args.voice {
        session.set_voice_enabled(true)?;
    }
    set_endpoint(&mut session, Endpoint::Origin, &args.from).await?;
    set_endpoint(&mut session, Endpoint::Destination, &args.to).await?;

    match session.next_event().await {
        Some(SessionEvent::RouteReady { route, .. }) => print_route(&route),
        Some(SessionEvent::RouteFailed(err)) => bail!("{err}"),
        None => bail!("Nothing to route"),
    }
    if let Some(path) = args.geojson {
        if let Some(overlay) = session.overlay_geojson() {
            std::fs::write(&path, serde_json::to_string_pretty(&overlay)?)
                .with_context(|| format!("writing {path}"))?;
        }
    }

    if !args.no_interactive {
        follow_steps(&mut session).await?;
    } else if let Some(narration) = session.narrate_route() {
        narration.finished().await;
    }
    session.shutdown();
    Ok(())
}

async fn set_endpoint(
    session: &mut NavigationSession,
    endpoint: Endpoint,
    raw: &str,
) -> Result<()> {
    if raw == "here" {
        if endpoint != Endpoint::Origin {
            bail!("Only the origin can be the current location");
        }
        session.locate_origin().await?;
        return Ok(());
    }
    if raw.contains(',') {
        let pt = parse_point(raw)?;
        session.toggle_selection(endpoint);
        session.on_map_click(pt);
        if let Some((city, dist)) = session.catalog().nearest(pt) {
            println!("{:?} is {:.0} m from {}", endpoint, dist, city.name);
        }
        return Ok(());
    }
    session.select_city(endpoint, CityId(raw.to_string()))?;
    Ok(())
}

fn parse_point(raw: &str) -> Result<Coordinate> {
    let Some((lat, lng)) = raw.split_once(',') else {
        bail!("{raw} isn't lat,lng");
    };
    let lat = lat.trim().parse().with_context(|| format!("bad latitude in {raw}"))?;
    let lng = lng.trim().parse().with_context(|| format!("bad longitude in {raw}"))?;
    Ok(Coordinate::new(lat, lng))
}

fn print_route(route: &RouteResult) {
    println!(
        "{:.1} km, about {} min",
        route.total_distance_km(),
        route.total_minutes()
    );
    for (idx, m) in route.maneuvers.iter().enumerate() {
        println!(
            "{:>3}. {} {} ({:.0} m)",
            idx + 1,
            m.category.icon(),
            m.text,
            m.distance_meters
        );
    }
}

async fn follow_steps(session: &mut NavigationSession) -> Result<()> {
    println!(
        "n: next, p: previous, r: restart, s: say again, a: read all, v: voice on/off, q: quit"
    );
    print_step(session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "n" => {
                session.advance();
            }
            "p" => {
                session.retreat();
            }
            "r" => {
                session.restart();
            }
            "s" => {
                session.speak_current();
            }
            "a" => {
                session.narrate_route();
            }
            "v" => {
                let enabled = !session.narrator().is_enabled();
                if let Err(err) = session.set_voice_enabled(enabled) {
                    println!("{err}");
                }
            }
            "q" => break,
            "" => continue,
            other => println!("Unknown command {other}"),
        }
        print_step(session);
    }
    Ok(())
}

fn print_step(session: &NavigationSession) {
    match session.current_maneuver() {
        Ok(m) => {
            let idx = session.navigation().step_index().unwrap_or(0);
            let count = session.route().map_or(0, |r| r.maneuvers.len());
            println!("[{}/{}] {} {}", idx + 1, count, m.category.icon(), m.text);
        }
        Err(err) => println!("{err}"),
    }
}

async fn run_graph(config: &SessionConfig, query: GraphQuery) -> Result<()> {
    let backend = GraphBackend::from_config(config)?;
    let output = match query {
        GraphQuery::Dijkstra { from, to } => {
            serde_json::to_value(backend.shortest_path(&CityId(from), &CityId(to)).await?)?
        }
        GraphQuery::Bfs { from } => serde_json::to_value(backend.bfs(&CityId(from)).await?)?,
        GraphQuery::Dfs { from } => serde_json::to_value(backend.dfs(&CityId(from)).await?)?,
        GraphQuery::Prim => serde_json::to_value(backend.prim().await?)?,
        GraphQuery::Kruskal => serde_json::to_value(backend.kruskal().await?)?,
        GraphQuery::Quicksort { values } => {
            serde_json::to_value(backend.quicksort(&values).await?)?
        }
        GraphQuery::Mergesort { values } => {
            serde_json::to_value(backend.mergesort(&values).await?)?
        }
        GraphQuery::Change { amount, coins } => {
            serde_json::to_value(backend.greedy_change(amount, &coins).await?)?
        }
        GraphQuery::Subsets { values } => serde_json::to_value(backend.subsets(&values).await?)?,
        GraphQuery::Knapsack {
            capacity,
            items,
            branch_bound,
        } => {
            let items = items
                .iter()
                .map(|raw| parse_item(raw))
                .collect::<Result<Vec<_>>>()?;
            let best = if branch_bound {
                backend.knapsack_branch_bound(capacity, &items).await?
            } else {
                backend.knapsack_dp(capacity, &items).await?
            };
            serde_json::to_value(best)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_item(raw: &str) -> Result<KnapsackItem> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [name, weight, value] = parts[..] else {
        bail!("{raw} isn't name:weight:value");
    };
    Ok(KnapsackItem {
        name: name.to_string(),
        weight: weight.parse().with_context(|| format!("bad weight in {raw}"))?,
        value: value.parse().with_context(|| format!("bad value in {raw}"))?,
    })
}

/// Prints utterances instead of playing them, taking about as long as saying them would.
struct ConsoleSpeech {
    language: String,
}

impl ConsoleSpeech {
    fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl SpeechEngine for ConsoleSpeech {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice {
            name: "console".to_string(),
            lang: self.language.clone(),
        }]
    }

    async fn speak(&self, utterance: Utterance) -> Result<(), NarrationError> {
        println!("🔊 {}", utterance.text);
        let words = utterance.text.split_whitespace().count() as f32;
        let secs = 0.3 * words / utterance.rate.max(0.1);
        tokio::time::sleep(Duration::from_secs_f32(secs)).await;
        Ok(())
    }

    fn cancel_all(&self) {}
}

/// The device position given on the command line, if any
struct ConfiguredPosition(Option<Coordinate>);

#[async_trait]
impl PositionSource for ConfiguredPosition {
    fn is_supported(&self) -> bool {
        self.0.is_some()
    }

    async fn current_position(&self, _: PositionOptions) -> Result<Coordinate, GeoError> {
        self.0.ok_or(GeoError::PositionUnavailable)
    }
}
