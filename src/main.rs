use reelview::cli::Args;
use reelview::config::PlayerConfig;
use reelview::core::asset_cache::AssetCache;
use reelview::core::event_bus::{EventBus, downcast_event};
use reelview::core::player::VideoPlayer;
use reelview::core::player_events::{DidPlayToEndEvent, ReplayEvent, StateChangedEvent, VisibilityChangedEvent};
use reelview::core::sim::{DEFAULT_SIM_DURATION, SimController, SimEngine};
use reelview::core::state::PauseReason;
use reelview::widgets::{ScrubBinding, Seeker};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

const SEEKER_WIDTH: f32 = 320.0;
const SEEKER_HEIGHT: f32 = 30.0;

fn init_logging(args: &Args) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    if let Some(log_path_opt) = &args.log_file {
        let log_level = match args.verbosity {
            0 | 1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        let log_path = log_path_opt.clone().unwrap_or_else(|| PathBuf::from("reelview.log"));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;
        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to {}", log_path.display());
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Print and discard the player's queued notifications.
fn report(player: &Rc<RefCell<VideoPlayer>>) {
    for event in player.borrow().events().poll() {
        if let Some(e) = downcast_event::<StateChangedEvent>(&event) {
            println!("  state      {:?}", e.state);
        } else if let Some(e) = downcast_event::<VisibilityChangedEvent>(&event) {
            println!("  visible    {}", e.0);
        } else if downcast_event::<DidPlayToEndEvent>(&event).is_some() {
            println!("  end of media");
        } else if let Some(e) = downcast_event::<ReplayEvent>(&event) {
            println!("  replay     #{}", e.replay_count);
        }
    }
}

fn pump(player: &Rc<RefCell<VideoPlayer>>) {
    let handled = player.borrow_mut().pump();
    debug!("Pumped {} signal(s)", handled);
}

struct Session {
    engine: Arc<SimEngine>,
    player: Rc<RefCell<VideoPlayer>>,
    binding: ScrubBinding,
    seeker: Seeker,
    ui_bus: EventBus,
}

impl Session {
    fn new(config: &PlayerConfig) -> Self {
        let engine = Arc::new(SimEngine::new());
        let player = Rc::new(RefCell::new(VideoPlayer::new(engine.clone(), config)));
        let binding = ScrubBinding::new(&player);
        let ui_bus = EventBus::new();
        let seeker = Seeker::new(SEEKER_WIDTH, SEEKER_HEIGHT).with_emitter(ui_bus.emitter());
        Self { engine, player, binding, seeker, ui_bus }
    }

    fn controller(&self) -> Result<SimController> {
        self.engine.last_controller().context("No engine instance attached")
    }

    fn route_seeker_events(&self) {
        for event in self.ui_bus.poll() {
            self.binding.handle(&event);
        }
        pump(&self.player);
    }

    /// Drag the seeker thumb to `fraction` of the bar.
    fn scrub_to(&mut self, fraction: f32) {
        let x = self.seeker.thumb_center(f64::from(fraction));
        self.seeker.begin_tracking(x, SEEKER_HEIGHT / 2.0);
        self.route_seeker_events();
        self.seeker.continue_tracking(x);
        self.seeker.end_tracking();
        self.route_seeker_events();
    }

    fn play(&mut self, url: &str, loops: u32) -> Result<()> {
        println!("{}", url);
        {
            let mut player = self.player.borrow_mut();
            player.load(url);
            player.play();
        }
        let ctl = self.controller()?;
        ctl.set_keep_up(true);
        ctl.set_loaded_until(DEFAULT_SIM_DURATION / 2);
        ctl.set_ready_for_display(true);
        pump(&self.player);
        report(&self.player);

        self.scrub_to(0.25);
        report(&self.player);

        for _ in 0..loops {
            ctl.set_loaded_until(DEFAULT_SIM_DURATION);
            ctl.advance(DEFAULT_SIM_DURATION);
            ctl.reach_end();
            pump(&self.player);
            report(&self.player);
        }

        self.binding.sync(&mut self.seeker);
        {
            let player = self.player.borrow();
            println!(
                "  progress   play={:.2} buffer={:.2} watched={:.1}s replays={}",
                self.seeker.value(),
                self.seeker.buffer_value(),
                player.watch_duration(),
                player.replay_count()
            );
        }

        self.player.borrow_mut().pause(PauseReason::Hidden);
        pump(&self.player);
        report(&self.player);
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut config = PlayerConfig::resolve(args.config.as_deref())?;
    if let Some(capacity) = args.capacity {
        config.cache_capacity = capacity;
    }
    if args.no_auto_replay {
        config.auto_replay = false;
    }
    info!("Config: {:?}", config);
    AssetCache::configure_shared(config.cache_capacity);

    let mut session = Session::new(&config);
    for url in &args.urls {
        session.play(url, args.loops)?;
    }

    let cache = AssetCache::shared();
    println!(
        "cache: {} asset(s), {} hit(s), {} miss(es), {} instance(s) attached",
        cache.len(),
        cache.stats().hits(),
        cache.stats().misses(),
        session.engine.instances_attached()
    );
    Ok(())
}
