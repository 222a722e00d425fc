//! NBA Game Prediction CLI
//!
//! Stats ingestion, feature building, boosted-tree training and a prediction dashboard.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hoops::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "NBA game winner and total points prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        /// Cache directory for API responses
        #[arg(long)]
        cache: Option<String>,
        /// Use only cached responses (no network requests)
        #[arg(long)]
        offline: bool,
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Feature engineering commands
    Features {
        #[command(subcommand)]
        action: FeatureCommands,
    },
    /// Train the winner and total points models
    Train {
        /// Override number of boosting rounds
        #[arg(long)]
        estimators: Option<usize>,
    },
    /// Predict a single matchup
    Predict {
        /// Home team name, nickname or abbreviation
        home: String,
        /// Away team name, nickname or abbreviation
        away: String,
        /// Game date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Stored prediction commands
    Predictions {
        #[command(subcommand)]
        action: PredictionCommands,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Serve the prediction dashboard
    Serve {
        /// Address to listen on (defaults to dashboard.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Load the static team table
    Teams,
    /// Load the player index for a season
    Players {
        #[arg(long)]
        season: Option<String>,
    },
    /// Load every game of a season with team box score lines
    Games {
        #[arg(long)]
        season: Option<String>,
    },
    /// Load player box scores for stored games
    BoxScores {
        /// Re-fetch games that already have player lines
        #[arg(long)]
        refresh: bool,
    },
    /// Record final scores for a date (defaults to yesterday)
    Completed {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Load scheduled games starting at a date (defaults to today)
    Upcoming {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Number of days to load
        #[arg(long, default_value = "3")]
        days: i64,
    },
    /// Assign current teams to players missing one
    PlayerTeams {
        #[arg(long)]
        season: Option<String>,
    },
    /// Snapshot team form metrics as of a date (defaults to today)
    Metrics {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum FeatureCommands {
    /// Summarize the training dataset
    Analyze,
    /// Build per-game features and store their summary columns
    Build,
}

#[derive(Subcommand)]
enum PredictionCommands {
    /// Predict and store scheduled games
    Upcoming {
        #[arg(long)]
        days: Option<i64>,
    },
    /// Score the model against recently completed games
    History {
        #[arg(long)]
        days: Option<i64>,
    },
    /// Record outcomes for stored predictions
    Reconcile,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data {
            cache,
            offline,
            action,
        } => {
            let source = commands::DataSource { cache, offline };
            match action {
                DataCommands::Teams => commands::data_teams(&config, &source),
                DataCommands::Players { season } => {
                    commands::data_players(&config, &source, season)
                }
                DataCommands::Games { season } => commands::data_games(&config, &source, season),
                DataCommands::BoxScores { refresh } => {
                    commands::data_box_scores(&config, &source, refresh)
                }
                DataCommands::Completed { date } => {
                    commands::data_completed(&config, &source, date)
                }
                DataCommands::Upcoming { date, days } => {
                    commands::data_upcoming(&config, &source, date, days)
                }
                DataCommands::PlayerTeams { season } => {
                    commands::data_player_teams(&config, &source, season)
                }
                DataCommands::Metrics { date } => commands::data_metrics(&config, &source, date),
                DataCommands::Status => commands::data_status(&config),
            }
        }
        Commands::Features { action } => match action {
            FeatureCommands::Analyze => commands::features_analyze(&config),
            FeatureCommands::Build => commands::features_build(&config),
        },
        Commands::Train { estimators } => commands::train(&config, estimators),
        Commands::Predict {
            home,
            away,
            date,
            format,
        } => commands::predict(&config, &home, &away, date, format),
        Commands::Predictions { action } => match action {
            PredictionCommands::Upcoming { days } => commands::predictions_upcoming(&config, days),
            PredictionCommands::History { days } => commands::predictions_history(&config, days),
            PredictionCommands::Reconcile => commands::predictions_reconcile(&config),
        },
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.dashboard.bind.clone());
            hoops::web::serve(&config, &bind)
        }
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::{Days, Duration, Local};
    use hoops::data::api::StatsClient;
    use hoops::data::{Database, GameDataset, Ingestor};
    use hoops::predict::{format_prediction, Predictor, MAX_WINDOW_DAYS};
    use hoops::training::{ModelBundle, Trainer};
    use std::path::Path;

    /// Network options shared by the `data` commands
    pub struct DataSource {
        pub cache: Option<String>,
        pub offline: bool,
    }

    impl DataSource {
        fn client(&self, config: &Config) -> Result<StatsClient> {
            let mut client = StatsClient::new(&config.api)?;
            if let Some(cache_dir) = &self.cache {
                println!("Using cache directory: {}", cache_dir);
                client = client.with_cache(cache_dir);
            }
            if self.offline {
                println!("Offline mode: using cached responses only");
                client = client.offline_only(true);
            }
            Ok(client)
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn season_or_default(config: &Config, season: Option<String>) -> String {
        season.unwrap_or_else(|| config.api.season.clone())
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        for path in [&config.data.database_path, &config.data.model_path] {
            if let Some(dir) = Path::new(path).parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
        }
        Database::open(&config.data.database_path)?;
        println!("Created database at {}", config.data.database_path);

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hoops data teams' and 'hoops data games' to fetch the season");
        println!("  3. Run 'hoops train' to train the models");
        println!("  4. Run 'hoops predict \"Celtics\" \"Knicks\"' to make predictions");

        Ok(())
    }

    pub fn data_teams(config: &Config, source: &DataSource) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let count = Ingestor::new(&client, &db).sync_teams()?;
        println!("Stored {} teams", count);
        Ok(())
    }

    pub fn data_players(config: &Config, source: &DataSource, season: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let season = season_or_default(config, season);
        println!("Syncing players for {}...", season);
        let count = Ingestor::new(&client, &db).sync_players(&season)?;
        println!("Stored {} new players", count);
        Ok(())
    }

    pub fn data_games(config: &Config, source: &DataSource, season: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let season = season_or_default(config, season);
        println!("Syncing games for {}...", season);
        let report = Ingestor::new(&client, &db).sync_games(&season)?;
        println!("Games: {}", report);
        Ok(())
    }

    pub fn data_box_scores(config: &Config, source: &DataSource, refresh: bool) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let report = Ingestor::new(&client, &db).sync_box_scores(refresh)?;
        println!("Box scores: {}", report);
        Ok(())
    }

    pub fn data_completed(
        config: &Config,
        source: &DataSource,
        date: Option<NaiveDate>,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let date = date.unwrap_or_else(|| today() - Duration::days(1));
        println!("Updating completed games for {}...", date);
        let report = Ingestor::new(&client, &db).update_completed(date)?;
        println!("Completed games: {}", report);
        Ok(())
    }

    pub fn data_upcoming(
        config: &Config,
        source: &DataSource,
        date: Option<NaiveDate>,
        days: i64,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let ingestor = Ingestor::new(&client, &db);
        let start = date.unwrap_or_else(today);

        for offset in 0..days.clamp(1, MAX_WINDOW_DAYS) {
            let Some(day) = start.checked_add_days(Days::new(offset.unsigned_abs())) else {
                break;
            };
            let report = ingestor.sync_upcoming(day)?;
            println!("{}: {}", day, report);
        }
        Ok(())
    }

    pub fn data_player_teams(
        config: &Config,
        source: &DataSource,
        season: Option<String>,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let season = season_or_default(config, season);
        let count = Ingestor::new(&client, &db).update_player_teams(&season)?;
        println!("Assigned teams to {} players", count);

        println!("\nCurrent rosters:");
        for (player, team) in db.active_rosters()? {
            println!("  {} - {}", player, team.as_deref().unwrap_or("No team"));
        }
        Ok(())
    }

    pub fn data_metrics(config: &Config, source: &DataSource, date: Option<NaiveDate>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let client = source.client(config)?;
        let date = date.unwrap_or_else(today);
        let count = Ingestor::new(&client, &db).update_team_metrics(date, &config.features)?;
        println!("Stored metrics for {} teams as of {}", count, date);

        println!(
            "\n{:<5} {:>4} {:>5} {:>7} {:>7} {:>7} {:>7}",
            "Team", "L5", "L10", "Pts", "Opp", "ORtg", "DRtg"
        );
        for team in db.get_all_teams()? {
            let Some(m) = db.latest_team_metrics(team.id)? else {
                continue;
            };
            println!(
                "{:<5} {:>4} {:>5} {:>7.1} {:>7.1} {:>7.1} {:>7.1}",
                team.abbreviation,
                m.last_5_wins,
                m.last_10_wins,
                m.points_scored_avg,
                m.points_allowed_avg,
                m.offensive_rating,
                m.defensive_rating
            );
        }
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:         {}", config.data.database_path);
        println!("  Teams:        {}", stats.team_count);
        println!("  Players:      {}", stats.player_count);
        println!(
            "  Games:        {} ({} completed)",
            stats.game_count, stats.completed_game_count
        );
        println!("  Player lines: {}", stats.player_line_count);
        println!("  Upcoming:     {}", stats.upcoming_count);
        println!("  Predictions:  {}", stats.prediction_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:        {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn features_analyze(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let dataset = GameDataset::from_database(&db, &config.features)?;
        let summary = dataset.summary();

        println!("Training Data Analysis");
        println!("───────────────────────────────");
        println!("  Games:         {}", summary.samples);
        if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
            println!("  Date range:    {} to {}", first, last);
        }
        println!("  Home wins:     {:.1}%", summary.home_win_rate * 100.0);
        println!("  Avg total pts: {:.1}", summary.avg_total_points);

        Ok(())
    }

    pub fn features_build(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let dataset = GameDataset::from_database(&db, &config.features)?;
        println!("Generated features for {} games", dataset.len());
        let stored = dataset.store_summaries(&db)?;
        println!("Stored {} feature rows", stored);
        Ok(())
    }

    pub fn train(config: &Config, estimators: Option<usize>) -> Result<()> {
        let mut training_config = config.training.clone();
        if let Some(n) = estimators {
            training_config.n_estimators = n;
        }

        println!("Initializing training...");
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;
        if stats.completed_game_count == 0 {
            return Err(hoops::HoopsError::Config(
                "No completed games in database. Run 'hoops data games' first.".to_string(),
            ));
        }

        let dataset = GameDataset::from_database(&db, &config.features)?;
        println!("Built {} training samples", dataset.len());

        let bundle = Trainer::new(&training_config).train(&dataset)?;
        bundle.save(Path::new(&config.data.model_path))?;

        println!("\nWinner model:       {}", bundle.winner_metrics);
        println!("Total points model: {}", bundle.total_metrics);
        println!("Saved models to {}", config.data.model_path);

        Ok(())
    }

    pub fn predict(
        config: &Config,
        home: &str,
        away: &str,
        date: Option<NaiveDate>,
        format: OutputFormat,
    ) -> Result<()> {
        let predictor = Predictor::from_config(config)?;
        let date = date.unwrap_or_else(today);
        let (home_team, away_team, prediction) = predictor.predict_by_name(home, away, date)?;
        let winner = if prediction.predicted_winner() == home_team.id {
            &home_team
        } else {
            &away_team
        };

        match format {
            OutputFormat::Table => {
                print!("{}", format_prediction(&prediction, &home_team, &away_team));
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "date": date,
                    "home": home_team.full_name,
                    "away": away_team.full_name,
                    "home_win_prob": prediction.home_win_prob,
                    "predicted_winner": winner.full_name,
                    "win_probability": prediction.win_probability_pct(),
                    "predicted_total": prediction.predicted_total,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                println!("date,home,away,home_win_prob,predicted_winner,predicted_total");
                println!(
                    "{},{},{},{:.3},{},{:.1}",
                    date,
                    home_team.full_name,
                    away_team.full_name,
                    prediction.home_win_prob,
                    winner.full_name,
                    prediction.predicted_total
                );
            }
        }

        Ok(())
    }

    pub fn predictions_upcoming(config: &Config, days: Option<i64>) -> Result<()> {
        let predictor = Predictor::from_config(config)?;
        let days = days.unwrap_or(config.dashboard.upcoming_days);
        let predictions = predictor.predict_upcoming(today(), days)?;

        if predictions.is_empty() {
            println!("No upcoming games in the next {} days", days);
            return Ok(());
        }
        println!(
            "{:<12} {:<50} {:<25} {:>7} {:>7}",
            "Date", "Matchup", "Winner", "Prob", "Total"
        );
        for p in &predictions {
            println!(
                "{:<12} {:<50} {:<25} {:>6.1}% {:>7.1}",
                p.date,
                format!("{} @ {}", p.away_team, p.home_team),
                p.predicted_winner,
                p.win_probability,
                p.predicted_total
            );
        }
        Ok(())
    }

    pub fn predictions_history(config: &Config, days: Option<i64>) -> Result<()> {
        let predictor = Predictor::from_config(config)?;
        let days = days.unwrap_or(config.dashboard.history_days);
        let report = predictor.evaluate_history(today(), days)?;

        for g in &report.games {
            println!(
                "{} {:<50} {:>3}-{:<3} {} predicted {:<25} total {:>6.1} vs {:>3}",
                g.date,
                format!("{} @ {}", g.away_team, g.home_team),
                g.away_score,
                g.home_score,
                if g.prediction_correct { "✓" } else { "✗" },
                g.predicted_winner,
                g.predicted_total,
                g.actual_total
            );
        }

        let s = &report.summary;
        println!("\nHistory {} to {}", report.start, report.end);
        println!("───────────────────────────────");
        println!("  Games:           {}", s.total_games);
        println!("  Correct:         {}", s.correct_predictions);
        println!("  Incorrect:       {}", s.incorrect_predictions);
        println!("  Accuracy:        {:.1}%", s.accuracy_percentage);
        println!("  Avg points diff: {:.1}", s.avg_points_diff);
        Ok(())
    }

    pub fn predictions_reconcile(config: &Config) -> Result<()> {
        let predictor = Predictor::from_config(config)?;
        let count = predictor.reconcile()?;
        println!("Reconciled {} predictions", count);
        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let bundle = ModelBundle::load(Path::new(&config.data.model_path))?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:          {}", config.data.model_path);
        println!("  Trained at:    {}", bundle.trained_at.format("%Y-%m-%d %H:%M UTC"));
        println!(
            "  Samples:       {} train / {} test",
            bundle.train_samples, bundle.test_samples
        );
        println!(
            "  Boosting:      {} rounds, lr {}, depth {}",
            bundle.params.n_estimators, bundle.params.learning_rate, bundle.params.max_depth
        );
        println!("  Winner model:  {}", bundle.winner_metrics);
        println!("  Total model:   {}", bundle.total_metrics);

        println!("\nFeature importance (winner / total)");
        let totals = bundle.total_importance();
        for (name, importance) in bundle.winner_importance() {
            let total = totals
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0);
            println!("  {:<20} {:>6.3} / {:>6.3}", name, importance, total);
        }

        Ok(())
    }
}
