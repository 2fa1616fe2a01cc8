mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_activity, cmd_dashboard, cmd_entries, cmd_foods, cmd_gender, cmd_history, cmd_login,
    cmd_logout, cmd_meal, cmd_profile, cmd_recommend, cmd_register, cmd_sign_in, cmd_survey,
    cmd_watch,
};
use crate::config::Config;
use weigh_core::service::WeighService;

/// Log filter, e.g. `WEIGH_LOG=weigh_core=debug`.
const LOG_ENV: &str = "WEIGH_LOG";

#[derive(Parser)]
#[command(
    name = "weigh",
    version,
    about = "Track daily calories and sign-in streaks",
    long_about = "Track daily calories against a TDEE goal and keep a daily sign-in streak.\n\
                  Days roll over at midnight Philippine time (UTC+8)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register {
        email: String,
        username: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Log in with email and password
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Forget the logged-in user
    Logout {
        #[arg(long)]
        json: bool,
    },
    /// Enter age, height and weight
    Survey {
        #[arg(long)]
        age: u32,
        /// Height in centimetres
        #[arg(long)]
        height: f64,
        /// Weight in kilograms
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        json: bool,
    },
    /// Choose a gender for the BMR formula: male or female
    Gender {
        gender: String,
        #[arg(long)]
        json: bool,
    },
    /// Choose an activity level (list the levels when omitted)
    Activity {
        level: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show the dietary recommendation, or choose a goal
    Recommend {
        /// lose, maintain or gain
        #[arg(long)]
        choose: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List the food catalog
    Foods {
        /// Filter by name
        query: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Log a meal: food ids with optional quantities, e.g. `1 7x2`
    Meal {
        #[arg(required = true)]
        picks: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Today's progress, macros and streak
    Dashboard {
        #[arg(long)]
        json: bool,
    },
    /// Sign in for today and extend the streak
    SignIn {
        #[arg(long)]
        json: bool,
    },
    /// Calories per day, or the entries of one day with --date
    History {
        /// Only the last N days
        #[arg(short, long)]
        days: Option<u32>,
        /// Show the entries of one day (YYYY-MM-DD, today, yesterday)
        #[arg(long, conflicts_with = "days")]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show the stored profile
    Profile {
        #[arg(long)]
        json: bool,
    },
    /// Stay open and print progress and streak changes as they happen
    Watch {
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = WeighService::new(&config.db_path)?;
    let user = || config.require_user();

    match cli.command {
        Commands::Register {
            email,
            username,
            password,
            json,
        } => cmd_register(&svc, &config, &email, &username, password, json),
        Commands::Login {
            email,
            password,
            json,
        } => cmd_login(&svc, &config, &email, password, json),
        Commands::Logout { json } => cmd_logout(&config, json),
        Commands::Survey {
            age,
            height,
            weight,
            json,
        } => cmd_survey(&svc, &user()?, age, height, weight, json),
        Commands::Gender { gender, json } => cmd_gender(&svc, &user()?, &gender, json),
        Commands::Activity { level, json } => {
            cmd_activity(&svc, &user()?, level.as_deref(), json)
        }
        Commands::Recommend { choose, json } => {
            cmd_recommend(&svc, &user()?, choose.as_deref(), json)
        }
        Commands::Foods { query, json } => cmd_foods(&svc, query.as_deref(), json),
        Commands::Meal { picks, json } => cmd_meal(&svc, &user()?, &picks, json),
        Commands::Dashboard { json } => cmd_dashboard(&svc, &user()?, json),
        Commands::SignIn { json } => cmd_sign_in(&svc, &user()?, json),
        Commands::History { days, date, json } => match date {
            Some(date) => cmd_entries(&svc, &user()?, Some(&date), json),
            None => cmd_history(&svc, &user()?, days, json),
        },
        Commands::Profile { json } => cmd_profile(&svc, &user()?, json),
        Commands::Watch { json } => cmd_watch(&svc, &user()?, json).await,
    }
}
