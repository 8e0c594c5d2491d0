use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dash::metrics::{MetricsSnapshot, Trend};
use dash::{Dashboard, FilterOptions, FilterSelection, JsonFileSource, JsonlExporter, Period, Selection, Settings};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dash")]
#[command(about = "Dash - delivery metrics from issue tracker search results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Search result dump (JSON)
    #[arg(short, long, global = true, env = "DASH_INPUT", default_value = "issues.json")]
    input: PathBuf,

    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    filters: FilterArgs,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

/// Filter flags; repeat a flag to select several values
#[derive(Args)]
struct FilterArgs {
    #[arg(long = "client", global = true)]
    clients: Vec<String>,

    #[arg(long = "project", global = true)]
    projects: Vec<String>,

    #[arg(long = "module", global = true)]
    modules: Vec<String>,

    #[arg(long = "status", global = true)]
    statuses: Vec<String>,

    #[arg(long = "type", global = true)]
    types: Vec<String>,

    #[arg(long = "assignee", global = true)]
    assignees: Vec<String>,

    /// all, this-month, last-month, last-quarter, this-year or START..END
    #[arg(long, global = true, default_value = "all")]
    period: Period,
}

impl FilterArgs {
    fn selection(&self) -> FilterSelection {
        let pick = |values: &[String]| {
            if values.is_empty() {
                Selection::All
            } else {
                Selection::only(values.iter().cloned())
            }
        };
        FilterSelection {
            clients: pick(&self.clients),
            projects: pick(&self.projects),
            modules: pick(&self.modules),
            statuses: pick(&self.statuses),
            types: pick(&self.types),
            assignees: pick(&self.assignees),
            period: self.period,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the values available at every filter level
    Options,

    /// Compute the dashboard for the current filters
    Dashboard {
        /// Sprints to track (default: the first five named sprints)
        #[arg(long = "sprint")]
        sprints: Vec<String>,
    },

    /// Export the filtered issues to JSONL
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    let dashboard = Dashboard::new(JsonFileSource::new(&cli.input), &settings)?;
    let selection = cli.filters.selection();

    match &cli.command {
        Commands::Options => {
            let options = dashboard
                .filter_options(&selection, false)
                .await
                .with_context(|| format!("failed to read {}", cli.input.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                print_options(&options);
            }
        }
        Commands::Dashboard { sprints } => {
            let sprints: BTreeSet<String> = sprints.iter().cloned().collect();
            let snapshot = dashboard
                .compute_for_sprints(&selection, (!sprints.is_empty()).then_some(&sprints), false)
                .await
                .with_context(|| format!("failed to read {}", cli.input.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_summary(&snapshot);
            }
        }
        Commands::Export { output } => {
            let exporter = JsonlExporter::new(output);
            let count = dashboard
                .export(&selection, &exporter, false)
                .await
                .context("export failed")?;
            println!("Exported {} issues to {}", count, output.display());
        }
    }
    Ok(())
}

fn print_options(options: &FilterOptions) {
    let levels = [
        ("Clients", &options.clients),
        ("Projects", &options.projects),
        ("Modules", &options.modules),
        ("Statuses", &options.statuses),
        ("Types", &options.types),
        ("Assignees", &options.assignees),
    ];
    for (label, values) in levels {
        println!("{} ({})", label.bold(), values.len());
        for value in values {
            println!("  {}", value);
        }
    }
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".dimmed().to_string(), |v| format!("{:.1}%", v))
}

fn trend(t: Trend) -> String {
    match t {
        Trend::Up => "▲".green().to_string(),
        Trend::Down => "▼".red().to_string(),
    }
}

fn print_summary(s: &MetricsSnapshot) {
    let range = s
        .range
        .map_or_else(|| "all time".to_string(), |r| format!("{} .. {}", r.start, r.end));
    println!("{} ({})", "Dashboard".bold(), range);
    println!(
        "  Issues:      {} ({} active, {} done, {} bugs)",
        s.kpis.total, s.kpis.active, s.kpis.done, s.kpis.bugs
    );
    println!(
        "  Projects:    {} ({} with late items)",
        s.portfolio.projects, s.portfolio.late_projects
    );
    println!("  On time:     {}", pct(s.portfolio.on_time_pct));
    println!(
        "  Velocity:    {}",
        s.portfolio.velocity.map_or_else(|| "n/a".dimmed().to_string(), |v| format!("{:.1} pts/month", v))
    );
    println!(
        "  Lead time:   {}",
        s.portfolio
            .avg_lead_time_days
            .map_or_else(|| "n/a".dimmed().to_string(), |v| format!("{:.1} days", v))
    );
    println!(
        "  Backlog:     {} open, {} critical, {} pending bugs, {} done in period",
        s.backlog.open, s.backlog.critical, s.backlog.pending_bugs, s.backlog.done_in_period
    );

    let pulse = &s.daily_pulse;
    println!("{}", "Today".bold());
    println!(
        "  Delivered:   {} {} (avg {:.1})",
        pulse.delivered.value,
        trend(pulse.delivered.trend),
        pulse.delivered.avg
    );
    println!(
        "  Created:     {} {} (avg {:.1})",
        pulse.created.value,
        trend(pulse.created.trend),
        pulse.created.avg
    );

    if !s.sprints.selected.is_empty() {
        println!("{}", "Sprints".bold());
        println!(
            "  {}: {:.0}/{:.0} pts ({:.1}%)",
            s.sprints.selected.join(", "),
            s.sprints.done_points,
            s.sprints.total_points,
            s.sprints.progress_pct
        );
    }

    if !s.overloaded.is_empty() {
        println!("{} {}", "Overloaded:".red().bold(), s.overloaded.join(", "));
    }
    if !s.risk.critical.is_empty() {
        println!("{}", "Critical".bold());
        for item in &s.risk.critical {
            println!("  {} [{}] {} ({})", item.key.yellow(), item.status, item.summary, item.assignee);
        }
    }
    println!("{} of {} rows shown in preview", s.raw_subset.len(), s.total_rows);
}
