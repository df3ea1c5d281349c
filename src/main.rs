//! CityCast command line
//!
//! ```sh
//! citycast add Paris
//! citycast move Lima Paris
//! citycast show
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use citycast_core::{App, ValidationError};
use citycast_services::{AddOutcome, City, CityCard, Dashboard, DashboardView};

#[derive(Parser, Debug)]
#[command(name = "citycast")]
#[command(about = "Track a handful of cities and their weather")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tracked cities without fetching
    List,
    /// Fetch weather for a city and start tracking it
    Add { name: String },
    /// Stop tracking a city
    Remove { name: String },
    /// Move a city to the position another city holds
    Move { city: String, target: String },
    /// Show the location of a city
    Select { name: String },
    /// Refresh every tracked city and print the dashboard
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    citycast_core::init()?;
    let mut app = App::new()?;
    tracing::info!("CityCast started");
    let dashboard = Dashboard::open(app.config())?;
    print_alerts(&dashboard);

    match cli.command {
        Command::List => {
            for (i, city) in dashboard.cities().iter().enumerate() {
                println!("{:>2}. {}", i + 1, city.name);
            }
        }
        Command::Add { name } => match dashboard.add_city(&name).await {
            AddOutcome::Added(city) => {
                println!("Added {}", city.name);
                print_view(&dashboard.view());
            }
            AddOutcome::Ignored => {}
            AddOutcome::InvalidName => {
                bail!(ValidationError::InvalidCityName(name.trim().to_string()))
            }
            AddOutcome::LimitReached => {
                bail!(ValidationError::LimitReached(app.config().dashboard.max_cities))
            }
            AddOutcome::Duplicate | AddOutcome::Rejected | AddOutcome::NotSaved => {
                print_error(&dashboard.view());
            }
        },
        Command::Remove { name } => {
            let city = find_city(&dashboard, &name)?;
            if dashboard.remove_city(&city.id) {
                println!("Removed {}", city.name);
            }
        }
        Command::Move { city, target } => {
            let dragged = find_city(&dashboard, &city)?;
            let target = find_city(&dashboard, &target)?;
            if dashboard.reorder(&dragged.id, &target.id) {
                for (i, city) in dashboard.cities().iter().enumerate() {
                    println!("{:>2}. {}", i + 1, city.name);
                }
            }
        }
        Command::Select { name } => {
            if dashboard.select(&name).await {
                if let Some(location) = dashboard.view().selected {
                    println!("{}: {:.4}, {:.4}", name, location.lat, location.lon);
                }
            } else {
                print_error(&dashboard.view());
            }
        }
        Command::Show => {
            dashboard.refresh_all().await;
            print_view(&dashboard.view());
        }
    }

    print_alerts(&dashboard);
    app.shutdown()?;
    Ok(())
}

fn find_city(dashboard: &Dashboard, name: &str) -> Result<City> {
    let needle = name.trim().to_lowercase();
    match dashboard
        .cities()
        .into_iter()
        .find(|c| c.id == name || c.name.to_lowercase() == needle)
    {
        Some(city) => Ok(city),
        None => bail!("{} is not on your dashboard", name),
    }
}

fn print_view(view: &DashboardView) {
    for card in &view.cities {
        print_card(card);
    }
    if view.at_capacity {
        println!("(dashboard full)");
    }
    print_error(view);
}

fn print_card(card: &CityCard) {
    let Some(weather) = &card.weather else {
        println!("{:<16} loading...", card.city.name);
        return;
    };
    println!(
        "{:<16} {:>4}°C  {:<12} humidity {:>3}%  wind {:.1} m/s",
        card.city.name, weather.temperature, weather.condition, weather.humidity, weather.wind_speed
    );
    if let Some(days) = &card.forecast {
        let line: Vec<String> = days
            .iter()
            .map(|d| format!("{} {}/{}°C {}", d.date, d.min_temp, d.max_temp, d.condition))
            .collect();
        println!("{:<16} {}", "", line.join(" | "));
    }
}

fn print_error(view: &DashboardView) {
    if let Some(error) = &view.error {
        eprintln!("Error: {}", error);
    }
}

fn print_alerts(dashboard: &Dashboard) {
    for alert in dashboard.take_alerts() {
        eprintln!("Alert: {}", alert);
    }
}
