//! Prints the upcoming trains of one line.
//!
//! This example shows how to:
//! - Dispatch a timetable request and wait for its callback
//! - Tell terminus departures from intermediate arrivals
//! - Resolve a line id through a line catalog file
//!
//! Run with: `cargo run --example next_trains -- 41 [path/to/Lineas.json]`

use trenes::catalog::LineCatalog;
use trenes::{Dispatcher, Error, TimetableItem, TimetableRequest, TimetableResponse};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("trenes=debug,next_trains=info")
        .init();

    let mut args = std::env::args().skip(1);
    let line_id: i32 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(41);

    if let Some(path) = args.next() {
        match LineCatalog::from_path(&path) {
            Ok(catalog) => match catalog.line(line_id) {
                Some(line) => println!(
                    "{} ({} stations, {:?})",
                    line.display_name(),
                    line.stations.len(),
                    line.direction_of(line_id)
                ),
                None => println!("Line {line_id} is not in the catalog"),
            },
            Err(e) => eprintln!("Could not load catalog: {e}"),
        }
    }

    let dispatcher = Dispatcher::builder()
        .default_header("User-Agent", "trenes-demo/0.1")?
        .build()?;

    let (result_tx, mut result_rx) = tokio::sync::mpsc::unbounded_channel();
    let error_tx = result_tx.clone();

    dispatcher.dispatch(
        TimetableRequest::new(line_id),
        move |response| {
            let _ = result_tx.send(Ok(response));
        },
        move |error| {
            let _ = error_tx.send(Err(error));
        },
    );

    println!("=== Timetable for line {line_id} ===");
    match result_rx.recv().await {
        Some(Ok(response)) => print_timetable(&response),
        Some(Err(e)) => {
            println!("Request failed with code {}: {}", e.code(), e);
            if let Some(cause) = e.underlying() {
                println!("  Caused by: {cause}");
            }
        }
        None => println!("Request was cancelled"),
    }

    Ok(())
}

fn print_timetable(response: &TimetableResponse) {
    println!("Generated at {}", response.timestamp());
    if let Some(message) = response.message() {
        println!("Alert: {message}");
    }

    for item in response.items() {
        match item {
            TimetableItem::Terminus(departure) => println!(
                "  {} departs from platform {} ({})",
                departure.timestamp.format("%H:%M"),
                departure.platform,
                departure.status.label()
            ),
            TimetableItem::Intermediate(arrival) => println!(
                "  {} train {} ({})",
                arrival.timestamp.format("%H:%M"),
                arrival.train_number,
                arrival.train_id
            ),
        }
    }

    if response.items().is_empty() {
        println!("  No trains announced");
    }
}
