/// explore: terminal Report View for a ZIP code.
///
/// Usage:
///   explore [ZIP] [--base-url URL]
///
/// Fetches `/api/{zip}` from a running tapwater_service, then reads commands
/// from stdin. Only `zip` triggers a new fetch; everything else works on the
/// report already loaded.
///
/// Fetches run on a worker thread and report back tagged with the
/// `LoadTicket` they were started under, so a response that arrives after
/// the user moved on to another ZIP is dropped.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tapwater_service::client::{ApiClient, ClientFetchError};
use tapwater_service::config::Config;
use tapwater_service::logging;
use tapwater_service::model::ApiResponse;
use tapwater_service::render;
use tapwater_service::view::{self, LoadTicket, ReportView, SortKey};
use tapwater_service::zip::parse_zip_input;

type FetchResult = (LoadTicket, Result<ApiResponse, ClientFetchError>);

const HELP: &str = "\
Commands:
  zip <ZIP>            load another ZIP
  search <text>        filter by contaminant name or health risk
  clear                clear the search
  sort severity|name   change sort order
  show exceeds|others  toggle which list is shown
  provider <n>         switch to provider n
  help                 show this help
  quit                 exit";

fn main() {
    let config = Config::load_or_default().unwrap_or_else(|e| {
        eprintln!("⚠ {} (using defaults)", e);
        Config::default()
    });
    logging::init_logger(config.log_level(), config.logging.file.as_deref(), false);

    let mut client_config = config.client.clone();
    let mut initial_zip = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--base-url" => match args.next() {
                Some(url) => client_config.base_url = url,
                None => {
                    eprintln!("--base-url requires a value");
                    std::process::exit(2);
                }
            },
            other => initial_zip = Some(other.to_string()),
        }
    }

    let client = match ApiClient::from_config(&client_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };
    let wait = Duration::from_secs(client_config.timeout_secs + 1);

    let (tx, rx) = mpsc::channel::<FetchResult>();
    let mut report_view = ReportView::new();

    if let Some(raw) = initial_zip {
        match parse_zip_input(&raw) {
            Ok(zip) => start_fetch(&mut report_view, &client, &tx, &zip),
            Err(msg) => println!("{}", msg),
        }
    }

    println!("{}", HELP);
    let stdin = io::stdin();
    loop {
        if !report_view.zip().is_empty() {
            await_current(&mut report_view, &rx, wait);
            println!("\n{}", render::render(&mut report_view));
        }
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            "zip" => match parse_zip_input(rest) {
                Ok(zip) => start_fetch(&mut report_view, &client, &tx, &zip),
                Err(msg) => println!("{}", msg),
            },
            "search" => report_view.set_query(rest),
            "clear" => report_view.set_query(""),
            "sort" => match SortKey::parse(rest) {
                Some(sort) => report_view.set_sort(sort),
                None => println!("sort expects 'severity' or 'name'"),
            },
            "show" => match view::parse_partition(rest) {
                Some(partition) => report_view.show(partition),
                None => println!("show expects 'exceeds' or 'others'"),
            },
            "provider" => {
                let selected = rest
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .is_some_and(|n| report_view.select_provider(n - 1));
                if !selected {
                    println!("no provider '{}'", rest);
                }
            }
            other => println!("unknown command '{}' (try 'help')", other),
        }
    }
}

/// Starts fetching `zip` on a worker thread.
fn start_fetch(
    report_view: &mut ReportView,
    client: &Arc<ApiClient>,
    tx: &Sender<FetchResult>,
    zip: &str,
) {
    let ticket = report_view.begin_load(zip);
    let client = Arc::clone(client);
    let tx = tx.clone();
    let zip = zip.to_string();
    thread::spawn(move || {
        let result = client.fetch_report(&zip);
        // receiver gone means the view has exited
        let _ = tx.send((ticket, result));
    });
}

/// Applies finished fetches, blocking while the current one is outstanding.
/// Results for superseded tickets are discarded.
fn await_current(report_view: &mut ReportView, rx: &Receiver<FetchResult>, wait: Duration) {
    while let Ok((ticket, result)) = rx.try_recv() {
        report_view.finish_load(ticket, result);
    }
    while matches!(report_view.screen(), view::Screen::Loading) {
        match rx.recv_timeout(wait) {
            Ok((ticket, result)) => {
                report_view.finish_load(ticket, result);
            }
            Err(_) => break,
        }
    }
}
