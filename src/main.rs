use sw_catalogue::app::{self, RunOptions};

fn main() {
    let Some(opts) = handle_cli_flags() else {
        return;
    };

    if let Err(err) = sw_catalogue::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Returns `None` when a flag already did all the work.
fn handle_cli_flags() -> Option<RunOptions> {
    let mut opts = RunOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("SW Catalogue {}", sw_catalogue::VERSION);
                return None;
            }
            "--help" | "-h" => {
                println!(
                    "SW Catalogue: browse the people catalogue from the terminal.\n\nUsage: sw-catalogue [FLAGS] [SCREEN]\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --offline            Browse built-in sample data without the API\n  --logout             Forget the stored access and refresh tokens\n\n  SCREEN               / (catalogue, default) or /person/{{id}}"
                );
                return None;
            }
            "--logout" => {
                match app::logout() {
                    Ok(()) => println!("Stored credentials cleared."),
                    Err(err) => {
                        eprintln!("Logout failed: {err:?}");
                        std::process::exit(1);
                    }
                }
                return None;
            }
            "--offline" => opts.offline = true,
            other if other.starts_with('/') => opts.start_path = Some(other.to_string()),
            other => {
                eprintln!("error: unknown argument {other:?} (see --help)");
                std::process::exit(2);
            }
        }
    }
    Some(opts)
}
