#![forbid(unsafe_code)]

fn main() {
    std::process::exit(dash_search_cli::run());
}
