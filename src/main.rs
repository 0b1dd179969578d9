use p4conn::cli;
use p4conn::ui::output;

fn main() {
    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
