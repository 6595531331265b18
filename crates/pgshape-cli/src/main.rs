use pgshape_cli::cli::{self, Command};
use pgshape_cli::generate;

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let result = match cli::parse_args(&argv) {
        Ok(Command::Help(page)) => {
            println!("{page}");
            Ok(())
        }
        Ok(Command::Generate(args)) => generate::run(args).await,
        Ok(Command::Init(args)) => generate::init(args),
        Ok(Command::Inspect(args)) => generate::inspect(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
